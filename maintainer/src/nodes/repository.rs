//! Node repository: the read-only view maintainers query, and the in-memory
//! store behind it

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::errors::MaintainerError;
use crate::nodes::model::{Agent, Allocation, ApplicationId, Event, Node, NodeState};
use crate::storage::json_file::JsonFile;

/// Read-only query surface over the node inventory
#[async_trait]
pub trait NodeRepository: Send + Sync {
    /// Snapshot of every node, ordered by hostname
    async fn list_nodes(&self) -> Result<Vec<Node>, MaintainerError>;

    /// A single node by hostname
    async fn node(&self, hostname: &str) -> Result<Option<Node>, MaintainerError>;

    /// Nodes currently allocated to `application`
    async fn nodes_of(&self, application: &ApplicationId) -> Result<Vec<Node>, MaintainerError> {
        Ok(self
            .list_nodes()
            .await?
            .into_iter()
            .filter(|node| node.owner() == Some(application))
            .collect())
    }
}

/// On-disk inventory format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub nodes: Vec<Node>,
}

/// In-memory node store. Every mutation appends a history event stamped
/// with the store's clock.
pub struct InMemoryNodeRepository {
    nodes: RwLock<BTreeMap<String, Node>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryNodeRepository {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            clock,
        }
    }

    /// Seed the store from an inventory file. A missing file yields an
    /// empty store.
    pub async fn load(
        inventory_file: &JsonFile<Inventory>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MaintainerError> {
        let inventory = inventory_file.read_or_default().await?;
        info!(
            "Loaded {} nodes from {}",
            inventory.nodes.len(),
            inventory_file.path().display()
        );

        let repository = Self::new(clock);
        {
            let mut nodes = repository.nodes.write().await;
            for node in inventory.nodes {
                nodes.insert(node.hostname.clone(), node);
            }
        }
        Ok(repository)
    }

    /// Add a new node. Fails if the hostname is already known.
    pub async fn add(&self, node: Node) -> Result<(), MaintainerError> {
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(&node.hostname) {
            return Err(MaintainerError::InventoryError(format!(
                "node {} already exists",
                node.hostname
            )));
        }
        debug!("Adding node {}", node.hostname);
        nodes.insert(node.hostname.clone(), node);
        Ok(())
    }

    /// Allocate a node to an application and activate it
    pub async fn allocate(
        &self,
        hostname: &str,
        owner: ApplicationId,
        cluster: impl Into<String>,
        agent: Agent,
    ) -> Result<Node, MaintainerError> {
        let description = format!("allocated to {}", owner);
        self.mutate(hostname, agent, description, |node| {
            node.allocation = Some(Allocation {
                owner,
                cluster: cluster.into(),
            });
            node.state = NodeState::Active;
        })
        .await
    }

    /// Remove the allocation of a node, leaving it dirty
    pub async fn deallocate(&self, hostname: &str, agent: Agent) -> Result<Node, MaintainerError> {
        self.mutate(hostname, agent, "deallocated", |node| {
            node.allocation = None;
            node.state = NodeState::Dirty;
        })
        .await
    }

    /// Move a node to another state
    pub async fn set_state(
        &self,
        hostname: &str,
        state: NodeState,
        agent: Agent,
    ) -> Result<Node, MaintainerError> {
        let description = format!("state set to {:?}", state).to_lowercase();
        self.mutate(hostname, agent, description, |node| node.state = state)
            .await
    }

    /// Record an event without otherwise changing the node
    pub async fn record_event(
        &self,
        hostname: &str,
        agent: Agent,
        description: impl Into<String>,
    ) -> Result<Node, MaintainerError> {
        self.mutate(hostname, agent, description, |_| {}).await
    }

    async fn mutate(
        &self,
        hostname: &str,
        agent: Agent,
        description: impl Into<String>,
        change: impl FnOnce(&mut Node),
    ) -> Result<Node, MaintainerError> {
        let mut nodes = self.nodes.write().await;
        let node = nodes
            .get_mut(hostname)
            .ok_or_else(|| MaintainerError::NotFound(format!("node {}", hostname)))?;

        // Record first so an ordering violation leaves the node untouched
        node.history
            .record(Event::new(agent, self.clock.now(), description))?;
        change(node);
        Ok(node.clone())
    }

    /// Snapshot of the store in its on-disk format
    pub async fn inventory(&self) -> Inventory {
        let nodes = self.nodes.read().await;
        Inventory {
            nodes: nodes.values().cloned().collect(),
        }
    }
}

#[async_trait]
impl NodeRepository for InMemoryNodeRepository {
    async fn list_nodes(&self) -> Result<Vec<Node>, MaintainerError> {
        let nodes = self.nodes.read().await;
        Ok(nodes.values().cloned().collect())
    }

    async fn node(&self, hostname: &str) -> Result<Option<Node>, MaintainerError> {
        let nodes = self.nodes.read().await;
        Ok(nodes.get(hostname).cloned())
    }
}
