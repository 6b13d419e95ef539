//! Fakes shared by the integration tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use node_maintainer::clock::ManualClock;
use node_maintainer::deploy::{Deployer, Deployment};
use node_maintainer::errors::MaintainerError;
use node_maintainer::maintenance::application::MaintainerContext;
use node_maintainer::maintenance::locks::ApplicationLocks;
use node_maintainer::nodes::model::{Agent, ApplicationId, Node};
use node_maintainer::nodes::repository::{InMemoryNodeRepository, NodeRepository};

pub fn time(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, hour, minute, 0).unwrap()
}

pub fn app(name: &str) -> ApplicationId {
    ApplicationId::new("tenant", name, "default")
}

pub fn clock_at(hour: u32, minute: u32) -> Arc<ManualClock> {
    Arc::new(ManualClock::new(time(hour, minute)))
}

/// Add `hostname` to the repository, allocated to `owner`
pub async fn allocated(repository: &InMemoryNodeRepository, hostname: &str, owner: &ApplicationId) {
    repository.add(Node::new(hostname)).await.unwrap();
    repository
        .allocate(hostname, owner.clone(), "container", Agent::System)
        .await
        .unwrap();
}

pub fn context(
    nodes: Arc<dyn NodeRepository>,
    deployer: Arc<FakeDeployer>,
    locks: Arc<ApplicationLocks>,
) -> MaintainerContext {
    MaintainerContext {
        nodes,
        deployer,
        locks,
        lock_wait: Duration::ZERO,
    }
}

/// How a fake deployment behaves on activation
#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed,
    Fail,
    Panic,
    Missing,
    Delay(Duration),
}

#[derive(Default)]
struct Running {
    per_application: HashMap<ApplicationId, usize>,
}

/// Deployer recording every activation and any overlapping activation of
/// the same application
#[derive(Default)]
pub struct FakeDeployer {
    behaviours: Mutex<HashMap<ApplicationId, Behaviour>>,
    activated: Arc<Mutex<Vec<ApplicationId>>>,
    running: Arc<Mutex<Running>>,
    overlaps: Arc<AtomicUsize>,
}

impl FakeDeployer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, application: &ApplicationId, behaviour: Behaviour) {
        self.behaviours
            .lock()
            .unwrap()
            .insert(application.clone(), behaviour);
    }

    /// Applications whose activation completed successfully, in order
    pub fn activated(&self) -> Vec<ApplicationId> {
        self.activated.lock().unwrap().clone()
    }

    pub fn activations_of(&self, application: &ApplicationId) -> usize {
        self.activated()
            .iter()
            .filter(|a| *a == application)
            .count()
    }

    /// Number of times an activation started while another activation of
    /// the same application was running
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn deployment_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<Box<dyn Deployment>>, MaintainerError> {
        let behaviour = self
            .behaviours
            .lock()
            .unwrap()
            .get(application)
            .cloned()
            .unwrap_or(Behaviour::Succeed);

        if matches!(behaviour, Behaviour::Missing) {
            return Ok(None);
        }

        Ok(Some(Box::new(FakeDeployment {
            application: application.clone(),
            behaviour,
            activated: self.activated.clone(),
            running: self.running.clone(),
            overlaps: self.overlaps.clone(),
        })))
    }
}

struct FakeDeployment {
    application: ApplicationId,
    behaviour: Behaviour,
    activated: Arc<Mutex<Vec<ApplicationId>>>,
    running: Arc<Mutex<Running>>,
    overlaps: Arc<AtomicUsize>,
}

struct RunningGuard {
    application: ApplicationId,
    running: Arc<Mutex<Running>>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(count) = running.per_application.get_mut(&self.application) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl Deployment for FakeDeployment {
    async fn activate(&self) -> Result<(), MaintainerError> {
        let _guard = {
            let mut running = self.running.lock().unwrap();
            let count = running
                .per_application
                .entry(self.application.clone())
                .or_default();
            if *count > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            *count += 1;
            RunningGuard {
                application: self.application.clone(),
                running: self.running.clone(),
            }
        };

        match &self.behaviour {
            Behaviour::Succeed | Behaviour::Missing => {}
            Behaviour::Delay(delay) => tokio::time::sleep(*delay).await,
            Behaviour::Fail => {
                return Err(MaintainerError::DeployError(format!(
                    "{} refused to start",
                    self.application
                )))
            }
            Behaviour::Panic => panic!("deployment of {} exploded", self.application),
        }

        self.activated.lock().unwrap().push(self.application.clone());
        Ok(())
    }
}

/// Repository wrapper whose listing can be made to fail
pub struct FlakyRepository {
    pub inner: Arc<InMemoryNodeRepository>,
    pub failing: AtomicBool,
}

impl FlakyRepository {
    pub fn new(inner: Arc<InMemoryNodeRepository>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl NodeRepository for FlakyRepository {
    async fn list_nodes(&self) -> Result<Vec<Node>, MaintainerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MaintainerError::InventoryError("unavailable".to_string()));
        }
        self.inner.list_nodes().await
    }

    async fn node(&self, hostname: &str) -> Result<Option<Node>, MaintainerError> {
        self.inner.node(hostname).await
    }
}
