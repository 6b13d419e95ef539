//! Node inventory models

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MaintainerError;

/// Identifies one deployable application: `tenant:application:instance`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApplicationId {
    tenant: String,
    application: String,
    instance: String,
}

impl ApplicationId {
    pub fn new(
        tenant: impl Into<String>,
        application: impl Into<String>,
        instance: impl Into<String>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            application: application.into(),
            instance: instance.into(),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// `tenant.application`, with `.instance` appended unless it is `default`
    pub fn to_short_string(&self) -> String {
        if self.instance == "default" {
            format!("{}.{}", self.tenant, self.application)
        } else {
            format!("{}.{}.{}", self.tenant, self.application, self.instance)
        }
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.tenant, self.application, self.instance)
    }
}

impl FromStr for ApplicationId {
    type Err = MaintainerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        match parts.as_slice() {
            [tenant, application, instance]
                if !tenant.is_empty() && !application.is_empty() && !instance.is_empty() =>
            {
                Ok(Self::new(*tenant, *application, *instance))
            }
            _ => Err(MaintainerError::InvalidApplicationId(s.to_string())),
        }
    }
}

impl TryFrom<String> for ApplicationId {
    type Error = MaintainerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ApplicationId> for String {
    fn from(id: ApplicationId) -> Self {
        id.to_string()
    }
}

/// The actor that caused a history event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    System,
    Operator,
    Application,
}

/// An immutable record of one node state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub agent: Agent,
    pub at: DateTime<Utc>,
    pub description: String,
}

impl Event {
    pub fn new(agent: Agent, at: DateTime<Utc>, description: impl Into<String>) -> Self {
        Self {
            agent,
            at,
            description: description.into(),
        }
    }
}

/// Append-only, timestamp-ordered event log of a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Event>", into = "Vec<Event>")]
pub struct History {
    events: Vec<Event>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Events older than the last recorded one are rejected.
    pub fn record(&mut self, event: Event) -> Result<(), MaintainerError> {
        if let Some(last) = self.events.last() {
            if event.at < last.at {
                return Err(MaintainerError::HistoryOrderError {
                    last: last.at,
                    attempted: event.at,
                });
            }
        }
        self.events.push(event);
        Ok(())
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    /// Whether `agent` recorded an event in the half-open window `(after, until]`
    pub fn has_event_between(
        &self,
        agent: Agent,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> bool {
        self.events
            .iter()
            .any(|event| event.agent == agent && event.at > after && event.at <= until)
    }
}

impl TryFrom<Vec<Event>> for History {
    type Error = MaintainerError;

    fn try_from(events: Vec<Event>) -> Result<Self, Self::Error> {
        let mut history = History::new();
        for event in events {
            history.record(event)?;
        }
        Ok(history)
    }
}

impl From<History> for Vec<Event> {
    fn from(history: History) -> Self {
        history.events
    }
}

/// Lifecycle state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Provisioned,
    Ready,
    Reserved,
    Active,
    Inactive,
    Dirty,
    Failed,
    Parked,
}

/// The application a node is allocated to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub owner: ApplicationId,
    pub cluster: String,
}

/// A node record as held by the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub hostname: String,
    pub state: NodeState,
    #[serde(default)]
    pub allocation: Option<Allocation>,
    #[serde(default)]
    pub history: History,
}

impl Node {
    /// Create an unallocated node in the `ready` state
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            state: NodeState::Ready,
            allocation: None,
            history: History::new(),
        }
    }

    pub fn owner(&self) -> Option<&ApplicationId> {
        self.allocation.as_ref().map(|a| &a.owner)
    }
}
