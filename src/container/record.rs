use crate::engine::{ContainerInspect, StatsSample};

use super::{ContainerID, LifecycleState};

/// One row of the container's process table as returned by the engine's `top`.
///
/// Values are kept as the strings `ps` printed them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Process {
    pub pid: String,
    pub ppid: String,
    pub threads: String,
    pub rss: String,
    pub cpu: String,
    pub cmd: String,
}

/// Read-only copy of everything known about a tracked container.
///
/// A record is created on `Create`, replaced wholesale on every `Update` and
/// dropped on `Remove`.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerRecord {
    pub id: ContainerID,
    pub name: String,
    pub image: String,
    pub state: LifecycleState,
    pub addresses: Vec<String>,
    pub stats: Option<StatsSample>,
    pub processes: Vec<Process>,
}

impl ContainerRecord {
    /// A record for a container that was discovered but has not reported a sample yet.
    pub fn pending(id: ContainerID) -> Self {
        Self {
            id,
            name: String::new(),
            image: String::new(),
            state: LifecycleState::Unknown,
            addresses: Vec::new(),
            stats: None,
            processes: Vec::new(),
        }
    }

    pub fn from_update(
        id: ContainerID,
        inspect: &ContainerInspect,
        stats: StatsSample,
        processes: Vec<Process>,
    ) -> Self {
        Self {
            id,
            name: inspect.name.trim_start_matches('/').to_owned(),
            image: inspect.config.image.clone(),
            state: LifecycleState::from_status(&inspect.state.status),
            addresses: inspect.addresses(),
            stats: Some(stats),
            processes,
        }
    }

    /// Whether at least one sample was received.
    pub fn is_loaded(&self) -> bool {
        self.stats.is_some()
    }
}
