use std::fmt;

/// Lifecycle of a container as reported by the engine.
///
/// Transitions follow `Created -> Running -> {Paused <-> Running} -> Exited/Dead`,
/// with `Restarting` and `Removing` as transient states. The state decides which
/// derived metrics are computed for a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    /// Status string was empty or unknown, e.g. a compose service without a container.
    #[default]
    Unknown,
}

impl LifecycleState {
    /// Parses the engine's `State.Status` string. Unknown strings map to [`LifecycleState::Unknown`].
    pub fn from_status(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown,
        }
    }

    /// Whether resource samples for a container in this state feed the metric views.
    pub fn is_sampling(self) -> bool {
        matches!(
            self,
            Self::Created | Self::Running | Self::Paused | Self::Restarting
        )
    }

    /// Whether the container still has a process table worth querying.
    pub fn has_processes(self) -> bool {
        !matches!(self, Self::Exited | Self::Dead | Self::Removing)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Restarting => "restarting",
            Self::Removing => "removing",
            Self::Exited => "exited",
            Self::Dead => "dead",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
