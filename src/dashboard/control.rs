use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::container::{ContainerID, LifecycleState};
use crate::engine::{self, Engine};
use crate::error::ResultOkLogExt;

/// One-shot lifecycle command issued from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Pause,
    Unpause,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to {command} container {id}: {source}")]
pub struct ControlError {
    command: Command,
    id: ContainerID,
    #[source]
    source: engine::Error,
}

impl Command {
    /// `p`: pause a running container, unpause a paused one.
    pub fn toggle_pause(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Paused => Self::Unpause,
            _ => Self::Pause,
        }
    }

    /// `s`: stop a live container, start anything else.
    pub fn toggle_run(state: LifecycleState) -> Self {
        match state {
            LifecycleState::Running | LifecycleState::Paused | LifecycleState::Restarting => {
                Self::Stop
            }
            _ => Self::Start,
        }
    }

    pub async fn execute<E: Engine>(
        self,
        engine: &E,
        id: &ContainerID,
    ) -> Result<(), ControlError> {
        let result = match self {
            Self::Start => engine.start(id).await,
            Self::Stop => engine.stop(id).await,
            Self::Pause => engine.pause(id).await,
            Self::Unpause => engine.unpause(id).await,
        };
        result.map_err(|source| ControlError {
            command: self,
            id: id.clone(),
            source,
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
        })
    }
}

/// Runs `command` on its own task so the dashboard never waits for the engine.
/// The outcome reaches the dashboard through the regular telemetry events.
pub fn spawn_command<E: Engine>(
    engine: Arc<E>,
    id: ContainerID,
    command: Command,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("{command} container {}", id.short());
        command.execute(engine.as_ref(), &id).await.ok_log();
    })
}
