//! Telemetry acquisition for the containers of one stack.
//!
//! The [`Reconciler`] keeps the set of tracked containers in line with the
//! engine and runs one [`Subscriber`] task per tracked container. All of them
//! publish [`ContainerEvent`]s on a single bounded channel that exactly one
//! consumer drains. A full channel blocks the producers, samples are never
//! dropped.
//!
//! Per container the consumer observes `Create`, any number of `Update`s and
//! finally `Remove`. Only the reconciler emits `Create` and `Remove`, and it
//! emits `Remove` only once the container's subscriber has finished, so no
//! `Update` ever follows the `Remove` of its container.
mod reconciler;
mod subscriber;

#[cfg(test)]
pub(crate) mod fake;

pub use reconciler::Reconciler;
pub use subscriber::Subscriber;

use tokio::sync::mpsc;

use crate::container::{ContainerID, Process};
use crate::engine::{ContainerInspect, StatsSample};

/// Everything a subscriber learned from one stats sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerUpdate {
    pub id: ContainerID,
    pub inspect: ContainerInspect,
    pub stats: StatsSample,
    pub processes: Vec<Process>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEvent {
    Create { id: ContainerID },
    Update(Box<ContainerUpdate>),
    Remove { id: ContainerID },
}

impl ContainerEvent {
    pub fn id(&self) -> &ContainerID {
        match self {
            Self::Create { id } | Self::Remove { id } => id,
            Self::Update(update) => &update.id,
        }
    }
}

pub type EventSender = mpsc::Sender<ContainerEvent>;
pub type EventReceiver = mpsc::Receiver<ContainerEvent>;

/// The fan-in channel all producers share. `capacity` is raised to at least one.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity.max(1))
}
