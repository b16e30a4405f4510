use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{ContainerEvent, ContainerUpdate, EventSender};
use crate::container::{ContainerID, LifecycleState};
use crate::engine::{Engine, StatsStream};

/// Streams the stats of one container and turns every sample into an
/// [`ContainerEvent::Update`].
///
/// A subscriber never removes its own container. When the container turns out
/// to be gone (the stream cannot be opened or an inspect fails) it reports the
/// id on `retire` and stops, leaving the removal to the reconciler.
#[derive(Debug)]
pub struct Subscriber<E> {
    engine: Arc<E>,
    id: ContainerID,
    events: EventSender,
    retire: mpsc::UnboundedSender<ContainerID>,
    cancel: CancellationToken,
}

impl<E: Engine> Subscriber<E> {
    pub fn new(
        engine: Arc<E>,
        id: ContainerID,
        events: EventSender,
        retire: mpsc::UnboundedSender<ContainerID>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            engine,
            id,
            events,
            retire,
            cancel,
        }
    }

    /// Runs until the stream ends, the container is gone or `cancel` fires.
    ///
    /// The stream is dropped, and with it the connection, before returning.
    pub async fn run(self) {
        let id = &self.id;
        let mut stream = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            opened = self.engine.stats(id) => match opened {
                Ok(stream) => stream,
                Err(err) => {
                    log::warn!("failed to open stats stream of {}: {err}", id.short());
                    self.retire_self();
                    return;
                }
            },
        };
        log::debug!("subscribed to stats of {}", id.short());

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                next = stream.next_sample() => next,
            };
            let stats = match next {
                None => {
                    log::debug!("stats stream of {} ended", id.short());
                    break;
                }
                Some(Err(err)) => {
                    log::warn!("skipping stats sample of {}: {err}", id.short());
                    continue;
                }
                Some(Ok(stats)) => stats,
            };

            let inspected = tokio::select! {
                _ = self.cancel.cancelled() => break,
                inspected = self.engine.inspect(id) => inspected,
            };
            let inspect = match inspected {
                Ok(inspect) => inspect,
                Err(err) => {
                    log::warn!("failed to inspect {}, treating it as gone: {err}", id.short());
                    self.retire_self();
                    break;
                }
            };

            let state = LifecycleState::from_status(&inspect.state.status);
            let processes = if state.has_processes() {
                let listed = tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    listed = self.engine.top(id) => listed,
                };
                listed.unwrap_or_else(|err| {
                    log::warn!("failed to list processes of {}: {err}", id.short());
                    Vec::new()
                })
            } else {
                Vec::new()
            };

            let event = ContainerEvent::Update(Box::new(ContainerUpdate {
                id: id.clone(),
                inspect,
                stats,
                processes,
            }));
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                sent = self.events.send(event) => if sent.is_err() {
                    log::debug!("event channel closed, stopping subscriber of {}", id.short());
                    break;
                },
            }
        }

        drop(stream);
        log::debug!("unsubscribed from stats of {}", id.short());
    }

    fn retire_self(&self) {
        if self.retire.send(self.id.clone()).is_err() {
            log::debug!("reconciler gone, cannot retire {}", self.id.short());
        }
    }
}
