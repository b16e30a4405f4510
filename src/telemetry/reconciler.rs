use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ContainerEvent, EventSender, Subscriber};
use crate::container::ContainerID;
use crate::engine::{Engine, ListFilter};
use crate::stack::StackDescriptor;

struct Tracked {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Keeps one [`Subscriber`] running per container of the stack.
///
/// Every `interval` the engine is listed and the result diffed against the
/// tracked set: new containers get a `Create` and a subscriber, vanished ones
/// get their subscriber cancelled and joined, then a `Remove`. Subscribers
/// that find their container gone report back on the retire channel and are
/// removed the same way. Ticks and retirements are handled one at a time by
/// [`Reconciler::run`], which is the only place the tracked set changes.
pub struct Reconciler<E> {
    engine: Arc<E>,
    stack: Arc<StackDescriptor>,
    events: EventSender,
    interval: Duration,
    shutdown: CancellationToken,
    tracked: HashMap<ContainerID, Tracked>,
    retire_tx: mpsc::UnboundedSender<ContainerID>,
    retire_rx: mpsc::UnboundedReceiver<ContainerID>,
}

impl<E: Engine> Reconciler<E> {
    /// `shutdown` is the root token, every subscriber runs under a child of it.
    pub fn new(
        engine: Arc<E>,
        stack: Arc<StackDescriptor>,
        events: EventSender,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let (retire_tx, retire_rx) = mpsc::unbounded_channel();
        Self {
            engine,
            stack,
            events,
            interval,
            shutdown,
            tracked: HashMap::new(),
            retire_tx,
            retire_rx,
        }
    }

    /// Reconciles on every tick until `shutdown` fires, then waits for all
    /// subscribers to stop.
    pub async fn run(mut self) {
        let shutdown = self.shutdown.clone();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                Some(id) = self.retire_rx.recv() => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.retire(&id) => {}
                    }
                }
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = self.reconcile() => {}
                    }
                }
            }
        }

        self.stop_all().await;
    }

    /// One reconciliation pass.
    ///
    /// A failed listing leaves the tracked set untouched.
    pub async fn reconcile(&mut self) {
        let Some(live) = self.list_live().await else {
            return;
        };
        let live_set: HashSet<&ContainerID> = live.iter().collect();

        let stale: Vec<ContainerID> = self
            .tracked
            .keys()
            .filter(|id| !live_set.contains(id))
            .cloned()
            .collect();
        for id in stale {
            self.untrack(&id).await;
        }

        for id in live {
            if !self.tracked.contains_key(&id) {
                self.track(id).await;
            }
        }
    }

    /// Ids of the containers currently tracked.
    pub fn tracked(&self) -> impl Iterator<Item = &ContainerID> {
        self.tracked.keys()
    }

    pub fn is_tracked(&self, id: &ContainerID) -> bool {
        self.tracked.contains_key(id)
    }

    /// Containers of the stack, in listing order. The label filter is tried
    /// first, the name based fallback only when it returns nothing.
    async fn list_live(&self) -> Option<Vec<ContainerID>> {
        let labelled = match self.engine.list_containers(&self.stack.label_filter()).await {
            Ok(labelled) => labelled,
            Err(err) => {
                log::error!("failed to list containers of stack `{}`: {err}", self.stack.name());
                return None;
            }
        };

        let containers = if labelled.is_empty() {
            match self.engine.list_containers(&ListFilter::All).await {
                Ok(all) => all
                    .into_iter()
                    .filter(|container| self.stack.matches(container))
                    .collect(),
                Err(err) => {
                    log::error!("failed to list containers: {err}");
                    return None;
                }
            }
        } else {
            labelled
        };

        let mut seen = HashSet::new();
        let ids = containers
            .into_iter()
            .filter_map(|container| match ContainerID::new(&container.id) {
                Ok(id) => Some(id),
                Err(err) => {
                    log::warn!("ignoring container `{}`: {err}", container.primary_name());
                    None
                }
            })
            .filter(|id| seen.insert(id.clone()))
            .collect();
        Some(ids)
    }

    async fn track(&mut self, id: ContainerID) {
        log::info!("tracking container {}", id.short());
        if self
            .events
            .send(ContainerEvent::Create { id: id.clone() })
            .await
            .is_err()
        {
            log::debug!("event channel closed, not tracking {}", id.short());
            return;
        }

        let cancel = self.shutdown.child_token();
        let subscriber = Subscriber::new(
            Arc::clone(&self.engine),
            id.clone(),
            self.events.clone(),
            self.retire_tx.clone(),
            cancel.clone(),
        );
        let task = tokio::spawn(subscriber.run());
        self.tracked.insert(id, Tracked { cancel, task });
    }

    async fn untrack(&mut self, id: &ContainerID) {
        let Some(tracked) = self.tracked.remove(id) else {
            return;
        };
        log::info!("untracking container {}", id.short());
        tracked.cancel.cancel();
        if let Err(err) = tracked.task.await {
            log::error!("subscriber of {} failed: {err}", id.short());
        }
        if self
            .events
            .send(ContainerEvent::Remove { id: id.clone() })
            .await
            .is_err()
        {
            log::debug!("event channel closed, dropping removal of {}", id.short());
        }
    }

    async fn retire(&mut self, id: &ContainerID) {
        if self.is_tracked(id) {
            log::debug!("subscriber of {} retired", id.short());
            self.untrack(id).await;
        }
    }

    async fn stop_all(&mut self) {
        for (id, tracked) in self.tracked.drain() {
            tracked.cancel.cancel();
            if let Err(err) = tracked.task.await {
                log::error!("subscriber of {} failed: {err}", id.short());
            }
        }
        log::debug!("reconciler of stack `{}` stopped", self.stack.name());
    }
}
