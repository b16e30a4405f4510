//! Followed output of the selected container.
//!
//! At most one [`LogFollower`] task runs at a time. Its lines travel on their
//! own channel, so a chatty container never delays telemetry events.
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::container::ContainerID;
use crate::engine::{Engine, LogLine, LogSource, LogStream};
use crate::metrics::MetricWindow;

/// Lines of history requested when a container's logs are opened.
pub const LOG_TAIL: usize = 100;

/// Lines kept per output stream.
const LOG_CAPACITY: usize = 500;

/// One line of output of a followed container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub id: ContainerID,
    pub line: LogLine,
}

pub type LogSender = mpsc::UnboundedSender<LogMessage>;
pub type LogReceiver = mpsc::UnboundedReceiver<LogMessage>;

/// Buffered output of one container, split into stdout and stderr.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPane {
    id: ContainerID,
    shown: LogSource,
    stdout: MetricWindow<String>,
    stderr: MetricWindow<String>,
}

impl LogPane {
    pub fn new(id: ContainerID) -> Self {
        Self {
            id,
            shown: LogSource::Stdout,
            stdout: MetricWindow::new(LOG_CAPACITY),
            stderr: MetricWindow::new(LOG_CAPACITY),
        }
    }

    pub fn id(&self) -> &ContainerID {
        &self.id
    }

    /// The stream currently displayed, stdout or stderr.
    pub fn shown(&self) -> LogSource {
        self.shown
    }

    pub fn show(&mut self, source: LogSource) {
        self.shown = match source {
            LogSource::Stderr => LogSource::Stderr,
            LogSource::Stdin | LogSource::Stdout => LogSource::Stdout,
        };
    }

    /// Stdin echoes are shown with stdout.
    pub fn push(&mut self, line: LogLine) {
        match line.source {
            LogSource::Stderr => self.stderr.push(line.text),
            LogSource::Stdin | LogSource::Stdout => self.stdout.push(line.text),
        }
    }

    /// The newest `rows` lines of the shown stream, oldest first.
    pub fn tail(&self, rows: usize) -> Vec<&str> {
        let lines = match self.shown {
            LogSource::Stderr => &self.stderr,
            LogSource::Stdin | LogSource::Stdout => &self.stdout,
        };
        lines
            .iter()
            .skip(lines.len().saturating_sub(rows))
            .map(String::as_str)
            .collect()
    }
}

/// Follows the logs of `id` until the stream ends or `cancel` fires.
pub async fn follow_logs<E: Engine>(
    engine: Arc<E>,
    id: ContainerID,
    tail: usize,
    lines: LogSender,
    cancel: CancellationToken,
) {
    let mut stream = tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        opened = engine.logs(&id, tail) => match opened {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!("failed to open logs of {}: {err}", id.short());
                return;
            }
        },
    };
    log::debug!("following logs of {}", id.short());

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = stream.next_line() => next,
        };
        match next {
            None => {
                log::debug!("log stream of {} ended", id.short());
                break;
            }
            Some(Err(err)) => log::warn!("failed to read logs of {}: {err}", id.short()),
            Some(Ok(line)) => {
                let message = LogMessage {
                    id: id.clone(),
                    line,
                };
                if lines.send(message).is_err() {
                    break;
                }
            }
        }
    }
}

#[derive(Debug)]
struct Following {
    id: ContainerID,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Keeps one [`follow_logs`] task running for whichever container the log
/// pane shows, and none while the pane is closed.
#[derive(Debug)]
pub struct LogFollower<E> {
    engine: Arc<E>,
    lines: LogSender,
    shutdown: CancellationToken,
    current: Option<Following>,
}

impl<E: Engine> LogFollower<E> {
    pub fn new(engine: Arc<E>, lines: LogSender, shutdown: CancellationToken) -> Self {
        Self {
            engine,
            lines,
            shutdown,
            current: None,
        }
    }

    pub fn following(&self) -> Option<&ContainerID> {
        self.current.as_ref().map(|following| &following.id)
    }

    /// Switches to `target`. A follower for another container is cancelled;
    /// lines it already sent are dropped by the pane, which checks the id.
    pub fn follow(&mut self, target: Option<&ContainerID>) {
        if self.following() == target {
            return;
        }
        if let Some(previous) = self.current.take() {
            previous.cancel.cancel();
        }
        let Some(id) = target else {
            return;
        };

        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(follow_logs(
            Arc::clone(&self.engine),
            id.clone(),
            LOG_TAIL,
            self.lines.clone(),
            cancel.clone(),
        ));
        self.current = Some(Following {
            id: id.clone(),
            cancel,
            task,
        });
    }

    /// Cancels the running follower and waits for it.
    pub async fn stop(&mut self) {
        if let Some(following) = self.current.take() {
            following.cancel.cancel();
            if let Err(err) = following.task.await {
                log::error!("log follower of {} failed: {err}", following.id.short());
            }
        }
    }
}
