//! Terminal presentation of the telemetry events.
//!
//! [`run`] is the single consumer of the event channel. It applies each
//! event to the [`Dashboard`], redraws on a fixed frame interval, and turns
//! key presses into selection changes or one-shot engine commands. While the
//! log pane is open a [`LogFollower`] streams the selected container's output.
mod control;
mod layout;
mod logs;
mod terminal;
mod view;

pub use control::{Command, ControlError, spawn_command};
pub use layout::Layout;
pub use logs::{
    LOG_TAIL, LogFollower, LogMessage, LogPane, LogReceiver, LogSender, follow_logs,
};
pub use terminal::{Input, TerminalGuard, spawn_input};
pub use view::{Action, Dashboard};

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::stack::StackDescriptor;
use crate::telemetry::EventReceiver;

/// Runs the dashboard until the user quits, `shutdown` fires or the event
/// channel closes. Cancels `shutdown` on the way out.
pub async fn run<E: Engine>(
    engine: Arc<E>,
    stack: Arc<StackDescriptor>,
    config: Config,
    mut events: EventReceiver,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut screen = TerminalGuard::enter().map_err(Error::Terminal)?;
    let (width, height) = TerminalGuard::size().map_err(Error::Terminal)?;

    let mut frame = tokio::time::interval(config.frame_interval());
    frame.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut dashboard = Dashboard::new(stack, config, width, height);

    let (input_tx, mut input) = mpsc::unbounded_channel();
    let reader = spawn_input(input_tx, shutdown.clone());

    let (log_tx, mut log_lines) = mpsc::unbounded_channel();
    let mut follower = LogFollower::new(Arc::clone(&engine), log_tx, shutdown.clone());

    let result = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break Ok(()),
            event = events.recv() => match event {
                Some(event) => dashboard.apply(event),
                None => {
                    log::debug!("event channel closed");
                    break Ok(());
                }
            },
            received = input.recv() => match received {
                Some(Input::Key(key)) => match dashboard.handle_key(key) {
                    Action::Quit => break Ok(()),
                    Action::Control { command, id } => {
                        spawn_command(Arc::clone(&engine), id, command);
                    }
                    Action::None => {}
                },
                Some(Input::Resize(width, height)) => dashboard.resize(width, height),
                None => break Ok(()),
            },
            Some(message) = log_lines.recv() => dashboard.push_log(message),
            _ = frame.tick() => {
                if let Err(err) = screen.draw(&dashboard.render()) {
                    break Err(Error::Terminal(err));
                }
            }
        }
        follower.follow(dashboard.log_target());
    };

    shutdown.cancel();
    follower.stop().await;
    if let Err(err) = reader.await {
        log::error!("terminal input reader failed: {err}");
    }
    result
}
