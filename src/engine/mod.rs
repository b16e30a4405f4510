//! Container engine access.
//!
//! The [`Engine`] trait is the container control interface the telemetry core
//! runs against: listing, inspecting, process tables, streaming stats and the
//! one-shot lifecycle commands, plus followed container logs. [`DockerEngine`] implements it over the
//! engine's HTTP API on a Unix socket.
mod docker;
mod error;
mod models;
mod unix;

pub use docker::{DockerEngine, DockerLogStream, DockerStatsStream};
pub use error::{Error, Result};
pub use models::{
    BlkioEntry, BlkioStats, ContainerInspect, ContainerSummary, CpuStats, CpuUsage,
    EndpointSettings, InspectConfig, InspectState, LogLine, LogSource, MemoryStats,
    NetworkCounters, NetworkSettings, PidsStats, StatsSample, TopResponse,
};
pub use unix::UnixConnector;

use crate::container::{ContainerID, Process};

/// Which containers a listing should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListFilter {
    /// Every container known to the engine, running or not.
    All,
    /// Containers carrying the label `key=value`.
    Label { key: String, value: String },
}

/// Request/response and stream-open calls against a container engine.
pub trait Engine: Send + Sync + 'static {
    type Stats: StatsStream;
    type Logs: LogStream;

    fn list_containers(
        &self,
        filter: &ListFilter,
    ) -> impl Future<Output = Result<Vec<ContainerSummary>>> + Send;

    fn inspect(&self, id: &ContainerID) -> impl Future<Output = Result<ContainerInspect>> + Send;

    fn top(&self, id: &ContainerID) -> impl Future<Output = Result<Vec<Process>>> + Send;

    /// Opens a streaming stats connection that yields one sample per engine scrape interval.
    fn stats(&self, id: &ContainerID) -> impl Future<Output = Result<Self::Stats>> + Send;

    /// Follows the container's output, starting with the last `tail` lines.
    fn logs(
        &self,
        id: &ContainerID,
        tail: usize,
    ) -> impl Future<Output = Result<Self::Logs>> + Send;

    fn start(&self, id: &ContainerID) -> impl Future<Output = Result<()>> + Send;

    fn stop(&self, id: &ContainerID) -> impl Future<Output = Result<()>> + Send;

    fn pause(&self, id: &ContainerID) -> impl Future<Output = Result<()>> + Send;

    fn unpause(&self, id: &ContainerID) -> impl Future<Output = Result<()>> + Send;
}

/// A live stats subscription. Dropping it closes the underlying connection.
pub trait StatsStream: Send + 'static {
    /// The next decoded sample.
    ///
    /// Returns `None` on clean end of stream and `Some(Err(_))` for a sample
    /// that could not be decoded. A decode error does not end the stream.
    fn next_sample(&mut self) -> impl Future<Output = Option<Result<StatsSample>>> + Send;
}

/// A followed log subscription. Dropping it closes the underlying connection.
pub trait LogStream: Send + 'static {
    /// The next line of output, `None` once the engine closes the stream.
    fn next_line(&mut self) -> impl Future<Output = Option<Result<LogLine>>> + Send;
}
