//! Scripted in-memory engine for exercising the telemetry tasks.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::container::{ContainerID, Process};
use crate::engine::{
    ContainerInspect, ContainerSummary, CpuStats, CpuUsage, Engine, Error, InspectState,
    ListFilter, LogLine, LogStream, Result, StatsSample, StatsStream,
};

/// What a fake stats stream yields next. Once the script is exhausted the
/// stream waits forever, like an idle container.
#[derive(Debug, Clone)]
pub(crate) enum Step {
    Sample(StatsSample),
    DecodeError,
    End,
}

pub(crate) fn sample(total_usage: u64, system_cpu_usage: u64) -> StatsSample {
    StatsSample {
        cpu_stats: CpuStats {
            cpu_usage: CpuUsage { total_usage },
            system_cpu_usage,
            online_cpus: 1,
        },
        ..StatsSample::default()
    }
}

pub(crate) fn summary(id: &str, name: &str, project: Option<&str>) -> ContainerSummary {
    ContainerSummary {
        id: id.to_owned(),
        names: vec![format!("/{name}")],
        labels: project.map(|project| {
            HashMap::from([(crate::stack::PROJECT_LABEL.to_owned(), project.to_owned())])
        }),
        ..ContainerSummary::default()
    }
}

fn not_found(id: &str) -> Error {
    Error::Api {
        status: 404,
        message: format!("No such container: {id}"),
    }
}

#[derive(Debug, Default)]
struct State {
    labelled: Vec<ContainerSummary>,
    all: Vec<ContainerSummary>,
    list_fails: bool,
    scripts: HashMap<String, Vec<Step>>,
    removed: HashSet<String>,
    statuses: HashMap<String, String>,
    top_fails: bool,
    top_calls: usize,
    commands: Vec<(String, &'static str)>,
    logs: HashMap<String, Vec<LogLine>>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeEngine {
    state: Mutex<State>,
    dropped: Arc<AtomicUsize>,
}

impl FakeEngine {
    fn with<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Containers returned for the stack label filter.
    pub(crate) fn set_labelled(&self, containers: Vec<ContainerSummary>) {
        self.with(|state| state.labelled = containers);
    }

    /// Containers returned for an unfiltered listing.
    pub(crate) fn set_all(&self, containers: Vec<ContainerSummary>) {
        self.with(|state| state.all = containers);
    }

    pub(crate) fn fail_listing(&self, fail: bool) {
        self.with(|state| state.list_fails = fail);
    }

    pub(crate) fn fail_top(&self, fail: bool) {
        self.with(|state| state.top_fails = fail);
    }

    pub(crate) fn script(&self, id: &str, steps: Vec<Step>) {
        self.with(|state| state.scripts.insert(id.to_owned(), steps));
    }

    /// Lines a log stream of `id` yields before going quiet.
    pub(crate) fn set_logs(&self, id: &str, lines: Vec<LogLine>) {
        self.with(|state| state.logs.insert(id.to_owned(), lines));
    }

    /// Makes inspect fail for `id` from now on.
    pub(crate) fn remove(&self, id: &str) {
        self.with(|state| state.removed.insert(id.to_owned()));
    }

    pub(crate) fn set_status(&self, id: &str, status: &str) {
        self.with(|state| state.statuses.insert(id.to_owned(), status.to_owned()));
    }

    pub(crate) fn top_calls(&self) -> usize {
        self.with(|state| state.top_calls)
    }

    pub(crate) fn commands(&self) -> Vec<(String, &'static str)> {
        self.with(|state| state.commands.clone())
    }

    pub(crate) fn streams_dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    fn command(&self, id: &ContainerID, action: &'static str) -> Result<()> {
        self.with(|state| {
            if state.removed.contains(id.as_ref()) {
                return Err(not_found(id.as_ref()));
            }
            state.commands.push((id.to_string(), action));
            Ok(())
        })
    }
}

impl Engine for FakeEngine {
    type Stats = FakeStream;
    type Logs = FakeLogs;

    async fn list_containers(&self, filter: &ListFilter) -> Result<Vec<ContainerSummary>> {
        self.with(|state| {
            if state.list_fails {
                return Err(Error::Api {
                    status: 500,
                    message: "engine unavailable".to_owned(),
                });
            }
            Ok(match filter {
                ListFilter::All => state.all.clone(),
                ListFilter::Label { .. } => state.labelled.clone(),
            })
        })
    }

    async fn inspect(&self, id: &ContainerID) -> Result<ContainerInspect> {
        self.with(|state| {
            if state.removed.contains(id.as_ref()) {
                return Err(not_found(id.as_ref()));
            }
            let status = state
                .statuses
                .get(id.as_ref())
                .cloned()
                .unwrap_or_else(|| "running".to_owned());
            Ok(ContainerInspect {
                id: id.to_string(),
                name: format!("/{id}"),
                state: InspectState {
                    running: status == "running",
                    status,
                    ..InspectState::default()
                },
                ..ContainerInspect::default()
            })
        })
    }

    async fn top(&self, id: &ContainerID) -> Result<Vec<Process>> {
        self.with(|state| {
            state.top_calls += 1;
            if state.top_fails {
                return Err(Error::Api {
                    status: 409,
                    message: format!("Container {id} is not running"),
                });
            }
            Ok(vec![Process {
                pid: "1".to_owned(),
                cmd: "sleep infinity".to_owned(),
                ..Process::default()
            }])
        })
    }

    async fn stats(&self, id: &ContainerID) -> Result<FakeStream> {
        let steps = self.with(|state| state.scripts.get(id.as_ref()).cloned());
        let steps = steps.ok_or_else(|| not_found(id.as_ref()))?;
        Ok(FakeStream {
            steps: steps.into(),
            dropped: Arc::clone(&self.dropped),
        })
    }

    async fn logs(&self, id: &ContainerID, _tail: usize) -> Result<FakeLogs> {
        self.with(|state| {
            if state.removed.contains(id.as_ref()) {
                return Err(not_found(id.as_ref()));
            }
            let lines = state.logs.get(id.as_ref()).cloned().unwrap_or_default();
            Ok(FakeLogs {
                lines: lines.into(),
            })
        })
    }

    async fn start(&self, id: &ContainerID) -> Result<()> {
        self.command(id, "start")
    }

    async fn stop(&self, id: &ContainerID) -> Result<()> {
        self.command(id, "stop")
    }

    async fn pause(&self, id: &ContainerID) -> Result<()> {
        self.command(id, "pause")
    }

    async fn unpause(&self, id: &ContainerID) -> Result<()> {
        self.command(id, "unpause")
    }
}

#[derive(Debug)]
pub(crate) struct FakeStream {
    steps: VecDeque<Step>,
    dropped: Arc<AtomicUsize>,
}

impl StatsStream for FakeStream {
    async fn next_sample(&mut self) -> Option<Result<StatsSample>> {
        match self.steps.pop_front() {
            Some(Step::Sample(sample)) => {
                tokio::task::yield_now().await;
                Some(Ok(sample))
            }
            Some(Step::DecodeError) => Some(Err(Error::Decode(
                serde_json::from_str::<StatsSample>("{\"read\":").unwrap_err(),
            ))),
            Some(Step::End) => None,
            None => std::future::pending().await,
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Yields its lines, then waits forever like a quiet container.
#[derive(Debug)]
pub(crate) struct FakeLogs {
    lines: VecDeque<LogLine>,
}

impl LogStream for FakeLogs {
    async fn next_line(&mut self) -> Option<Result<LogLine>> {
        match self.lines.pop_front() {
            Some(line) => Some(Ok(line)),
            None => std::future::pending().await,
        }
    }
}
