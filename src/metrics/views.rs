use std::collections::HashMap;

use crate::container::{ContainerID, LifecycleState};
use crate::engine::{CpuStats, StatsSample};
use crate::telemetry::ContainerEvent;

use super::calc;
use super::window::{MetricWindow, NoData};

/// Buckets (in percent) a low-amplitude series is stretched to, see [`scale_factor`].
pub const SCALE_LADDER: [u32; 8] = [15, 25, 35, 45, 55, 65, 75, 100];

/// Picks the smallest ladder bucket strictly above `max` and returns it as a
/// fraction, `1.0` once `max` reaches the last buckets.
///
/// # Examples
///
/// ```
/// # use stackscope::metrics::scale_factor;
/// assert_eq!(scale_factor(3.0), 0.15);
/// assert_eq!(scale_factor(15.0), 0.25);
/// assert_eq!(scale_factor(80.0), 1.0);
/// ```
pub fn scale_factor(max: f64) -> f64 {
    SCALE_LADDER
        .iter()
        .find(|bucket| max < f64::from(**bucket))
        .map_or(1.0, |bucket| f64::from(*bucket) / 100.0)
}

/// CPU usage history of one container.
#[derive(Debug, Clone, PartialEq)]
pub struct CpuView {
    window: MetricWindow<f64>,
    previous: Option<CpuStats>,
}

impl CpuView {
    pub fn new(width: usize) -> Self {
        Self {
            window: MetricWindow::for_width(width),
            previous: None,
        }
    }

    /// Records a sample. The first sample only becomes the baseline for the
    /// next one, and so does a sample whose counters went backwards.
    pub fn observe(&mut self, stats: &CpuStats) {
        let Some(previous) = self.previous.replace(stats.clone()) else {
            return;
        };
        match calc::cpu_percent(stats, &previous) {
            Some(percent) => self.window.push(percent),
            None => log::debug!(
                "cpu counters reset from {}/{} to {}/{}, sample skipped",
                previous.cpu_usage.total_usage,
                previous.system_cpu_usage,
                stats.cpu_usage.total_usage,
                stats.system_cpu_usage
            ),
        }
    }

    pub fn window(&self) -> &MetricWindow<f64> {
        &self.window
    }

    pub fn current(&self) -> Result<f64, NoData> {
        self.window.newest().copied()
    }

    /// Ladder scale for the plotted window.
    pub fn scale(&self) -> f64 {
        scale_factor(self.window.max().unwrap_or(0.0))
    }

    fn reset(&mut self) {
        self.window.clear();
        self.previous = None;
    }
}

/// Working-set memory history of one container, plotted as a share of its limit.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryView {
    window: MetricWindow<f64>,
    usage: Option<u64>,
    limit: u64,
}

impl MemoryView {
    pub fn new(width: usize) -> Self {
        Self {
            window: MetricWindow::for_width(width),
            usage: None,
            limit: 0,
        }
    }

    pub fn observe(&mut self, sample: &StatsSample) {
        let usage = calc::memory_usage(&sample.memory_stats);
        self.limit = sample.memory_stats.limit;
        self.usage = Some(usage);
        self.window.push(calc::percent_of(usage, self.limit));
    }

    /// Percentages of the limit, oldest to newest.
    pub fn window(&self) -> &MetricWindow<f64> {
        &self.window
    }

    /// Latest working-set usage in bytes.
    pub fn current(&self) -> Result<u64, NoData> {
        self.usage.ok_or(NoData)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn scale(&self) -> f64 {
        scale_factor(self.window.max().unwrap_or(0.0))
    }

    fn reset(&mut self) {
        self.window.clear();
        self.usage = None;
    }
}

/// Transfer rate history derived from one cumulative byte counter.
#[derive(Debug, Clone, PartialEq)]
pub struct RateView {
    window: MetricWindow<u64>,
    total: Option<u64>,
}

impl RateView {
    pub fn new(width: usize) -> Self {
        Self {
            window: MetricWindow::for_width(width),
            total: None,
        }
    }

    /// Records the counter's latest reading. A counter that went backwards
    /// yields no rate for this sample but becomes the new baseline.
    pub fn observe(&mut self, counter: u64) {
        if let Some(previous) = self.total {
            match calc::rate(counter, previous) {
                Some(rate) => self.window.push(rate),
                None => log::debug!("counter reset from {previous} to {counter}, sample skipped"),
            }
        }
        self.total = Some(counter);
    }

    /// Rates in bytes per sample interval, oldest to newest.
    pub fn window(&self) -> &MetricWindow<u64> {
        &self.window
    }

    /// The most recent rate.
    pub fn current(&self) -> Result<u64, NoData> {
        self.window.newest().copied()
    }

    /// The largest rate within the window.
    pub fn max(&self) -> Result<u64, NoData> {
        self.window.max()
    }

    /// The most recent raw counter value.
    pub fn total(&self) -> Result<u64, NoData> {
        self.total.ok_or(NoData)
    }

    /// Rates relative to the window's maximum, in percent.
    pub fn normalized(&self) -> Vec<f64> {
        let max = self.window.max().unwrap_or(0);
        self.window
            .iter()
            .map(|rate| calc::percent_of(*rate, max))
            .collect()
    }

    fn reset(&mut self) {
        self.window.clear();
        self.total = None;
    }
}

/// Plot widths in character columns, one per widget kind.
///
/// Network and I/O widgets show two plots side by side; their width is the
/// width of each half.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotWidths {
    pub cpu: usize,
    pub memory: usize,
    pub network: usize,
    pub io: usize,
}

impl Default for PlotWidths {
    fn default() -> Self {
        Self {
            cpu: 80,
            memory: 80,
            network: 40,
            io: 40,
        }
    }
}

/// Every metric view of one container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerMetrics {
    pub cpu: CpuView,
    pub memory: MemoryView,
    pub rx: RateView,
    pub tx: RateView,
    pub read: RateView,
    pub write: RateView,
}

impl ContainerMetrics {
    pub fn new(widths: PlotWidths) -> Self {
        Self {
            cpu: CpuView::new(widths.cpu),
            memory: MemoryView::new(widths.memory),
            rx: RateView::new(widths.network),
            tx: RateView::new(widths.network),
            read: RateView::new(widths.io),
            write: RateView::new(widths.io),
        }
    }

    /// Feeds a sample into every view. Samples of a container that is not in
    /// a sampling state clear the history instead.
    pub fn observe(&mut self, state: LifecycleState, sample: &StatsSample) {
        if !state.is_sampling() {
            self.reset();
            return;
        }

        self.cpu.observe(&sample.cpu_stats);
        self.memory.observe(sample);

        let (rx, tx) = sample.network_totals();
        self.rx.observe(rx);
        self.tx.observe(tx);

        let (read, write) = sample.blkio_totals();
        self.read.observe(read);
        self.write.observe(write);
    }

    pub fn resize(&mut self, widths: PlotWidths) {
        let capacity = |width: usize| width.saturating_mul(2);
        self.cpu.window.set_capacity(capacity(widths.cpu));
        self.memory.window.set_capacity(capacity(widths.memory));
        self.rx.window.set_capacity(capacity(widths.network));
        self.tx.window.set_capacity(capacity(widths.network));
        self.read.window.set_capacity(capacity(widths.io));
        self.write.window.set_capacity(capacity(widths.io));
    }

    fn reset(&mut self) {
        self.cpu.reset();
        self.memory.reset();
        self.rx.reset();
        self.tx.reset();
        self.read.reset();
        self.write.reset();
    }
}

/// Metric views of all tracked containers, keyed by container id.
///
/// Owned by the consumer loop, which applies every event in order.
#[derive(Debug, Default)]
pub struct MetricsStore {
    containers: HashMap<ContainerID, ContainerMetrics>,
    widths: PlotWidths,
}

impl MetricsStore {
    pub fn new(widths: PlotWidths) -> Self {
        Self {
            containers: HashMap::new(),
            widths,
        }
    }

    pub fn apply(&mut self, event: &ContainerEvent) {
        match event {
            ContainerEvent::Create { id } => {
                self.containers
                    .insert(id.clone(), ContainerMetrics::new(self.widths));
            }
            ContainerEvent::Update(update) => {
                let Some(metrics) = self.containers.get_mut(&update.id) else {
                    log::debug!("update for untracked container {}, ignored", update.id);
                    return;
                };
                let state = LifecycleState::from_status(&update.inspect.state.status);
                metrics.observe(state, &update.stats);
            }
            ContainerEvent::Remove { id } => {
                self.containers.remove(id);
            }
        }
    }

    /// Applies a layout change to every window.
    pub fn resize(&mut self, widths: PlotWidths) {
        if self.widths == widths {
            return;
        }
        self.widths = widths;
        for metrics in self.containers.values_mut() {
            metrics.resize(widths);
        }
    }

    pub fn widths(&self) -> PlotWidths {
        self.widths
    }

    pub fn get(&self, id: &ContainerID) -> Option<&ContainerMetrics> {
        self.containers.get(id)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::engine::{
        ContainerInspect, CpuUsage, InspectState, MemoryStats, NetworkCounters,
    };
    use crate::telemetry::ContainerUpdate;

    fn sample(total_usage: u64, system_cpu_usage: u64, rx_bytes: u64) -> StatsSample {
        StatsSample {
            cpu_stats: CpuStats {
                cpu_usage: CpuUsage { total_usage },
                system_cpu_usage,
                online_cpus: 2,
            },
            networks: Some(HashMap::from([(
                "eth0".to_owned(),
                NetworkCounters {
                    rx_bytes,
                    ..NetworkCounters::default()
                },
            )])),
            memory_stats: MemoryStats {
                usage: 300,
                limit: 1000,
                stats: Some(HashMap::from([("cache".to_owned(), 100)])),
            },
            ..StatsSample::default()
        }
    }

    fn update(id: &ContainerID, status: &str, stats: StatsSample) -> ContainerEvent {
        ContainerEvent::Update(Box::new(ContainerUpdate {
            id: id.clone(),
            inspect: ContainerInspect {
                state: InspectState {
                    status: status.to_owned(),
                    ..InspectState::default()
                },
                ..ContainerInspect::default()
            },
            stats,
            processes: Vec::new(),
        }))
    }

    #[test]
    fn test_scale_factor_ladder() {
        assert_eq!(scale_factor(0.0), 0.15);
        assert_eq!(scale_factor(14.99), 0.15);
        assert_eq!(scale_factor(44.0), 0.45);
        assert_eq!(scale_factor(74.9), 0.75);
        assert_eq!(scale_factor(75.0), 1.0);
        assert_eq!(scale_factor(250.0), 1.0);
    }

    #[test]
    fn test_cpu_first_sample_is_baseline() {
        let mut view = CpuView::new(10);
        view.observe(&sample(100, 1000, 0).cpu_stats);
        assert!(view.window().is_empty());
        assert_eq!(view.current(), Err(NoData));

        view.observe(&sample(150, 1100, 0).cpu_stats);
        assert_eq!(view.current(), Ok(100.0));
        assert_eq!(view.window().len(), 1);
    }

    #[test]
    fn test_cpu_counter_reset_pushes_no_sample() {
        let mut view = CpuView::new(10);
        view.observe(&sample(100, 1000, 0).cpu_stats);
        view.observe(&sample(150, 1100, 0).cpu_stats);
        view.observe(&sample(10, 1200, 0).cpu_stats);
        assert_eq!(view.window().to_vec(), vec![100.0]);

        // the reset sample is the new baseline
        view.observe(&sample(60, 1300, 0).cpu_stats);
        assert_eq!(view.window().to_vec(), vec![100.0, 100.0]);
    }

    #[test]
    fn test_rate_view_scenario() {
        let mut view = RateView::new(10);
        for counter in [1000, 1500, 1500, 2400] {
            view.observe(counter);
        }
        assert_eq!(view.window().to_vec(), vec![500, 0, 900]);
        assert_eq!(view.current(), Ok(900));
        assert_eq!(view.max(), Ok(900));
        assert_eq!(view.total(), Ok(2400));
    }

    #[test]
    fn test_rate_view_max_is_non_decreasing_within_window() {
        let mut view = RateView::new(10);
        let mut last_max = 0;
        for counter in [0, 10, 15, 40, 41, 41, 90] {
            view.observe(counter);
            if let Ok(max) = view.max() {
                assert!(max >= last_max);
                last_max = max;
            }
        }
        assert_eq!(last_max, 49);
    }

    #[test]
    fn test_rate_view_counter_reset_skips_sample() {
        let mut view = RateView::new(10);
        for counter in [1000, 1500, 200, 700] {
            view.observe(counter);
        }
        assert_eq!(view.window().to_vec(), vec![500, 500]);
        assert_eq!(view.total(), Ok(700));
    }

    #[test]
    fn test_rate_view_normalized() {
        let mut view = RateView::new(10);
        for counter in [0, 50, 50, 250] {
            view.observe(counter);
        }
        assert_eq!(view.normalized(), vec![25.0, 0.0, 100.0]);

        let mut idle = RateView::new(10);
        idle.observe(5);
        idle.observe(5);
        assert_eq!(idle.normalized(), vec![0.0]);
    }

    #[test]
    fn test_memory_view_percent_of_limit() {
        let mut view = MemoryView::new(10);
        view.observe(&sample(0, 0, 0));
        assert_eq!(view.current(), Ok(200));
        assert_eq!(view.limit(), 1000);
        assert_eq!(view.window().to_vec(), vec![20.0]);
        assert_eq!(view.scale(), 0.25);
    }

    #[test]
    fn test_store_lifecycle() {
        let id = ContainerID::new("abc").unwrap();
        let mut store = MetricsStore::new(PlotWidths::default());

        store.apply(&ContainerEvent::Create { id: id.clone() });
        store.apply(&update(&id, "running", sample(100, 1000, 1000)));
        store.apply(&update(&id, "running", sample(150, 1100, 1500)));

        let metrics = store.get(&id).unwrap();
        assert_eq!(metrics.cpu.current(), Ok(100.0));
        assert_eq!(metrics.rx.current(), Ok(500));

        store.apply(&ContainerEvent::Remove { id: id.clone() });
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_ignores_update_without_create() {
        let id = ContainerID::new("abc").unwrap();
        let mut store = MetricsStore::new(PlotWidths::default());
        store.apply(&update(&id, "running", sample(100, 1000, 0)));
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());

        store.apply(&ContainerEvent::Create { id: id.clone() });
        store.apply(&ContainerEvent::Remove { id: id.clone() });
        store.apply(&update(&id, "running", sample(150, 1100, 0)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_exited_clears_history() {
        let id = ContainerID::new("abc").unwrap();
        let mut store = MetricsStore::new(PlotWidths::default());
        store.apply(&ContainerEvent::Create { id: id.clone() });
        store.apply(&update(&id, "running", sample(100, 1000, 0)));
        store.apply(&update(&id, "running", sample(150, 1100, 0)));
        store.apply(&update(&id, "exited", sample(150, 1200, 0)));

        let metrics = store.get(&id).unwrap();
        assert!(metrics.cpu.window().is_empty());
        assert_eq!(metrics.memory.current(), Err(NoData));

        store.apply(&update(&id, "running", sample(200, 1300, 0)));
        assert!(store.get(&id).unwrap().cpu.window().is_empty());
    }

    #[test]
    fn test_store_resize_truncates_windows() {
        let id = ContainerID::new("abc").unwrap();
        let mut store = MetricsStore::new(PlotWidths {
            cpu: 10,
            memory: 10,
            network: 10,
            io: 10,
        });
        store.apply(&ContainerEvent::Create { id: id.clone() });
        for step in 0..20 {
            store.apply(&update(&id, "running", sample(step * 10, step * 100, step)));
        }
        assert_eq!(store.get(&id).unwrap().cpu.window().len(), 19);

        store.resize(PlotWidths {
            cpu: 3,
            memory: 2,
            network: 1,
            io: 1,
        });
        let metrics = store.get(&id).unwrap();
        assert_eq!(metrics.cpu.window().len(), 6);
        assert_eq!(metrics.memory.window().len(), 4);
        assert_eq!(metrics.rx.window().len(), 2);
        assert_eq!(metrics.write.window().capacity(), 2);
    }
}
