//! Derived metrics and the bounded per-container histories they are kept in.
mod calc;
mod format;
mod views;
mod window;

pub use calc::{cpu_percent, memory_usage, percent_of, rate};
pub use format::humanize_bytes;
pub use views::{
    ContainerMetrics, CpuView, MemoryView, MetricsStore, PlotWidths, RateView, SCALE_LADDER,
    scale_factor,
};
pub use window::{MetricWindow, NoData};
