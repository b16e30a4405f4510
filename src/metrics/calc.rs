//! Derived metrics computed from two raw counter snapshots of the same container.
//!
//! Every function here is pure: the result depends only on the arguments.

use crate::engine::{CpuStats, MemoryStats};

/// CPU usage in percent between two consecutive samples.
///
/// `(cpu_delta / system_delta) * online_cpus * 100`. Returns `Some(0.0)` when
/// either delta is zero and `None` when either counter went backwards: a reset
/// counter says nothing about usage since the previous sample.
///
/// # Examples
///
/// ```
/// # use stackscope::engine::{CpuStats, CpuUsage};
/// # use stackscope::metrics::cpu_percent;
/// let previous = CpuStats { cpu_usage: CpuUsage { total_usage: 100 }, system_cpu_usage: 1000, online_cpus: 2 };
/// let current = CpuStats { cpu_usage: CpuUsage { total_usage: 150 }, system_cpu_usage: 1100, online_cpus: 2 };
/// assert_eq!(cpu_percent(&current, &previous), Some(100.0));
/// assert_eq!(cpu_percent(&previous, &current), None);
/// ```
pub fn cpu_percent(current: &CpuStats, previous: &CpuStats) -> Option<f64> {
    let cpu_delta = rate(current.cpu_usage.total_usage, previous.cpu_usage.total_usage)?;
    let system_delta = rate(current.system_cpu_usage, previous.system_cpu_usage)?;

    if cpu_delta == 0 || system_delta == 0 {
        return Some(0.0);
    }

    Some((cpu_delta as f64 / system_delta as f64) * f64::from(current.online_cpus) * 100.0)
}

/// Working-set memory: usage minus page cache, never below zero.
pub fn memory_usage(stats: &MemoryStats) -> u64 {
    stats.usage.saturating_sub(stats.cache())
}

/// Bytes transferred between two readings of a cumulative counter.
///
/// Returns `None` when the counter went backwards, i.e. the counter was reset
/// and the delta carries no information.
pub fn rate(current: u64, previous: u64) -> Option<u64> {
    current.checked_sub(previous)
}

/// Share of `value` in `total` as a percentage, `0.0` for an unknown total.
pub fn percent_of(value: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    value as f64 / total as f64 * 100.0
}
