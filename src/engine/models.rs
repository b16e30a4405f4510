//! Wire models for the subset of the engine API the dashboard consumes.
//!
//! All models ignore unknown fields and default missing ones, so engine
//! versions that add or drop fields still decode. Counter fields of
//! [`StatsSample`] are kept verbatim as the engine reports them, the derived
//! metrics in [`crate::metrics`] are computed from these raw values.

use std::collections::HashMap;

use serde::Deserialize;

use crate::container::Process;

/// One entry of `GET /containers/json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
    pub status: String,
    pub labels: Option<HashMap<String, String>>,
}

impl ContainerSummary {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.as_ref()?.get(key).map(String::as_str)
    }

    /// The first listed name, without the engine's leading `/`.
    pub fn primary_name(&self) -> &str {
        self.names
            .first()
            .map(|name| name.trim_start_matches('/'))
            .unwrap_or_default()
    }
}

/// Response of `GET /containers/{id}/json`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerInspect {
    #[serde(rename = "Id")]
    pub id: String,
    pub name: String,
    pub state: InspectState,
    pub config: InspectConfig,
    pub network_settings: NetworkSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InspectState {
    pub status: String,
    pub running: bool,
    pub paused: bool,
    pub exit_code: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InspectConfig {
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkSettings {
    pub networks: Option<HashMap<String, EndpointSettings>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EndpointSettings {
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
}

impl ContainerInspect {
    /// Non-empty IP addresses of all attached networks, sorted by network name.
    pub fn addresses(&self) -> Vec<String> {
        let Some(networks) = self.network_settings.networks.as_ref() else {
            return Vec::new();
        };
        let mut named: Vec<(&String, &EndpointSettings)> = networks.iter().collect();
        named.sort_by(|a, b| a.0.cmp(b.0));
        named
            .into_iter()
            .filter(|(_, endpoint)| !endpoint.ip_address.is_empty())
            .map(|(_, endpoint)| endpoint.ip_address.clone())
            .collect()
    }
}

/// Response of `GET /containers/{id}/top`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TopResponse {
    pub titles: Vec<String>,
    pub processes: Option<Vec<Vec<String>>>,
}

impl TopResponse {
    /// Maps the rows onto [`Process`] by column title. Missing columns become empty strings.
    pub fn into_processes(self) -> Vec<Process> {
        let column = |name: &str| self.titles.iter().position(|title| title == name);
        let pid = column("PID");
        let ppid = column("PPID");
        let threads = column("THCNT");
        let rss = column("RSS");
        let cpu = column("%CPU");
        let cmd = column("CMD").or_else(|| column("COMMAND"));

        let cell = |row: &[String], idx: Option<usize>| {
            idx.and_then(|i| row.get(i)).cloned().unwrap_or_default()
        };

        self.processes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|row| Process {
                pid: cell(row, pid),
                ppid: cell(row, ppid),
                threads: cell(row, threads),
                rss: cell(row, rss),
                cpu: cell(row, cpu),
                cmd: cell(row, cmd),
            })
            .collect()
    }
}

/// One object of the streaming `GET /containers/{id}/stats` response.
///
/// All counters are cumulative since the container started.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StatsSample {
    pub read: String,
    pub pids_stats: PidsStats,
    pub networks: Option<HashMap<String, NetworkCounters>>,
    pub memory_stats: MemoryStats,
    pub blkio_stats: BlkioStats,
    pub cpu_stats: CpuStats,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PidsStats {
    pub current: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NetworkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub usage: u64,
    pub limit: u64,
    pub stats: Option<HashMap<String, u64>>,
}

impl MemoryStats {
    /// Page cache as reported by the engine. cgroup v2 hosts report no `cache`
    /// key, `inactive_file` is used there instead.
    pub fn cache(&self) -> u64 {
        let Some(stats) = self.stats.as_ref() else {
            return 0;
        };
        stats
            .get("cache")
            .or_else(|| stats.get("inactive_file"))
            .copied()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlkioStats {
    pub io_service_bytes_recursive: Option<Vec<BlkioEntry>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlkioEntry {
    pub major: u64,
    pub minor: u64,
    pub op: String,
    pub value: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    pub cpu_usage: CpuUsage,
    pub system_cpu_usage: u64,
    pub online_cpus: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    pub total_usage: u64,
}

impl StatsSample {
    /// Cumulative received and transmitted bytes, summed over all interfaces.
    pub fn network_totals(&self) -> (u64, u64) {
        self.networks
            .iter()
            .flat_map(|networks| networks.values())
            .fold((0, 0), |(rx, tx), iface| {
                (
                    rx.saturating_add(iface.rx_bytes),
                    tx.saturating_add(iface.tx_bytes),
                )
            })
    }

    /// Cumulative read and written block I/O bytes, summed over all devices.
    pub fn blkio_totals(&self) -> (u64, u64) {
        self.blkio_stats
            .io_service_bytes_recursive
            .iter()
            .flatten()
            .fold((0, 0), |(read, write), entry| {
                if entry.op.eq_ignore_ascii_case("read") {
                    (read.saturating_add(entry.value), write)
                } else if entry.op.eq_ignore_ascii_case("write") {
                    (read, write.saturating_add(entry.value))
                } else {
                    (read, write)
                }
            })
    }
}

/// Output stream a log line was written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdin,
    Stdout,
    Stderr,
}

impl LogSource {
    /// Maps the stream byte of a multiplexed frame header.
    pub fn from_header(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            _ => None,
        }
    }
}

/// One line of container output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub source: LogSource,
    pub text: String,
}

impl LogLine {
    pub(crate) fn new(source: LogSource, raw: &[u8]) -> Self {
        Self {
            source,
            text: String::from_utf8_lossy(raw)
                .trim_end_matches(['\n', '\r'])
                .to_owned(),
        }
    }
}
