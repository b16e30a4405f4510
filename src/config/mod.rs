//! Command line and the optional YAML configuration file.
mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

pub use error::{Error, Result};

use crate::engine::DockerEngine;
use crate::plot::{ColorGradient, Rgba};

/// Live dashboard for the containers of one compose stack.
#[derive(Debug, Clone, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Compose file declaring the stack.
    pub compose_file: PathBuf,

    /// Configuration file, defaults to `<config dir>/stackscope/config.yaml`.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Engine socket, defaults to the `unix://` path of `DOCKER_HOST`.
    #[arg(short, long)]
    pub socket: Option<PathBuf>,

    #[arg(long, env = "DOCKER_HOST", hide = true)]
    docker_host: Option<String>,
}

impl Cli {
    pub fn socket(&self) -> PathBuf {
        self.socket
            .clone()
            .unwrap_or_else(|| DockerEngine::socket_from_host(self.docker_host.as_deref()))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "error".to_owned(),
            file: PathBuf::from("stackscope.log"),
        }
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        self.level
            .parse()
            .map_err(|_| Error::InvalidLogLevel(self.level.clone()))
    }
}

/// Heights, in rows, of the dashboard tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub containers_list_height: u16,
    pub processes_list_height: u16,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            containers_list_height: 10,
            processes_list_height: 10,
        }
    }
}

/// One gradient per plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub cpu: ColorGradient,
    pub memory: ColorGradient,
    pub network: ColorGradient,
    pub io: ColorGradient,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            cpu: ColorGradient::new(Rgba::rgb(0xa3, 0xbe, 0x8c), Rgba::rgb(0xbf, 0x61, 0x6a)),
            memory: ColorGradient::new(Rgba::rgb(0x88, 0xc0, 0xd0), Rgba::rgb(0x5e, 0x81, 0xac)),
            network: ColorGradient::new(Rgba::rgb(0xb4, 0x8e, 0xad), Rgba::rgb(0xd0, 0x87, 0x70)),
            io: ColorGradient::new(Rgba::rgb(0xeb, 0xcb, 0x8b), Rgba::rgb(0xd0, 0x87, 0x70)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogConfig,
    pub reconcile_interval_ms: u64,
    pub event_buffer: usize,
    pub frame_interval_ms: u64,
    pub layout: Layout,
    pub theme: Theme,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            reconcile_interval_ms: 2000,
            event_buffer: 100,
            frame_interval_ms: 250,
            layout: Layout::default(),
            theme: Theme::default(),
        }
    }
}

impl Config {
    /// Location looked at when no file is given on the command line.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stackscope").join("config.yaml"))
    }

    /// Loads `explicit`, or the default location when `None`.
    ///
    /// A missing default file yields the defaults, a missing explicit file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(Error::Read { path, source }),
        };

        Self::parse(&contents).map_err(|err| match err {
            Error::Parse { source, .. } => Error::Parse { path, source },
            other => other,
        })
    }

    pub fn parse(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|source| Error::Parse {
                path: PathBuf::new(),
                source,
            })?
        };
        config.log.level_filter()?;
        Ok(config)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms.max(1))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}
