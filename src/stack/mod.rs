//! The stack being watched, as declared by its compose file.
mod error;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use error::{Error, Result};

use crate::engine::{ContainerSummary, ListFilter};

/// Label the engine puts on every container created for a compose project.
pub const PROJECT_LABEL: &str = "com.docker.compose.project";

/// A service entry of the compose file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServiceSpec {
    pub container_name: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ComposeFile {
    services: BTreeMap<String, ServiceSpec>,
}

/// A compose service that currently has no container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePlaceholder {
    pub service: String,
    pub name: String,
    pub image: String,
}

/// Stack name and service table, immutable once loaded.
///
/// The name is the directory holding the compose file, the same name the
/// compose tooling uses for the project unless told otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescriptor {
    name: String,
    path: PathBuf,
    services: BTreeMap<String, ServiceSpec>,
}

impl StackDescriptor {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let read_error = |source| Error::Read {
            path: path.to_path_buf(),
            source,
        };
        let contents = std::fs::read_to_string(path).map_err(read_error)?;
        let path = std::fs::canonicalize(path).map_err(read_error)?;

        let name = path
            .parent()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::NoStackName(path.clone()))?
            .to_owned();

        let mut descriptor = Self::parse(name, &contents).map_err(|source| Error::Parse {
            path: path.clone(),
            source,
        })?;
        descriptor.path = path;

        log::info!(
            "loaded stack `{}` with {} services from {}",
            descriptor.name,
            descriptor.services.len(),
            descriptor.path.display()
        );
        Ok(descriptor)
    }

    /// Builds a descriptor from compose YAML for a stack called `name`.
    pub fn parse(
        name: impl Into<String>,
        yaml: &str,
    ) -> std::result::Result<Self, serde_yaml::Error> {
        // An empty document deserializes to unit, not to a map.
        let compose: ComposeFile = if yaml.trim().is_empty() {
            ComposeFile::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        Ok(Self {
            name: name.into(),
            path: PathBuf::new(),
            services: compose.services,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn services(&self) -> &BTreeMap<String, ServiceSpec> {
        &self.services
    }

    /// Engine-side filter selecting containers labelled with this stack.
    pub fn label_filter(&self) -> ListFilter {
        ListFilter::Label {
            key: PROJECT_LABEL.to_owned(),
            value: self.name.clone(),
        }
    }

    /// Decides membership of a container the label filter did not return.
    ///
    /// A project label is authoritative when present. Otherwise the name is
    /// split on `-`: a leading part equal to the stack name or a remainder
    /// equal to a service key counts as a match, as does a name equal to a
    /// declared `container_name`.
    pub fn matches(&self, container: &ContainerSummary) -> bool {
        if let Some(project) = container.label(PROJECT_LABEL) {
            return project == self.name;
        }

        let name = container.primary_name();
        if name.is_empty() {
            return false;
        }

        if let Some((prefix, rest)) = name.split_once('-') {
            if prefix == self.name || self.services.contains_key(rest) {
                return true;
            }
        }

        self.services
            .values()
            .any(|service| service.container_name.as_deref() == Some(name))
    }

    /// Shortens a container name for display: no leading `/` and no `<stack>-` prefix.
    pub fn display_name<'a>(&self, name: &'a str) -> &'a str {
        let name = name.trim_start_matches('/');
        name.strip_prefix(self.name.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .filter(|rest| !rest.is_empty())
            .unwrap_or(name)
    }

    /// The container name a service is expected to run under.
    pub fn expected_name(&self, key: &str) -> String {
        self.services
            .get(key)
            .and_then(|service| service.container_name.clone())
            .unwrap_or_else(|| format!("{}-{key}", self.name))
    }

    /// Services with no container among `live_names`.
    ///
    /// A service counts as live when a name equals its expected name or is a
    /// numbered replica of it (`<expected>-<n>`).
    pub fn placeholders<'a>(
        &self,
        live_names: impl IntoIterator<Item = &'a str> + Clone,
    ) -> Vec<ServicePlaceholder> {
        self.services
            .iter()
            .filter_map(|(key, service)| {
                let expected = self.expected_name(key);
                let live = live_names.clone().into_iter().any(|name| {
                    let name = name.trim_start_matches('/');
                    name == expected
                        || name
                            .strip_prefix(expected.as_str())
                            .and_then(|rest| rest.strip_prefix('-'))
                            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
                });
                (!live).then(|| ServicePlaceholder {
                    service: key.clone(),
                    name: expected,
                    image: service.image.clone().unwrap_or_default(),
                })
            })
            .collect()
    }
}
