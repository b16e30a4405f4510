use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

mod error;
mod record;
mod state;

pub use error::{Error, Result};
pub use record::{ContainerRecord, Process};
pub use state::LifecycleState;

/// The maximum allowed length for a [`ContainerID`].
const CONTAINER_ID_MAX_LEN: usize = 255;

/// A validated container identifier as handed out by the engine.
///
/// Cloning is cheap, the id is shared behind an [`Arc`]. Every event, view and
/// subscription handle is keyed by this type.
///
/// # Examples
///
/// ```
/// # use stackscope::container::ContainerID;
/// let id = ContainerID::new("4f2a9c1b7d3e").unwrap();
/// assert_eq!(id.as_ref(), "4f2a9c1b7d3e");
/// assert_eq!(id.short(), "4f2a9c1b7d3e");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerID(Arc<str>);

impl ContainerID {
    /// Creates a new `ContainerID` from the given raw id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidContainerID`] if the input is empty, exceeds
    /// [`CONTAINER_ID_MAX_LEN`] or contains characters that cannot be used in
    /// an engine API path.
    pub fn new(src: impl AsRef<str>) -> Result<Self> {
        let src = src.as_ref();
        if src.is_empty()
            || src.len() > CONTAINER_ID_MAX_LEN
            || !src
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
        {
            return Err(Error::InvalidContainerID(src.to_owned()));
        }

        Ok(Self(src.into()))
    }

    /// The 12 character prefix the engine CLI shows.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl AsRef<str> for ContainerID {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ContainerID {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ContainerID {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::new(s)
    }
}
