//! Crate error type

use std::io;
use std::path::PathBuf;

/// Errors surfaced by the device layer and the registry
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Opening a device node failed (permissions, hotplug race, revoked node).
    ///
    /// Never fatal: discovery skips the entry and hotplug retries it.
    #[error("device {path:?} unavailable: {source}")]
    DeviceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read returned a byte count that is neither 0 nor a whole record
    #[error("malformed event record ({len} bytes)")]
    MalformedRecord { len: usize },

    /// The filesystem watch on the discovery root could not be set up
    #[error("cannot watch device directory: {0}")]
    WatchSetupFailed(#[from] notify::Error),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
