//! Error taxonomy for the core components
//!
//! Only hook installation and config saving surface to callers as failures.
//! Load problems degrade to defaults and out-of-range indices are ignored,
//! so neither has a variant here.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to install the system-wide key observer
#[derive(Debug, Error)]
pub enum HotkeyError {
    #[error("failed to install keyboard hook: {0}")]
    HookInstall(String),

    #[error("cannot access input devices in {path} (are you in the '{group}' group?)")]
    Permission { path: String, group: String },
}

/// Failure to push a ramp to a display
#[derive(Debug, Error)]
pub enum GammaError {
    #[error("failed to open display '{0}'")]
    OpenDevice(String),

    /// The driver refused the ramp, usually because the values are too extreme
    #[error("display '{0}' rejected the gamma ramp")]
    Rejected(String),

    #[error("display '{0}' is no longer attached")]
    UnknownDisplay(String),
}

/// Failure to persist the configuration
///
/// The previous live file is untouched in every case; the staging file is
/// left on disk so its contents can be recovered by hand.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to write staging file {path}: {source}")]
    WriteTemp {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to replace {live} with {temp}: {source}")]
    Replace {
        temp: PathBuf,
        live: PathBuf,
        #[source]
        source: io::Error,
    },
}
