//! Error taxonomy for kernel maintenance.
//!
//! Each component owns one enum. Cleanup failures are not errors in this
//! sense: they are collected into a [`crate::cleanup::CleanupReport`]
//! instead of being raised.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::process::CommandFailure;
use crate::update::UpdateReport;
use crate::version::KernelVersion;

/// A kernel directory name that does not follow `linux-X.Y.Z[-gentoo][-rN]`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse kernel version from '{name}': {reason}")]
pub struct ParseVersionError {
    pub name: String,
    pub reason: String,
}

impl ParseVersionError {
    pub(crate) fn new(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while inspecting the kernel sources root.
#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("no selected kernel: symbolic link '{}' does not exist", .link.display())]
    SelectedLinkMissing { link: PathBuf },

    #[error("cannot read symbolic link '{}': {source}", .link.display())]
    SelectedLinkUnreadable {
        link: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot list kernel directory '{}': {source}", .path.display())]
    ListDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseVersionError),

    #[error("selected kernel version {version} is not among the installed kernel sources")]
    SelectedNotInstalled { version: KernelVersion },
}

/// Errors raised while choosing the `.config` used to seed the build.
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("no kernel directory under '{}' has a .config to copy from", .root.display())]
    NoCandidates { root: PathBuf },

    #[error("invalid choice '{input}': expected a number")]
    InvalidChoice { input: String },

    #[error("choice {index} is out of range: expected 0 to {}", .len - 1)]
    OutOfRange { index: usize, len: usize },

    #[error("reading choice failed: {0}")]
    Prompt(#[from] io::Error),

    #[error(transparent)]
    Parse(#[from] ParseVersionError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),
}

/// Errors that stop the update sequence.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error("copying '{}' to '{}' failed: {source}", .from.display(), .to.display())]
    SeedConfig {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A command failed under [`crate::update::FailurePolicy::Halt`].
    /// `report` holds everything recorded before the halt.
    #[error("update halted at {}: {failure}", .report.reached)]
    CommandFailed {
        failure: CommandFailure,
        report: Box<UpdateReport>,
    },
}
