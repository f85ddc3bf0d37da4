//! Update stages and the policy for failed commands.

use serde::Deserialize;
use std::fmt;

/// Stages of a kernel update, in execution order.
///
/// Each stage depends on filesystem state left by the previous one
/// (modules must be installed before drivers are rebuilt against them), so
/// they never run concurrently or out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum UpdateStage {
    /// Copy the chosen `.config` into the selected sources.
    SeedConfig = 1,
    /// `make -jN`.
    Build = 2,
    /// `make install` twice, then `make modules_install`.
    Install = 3,
    GenerateInitramfs = 4,
    /// Rebuild out-of-tree modules against the new kernel.
    RebuildDrivers = 5,
    /// Remove obsolete kernels.
    Cleanup = 6,
    RefreshBootloader = 7,
    Done = 8,
}

impl UpdateStage {
    /// The stage that follows this one; `None` after [`UpdateStage::Done`].
    pub fn next(self) -> Option<UpdateStage> {
        match self {
            UpdateStage::SeedConfig => Some(UpdateStage::Build),
            UpdateStage::Build => Some(UpdateStage::Install),
            UpdateStage::Install => Some(UpdateStage::GenerateInitramfs),
            UpdateStage::GenerateInitramfs => Some(UpdateStage::RebuildDrivers),
            UpdateStage::RebuildDrivers => Some(UpdateStage::Cleanup),
            UpdateStage::Cleanup => Some(UpdateStage::RefreshBootloader),
            UpdateStage::RefreshBootloader => Some(UpdateStage::Done),
            UpdateStage::Done => None,
        }
    }
}

impl fmt::Display for UpdateStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStage::SeedConfig => write!(f, "SeedConfig"),
            UpdateStage::Build => write!(f, "Build"),
            UpdateStage::Install => write!(f, "Install"),
            UpdateStage::GenerateInitramfs => write!(f, "GenerateInitramfs"),
            UpdateStage::RebuildDrivers => write!(f, "RebuildDrivers"),
            UpdateStage::Cleanup => write!(f, "Cleanup"),
            UpdateStage::RefreshBootloader => write!(f, "RefreshBootloader"),
            UpdateStage::Done => write!(f, "Done"),
        }
    }
}

/// What to do when an external command fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Log and record the failure, then run the next command.
    #[default]
    Continue,
    /// Stop the update at the first failed command.
    Halt,
}
