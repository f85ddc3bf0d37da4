//! The kernel update sequence.
//!
//! ```text
//! SeedConfig → Build → Install → GenerateInitramfs → RebuildDrivers → Cleanup → RefreshBootloader → Done
//! ```
//!
//! Every external command goes through the injected [`CommandRunner`].
//! Under [`FailurePolicy::Continue`] a failed command is recorded and the
//! sequence moves on; under [`FailurePolicy::Halt`] it stops there.
//!
//! # Example
//!
//! ```rust,ignore
//! use kernel_updater::process::SystemRunner;
//! use kernel_updater::update::KernelUpdater;
//!
//! let updater = KernelUpdater::new(settings, selected, chosen_config, SystemRunner);
//! let report = updater.update()?;
//! ```

mod stage;

pub use stage::{FailurePolicy, UpdateStage};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cleanup::{CleanupEngine, CleanupReport};
use crate::error::{InventoryError, UpdateError};
use crate::inventory::{KernelInventory, SelectedKernel};
use crate::process::{self, Cmd, CommandFailure, CommandRunner};
use crate::settings::Settings;
use crate::version::KernelVersion;

/// Build tool driving the kernel's own Makefile.
const MAKE: &str = "make";

/// Bootloader config generator.
const GRUB_MKCONFIG: &str = "grub-mkconfig";

/// One command a stage runs, with an optional progress comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub argv: Vec<String>,
    pub comment: Option<&'static str>,
}

impl StageCommand {
    fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            comment: None,
        }
    }

    fn with_comment(mut self, comment: &'static str) -> Self {
        self.comment = Some(comment);
        self
    }
}

impl From<Cmd> for StageCommand {
    fn from(cmd: Cmd) -> Self {
        Self::new(cmd.argv())
    }
}

/// Outcome of an update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    /// Last stage entered. [`UpdateStage::Done`] after a full run.
    pub reached: UpdateStage,
    /// Commands that failed under [`FailurePolicy::Continue`].
    pub command_failures: Vec<CommandFailure>,
    pub cleanup: CleanupReport,
}

impl UpdateReport {
    fn new() -> Self {
        Self {
            reached: UpdateStage::SeedConfig,
            command_failures: Vec::new(),
            cleanup: CleanupReport::default(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.command_failures.is_empty() && self.cleanup.is_clean()
    }
}

/// Builds, installs and cleans up after the selected kernel.
pub struct KernelUpdater<R: CommandRunner> {
    settings: Settings,
    selected: SelectedKernel,
    config_file: PathBuf,
    runner: R,
    jobs: usize,
}

impl<R: CommandRunner> KernelUpdater<R> {
    /// `config_file` is copied into the selected sources before building.
    pub fn new(
        settings: Settings,
        selected: SelectedKernel,
        config_file: impl Into<PathBuf>,
        runner: R,
    ) -> Self {
        Self {
            settings,
            selected,
            config_file: config_file.into(),
            runner,
            jobs: default_jobs(),
        }
    }

    /// Override the `make -j` parallelism.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Run every stage in order.
    ///
    /// Retention is checked before anything is touched, so a malformed
    /// kernel directory or a selected kernel missing from the inventory
    /// aborts with nothing built and nothing deleted.
    pub fn update(&self) -> Result<UpdateReport, UpdateError> {
        let selected_version = self.selected_version()?;
        let inventory = KernelInventory::new(&self.settings.kernel_root);
        let planned = inventory.obsolete_versions(&selected_version)?;
        debug!("{} kernel version(s) currently obsolete", planned.len());

        let mut report = UpdateReport::new();
        let mut stage = Some(UpdateStage::SeedConfig);
        while let Some(current) = stage {
            report.reached = current;
            debug!("entering stage {current}");
            self.run_stage(current, &selected_version, &inventory, &mut report)?;
            stage = current.next();
        }

        if !report.is_clean() {
            warn!(
                "update finished with {} failed command(s) and {} cleanup failure(s)",
                report.command_failures.len(),
                report.cleanup.failures.len()
            );
        }
        Ok(report)
    }

    /// The external commands `stage` runs, in order.
    pub fn stage_commands(&self, stage: UpdateStage) -> Vec<StageCommand> {
        let source_dir = self.selected.dir().to_string_lossy().into_owned();
        let make = || Cmd::new(MAKE).args(["-C", source_dir.as_str()]);
        match stage {
            UpdateStage::Build => vec![StageCommand::from(
                Cmd::new(MAKE)
                    .arg(format!("-j{}", self.jobs))
                    .args(["-C", source_dir.as_str()]),
            )],
            UpdateStage::Install => {
                let install = StageCommand::from(make().arg("install"));
                vec![
                    install.clone(),
                    install.with_comment("to get .old files created"),
                    StageCommand::from(make().arg("modules_install")),
                ]
            }
            UpdateStage::GenerateInitramfs => {
                vec![StageCommand::new(self.settings.initramfs_command.clone())]
            }
            UpdateStage::RebuildDrivers => {
                vec![StageCommand::new(self.settings.driver_rebuild_command.clone())]
            }
            UpdateStage::RefreshBootloader => {
                let config = self.settings.bootloader_config_path();
                vec![StageCommand::from(
                    Cmd::new(GRUB_MKCONFIG).arg("-o").arg(config.to_string_lossy()),
                )]
            }
            UpdateStage::SeedConfig | UpdateStage::Cleanup | UpdateStage::Done => Vec::new(),
        }
    }

    fn run_stage(
        &self,
        stage: UpdateStage,
        selected_version: &KernelVersion,
        inventory: &KernelInventory,
        report: &mut UpdateReport,
    ) -> Result<(), UpdateError> {
        match stage {
            UpdateStage::SeedConfig => self.seed_config(),
            UpdateStage::Cleanup => {
                let obsolete = inventory.obsolete_versions(selected_version)?;
                if obsolete.is_empty() {
                    info!("no obsolete kernels to clean up");
                }
                report.cleanup = CleanupEngine::new(&self.settings, &self.runner).clean(&obsolete);
                Ok(())
            }
            UpdateStage::Done => {
                info!("You can safely reboot now! Thanks for using kernel-updater");
                Ok(())
            }
            _ => {
                for command in self.stage_commands(stage) {
                    self.run_command(&command, report)?;
                }
                Ok(())
            }
        }
    }

    fn run_command(&self, command: &StageCommand, report: &mut UpdateReport) -> Result<(), UpdateError> {
        match process::execute(&self.runner, &command.argv, command.comment) {
            Ok(()) => Ok(()),
            Err(failure) => match self.settings.on_failure {
                FailurePolicy::Continue => {
                    report.command_failures.push(failure);
                    Ok(())
                }
                FailurePolicy::Halt => Err(UpdateError::CommandFailed {
                    failure,
                    report: Box::new(report.clone()),
                }),
            },
        }
    }

    fn seed_config(&self) -> Result<(), UpdateError> {
        let destination = self.selected.config_path();
        info!(
            "Copying {} to {}",
            self.config_file.display(),
            destination.display()
        );
        copy_config(&self.config_file, &destination)
    }

    fn selected_version(&self) -> Result<KernelVersion, InventoryError> {
        Ok(self.selected.version()?)
    }
}

fn copy_config(from: &Path, to: &Path) -> Result<(), UpdateError> {
    fs::copy(from, to)
        .map(|_| ())
        .map_err(|source| UpdateError::SeedConfig {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        })
}

/// CPU count plus one, the customary `make -j` value for kernel builds.
fn default_jobs() -> usize {
    let cpus = match std::thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            warn!("could not detect CPU count ({}), assuming 4", e);
            4
        }
    };
    cpus + 1
}
