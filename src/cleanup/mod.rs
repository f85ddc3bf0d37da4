//! Removal of obsolete kernel installations.
//!
//! One kernel version lives in four places:
//!
//! - the sources package in the package manager database
//! - `<modules_root>/<suffix>/`
//! - `<kernel_root>/linux-<suffix>/`
//! - `<boot_root>/*<suffix>*` (image, System.map, config, initramfs, `.old` copies)
//!
//! Each removal is attempted independently. A failure is recorded in the
//! [`CleanupReport`] and the remaining removals still run, so an interrupted
//! cleanup can simply be run again.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::process::{self, Cmd, CommandRunner};
use crate::settings::Settings;
use crate::version::KernelVersion;

/// Package manager used to unmerge kernel sources.
const PACKAGE_MANAGER: &str = "emerge";

/// One removal attempted for an obsolete version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// Unmerge the exact-version sources package.
    UnmergePackage(String),
    RemoveModules(PathBuf),
    RemoveSources(PathBuf),
    /// Listing the boot directory itself.
    ScanBoot(PathBuf),
    RemoveBootFile(PathBuf),
}

impl fmt::Display for CleanupAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupAction::UnmergePackage(atom) => write!(f, "unmerge {atom}"),
            CleanupAction::RemoveModules(path) => write!(f, "remove modules {}", path.display()),
            CleanupAction::RemoveSources(path) => write!(f, "remove sources {}", path.display()),
            CleanupAction::ScanBoot(path) => write!(f, "scan boot directory {}", path.display()),
            CleanupAction::RemoveBootFile(path) => write!(f, "remove {}", path.display()),
        }
    }
}

/// A removal that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub version: KernelVersion,
    pub action: CleanupAction,
    pub reason: String,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} failed: {}", self.version, self.action, self.reason)
    }
}

/// Outcome of cleaning a set of versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Versions processed, oldest first.
    pub versions: Vec<KernelVersion>,
    /// Paths that existed and were deleted.
    pub removed: Vec<PathBuf>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, version: KernelVersion, action: CleanupAction, reason: impl fmt::Display) {
        let failure = CleanupFailure {
            version,
            action,
            reason: reason.to_string(),
        };
        warn!("{failure}");
        self.failures.push(failure);
    }
}

/// Deletes everything that belongs to obsolete kernel versions.
pub struct CleanupEngine<'a> {
    kernel_root: PathBuf,
    modules_root: PathBuf,
    boot_root: PathBuf,
    sources_package: String,
    runner: &'a dyn CommandRunner,
}

impl<'a> CleanupEngine<'a> {
    pub fn new(settings: &Settings, runner: &'a dyn CommandRunner) -> Self {
        Self {
            kernel_root: settings.kernel_root.clone(),
            modules_root: settings.modules_root.clone(),
            boot_root: settings.boot_root.clone(),
            sources_package: settings.sources_package.clone(),
            runner,
        }
    }

    /// Clean `versions` in ascending order and report what happened.
    pub fn clean(&self, versions: &[KernelVersion]) -> CleanupReport {
        let mut ordered = versions.to_vec();
        ordered.sort();

        let mut report = CleanupReport::default();
        for version in ordered {
            self.clean_version(&version, &mut report);
            report.versions.push(version);
        }

        if !report.is_clean() {
            warn!(
                "cleanup finished with {} failure(s) across {} version(s)",
                report.failures.len(),
                report.versions.len()
            );
        }
        report
    }

    fn clean_version(&self, version: &KernelVersion, report: &mut CleanupReport) {
        info!("cleaning up version {}...", version);
        let suffix = version.directory_suffix();

        let atom = version.package_atom(&self.sources_package);
        let unmerge = Cmd::new(PACKAGE_MANAGER).arg("-C").arg(atom.as_str());
        if let Err(failure) = process::execute(self.runner, &unmerge.argv(), None) {
            report.fail(*version, CleanupAction::UnmergePackage(atom), failure.reason);
        }

        let modules = self.modules_root.join(&suffix);
        self.remove_tree(version, &modules, CleanupAction::RemoveModules, report);

        let sources = self.kernel_root.join(version.source_dir_name());
        self.remove_tree(version, &sources, CleanupAction::RemoveSources, report);

        self.remove_boot_files(version, &suffix, report);
    }

    fn remove_tree(
        &self,
        version: &KernelVersion,
        path: &Path,
        action: fn(PathBuf) -> CleanupAction,
        report: &mut CleanupReport,
    ) {
        info!("Deleting {}...", path.display());
        match remove_dir_all_if_exists(path) {
            Ok(true) => report.removed.push(path.to_path_buf()),
            Ok(false) => {}
            Err(e) => report.fail(*version, action(path.to_path_buf()), e),
        }
    }

    fn remove_boot_files(&self, version: &KernelVersion, suffix: &str, report: &mut CleanupReport) {
        let walker = WalkDir::new(&self.boot_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(self.boot_root.as_path()).to_path_buf();
                    report.fail(*version, CleanupAction::ScanBoot(path), e);
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                continue;
            }
            if !names_version(&entry.file_name().to_string_lossy(), suffix) {
                continue;
            }

            let path = entry.into_path();
            info!("Removing {}", path.display());
            match fs::remove_file(&path) {
                Ok(()) => report.removed.push(path),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => report.fail(*version, CleanupAction::RemoveBootFile(path), e),
            }
        }
    }
}

/// Recursively delete `path`. `Ok(false)` when it was already gone.
pub fn remove_dir_all_if_exists(path: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether a boot file name embeds `suffix` as a whole version.
///
/// `vmlinuz-4.12.4-gentoo.old` names `4.12.4-gentoo`, but
/// `vmlinuz-4.12.4-gentoo-r1` and `vmlinuz-14.12.4-gentoo` do not.
pub fn names_version(file_name: &str, suffix: &str) -> bool {
    file_name.match_indices(suffix).any(|(start, _)| {
        let before_ok = file_name[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !(c.is_ascii_digit() || c == '.'));
        let after = &file_name[start + suffix.len()..];
        let after_ok = !after
            .strip_prefix("-r")
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()));
        before_ok && after_ok
    })
}
