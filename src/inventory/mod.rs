//! Installed kernel sources and retention.
//!
//! The inventory is always read fresh from disk: cleanup removes source
//! trees, so a cached listing would be stale after the first deletion.
//!
//! Retention keeps the selected kernel, everything newer, and the one
//! version immediately older than the selected kernel as a fallback.
//! Anything older than that is obsolete.
//!
//! ```text
//! installed:  4.11.8  4.12.2  4.12.3  [4.12.4]
//!             ^^^^^^  ^^^^^^  fallback selected
//!             obsolete
//! ```

mod selected;

pub use selected::{SelectedKernel, SELECTED_LINK};

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::InventoryError;
use crate::version::KernelVersion;

/// Substring that marks a directory as kernel sources.
pub const KERNEL_DIR_MARKER: &str = "linux-";

/// Kernel source directories under one root.
#[derive(Debug, Clone)]
pub struct KernelInventory {
    kernel_root: PathBuf,
}

impl KernelInventory {
    pub fn new(kernel_root: impl Into<PathBuf>) -> Self {
        Self {
            kernel_root: kernel_root.into(),
        }
    }

    pub fn kernel_root(&self) -> &Path {
        &self.kernel_root
    }

    /// Names of the immediate subdirectories that contain `linux-`.
    ///
    /// A `linux-*` symbolic link to a directory counts as a kernel directory;
    /// a dangling one does not. The `linux` selection link is never included.
    pub fn kernel_dir_names(&self) -> Result<Vec<String>, InventoryError> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.kernel_root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|source| InventoryError::ListDir {
                path: self.kernel_root.clone(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if name.contains(KERNEL_DIR_MARKER) {
                names.push(name.into_owned());
            }
        }
        Ok(names)
    }

    /// Every installed version, ascending, without duplicates.
    ///
    /// A single unparsable kernel directory fails the whole listing: skipping
    /// it would silently shift the retention window.
    pub fn list_versions(&self) -> Result<Vec<KernelVersion>, InventoryError> {
        let mut versions = self
            .kernel_dir_names()?
            .iter()
            .map(|name| KernelVersion::parse(name))
            .collect::<Result<Vec<_>, _>>()?;
        versions.sort();
        versions.dedup();
        Ok(versions)
    }

    /// Obsolete versions relative to `selected`, from a fresh listing.
    pub fn obsolete_versions(
        &self,
        selected: &KernelVersion,
    ) -> Result<Vec<KernelVersion>, InventoryError> {
        compute_obsolete_versions(&self.list_versions()?, selected)
    }
}

/// Versions strictly older than the fallback kept for `selected`.
///
/// `all` must be ascending. Returns everything before index
/// `position(selected) - 1`; empty when fewer than two versions precede the
/// selected one.
pub fn compute_obsolete_versions(
    all: &[KernelVersion],
    selected: &KernelVersion,
) -> Result<Vec<KernelVersion>, InventoryError> {
    let selected_index = all
        .iter()
        .position(|v| v == selected)
        .ok_or(InventoryError::SelectedNotInstalled { version: *selected })?;
    Ok(all[..selected_index.saturating_sub(1)].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn v(name: &str) -> KernelVersion {
        KernelVersion::parse(name).unwrap()
    }

    fn versions(names: &[&str]) -> Vec<KernelVersion> {
        names.iter().map(|n| v(n)).collect()
    }

    fn kernel_root(dirs: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir(temp.path().join(dir)).unwrap();
        }
        temp
    }

    #[test]
    fn test_obsolete_keeps_immediate_predecessor() {
        let all = versions(&["4.11.8", "4.12.2", "4.12.3", "4.12.4"]);
        let obsolete = compute_obsolete_versions(&all, &v("4.12.4")).unwrap();
        assert_eq!(obsolete, versions(&["4.11.8", "4.12.2"]));
    }

    #[test]
    fn test_obsolete_with_revisions() {
        let all = versions(&["4.13.16", "4.14.8-gentoo-r1", "4.14.10"]);
        let obsolete = compute_obsolete_versions(&all, &v("4.14.10")).unwrap();
        assert_eq!(obsolete, versions(&["4.13.16"]));
    }

    #[test]
    fn test_nothing_obsolete_when_selected_is_oldest_or_second() {
        let all = versions(&["4.12.3", "4.12.4", "4.12.5"]);
        assert!(compute_obsolete_versions(&all, &v("4.12.3")).unwrap().is_empty());
        assert!(compute_obsolete_versions(&all, &v("4.12.4")).unwrap().is_empty());
    }

    #[test]
    fn test_newer_versions_never_obsolete() {
        let all = versions(&["4.10.1", "4.11.8", "4.12.3", "4.12.4", "4.13.0"]);
        let obsolete = compute_obsolete_versions(&all, &v("4.12.4")).unwrap();
        assert_eq!(obsolete, versions(&["4.10.1", "4.11.8"]));
    }

    #[test]
    fn test_selected_missing_is_consistency_error() {
        let all = versions(&["4.11.8", "4.12.3"]);
        let err = compute_obsolete_versions(&all, &v("4.12.4")).unwrap_err();
        assert!(matches!(err, InventoryError::SelectedNotInstalled { .. }));
    }

    #[test]
    fn test_list_versions_sorted_and_filtered() {
        let temp = kernel_root(&[
            "linux-4.14.10-gentoo",
            "linux-4.13.16-gentoo",
            "linux-4.14.8-gentoo-r1",
            "portage",
        ]);
        fs::write(temp.path().join("linux-notes.txt"), "").unwrap();
        symlink(
            temp.path().join("linux-4.14.10-gentoo"),
            temp.path().join("linux"),
        )
        .unwrap();

        let inventory = KernelInventory::new(temp.path());
        assert_eq!(
            inventory.list_versions().unwrap(),
            versions(&["4.13.16", "4.14.8-gentoo-r1", "4.14.10"])
        );
    }

    #[test]
    fn test_symlinked_source_tree_is_listed() {
        let temp = kernel_root(&["linux-4.12.3-gentoo"]);
        let elsewhere = TempDir::new().unwrap();
        let real = elsewhere.path().join("linux-4.12.4-gentoo");
        fs::create_dir(&real).unwrap();
        symlink(&real, temp.path().join("linux-4.12.4-gentoo")).unwrap();
        symlink("linux-9.9.9-gentoo-dangling", temp.path().join("linux-9.9.9-gentoo")).unwrap();
        symlink(
            temp.path().join("linux-4.12.4-gentoo"),
            temp.path().join("linux"),
        )
        .unwrap();

        let inventory = KernelInventory::new(temp.path());
        assert_eq!(
            inventory.list_versions().unwrap(),
            versions(&["4.12.3", "4.12.4"])
        );
        let selected = SelectedKernel::resolve(temp.path()).unwrap();
        let selected_version = selected.version().unwrap();
        assert!(inventory.obsolete_versions(&selected_version).unwrap().is_empty());
    }

    #[test]
    fn test_list_versions_fails_on_malformed_dir() {
        let temp = kernel_root(&["linux-4.12.4-gentoo", "linux-next"]);
        let err = KernelInventory::new(temp.path()).list_versions().unwrap_err();
        assert!(matches!(err, InventoryError::Parse(_)));
    }

    #[test]
    fn test_list_versions_missing_root() {
        let temp = TempDir::new().unwrap();
        let inventory = KernelInventory::new(temp.path().join("absent"));
        assert!(matches!(
            inventory.list_versions().unwrap_err(),
            InventoryError::ListDir { .. }
        ));
    }

    #[test]
    fn test_obsolete_versions_reads_fresh_listing() {
        let temp = kernel_root(&[
            "linux-4.11.8-gentoo",
            "linux-4.12.2-gentoo",
            "linux-4.12.3-gentoo",
            "linux-4.12.4-gentoo",
        ]);
        let inventory = KernelInventory::new(temp.path());
        let selected = v("linux-4.12.4-gentoo");
        assert_eq!(
            inventory.obsolete_versions(&selected).unwrap(),
            versions(&["4.11.8", "4.12.2"])
        );

        fs::remove_dir(temp.path().join("linux-4.11.8-gentoo")).unwrap();
        assert_eq!(
            inventory.obsolete_versions(&selected).unwrap(),
            versions(&["4.12.2"])
        );
    }
}
