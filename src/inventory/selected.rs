//! The selected kernel: whatever `<kernel_root>/linux` points at.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{InventoryError, ParseVersionError};
use crate::version::KernelVersion;

/// Name of the symbolic link that selects the kernel to build.
pub const SELECTED_LINK: &str = "linux";

/// The kernel targeted by the `linux` symbolic link. Resolved once at
/// startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedKernel {
    link: PathBuf,
    name: String,
    dir: PathBuf,
}

impl SelectedKernel {
    /// Resolve `<kernel_root>/linux`.
    ///
    /// An absolute target is used as the directory verbatim; a relative one
    /// is joined onto `kernel_root`. In both cases the name is the last path
    /// segment of the target.
    pub fn resolve(kernel_root: &Path) -> Result<Self, InventoryError> {
        let link = kernel_root.join(SELECTED_LINK);
        if !link.exists() {
            return Err(InventoryError::SelectedLinkMissing { link });
        }

        let target = fs::read_link(&link).map_err(|source| {
            InventoryError::SelectedLinkUnreadable {
                link: link.clone(),
                source,
            }
        })?;

        let dir = if target.is_absolute() {
            target.clone()
        } else {
            kernel_root.join(&target)
        };
        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.to_string_lossy().into_owned());

        info!("Selected kernel is: {} in dir {}", name, dir.display());
        Ok(Self { link, name, dir })
    }

    /// Directory name of the selected sources, e.g. `linux-4.12.4-gentoo`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Real directory of the selected sources.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The `linux` symbolic link itself.
    pub fn link(&self) -> &Path {
        &self.link
    }

    /// Where the seed configuration is written: `<kernel_root>/linux/.config`.
    pub fn config_path(&self) -> PathBuf {
        self.link.join(".config")
    }

    pub fn version(&self) -> Result<KernelVersion, ParseVersionError> {
        KernelVersion::parse(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_absolute_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("linux-4.12.4-gentoo");
        fs::create_dir(&target).unwrap();
        symlink(&target, temp.path().join("linux")).unwrap();

        let selected = SelectedKernel::resolve(temp.path()).unwrap();
        assert_eq!(selected.name(), "linux-4.12.4-gentoo");
        assert_eq!(selected.dir(), target.as_path());
        assert_eq!(selected.version().unwrap(), KernelVersion::new(4, 12, 4, None));
    }

    #[test]
    fn test_resolve_relative_target() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("linux-4.14.8-gentoo-r1")).unwrap();
        symlink("linux-4.14.8-gentoo-r1", temp.path().join("linux")).unwrap();

        let selected = SelectedKernel::resolve(temp.path()).unwrap();
        assert_eq!(selected.name(), "linux-4.14.8-gentoo-r1");
        assert_eq!(selected.dir(), temp.path().join("linux-4.14.8-gentoo-r1"));
        assert_eq!(selected.config_path(), temp.path().join("linux/.config"));
    }

    #[test]
    fn test_missing_link_is_reported() {
        let temp = TempDir::new().unwrap();
        let err = SelectedKernel::resolve(temp.path()).unwrap_err();
        assert!(matches!(err, InventoryError::SelectedLinkMissing { .. }));
    }

    #[test]
    fn test_dangling_link_counts_as_missing() {
        let temp = TempDir::new().unwrap();
        symlink("linux-9.9.9-gentoo", temp.path().join("linux")).unwrap();
        let err = SelectedKernel::resolve(temp.path()).unwrap_err();
        assert!(matches!(err, InventoryError::SelectedLinkMissing { .. }));
    }

    #[test]
    fn test_plain_directory_is_unreadable_link() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("linux")).unwrap();
        let err = SelectedKernel::resolve(temp.path()).unwrap_err();
        assert!(matches!(err, InventoryError::SelectedLinkUnreadable { .. }));
    }
}
