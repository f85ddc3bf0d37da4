//! Filesystem layout, command lines and failure policy.
//!
//! Everything has a Gentoo default, so the settings file is optional. When
//! present it is TOML with flat keys:
//!
//! ```toml
//! kernel_root = "/usr/src"
//! modules_root = "/lib/modules"
//! boot_root = "/boot"
//! sources_package = "gentoo-sources"
//! initramfs_command = ["genkernel", "initramfs"]
//! driver_rebuild_command = ["emerge", "-1q", "@x11-module-rebuild", "@module-rebuild"]
//! bootloader_config = "grub/grub.cfg"
//! on_failure = "continue"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::update::FailurePolicy;

/// Settings file read when no explicit path is given, if it exists.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/kernel-updater.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Kernel sources; holds the `linux` selection link.
    pub kernel_root: PathBuf,
    /// Installed module trees, one directory per kernel.
    pub modules_root: PathBuf,
    /// Kernel images, System.map, initramfs and the bootloader config.
    pub boot_root: PathBuf,
    /// Package that installs kernel sources, unmerged during cleanup.
    pub sources_package: String,
    pub initramfs_command: Vec<String>,
    pub driver_rebuild_command: Vec<String>,
    /// Bootloader config to regenerate, relative to `boot_root`.
    pub bootloader_config: PathBuf,
    pub on_failure: FailurePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kernel_root: PathBuf::from("/usr/src"),
            modules_root: PathBuf::from("/lib/modules"),
            boot_root: PathBuf::from("/boot"),
            sources_package: "gentoo-sources".to_string(),
            initramfs_command: vec!["genkernel".to_string(), "initramfs".to_string()],
            driver_rebuild_command: vec![
                "emerge".to_string(),
                "-1q".to_string(),
                "@x11-module-rebuild".to_string(),
                "@module-rebuild".to_string(),
            ],
            bootloader_config: PathBuf::from("grub/grub.cfg"),
            on_failure: FailurePolicy::default(),
        }
    }
}

impl Settings {
    /// Parse and validate a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading settings '{}'", path.display()))?;
        let settings: Settings = toml::from_str(&raw)
            .with_context(|| format!("parsing settings '{}'", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("invalid settings '{}'", path.display()))?;
        Ok(settings)
    }

    /// Load `explicit` if given (it must exist), otherwise
    /// [`DEFAULT_SETTINGS_PATH`] if present, otherwise the defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_PATH);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initramfs_command.is_empty() {
            bail!("initramfs_command must not be empty");
        }
        if self.driver_rebuild_command.is_empty() {
            bail!("driver_rebuild_command must not be empty");
        }
        if self.sources_package.trim().is_empty() {
            bail!("sources_package must not be empty");
        }
        if self.bootloader_config.as_os_str().is_empty() {
            bail!("bootloader_config must not be empty");
        }
        Ok(())
    }

    /// Absolute path of the bootloader config, e.g. `/boot/grub/grub.cfg`.
    pub fn bootloader_config_path(&self) -> PathBuf {
        self.boot_root.join(&self.bootloader_config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_gentoo_layout() {
        let settings = Settings::default();
        assert_eq!(settings.kernel_root, Path::new("/usr/src"));
        assert_eq!(settings.modules_root, Path::new("/lib/modules"));
        assert_eq!(
            settings.bootloader_config_path(),
            Path::new("/boot/grub/grub.cfg")
        );
        assert_eq!(settings.on_failure, FailurePolicy::Continue);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kernel-updater.toml");
        fs::write(&path, "boot_root = \"/efi\"\non_failure = \"halt\"\n").unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.boot_root, Path::new("/efi"));
        assert_eq!(settings.on_failure, FailurePolicy::Halt);
        assert_eq!(settings.kernel_root, Path::new("/usr/src"));
        assert_eq!(settings.initramfs_command, ["genkernel", "initramfs"]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kernel-updater.toml");
        fs::write(&path, "grub_root = \"/boot\"\n").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("grub_root"));
    }

    #[test]
    fn test_empty_command_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("kernel-updater.toml");
        fs::write(&path, "initramfs_command = []\n").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("initramfs_command"));
    }

    #[test]
    fn test_discover_explicit_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        assert!(Settings::discover(Some(&temp.path().join("absent.toml"))).is_err());
    }
}
