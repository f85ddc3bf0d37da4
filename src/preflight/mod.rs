//! Host checks run before the update touches anything.
//!
//! A kernel update that dies at `make install` because `grub-mkconfig` is
//! missing, or because `/boot` is not writable, leaves a half-installed
//! kernel behind. Both conditions are checked up front.
//!
//! ```rust
//! use kernel_updater::preflight::required_tools;
//! use kernel_updater::Settings;
//!
//! let tools = required_tools(&Settings::default());
//! assert!(tools.iter().any(|(cmd, pkg)| cmd == "genkernel" && pkg == "sys-kernel/genkernel"));
//! ```

use anyhow::{bail, Result};

use crate::settings::Settings;

/// Whether `cmd` resolves on `PATH`.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Gentoo package providing each command the update may run.
pub const KNOWN_PROVIDERS: &[(&str, &str)] = &[
    ("make", "sys-devel/make"),
    ("genkernel", "sys-kernel/genkernel"),
    ("dracut", "sys-kernel/dracut"),
    ("emerge", "sys-apps/portage"),
    ("grub-mkconfig", "sys-boot/grub"),
];

/// Tools the update will invoke with `settings`, paired with the package
/// that provides them (`"?"` when unknown).
pub fn required_tools(settings: &Settings) -> Vec<(String, String)> {
    let mut programs = vec!["make", "emerge", "grub-mkconfig"];
    for command in [&settings.initramfs_command, &settings.driver_rebuild_command] {
        if let Some(program) = command.first() {
            programs.push(program.as_str());
        }
    }
    programs.sort_unstable();
    programs.dedup();

    programs
        .into_iter()
        .map(|program| {
            let package = KNOWN_PROVIDERS
                .iter()
                .find(|(cmd, _)| *cmd == program)
                .map_or("?", |(_, pkg)| *pkg);
            (program.to_string(), package.to_string())
        })
        .collect()
}

/// Fail with every missing `(command, package)` pair listed, so one run
/// tells the operator everything to emerge.
pub fn check_required_tools<S: AsRef<str>>(tools: &[(S, S)]) -> Result<()> {
    let missing: Vec<String> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool.as_ref()))
        .map(|(tool, package)| format!("  {} (install: {})", tool.as_ref(), package.as_ref()))
        .collect();

    if !missing.is_empty() {
        bail!("Missing required host tools:\n{}", missing.join("\n"));
    }

    Ok(())
}

fn effective_uid() -> u32 {
    // SAFETY: geteuid takes no arguments and always succeeds.
    unsafe { libc::geteuid() }
}

/// Installing kernels writes to `/boot` and `/lib/modules`.
pub fn ensure_root() -> Result<()> {
    let euid = effective_uid();
    if euid != 0 {
        bail!("kernel-updater must run as root (effective uid is {})", euid);
    }
    Ok(())
}

/// Run every preflight check for `settings`.
pub fn check_host(settings: &Settings) -> Result<()> {
    ensure_root()?;
    check_required_tools(&required_tools(settings))
}
