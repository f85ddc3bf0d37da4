use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use kernel_updater::preflight;
use kernel_updater::{
    ConfigSelector, FailurePolicy, InventoryError, KernelUpdater, SelectedKernel, Settings,
    StdinPrompt, SystemRunner, UpdateError, UpdateReport,
};

/// No `linux` selection link under the kernel root.
const EXIT_NO_SELECTION: u8 = 1;
/// Aborted on an error.
const EXIT_ERROR: u8 = 2;
/// Ran to completion but some commands or cleanup actions failed.
const EXIT_PARTIAL: u8 = 3;

/// Gentoo: builds the latest merged kernel, installs it and does all
/// necessary post processes.
#[derive(Parser, Debug)]
#[command(name = "kernel-updater", version)]
struct Cli {
    /// Force rebuild, reinstall and post processes even if the selected
    /// kernel already has a .config
    #[arg(short, long)]
    force: bool,

    /// Settings file [default: /etc/kernel-updater.toml when present]
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Stop at the first failing command instead of carrying on
    #[arg(long)]
    halt_on_failure: bool,

    /// Override the kernel sources directory
    #[arg(long, value_name = "DIR")]
    kernel_root: Option<PathBuf>,

    /// Override the installed modules directory
    #[arg(long, value_name = "DIR")]
    modules_root: Option<PathBuf>,

    /// Override the boot directory
    #[arg(long, value_name = "DIR")]
    boot_root: Option<PathBuf>,

    /// Skip the root and host tool checks
    #[arg(long)]
    skip_preflight: bool,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
    let settings = settings_for(&cli)?;

    let selected = match SelectedKernel::resolve(&settings.kernel_root) {
        Ok(selected) => selected,
        Err(e @ InventoryError::SelectedLinkMissing { .. }) => {
            error!("{}. Select one with 'eselect kernel set' first", e);
            return Ok(ExitCode::from(EXIT_NO_SELECTION));
        }
        Err(e) => return Err(e).context("resolving the selected kernel"),
    };

    if selected.config_path().exists() && !cli.force {
        info!(
            "A config file exists already in {} - skipping (use --force to rebuild)",
            selected.link().display()
        );
        return Ok(ExitCode::SUCCESS);
    }

    if cli.skip_preflight {
        warn!("skipping preflight checks");
    } else {
        preflight::check_host(&settings).context("preflight checks failed")?;
    }

    let chosen = ConfigSelector::new(&settings.kernel_root, &selected)
        .select(&mut StdinPrompt)
        .context("choosing a .config to seed the new kernel")?;

    let report = match KernelUpdater::new(settings, selected, chosen, SystemRunner).update() {
        Ok(report) => report,
        Err(e) => {
            if let UpdateError::CommandFailed { report, .. } = &e {
                summarize(report);
            }
            return Err(e).context("kernel update failed");
        }
    };

    summarize(&report);
    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PARTIAL)
    })
}

fn settings_for(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::discover(cli.config.as_deref())?;
    if let Some(root) = &cli.kernel_root {
        settings.kernel_root = root.clone();
    }
    if let Some(root) = &cli.modules_root {
        settings.modules_root = root.clone();
    }
    if let Some(root) = &cli.boot_root {
        settings.boot_root = root.clone();
    }
    if cli.halt_on_failure {
        settings.on_failure = FailurePolicy::Halt;
    }
    settings.validate()?;
    Ok(settings)
}

fn summarize(report: &UpdateReport) {
    let cleanup = &report.cleanup;
    if !cleanup.versions.is_empty() {
        let versions: Vec<String> = cleanup.versions.iter().map(ToString::to_string).collect();
        info!(
            "Removed obsolete kernel(s) {} ({} item(s))",
            versions.join(", "),
            cleanup.removed.len()
        );
    }
    for failure in &report.command_failures {
        warn!("failed: {}", failure);
    }
    for failure in &cleanup.failures {
        warn!(
            "cleanup of {} incomplete: {} ({})",
            failure.version, failure.action, failure.reason
        );
    }
}
