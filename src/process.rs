//! External command execution.
//!
//! Every external action (make, genkernel, emerge, grub-mkconfig) goes
//! through a [`CommandRunner`], so the update sequence can be driven by a
//! recording fake in tests. [`SystemRunner`] is the real implementation: it
//! spawns with inherited stdio and blocks until the child exits. No timeouts.
//!
//! # Example
//!
//! ```rust,ignore
//! use kernel_updater::process::{CommandRunner, SystemRunner};
//!
//! let argv = vec!["make".to_string(), "-C".to_string(), "/usr/src/linux".to_string()];
//! let status = SystemRunner.run(&argv, Some("build"))?;
//! ```

use std::fmt;
use std::process::{Command, ExitStatus};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

/// Exit status of a finished command.
///
/// `code` is `None` when the child was killed by a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub code: Option<i32>,
}

impl CommandStatus {
    pub const SUCCESS: CommandStatus = CommandStatus { code: Some(0) };

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for CommandStatus {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit status {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Runs one external command to completion.
pub trait CommandRunner {
    /// Run `argv` (program first). `comment` is shown next to the command
    /// line in progress output.
    ///
    /// `Err` means the command could not be started at all; a command that
    /// ran and exited non-zero is `Ok` with an unsuccessful status.
    fn run(&self, argv: &[String], comment: Option<&str>) -> Result<CommandStatus>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, argv: &[String], comment: Option<&str>) -> Result<CommandStatus> {
        (**self).run(argv, comment)
    }
}

/// A command that did not complete successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFailure {
    /// The full command line, space separated.
    pub command: String,
    pub comment: Option<String>,
    pub reason: String,
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.command)?;
        if let Some(comment) = &self.comment {
            write!(f, " ({comment})")?;
        }
        write!(f, " failed: {}", self.reason)
    }
}

impl std::error::Error for CommandFailure {}

/// Run a command and turn spawn errors and non-zero exits into a
/// [`CommandFailure`]. The failure is logged here, with its command line.
pub fn execute(
    runner: &dyn CommandRunner,
    argv: &[String],
    comment: Option<&str>,
) -> std::result::Result<(), CommandFailure> {
    let reason = match runner.run(argv, comment) {
        Ok(status) if status.success() => return Ok(()),
        Ok(status) => status.to_string(),
        Err(e) => format!("{e:#}"),
    };

    let failure = CommandFailure {
        command: argv.join(" "),
        comment: comment.map(str::to_string),
        reason,
    };
    warn!("{failure}");
    Err(failure)
}

/// Spawns real processes with inherited stdin/stdout/stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, argv: &[String], comment: Option<&str>) -> Result<CommandStatus> {
        let cmd = Cmd::from_argv(argv)?;
        match comment {
            Some(comment) => info!("Running {} ({comment})", cmd),
            None => info!("Running {}", cmd),
        }
        cmd.status()
    }
}

/// Builder for a single external command.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from an argument vector whose first element is the program.
    pub fn from_argv(argv: &[String]) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            bail!("cannot run an empty command line");
        };
        Ok(Self::new(program.as_str()).args(args))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program followed by its arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Spawn, inherit stdio, and wait.
    pub fn status(&self) -> Result<CommandStatus> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .status()
            .with_context(|| format!("spawning '{}'", self))?;
        Ok(status.into())
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedRunner(std::result::Result<CommandStatus, &'static str>);

    impl CommandRunner for FixedRunner {
        fn run(&self, _argv: &[String], _comment: Option<&str>) -> Result<CommandStatus> {
            self.0.map_err(anyhow::Error::msg)
        }
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cmd_builder_argv_and_display() {
        let cmd = Cmd::new("make").args(["-C", "/usr/src/linux"]).arg("install");
        assert_eq!(cmd.argv(), argv(&["make", "-C", "/usr/src/linux", "install"]));
        assert_eq!(cmd.to_string(), "make -C /usr/src/linux install");
    }

    #[test]
    fn test_from_argv_rejects_empty() {
        assert!(Cmd::from_argv(&[]).is_err());
    }

    #[test]
    fn test_execute_success() {
        let runner = FixedRunner(Ok(CommandStatus::SUCCESS));
        assert!(execute(&runner, &argv(&["true"]), None).is_ok());
    }

    #[test]
    fn test_execute_reports_exit_code() {
        let runner = FixedRunner(Ok(CommandStatus { code: Some(2) }));
        let failure = execute(&runner, &argv(&["make", "install"]), Some("again")).unwrap_err();
        assert_eq!(failure.command, "make install");
        assert_eq!(failure.to_string(), "'make install' (again) failed: exit status 2");
    }

    #[test]
    fn test_execute_reports_spawn_error() {
        let runner = FixedRunner(Err("No such file or directory"));
        let failure = execute(&runner, &argv(&["genkernel", "initramfs"]), None).unwrap_err();
        assert!(failure.reason.contains("No such file"));
    }

    #[test]
    fn test_system_runner_real_commands() {
        // 'true' and 'false' exist on any Unix system
        assert!(SystemRunner.run(&argv(&["true"]), None).unwrap().success());
        assert!(!SystemRunner.run(&argv(&["false"]), None).unwrap().success());
        assert!(SystemRunner
            .run(&argv(&["definitely_not_a_real_command_12345"]), None)
            .is_err());
    }
}
