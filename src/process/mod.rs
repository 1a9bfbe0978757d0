//! Command execution substrate.
//!
//! Every external tool the pipeline uses (7z, isoinfo, implantisomd5,
//! xorriso) runs through a [`CommandRunner`]. The runner is bound to exactly
//! one [`ExecutionBackend`] when it is built:
//!
//! - [`ExecutionBackend::Local`] spawns the tool as a child process.
//! - [`ExecutionBackend::Remote`] forwards a quoted command line to a
//!   caller-supplied [`RemoteExecutor`] (an SSH session, an agent, a test stub).
//!
//! The code issuing commands never branches on the backend.
//!
//! # Example
//!
//! ```rust,no_run
//! use iso_maker::process::{Cmd, CommandRunner};
//!
//! let runner = CommandRunner::local();
//! runner.ensure_available("isoinfo")?;
//! let output = Cmd::new("isoinfo")
//!     .args(["-d", "-i"])
//!     .arg("/srv/images/debian.iso")
//!     .run(&runner)?;
//! println!("{}", output.stdout);
//! # Ok::<(), iso_maker::IsoError>(())
//! ```

mod local;
mod locate;
mod remote;

pub use remote::{quote_command_line, RemoteExecutor};

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{IsoError, Result};

/// Where commands run.
#[derive(Clone)]
pub enum ExecutionBackend {
    /// Child processes on this host.
    Local,
    /// A remote command channel supplied by the caller.
    Remote(Arc<dyn RemoteExecutor>),
}

impl ExecutionBackend {
    pub fn name(&self) -> &str {
        match self {
            ExecutionBackend::Local => "local",
            ExecutionBackend::Remote(executor) => executor.name(),
        }
    }
}

impl fmt::Debug for ExecutionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionBackend::Local => write!(f, "Local"),
            ExecutionBackend::Remote(executor) => write!(f, "Remote({})", executor.name()),
        }
    }
}

/// Captured result of one successful command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub argv: Vec<String>,
    pub stdout: String,
    /// Exit status when the backend reports one (local runs only).
    pub status: Option<ExitStatus>,
}

/// Runs argv-style commands through a fixed backend.
///
/// Runs are synchronous. A default deadline can be attached with
/// [`CommandRunner::with_timeout`]; [`CommandRunner::run_with_deadline`]
/// overrides it per call.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    backend: ExecutionBackend,
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new(backend: ExecutionBackend) -> Self {
        Self {
            backend,
            timeout: None,
        }
    }

    /// Runner spawning local child processes.
    pub fn local() -> Self {
        Self::new(ExecutionBackend::Local)
    }

    /// Runner forwarding every command to `executor`.
    pub fn remote(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self::new(ExecutionBackend::Remote(executor))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn backend(&self) -> &ExecutionBackend {
        &self.backend
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Fail with [`IsoError::ToolNotFound`] unless `tool` resolves in the
    /// backend's search path.
    pub fn ensure_available(&self, tool: &str) -> Result<()> {
        match &self.backend {
            ExecutionBackend::Local => locate::ensure_local(tool),
            ExecutionBackend::Remote(executor) => {
                locate::ensure_remote(executor, tool, self.timeout)
            }
        }
    }

    /// Run `argv` and return its captured standard output.
    pub fn run<S: AsRef<str>>(&self, argv: &[S]) -> Result<String> {
        let argv: Vec<String> = argv.iter().map(|a| a.as_ref().to_string()).collect();
        self.run_with_deadline(argv, self.timeout)
            .map(|output| output.stdout)
    }

    /// Run `argv`, killing it if it outlives `deadline`.
    pub fn run_with_deadline(
        &self,
        argv: Vec<String>,
        deadline: Option<Duration>,
    ) -> Result<CommandOutput> {
        if argv.is_empty() || argv[0].trim().is_empty() {
            return Err(IsoError::InvalidInput(
                "command line must name a program".to_string(),
            ));
        }

        debug!(backend = self.backend.name(), argv = ?argv, "running command");

        let result = match &self.backend {
            ExecutionBackend::Local => local::run(argv, deadline),
            ExecutionBackend::Remote(executor) => remote::run(executor, argv, deadline),
        };

        if let Err(err) = &result {
            warn!(backend = self.backend.name(), error = %err, "command did not succeed");
        }
        result
    }
}

/// Argument-vector builder for a single tool invocation.
#[derive(Debug, Clone)]
pub struct Cmd {
    argv: Vec<String>,
    deadline: Option<Duration>,
    /// First path argument that is not valid UTF-8; `run` refuses to start.
    non_utf8: Option<PathBuf>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
            deadline: None,
            non_utf8: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg_prefixed_path("", path)
    }

    /// `prefix` glued to `path` as one argument, e.g. 7z's `-o<dir>`.
    pub fn arg_prefixed_path(mut self, prefix: &str, path: &Path) -> Self {
        match path.to_str() {
            Some(text) => self.arg(format!("{prefix}{text}")),
            None => {
                if self.non_utf8.is_none() {
                    self.non_utf8 = Some(path.to_path_buf());
                }
                let lossy = path.to_string_lossy().into_owned();
                self.arg(format!("{prefix}{lossy}"))
            }
        }
    }

    /// Per-call deadline overriding the runner default.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn run(self, runner: &CommandRunner) -> Result<CommandOutput> {
        if let Some(path) = &self.non_utf8 {
            return Err(IsoError::InvalidInput(format!(
                "path '{}' is not valid UTF-8 and cannot be passed to {}",
                path.display(),
                self.argv[0]
            )));
        }
        let deadline = self.deadline.or(runner.timeout());
        runner.run_with_deadline(self.argv, deadline)
    }
}
