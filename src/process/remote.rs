//! Remote command channel backend.
//!
//! The runner does not implement any transport. It only adapts argv-style
//! invocations to an `execute(command_line) -> output` capability.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::error::{IsoError, Result};
use crate::process::CommandOutput;

/// Capability to run a shell command line somewhere else and return its output.
///
/// Implementations return `Err` when the command could not be run or exited
/// unsuccessfully; the error text ends up in [`IsoError::CommandFailed`].
pub trait RemoteExecutor: Send + Sync {
    fn execute(&self, command_line: &str) -> anyhow::Result<String>;

    /// Short name used in log output.
    fn name(&self) -> &str {
        "remote"
    }
}

/// Join argv into a single POSIX shell command line.
///
/// Arguments made only of characters that are inert to the shell are passed
/// bare; everything else is single-quoted.
pub fn quote_command_line<S: AsRef<str>>(argv: &[S]) -> String {
    argv.iter()
        .map(|arg| quote_arg(arg.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote_arg(arg: &str) -> String {
    let is_plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '+' | ',' | '@'));
    if is_plain {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

pub(super) fn run(
    executor: &Arc<dyn RemoteExecutor>,
    argv: Vec<String>,
    deadline: Option<Duration>,
) -> Result<CommandOutput> {
    let line = quote_command_line(&argv);

    let result = match deadline {
        None => executor.execute(&line),
        Some(limit) => match execute_with_deadline(executor, line, limit) {
            Some(result) => result,
            None => return Err(IsoError::Timeout { argv, after: limit }),
        },
    };

    match result {
        Ok(stdout) => Ok(CommandOutput {
            argv,
            stdout,
            status: None,
        }),
        Err(err) => Err(IsoError::CommandFailed {
            argv,
            status: None,
            output: format!("{err:#}"),
        }),
    }
}

/// Returns `None` when the executor did not answer within `limit`.
pub(super) fn execute_with_deadline(
    executor: &Arc<dyn RemoteExecutor>,
    line: String,
    limit: Duration,
) -> Option<anyhow::Result<String>> {
    let executor = Arc::clone(executor);
    let (tx, rx) = mpsc::channel();
    // Detached: a transport that never returns keeps its thread, not the pipeline.
    thread::spawn(move || {
        let _ = tx.send(executor.execute(&line));
    });

    match rx.recv_timeout(limit) {
        Ok(result) => Some(result),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(Err(anyhow::anyhow!(
            "remote executor thread terminated unexpectedly"
        ))),
    }
}
