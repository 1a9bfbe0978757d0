//! Error taxonomy for the customization pipeline.
//!
//! Every failure site maps to exactly one variant so callers can tell a
//! missing tool from a tool that ran and produced something unusable.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, IsoError>;

#[derive(Debug, Error)]
pub enum IsoError {
    /// A required external tool is not resolvable in the execution environment.
    #[error("cannot find executable for '{0}'")]
    ToolNotFound(String),

    /// The tool ran but did not succeed.
    #[error("command failed ({}): {}\n{}", describe_status(.status), .argv.join(" "), .output.trim())]
    CommandFailed {
        argv: Vec<String>,
        status: Option<ExitStatus>,
        output: String,
    },

    /// The tool was killed because it ran past its deadline.
    #[error("command timed out after {}s: {}", .after.as_secs(), .argv.join(" "))]
    Timeout { argv: Vec<String>, after: Duration },

    /// Extraction reported success but left nothing behind.
    #[error("extracting '{}' produced an empty workspace", .0.display())]
    ExtractionFailed(PathBuf),

    /// The metadata tool output carries no volume id line.
    #[error("cannot find ISO label in metadata of '{}'", .0.display())]
    LabelNotFound(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The customization strategy failed.
    #[error("customization failed")]
    CustomizationFailed(#[source] anyhow::Error),

    /// Producing the image at `target` failed.
    #[error("packing '{}' failed", .target.display())]
    PackingFailed {
        target: PathBuf,
        #[source]
        source: Box<IsoError>,
    },

    /// Another run holds the lock on the output directory.
    #[error("output directory '{}' is in use by another run", .0.display())]
    OutputLocked(PathBuf),

    #[error("invalid configuration '{}': {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl IsoError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        IsoError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn packing(target: impl Into<PathBuf>, source: IsoError) -> Self {
        IsoError::PackingFailed {
            target: target.into(),
            source: Box::new(source),
        }
    }
}

fn describe_status(status: &Option<ExitStatus>) -> String {
    match status.and_then(|s| s.code()) {
        Some(code) => format!("exit code {code}"),
        None if status.is_some() => "terminated by signal".to_string(),
        None => "not started".to_string(),
    }
}
