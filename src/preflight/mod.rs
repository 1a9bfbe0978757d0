//! Preflight checks for customization runs.
//!
//! Validates that the execution host has every tool the pipeline shells out
//! to before any image is unpacked. This prevents a run from failing halfway
//! through packing because `xorriso` was never installed.
//!
//! # Example
//!
//! ```rust,no_run
//! use iso_maker::preflight::{check_required_tools, tool_available};
//! use iso_maker::CommandRunner;
//!
//! let runner = CommandRunner::local();
//!
//! // Check a single tool
//! if !tool_available(&runner, "xorriso") {
//!     println!("xorriso not installed");
//! }
//!
//! // Check several tools
//! let tools = &[("7z", "p7zip-full"), ("xorriso", "xorriso")];
//! if let Err(e) = check_required_tools(&runner, tools) {
//!     eprintln!("{}", e);
//! }
//! ```

use anyhow::{bail, Result};
use tracing::debug;

use crate::process::CommandRunner;

/// Check if a tool can be located through `runner`.
pub fn tool_available(runner: &CommandRunner, tool: &str) -> bool {
    match runner.ensure_available(tool) {
        Ok(()) => true,
        Err(err) => {
            debug!(tool, error = %err, "tool not available");
            false
        }
    }
}

/// Tools the pipeline and its default packer invoke.
///
/// Each tuple is (command_name, package_name).
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("7z", "p7zip-full"),
    ("isoinfo", "genisoimage"),
    ("implantisomd5", "isomd5sum"),
    ("checkisomd5", "isomd5sum"),
    ("xorriso", "xorriso"),
];

/// Check that specific tools are available on the runner's host.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(runner: &CommandRunner, tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !tool_available(runner, tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!(
            "Missing required tools on {} host:\n{}",
            runner.backend().name(),
            msg
        );
    }

    Ok(())
}

/// Check every tool in [`REQUIRED_TOOLS`].
pub fn check_host_tools(runner: &CommandRunner) -> Result<()> {
    check_required_tools(runner, REQUIRED_TOOLS)
}
