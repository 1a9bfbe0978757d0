//! Tool resolution against the active backend's search path.

use std::time::Duration;

use tracing::debug;

use super::remote::{execute_with_deadline, RemoteExecutor};
use crate::error::{IsoError, Result};

pub(super) fn ensure_local(tool: &str) -> Result<()> {
    validate_tool_name(tool)?;
    match which::which(tool) {
        Ok(path) => {
            debug!(tool, path = %path.display(), "resolved tool");
            Ok(())
        }
        Err(_) => Err(IsoError::ToolNotFound(tool.to_string())),
    }
}

pub(super) fn ensure_remote(
    executor: &std::sync::Arc<dyn RemoteExecutor>,
    tool: &str,
    timeout: Option<Duration>,
) -> Result<()> {
    validate_tool_name(tool)?;
    let line = format!("command -v {tool}");

    let result = match timeout {
        None => executor.execute(&line),
        Some(limit) => match execute_with_deadline(executor, line, limit) {
            Some(result) => result,
            None => {
                return Err(IsoError::Timeout {
                    argv: vec!["command".into(), "-v".into(), tool.into()],
                    after: limit,
                })
            }
        },
    };

    match result {
        Ok(path) if !path.trim().is_empty() => {
            debug!(tool, path = path.trim(), remote = executor.name(), "resolved tool");
            Ok(())
        }
        _ => Err(IsoError::ToolNotFound(tool.to_string())),
    }
}

/// Tool names go onto a remote shell line unquoted, so only allow names made
/// of characters that cannot change its meaning.
fn validate_tool_name(tool: &str) -> Result<()> {
    let ok = !tool.is_empty()
        && tool
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+' | '/'));
    if ok {
        Ok(())
    } else {
        Err(IsoError::InvalidInput(format!(
            "'{tool}' is not a valid executable name"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct PathLookup(&'static [&'static str]);

    impl RemoteExecutor for PathLookup {
        fn execute(&self, command_line: &str) -> anyhow::Result<String> {
            let tool = command_line.trim_start_matches("command -v ");
            if self.0.contains(&tool) {
                Ok(format!("/usr/bin/{tool}\n"))
            } else {
                anyhow::bail!("exit status 1")
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_local_lookup() {
        assert!(ensure_local("sh").is_ok());
        assert!(matches!(
            ensure_local("definitely_not_a_real_command_12345"),
            Err(IsoError::ToolNotFound(name)) if name == "definitely_not_a_real_command_12345"
        ));
    }

    #[test]
    fn test_remote_lookup_uses_command_v() {
        let executor: Arc<dyn RemoteExecutor> = Arc::new(PathLookup(&["7z", "isoinfo"]));
        assert!(ensure_remote(&executor, "7z", None).is_ok());
        assert!(matches!(
            ensure_remote(&executor, "xorriso", None),
            Err(IsoError::ToolNotFound(_))
        ));
    }

    struct Hung;

    impl RemoteExecutor for Hung {
        fn execute(&self, _command_line: &str) -> anyhow::Result<String> {
            std::thread::sleep(Duration::from_secs(3));
            Ok("/usr/bin/7z\n".into())
        }
    }

    #[test]
    fn test_remote_lookup_past_deadline_is_timeout() {
        let executor: Arc<dyn RemoteExecutor> = Arc::new(Hung);

        let result = ensure_remote(&executor, "7z", Some(Duration::from_millis(100)));

        match result {
            Err(IsoError::Timeout { argv, after }) => {
                assert_eq!(argv, vec!["command", "-v", "7z"]);
                assert_eq!(after, Duration::from_millis(100));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_shell_metacharacters_rejected() {
        assert!(matches!(
            validate_tool_name("7z; reboot"),
            Err(IsoError::InvalidInput(_))
        ));
        assert!(validate_tool_name("mkfs.fat").is_ok());
    }
}
