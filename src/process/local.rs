//! Local child-process backend.

use std::process::{Command, Output, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{IsoError, Result};
use crate::process::CommandOutput;

pub(super) fn run(argv: Vec<String>, deadline: Option<Duration>) -> Result<CommandOutput> {
    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group, so a deadline kill reaches helpers the tool forks.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    let child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            return Err(IsoError::CommandFailed {
                argv,
                status: None,
                output: format!("failed to spawn: {err}"),
            })
        }
    };

    let output = match deadline {
        None => child.wait_with_output(),
        Some(limit) => {
            let pid = child.id();
            let (tx, rx) = mpsc::channel();
            // Detached: the waiter may still be draining pipes held open by
            // a process that ignored the kill.
            thread::spawn(move || {
                let _ = tx.send(child.wait_with_output());
            });

            match rx.recv_timeout(limit) {
                Ok(output) => output,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    kill_group(pid);
                    return Err(IsoError::Timeout { argv, after: limit });
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(IsoError::CommandFailed {
                        argv,
                        status: None,
                        output: "process monitoring thread terminated unexpectedly".to_string(),
                    })
                }
            }
        }
    };

    let output = match output {
        Ok(output) => output,
        Err(err) => {
            return Err(IsoError::CommandFailed {
                argv,
                status: None,
                output: format!("failed to wait for process: {err}"),
            })
        }
    };

    into_command_output(argv, output)
}

fn into_command_output(argv: Vec<String>, output: Output) -> Result<CommandOutput> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout;
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        return Err(IsoError::CommandFailed {
            argv,
            status: Some(output.status),
            output: combined,
        });
    }

    Ok(CommandOutput {
        argv,
        stdout,
        status: Some(output.status),
    })
}

/// SIGKILL the process group led by `pid`.
fn kill_group(pid: u32) {
    #[cfg(unix)]
    {
        unsafe {
            libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
        }
    }

    #[cfg(not(unix))]
    let _ = pid;
}
