//! Bounded external command execution
//!
//! Every privileged operation in the engine (container create/remove, compile,
//! run) goes through this single primitive: a shell command line executed with
//! a hard timeout and a cap on captured output. Failures never escape as
//! errors; they are encoded into the returned [`ExecutionResult`] so the
//! pipeline can classify them. The runner guarantees that no child process is
//! left alive after `run` returns.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::Instant;

/// Marker appended when captured output hits the configured cap.
pub const TRUNCATION_MARKER: &str = "\n... (output truncated: size limit exceeded) ...";

/// Outcome of one external command invocation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn system_error(message: &str) -> Self {
        Self {
            success: false,
            output: format!("System Error: {}", message),
            exit_code: -1,
        }
    }

    fn timed_out(buffered: String, timeout: Duration) -> Self {
        let message = format!(
            "TIMEOUT: execution exceeded the {} ms limit",
            timeout.as_millis()
        );
        let output = if buffered.is_empty() {
            message
        } else {
            format!("{}\n{}", buffered, message)
        };
        Self {
            success: false,
            output,
            exit_code: -1,
        }
    }
}

/// Narrow command-execution capability the rest of the engine depends on.
/// Tests substitute a scripted implementation to drive the pipeline without a
/// container runtime on the host.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, timeout: Duration) -> ExecutionResult;
}

/// Host shell strategy, detected once at startup rather than per call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Posix,
    Cmd,
}

impl Shell {
    pub fn detect() -> Self {
        if cfg!(target_family = "windows") {
            Shell::Cmd
        } else {
            Shell::Posix
        }
    }

    fn command(&self, line: &str) -> Command {
        match self {
            Shell::Posix => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(line);
                cmd
            }
            Shell::Cmd => {
                let mut cmd = Command::new("cmd");
                cmd.arg("/C").arg(line);
                cmd
            }
        }
    }
}

/// Shell-backed [`CommandRunner`] with merged stdout/stderr capture.
pub struct ShellCommandRunner {
    shell: Shell,
    max_output_chars: usize,
}

impl ShellCommandRunner {
    pub fn new(max_output_chars: usize) -> Self {
        Self {
            shell: Shell::detect(),
            max_output_chars,
        }
    }
}

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str, timeout: Duration) -> ExecutionResult {
        log::debug!("running command: {}", command);

        let mut cmd = self.shell.command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                log::error!("command spawn failed: {}", e);
                return ExecutionResult::system_error(&e.to_string());
            }
        };

        let (mut stdout, mut stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(out), Some(err)) => (out, err),
            _ => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return ExecutionResult::system_error("failed to capture child output");
            }
        };

        let deadline = Instant::now() + timeout;
        let mut output = String::new();
        let mut char_count = 0usize;
        let mut truncated = false;
        let mut out_done = false;
        let mut err_done = false;
        let mut out_buf = [0u8; 1024];
        let mut err_buf = [0u8; 1024];

        // Drain both pipes into one buffer until EOF, cap overflow or the
        // deadline, whichever comes first.
        while !(out_done && err_done) && !truncated {
            tokio::select! {
                read = stdout.read(&mut out_buf), if !out_done => match read {
                    Ok(0) => out_done = true,
                    Ok(n) => {
                        truncated = append_capped(
                            &mut output,
                            &mut char_count,
                            &out_buf[..n],
                            self.max_output_chars,
                        );
                    }
                    Err(e) => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return ExecutionResult::system_error(&e.to_string());
                    }
                },
                read = stderr.read(&mut err_buf), if !err_done => match read {
                    Ok(0) => err_done = true,
                    Ok(n) => {
                        truncated = append_capped(
                            &mut output,
                            &mut char_count,
                            &err_buf[..n],
                            self.max_output_chars,
                        );
                    }
                    Err(e) => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return ExecutionResult::system_error(&e.to_string());
                    }
                },
                _ = tokio::time::sleep_until(deadline) => {
                    log::warn!("command timed out after {} ms", timeout.as_millis());
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return ExecutionResult::timed_out(output, timeout);
                }
            }
        }

        let status = if truncated {
            output.push_str(TRUNCATION_MARKER);
            let _ = child.start_kill();
            match child.wait().await {
                Ok(status) => status,
                Err(e) => return ExecutionResult::system_error(&e.to_string()),
            }
        } else {
            match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => return ExecutionResult::system_error(&e.to_string()),
                Err(_) => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return ExecutionResult::timed_out(output, timeout);
                }
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        ExecutionResult {
            success: exit_code == 0,
            output,
            exit_code,
        }
    }
}

/// Appends a chunk to the buffer; reports whether the cap is now exceeded.
fn append_capped(output: &mut String, char_count: &mut usize, chunk: &[u8], cap: usize) -> bool {
    let text = String::from_utf8_lossy(chunk);
    *char_count += text.chars().count();
    output.push_str(&text);
    *char_count > cap
}
