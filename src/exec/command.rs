// src/exec/command.rs

//! Shell-command generator.

use std::process::Stdio;

use anyhow::Context;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, TreedocError};
use crate::exec::generator::{GenerateRequest, Generator, ProgressSink};
use crate::store::ChildArtifacts;
use crate::types::{BoxFuture, UnitId};

pub const ENV_LANGUAGE: &str = "TREEDOC_LANGUAGE";
pub const ENV_DIRECTORY: &str = "TREEDOC_DIRECTORY";
pub const ENV_OUTPUT: &str = "TREEDOC_OUTPUT";
pub const ENV_FILES: &str = "TREEDOC_FILES";

/// Runs a configured shell command once per unit.
///
/// The command runs in the unit's directory and learns what to do from
/// environment variables:
///
/// - `TREEDOC_LANGUAGE`: the unit's language tag
/// - `TREEDOC_DIRECTORY`: the unit's directory
/// - `TREEDOC_OUTPUT`: where the artifact must be written
/// - `TREEDOC_FILES`: the unit's files, one per line
///
/// Child artifacts arrive on stdin as `=== <child> ===` sections. Stdout lines
/// become progress messages (optionally filtered by `progress_pattern`, whose
/// first capture group, if any, is the message). Stderr is logged at debug.
#[derive(Debug, Clone)]
pub struct CommandGenerator {
    cmd: String,
    progress_pattern: Option<Regex>,
}

impl CommandGenerator {
    pub fn new(cmd: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            progress_pattern: None,
        }
    }

    pub fn with_progress_pattern(mut self, pattern: Option<Regex>) -> Self {
        self.progress_pattern = pattern;
        self
    }

    fn build_command(&self, request: &GenerateRequest) -> Command {
        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.cmd);
            c
        };

        let unit = &request.unit;
        let files = unit
            .files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");

        cmd.current_dir(&unit.directory)
            .env(ENV_LANGUAGE, &unit.language)
            .env(ENV_DIRECTORY, &unit.directory)
            .env(ENV_OUTPUT, &request.artifact_path)
            .env(ENV_FILES, files)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        cmd
    }

    async fn run(&self, request: GenerateRequest) -> Result<()> {
        let unit = &request.unit;
        if unit.files.is_empty() {
            return Err(TreedocError::Generator(format!(
                "unit {} has no files to generate from",
                unit.id
            )));
        }

        info!(
            unit = %unit.id,
            worker = request.progress.worker(),
            cmd = %self.cmd,
            "starting generator process"
        );

        let mut child = self
            .build_command(&request)
            .spawn()
            .with_context(|| format!("spawning generator for unit {}", unit.id))?;

        if let Some(stdin) = child.stdin.take() {
            spawn_stdin_writer(unit.id.clone(), stdin, request.child_artifacts.clone());
        }
        if let Some(stdout) = child.stdout.take() {
            spawn_stdout_monitor(stdout, request.progress.clone(), self.progress_pattern.clone());
        }
        let stderr_tail = child
            .stderr
            .take()
            .map(|stderr| spawn_stderr_logger(unit.id.clone(), stderr));

        // Either the process exits on its own, or the run is cancelled.
        tokio::select! {
            biased;

            _ = request.cancel.cancelled() => {
                info!(unit = %unit.id, "cancellation requested; killing generator process");
                if let Err(e) = child.kill().await {
                    warn!(unit = %unit.id, error = %e, "failed to kill generator process");
                }
                Err(TreedocError::Cancelled)
            }

            status = child.wait() => {
                let status = status
                    .with_context(|| format!("waiting for generator of unit {}", unit.id))?;
                let code = status.code().unwrap_or(-1);

                info!(
                    unit = %unit.id,
                    exit_code = code,
                    success = status.success(),
                    "generator process exited"
                );

                if status.success() {
                    return Ok(());
                }

                let last_line = match stderr_tail {
                    Some(handle) => handle.await.ok().flatten(),
                    None => None,
                };
                Err(TreedocError::Generator(match last_line {
                    Some(line) => format!("exit code {code}: {line}"),
                    None => format!("exit code {code}"),
                }))
            }
        }
    }
}

impl Generator for CommandGenerator {
    fn generate(&self, request: GenerateRequest) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.run(request))
    }
}

/// Render child artifacts the way they are fed to the generator's stdin.
pub fn render_child_artifacts(children: &ChildArtifacts) -> String {
    let mut out = String::new();
    for (name, content) in children {
        out.push_str("=== ");
        out.push_str(name);
        out.push_str(" ===\n");
        out.push_str(content);
        if !content.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// Extract a progress message from one stdout line.
///
/// Without a pattern every non-blank line counts. With a pattern only
/// matching lines count, reduced to capture group 1 when the pattern has one.
pub fn progress_message(line: &str, pattern: Option<&Regex>) -> Option<String> {
    match pattern {
        None => {
            let trimmed = line.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(re) => {
            let caps = re.captures(line)?;
            let m = caps.get(1).or_else(|| caps.get(0))?;
            Some(m.as_str().to_string())
        }
    }
}

fn spawn_stdin_writer(unit: UnitId, mut stdin: ChildStdin, children: ChildArtifacts) {
    tokio::spawn(async move {
        let payload = render_child_artifacts(&children);
        // The command may not read stdin at all; a broken pipe is fine.
        if let Err(e) = stdin.write_all(payload.as_bytes()).await {
            debug!(unit = %unit, error = %e, "generator did not consume stdin");
        }
        drop(stdin);
    });
}

fn spawn_stdout_monitor(stdout: ChildStdout, progress: ProgressSink, pattern: Option<Regex>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(message) = progress_message(&line, pattern.as_ref()) {
                progress.report(message).await;
            }
        }
    });
}

/// Always consume stderr so buffers don't fill; log at debug and hand back
/// the last non-blank line for error reporting.
fn spawn_stderr_logger(unit: UnitId, stderr: ChildStderr) -> JoinHandle<Option<String>> {
    tokio::spawn(async move {
        let mut last = None;
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(unit = %unit, "stderr: {}", line);
            if !line.trim().is_empty() {
                last = Some(line);
            }
        }
        last
    })
}
