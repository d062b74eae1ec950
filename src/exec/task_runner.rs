// src/exec/task_runner.rs

//! Individual task process runner.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use crate::engine::{RunnableTask, TaskOutcome};

/// Process settings shared by every task a backend runs.
#[derive(Debug, Clone, Default)]
pub struct ProcessSettings {
    /// Working directory for commands; the current one when `None`.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables on top of the inherited environment.
    pub env: BTreeMap<String, String>,
}

/// Run a single task's command to completion and map the result.
///
/// - exit code 0 is [`TaskOutcome::Success`];
/// - any other exit code is [`TaskOutcome::Failed`];
/// - spawn and wait errors are `Failed(-1)`;
/// - cancellation of the task's instance kills the process and yields
///   [`TaskOutcome::Cancelled`].
pub async fn run_task(task: &RunnableTask, settings: &ProcessSettings) -> TaskOutcome {
    match run_task_inner(task, settings).await {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(
                instance = %task.instance_id,
                task = %task.task_url,
                error = %err,
                "task execution error"
            );
            TaskOutcome::Failed(-1)
        }
    }
}

async fn run_task_inner(task: &RunnableTask, settings: &ProcessSettings) -> Result<TaskOutcome> {
    info!(
        instance = %task.instance_id,
        task = %task.task_url,
        cmd = %task.command,
        "starting task process"
    );

    let mut cmd = shell_command(&task.command);
    if let Some(dir) = &settings.working_dir {
        cmd.current_dir(dir);
    }
    cmd.envs(&settings.env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for task '{}'", task.task_url))?;

    // Always consume both pipes so buffers don't fill; log at debug.
    forward_lines(child.stdout.take(), task.task_url.clone(), "stdout");
    forward_lines(child.stderr.take(), task.task_url.clone(), "stderr");

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res.with_context(|| {
                format!("waiting for process of task '{}'", task.task_url)
            })?;

            let code = status.code().unwrap_or(-1);
            info!(
                instance = %task.instance_id,
                task = %task.task_url,
                exit_code = code,
                success = status.success(),
                "task process exited"
            );

            Ok(if status.success() {
                TaskOutcome::Success
            } else {
                TaskOutcome::Failed(code)
            })
        }

        _ = task.cancel.cancelled() => {
            info!(
                instance = %task.instance_id,
                task = %task.task_url,
                "instance cancelled; killing process"
            );
            if let Err(e) = child.kill().await {
                warn!(
                    task = %task.task_url,
                    error = %e,
                    "failed to kill child process on cancellation"
                );
            }
            Ok(TaskOutcome::Cancelled)
        }
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(line);
        c
    }
}

fn forward_lines<R>(reader: Option<R>, task_url: String, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(reader) = reader else {
        return;
    };
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(task = %task_url, stream, "{}", line);
        }
    });
}
