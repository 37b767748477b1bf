//! Setup bodies backed by shell commands
//!
//! The producer command's stdout becomes the shared payload. The consumer
//! command receives the payload on stdin. A non-zero exit fails the phase with
//! the command and its exit status in the message. Both bodies watch their
//! [`Done`] handle and kill the child once it is cancelled.

use crate::setup::body::{fail, Consumer, Done, Producer};
use std::io::{self, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How often a running child is checked for exit or cancellation
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to read output of `{command}`")]
    Output { command: String },

    #[error("`{command}` {status}")]
    Exit { command: String, status: ExitStatus },

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },
}

/// Phase A body running `command`; its stdout is the payload
pub fn producer_from_command(command: impl Into<String>) -> Producer {
    let command = command.into();
    Producer::cancelable(move |done| match run_command(&command, None, &done) {
        Ok(stdout) => stdout,
        Err(e) => fail(e.to_string()),
    })
}

/// Phase B body running `command` with the payload on stdin
pub fn consumer_from_command(command: impl Into<String>) -> Consumer {
    let command = command.into();
    Consumer::payload_and_done(move |payload, done| {
        if let Err(e) = run_command(&command, Some(payload), &done) {
            fail(e.to_string());
        }
    })
}

/// Run `command` under `sh -c`, feeding `stdin` and collecting stdout
///
/// Stderr is inherited. The child is killed if `done` is cancelled before it
/// exits.
pub fn run_command(command: &str, stdin: Option<Vec<u8>>, done: &Done) -> Result<Vec<u8>, ShellError> {
    debug!(command, "Running shell command");

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|source| ShellError::Spawn {
            command: command.to_string(),
            source,
        })?;

    // Feed and drain on helper threads so a large payload cannot deadlock the pipes
    let writer = match (stdin, child.stdin.take()) {
        (Some(data), Some(mut pipe)) => Some(thread::spawn(move || {
            // A command may exit without reading its input
            let _ = pipe.write_all(&data);
        })),
        _ => None,
    };
    let reader = child.stdout.take().map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf).map(|_| buf)
        })
    });

    let status = loop {
        if done.is_cancelled() {
            let _ = child.kill();
            let _ = child.wait();
            return Err(ShellError::Cancelled {
                command: command.to_string(),
            });
        }
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => thread::sleep(CHILD_POLL_INTERVAL),
            Err(source) => {
                return Err(ShellError::Wait {
                    command: command.to_string(),
                    source,
                })
            }
        }
    };

    if let Some(writer) = writer {
        let _ = writer.join();
    }
    let stdout = match reader.map(|r| r.join()) {
        Some(Ok(Ok(buf))) => buf,
        None => Vec::new(),
        Some(_) => {
            return Err(ShellError::Output {
                command: command.to_string(),
            })
        }
    };

    if !status.success() {
        return Err(ShellError::Exit {
            command: command.to_string(),
            status,
        });
    }

    debug!(command, bytes = stdout.len(), "Shell command finished");
    Ok(stdout)
}
