//! Phase runner
//!
//! A phase runner executes one normalized [`PhaseBody`] and turns whatever
//! happens into a [`PhaseOutcome`]. The synchronized setup only depends on the
//! [`PhaseRunner`] trait; [`TimedRunner`] is the implementation used unless
//! the caller supplies its own.
//!
//! # Outcome mapping
//!
//! | Body behaviour                   | State      | Message            |
//! |----------------------------------|------------|--------------------|
//! | returns                          | `Passed`   |                    |
//! | calls [`fail`](super::body::fail) | `Failed`  | the given message  |
//! | any other panic                  | `Panicked` | `Test Panicked`    |
//! | exceeds the timeout              | `TimedOut` | `Timed out`        |
//! | owner cancels                    | `Failed`   | `Cancelled`        |

use crate::distributed::poll::wait_cancelled;
use crate::setup::body::{Done, FailureMarker, PhaseBody};
use crate::setup::outcome::{PhaseContext, PhaseOutcome, PhaseState};
use async_trait::async_trait;
use std::any::Any;
use tokio::sync::watch;
use tracing::debug;

/// Executes a single phase body
#[async_trait]
pub trait PhaseRunner: Send + Sync {
    async fn run(&self, body: &PhaseBody, context: &PhaseContext) -> PhaseOutcome;
}

/// Runs bodies on the blocking pool under the context's timeout
///
/// An overrunning body is abandoned, not killed: its [`Done`] handle flips to
/// cancelled and the runner reports `TimedOut` straight away.
#[derive(Debug, Clone, Default)]
pub struct TimedRunner {
    cancel: Option<watch::Receiver<bool>>,
}

impl TimedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also abandon the body when `cancel` becomes `true`
    pub fn with_cancellation(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }
}

#[async_trait]
impl PhaseRunner for TimedRunner {
    async fn run(&self, body: &PhaseBody, context: &PhaseContext) -> PhaseOutcome {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let done = Done::new(cancel_rx);
        let task_body = body.clone();
        let handle = tokio::task::spawn_blocking(move || task_body.invoke(done));

        let mut external = self.cancel.clone();
        let joined = tokio::select! {
            joined = tokio::time::timeout(context.timeout, handle) => joined,
            _ = wait_cancelled(external.as_mut()) => {
                let _ = cancel_tx.send(true);
                debug!(component = %context.component_type, "Phase cancelled");
                return PhaseOutcome::failed(PhaseState::Failed, context.failure("Cancelled"));
            }
        };

        let outcome = match joined {
            Ok(Ok(())) => PhaseOutcome::passed(),
            Ok(Err(e)) if e.is_panic() => panic_outcome(e.into_panic(), context),
            Ok(Err(_)) => PhaseOutcome::failed(PhaseState::Failed, context.failure("Aborted")),
            Err(_) => {
                let _ = cancel_tx.send(true);
                PhaseOutcome::failed(PhaseState::TimedOut, context.failure("Timed out"))
            }
        };

        debug!(
            component = %context.component_type,
            location = %context.location,
            state = %outcome.state,
            "Phase finished"
        );
        outcome
    }
}

fn panic_outcome(payload: Box<dyn Any + Send>, context: &PhaseContext) -> PhaseOutcome {
    let payload = match payload.downcast::<FailureMarker>() {
        Ok(marker) => {
            return PhaseOutcome::failed(PhaseState::Failed, context.failure(marker.message));
        }
        Err(other) => other,
    };

    let mut failure = context.failure("Test Panicked");
    failure.forwarded_panic = Some(render_panic(payload.as_ref()));
    PhaseOutcome::failed(PhaseState::Panicked, failure)
}

fn render_panic(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
