//! Follower-side polling loop
//!
//! Followers observe the state channel at a fixed interval until the producer
//! reports a terminal status. The loop has no timeout of its own; the caller
//! supplies a deadline and, optionally, a cancellation receiver.

use crate::distributed::channel::{StateChannel, TransportError};
use crate::distributed::protocol::RemoteStateStatus;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, trace};

/// Default interval between observations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result of waiting for the producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Producer passed; carries its payload
    Passed(Vec<u8>),

    /// Producer reported failure
    Failed,

    /// Producer disappeared before finishing
    Disappeared,

    /// Observation failed; the wait is abandoned
    Transport(TransportError),

    /// Deadline reached before a terminal status
    TimedOut,

    /// Cancellation was requested
    Cancelled,
}

/// Poll `channel` every `interval` until a terminal status is observed
///
/// A transport error ends the wait immediately. `Pending` and `Invalid` keep
/// polling. The deadline and cancellation are checked while sleeping between
/// observations and while an observation is in flight.
pub async fn wait_for_producer(
    channel: &dyn StateChannel,
    interval: Duration,
    deadline: Option<Instant>,
    mut cancel: Option<watch::Receiver<bool>>,
) -> WaitOutcome {
    let mut attempts: u64 = 0;

    loop {
        if is_cancelled(cancel.as_ref()) {
            return WaitOutcome::Cancelled;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return WaitOutcome::TimedOut;
        }

        attempts += 1;
        let observed = tokio::select! {
            result = channel.observe() => Some(result),
            _ = wait_deadline(deadline) => None,
            _ = wait_cancelled(cancel.as_mut()) => {
                return WaitOutcome::Cancelled;
            }
        };

        let state = match observed {
            None => return WaitOutcome::TimedOut,
            Some(Err(e)) => {
                debug!(attempts, error = %e, reason = e.reason(), "Before-suite state unavailable");
                return WaitOutcome::Transport(e);
            }
            Some(Ok(state)) => state,
        };

        if state.state.is_terminal() {
            debug!(attempts, state = %state.state, bytes = state.data.len(), "Producer finished");
            return match state.state {
                RemoteStateStatus::Passed => WaitOutcome::Passed(state.data),
                RemoteStateStatus::Failed => WaitOutcome::Failed,
                _ => WaitOutcome::Disappeared,
            };
        }
        trace!(attempts, state = %state.state, "Producer not finished");

        let wake = Instant::now() + interval;
        tokio::select! {
            _ = sleep_until(wake) => {}
            _ = wait_deadline(deadline) => return WaitOutcome::TimedOut,
            _ = wait_cancelled(cancel.as_mut()) => return WaitOutcome::Cancelled,
        }
    }
}

fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

/// Resolves at the deadline, never if there is none
async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(d) => sleep_until(d).await,
        None => std::future::pending().await,
    }
}

/// Resolves once cancellation is requested
///
/// A dropped sender means nobody can cancel any more, so this never resolves.
pub(crate) async fn wait_cancelled(cancel: Option<&mut watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::channel::MemoryStateChannel;
    use crate::distributed::protocol::RemoteState;

    #[tokio::test(start_paused = true)]
    async fn test_returns_payload_once_passed() {
        let channel = MemoryStateChannel::new();
        let producer = channel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            producer.publish(&RemoteState::passed(b"P".to_vec())).await;
        });

        let outcome = wait_for_producer(&channel, DEFAULT_POLL_INTERVAL, None, None).await;

        assert_eq!(outcome, WaitOutcome::Passed(b"P".to_vec()));
        // t=0, 50, 100 pending; t=150 passed
        assert_eq!(channel.observe_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cadence() {
        let channel = MemoryStateChannel::new();
        let start = Instant::now();

        let outcome = wait_for_producer(
            &channel,
            DEFAULT_POLL_INTERVAL,
            Some(start + Duration::from_millis(500)),
            None,
        )
        .await;

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_millis(500));
        // One observation per interval at most
        assert!(channel.observe_count() <= 11);
        assert!(channel.observe_count() >= 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_and_disappeared() {
        let channel = MemoryStateChannel::new();
        channel.publish(&RemoteState::failed(Vec::new())).await;
        assert_eq!(
            wait_for_producer(&channel, DEFAULT_POLL_INTERVAL, None, None).await,
            WaitOutcome::Failed
        );

        channel.set_state(RemoteState {
            data: Vec::new(),
            state: RemoteStateStatus::Disappeared,
        });
        assert_eq!(
            wait_for_producer(&channel, DEFAULT_POLL_INTERVAL, None, None).await,
            WaitOutcome::Disappeared
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_is_not_retried() {
        let channel = MemoryStateChannel::new();
        channel.fail_observations_with(TransportError::Decode {
            reason: "bad json".to_string(),
        });

        let outcome = wait_for_producer(&channel, DEFAULT_POLL_INTERVAL, None, None).await;

        assert!(matches!(outcome, WaitOutcome::Transport(TransportError::Decode { .. })));
        assert_eq!(channel.observe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_state_keeps_polling() {
        let channel = MemoryStateChannel::new();
        channel.set_state(RemoteState {
            data: Vec::new(),
            state: RemoteStateStatus::Invalid,
        });
        let writer = channel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(75)).await;
            writer.publish(&RemoteState::passed(vec![7])).await;
        });

        let outcome = wait_for_producer(&channel, DEFAULT_POLL_INTERVAL, None, None).await;
        assert_eq!(outcome, WaitOutcome::Passed(vec![7]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation() {
        let channel = MemoryStateChannel::new();
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            let _ = tx.send(true);
        });

        let outcome = wait_for_producer(&channel, DEFAULT_POLL_INTERVAL, None, Some(rx)).await;
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled() {
        let channel = MemoryStateChannel::new();
        let (_tx, rx) = watch::channel(true);

        let outcome = wait_for_producer(&channel, DEFAULT_POLL_INTERVAL, None, Some(rx)).await;

        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert_eq!(channel.observe_count(), 0);
    }
}
