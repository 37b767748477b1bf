//! Synchronized before-suite setup
//!
//! Runs phase A exactly once across the fleet and phase B on every node.
//!
//! # State machine
//!
//! ```text
//! NotStarted ──> RunningA ──────────────┐           (node 1)
//!          └───> AwaitingA ─────────────┤           (nodes 2..N)
//!                                       ├─ A failed ──> Done(FailedAt A)
//!                                       └─ A passed ──> RunningB ──> Done(PassedBoth | FailedAt B)
//! ```
//!
//! Node 1 publishes the result of phase A once it has finished, unless it is
//! alone in the fleet, in which case no state channel is touched at all.

use crate::distributed::channel::{StateChannel, TransportError};
use crate::distributed::node::NodeIdentity;
use crate::distributed::poll::{wait_for_producer, WaitOutcome, DEFAULT_POLL_INTERVAL};
use crate::distributed::protocol::RemoteState;
use crate::setup::body::{Argument, ConfigError, Consumer, PayloadSlot, PhaseBody, Producer};
use crate::setup::outcome::{
    CodeLocation, ComponentType, PhaseContext, PhaseOutcome, PhaseState, SetupSummary,
};
use crate::setup::runner::{PhaseRunner, TimedRunner};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default timeout for each phase
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Which half of the setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Shared setup, node 1 only
    A,
    /// Per-node setup
    B,
}

/// How a finished setup ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    PassedBoth,
    FailedAt(Phase),
}

/// Progress of a synchronized setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    NotStarted,
    RunningA,
    AwaitingA,
    RunningB,
    Done(Terminal),
}

/// Registers the two bodies and the environment of a synchronized setup
///
/// Registration problems are collected and reported by [`build`](Self::build),
/// so nothing runs until the whole registration is known to be valid.
pub struct SetupBuilder {
    producer: Option<Result<Producer, ConfigError>>,
    consumer: Option<Result<Consumer, ConfigError>>,
    duplicate: Option<Argument>,
    location: CodeLocation,
    node: NodeIdentity,
    channel: Option<Arc<dyn StateChannel>>,
    runner: Option<Arc<dyn PhaseRunner>>,
    timeout: Duration,
    wait_timeout: Option<Duration>,
    poll_interval: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl SetupBuilder {
    /// Start a registration located at the caller
    #[track_caller]
    pub fn new() -> Self {
        Self {
            producer: None,
            consumer: None,
            duplicate: None,
            location: CodeLocation::caller(),
            node: NodeIdentity::standalone(),
            channel: None,
            runner: None,
            timeout: DEFAULT_TIMEOUT,
            wait_timeout: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: None,
        }
    }

    /// Phase A body
    pub fn producer(self, producer: Producer) -> Self {
        self.set_producer(Ok(producer))
    }

    /// Phase A body of unknown shape, validated at build time
    pub fn untyped_producer(self, body: Box<dyn Any + Send>) -> Self {
        self.set_producer(Producer::from_untyped(body))
    }

    /// Phase B body
    pub fn consumer(self, consumer: Consumer) -> Self {
        self.set_consumer(Ok(consumer))
    }

    /// Phase B body of unknown shape, validated at build time
    pub fn untyped_consumer(self, body: Box<dyn Any + Send>) -> Self {
        self.set_consumer(Consumer::from_untyped(body))
    }

    pub fn location(mut self, location: CodeLocation) -> Self {
        self.location = location;
        self
    }

    pub fn node(mut self, node: NodeIdentity) -> Self {
        self.node = node;
        self
    }

    /// Transport to the sync host; required when the fleet has more than one node
    pub fn channel(mut self, channel: Arc<dyn StateChannel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Replace the default [`TimedRunner`]
    pub fn runner(mut self, runner: Arc<dyn PhaseRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Timeout for each phase run on this node
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Give up waiting for node 1 after `timeout`
    ///
    /// Followers wait indefinitely by default. Node 1 may start later than a
    /// follower, so this should comfortably exceed node 1's phase timeout.
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Abandon the setup when `cancel` becomes `true`
    pub fn cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Validate the registration and produce a runnable setup
    pub fn build(self) -> Result<CompoundSetup, ConfigError> {
        if let Some(argument) = self.duplicate {
            return Err(ConfigError::Duplicate(argument));
        }
        let producer = self.producer.ok_or(ConfigError::Missing(Argument::First))??;
        let consumer = self.consumer.ok_or(ConfigError::Missing(Argument::Second))??;

        let channel = match (self.node.is_distributed(), self.channel) {
            (true, None) => {
                return Err(ConfigError::MissingChannel {
                    total: self.node.total(),
                })
            }
            (true, channel) => channel,
            // A fleet of one never touches the channel
            (false, _) => None,
        };

        let runner: Arc<dyn PhaseRunner> = match (self.runner, self.cancel.clone()) {
            (Some(runner), _) => runner,
            (None, Some(cancel)) => Arc::new(TimedRunner::with_cancellation(cancel)),
            (None, None) => Arc::new(TimedRunner::new()),
        };

        let payload = PayloadSlot::new();
        let context = PhaseContext {
            location: self.location,
            component_type: ComponentType::BeforeSuite,
            component_index: 0,
            timeout: self.timeout,
        };

        Ok(CompoundSetup {
            body_a: producer.wrap(payload.clone()),
            body_b: consumer.wrap(payload.clone()),
            payload,
            node: self.node,
            channel,
            runner,
            context,
            wait_timeout: self.wait_timeout,
            poll_interval: self.poll_interval,
            cancel: self.cancel,
            phase: SetupPhase::NotStarted,
            outcome: None,
            run_time: Duration::ZERO,
        })
    }

    fn set_producer(mut self, producer: Result<Producer, ConfigError>) -> Self {
        if self.producer.is_some() {
            self.duplicate.get_or_insert(Argument::First);
        }
        self.producer = Some(producer);
        self
    }

    fn set_consumer(mut self, consumer: Result<Consumer, ConfigError>) -> Self {
        if self.consumer.is_some() {
            self.duplicate.get_or_insert(Argument::Second);
        }
        self.consumer = Some(consumer);
        self
    }
}

impl Default for SetupBuilder {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

/// A validated synchronized setup for one node
pub struct CompoundSetup {
    body_a: PhaseBody,
    body_b: PhaseBody,
    payload: PayloadSlot,
    node: NodeIdentity,
    channel: Option<Arc<dyn StateChannel>>,
    runner: Arc<dyn PhaseRunner>,
    context: PhaseContext,
    wait_timeout: Option<Duration>,
    poll_interval: Duration,
    cancel: Option<watch::Receiver<bool>>,
    phase: SetupPhase,
    outcome: Option<PhaseOutcome>,
    run_time: Duration,
}

impl CompoundSetup {
    /// Run the setup on this node
    ///
    /// Returns whether both phases passed. Details are available from
    /// [`summary`](Self::summary) afterwards.
    pub async fn run(&mut self) -> bool {
        let start = Instant::now();
        self.payload.clear();

        info!(node = %self.node, location = %self.context.location, "Starting synchronized setup");

        let outcome_a = if self.node.is_producer() {
            self.phase = SetupPhase::RunningA;
            self.run_a().await
        } else {
            self.phase = SetupPhase::AwaitingA;
            self.wait_for_a().await
        };

        let outcome = if outcome_a.is_passed() {
            self.phase = SetupPhase::RunningB;
            let outcome_b = self.runner.run(&self.body_b, &self.context).await;
            self.phase = SetupPhase::Done(if outcome_b.is_passed() {
                Terminal::PassedBoth
            } else {
                Terminal::FailedAt(Phase::B)
            });
            outcome_b
        } else {
            // An abandoned producer must not leave a payload behind
            self.payload.clear();
            self.phase = SetupPhase::Done(Terminal::FailedAt(Phase::A));
            outcome_a
        };

        self.run_time = start.elapsed();
        match outcome.failure {
            None => info!(node = %self.node, elapsed_ms = self.run_time.as_millis() as u64, "Synchronized setup passed"),
            Some(ref failure) => warn!(
                node = %self.node,
                state = %outcome.state,
                message = %failure.message,
                "Synchronized setup failed"
            ),
        }

        let passed = outcome.is_passed();
        self.outcome = Some(outcome);
        passed
    }

    /// Producer side: run phase A, then publish its result to the fleet
    async fn run_a(&self) -> PhaseOutcome {
        let outcome = self.runner.run(&self.body_a, &self.context).await;

        if let Some(ref channel) = self.channel {
            let state = if outcome.is_passed() {
                RemoteState::passed(self.payload.load())
            } else {
                RemoteState::failed(Vec::new())
            };
            debug!(node = %self.node, state = %state.state, bytes = state.data.len(), "Publishing before-suite state");
            channel.publish(&state).await;
        }

        outcome
    }

    /// Follower side: wait for node 1 and adopt its payload
    async fn wait_for_a(&self) -> PhaseOutcome {
        let Some(ref channel) = self.channel else {
            // Unreachable: followers only exist in distributed fleets, which require a channel
            return PhaseOutcome::failed(
                PhaseState::Failed,
                self.context.failure("Failed to fetch BeforeSuite state"),
            );
        };

        // A deadline past the clock's range is no deadline
        let deadline = self
            .wait_timeout
            .and_then(|t| tokio::time::Instant::now().checked_add(t));
        let waited = wait_for_producer(
            channel.as_ref(),
            self.poll_interval,
            deadline,
            self.cancel.clone(),
        )
        .await;

        let (state, message) = match waited {
            WaitOutcome::Passed(data) => {
                self.payload.store(data);
                return PhaseOutcome::passed();
            }
            WaitOutcome::Failed => (PhaseState::Failed, "BeforeSuite on Node 1 failed".to_string()),
            WaitOutcome::Disappeared => (
                PhaseState::Failed,
                "Node 1 disappeared before completing BeforeSuite".to_string(),
            ),
            WaitOutcome::Transport(e) => (PhaseState::Failed, follower_transport_message(&e)),
            WaitOutcome::TimedOut => (
                PhaseState::TimedOut,
                "Timed out waiting for BeforeSuite on Node 1".to_string(),
            ),
            WaitOutcome::Cancelled => (
                PhaseState::Failed,
                "Cancelled while waiting for BeforeSuite on Node 1".to_string(),
            ),
        };

        PhaseOutcome::failed(state, self.context.failure(message))
    }

    /// Whether the last run passed both phases
    pub fn passed(&self) -> bool {
        self.outcome.as_ref().is_some_and(PhaseOutcome::is_passed)
    }

    pub fn phase(&self) -> SetupPhase {
        self.phase
    }

    pub fn node(&self) -> NodeIdentity {
        self.node
    }

    /// Payload currently held by this node
    pub fn payload(&self) -> Vec<u8> {
        self.payload.load()
    }

    /// Reporter-facing summary of the last run
    pub fn summary(&self) -> SetupSummary {
        SetupSummary {
            component_type: self.context.component_type,
            code_location: self.context.location.clone(),
            state: self.outcome.as_ref().map(|o| o.state),
            run_time: self.run_time,
            failure: self.outcome.as_ref().and_then(|o| o.failure.clone()),
        }
    }
}

fn follower_transport_message(error: &TransportError) -> String {
    match error {
        TransportError::Fetch { .. } => "Failed to fetch BeforeSuite state",
        TransportError::Read { .. } => "Failed to read BeforeSuite state",
        TransportError::Decode { .. } => "Failed to decode BeforeSuite state",
    }
    .to_string()
}
