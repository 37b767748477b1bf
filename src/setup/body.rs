//! Setup bodies
//!
//! A synchronized setup takes two user bodies:
//!
//! - a **producer** (phase A) that returns the shared payload, either
//!   `Fn() -> Vec<u8>` or `Fn(Done) -> Vec<u8>`
//! - a **consumer** (phase B) that receives the payload, either
//!   `Fn(Vec<u8>)` or `Fn(Vec<u8>, Done)`
//!
//! Both are normalized into a [`PhaseBody`], which is what a phase runner
//! executes. The producer's wrapper stores its return value in a
//! [`PayloadSlot`]; the consumer's wrapper reads the slot when it runs.
//!
//! Bodies signal failure by panicking. [`fail`] panics with a marker that the
//! runner reports as a plain failure carrying the given message.
//!
//! # Example
//!
//! ```
//! use syncsuite::setup::{Consumer, Producer};
//!
//! let producer = Producer::no_arg(|| b"db-url".to_vec());
//! let consumer = Consumer::payload(|data| assert_eq!(data, b"db-url"));
//! # let _ = (producer, consumer);
//! ```

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::sync::watch;

/// Producer taking no arguments
pub type ProducerFn = dyn Fn() -> Vec<u8> + Send + Sync;
/// Producer taking a [`Done`] handle
pub type CancelableProducerFn = dyn Fn(Done) -> Vec<u8> + Send + Sync;
/// Consumer taking only the payload
pub type ConsumerFn = dyn Fn(Vec<u8>) + Send + Sync;
/// Consumer taking the payload and a [`Done`] handle
pub type CancelableConsumerFn = dyn Fn(Vec<u8>, Done) + Send + Sync;

/// Which registration argument a [`ConfigError`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argument {
    /// The producer
    First,
    /// The consumer
    Second,
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::First => write!(f, "first"),
            Argument::Second => write!(f, "second"),
        }
    }
}

/// Invalid synchronized setup registration
///
/// Raised when the setup is built, before any phase runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("SynchronizedBeforeSuite's first argument should be a function that returns Vec<u8> and either takes no arguments or takes a Done handle")]
    InvalidProducer,

    #[error("SynchronizedBeforeSuite's second argument should be a function that returns nothing and either takes Vec<u8> or (Vec<u8>, Done)")]
    InvalidConsumer,

    #[error("SynchronizedBeforeSuite is missing its {0} argument")]
    Missing(Argument),

    #[error("SynchronizedBeforeSuite's {0} argument was registered more than once")]
    Duplicate(Argument),

    #[error("SynchronizedBeforeSuite on {total} nodes needs a state channel")]
    MissingChannel { total: usize },
}

impl ConfigError {
    /// The argument this error names, if any
    pub fn argument(&self) -> Option<Argument> {
        match self {
            ConfigError::InvalidProducer => Some(Argument::First),
            ConfigError::InvalidConsumer => Some(Argument::Second),
            ConfigError::Missing(arg) | ConfigError::Duplicate(arg) => Some(*arg),
            ConfigError::MissingChannel { .. } => None,
        }
    }
}

/// Cancellation handle given to bodies that accept one
///
/// Flips to cancelled when the runner gives up on the body (timeout) or the
/// owner cancels the setup.
#[derive(Debug, Clone)]
pub struct Done {
    cancel: watch::Receiver<bool>,
}

impl Done {
    pub fn new(cancel: watch::Receiver<bool>) -> Self {
        Self { cancel }
    }

    /// A handle that is never cancelled
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { cancel: rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

/// Phase A body
#[derive(Clone)]
pub enum Producer {
    NoArg(Arc<ProducerFn>),
    Cancelable(Arc<CancelableProducerFn>),
}

impl Producer {
    pub fn no_arg<F>(body: F) -> Self
    where
        F: Fn() -> Vec<u8> + Send + Sync + 'static,
    {
        Producer::NoArg(Arc::new(body))
    }

    pub fn cancelable<F>(body: F) -> Self
    where
        F: Fn(Done) -> Vec<u8> + Send + Sync + 'static,
    {
        Producer::Cancelable(Arc::new(body))
    }

    /// Accept a type-erased body
    ///
    /// The body must be a `Box<ProducerFn>` or `Box<CancelableProducerFn>`.
    pub fn from_untyped(body: Box<dyn Any + Send>) -> Result<Self, ConfigError> {
        let body = match body.downcast::<Box<ProducerFn>>() {
            Ok(f) => return Ok(Producer::NoArg(Arc::from(*f))),
            Err(other) => other,
        };
        match body.downcast::<Box<CancelableProducerFn>>() {
            Ok(f) => Ok(Producer::Cancelable(Arc::from(*f))),
            Err(_) => Err(ConfigError::InvalidProducer),
        }
    }

    /// Normalize into a phase body that stores its result in `slot`
    pub fn wrap(&self, slot: PayloadSlot) -> PhaseBody {
        match self {
            Producer::NoArg(f) => {
                let f = Arc::clone(f);
                PhaseBody::Plain(Arc::new(move || {
                    let generation = slot.generation();
                    slot.store_if_current(generation, f());
                }))
            }
            Producer::Cancelable(f) => {
                let f = Arc::clone(f);
                PhaseBody::WithDone(Arc::new(move |done| {
                    let generation = slot.generation();
                    slot.store_if_current(generation, f(done));
                }))
            }
        }
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Producer::NoArg(_) => write!(f, "Producer::NoArg"),
            Producer::Cancelable(_) => write!(f, "Producer::Cancelable"),
        }
    }
}

/// Phase B body
#[derive(Clone)]
pub enum Consumer {
    Payload(Arc<ConsumerFn>),
    PayloadAndDone(Arc<CancelableConsumerFn>),
}

impl Consumer {
    pub fn payload<F>(body: F) -> Self
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        Consumer::Payload(Arc::new(body))
    }

    pub fn payload_and_done<F>(body: F) -> Self
    where
        F: Fn(Vec<u8>, Done) + Send + Sync + 'static,
    {
        Consumer::PayloadAndDone(Arc::new(body))
    }

    /// Accept a type-erased body
    ///
    /// The body must be a `Box<ConsumerFn>` or `Box<CancelableConsumerFn>`.
    pub fn from_untyped(body: Box<dyn Any + Send>) -> Result<Self, ConfigError> {
        let body = match body.downcast::<Box<ConsumerFn>>() {
            Ok(f) => return Ok(Consumer::Payload(Arc::from(*f))),
            Err(other) => other,
        };
        match body.downcast::<Box<CancelableConsumerFn>>() {
            Ok(f) => Ok(Consumer::PayloadAndDone(Arc::from(*f))),
            Err(_) => Err(ConfigError::InvalidConsumer),
        }
    }

    /// Normalize into a phase body fed from `slot`
    pub fn wrap(&self, slot: PayloadSlot) -> PhaseBody {
        match self {
            Consumer::Payload(f) => {
                let f = Arc::clone(f);
                PhaseBody::Plain(Arc::new(move || f(slot.load())))
            }
            Consumer::PayloadAndDone(f) => {
                let f = Arc::clone(f);
                PhaseBody::WithDone(Arc::new(move |done| f(slot.load(), done)))
            }
        }
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Consumer::Payload(_) => write!(f, "Consumer::Payload"),
            Consumer::PayloadAndDone(_) => write!(f, "Consumer::PayloadAndDone"),
        }
    }
}

/// Normalized body executed by a phase runner
#[derive(Clone)]
pub enum PhaseBody {
    Plain(Arc<dyn Fn() + Send + Sync>),
    WithDone(Arc<dyn Fn(Done) + Send + Sync>),
}

impl PhaseBody {
    /// Run the body, handing `done` to it if it accepts one
    pub fn invoke(&self, done: Done) {
        match self {
            PhaseBody::Plain(f) => f(),
            PhaseBody::WithDone(f) => f(done),
        }
    }

    pub fn takes_done(&self) -> bool {
        matches!(self, PhaseBody::WithDone(_))
    }
}

impl fmt::Debug for PhaseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseBody::Plain(_) => write!(f, "PhaseBody::Plain"),
            PhaseBody::WithDone(_) => write!(f, "PhaseBody::WithDone"),
        }
    }
}

/// Shared payload cell
///
/// Written by phase A (or by adopting the producer's record), read by phase B.
/// [`clear`](Self::clear) starts a new generation; a producer abandoned in an
/// earlier generation can no longer overwrite the slot.
#[derive(Debug, Clone, Default)]
pub struct PayloadSlot {
    inner: Arc<Mutex<SlotInner>>,
}

#[derive(Debug, Default)]
struct SlotInner {
    generation: u64,
    data: Vec<u8>,
}

impl PayloadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, data: Vec<u8>) {
        self.lock().data = data;
    }

    /// Store `data` only if the slot has not been cleared since `generation`
    pub fn store_if_current(&self, generation: u64, data: Vec<u8>) -> bool {
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.data = data;
        true
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub fn load(&self) -> Vec<u8> {
        self.lock().data.clone()
    }

    /// Empty the slot and fence off writers from earlier generations
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.generation += 1;
        inner.data.clear();
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Panic payload raised by [`fail`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureMarker {
    pub message: String,
}

/// Fail the current body with `message`
///
/// Unwinds out of the body. The runner reports the phase as failed (not
/// panicked) with this message.
pub fn fail(message: impl Into<String>) -> ! {
    std::panic::panic_any(FailureMarker {
        message: message.into(),
    })
}
