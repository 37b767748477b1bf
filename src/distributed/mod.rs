//! Cross-node synchronization
//!
//! Nodes never talk to each other directly. Node 1 publishes the outcome of
//! phase A to the sync host; every other node polls the sync host until that
//! outcome appears.
//!
//! # Modules
//!
//! - `protocol`: the JSON record and its status enum
//! - `channel`: publish/observe transports (HTTP and in-memory)
//! - `poll`: the follower wait loop
//! - `node`: node ordinal and fleet size

pub mod channel;
pub mod node;
pub mod poll;
pub mod protocol;

// Re-export key types
pub use channel::{HttpStateChannel, MemoryStateChannel, StateChannel, TransportError};
pub use node::{NodeError, NodeIdentity};
pub use poll::{wait_for_producer, WaitOutcome, DEFAULT_POLL_INTERVAL};
pub use protocol::{RemoteState, RemoteStateStatus, BEFORE_SUITE_STATE_PATH};
