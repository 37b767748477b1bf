//! Before-suite state protocol
//!
//! This module defines the record exchanged between the producer node and its
//! followers through the sync host. The record is a small JSON object:
//!
//! ```text
//! {"Data": "<base64 payload or null>", "State": <integer>}
//! ```
//!
//! # Message Flow
//!
//! ```text
//! Node 1 (producer)            Sync host              Node N (follower)
//!     |                           |                         |
//!     |                           |<------- GET ------------|  Pending
//!     |                           |-------- {State:1} ----->|
//!     |-- POST {Data, State:2} -->|                         |
//!     |                           |<------- GET ------------|
//!     |                           |-- {Data, State:2} ----->|  Passed
//! ```
//!
//! Field names and the integer encoding of `State` are fixed so that nodes
//! built from other toolchains can share the same relay.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Path served by the sync host for the before-suite record
pub const BEFORE_SUITE_STATE_PATH: &str = "/BeforeSuiteState";

/// Status carried by a [`RemoteState`] record
///
/// Encoded on the wire as its integer discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RemoteStateStatus {
    /// Zero value; never published, treated like `Pending` by followers
    Invalid = 0,

    /// Producer has not published yet (relay default)
    Pending = 1,

    /// Producer finished phase A successfully; `Data` holds the payload
    Passed = 2,

    /// Producer's phase A failed
    Failed = 3,

    /// Producer went away before finishing phase A
    ///
    /// Reserved for an external liveness monitor. This crate handles it on the
    /// follower side but never publishes it.
    Disappeared = 4,
}

impl RemoteStateStatus {
    /// Whether a follower can stop polling after observing this status
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RemoteStateStatus::Passed | RemoteStateStatus::Failed | RemoteStateStatus::Disappeared
        )
    }
}

impl From<RemoteStateStatus> for u8 {
    fn from(status: RemoteStateStatus) -> Self {
        status as u8
    }
}

impl TryFrom<u8> for RemoteStateStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RemoteStateStatus::Invalid),
            1 => Ok(RemoteStateStatus::Pending),
            2 => Ok(RemoteStateStatus::Passed),
            3 => Ok(RemoteStateStatus::Failed),
            4 => Ok(RemoteStateStatus::Disappeared),
            other => Err(format!("unknown before-suite state {}", other)),
        }
    }
}

impl fmt::Display for RemoteStateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteStateStatus::Invalid => write!(f, "invalid"),
            RemoteStateStatus::Pending => write!(f, "pending"),
            RemoteStateStatus::Passed => write!(f, "passed"),
            RemoteStateStatus::Failed => write!(f, "failed"),
            RemoteStateStatus::Disappeared => write!(f, "disappeared"),
        }
    }
}

/// Before-suite state record
///
/// Published once by the producer, read repeatedly by followers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteState {
    /// Payload produced by phase A (empty unless `state` is `Passed`)
    #[serde(rename = "Data", with = "payload_bytes", default)]
    pub data: Vec<u8>,

    /// Outcome of phase A as seen by the producer
    #[serde(rename = "State")]
    pub state: RemoteStateStatus,
}

impl RemoteState {
    /// Record for a successful phase A carrying `data`
    pub fn passed(data: Vec<u8>) -> Self {
        Self {
            data,
            state: RemoteStateStatus::Passed,
        }
    }

    /// Record for a failed phase A
    ///
    /// Whatever bytes phase A managed to produce are carried along; followers
    /// never read them.
    pub fn failed(data: Vec<u8>) -> Self {
        Self {
            data,
            state: RemoteStateStatus::Failed,
        }
    }

    /// Relay default before the producer publishes
    pub fn pending() -> Self {
        Self {
            data: Vec::new(),
            state: RemoteStateStatus::Pending,
        }
    }

    /// Serialize to the JSON wire body
    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode a JSON wire body
    pub fn from_json(body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(body)
    }
}

impl Default for RemoteState {
    fn default() -> Self {
        Self::pending()
    }
}

/// Serde adapter for the `Data` field
///
/// Bytes travel as a standard padded base64 string. `null` decodes as empty.
mod payload_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(text) => BASE64.decode(text.as_bytes()).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
