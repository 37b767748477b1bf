//! Node identity within a parallel fleet

use std::fmt;
use thiserror::Error;

/// Error constructing a [`NodeIdentity`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NodeError {
    #[error("total node count must be at least 1")]
    NoNodes,

    #[error("node ordinal must be between 1 and {total}, got {ordinal}")]
    OrdinalOutOfRange { ordinal: usize, total: usize },
}

/// Position of this process in the fleet
///
/// Ordinals start at 1. Node 1 is always the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    ordinal: usize,
    total: usize,
}

impl NodeIdentity {
    /// Ordinal of the node that runs phase A
    pub const PRODUCER: usize = 1;

    pub fn new(ordinal: usize, total: usize) -> Result<Self, NodeError> {
        if total == 0 {
            return Err(NodeError::NoNodes);
        }
        if ordinal == 0 || ordinal > total {
            return Err(NodeError::OrdinalOutOfRange { ordinal, total });
        }

        Ok(Self { ordinal, total })
    }

    /// A fleet of one
    pub fn standalone() -> Self {
        Self {
            ordinal: Self::PRODUCER,
            total: 1,
        }
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether this node runs phase A
    pub fn is_producer(&self) -> bool {
        self.ordinal == Self::PRODUCER
    }

    /// Whether other nodes exist, i.e. the state channel is needed
    pub fn is_distributed(&self) -> bool {
        self.total > 1
    }
}

impl fmt::Display for NodeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node {}/{}", self.ordinal, self.total)
    }
}

/// Host label for logs
///
/// Falls back to "unknown" when the hostname is unavailable or not UTF-8.
pub fn host_label() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_and_followers() {
        let producer = NodeIdentity::new(1, 3).unwrap();
        assert!(producer.is_producer());
        assert!(producer.is_distributed());

        let follower = NodeIdentity::new(3, 3).unwrap();
        assert!(!follower.is_producer());
        assert_eq!(follower.to_string(), "node 3/3");
    }

    #[test]
    fn test_standalone() {
        let node = NodeIdentity::standalone();
        assert!(node.is_producer());
        assert!(!node.is_distributed());
        assert_eq!(node, NodeIdentity::new(1, 1).unwrap());
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(NodeIdentity::new(1, 0), Err(NodeError::NoNodes));
        assert_eq!(
            NodeIdentity::new(0, 2),
            Err(NodeError::OrdinalOutOfRange { ordinal: 0, total: 2 })
        );
        assert!(NodeIdentity::new(3, 2).is_err());
    }
}
