//! Error types for the routing core.

use thiserror::Error;

use crate::latency::Phase;
use crate::pool::ResourceKind;

/// Result type for routing and allocation operations.
pub type NetResult<T> = Result<T, NetError>;

/// Errors that can occur while building a topology, searching it, or
/// committing reservations against it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NetError {
    /// No free slot of the requested kind is left on the node.
    #[error("No free {kind} slot on {node}")]
    ResourceExhausted {
        /// Node whose pool is full.
        node: String,
        /// Resource kind that was requested.
        kind: ResourceKind,
    },

    /// Slot index out of range, or in the wrong state for the operation.
    #[error("Invalid {kind} slot index {index} on {node} (capacity {capacity})")]
    InvalidIndex {
        /// Node owning the pool.
        node: String,
        /// Resource kind of the pool.
        kind: ResourceKind,
        /// Offending index.
        index: usize,
        /// Capacity of the pool.
        capacity: usize,
    },

    /// Weight matrix dimensions do not match the node-name list.
    #[error("Invalid topology shape: expected {expected}x{expected} matrix, found {found}")]
    InvalidTopologyShape {
        /// Length of the node-name list.
        expected: usize,
        /// Description of the offending dimension.
        found: String,
    },

    /// A QPU name appears more than once across all racks.
    #[error("Duplicate node: {0}")]
    DuplicateNode(String),

    /// A rack name appears more than once.
    #[error("Duplicate rack: {0}")]
    DuplicateRack(String),

    /// A name does not refer to any QPU of the topology.
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// Edge weight is negative, non-finite, or zero in a sparse edge list.
    #[error("Invalid weight {weight} on edge {from} -> {to}")]
    InvalidWeight {
        /// Edge source.
        from: String,
        /// Edge destination.
        to: String,
        /// Offending weight.
        weight: f64,
    },

    /// Search exhausted without reaching the destination.
    #[error("No feasible path from {from} to {to}")]
    NoPathFound {
        /// Request source.
        from: String,
        /// Request destination.
        to: String,
    },

    /// Accumulated path cost is no longer a finite `f64`.
    #[error("Path cost from {from} to {to} overflows at {at}")]
    CostOverflow {
        /// Request source.
        from: String,
        /// Request destination.
        to: String,
        /// Node whose hop pushed the cost past `f64::MAX`.
        at: String,
    },

    /// A provisioned slot count does not fit in `u32`.
    #[error("Slot capacity overflow on {node}")]
    CapacityOverflow {
        /// QPU being sized.
        node: String,
    },

    /// Materialization could not allocate a slot the search said was free.
    ///
    /// This is an internal invariant violation, never ordinary infeasibility.
    #[error("Reservation {from} <-> {to} ({kind}) failed: {reason}")]
    ReservationFailed {
        /// Hop source.
        from: String,
        /// Hop destination.
        to: String,
        /// Resource kind being committed.
        kind: ResourceKind,
        /// Underlying cause.
        reason: String,
    },

    /// Latency account used out of order.
    #[error("Invalid phase transition: cannot {operation} while {phase}")]
    InvalidPhaseTransition {
        /// Phase the account was in.
        phase: Phase,
        /// Operation that was attempted.
        operation: &'static str,
    },

    /// The channel sink rejected the reservations.
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Scenario file could not be parsed.
    #[error("Config parse error: {0}")]
    ConfigParse(String),
}

impl From<serde_yaml_ng::Error> for NetError {
    fn from(e: serde_yaml_ng::Error) -> Self {
        NetError::ConfigParse(e.to_string())
    }
}

impl NetError {
    /// Whether this error is a caller-supplied configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            NetError::InvalidTopologyShape { .. }
                | NetError::DuplicateNode(_)
                | NetError::DuplicateRack(_)
                | NetError::UnknownNode(_)
                | NetError::InvalidWeight { .. }
                | NetError::CapacityOverflow { .. }
                | NetError::ConfigParse(_)
        )
    }
}
