//! Error types for the runtime system

use super::graph::TopologyState;
use super::ports::{PortDirection, PortRef};

/// Error reported by the hardware abstraction layer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HardwareError {
    #[error("Block '{0}' not found on device")]
    NoSuchBlock(String),

    #[error("Block '{block}' rejected request: {reason}")]
    Rejected { block: String, reason: String },

    #[error("Device has no committed topology")]
    NotCommitted,
}

/// Error type for topology declaration and commit
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TopologyError {
    #[error("Unknown block '{0}'")]
    UnknownBlock(String),

    #[error("{direction} port {port} is already bound")]
    PortAlreadyBound {
        port: PortRef,
        direction: PortDirection,
    },

    #[error("{direction} port {port} does not exist on this block")]
    PortOutOfRange {
        port: PortRef,
        direction: PortDirection,
    },

    #[error("Incomplete wiring, unbound input ports: {}", format_ports(.unbound))]
    IncompleteWiring { unbound: Vec<PortRef> },

    #[error("Topology already committed, connections can no longer change")]
    AlreadyCommitted,

    #[error("Topology is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: TopologyState,
        actual: TopologyState,
    },
}

fn format_ports(ports: &[PortRef]) -> String {
    ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error type for radio configuration, filter and streaming operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RadioError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("Hardware rejected: {0}")]
    HardwareRejected(#[from] HardwareError),

    #[error("Expected {expected} filter taps, got {actual}")]
    InvalidTapCount { expected: usize, actual: usize },

    #[error("Samples per packet must be a positive integer")]
    InvalidSamplesPerPacket,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for radio operations
pub type RadioResult<T = ()> = Result<T, RadioError>;
