//! Channel emulation: turn a propagation model into FIR taps
//!
//! The repeater's FIR pair per path realises a complex channel impulse
//! response. This module computes that response for a node at a given
//! position relative to the ground station, bins each propagation path into
//! a tap by its delay, and produces the tap update the control channel
//! carries. A manual mode replaces the model with a fixed attenuation.

pub mod models;
pub mod taps;

pub use models::{PathModel, Position, PropagationPath, Scenario};
pub use taps::{DEFAULT_SCALING, MAX_ATTENUATION_DB, TAP_LIMIT, TapSynthesizer};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EmulatorError {
    #[error("Invalid position '{0}', expected x,y,z in metres")]
    InvalidPosition(String),

    #[error("Attenuation {0} dB outside 0..={max} dB", max = MAX_ATTENUATION_DB)]
    InvalidAttenuation(f64),

    #[error("{name} must be positive, got {value}")]
    InvalidRate { name: &'static str, value: f64 },
}
