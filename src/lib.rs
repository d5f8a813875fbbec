//! Dual-radio FIR repeater with a live UDP control channel
//!
//! Two radio channels are wired into one hardware processing graph: each
//! channel's received signal is down-converted, split into a real and an
//! imaginary lobe, filtered by a pair of 41-tap FIR blocks, recombined,
//! up-converted and transmitted on the other radio. While the graph streams,
//! a UDP listener accepts new filter taps and carrier frequencies.
//!
//! # Architecture
//!
//! - **runtime**: block identifiers, the graph topology with its commit
//!   lifecycle, and the [`Device`] trait every hardware backend implements
//! - **radio**: channel parameters, the filter bank, the fixed repeater
//!   wiring and the [`RadioController`] that owns all of it
//! - **control**: the datagram codec and the [`ControlListener`] loop
//! - **emulator**: propagation models and the tap synthesis that turns them
//!   into control commands
//!
//! # Example
//!
//! ```no_run
//! use repeater::{ControlListener, RadioController, RepeaterConfig, SimulatedDevice};
//!
//! let config = RepeaterConfig::default();
//! let mut controller = RadioController::bring_up(SimulatedDevice::new(0), &config)?;
//! let (_stop, shutdown) = crossbeam_channel::bounded(1);
//! ControlListener::bind(config.control_socket_addr())?.run(&mut controller, &shutdown)?;
//! controller.stop()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use thiserror::Error;

pub mod config;
pub mod control;
pub mod emulator;
pub mod radio;
pub mod runtime;

pub use config::RepeaterConfig;

pub use control::{Command, ControlListener, ProtocolError};

pub use emulator::{EmulatorError, PathModel, Position, Scenario, TapSynthesizer};

pub use radio::{
    ChannelConfig, CoefficientSet, FilterBank, Lobe, NUM_TAPS, RadioController, SignalPath,
    StreamSupervisor,
};

pub use runtime::{
    BlockId, BlockKind, Connection, Device, GraphTopology, HardwareError, RadioError,
    SimulatedDevice, TopologyError, TopologyState,
};

#[derive(Error, Debug)]
pub enum RepeaterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Radio(#[from] RadioError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Emulator(#[from] EmulatorError),
}

pub type Result<T = ()> = std::result::Result<T, RepeaterError>;
