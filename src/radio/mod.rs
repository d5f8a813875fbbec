//! Radio configuration for the repeater: channels, filters, wiring and
//! stream control

pub mod channel;
pub mod controller;
pub mod filter_bank;
pub mod supervisor;
pub mod wiring;

pub use channel::{ChannelConfig, ChannelState, ConverterRates, FrontEnd, Tuning};
pub use controller::RadioController;
pub use filter_bank::{CoefficientSet, FilterBank, IMPULSE_AMPLITUDE, Lobe, NUM_TAPS, SignalPath, fir_block};
pub use supervisor::StreamSupervisor;
pub use wiring::repeater_topology;
