//! Hardware abstraction boundary
//!
//! Everything the repeater does to the radio goes through [`Device`]. The
//! trait mirrors the block-controller operations of the FPGA graph runtime:
//! block discovery, port-level connections, commit, per-block setters and
//! getters, coefficient tables and stream commands. Setters that the
//! hardware may coerce return the value actually achieved.

use super::errors::HardwareError;
use super::graph::Connection;
use super::ports::BlockId;

/// Result type for device operations
pub type DeviceResult<T = ()> = Result<T, HardwareError>;

/// Streaming command issued to a radio channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCommand {
    /// Start continuous streaming, immediately if `stream_now` is set
    StartContinuous { stream_now: bool },
    /// Stop continuous streaming
    StopContinuous,
}

/// Operations the repeater needs from the radio hardware
pub trait Device {
    /// Check that a block with this identifier exists on the device
    fn resolve_block(&self, id: &BlockId) -> DeviceResult;

    /// Lock in the full edge set. Either every edge is accepted or none is.
    fn commit(&mut self, connections: &[Connection]) -> DeviceResult;

    fn set_rx_frequency(&mut self, radio: &BlockId, hz: f64, chan: usize) -> DeviceResult<f64>;
    fn set_tx_frequency(&mut self, radio: &BlockId, hz: f64, chan: usize) -> DeviceResult<f64>;
    fn rx_frequency(&self, radio: &BlockId, chan: usize) -> DeviceResult<f64>;
    fn tx_frequency(&self, radio: &BlockId, chan: usize) -> DeviceResult<f64>;

    fn set_rx_gain(&mut self, radio: &BlockId, db: f64, chan: usize) -> DeviceResult<f64>;
    fn set_tx_gain(&mut self, radio: &BlockId, db: f64, chan: usize) -> DeviceResult<f64>;

    fn set_rx_antenna(&mut self, radio: &BlockId, antenna: &str, chan: usize) -> DeviceResult;
    fn set_tx_antenna(&mut self, radio: &BlockId, antenna: &str, chan: usize) -> DeviceResult;

    fn set_rx_bandwidth(&mut self, radio: &BlockId, hz: f64, chan: usize) -> DeviceResult<f64>;
    fn set_tx_bandwidth(&mut self, radio: &BlockId, hz: f64, chan: usize) -> DeviceResult<f64>;

    fn enable_rx_timestamps(&mut self, radio: &BlockId, enable: bool, chan: usize) -> DeviceResult;

    /// Set the radio's native sample rate
    fn set_radio_rate(&mut self, radio: &BlockId, hz: f64) -> DeviceResult<f64>;

    /// Set a free-form block property, e.g. `spp:0=128`
    fn set_property(&mut self, block: &BlockId, key: &str, value: &str) -> DeviceResult;

    fn set_input_rate(&mut self, block: &BlockId, hz: f64, port: usize) -> DeviceResult<f64>;
    fn set_output_rate(&mut self, block: &BlockId, hz: f64, port: usize) -> DeviceResult<f64>;
    fn input_rate(&self, block: &BlockId, port: usize) -> DeviceResult<f64>;
    fn output_rate(&self, block: &BlockId, port: usize) -> DeviceResult<f64>;

    /// Swap a FIR block's coefficient table in one step
    fn set_coefficients(&mut self, fir: &BlockId, taps: &[i16]) -> DeviceResult;
    fn coefficients(&self, fir: &BlockId) -> DeviceResult<Vec<i16>>;

    fn issue_stream_cmd(&mut self, radio: &BlockId, cmd: StreamCommand, chan: usize) -> DeviceResult;
}
