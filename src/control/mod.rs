//! UDP control channel: datagram codec and the receive/dispatch loop

pub mod listener;
pub mod protocol;

pub use listener::{ControlListener, dispatch};
pub use protocol::{Command, FREQUENCY_DATAGRAM_LEN, ProtocolError, TAPS_DATAGRAM_LEN, decode};
