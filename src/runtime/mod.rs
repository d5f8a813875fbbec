//! Processing graph runtime: block addressing, topology and the device seam

pub mod device;
pub mod errors;
pub mod graph;
pub mod ports;
pub mod simulator;

pub use device::{Device, DeviceResult, StreamCommand};
pub use errors::{HardwareError, RadioError, RadioResult, TopologyError};
pub use graph::{Connection, GraphTopology, TopologyState, check_loop_closure};
pub use ports::{BlockId, BlockKind, PortDirection, PortRef};
pub use simulator::SimulatedDevice;
