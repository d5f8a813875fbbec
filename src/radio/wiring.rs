//! Fixed wiring of the dual-loop repeater
//!
//! ```text
//! path A: Radio#0 -> DDC#0 -> SplitStream#0 -+-> FIR#0 -+-> AddCom#0 -> DUC#1 -> Radio#1
//!                                            +-> FIR#1 -+
//! path B: Radio#1 -> DDC#1 -> SplitStream#1 -+-> FIR#2 -+-> AddCom#1 => DUC#0 -> Radio#0
//!                                            +-> FIR#3 -+
//! ```
//!
//! The two paths form one cycle through both radios; the `AddCom#1 => DUC#0`
//! edge is the one marked loop-closing.

use crate::runtime::{BlockId, BlockKind, Device, GraphTopology, TopologyError};

use super::filter_bank::{Lobe, SignalPath, fir_block};

/// Declare all repeater blocks on `device_index` and connect both paths
pub fn repeater_topology<D: Device + ?Sized>(
    device: &D,
    device_index: u32,
) -> Result<GraphTopology, TopologyError> {
    let mut topology = GraphTopology::new();

    let block = |kind, index| BlockId::new(device_index, kind, index);

    for kind in [
        BlockKind::Radio,
        BlockKind::DownConverter,
        BlockKind::UpConverter,
        BlockKind::Splitter,
        BlockKind::Combiner,
    ] {
        for index in 0..2 {
            topology.declare(device, &block(kind, index).to_string(), kind)?;
        }
    }
    for path in SignalPath::ALL {
        for lobe in Lobe::ALL {
            let fir = fir_block(device_index, path, lobe);
            topology.declare(device, &fir.to_string(), BlockKind::Fir)?;
        }
    }

    for path in SignalPath::ALL {
        let (rx, tx) = (path.rx_channel(), path.tx_channel());
        let radio_in = block(BlockKind::Radio, rx);
        let ddc = block(BlockKind::DownConverter, rx);
        let split = block(BlockKind::Splitter, rx);
        let add = block(BlockKind::Combiner, rx);
        let duc = block(BlockKind::UpConverter, tx);
        let radio_out = block(BlockKind::Radio, tx);

        topology.connect(radio_in, 0, ddc, 0, false)?;
        topology.connect(ddc, 0, split, 0, false)?;
        for lobe in Lobe::ALL {
            let fir = fir_block(device_index, path, lobe);
            topology.connect(split, lobe.port(), fir, 0, false)?;
        }
        for lobe in Lobe::ALL {
            let fir = fir_block(device_index, path, lobe);
            topology.connect(fir, 0, add, lobe.port(), false)?;
        }
        topology.connect(add, 0, duc, 0, path == SignalPath::B)?;
        topology.connect(duc, 0, radio_out, 0, false)?;
    }

    Ok(topology)
}
