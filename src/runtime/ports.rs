//! Block identifiers and port addressing
//!
//! Blocks live on the device and are referenced by a stable identifier of
//! the form `"<device>/<Kind>#<index>"`, e.g. `"0/FIR#2"`. The kind fixes how
//! many input and output ports the block exposes.

use std::fmt;
use std::str::FromStr;

use super::errors::TopologyError;

/// Direction of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PortDirection::Input => write!(f, "input"),
            PortDirection::Output => write!(f, "output"),
        }
    }
}

/// Kind of processing block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Radio,
    DownConverter,
    UpConverter,
    Splitter,
    Combiner,
    Fir,
}

impl BlockKind {
    pub const ALL: [BlockKind; 6] = [
        BlockKind::Radio,
        BlockKind::DownConverter,
        BlockKind::UpConverter,
        BlockKind::Splitter,
        BlockKind::Combiner,
        BlockKind::Fir,
    ];

    /// Name used in block identifiers
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Radio => "Radio",
            BlockKind::DownConverter => "DDC",
            BlockKind::UpConverter => "DUC",
            BlockKind::Splitter => "SplitStream",
            BlockKind::Combiner => "AddCom",
            BlockKind::Fir => "FIR",
        }
    }

    /// Number of input ports this kind of block exposes
    pub fn num_inputs(&self) -> usize {
        match self {
            BlockKind::Combiner => 2,
            _ => 1,
        }
    }

    /// Number of output ports this kind of block exposes
    pub fn num_outputs(&self) -> usize {
        match self {
            BlockKind::Splitter => 2,
            _ => 1,
        }
    }

    pub fn num_ports(&self, direction: PortDirection) -> usize {
        match direction {
            PortDirection::Input => self.num_inputs(),
            PortDirection::Output => self.num_outputs(),
        }
    }

    /// True for blocks that pass the sample rate through unchanged
    pub fn is_rate_transparent(&self) -> bool {
        matches!(
            self,
            BlockKind::Splitter | BlockKind::Combiner | BlockKind::Fir
        )
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TopologyError::UnknownBlock(s.to_string()))
    }
}

/// Stable identifier of a block on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    pub device: u32,
    pub kind: BlockKind,
    pub index: u32,
}

impl BlockId {
    pub fn new(device: u32, kind: BlockKind, index: u32) -> Self {
        Self {
            device,
            kind,
            index,
        }
    }

    /// Address one of this block's ports
    pub fn port(&self, direction: PortDirection, index: usize) -> PortRef {
        PortRef {
            block: *self,
            direction,
            index,
        }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}#{}", self.device, self.kind, self.index)
    }
}

impl FromStr for BlockId {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || TopologyError::UnknownBlock(s.to_string());

        let (device, rest) = s.split_once('/').ok_or_else(unknown)?;
        let (kind, index) = rest.split_once('#').ok_or_else(unknown)?;

        Ok(Self {
            device: device.parse().map_err(|_| unknown())?,
            kind: kind.parse().map_err(|_| unknown())?,
            index: index.parse().map_err(|_| unknown())?,
        })
    }
}

/// One port of one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortRef {
    pub block: BlockId,
    pub direction: PortDirection,
    pub index: usize,
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_id() {
        let id: BlockId = "0/FIR#2".parse().unwrap();
        assert_eq!(id, BlockId::new(0, BlockKind::Fir, 2));
        assert_eq!(id.to_string(), "0/FIR#2");

        let id: BlockId = "1/SplitStream#0".parse().unwrap();
        assert_eq!(id.kind, BlockKind::Splitter);
        assert_eq!(id.device, 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("FIR#0".parse::<BlockId>().is_err());
        assert!("0/FIR".parse::<BlockId>().is_err());
        assert!("0/Mixer#0".parse::<BlockId>().is_err());
        assert!("x/FIR#0".parse::<BlockId>().is_err());
        assert!("0/FIR#-1".parse::<BlockId>().is_err());
    }

    #[test]
    fn test_port_counts() {
        assert_eq!(BlockKind::Splitter.num_inputs(), 1);
        assert_eq!(BlockKind::Splitter.num_outputs(), 2);
        assert_eq!(BlockKind::Combiner.num_inputs(), 2);
        assert_eq!(BlockKind::Combiner.num_outputs(), 1);
        assert_eq!(BlockKind::Radio.num_ports(PortDirection::Input), 1);
    }
}
