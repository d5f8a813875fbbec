//! In-memory device
//!
//! `SimulatedDevice` implements [`Device`] without hardware. It keeps the
//! state each block would hold, coerces values the way the radio does
//! (integer rate divisors, clamped gain and bandwidth) and applies the same
//! commit-time checks: every edge must reference a known block, sample rates
//! must agree across every edge, and loop-closing markings must cover every
//! cycle exactly once. Faults can be injected per block.

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;

use tracing::debug;

use super::device::{Device, DeviceResult, StreamCommand};
use super::errors::HardwareError;
use super::graph::{Connection, check_loop_closure};
use super::ports::{BlockId, BlockKind};

/// Taps per FIR block on the default image
pub const FIR_NUM_TAPS: usize = 41;

/// Native radio rates the converter clocks support
pub const RADIO_RATES: [f64; 2] = [200e6, 184.32e6];

const GAIN_RANGE: RangeInclusive<f64> = 0.0..=31.5;
const BANDWIDTH_RANGE: RangeInclusive<f64> = 1e6..=200e6;
const DEFAULT_TUNING_RANGE: RangeInclusive<f64> = 10e6..=6e9;
const MAX_DIVISOR: f64 = 2048.0;
const MAX_SAMPLES_PER_PACKET: u32 = 8000;
const RATE_TOLERANCE_HZ: f64 = 1e-3;

const RX_ANTENNAS: [&str; 2] = ["RX2", "TX/RX"];
const TX_ANTENNAS: [&str; 1] = ["TX/RX"];

/// State of one radio channel
#[derive(Debug, Clone, PartialEq)]
pub struct RadioState {
    pub rx_frequency: f64,
    pub tx_frequency: f64,
    pub rx_gain: f64,
    pub tx_gain: f64,
    pub rx_antenna: String,
    pub tx_antenna: String,
    pub rx_bandwidth: f64,
    pub tx_bandwidth: f64,
    pub rx_timestamps: bool,
    pub rate: f64,
    pub streaming: bool,
    /// Every stream command received, in order
    pub stream_commands: Vec<StreamCommand>,
}

impl Default for RadioState {
    fn default() -> Self {
        Self {
            rx_frequency: 1e9,
            tx_frequency: 1e9,
            rx_gain: 0.0,
            tx_gain: 0.0,
            rx_antenna: RX_ANTENNAS[0].to_string(),
            tx_antenna: TX_ANTENNAS[0].to_string(),
            rx_bandwidth: *BANDWIDTH_RANGE.end(),
            tx_bandwidth: *BANDWIDTH_RANGE.end(),
            rx_timestamps: true,
            rate: RADIO_RATES[0],
            streaming: false,
            stream_commands: Vec::new(),
        }
    }
}

/// Rates on either side of a DDC or DUC
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConverterState {
    pub input_rate: f64,
    pub output_rate: f64,
}

impl Default for ConverterState {
    fn default() -> Self {
        Self {
            input_rate: RADIO_RATES[0],
            output_rate: RADIO_RATES[0],
        }
    }
}

#[derive(Debug, Clone)]
enum BlockState {
    Radio(RadioState),
    Converter(ConverterState),
    Fir(Vec<i16>),
    Passive,
}

impl BlockState {
    fn for_kind(kind: BlockKind) -> Self {
        match kind {
            BlockKind::Radio => BlockState::Radio(RadioState::default()),
            BlockKind::DownConverter | BlockKind::UpConverter => {
                BlockState::Converter(ConverterState::default())
            }
            BlockKind::Fir => {
                let mut taps = vec![0; FIR_NUM_TAPS];
                taps[0] = i16::MAX;
                BlockState::Fir(taps)
            }
            BlockKind::Splitter | BlockKind::Combiner => BlockState::Passive,
        }
    }
}

/// Device that keeps all block state in memory
pub struct SimulatedDevice {
    device_index: u32,
    blocks: HashMap<BlockId, BlockState>,
    properties: HashMap<(BlockId, String), String>,
    committed: Option<Vec<Connection>>,
    rx_tuning_range: RangeInclusive<f64>,
    tx_tuning_range: RangeInclusive<f64>,
    faulty: HashSet<BlockId>,
}

impl SimulatedDevice {
    /// Device carrying the repeater image: two radios, two DDCs, two DUCs,
    /// two splitters, four FIRs and two combiners.
    pub fn new(device_index: u32) -> Self {
        let inventory = [
            (BlockKind::Radio, 2),
            (BlockKind::DownConverter, 2),
            (BlockKind::UpConverter, 2),
            (BlockKind::Splitter, 2),
            (BlockKind::Fir, 4),
            (BlockKind::Combiner, 2),
        ];
        let blocks = inventory.into_iter().flat_map(|(kind, count)| {
            (0..count).map(move |index| BlockId::new(device_index, kind, index))
        });
        Self::with_blocks(device_index, blocks)
    }

    /// Device carrying exactly the given blocks
    pub fn with_blocks(device_index: u32, blocks: impl IntoIterator<Item = BlockId>) -> Self {
        Self {
            device_index,
            blocks: blocks
                .into_iter()
                .map(|id| (id, BlockState::for_kind(id.kind)))
                .collect(),
            properties: HashMap::new(),
            committed: None,
            rx_tuning_range: DEFAULT_TUNING_RANGE,
            tx_tuning_range: DEFAULT_TUNING_RANGE,
            faulty: HashSet::new(),
        }
    }

    pub fn with_rx_tuning_range(mut self, range: RangeInclusive<f64>) -> Self {
        self.rx_tuning_range = range;
        self
    }

    pub fn with_tx_tuning_range(mut self, range: RangeInclusive<f64>) -> Self {
        self.tx_tuning_range = range;
        self
    }

    /// Make every setter on `block` fail until cleared
    pub fn inject_fault(&mut self, block: BlockId) {
        self.faulty.insert(block);
    }

    pub fn clear_fault(&mut self, block: &BlockId) {
        self.faulty.remove(block);
    }

    pub fn device_index(&self) -> u32 {
        self.device_index
    }

    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    pub fn committed_connections(&self) -> Option<&[Connection]> {
        self.committed.as_deref()
    }

    pub fn radio(&self, id: &BlockId) -> Option<&RadioState> {
        match self.blocks.get(id) {
            Some(BlockState::Radio(radio)) => Some(radio),
            _ => None,
        }
    }

    pub fn converter(&self, id: &BlockId) -> Option<&ConverterState> {
        match self.blocks.get(id) {
            Some(BlockState::Converter(conv)) => Some(conv),
            _ => None,
        }
    }

    pub fn property(&self, id: &BlockId, key: &str) -> Option<&str> {
        self.properties
            .get(&(*id, key.to_string()))
            .map(|v| v.as_str())
    }

    fn rejected(block: &BlockId, reason: impl Into<String>) -> HardwareError {
        HardwareError::Rejected {
            block: block.to_string(),
            reason: reason.into(),
        }
    }

    fn check_fault(&self, block: &BlockId) -> DeviceResult {
        if self.faulty.contains(block) {
            return Err(Self::rejected(block, "injected fault"));
        }
        Ok(())
    }

    fn block_mut(&mut self, id: &BlockId) -> DeviceResult<&mut BlockState> {
        self.check_fault(id)?;
        self.blocks
            .get_mut(id)
            .ok_or_else(|| HardwareError::NoSuchBlock(id.to_string()))
    }

    fn radio_mut(&mut self, id: &BlockId, chan: usize) -> DeviceResult<&mut RadioState> {
        if chan != 0 {
            return Err(Self::rejected(id, format!("no channel {}", chan)));
        }
        match self.block_mut(id)? {
            BlockState::Radio(radio) => Ok(radio),
            _ => Err(Self::rejected(id, "not a radio block")),
        }
    }

    fn radio_ref(&self, id: &BlockId, chan: usize) -> DeviceResult<&RadioState> {
        if chan != 0 {
            return Err(Self::rejected(id, format!("no channel {}", chan)));
        }
        match self.blocks.get(id) {
            Some(BlockState::Radio(radio)) => Ok(radio),
            Some(_) => Err(Self::rejected(id, "not a radio block")),
            None => Err(HardwareError::NoSuchBlock(id.to_string())),
        }
    }

    fn converter_mut(&mut self, id: &BlockId, port: usize) -> DeviceResult<&mut ConverterState> {
        if port != 0 {
            return Err(Self::rejected(id, format!("no port {}", port)));
        }
        match self.block_mut(id)? {
            BlockState::Converter(conv) => Ok(conv),
            _ => Err(Self::rejected(id, "not a rate converter")),
        }
    }

    fn converter_ref(&self, id: &BlockId, port: usize) -> DeviceResult<&ConverterState> {
        if port != 0 {
            return Err(Self::rejected(id, format!("no port {}", port)));
        }
        match self.blocks.get(id) {
            Some(BlockState::Converter(conv)) => Ok(conv),
            Some(_) => Err(Self::rejected(id, "not a rate converter")),
            None => Err(HardwareError::NoSuchBlock(id.to_string())),
        }
    }

    /// Rate leaving `block`, following rate-transparent blocks upstream
    fn output_rate_on(&self, block: &BlockId, edges: &[Connection], hops: usize) -> Option<f64> {
        match self.blocks.get(block)? {
            BlockState::Radio(radio) => Some(radio.rate),
            BlockState::Converter(conv) => Some(conv.output_rate),
            _ if hops > edges.len() => None,
            _ => edges
                .iter()
                .find(|e| e.dst == *block)
                .and_then(|e| self.output_rate_on(&e.src, edges, hops + 1)),
        }
    }

    fn input_rate_on(&self, block: &BlockId) -> Option<f64> {
        match self.blocks.get(block)? {
            BlockState::Radio(radio) => Some(radio.rate),
            BlockState::Converter(conv) => Some(conv.input_rate),
            _ => None,
        }
    }

    fn check_rates(&self, edges: &[Connection]) -> DeviceResult {
        for edge in edges {
            let out = self.output_rate_on(&edge.src, edges, 0);
            let inp = self.input_rate_on(&edge.dst);
            if let (Some(out), Some(inp)) = (out, inp)
                && (out - inp).abs() > RATE_TOLERANCE_HZ
            {
                return Err(Self::rejected(
                    &edge.dst,
                    format!("rate mismatch on {}: {} Hz into {} Hz", edge, out, inp),
                ));
            }
        }

        for block in self.blocks.keys().filter(|b| b.kind == BlockKind::Combiner) {
            let rates: Vec<f64> = edges
                .iter()
                .filter(|e| e.dst == *block)
                .filter_map(|e| self.output_rate_on(&e.src, edges, 0))
                .collect();
            if rates.windows(2).any(|w| (w[0] - w[1]).abs() > RATE_TOLERANCE_HZ) {
                return Err(Self::rejected(block, format!("inputs disagree on rate: {:?}", rates)));
            }
        }
        Ok(())
    }
}

/// Nearest rate reachable from `fast` through an integer divisor
fn coerce_rate(block: &BlockId, fast: f64, requested: f64) -> DeviceResult<f64> {
    if !requested.is_finite() || requested <= 0.0 {
        return Err(SimulatedDevice::rejected(block, format!("invalid rate {}", requested)));
    }
    let divisor = (fast / requested).round().clamp(1.0, MAX_DIVISOR);
    Ok(fast / divisor)
}

fn check_frequency(block: &BlockId, hz: f64, range: &RangeInclusive<f64>) -> DeviceResult<f64> {
    if !range.contains(&hz) {
        return Err(SimulatedDevice::rejected(
            block,
            format!("frequency {} Hz outside tuning range {:?}", hz, range),
        ));
    }
    Ok(hz)
}

impl Device for SimulatedDevice {
    fn resolve_block(&self, id: &BlockId) -> DeviceResult {
        if self.blocks.contains_key(id) {
            Ok(())
        } else {
            Err(HardwareError::NoSuchBlock(id.to_string()))
        }
    }

    fn commit(&mut self, connections: &[Connection]) -> DeviceResult {
        for edge in connections {
            self.resolve_block(&edge.src)?;
            self.resolve_block(&edge.dst)?;
        }
        self.check_rates(connections)?;
        check_loop_closure(connections).map_err(|reason| HardwareError::Rejected {
            block: format!("device {}", self.device_index),
            reason,
        })?;

        debug!("Simulated device accepted {} edges", connections.len());
        self.committed = Some(connections.to_vec());
        Ok(())
    }

    fn set_rx_frequency(&mut self, radio: &BlockId, hz: f64, chan: usize) -> DeviceResult<f64> {
        let hz = check_frequency(radio, hz, &self.rx_tuning_range)?;
        let state = self.radio_mut(radio, chan)?;
        state.rx_frequency = hz;
        Ok(hz)
    }

    fn set_tx_frequency(&mut self, radio: &BlockId, hz: f64, chan: usize) -> DeviceResult<f64> {
        let hz = check_frequency(radio, hz, &self.tx_tuning_range)?;
        let state = self.radio_mut(radio, chan)?;
        state.tx_frequency = hz;
        Ok(hz)
    }

    fn rx_frequency(&self, radio: &BlockId, chan: usize) -> DeviceResult<f64> {
        Ok(self.radio_ref(radio, chan)?.rx_frequency)
    }

    fn tx_frequency(&self, radio: &BlockId, chan: usize) -> DeviceResult<f64> {
        Ok(self.radio_ref(radio, chan)?.tx_frequency)
    }

    fn set_rx_gain(&mut self, radio: &BlockId, db: f64, chan: usize) -> DeviceResult<f64> {
        let state = self.radio_mut(radio, chan)?;
        state.rx_gain = db.clamp(*GAIN_RANGE.start(), *GAIN_RANGE.end());
        Ok(state.rx_gain)
    }

    fn set_tx_gain(&mut self, radio: &BlockId, db: f64, chan: usize) -> DeviceResult<f64> {
        let state = self.radio_mut(radio, chan)?;
        state.tx_gain = db.clamp(*GAIN_RANGE.start(), *GAIN_RANGE.end());
        Ok(state.tx_gain)
    }

    fn set_rx_antenna(&mut self, radio: &BlockId, antenna: &str, chan: usize) -> DeviceResult {
        if !RX_ANTENNAS.contains(&antenna) {
            return Err(Self::rejected(radio, format!("no rx antenna '{}'", antenna)));
        }
        self.radio_mut(radio, chan)?.rx_antenna = antenna.to_string();
        Ok(())
    }

    fn set_tx_antenna(&mut self, radio: &BlockId, antenna: &str, chan: usize) -> DeviceResult {
        if !TX_ANTENNAS.contains(&antenna) {
            return Err(Self::rejected(radio, format!("no tx antenna '{}'", antenna)));
        }
        self.radio_mut(radio, chan)?.tx_antenna = antenna.to_string();
        Ok(())
    }

    fn set_rx_bandwidth(&mut self, radio: &BlockId, hz: f64, chan: usize) -> DeviceResult<f64> {
        let state = self.radio_mut(radio, chan)?;
        state.rx_bandwidth = hz.clamp(*BANDWIDTH_RANGE.start(), *BANDWIDTH_RANGE.end());
        Ok(state.rx_bandwidth)
    }

    fn set_tx_bandwidth(&mut self, radio: &BlockId, hz: f64, chan: usize) -> DeviceResult<f64> {
        let state = self.radio_mut(radio, chan)?;
        state.tx_bandwidth = hz.clamp(*BANDWIDTH_RANGE.start(), *BANDWIDTH_RANGE.end());
        Ok(state.tx_bandwidth)
    }

    fn enable_rx_timestamps(&mut self, radio: &BlockId, enable: bool, chan: usize) -> DeviceResult {
        self.radio_mut(radio, chan)?.rx_timestamps = enable;
        Ok(())
    }

    fn set_radio_rate(&mut self, radio: &BlockId, hz: f64) -> DeviceResult<f64> {
        let state = self.radio_mut(radio, 0)?;
        let nearest = RADIO_RATES
            .into_iter()
            .min_by(|a, b| (a - hz).abs().total_cmp(&(b - hz).abs()))
            .unwrap_or(RADIO_RATES[0]);
        state.rate = nearest;
        Ok(nearest)
    }

    fn set_property(&mut self, block: &BlockId, key: &str, value: &str) -> DeviceResult {
        self.block_mut(block)?;
        if key.starts_with("spp") {
            match value.parse::<u32>() {
                Ok(n) if (1..=MAX_SAMPLES_PER_PACKET).contains(&n) => {}
                _ => return Err(Self::rejected(block, format!("invalid {} '{}'", key, value))),
            }
        }
        self.properties
            .insert((*block, key.to_string()), value.to_string());
        Ok(())
    }

    fn set_input_rate(&mut self, block: &BlockId, hz: f64, port: usize) -> DeviceResult<f64> {
        let conv = self.converter_mut(block, port)?;
        match block.kind {
            BlockKind::DownConverter => {
                let requested_output = conv.output_rate;
                conv.input_rate = coerce_rate(block, hz, hz)?;
                conv.output_rate = coerce_rate(block, conv.input_rate, requested_output)?;
            }
            _ => conv.input_rate = coerce_rate(block, conv.output_rate, hz)?,
        }
        Ok(conv.input_rate)
    }

    fn set_output_rate(&mut self, block: &BlockId, hz: f64, port: usize) -> DeviceResult<f64> {
        let conv = self.converter_mut(block, port)?;
        match block.kind {
            BlockKind::UpConverter => {
                let requested_input = conv.input_rate;
                conv.output_rate = coerce_rate(block, hz, hz)?;
                conv.input_rate = coerce_rate(block, conv.output_rate, requested_input)?;
            }
            _ => conv.output_rate = coerce_rate(block, conv.input_rate, hz)?,
        }
        Ok(conv.output_rate)
    }

    fn input_rate(&self, block: &BlockId, port: usize) -> DeviceResult<f64> {
        Ok(self.converter_ref(block, port)?.input_rate)
    }

    fn output_rate(&self, block: &BlockId, port: usize) -> DeviceResult<f64> {
        Ok(self.converter_ref(block, port)?.output_rate)
    }

    fn set_coefficients(&mut self, fir: &BlockId, taps: &[i16]) -> DeviceResult {
        if taps.len() != FIR_NUM_TAPS {
            return Err(Self::rejected(
                fir,
                format!("expected {} taps, got {}", FIR_NUM_TAPS, taps.len()),
            ));
        }
        match self.block_mut(fir)? {
            BlockState::Fir(table) => {
                table.copy_from_slice(taps);
                Ok(())
            }
            _ => Err(Self::rejected(fir, "not a FIR block")),
        }
    }

    fn coefficients(&self, fir: &BlockId) -> DeviceResult<Vec<i16>> {
        match self.blocks.get(fir) {
            Some(BlockState::Fir(table)) => Ok(table.clone()),
            Some(_) => Err(Self::rejected(fir, "not a FIR block")),
            None => Err(HardwareError::NoSuchBlock(fir.to_string())),
        }
    }

    fn issue_stream_cmd(&mut self, radio: &BlockId, cmd: StreamCommand, chan: usize) -> DeviceResult {
        if self.committed.is_none() {
            return Err(HardwareError::NotCommitted);
        }
        let state = self.radio_mut(radio, chan)?;
        state.streaming = matches!(cmd, StreamCommand::StartContinuous { .. });
        state.stream_commands.push(cmd);
        Ok(())
    }
}
