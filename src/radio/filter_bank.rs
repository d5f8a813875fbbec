//! FIR coefficient sets for both signal paths
//!
//! Each path feeds its splitter into two FIR blocks, one carrying the real
//! lobe and one the imaginary lobe of the channel impulse response. The bank
//! keeps the coefficient set currently live on each of the four blocks.

use std::fmt;

use tracing::{debug, info};

use crate::runtime::{BlockId, BlockKind, Device, RadioError, RadioResult};

/// Taps per coefficient set
pub const NUM_TAPS: usize = 41;

/// Unity pass-through scaled by 1/4
pub const IMPULSE_AMPLITUDE: i16 = i16::MAX / 4;

/// Ordered taps for one lobe of one path. Always exactly [`NUM_TAPS`] long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoefficientSet([i16; NUM_TAPS]);

impl CoefficientSet {
    /// `[amplitude, 0, 0, ...]`
    pub fn impulse(amplitude: i16) -> Self {
        let mut taps = [0; NUM_TAPS];
        taps[0] = amplitude;
        Self(taps)
    }

    pub fn zeros() -> Self {
        Self([0; NUM_TAPS])
    }

    pub fn taps(&self) -> &[i16; NUM_TAPS] {
        &self.0
    }
}

impl Default for CoefficientSet {
    fn default() -> Self {
        Self::impulse(IMPULSE_AMPLITUDE)
    }
}

impl From<[i16; NUM_TAPS]> for CoefficientSet {
    fn from(taps: [i16; NUM_TAPS]) -> Self {
        Self(taps)
    }
}

impl TryFrom<&[i16]> for CoefficientSet {
    type Error = RadioError;

    fn try_from(values: &[i16]) -> Result<Self, Self::Error> {
        let taps: [i16; NUM_TAPS] = values.try_into().map_err(|_| RadioError::InvalidTapCount {
            expected: NUM_TAPS,
            actual: values.len(),
        })?;
        Ok(Self(taps))
    }
}

impl AsRef<[i16]> for CoefficientSet {
    fn as_ref(&self) -> &[i16] {
        &self.0
    }
}

impl fmt::Display for CoefficientSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

/// One of the two receive-to-transmit loops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalPath {
    /// Radio 0 receive, radio 1 transmit
    A,
    /// Radio 1 receive, radio 0 transmit
    B,
}

impl SignalPath {
    pub const ALL: [SignalPath; 2] = [SignalPath::A, SignalPath::B];

    /// Index of the radio channel this path receives from
    pub fn rx_channel(&self) -> u32 {
        match self {
            SignalPath::A => 0,
            SignalPath::B => 1,
        }
    }

    /// Index of the radio channel this path transmits on
    pub fn tx_channel(&self) -> u32 {
        1 - self.rx_channel()
    }
}

/// Component of a complex coefficient set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lobe {
    Real,
    Imaginary,
}

impl Lobe {
    pub const ALL: [Lobe; 2] = [Lobe::Real, Lobe::Imaginary];

    /// Splitter output port (and FIR offset within the path) for this lobe
    pub fn port(&self) -> usize {
        match self {
            Lobe::Real => 0,
            Lobe::Imaginary => 1,
        }
    }
}

/// FIR block serving a path and lobe: `FIR#0`/`FIR#1` on path A,
/// `FIR#2`/`FIR#3` on path B, real lobe first.
pub fn fir_block(device: u32, path: SignalPath, lobe: Lobe) -> BlockId {
    let index = 2 * path.rx_channel() + lobe.port() as u32;
    BlockId::new(device, BlockKind::Fir, index)
}

/// The four coefficient sets currently live on the FIR blocks
pub struct FilterBank {
    device: u32,
    sets: [CoefficientSet; 4],
}

impl FilterBank {
    /// Bank for the FIR blocks on `device`, every set at the default impulse
    pub fn new(device: u32) -> Self {
        Self {
            device,
            sets: [CoefficientSet::default(); 4],
        }
    }

    fn slot(path: SignalPath, lobe: Lobe) -> usize {
        2 * path.rx_channel() as usize + lobe.port()
    }

    /// Push the impulse response to all four FIR blocks
    pub fn initialize<D: Device + ?Sized>(&mut self, device: &mut D) -> RadioResult {
        let impulse = CoefficientSet::default();
        for path in SignalPath::ALL {
            for lobe in Lobe::ALL {
                self.set_coefficients(device, path, lobe, impulse.as_ref())?;
            }
        }
        info!("FIR blocks initialized to impulse ({} taps)", NUM_TAPS);
        Ok(())
    }

    /// Replace one coefficient set wholesale.
    ///
    /// The new table reaches the hardware in a single swap; the bank only
    /// records it once the device has accepted it.
    pub fn set_coefficients<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        path: SignalPath,
        lobe: Lobe,
        values: &[i16],
    ) -> RadioResult {
        let set = CoefficientSet::try_from(values)?;
        let fir = fir_block(self.device, path, lobe);

        device.set_coefficients(&fir, set.as_ref())?;
        self.sets[Self::slot(path, lobe)] = set;

        debug!("{} ({:?} path, {:?} lobe) <- {}", fir, path, lobe, set);
        Ok(())
    }

    /// Coefficient set last accepted for a path and lobe
    pub fn coefficients(&self, path: SignalPath, lobe: Lobe) -> &CoefficientSet {
        &self.sets[Self::slot(path, lobe)]
    }

    /// All FIR blocks this bank drives
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        SignalPath::ALL
            .into_iter()
            .flat_map(move |path| Lobe::ALL.into_iter().map(move |lobe| fir_block(self.device, path, lobe)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::SimulatedDevice;

    #[test]
    fn test_fir_block_mapping() {
        assert_eq!(fir_block(0, SignalPath::A, Lobe::Real).to_string(), "0/FIR#0");
        assert_eq!(fir_block(0, SignalPath::A, Lobe::Imaginary).to_string(), "0/FIR#1");
        assert_eq!(fir_block(0, SignalPath::B, Lobe::Real).to_string(), "0/FIR#2");
        assert_eq!(fir_block(0, SignalPath::B, Lobe::Imaginary).to_string(), "0/FIR#3");
    }

    #[test]
    fn test_default_is_quarter_scale_impulse() {
        let set = CoefficientSet::default();
        assert_eq!(set.taps()[0], 8191);
        assert!(set.taps()[1..].iter().all(|&t| t == 0));
    }

    #[test]
    fn test_initialize_pushes_impulse() {
        let mut device = SimulatedDevice::new(0);
        let mut bank = FilterBank::new(0);
        bank.initialize(&mut device).unwrap();

        for fir in bank.blocks() {
            let taps = device.coefficients(&fir).unwrap();
            assert_eq!(taps.len(), NUM_TAPS);
            assert_eq!(taps[0], 8191);
            assert!(taps[1..].iter().all(|&t| t == 0));
        }
    }

    #[test]
    fn test_invalid_tap_count() {
        let mut device = SimulatedDevice::new(0);
        let mut bank = FilterBank::new(0);

        let result = bank.set_coefficients(&mut device, SignalPath::A, Lobe::Real, &[1; 40]);
        assert_eq!(
            result,
            Err(RadioError::InvalidTapCount { expected: 41, actual: 40 })
        );
        assert!(bank.set_coefficients(&mut device, SignalPath::A, Lobe::Real, &[1; 42]).is_err());
        assert_eq!(bank.coefficients(SignalPath::A, Lobe::Real), &CoefficientSet::default());
    }

    #[test]
    fn test_rejected_swap_keeps_previous_set() {
        let mut device = SimulatedDevice::new(0);
        let mut bank = FilterBank::new(0);
        bank.initialize(&mut device).unwrap();

        device.inject_fault(fir_block(0, SignalPath::B, Lobe::Imaginary));
        let result = bank.set_coefficients(&mut device, SignalPath::B, Lobe::Imaginary, &[7; NUM_TAPS]);

        assert!(matches!(result, Err(RadioError::HardwareRejected(_))));
        assert_eq!(bank.coefficients(SignalPath::B, Lobe::Imaginary), &CoefficientSet::default());
    }

    #[test]
    fn test_set_replaces_only_one_slot() {
        let mut device = SimulatedDevice::new(0);
        let mut bank = FilterBank::new(0);
        let taps: Vec<i16> = (0..NUM_TAPS as i16).collect();

        bank.set_coefficients(&mut device, SignalPath::B, Lobe::Real, &taps).unwrap();

        assert_eq!(bank.coefficients(SignalPath::B, Lobe::Real).as_ref(), taps.as_slice());
        assert_eq!(bank.coefficients(SignalPath::A, Lobe::Real), &CoefficientSet::default());
        assert_eq!(device.coefficients(&fir_block(0, SignalPath::B, Lobe::Real)).unwrap(), taps);
    }
}
