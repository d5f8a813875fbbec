//! Path-to-tap synthesis
//!
//! Each path lands in tap `floor(delay * sample_rate)` with amplitude
//! `32767 / loss * scaling` and phase `2 pi delay f_c + phase`. Paths that
//! share a tap add up; paths beyond the last tap are dropped. Both lobes are
//! clamped to `+-TAP_LIMIT`.

use std::f64::consts::PI;

use num_complex::Complex64;
use tracing::debug;

use crate::control::Command;
use crate::radio::{CoefficientSet, NUM_TAPS};

use super::EmulatorError;
use super::models::PropagationPath;

/// Full-scale tap for a path without loss
const TAP_NO_LOSS: f64 = 32767.0;

/// Largest tap magnitude sent to the FIRs
pub const TAP_LIMIT: i16 = 32760;

/// Gain applied after dividing by the path loss
pub const DEFAULT_SCALING: f64 = 30000.0;

/// Deepest manual attenuation accepted
pub const MAX_ATTENUATION_DB: f64 = 120.0;

/// Converts propagation paths into a tap update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapSynthesizer {
    sample_rate_hz: f64,
    carrier_hz: f64,
    scaling: f64,
}

impl TapSynthesizer {
    pub fn new(sample_rate_hz: f64, carrier_hz: f64) -> Result<Self, EmulatorError> {
        for (name, value) in [("sample rate", sample_rate_hz), ("carrier frequency", carrier_hz)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(EmulatorError::InvalidRate { name, value });
            }
        }
        Ok(Self {
            sample_rate_hz,
            carrier_hz,
            scaling: DEFAULT_SCALING,
        })
    }

    pub fn with_scaling(mut self, scaling: f64) -> Self {
        self.scaling = scaling;
        self
    }

    /// Delay covered by one tap
    pub fn tap_period(&self) -> f64 {
        1.0 / self.sample_rate_hz
    }

    /// Tap a path with `delay_s` falls into, if any
    pub fn tap_index(&self, delay_s: f64) -> Option<usize> {
        if !delay_s.is_finite() || delay_s < 0.0 {
            return None;
        }
        let index = (delay_s / self.tap_period()).floor() as usize;
        (index < NUM_TAPS).then_some(index)
    }

    /// Complex contribution of one path to its tap
    pub fn path_tap(&self, path: &PropagationPath) -> Complex64 {
        let phase = Complex64::from_polar(1.0, 2.0 * PI * path.delay_s * self.carrier_hz + path.phase_rad);
        if path.loss_linear == 0.0 {
            phase * TAP_NO_LOSS
        } else {
            phase * (TAP_NO_LOSS / path.loss_linear * self.scaling)
        }
    }

    /// Bin every path into its tap and quantise both lobes
    pub fn synthesize(&self, paths: &[PropagationPath]) -> Command {
        let mut taps = [Complex64::new(0.0, 0.0); NUM_TAPS];
        for path in paths {
            match self.tap_index(path.delay_s) {
                Some(index) => taps[index] += self.path_tap(path),
                None => debug!("Path with delay {} s falls outside the filter", path.delay_s),
            }
        }

        Command::UpdateTaps {
            real: taps.map(|t| quantize(t.re)).into(),
            imag: taps.map(|t| quantize(t.im)).into(),
        }
    }

    /// Flat attenuation of `db` on the first real tap, everything else zero
    pub fn attenuation(&self, db: f64) -> Result<Command, EmulatorError> {
        if !(0.0..=MAX_ATTENUATION_DB).contains(&db) {
            return Err(EmulatorError::InvalidAttenuation(db));
        }
        let tap = TAP_NO_LOSS / 10f64.powf(db / 20.0) * self.scaling;
        Ok(Command::UpdateTaps {
            real: CoefficientSet::impulse(quantize(tap)),
            imag: CoefficientSet::zeros(),
        })
    }
}

fn quantize(value: f64) -> i16 {
    (value as i16).clamp(-TAP_LIMIT, TAP_LIMIT)
}
