//! Control datagram codec
//!
//! Two fixed-size shapes, told apart by total length:
//!
//! | length | layout                          | command        |
//! |--------|---------------------------------|----------------|
//! | 164    | 82 x big-endian `i16`           | `UpdateTaps`   |
//! | 5      | `'F'` + big-endian `i32`        | `SetFrequency` |
//!
//! The first 41 taps of a 164-byte datagram are the real lobe, the next 41
//! the imaginary lobe.

use std::fmt;

use crate::radio::{CoefficientSet, NUM_TAPS};

/// Size of a tap update datagram
pub const TAPS_DATAGRAM_LEN: usize = 2 * NUM_TAPS * 2;

/// Size of a frequency update datagram
pub const FREQUENCY_DATAGRAM_LEN: usize = 5;

/// First byte of a frequency update datagram
pub const FREQUENCY_TAG: u8 = b'F';

/// A decoded control request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// New real and imaginary lobes for both signal paths
    UpdateTaps {
        real: CoefficientSet,
        imag: CoefficientSet,
    },
    /// New carrier frequency for rx and tx on both radios
    SetFrequency { hz: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed datagram ({len} bytes): {reason}")]
    Malformed { len: usize, reason: &'static str },
}

impl Command {
    /// Wire representation of this command
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::UpdateTaps { real, imag } => {
                let mut buf = Vec::with_capacity(TAPS_DATAGRAM_LEN);
                for tap in real.taps().iter().chain(imag.taps()) {
                    buf.extend_from_slice(&tap.to_be_bytes());
                }
                buf
            }
            Command::SetFrequency { hz } => {
                let mut buf = Vec::with_capacity(FREQUENCY_DATAGRAM_LEN);
                buf.push(FREQUENCY_TAG);
                buf.extend_from_slice(&hz.to_be_bytes());
                buf
            }
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Command::UpdateTaps { real, imag } => {
                write!(f, "UpdateTaps real={} imag={}", real, imag)
            }
            Command::SetFrequency { hz } => write!(f, "SetFrequency {} Hz", hz),
        }
    }
}

/// Decode one datagram. Pure; never touches hardware.
pub fn decode(datagram: &[u8]) -> Result<Command, ProtocolError> {
    match datagram.len() {
        TAPS_DATAGRAM_LEN => {
            let mut real = [0i16; NUM_TAPS];
            let mut imag = [0i16; NUM_TAPS];
            for (i, pair) in datagram.chunks_exact(2).enumerate() {
                let tap = i16::from_be_bytes([pair[0], pair[1]]);
                if i < NUM_TAPS {
                    real[i] = tap;
                } else {
                    imag[i - NUM_TAPS] = tap;
                }
            }
            Ok(Command::UpdateTaps {
                real: real.into(),
                imag: imag.into(),
            })
        }
        FREQUENCY_DATAGRAM_LEN => {
            if datagram[0] != FREQUENCY_TAG {
                return Err(ProtocolError::Malformed {
                    len: datagram.len(),
                    reason: "frequency datagram must start with 'F'",
                });
            }
            let hz = i32::from_be_bytes([datagram[1], datagram[2], datagram[3], datagram[4]]);
            Ok(Command::SetFrequency { hz })
        }
        len => Err(ProtocolError::Malformed {
            len,
            reason: "expected 164 or 5 bytes",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taps_datagram(values: impl Fn(usize) -> i16) -> Vec<u8> {
        (0..2 * NUM_TAPS).flat_map(|i| values(i).to_be_bytes()).collect()
    }

    #[test]
    fn test_decode_frequency() {
        let mut datagram = vec![b'F'];
        datagram.extend_from_slice(&915_000_000i32.to_be_bytes());

        assert_eq!(decode(&datagram), Ok(Command::SetFrequency { hz: 915_000_000 }));
    }

    #[test]
    fn test_decode_negative_frequency() {
        let datagram = [b'F', 0xff, 0xff, 0xff, 0xfe];
        assert_eq!(decode(&datagram), Ok(Command::SetFrequency { hz: -2 }));
    }

    #[test]
    fn test_decode_taps_splits_lobes() {
        let datagram = taps_datagram(|i| i as i16 - 41);

        let Ok(Command::UpdateTaps { real, imag }) = decode(&datagram) else {
            panic!("expected UpdateTaps");
        };
        assert_eq!(real.taps()[0], -41);
        assert_eq!(real.taps()[40], -1);
        assert_eq!(imag.taps()[0], 0);
        assert_eq!(imag.taps()[40], 40);
    }

    #[test]
    fn test_impulse_datagram() {
        let datagram = taps_datagram(|i| if i == 0 { 8191 } else { 0 });

        let command = decode(&datagram).unwrap();
        assert_eq!(
            command,
            Command::UpdateTaps {
                real: CoefficientSet::impulse(8191),
                imag: CoefficientSet::zeros(),
            }
        );
    }

    #[test]
    fn test_taps_reencode_exactly() {
        // Exercise both byte halves and the sign bit
        let datagram = taps_datagram(|i| (i as i16).wrapping_mul(797).wrapping_sub(i16::MAX));

        let command = decode(&datagram).unwrap();
        assert_eq!(command.encode(), datagram);
    }

    #[test]
    fn test_frequency_reencode_exactly() {
        let command = Command::SetFrequency { hz: i32::MAX };
        assert_eq!(decode(&command.encode()), Ok(command));
        assert_eq!(command.encode().len(), FREQUENCY_DATAGRAM_LEN);
    }

    #[test]
    fn test_wrong_tag() {
        let datagram = [b'G', 0, 0, 0, 1];
        assert!(matches!(
            decode(&datagram),
            Err(ProtocolError::Malformed { len: 5, .. })
        ));
    }

    #[test]
    fn test_other_lengths_are_malformed() {
        for len in [0, 1, 4, 6, 163, 165, 328, 1500] {
            let datagram = vec![b'F'; len];
            assert_eq!(
                decode(&datagram),
                Err(ProtocolError::Malformed {
                    len,
                    reason: "expected 164 or 5 bytes",
                }),
                "length {len}"
            );
        }
    }
}
