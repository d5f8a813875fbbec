//! Startup configuration record
//!
//! Everything is in memory and rebuilt on every run. The binaries fill this
//! in from the command line.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::runtime::{RadioError, RadioResult};

/// Default UDP port of the control listener
pub const DEFAULT_CONTROL_PORT: u16 = 1338;

#[derive(Debug, Clone, PartialEq)]
pub struct RepeaterConfig {
    /// Device address arguments, e.g. `addr=10.193.0.69`
    pub device_args: String,
    /// Device number used in block identifiers
    pub device_index: u32,
    pub rx_gain_db: f64,
    pub tx_gain_db: f64,
    /// Carrier frequency for rx and tx on both radios
    pub frequency_hz: f64,
    pub bandwidth_hz: f64,
    /// Working rate between the converters and the FIR blocks
    pub sample_rate_hz: f64,
    /// Native radio rate
    pub radio_rate_hz: f64,
    pub samples_per_packet: u32,
    pub rx_antenna: String,
    pub tx_antenna: String,
    pub control_addr: IpAddr,
    pub control_port: u16,
    /// Pause between commit and starting the stream
    pub settle_delay: Duration,
}

impl Default for RepeaterConfig {
    fn default() -> Self {
        Self {
            device_args: "addr=10.193.0.69".to_string(),
            device_index: 0,
            rx_gain_db: 20.0,
            tx_gain_db: 20.0,
            frequency_hz: 2.45e9,
            bandwidth_hz: 200e6,
            sample_rate_hz: 200e6,
            radio_rate_hz: 200e6,
            samples_per_packet: 128,
            rx_antenna: "RX2".to_string(),
            tx_antenna: "TX/RX".to_string(),
            control_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            control_port: DEFAULT_CONTROL_PORT,
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl RepeaterConfig {
    pub fn control_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.control_addr, self.control_port)
    }

    /// Reject values no radio could accept
    pub fn validate(&self) -> RadioResult {
        let positive = [
            ("frequency", self.frequency_hz),
            ("bandwidth", self.bandwidth_hz),
            ("sample rate", self.sample_rate_hz),
            ("radio rate", self.radio_rate_hz),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(RadioError::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        for (name, value) in [("rx gain", self.rx_gain_db), ("tx gain", self.tx_gain_db)] {
            if !value.is_finite() {
                return Err(RadioError::InvalidConfig(format!("{} is not finite", name)));
            }
        }
        if self.sample_rate_hz > self.radio_rate_hz {
            return Err(RadioError::InvalidConfig(format!(
                "sample rate {} Hz exceeds radio rate {} Hz",
                self.sample_rate_hz, self.radio_rate_hz
            )));
        }
        if self.samples_per_packet == 0 {
            return Err(RadioError::InvalidConfig(
                "samples per packet must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepeaterConfig::default();
        assert_eq!(config.rx_gain_db, 20.0);
        assert_eq!(config.frequency_hz, 2.45e9);
        assert_eq!(config.control_socket_addr().to_string(), "127.0.0.1:1338");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        let config = RepeaterConfig {
            sample_rate_hz: 400e6,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RadioError::InvalidConfig(_))));

        let config = RepeaterConfig {
            bandwidth_hz: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RepeaterConfig {
            samples_per_packet: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
