//! Push control datagrams to a running repeater
//!
//! Usage:
//!   repeaterctl freq 915e6
//!   repeaterctl taps --real 8191,0,0,... --imag 0,0,0,...
//!   repeaterctl impulse --amplitude 4096
//!   repeaterctl model two-ray --pos 120,40,30
//!   repeaterctl attenuate 60

use std::net::{IpAddr, SocketAddr, UdpSocket};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use repeater::config::DEFAULT_CONTROL_PORT;
use repeater::emulator::DEFAULT_SCALING;
use repeater::emulator::models::DEFAULT_CARRIER_HZ;
use repeater::{CoefficientSet, Command, PathModel, Position, Scenario, TapSynthesizer};

/// Sample rate the FIRs run at by default
const DEFAULT_SAMPLE_RATE_HZ: f64 = 200e6;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Repeater control address
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Repeater control port
    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    port: u16,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Retune both radios (rx and tx)
    Freq {
        /// Carrier frequency in Hz, must fit a signed 32-bit integer
        #[arg(allow_negative_numbers = true)]
        hz: f64,
    },

    /// Load a complex coefficient set on both signal paths
    Taps {
        /// Real lobe, 41 comma-separated taps
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
        real: Vec<i16>,

        /// Imaginary lobe, 41 comma-separated taps
        #[arg(long, value_delimiter = ',', allow_negative_numbers = true, required = true)]
        imag: Vec<i16>,
    },

    /// Restore a pass-through impulse on both paths
    Impulse {
        #[arg(long, default_value_t = repeater::radio::IMPULSE_AMPLITUDE)]
        amplitude: i16,
    },

    /// Emulate the channel to a node at a position relative to the station
    Model {
        #[arg(value_enum)]
        model: ModelArg,

        /// Node position in metres, x,y,z
        #[arg(long, allow_hyphen_values = true)]
        pos: Position,

        #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE_HZ)]
        sample_rate: f64,

        #[arg(long, default_value_t = DEFAULT_CARRIER_HZ)]
        carrier: f64,

        #[arg(long, default_value_t = DEFAULT_SCALING)]
        scaling: f64,
    },

    /// Replace the channel with a flat attenuation
    Attenuate {
        /// Attenuation in dB, 0 to 120
        db: f64,

        #[arg(long, default_value_t = DEFAULT_SCALING)]
        scaling: f64,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Freespace,
    TwoRay,
}

impl From<ModelArg> for PathModel {
    fn from(model: ModelArg) -> Self {
        match model {
            ModelArg::Freespace => PathModel::FreeSpace,
            ModelArg::TwoRay => PathModel::FlatEarthTwoRay,
        }
    }
}

impl Action {
    fn into_command(self) -> Result<Command, Box<dyn std::error::Error>> {
        let command = match self {
            Action::Freq { hz } => Command::SetFrequency {
                hz: frequency_to_wire(hz)?,
            },
            Action::Taps { real, imag } => Command::UpdateTaps {
                real: CoefficientSet::try_from(real.as_slice())?,
                imag: CoefficientSet::try_from(imag.as_slice())?,
            },
            Action::Impulse { amplitude } => Command::UpdateTaps {
                real: CoefficientSet::impulse(amplitude),
                imag: CoefficientSet::zeros(),
            },
            Action::Model {
                model,
                pos,
                sample_rate,
                carrier,
                scaling,
            } => {
                let scenario = Scenario::with_carrier(carrier)?;
                let paths = scenario.paths(model.into(), &pos);
                info!("{} path(s) to node at {}", paths.len(), pos);
                TapSynthesizer::new(sample_rate, carrier)?
                    .with_scaling(scaling)
                    .synthesize(&paths)
            }
            Action::Attenuate { db, scaling } => TapSynthesizer::new(DEFAULT_SAMPLE_RATE_HZ, DEFAULT_CARRIER_HZ)?
                .with_scaling(scaling)
                .attenuation(db)?,
        };
        Ok(command)
    }
}

/// The wire carries a signed 32-bit frequency; anything else is refused
/// rather than truncated.
fn frequency_to_wire(hz: f64) -> Result<i32, String> {
    if !hz.is_finite() || hz.fract() != 0.0 || hz < f64::from(i32::MIN) || hz > f64::from(i32::MAX) {
        return Err(format!(
            "{} Hz cannot be sent: the control protocol carries whole Hz in a signed 32-bit field (max {})",
            hz,
            i32::MAX
        ));
    }
    Ok(hz as i32)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let target = SocketAddr::new(cli.host, cli.port);
    let command = cli.command.into_command()?;

    let socket = UdpSocket::bind(("0.0.0.0", 0))?;
    let datagram = command.encode();
    socket.send_to(&datagram, target)?;

    info!("Sent {} ({} bytes) to {}", command, datagram.len(), target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_range() {
        assert_eq!(frequency_to_wire(915e6), Ok(915_000_000));
        assert!(frequency_to_wire(2.45e9).is_err());
        assert!(frequency_to_wire(100.5).is_err());
        assert!(frequency_to_wire(f64::NAN).is_err());
    }

    #[test]
    fn test_taps_need_full_set() {
        let action = Action::Taps {
            real: vec![1; 40],
            imag: vec![0; 41],
        };
        assert!(action.into_command().is_err());
    }

    #[test]
    fn test_impulse_command() {
        let command = Action::Impulse { amplitude: 8191 }.into_command().unwrap();
        assert_eq!(
            command,
            Command::UpdateTaps {
                real: CoefficientSet::impulse(8191),
                imag: CoefficientSet::zeros(),
            }
        );
    }

    #[test]
    fn test_negative_frequency_parses() {
        let cli = Cli::try_parse_from(["repeaterctl", "freq", "-5"]).unwrap();
        assert_eq!(cli.command.into_command().unwrap(), Command::SetFrequency { hz: -5 });
    }

    #[test]
    fn test_attenuate_command() {
        let cli = Cli::try_parse_from(["repeaterctl", "attenuate", "90"]).unwrap();
        let Command::UpdateTaps { real, imag } = cli.command.into_command().unwrap() else {
            panic!("expected a tap update");
        };
        assert_eq!(real.taps()[0], 31085);
        assert_eq!(imag, CoefficientSet::zeros());

        let cli = Cli::try_parse_from(["repeaterctl", "attenuate", "130"]).unwrap();
        assert!(cli.command.into_command().is_err());
    }

    #[test]
    fn test_model_command() {
        let cli = Cli::try_parse_from(["repeaterctl", "model", "two-ray", "--pos", "-20,0,30"]).unwrap();
        let Command::UpdateTaps { real, .. } = cli.command.into_command().unwrap() else {
            panic!("expected a tap update");
        };
        // Line of sight in tap 0, the ground reflection 8 ns later in tap 1
        assert_ne!(real.taps()[0], 0);
        assert_ne!(real.taps()[1], 0);
        assert!(real.taps()[2..].iter().all(|&t| t == 0));
    }
}
