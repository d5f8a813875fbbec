//! Dual-radio FIR repeater
//!
//! Wires both radios into the repeater graph, starts streaming and then
//! serves the UDP control channel until Ctrl+C.
//!
//! Usage:
//!   repeater --freq 2.45e9 --rx-gain 20 --tx-gain 20 --udp-port 1338

use std::net::IpAddr;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use repeater::{ControlListener, RadioController, RepeaterConfig, SimulatedDevice};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Receive gain in dB
    #[arg(long, default_value_t = 20.0)]
    rx_gain: f64,

    /// Transmit gain in dB
    #[arg(long, default_value_t = 20.0)]
    tx_gain: f64,

    /// Carrier frequency in Hz
    #[arg(long, default_value_t = 2.45e9)]
    freq: f64,

    /// Radio bandwidth in Hz
    #[arg(long, default_value_t = 200e6)]
    bw: f64,

    /// Working sample rate at the FIR blocks in Hz
    #[arg(long, default_value_t = 200e6)]
    sample_rate: f64,

    /// UDP port of the control listener
    #[arg(long, default_value_t = repeater::config::DEFAULT_CONTROL_PORT)]
    udp_port: u16,

    /// Address the control listener binds to
    #[arg(long, default_value = "127.0.0.1")]
    listen_addr: IpAddr,

    /// Device address arguments
    #[arg(long, default_value = "addr=10.193.0.69")]
    device_args: String,

    /// Native radio rate in Hz
    #[arg(long, default_value_t = 200e6)]
    radio_rate: f64,

    /// Samples per packet on the radio streamers
    #[arg(long, default_value_t = 128)]
    spp: u32,

    /// Delay between commit and start of streaming, in milliseconds
    #[arg(long, default_value_t = 1000)]
    settle_ms: u64,
}

impl Args {
    fn into_config(self) -> RepeaterConfig {
        RepeaterConfig {
            device_args: self.device_args,
            rx_gain_db: self.rx_gain,
            tx_gain_db: self.tx_gain,
            frequency_hz: self.freq,
            bandwidth_hz: self.bw,
            sample_rate_hz: self.sample_rate,
            radio_rate_hz: self.radio_rate,
            samples_per_packet: self.spp,
            control_addr: self.listen_addr,
            control_port: self.udp_port,
            settle_delay: Duration::from_millis(self.settle_ms),
            ..Default::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();

    info!("=== Dual-Radio FIR Repeater ===");
    info!("Device: {}", config.device_args);
    info!(
        "Frequency: {} Hz, bandwidth: {} Hz",
        config.frequency_hz, config.bandwidth_hz
    );
    info!(
        "Gain: rx {} dB, tx {} dB",
        config.rx_gain_db, config.tx_gain_db
    );
    info!(
        "Rates: radio {} Hz, sample {} Hz, spp {}",
        config.radio_rate_hz, config.sample_rate_hz, config.samples_per_packet
    );
    info!("Control: udp://{}", config.control_socket_addr());

    warn!(
        "No hardware driver linked, running against the simulated device for {}",
        config.device_args
    );
    let device = SimulatedDevice::new(config.device_index);

    // Bind before bring-up so a taken port fails before the radios start
    let listener = ControlListener::bind(config.control_socket_addr())?;
    let mut controller = RadioController::bring_up(device, &config)?;

    let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    info!("Repeater running, press Ctrl+C to stop");
    let served = listener.run(&mut controller, &shutdown_rx);

    controller.stop()?;
    served?;

    info!("Repeater stopped");
    Ok(())
}
