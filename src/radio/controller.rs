//! Owning context for the running repeater
//!
//! The controller holds the device handle together with every piece of radio
//! state: the topology, both channels, the filter bank and the stream
//! supervisor. The control listener and the shutdown path both borrow it,
//! so there is exactly one mutator.

use tracing::{error, info, warn};

use crate::config::RepeaterConfig;
use crate::control::Command;
use crate::runtime::{Device, GraphTopology, RadioResult, TopologyState};

use super::channel::{ChannelConfig, FrontEnd};
use super::filter_bank::{CoefficientSet, FilterBank, Lobe, SignalPath};
use super::supervisor::StreamSupervisor;
use super::wiring::repeater_topology;

pub struct RadioController<D: Device> {
    device: D,
    topology: GraphTopology,
    channels: [ChannelConfig; 2],
    filters: FilterBank,
    supervisor: StreamSupervisor,
}

impl<D: Device> RadioController<D> {
    /// Declare the repeater wiring on `device`. Nothing is configured yet.
    pub fn new(device: D, config: &RepeaterConfig) -> RadioResult<Self> {
        config.validate()?;

        let topology = repeater_topology(&device, config.device_index)?;
        let channels = [
            ChannelConfig::new(config.device_index, 0),
            ChannelConfig::new(config.device_index, 1),
        ];
        let supervisor = StreamSupervisor::new(channels.iter().map(|c| c.radio()), config.settle_delay);

        Ok(Self {
            device,
            topology,
            channels,
            filters: FilterBank::new(config.device_index),
            supervisor,
        })
    }

    /// Declare, configure, commit and start streaming.
    ///
    /// Any failure here is fatal: the device is left unstarted and the
    /// error returned to the caller.
    pub fn bring_up(device: D, config: &RepeaterConfig) -> RadioResult<Self> {
        let mut controller = Self::new(device, config)?;
        controller.configure(config)?;
        controller.commit()?;
        controller.start()?;
        Ok(controller)
    }

    /// Apply the startup parameters to both channels and load the impulse
    /// response into every FIR block
    pub fn configure(&mut self, config: &RepeaterConfig) -> RadioResult {
        let rx = FrontEnd {
            frequency_hz: config.frequency_hz,
            gain_db: config.rx_gain_db,
            antenna: config.rx_antenna.clone(),
            bandwidth_hz: config.bandwidth_hz,
        };
        let tx = FrontEnd {
            frequency_hz: config.frequency_hz,
            gain_db: config.tx_gain_db,
            antenna: config.tx_antenna.clone(),
            bandwidth_hz: config.bandwidth_hz,
        };

        for channel in &mut self.channels {
            channel.set_radio_rate(&mut self.device, config.radio_rate_hz)?;
            channel.set_rx(&mut self.device, &rx)?;
            channel.set_tx(&mut self.device, &tx)?;
            channel.enable_rx_timestamps(&mut self.device, false)?;
            channel.set_samples_per_packet(&mut self.device, config.samples_per_packet)?;
        }
        for channel in &mut self.channels {
            channel.set_sample_rate(&mut self.device, config.sample_rate_hz)?;
        }

        self.filters.initialize(&mut self.device)?;
        Ok(())
    }

    /// Log every edge, then lock the topology in on the device
    pub fn commit(&mut self) -> RadioResult {
        for connection in self.topology.enumerate_connections() {
            info!("{}", connection);
        }
        self.topology.commit(&mut self.device)
    }

    pub fn start(&mut self) -> RadioResult {
        self.supervisor.start(&mut self.device, &mut self.topology)
    }

    /// Stop streaming. Safe to call more than once; only the first call
    /// reaches the radios.
    pub fn stop(&mut self) -> RadioResult {
        self.supervisor.stop(&mut self.device, &mut self.topology)
    }

    /// Carry out one control command.
    ///
    /// Hardware failures are logged and returned, and the previous live
    /// values stay in effect on every block the command touches.
    pub fn apply(&mut self, command: &Command) -> RadioResult {
        match command {
            Command::UpdateTaps { real, imag } => self.update_taps(real, imag),
            Command::SetFrequency { hz } => self.set_frequency(f64::from(*hz)),
        }
    }

    /// Mirror the real lobe onto both real FIRs and the imaginary lobe onto
    /// both imaginary FIRs.
    ///
    /// The update lands on all four FIRs or on none: if one swap is rejected,
    /// the swaps already made are reverted to the previous sets.
    pub fn update_taps(&mut self, real: &CoefficientSet, imag: &CoefficientSet) -> RadioResult {
        let plan: Vec<(SignalPath, Lobe, CoefficientSet)> = SignalPath::ALL
            .into_iter()
            .flat_map(|path| [(path, Lobe::Real, *real), (path, Lobe::Imaginary, *imag)])
            .collect();
        let previous: Vec<CoefficientSet> = plan
            .iter()
            .map(|(path, lobe, _)| *self.filters.coefficients(*path, *lobe))
            .collect();

        for (i, (path, lobe, set)) in plan.iter().enumerate() {
            if let Err(e) = self.filters.set_coefficients(&mut self.device, *path, *lobe, set.as_ref()) {
                error!("{:?} path {:?} taps not applied: {}", path, lobe, e);
                for ((path, lobe, _), old) in plan[..i].iter().zip(&previous) {
                    if let Err(restore) = self.filters.set_coefficients(&mut self.device, *path, *lobe, old.as_ref()) {
                        warn!("{:?} path {:?} taps not restored: {}", path, lobe, restore);
                    }
                }
                return Err(e);
            }
        }

        info!("Taps updated real={} imag={}", real, imag);
        Ok(())
    }

    /// Retune rx and tx of both radios to `hz`.
    ///
    /// Both radios move or neither does: if one channel is rejected, the
    /// channels already retuned go back to their previous carriers.
    pub fn set_frequency(&mut self, hz: f64) -> RadioResult {
        let previous = self
            .channels
            .iter()
            .map(|channel| channel.tuning(&self.device))
            .collect::<RadioResult<Vec<_>>>()?;

        for i in 0..self.channels.len() {
            if let Err(e) = self.channels[i].retune(&mut self.device, hz) {
                error!("{} not retuned to {} Hz: {}", self.channels[i].radio(), hz, e);
                for (channel, tuning) in self.channels[..i].iter_mut().zip(&previous) {
                    if let Err(restore) = channel.restore_tuning(&mut self.device, tuning) {
                        warn!("{} not restored: {}", channel.radio(), restore);
                    }
                }
                return Err(e);
            }
        }

        info!("Frequency updated to {} Hz", hz);
        Ok(())
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn topology(&self) -> &GraphTopology {
        &self.topology
    }

    pub fn state(&self) -> TopologyState {
        self.topology.state()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelConfig> {
        self.channels.get(index)
    }

    pub fn channels(&self) -> &[ChannelConfig] {
        &self.channels
    }

    pub fn filters(&self) -> &FilterBank {
        &self.filters
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::radio::fir_block;
    use crate::runtime::{BlockId, BlockKind, RadioError, SimulatedDevice, StreamCommand};

    fn config() -> RepeaterConfig {
        RepeaterConfig {
            settle_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn running() -> RadioController<SimulatedDevice> {
        RadioController::bring_up(SimulatedDevice::new(0), &config()).unwrap()
    }

    fn radio(index: u32) -> BlockId {
        BlockId::new(0, BlockKind::Radio, index)
    }

    #[test]
    fn test_bring_up_streams_both_radios() {
        let controller = running();

        assert_eq!(controller.state(), TopologyState::Streaming);
        for i in 0..2 {
            let state = controller.device().radio(&radio(i)).unwrap();
            assert!(state.streaming);
            assert_eq!(state.rx_frequency, 2.45e9);
            assert_eq!(state.tx_frequency, 2.45e9);
            assert_eq!(state.rx_antenna, "RX2");
            assert_eq!(state.tx_antenna, "TX/RX");
            assert!(!state.rx_timestamps);
            assert_eq!(
                state.stream_commands,
                vec![StreamCommand::StartContinuous { stream_now: true }]
            );
            assert_eq!(controller.device().property(&radio(i), "spp:0"), Some("128"));
        }
    }

    #[test]
    fn test_bring_up_loads_impulse() {
        let controller = running();

        for fir in controller.filters().blocks() {
            let taps = controller.device().coefficients(&fir).unwrap();
            assert_eq!(taps[0], 8191);
            assert!(taps[1..].iter().all(|&t| t == 0));
        }
    }

    #[test]
    fn test_update_taps_mirrors_lobes() {
        let mut controller = running();
        let real = CoefficientSet::from([3; 41]);
        let imag = CoefficientSet::from([-5; 41]);

        controller
            .apply(&Command::UpdateTaps { real, imag })
            .unwrap();

        for path in SignalPath::ALL {
            assert_eq!(controller.filters().coefficients(path, Lobe::Real), &real);
            assert_eq!(controller.filters().coefficients(path, Lobe::Imaginary), &imag);
            let fir = fir_block(0, path, Lobe::Imaginary);
            assert_eq!(controller.device().coefficients(&fir).unwrap(), vec![-5; 41]);
        }
    }

    #[test]
    fn test_set_frequency_moves_both_channels() {
        let mut controller = running();

        controller
            .apply(&Command::SetFrequency { hz: 915_000_000 })
            .unwrap();

        for channel in controller.channels() {
            assert_eq!(channel.state().rx_frequency(), Some(915e6));
            assert_eq!(channel.state().tx_frequency(), Some(915e6));
        }
    }

    #[test]
    fn test_rejected_frequency_keeps_previous() {
        let mut controller = running();

        let result = controller.apply(&Command::SetFrequency { hz: -1 });

        assert!(matches!(result, Err(RadioError::HardwareRejected(_))));
        assert_eq!(controller.state(), TopologyState::Streaming);
        for i in 0..2 {
            let state = controller.device().radio(&radio(i)).unwrap();
            assert_eq!(state.rx_frequency, 2.45e9);
            assert_eq!(state.tx_frequency, 2.45e9);
        }
    }

    #[test]
    fn test_frequency_rejected_by_second_radio_reverts_first() {
        let mut controller = running();
        controller.device.inject_fault(radio(1));

        let result = controller.apply(&Command::SetFrequency { hz: 915_000_000 });

        assert!(matches!(result, Err(RadioError::HardwareRejected(_))));
        for i in 0..2 {
            let state = controller.device().radio(&radio(i)).unwrap();
            assert_eq!(state.rx_frequency, 2.45e9);
            assert_eq!(state.tx_frequency, 2.45e9);
        }
        for channel in controller.channels() {
            assert_eq!(channel.state().rx_frequency(), Some(2.45e9));
            assert_eq!(channel.state().tx_frequency(), Some(2.45e9));
        }
    }

    #[test]
    fn test_taps_rejected_by_one_fir_revert_all() {
        let mut controller = running();
        controller.device.inject_fault(fir_block(0, SignalPath::B, Lobe::Real));

        let result = controller.apply(&Command::UpdateTaps {
            real: CoefficientSet::from([5; 41]),
            imag: CoefficientSet::from([-5; 41]),
        });

        assert!(matches!(result, Err(RadioError::HardwareRejected(_))));
        let impulse = CoefficientSet::default();
        for path in SignalPath::ALL {
            for lobe in Lobe::ALL {
                assert_eq!(controller.filters().coefficients(path, lobe), &impulse);
                let fir = fir_block(0, path, lobe);
                assert_eq!(controller.device().coefficients(&fir).unwrap(), impulse.as_ref());
            }
        }
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut controller = running();

        controller.stop().unwrap();
        controller.stop().unwrap();

        assert_eq!(controller.state(), TopologyState::Stopped);
        let commands = &controller.device().radio(&radio(1)).unwrap().stream_commands;
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1], StreamCommand::StopContinuous);
    }

    #[test]
    fn test_bring_up_rejects_sample_rate_above_radio_rate() {
        let config = RepeaterConfig {
            sample_rate_hz: 250e6,
            ..config()
        };
        let result = RadioController::bring_up(SimulatedDevice::new(0), &config);
        assert!(matches!(result, Err(RadioError::InvalidConfig(_))));
    }

    #[test]
    fn test_bring_up_fails_on_missing_block() {
        let blocks = [
            BlockKind::Radio,
            BlockKind::DownConverter,
            BlockKind::UpConverter,
            BlockKind::Splitter,
        ]
        .into_iter()
        .flat_map(|kind| (0..2).map(move |i| BlockId::new(0, kind, i)));
        let device = SimulatedDevice::with_blocks(0, blocks);

        let result = RadioController::bring_up(device, &config());
        assert!(matches!(result, Err(RadioError::Topology(_))));
    }
}
