//! Start and stop of continuous streaming on both radios

use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::runtime::{
    BlockId, Device, GraphTopology, RadioResult, StreamCommand, TopologyError, TopologyState,
};

const CHAN: usize = 0;

/// Issues stream commands to the radios of a committed topology
pub struct StreamSupervisor {
    radios: Vec<BlockId>,
    settle_delay: Duration,
    stopped: bool,
}

impl StreamSupervisor {
    pub fn new(radios: impl IntoIterator<Item = BlockId>, settle_delay: Duration) -> Self {
        Self {
            radios: radios.into_iter().collect(),
            settle_delay,
            stopped: false,
        }
    }

    /// Start continuous streaming on every radio.
    ///
    /// The topology must be committed. Waits `settle_delay` first so the
    /// commit has propagated on the device. If any radio refuses, the ones
    /// already started are stopped again and the topology is stopped.
    pub fn start<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        topology: &mut GraphTopology,
    ) -> RadioResult {
        if topology.state() != TopologyState::Committed {
            return Err(TopologyError::InvalidState {
                expected: TopologyState::Committed,
                actual: topology.state(),
            }
            .into());
        }

        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }

        let start = StreamCommand::StartContinuous { stream_now: true };
        for (i, radio) in self.radios.iter().enumerate() {
            if let Err(e) = device.issue_stream_cmd(radio, start, CHAN) {
                error!("{} refused to start streaming: {}", radio, e);
                for started in &self.radios[..i] {
                    if let Err(rollback) = device.issue_stream_cmd(started, StreamCommand::StopContinuous, CHAN) {
                        warn!("{} refused to stop after failed start: {}", started, rollback);
                    }
                }
                self.stopped = true;
                topology.mark_stopped();
                return Err(e.into());
            }
        }

        topology.transition(TopologyState::Committed, TopologyState::Streaming)?;
        info!("Streaming started on {} radios", self.radios.len());
        Ok(())
    }

    /// Stop streaming on every radio. Only the first call issues commands.
    ///
    /// Every radio is sent the stop command even if an earlier one fails;
    /// the first failure is returned.
    pub fn stop<D: Device + ?Sized>(
        &mut self,
        device: &mut D,
        topology: &mut GraphTopology,
    ) -> RadioResult {
        if self.stopped {
            warn!("Streaming already stopped");
            return Ok(());
        }
        self.stopped = true;

        let mut result = Ok(());
        if matches!(
            topology.state(),
            TopologyState::Committed | TopologyState::Streaming
        ) {
            info!("Stop Streaming");
            for radio in &self.radios {
                if let Err(e) = device.issue_stream_cmd(radio, StreamCommand::StopContinuous, CHAN) {
                    error!("{} refused to stop streaming: {}", radio, e);
                    if result.is_ok() {
                        result = Err(e.into());
                    }
                }
            }
        }

        topology.mark_stopped();
        result
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{BlockKind, RadioError, SimulatedDevice};

    fn committed_loop(device: &mut SimulatedDevice) -> GraphTopology {
        let mut topology = GraphTopology::new();
        let radio = topology.declare(&*device, "0/Radio#0", BlockKind::Radio).unwrap();
        let ddc = topology.declare(&*device, "0/DDC#0", BlockKind::DownConverter).unwrap();
        let duc = topology.declare(&*device, "0/DUC#0", BlockKind::UpConverter).unwrap();
        topology.connect(radio, 0, ddc, 0, false).unwrap();
        topology.connect(ddc, 0, duc, 0, false).unwrap();
        topology.connect(duc, 0, radio, 0, true).unwrap();
        topology.commit(device).unwrap();
        topology
    }

    fn radio(s: &str) -> BlockId {
        s.parse().unwrap()
    }

    #[test]
    fn test_start_requires_commit() {
        let mut device = SimulatedDevice::new(0);
        let mut topology = GraphTopology::new();
        let mut supervisor = StreamSupervisor::new([radio("0/Radio#0")], Duration::ZERO);

        let result = supervisor.start(&mut device, &mut topology);
        assert!(matches!(
            result,
            Err(RadioError::Topology(TopologyError::InvalidState { .. }))
        ));
    }

    #[test]
    fn test_start_then_stop() {
        let mut device = SimulatedDevice::new(0);
        let mut topology = committed_loop(&mut device);
        let radios = [radio("0/Radio#0"), radio("0/Radio#1")];
        let mut supervisor = StreamSupervisor::new(radios, Duration::ZERO);

        supervisor.start(&mut device, &mut topology).unwrap();
        assert_eq!(topology.state(), TopologyState::Streaming);
        assert!(radios.iter().all(|r| device.radio(r).unwrap().streaming));

        supervisor.stop(&mut device, &mut topology).unwrap();
        assert_eq!(topology.state(), TopologyState::Stopped);
        assert!(radios.iter().all(|r| !device.radio(r).unwrap().streaming));
    }

    #[test]
    fn test_stop_issues_commands_once() {
        let mut device = SimulatedDevice::new(0);
        let mut topology = committed_loop(&mut device);
        let r0 = radio("0/Radio#0");
        let mut supervisor = StreamSupervisor::new([r0], Duration::ZERO);

        supervisor.start(&mut device, &mut topology).unwrap();
        supervisor.stop(&mut device, &mut topology).unwrap();
        supervisor.stop(&mut device, &mut topology).unwrap();

        assert_eq!(
            device.radio(&r0).unwrap().stream_commands,
            vec![
                StreamCommand::StartContinuous { stream_now: true },
                StreamCommand::StopContinuous,
            ]
        );
    }

    #[test]
    fn test_failed_start_rolls_back() {
        let mut device = SimulatedDevice::new(0);
        let mut topology = committed_loop(&mut device);
        let (r0, r1) = (radio("0/Radio#0"), radio("0/Radio#1"));
        device.inject_fault(r1);
        let mut supervisor = StreamSupervisor::new([r0, r1], Duration::ZERO);

        assert!(supervisor.start(&mut device, &mut topology).is_err());
        assert!(!device.radio(&r0).unwrap().streaming);
        assert_eq!(topology.state(), TopologyState::Stopped);
        assert!(supervisor.is_stopped());
    }

    #[test]
    fn test_failed_start_stops_every_started_radio() {
        let mut device = SimulatedDevice::new(0);
        let mut topology = committed_loop(&mut device);
        let (r0, r1) = (radio("0/Radio#0"), radio("0/Radio#1"));
        // No third radio on this device
        let mut supervisor = StreamSupervisor::new([r0, r1, radio("0/Radio#2")], Duration::ZERO);

        let result = supervisor.start(&mut device, &mut topology);

        assert!(matches!(result, Err(RadioError::HardwareRejected(_))));
        for r in [r0, r1] {
            let state = device.radio(&r).unwrap();
            assert!(!state.streaming);
            assert_eq!(state.stream_commands.last(), Some(&StreamCommand::StopContinuous));
        }
        assert_eq!(topology.state(), TopologyState::Stopped);
    }
}
