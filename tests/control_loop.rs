//! End-to-end control channel tests over loopback UDP

use std::net::{SocketAddr, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Sender, bounded};

use repeater::runtime::Device;
use repeater::{
    BlockId, BlockKind, CoefficientSet, Command, ControlListener, Lobe, NUM_TAPS, RadioController,
    RepeaterConfig, SignalPath, SimulatedDevice, TopologyState,
};

/// Time allowed for queued datagrams to be applied before shutdown
const DRAIN: Duration = Duration::from_millis(500);

struct Running {
    addr: SocketAddr,
    shutdown: Sender<()>,
    handle: JoinHandle<RadioController<SimulatedDevice>>,
}

impl Running {
    fn start() -> Self {
        let config = RepeaterConfig {
            control_port: 0,
            settle_delay: Duration::ZERO,
            ..Default::default()
        };
        let mut controller = RadioController::bring_up(SimulatedDevice::new(0), &config).unwrap();
        let listener = ControlListener::bind(config.control_socket_addr()).unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, shutdown_rx) = bounded(1);

        let handle = thread::spawn(move || {
            listener.run(&mut controller, &shutdown_rx).unwrap();
            controller.stop().unwrap();
            controller
        });

        Self {
            addr,
            shutdown,
            handle,
        }
    }

    fn send(&self, datagrams: &[Vec<u8>]) {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        for datagram in datagrams {
            socket.send_to(datagram, self.addr).unwrap();
        }
    }

    fn finish(self) -> RadioController<SimulatedDevice> {
        thread::sleep(DRAIN);
        self.shutdown.send(()).unwrap();
        self.handle.join().unwrap()
    }
}

fn frequency_datagram(hz: i32) -> Vec<u8> {
    let mut datagram = vec![b'F'];
    datagram.extend_from_slice(&hz.to_be_bytes());
    datagram
}

fn taps_datagram(real: &[i16; NUM_TAPS], imag: &[i16; NUM_TAPS]) -> Vec<u8> {
    real.iter().chain(imag).flat_map(|t| t.to_be_bytes()).collect()
}

fn fir_taps(controller: &RadioController<SimulatedDevice>, index: u32) -> Vec<i16> {
    controller
        .device()
        .coefficients(&BlockId::new(0, BlockKind::Fir, index))
        .unwrap()
}

#[test]
fn test_frequency_datagram_retunes_both_radios() {
    let running = Running::start();
    running.send(&[frequency_datagram(915_000_000)]);
    let controller = running.finish();

    for i in 0..2 {
        let radio = BlockId::new(0, BlockKind::Radio, i);
        assert_eq!(controller.device().rx_frequency(&radio, 0).unwrap(), 915e6);
        assert_eq!(controller.device().tx_frequency(&radio, 0).unwrap(), 915e6);
    }
    assert_eq!(controller.state(), TopologyState::Stopped);
}

#[test]
fn test_impulse_datagram_sets_lobes() {
    let mut real = [0; NUM_TAPS];
    real[0] = 8191;
    let running = Running::start();
    running.send(&[taps_datagram(&[1; NUM_TAPS], &[1; NUM_TAPS]), taps_datagram(&real, &[0; NUM_TAPS])]);
    let controller = running.finish();

    // FIR#0 and FIR#2 carry the real lobe, FIR#1 and FIR#3 the imaginary lobe
    for real_fir in [0, 2] {
        assert_eq!(fir_taps(&controller, real_fir), real.to_vec());
    }
    for imag_fir in [1, 3] {
        assert_eq!(fir_taps(&controller, imag_fir), vec![0; NUM_TAPS]);
    }
}

#[test]
fn test_back_to_back_updates_last_one_wins() {
    let first = [100; NUM_TAPS];
    let second: [i16; NUM_TAPS] = std::array::from_fn(|i| -(i as i16));
    let running = Running::start();
    running.send(&[taps_datagram(&first, &first), taps_datagram(&second, &first), taps_datagram(&second, &second)]);
    let controller = running.finish();

    let expected = CoefficientSet::from(second);
    for path in SignalPath::ALL {
        assert_eq!(controller.filters().coefficients(path, Lobe::Real), &expected);
        assert_eq!(controller.filters().coefficients(path, Lobe::Imaginary), &expected);
    }
    assert_eq!(fir_taps(&controller, 3), second.to_vec());
}

#[test]
fn test_malformed_datagrams_are_ignored() {
    let running = Running::start();
    running.send(&[
        vec![],
        vec![0; 163],
        vec![0; 165],
        vec![b'X', 0, 0, 0, 1],
        frequency_datagram(433_920_000),
    ]);
    let controller = running.finish();

    let radio = BlockId::new(0, BlockKind::Radio, 1);
    assert_eq!(controller.device().tx_frequency(&radio, 0).unwrap(), 433.92e6);
    for path in SignalPath::ALL {
        assert_eq!(
            controller.filters().coefficients(path, Lobe::Real),
            &CoefficientSet::default()
        );
    }
}

#[test]
fn test_rejected_frequency_keeps_listener_alive() {
    let running = Running::start();
    running.send(&[
        Command::SetFrequency { hz: -5 }.encode(),
        Command::SetFrequency { hz: 2_000_000_000 }.encode(),
    ]);
    let controller = running.finish();

    for channel in controller.channels() {
        assert_eq!(channel.state().rx_frequency(), Some(2e9));
        assert_eq!(channel.state().tx_frequency(), Some(2e9));
    }
}
