//! UDP control listener
//!
//! A reader thread owns the socket reads and forwards each datagram, in
//! arrival order, over a channel. The dispatch loop is the only code that
//! touches the radio: it decodes and applies one datagram completely before
//! taking the next, and returns when the shutdown channel fires.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use tracing::{debug, error, info, warn};

use crate::radio::RadioController;
use crate::runtime::Device;
use crate::{RepeaterError, Result};

use super::protocol::{Command, decode};

/// Largest payload a UDP datagram can carry
const MAX_DATAGRAM: usize = 65_507;

/// Datagrams buffered between the reader thread and the dispatch loop
const QUEUE_DEPTH: usize = 64;

/// How often the reader thread checks whether it should exit
const READER_POLL: Duration = Duration::from_millis(100);

type Datagram = (Vec<u8>, SocketAddr);

pub struct ControlListener {
    socket: UdpSocket,
}

impl ControlListener {
    pub fn bind(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        info!("Control listener bound to {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive and apply datagrams until `shutdown` fires or disconnects.
    ///
    /// Malformed datagrams and hardware rejections are logged and skipped;
    /// only socket setup failures end the loop with an error.
    pub fn run<D: Device>(self, controller: &mut RadioController<D>, shutdown: &Receiver<()>) -> Result {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let (tx, datagrams) = bounded(QUEUE_DEPTH);
        let reader = self.spawn_reader(tx, stop_signal.clone())?;

        loop {
            select! {
                recv(datagrams) -> msg => match msg {
                    Ok((datagram, from)) => {
                        debug!("{} bytes from {}", datagram.len(), from);
                        // Failures are already logged by dispatch
                        let _ = dispatch(controller, &datagram);
                    }
                    Err(_) => {
                        error!("Control socket reader exited");
                        break;
                    }
                },
                recv(shutdown) -> _ => {
                    info!("Shutdown requested, control listener exiting");
                    break;
                }
            }
        }

        stop_signal.store(true, Ordering::Relaxed);
        drop(datagrams);
        if reader.join().is_err() {
            error!("Control socket reader panicked");
        }
        Ok(())
    }

    fn spawn_reader(&self, tx: Sender<Datagram>, stop_signal: Arc<AtomicBool>) -> io::Result<JoinHandle<()>> {
        let socket = self.socket.try_clone()?;
        socket.set_read_timeout(Some(READER_POLL))?;

        thread::Builder::new().name("control-rx".to_string()).spawn(move || {
            let mut buf = vec![0u8; MAX_DATAGRAM];
            while !stop_signal.load(Ordering::Relaxed) {
                match socket.recv_from(&mut buf) {
                    Ok((len, from)) => {
                        if tx.send((buf[..len].to_vec(), from)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        if let Some(delay) = retry_delay(&e) {
                            warn!("Control socket receive failed: {}", e);
                            thread::sleep(delay);
                        }
                    }
                }
            }
            debug!("Control socket reader stopped");
        })
    }
}

/// Pause before the next receive after `e`; `None` when the read merely
/// timed out
fn retry_delay(e: &io::Error) -> Option<Duration> {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => None,
        _ => Some(READER_POLL),
    }
}

/// Decode one datagram and apply it to the radio.
///
/// Returns the command that was applied. Malformed input never reaches the
/// hardware.
pub fn dispatch<D: Device>(controller: &mut RadioController<D>, datagram: &[u8]) -> Result<Command> {
    let command = match decode(datagram) {
        Ok(command) => command,
        Err(e) => {
            warn!("Dropping datagram: {}", e);
            return Err(e.into());
        }
    };

    debug!("Applying {}", command);
    controller.apply(&command).map_err(RepeaterError::from)?;
    Ok(command)
}
