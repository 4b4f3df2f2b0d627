use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Mutex;

use swarm_config::BUFFER_SIZE;
use swarm_core::helpers::create_buffer;

use crate::LOGGER;

/// The one persistent stream to the coordinator. The mutex keeps commands
/// from interleaving on the wire; a broken stream is dropped and re-dialled
/// before the next command, and nothing is ever replayed.
pub struct TrackerLink {
    addr: SocketAddr,
    stream: Mutex<Option<TcpStream>>,
}

impl TrackerLink {
    pub fn new(addr: SocketAddr) -> Self {
        TrackerLink {
            addr,
            stream: Mutex::new(None),
        }
    }

    /// Send one command line and wait for its single response.
    pub fn send(&self, message: &str) -> io::Result<String> {
        let mut guard = self.stream.lock().unwrap();
        if guard.is_none() {
            *guard = Some(self.dial()?);
        }
        let framed = format!("{}\n", message);

        if guard.as_mut().unwrap().write_all(framed.as_bytes()).is_err() {
            // Stale connection. Re-dial once and resend; the command was
            // never seen on the other side.
            LOGGER.debug("tracker link: send failed, re-dialling");
            *guard = Some(self.dial()?);
            guard.as_mut().unwrap().write_all(framed.as_bytes())?;
        }

        let mut buf = create_buffer(BUFFER_SIZE);
        match guard.as_mut().unwrap().read(&mut buf) {
            Ok(0) => {
                *guard = None;
                Err(io::Error::new(
                    io::ErrorKind::ConnectionAborted,
                    "tracker closed the stream",
                ))
            }
            Ok(size) => Ok(String::from_utf8_lossy(&buf[..size]).into_owned()),
            Err(e) => {
                *guard = None;
                Err(e)
            }
        }
    }

    fn dial(&self) -> io::Result<TcpStream> {
        let stream = TcpStream::connect(self.addr)?;
        LOGGER.info(format!("connected to tracker {}", self.addr));
        Ok(stream)
    }
}
