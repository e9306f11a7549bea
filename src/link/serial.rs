// Serial port transport for the sensor link
//
// The camera host writes one byte at a time and waits for the acknowledgement
// before sending the next, so reads are single bytes with a per-call timeout.

use serialport::{self, ClearBuffer, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::{debug, info};

use super::{Link, LinkError, Result};
use crate::config::RECEIVE_TIMEOUT_MS;

pub struct SerialLink {
    port: Box<dyn SerialPort>,
    timeout: Duration,
}

impl SerialLink {
    /// Open the sensor link; `baudrate` is normally LINK_BAUDRATE
    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        info!("Opening sensor link on {} at {} baud", port_name, baudrate);
        let timeout = Duration::from_millis(RECEIVE_TIMEOUT_MS);
        let port = serialport::new(port_name, baudrate).timeout(timeout).open()?;

        // Stale bytes from before startup would misalign the first frame
        port.clear(ClearBuffer::Input)?;

        Ok(Self { port, timeout })
    }
}

impl Link for SerialLink {
    fn recv_byte(&mut self, timeout: Duration) -> Result<Option<u8>> {
        if timeout != self.timeout {
            self.port.set_timeout(timeout)?;
            self.timeout = timeout;
        }

        let mut byte = [0u8; 1];
        match self.port.read_exact(&mut byte) {
            Ok(()) => Ok(Some(byte[0])),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
            Err(e) => Err(LinkError::Io(e)),
        }
    }

    fn send_ack(&mut self, code: u8) -> Result<()> {
        self.port.write_all(&[code])?;
        self.port.flush()?;
        Ok(())
    }

    fn resync(&mut self) -> Result<()> {
        let pending = self.port.bytes_to_read()?;
        if pending > 0 {
            debug!("Discarding {} buffered bytes", pending);
        }
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
