// Sensor link for the ball tracker
//
// Provides:
// - The byte transport trait with a bounded receive wait
// - The two-byte frame state machine with 0xAA / 0xBB acknowledgements
// - A serial port transport and an in-memory scripted transport

mod receiver;
pub mod scripted;
pub mod serial;

pub use receiver::{FrameOutcome, FrameReceiver, FrameState};
pub use scripted::ScriptedLink;
pub use serial::SerialLink;

use std::time::Duration;

/// Error types for the sensor link. A receive timeout is not an error.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Byte transport between the camera host and the controller
pub trait Link {
    /// Wait up to `timeout` for the next byte. `Ok(None)` means the wait expired.
    fn recv_byte(&mut self, timeout: Duration) -> Result<Option<u8>>;

    /// Send an acknowledgement code back to the peer
    fn send_ack(&mut self, code: u8) -> Result<()>;

    /// Drop anything buffered so the next byte read starts a fresh frame
    fn resync(&mut self) -> Result<()> {
        Ok(())
    }
}
