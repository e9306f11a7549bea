// Frame state machine for the two-byte sensor protocol
//
// Frame: [error_x, error_y], both signed bytes, no header or checksum.
// The receiver answers 0xAA after byte one and 0xBB after byte two. A lost
// byte would misalign every later frame, so a timeout while waiting for
// byte two abandons the frame and starts over at byte one.

use std::time::Duration;
use tracing::debug;

use super::{Link, Result};
use crate::config::{ACK_FIRST, ACK_SECOND};
use crate::messages::Sample;

/// Where the receiver is within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    AwaitFirst,
    AwaitSecond { first: u8 },
}

/// Result of one receive attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A complete, acknowledged frame
    Frame(Sample),
    /// No byte one arrived within the timeout
    Idle,
    /// Byte one arrived but byte two did not; the frame was dropped
    Desync { first: u8 },
}

pub struct FrameReceiver<L> {
    link: L,
    timeout: Duration,
    state: FrameState,
}

impl<L: Link> FrameReceiver<L> {
    pub fn new(link: L, timeout: Duration) -> Self {
        Self {
            link,
            timeout,
            state: FrameState::AwaitFirst,
        }
    }

    /// Pull one frame from the link, waiting at most `timeout` per byte
    pub fn receive(&mut self) -> Result<FrameOutcome> {
        let first = match self.state {
            FrameState::AwaitSecond { first } => first,
            FrameState::AwaitFirst => {
                let Some(first) = self.link.recv_byte(self.timeout)? else {
                    return Ok(FrameOutcome::Idle);
                };
                self.link.send_ack(ACK_FIRST)?;
                self.state = FrameState::AwaitSecond { first };
                first
            }
        };

        match self.link.recv_byte(self.timeout)? {
            Some(second) => {
                self.link.send_ack(ACK_SECOND)?;
                self.state = FrameState::AwaitFirst;
                Ok(FrameOutcome::Frame(Sample::from_bytes([first, second])))
            }
            None => {
                debug!("Byte two timed out after 0x{:02X}, resyncing", first);
                self.state = FrameState::AwaitFirst;
                self.link.resync()?;
                Ok(FrameOutcome::Desync { first })
            }
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }
}
