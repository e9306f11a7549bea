// In-memory link that replays a scripted byte stream
//
// Each scripted entry is either a byte or a silent wait (a timeout). Once the
// script runs out every receive times out. Acknowledgements are recorded.

use std::collections::VecDeque;
use std::time::Duration;

use super::{Link, Result};

#[derive(Debug, Default)]
pub struct ScriptedLink {
    incoming: VecDeque<Option<u8>>,
    acks: Vec<u8>,
    resyncs: usize,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a whole frame
    pub fn push_frame(&mut self, error_x: i8, error_y: i8) {
        self.push_byte(error_x as u8);
        self.push_byte(error_y as u8);
    }

    pub fn push_byte(&mut self, byte: u8) {
        self.incoming.push_back(Some(byte));
    }

    /// Queue one receive that times out
    pub fn push_silence(&mut self) {
        self.incoming.push_back(None);
    }

    pub fn acks(&self) -> &[u8] {
        &self.acks
    }

    pub fn resyncs(&self) -> usize {
        self.resyncs
    }

    pub fn pending(&self) -> usize {
        self.incoming.len()
    }
}

impl Link for ScriptedLink {
    fn recv_byte(&mut self, _timeout: Duration) -> Result<Option<u8>> {
        Ok(self.incoming.pop_front().flatten())
    }

    fn send_ack(&mut self, code: u8) -> Result<()> {
        self.acks.push(code);
        Ok(())
    }

    fn resync(&mut self) -> Result<()> {
        self.resyncs += 1;
        Ok(())
    }
}
