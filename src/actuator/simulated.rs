// Simulated actuator: latches duties like a PWM peripheral would

use tracing::debug;

use super::{ActuatorPort, Channel};
use crate::messages::ActuatorFrame;

#[derive(Debug, Default)]
pub struct SimulatedActuator {
    frame: ActuatorFrame,
    writes: u64,
}

impl SimulatedActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Duties currently latched on the six channels
    pub fn frame(&self) -> ActuatorFrame {
        self.frame
    }

    /// Number of individual channel writes so far
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl ActuatorPort for SimulatedActuator {
    fn set_duty(&mut self, channel: Channel, value: f32) {
        self.frame.set(channel, value.clamp(0.0, 1.0));
        self.writes += 1;
    }

    fn apply(&mut self, frame: &ActuatorFrame) {
        debug!(
            "Duties: left={:.3}/{:.3}, right={:.3}/{:.3}, back={:.3}/{:.3}",
            frame.left_forward,
            frame.left_reverse,
            frame.right_forward,
            frame.right_reverse,
            frame.back_forward,
            frame.back_reverse
        );
        for (channel, value) in frame.channels() {
            self.set_duty(channel, value);
        }
    }
}
