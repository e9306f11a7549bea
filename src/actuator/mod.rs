// Actuator side of the control loop
//
// Provides:
// - Drive command -> six-channel duty mapping for the three-wheel base
// - The duty-cycle port the hardware adapter implements
// - A simulated port that keeps the last applied frame

mod mapper;
pub mod simulated;

pub use simulated::SimulatedActuator;

use crate::messages::ActuatorFrame;

/// One PWM output: a wheel and a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    LeftForward,
    LeftReverse,
    RightForward,
    RightReverse,
    BackForward,
    BackReverse,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::LeftForward,
        Channel::LeftReverse,
        Channel::RightForward,
        Channel::RightReverse,
        Channel::BackForward,
        Channel::BackReverse,
    ];
}

/// Duty-cycle outputs driven by the control loop. Writes cannot fail from the
/// loop's point of view; an adapter deals with its own hardware errors.
pub trait ActuatorPort {
    /// Set one channel's duty, `value` in [0, 1]
    fn set_duty(&mut self, channel: Channel, value: f32);

    /// Write all six channels of a frame
    fn apply(&mut self, frame: &ActuatorFrame) {
        for (channel, value) in frame.channels() {
            self.set_duty(channel, value);
        }
    }
}

impl<A: ActuatorPort + ?Sized> ActuatorPort for &mut A {
    fn set_duty(&mut self, channel: Channel, value: f32) {
        (**self).set_duty(channel, value);
    }

    fn apply(&mut self, frame: &ActuatorFrame) {
        (**self).apply(frame);
    }
}
