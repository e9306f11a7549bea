// Drive command -> wheel duty pattern for the three-wheel omni base
//
// Each wheel has a forward and a reverse PWM input on its H-bridge.
//
//   command      left f/r   right f/r   back f/r
//   Straight(s)   0 / s      s / 0       0 / 0
//   Back(s)       s / 0      0 / s       0 / 0
//   Left(s)       s / 0      s / 0       s / 0
//   Right(s)      0 / s      0 / s       0 / s
//
// Straight/Back leave the back wheel idle; Left/Right spin all three wheels
// the same way, which rotates the chassis in place.

use super::Channel;
use crate::config::StopMode;
use crate::messages::{ActuatorFrame, DriveCommand};

impl ActuatorFrame {
    /// Map a drive command onto the six channels. `stop` picks the Stop pattern.
    pub fn from_command(command: DriveCommand, stop: StopMode) -> Self {
        let zero = Self::uniform(0.0);
        match command {
            DriveCommand::Stop => Self::stop(stop),
            DriveCommand::Straight(s) => Self {
                left_reverse: s,
                right_forward: s,
                ..zero
            },
            DriveCommand::Back(s) => Self {
                left_forward: s,
                right_reverse: s,
                ..zero
            },
            DriveCommand::Left(s) => Self {
                left_forward: s,
                right_forward: s,
                back_forward: s,
                ..zero
            },
            DriveCommand::Right(s) => Self {
                left_reverse: s,
                right_reverse: s,
                back_reverse: s,
                ..zero
            },
        }
    }

    pub fn duty(&self, channel: Channel) -> f32 {
        match channel {
            Channel::LeftForward => self.left_forward,
            Channel::LeftReverse => self.left_reverse,
            Channel::RightForward => self.right_forward,
            Channel::RightReverse => self.right_reverse,
            Channel::BackForward => self.back_forward,
            Channel::BackReverse => self.back_reverse,
        }
    }

    pub fn set(&mut self, channel: Channel, value: f32) {
        let slot = match channel {
            Channel::LeftForward => &mut self.left_forward,
            Channel::LeftReverse => &mut self.left_reverse,
            Channel::RightForward => &mut self.right_forward,
            Channel::RightReverse => &mut self.right_reverse,
            Channel::BackForward => &mut self.back_forward,
            Channel::BackReverse => &mut self.back_reverse,
        };
        *slot = value;
    }

    /// (channel, duty) pairs in hardware order
    pub fn channels(&self) -> impl Iterator<Item = (Channel, f32)> + '_ {
        Channel::ALL.into_iter().map(|ch| (ch, self.duty(ch)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(cmd: DriveCommand) -> [f32; 6] {
        let f = ActuatorFrame::from_command(cmd, StopMode::Coast);
        [
            f.left_forward,
            f.left_reverse,
            f.right_forward,
            f.right_reverse,
            f.back_forward,
            f.back_reverse,
        ]
    }

    #[test]
    fn test_stop_coast_is_all_zero() {
        assert_eq!(frame(DriveCommand::Stop), [0.0; 6]);
    }

    #[test]
    fn test_stop_brake_is_all_one() {
        let f = ActuatorFrame::from_command(DriveCommand::Stop, StopMode::Brake);
        assert!(f.channels().all(|(_, duty)| duty == 1.0));
    }

    #[test]
    fn test_motion_table() {
        let s = 0.4;
        assert_eq!(frame(DriveCommand::Straight(s)), [0.0, s, s, 0.0, 0.0, 0.0]);
        assert_eq!(frame(DriveCommand::Back(s)), [s, 0.0, 0.0, s, 0.0, 0.0]);
        assert_eq!(frame(DriveCommand::Left(s)), [s, 0.0, s, 0.0, s, 0.0]);
        assert_eq!(frame(DriveCommand::Right(s)), [0.0, s, 0.0, s, 0.0, s]);
    }

    #[test]
    fn test_brake_mode_only_affects_stop() {
        let f = ActuatorFrame::from_command(DriveCommand::Left(0.2), StopMode::Brake);
        assert_eq!(f.left_reverse, 0.0);
        assert_eq!(f.left_forward, 0.2);
    }

    #[test]
    fn test_no_wheel_driven_both_ways() {
        for cmd in [
            DriveCommand::Straight(1.0),
            DriveCommand::Back(1.0),
            DriveCommand::Left(1.0),
            DriveCommand::Right(1.0),
        ] {
            let f = ActuatorFrame::from_command(cmd, StopMode::Coast);
            assert!(f.left_forward == 0.0 || f.left_reverse == 0.0);
            assert!(f.right_forward == 0.0 || f.right_reverse == 0.0);
            assert!(f.back_forward == 0.0 || f.back_reverse == 0.0);
        }
    }

    #[test]
    fn test_set_and_duty_agree() {
        let mut f = ActuatorFrame::default();
        for (i, ch) in Channel::ALL.into_iter().enumerate() {
            f.set(ch, i as f32 / 10.0);
        }
        let duties: Vec<f32> = f.channels().map(|(_, d)| d).collect();
        assert_eq!(duties, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]);
    }
}
