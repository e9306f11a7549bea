// Define message types for the control loop

use serde::{Deserialize, Serialize};

use crate::config::StopMode;

// One decoded frame from the sensor link: ball offset from image center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub error_x: i8,
    pub error_y: i8,
}

impl Sample {
    pub fn new(error_x: i8, error_y: i8) -> Self {
        Self { error_x, error_y }
    }

    /// Decode the two raw link bytes as signed values
    pub fn from_bytes(bytes: [u8; 2]) -> Self {
        Self {
            error_x: bytes[0] as i8,
            error_y: bytes[1] as i8,
        }
    }

    /// Both components lie in [-127, 127]. The sender clamps its offsets, so
    /// a 0x80 byte (-128) can only come from a corrupted or misaligned frame.
    pub fn is_valid(&self) -> bool {
        self.error_x != i8::MIN && self.error_y != i8::MIN
    }
}

/// Chassis motion pattern chosen by the arbiter; speed is in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "speed", rename_all = "snake_case")]
pub enum DriveCommand {
    #[default]
    Stop,
    Straight(f32),
    Back(f32),
    Left(f32),
    Right(f32),
}

impl DriveCommand {
    pub fn speed(&self) -> f32 {
        match *self {
            DriveCommand::Stop => 0.0,
            DriveCommand::Straight(s)
            | DriveCommand::Back(s)
            | DriveCommand::Left(s)
            | DriveCommand::Right(s) => s,
        }
    }
}

// Duty cycles for the three wheel H-bridges, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ActuatorFrame {
    pub left_forward: f32,
    pub left_reverse: f32,
    pub right_forward: f32,
    pub right_reverse: f32,
    pub back_forward: f32,
    pub back_reverse: f32,
}

impl ActuatorFrame {
    /// Every channel at the same duty
    pub fn uniform(duty: f32) -> Self {
        Self {
            left_forward: duty,
            left_reverse: duty,
            right_forward: duty,
            right_reverse: duty,
            back_forward: duty,
            back_reverse: duty,
        }
    }

    pub fn stop(mode: StopMode) -> Self {
        Self::uniform(mode.duty())
    }
}

/// Health status of the sensor link, as seen by the watchdog
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    #[default]
    LinkStale,
}

/// Snapshot of one control cycle, published as telemetry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub sample: Option<Sample>,
    pub output_x: f32,
    pub output_y: f32,
    pub command: DriveCommand,
    pub frame: ActuatorFrame,
    pub health: RuntimeHealth,
}
