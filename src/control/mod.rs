// Control module for the ball-centering loop
//
// Provides:
// - Per-axis PID with anti-windup, output clamp and slew limiting
// - Priority arbitration between the x and y axes
// - The loop context bundling both axis states with the tuning

mod arbiter;
pub mod axis;

pub use arbiter::arbitrate;
pub use axis::AxisState;

use crate::config::ControllerConfig;
use crate::messages::{DriveCommand, Sample};

/// State owned by the control loop: tuning plus the history of both axes
#[derive(Debug, Clone, Default)]
pub struct ControlContext {
    pub config: ControllerConfig,
    pub x: AxisState,
    pub y: AxisState,
}

impl ControlContext {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            x: AxisState::default(),
            y: AxisState::default(),
        }
    }

    /// Feed one sample through both axis controllers and pick the winning axis.
    /// Both axes are updated every cycle even though at most one drives.
    pub fn update(&mut self, sample: Sample, dt: f32) -> DriveCommand {
        let pid = &self.config.pid;
        let output_x = self.x.update(sample.error_x as f32, dt, pid);
        let output_y = self.y.update(sample.error_y as f32, dt, pid);
        arbitrate(sample, output_x, output_y, self.config.error_threshold)
    }
}
