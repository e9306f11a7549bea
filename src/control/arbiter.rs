// Axis priority arbitration
//
// The chassis cannot rotate (x) and translate (y) at the same time with this
// wheel pattern, so only one axis drives per cycle. x wins over y.

use crate::messages::{DriveCommand, Sample};

/// Pick the drive command for this cycle from the raw errors and PID outputs
pub fn arbitrate(sample: Sample, output_x: f32, output_y: f32, threshold: u8) -> DriveCommand {
    if sample.error_x.unsigned_abs() > threshold {
        if output_x < 0.0 {
            DriveCommand::Left(-output_x)
        } else {
            DriveCommand::Right(output_x)
        }
    } else if sample.error_y.unsigned_abs() > threshold {
        if output_y > 0.0 {
            DriveCommand::Back(output_y)
        } else {
            DriveCommand::Straight(-output_y)
        }
    } else {
        DriveCommand::Stop
    }
}
