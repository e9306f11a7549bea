// Single-axis PID controller
//
// The setpoint is always zero: the sample component is the error itself.
// Output is clamped to +/- output_limit and then rate limited so it moves by
// at most max_step per cycle.

use crate::config::PidConfig;

/// History carried by one axis from cycle to cycle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisState {
    pub previous_error: f32,
    pub integral: f32,        // kept in [-integral_limit, integral_limit]
    pub previous_output: f32, // last slew-limited output
}

impl AxisState {
    /// Run one PID step and return the slew-limited output
    pub fn update(&mut self, error: f32, dt: f32, pid: &PidConfig) -> f32 {
        // Anti-windup: clamp the accumulator itself, not just its contribution
        self.integral =
            (self.integral + error * dt).clamp(-pid.integral_limit, pid.integral_limit);

        let derivative = (error - self.previous_error) / dt;

        let raw = pid.kp * error + pid.ki * self.integral + pid.kd * derivative;
        let clamped = raw.clamp(-pid.output_limit, pid.output_limit);
        let output = slew(clamped, self.previous_output, pid.max_step);

        self.previous_error = error;
        self.previous_output = output;
        output
    }
}

/// Move from `previous` toward `target` by no more than `max_step`
fn slew(target: f32, previous: f32, max_step: f32) -> f32 {
    let delta = target - previous;
    if delta.abs() > max_step {
        previous + max_step.copysign(delta)
    } else {
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 0.001;

    #[test]
    fn test_zero_error_stays_zero() {
        let pid = PidConfig::default();
        let mut state = AxisState::default();
        for _ in 0..100 {
            assert_eq!(state.update(0.0, DT, &pid), 0.0);
        }
        assert_eq!(state, AxisState::default());
    }

    #[test]
    fn test_first_step_is_slew_limited() {
        // Derivative kick on the first sample saturates the raw output,
        // but only one max_step reaches the actuator
        let pid = PidConfig::default();
        let mut state = AxisState::default();
        let out = state.update(50.0, DT, &pid);
        assert!((out - pid.max_step).abs() < 1e-6);
        assert_eq!(state.previous_output, out);
        assert_eq!(state.previous_error, 50.0);
    }

    #[test]
    fn test_output_clamp_for_all_errors() {
        // Zero prior state, every legal error value
        let pid = PidConfig {
            max_step: 10.0, // disable slew so the clamp is observable
            ..PidConfig::default()
        };
        for e in -127..=127 {
            let mut state = AxisState::default();
            let out = state.update(e as f32, DT, &pid);
            assert!(out.abs() <= 1.0, "error {} gave output {}", e, out);
        }
    }

    #[test]
    fn test_slew_invariant_under_jumps() {
        let pid = PidConfig::default();
        let mut state = AxisState::default();
        let errors = [127.0, -127.0, 0.0, 90.0, -5.0, 127.0, 127.0, -127.0];
        let mut previous = 0.0;
        for _ in 0..20 {
            for &e in &errors {
                let out = state.update(e, DT, &pid);
                assert!(
                    (out - previous).abs() <= pid.max_step + 1e-6,
                    "step {} -> {} exceeds max_step",
                    previous,
                    out
                );
                previous = out;
            }
        }
    }

    #[test]
    fn test_integral_windup_bounded() {
        let pid = PidConfig::default();
        let mut state = AxisState::default();
        for _ in 0..20_000 {
            state.update(127.0, DT, &pid);
            assert!(state.integral <= pid.integral_limit);
        }
        assert_eq!(state.integral, pid.integral_limit);

        for _ in 0..20_000 {
            state.update(-127.0, DT, &pid);
            assert!(state.integral >= -pid.integral_limit);
        }
        assert_eq!(state.integral, -pid.integral_limit);
    }

    #[test]
    fn test_steady_error_converges_to_proportional() {
        let pid = PidConfig::default();
        let mut state = AxisState::default();
        let mut out = 0.0;
        for _ in 0..50 {
            out = state.update(50.0, DT, &pid);
        }
        // Kp*50 = 0.75 plus a tiny integral contribution
        assert!((out - 0.75).abs() < 0.01, "output {}", out);
    }

    #[test]
    fn test_slew_helper() {
        assert_eq!(slew(0.5, 0.0, 0.05), 0.05);
        assert_eq!(slew(-0.5, 0.0, 0.05), -0.05);
        assert_eq!(slew(0.03, 0.0, 0.05), 0.03);
    }
}
