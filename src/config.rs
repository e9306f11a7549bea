// Timeouts, topics, controller tuning
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// PID gains (applied identically to both axes)
pub const KP: f32 = 0.015;
pub const KI: f32 = 0.001;
pub const KD: f32 = 0.005;

// Control period in seconds, also the actuator refresh period
pub const DT: f32 = 0.001;

// Clamps and slew limit
pub const INTEGRAL_LIMIT: f32 = 10.0;
pub const OUTPUT_LIMIT: f32 = 1.0;
pub const MAX_STEP: f32 = 0.05; // max output change per cycle

// |error| above this selects an axis in the arbiter
pub const ERROR_THRESHOLD: u8 = 30;

// Sensor link
pub const LINK_BAUDRATE: u32 = 115_200;
pub const LINK_PORT: &str = "/dev/ttyACM0";
pub const ACK_FIRST: u8 = 0xAA;
pub const ACK_SECOND: u8 = 0xBB;

// Bounded wait per byte, and watchdog
pub const RECEIVE_TIMEOUT_MS: u64 = 10;
pub const WATCHDOG_CYCLES: u32 = 25; // 25 missed 10ms waits ~ 250ms

// Limits for measured dt
pub const MIN_DT: f32 = 0.0001;
pub const MAX_DT: f32 = 0.1;

// Zenoh topics
pub const TOPIC_RT_DRIVE: &str = "tracker/rt/drive"; // per-cycle report
pub const TOPIC_HEALTH: &str = "tracker/state/health"; // health status

// Publish one report every N cycles, plus one on each drive pattern change
pub const TELEMETRY_EVERY: u64 = 20;
pub const TELEMETRY_QUEUE: usize = 64;

/// Errors raised while loading a controller configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Duty pattern written when the robot is told to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// All six channels at 0.0, motors coast
    #[default]
    Coast,
    /// All six channels at 1.0, H-bridge shorts the motor
    Brake,
}

impl StopMode {
    pub fn duty(self) -> f32 {
        match self {
            StopMode::Coast => 0.0,
            StopMode::Brake => 1.0,
        }
    }
}

/// Per-axis PID tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub integral_limit: f32,
    pub output_limit: f32,
    pub max_step: f32,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self {
            kp: KP,
            ki: KI,
            kd: KD,
            integral_limit: INTEGRAL_LIMIT,
            output_limit: OUTPUT_LIMIT,
            max_step: MAX_STEP,
        }
    }
}

/// Everything the control loop needs to know, loadable from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub pid: PidConfig,
    pub dt: f32,
    pub measured_dt: bool,
    pub error_threshold: u8,
    pub stop_mode: StopMode,
    pub validate_samples: bool,
    pub receive_timeout_ms: u64,
    pub watchdog_cycles: u32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            pid: PidConfig::default(),
            dt: DT,
            measured_dt: false,
            error_threshold: ERROR_THRESHOLD,
            stop_mode: StopMode::Coast,
            validate_samples: true,
            receive_timeout_ms: RECEIVE_TIMEOUT_MS,
            watchdog_cycles: WATCHDOG_CYCLES,
        }
    }
}

impl ControllerConfig {
    /// Read and validate a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let pid = &self.pid;
        for (field, gain) in [("pid.kp", pid.kp), ("pid.ki", pid.ki), ("pid.kd", pid.kd)] {
            if !(gain.is_finite() && gain >= 0.0) {
                return Err(invalid(field, format!("gain must be >= 0, got {}", gain)));
            }
        }
        for (field, value) in [
            ("pid.integral_limit", pid.integral_limit),
            ("pid.output_limit", pid.output_limit),
            ("pid.max_step", pid.max_step),
            ("dt", self.dt),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("must be > 0, got {}", value)));
            }
        }
        if self.dt > MAX_DT {
            return Err(invalid(
                "dt",
                format!("period cannot exceed {}s, got {}", MAX_DT, self.dt),
            ));
        }
        if pid.output_limit > 1.0 {
            return Err(invalid(
                "pid.output_limit",
                format!("duty cannot exceed 1.0, got {}", pid.output_limit),
            ));
        }
        if self.receive_timeout_ms == 0 {
            return Err(invalid("receive_timeout_ms", "must be at least 1".to_string()));
        }
        if self.watchdog_cycles == 0 {
            return Err(invalid("watchdog_cycles", "must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f32(self.dt)
    }
}

fn invalid(field: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
