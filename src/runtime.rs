// Fixed-period control loop with receive timeout and watchdog
// Note: the loop only ever blocks inside the link receive, and that wait is
// bounded, so a silent camera host can never freeze the last drive command on
// the wheels. Missed cycles feed a watchdog that forces Stop.

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::actuator::{ActuatorPort, SimulatedActuator};
use crate::config::{
    ControllerConfig, MAX_DT, MIN_DT, TELEMETRY_EVERY, TELEMETRY_QUEUE, TOPIC_HEALTH,
    TOPIC_RT_DRIVE,
};
use crate::control::ControlContext;
use crate::link::{FrameOutcome, FrameReceiver, Link, LinkError, SerialLink};
use crate::messages::{ActuatorFrame, CycleReport, DriveCommand, RuntimeHealth, Sample};

/// What happened during one control cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Valid frame, both axes updated, command applied
    Driven { sample: Sample, command: DriveCommand },
    /// Frame failed the range check; Stop applied, axis history untouched
    Rejected(Sample),
    /// Byte two never came; Stop applied, framing restarted
    Desynced,
    /// No frame started within the timeout
    Idle,
}

/// Counts consecutive cycles without a valid frame
#[derive(Debug)]
struct Watchdog {
    limit: u32,
    missed: u32,
    health: RuntimeHealth,
}

impl Watchdog {
    fn new(limit: u32) -> Self {
        Self {
            limit,
            missed: 0,
            health: RuntimeHealth::LinkStale, // Start stale until first frame
        }
    }

    fn feed(&mut self) {
        if self.health != RuntimeHealth::Ok {
            info!("Sensor link healthy, driving");
        }
        self.missed = 0;
        self.health = RuntimeHealth::Ok;
    }

    /// Record a missed cycle, returns true while the link is stale
    fn miss(&mut self) -> bool {
        self.missed = self.missed.saturating_add(1);
        if self.missed >= self.limit {
            if self.health != RuntimeHealth::LinkStale {
                warn!("No valid frame for {} cycles, stopping robot", self.missed);
            }
            self.health = RuntimeHealth::LinkStale;
        }
        self.health == RuntimeHealth::LinkStale
    }
}

pub struct ControlLoop<L: Link, A: ActuatorPort> {
    receiver: FrameReceiver<L>,
    actuator: A,
    context: ControlContext,
    watchdog: Watchdog,
    command: DriveCommand,
    frame: ActuatorFrame,
    last_update: Option<Instant>,
    cycle: u64,
    reports: Option<mpsc::Sender<CycleReport>>,
}

impl<L: Link, A: ActuatorPort> ControlLoop<L, A> {
    pub fn new(link: L, actuator: A, config: ControllerConfig) -> Self {
        let receiver = FrameReceiver::new(link, config.receive_timeout());
        let watchdog = Watchdog::new(config.watchdog_cycles);
        let frame = ActuatorFrame::stop(config.stop_mode);
        Self {
            receiver,
            actuator,
            context: ControlContext::new(config),
            watchdog,
            command: DriveCommand::Stop,
            frame,
            last_update: None,
            cycle: 0,
            reports: None,
        }
    }

    /// Hand a report to `reports` every few cycles and on command changes, without blocking
    pub fn with_reports(mut self, reports: mpsc::Sender<CycleReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    /// Run one cycle: receive, validate, update both axes, arbitrate, apply
    pub fn step(&mut self) -> Result<CycleOutcome, LinkError> {
        self.cycle += 1;
        let previous = std::mem::discriminant(&self.command);

        let outcome = match self.receiver.receive()? {
            FrameOutcome::Frame(sample) => self.on_sample(sample),
            FrameOutcome::Desync { first } => {
                warn!(
                    "Sensor link desync: no second byte after 0x{:02X}, stopping",
                    first
                );
                self.watchdog.miss();
                self.drive(DriveCommand::Stop);
                CycleOutcome::Desynced
            }
            FrameOutcome::Idle => {
                // Last command stays latched until the watchdog trips
                if self.watchdog.miss() {
                    self.drive(DriveCommand::Stop);
                }
                CycleOutcome::Idle
            }
        };

        // Periodic snapshot, plus one whenever the motion pattern changes
        let changed = std::mem::discriminant(&self.command) != previous;
        if changed || self.cycle % TELEMETRY_EVERY == 0 {
            self.report(&outcome);
        }
        Ok(outcome)
    }

    /// Step until `shutdown` is set, padding each cycle to the nominal period
    pub fn run_until(&mut self, shutdown: &AtomicBool) -> Result<(), LinkError> {
        let period = self.context.config.period();
        while !shutdown.load(Ordering::Relaxed) {
            let started = Instant::now();
            self.step()?;
            if let Some(rest) = period.checked_sub(started.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        Ok(())
    }

    fn on_sample(&mut self, sample: Sample) -> CycleOutcome {
        debug!("{}, {}", sample.error_x, sample.error_y);

        if self.context.config.validate_samples && !sample.is_valid() {
            warn!(
                "Invalid data received: ({}, {}), stopping",
                sample.error_x, sample.error_y
            );
            self.watchdog.miss();
            self.drive(DriveCommand::Stop);
            return CycleOutcome::Rejected(sample);
        }

        let dt = self.cycle_dt();
        let command = self.context.update(sample, dt);
        self.watchdog.feed();
        self.drive(command);
        CycleOutcome::Driven { sample, command }
    }

    /// Fixed dt, or wall time since the previous update when measured
    fn cycle_dt(&mut self) -> f32 {
        let now = Instant::now();
        let dt = match self.last_update {
            Some(previous) if self.context.config.measured_dt => now
                .duration_since(previous)
                .as_secs_f32()
                .clamp(MIN_DT, MAX_DT),
            _ => self.context.config.dt,
        };
        self.last_update = Some(now);
        dt
    }

    fn drive(&mut self, command: DriveCommand) {
        self.command = command;
        self.frame = ActuatorFrame::from_command(command, self.context.config.stop_mode);
        self.actuator.apply(&self.frame);
    }

    fn report(&mut self, outcome: &CycleOutcome) {
        let Some(reports) = &self.reports else {
            return;
        };
        let sample = match *outcome {
            CycleOutcome::Driven { sample, .. } | CycleOutcome::Rejected(sample) => Some(sample),
            CycleOutcome::Desynced | CycleOutcome::Idle => None,
        };
        let report = CycleReport {
            cycle: self.cycle,
            sample,
            output_x: self.context.x.previous_output,
            output_y: self.context.y.previous_output,
            command: self.command,
            frame: self.frame,
            health: self.watchdog.health,
        };
        match reports.try_send(report) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => debug!("Telemetry queue full, dropping report"),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Telemetry publisher gone, no more reports");
                self.reports = None;
            }
        }
    }

    pub fn context(&self) -> &ControlContext {
        &self.context
    }

    pub fn health(&self) -> RuntimeHealth {
        self.watchdog.health
    }

    /// Command applied most recently
    pub fn command(&self) -> DriveCommand {
        self.command
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn link(&self) -> &L {
        self.receiver.link()
    }

    pub fn link_mut(&mut self) -> &mut L {
        self.receiver.link_mut()
    }
}

impl<L: Link, A: ActuatorPort> Drop for ControlLoop<L, A> {
    fn drop(&mut self) {
        // Leave the wheels stopped however the loop ends
        info!("Stopping all motors");
        let stop = ActuatorFrame::stop(self.context.config.stop_mode);
        self.actuator.apply(&stop);
    }
}

/// Runtime settings gathered from the command line and config file
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub port: String,
    pub baudrate: u32,
    pub telemetry: bool,
    pub controller: ControllerConfig,
}

pub async fn run(options: RuntimeOptions) -> Result<(), Box<dyn Error + Send + Sync>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
            signal.store(true, Ordering::Relaxed);
        }
    });

    let link = SerialLink::open_with_baudrate(&options.port, options.baudrate)?;
    let controller = options.controller;
    let mut control = ControlLoop::new(link, SimulatedActuator::new(), controller.clone());

    if options.telemetry {
        let (tx, rx) = mpsc::channel(TELEMETRY_QUEUE);
        tokio::spawn(async move {
            if let Err(e) = publish_telemetry(rx).await {
                warn!("Telemetry stopped: {}", e);
            }
        });
        control = control.with_reports(tx);
    }

    info!(
        "Runtime started: {}ms period, {}ms receive timeout, watchdog after {} missed cycles",
        controller.dt * 1000.0,
        controller.receive_timeout_ms,
        controller.watchdog_cycles
    );
    info!(
        "Gains: kp={}, ki={}, kd={}, stop mode {:?}",
        controller.pid.kp, controller.pid.ki, controller.pid.kd, controller.stop_mode
    );

    // The loop owns the link, both axis states and the actuator on one thread
    tokio::task::spawn_blocking(move || control.run_until(&shutdown)).await??;

    info!("Runtime stopped");
    Ok(())
}

async fn publish_telemetry(
    mut reports: mpsc::Receiver<CycleReport>,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let pub_drive = session.declare_publisher(TOPIC_RT_DRIVE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;
    info!("Publishing to: {}, {}", TOPIC_RT_DRIVE, TOPIC_HEALTH);

    while let Some(report) = reports.recv().await {
        let report_json = serde_json::to_string(&report)?;
        pub_drive.put(report_json).await?;

        let health_json = serde_json::to_string(&report.health)?;
        pub_health.put(health_json).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StopMode;
    use crate::link::ScriptedLink;

    fn control_loop(link: ScriptedLink) -> ControlLoop<ScriptedLink, SimulatedActuator> {
        ControlLoop::new(link, SimulatedActuator::new(), ControllerConfig::default())
    }

    #[test]
    fn test_watchdog_trips_and_recovers() {
        let mut dog = Watchdog::new(3);
        dog.feed();
        assert!(!dog.miss());
        assert!(!dog.miss());
        assert!(dog.miss());
        assert_eq!(dog.health, RuntimeHealth::LinkStale);
        dog.feed();
        assert_eq!(dog.health, RuntimeHealth::Ok);
        assert_eq!(dog.missed, 0);
    }

    #[test]
    fn test_starts_stale_and_stopped() {
        let cl = control_loop(ScriptedLink::new());
        assert_eq!(cl.health(), RuntimeHealth::LinkStale);
        assert_eq!(cl.command(), DriveCommand::Stop);
    }

    #[test]
    fn test_measured_dt_first_cycle_uses_fixed() {
        let config = ControllerConfig {
            measured_dt: true,
            ..ControllerConfig::default()
        };
        let mut cl = ControlLoop::new(ScriptedLink::new(), SimulatedActuator::new(), config);
        assert_eq!(cl.cycle_dt(), 0.001);
        let dt = cl.cycle_dt();
        assert!((MIN_DT..=MAX_DT).contains(&dt));
    }

    #[test]
    fn test_reports_every_nth_cycle() {
        let (tx, mut rx) = mpsc::channel(TELEMETRY_QUEUE);
        let mut link = ScriptedLink::new();
        for _ in 0..TELEMETRY_EVERY {
            link.push_frame(60, 0);
        }
        let mut cl = control_loop(link).with_reports(tx);
        for _ in 0..TELEMETRY_EVERY {
            cl.step().unwrap();
        }

        // Stop -> Right on the first cycle, then the periodic one
        let report = rx.try_recv().unwrap();
        assert_eq!(report.cycle, 1);
        assert!(matches!(report.command, DriveCommand::Right(_)));

        let report = rx.try_recv().unwrap();
        assert_eq!(report.cycle, TELEMETRY_EVERY);
        assert_eq!(report.sample, Some(Sample::new(60, 0)));
        assert_eq!(report.health, RuntimeHealth::Ok);
        assert!(matches!(report.command, DriveCommand::Right(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_report_channel_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut cl = control_loop(ScriptedLink::new()).with_reports(tx);
        for _ in 0..TELEMETRY_EVERY {
            cl.step().unwrap();
        }
        assert!(cl.reports.is_none());
    }

    #[test]
    fn test_command_change_reported_immediately() {
        let (tx, mut rx) = mpsc::channel(TELEMETRY_QUEUE);
        let mut link = ScriptedLink::new();
        for _ in 0..3 {
            link.push_frame(60, 0);
        }
        link.push_byte(0x80);
        link.push_byte(0x00);
        let mut cl = control_loop(link).with_reports(tx);
        for _ in 0..4 {
            cl.step().unwrap();
        }

        let first = rx.try_recv().unwrap();
        assert_eq!(first.cycle, 1);
        // Ramping speed within Right is not a change
        let stop = rx.try_recv().unwrap();
        assert_eq!(stop.cycle, 4);
        assert_eq!(stop.command, DriveCommand::Stop);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_run_until_paces_and_stops_on_drop() {
        let config = ControllerConfig {
            dt: 0.01,
            stop_mode: StopMode::Brake,
            ..ControllerConfig::default()
        };
        let period = config.period();
        let mut actuator = SimulatedActuator::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let signal = shutdown.clone();
        let setter = std::thread::spawn(move || {
            std::thread::sleep(period * 5);
            signal.store(true, Ordering::Relaxed);
        });

        let writes_before_drop;
        {
            let mut cl = ControlLoop::new(ScriptedLink::new(), &mut actuator, config);
            let started = Instant::now();
            assert!(cl.run_until(&shutdown).is_ok());
            let elapsed = started.elapsed();

            // Scripted receives return at once, so every cycle is padded
            assert!(cl.cycle >= 5, "only {} cycles", cl.cycle);
            assert!(
                elapsed >= period * cl.cycle as u32,
                "{} cycles in {:?}",
                cl.cycle,
                elapsed
            );
            writes_before_drop = cl.actuator().writes();
        }
        setter.join().unwrap();

        assert_eq!(actuator.writes(), writes_before_drop + 6);
        assert_eq!(actuator.frame(), ActuatorFrame::uniform(1.0));
    }

    #[test]
    fn test_measured_dt_spans_missed_cycles() {
        let config = ControllerConfig {
            measured_dt: true,
            ..ControllerConfig::default()
        };
        let mut link = ScriptedLink::new();
        link.push_frame(50, 0);
        link.push_silence();
        link.push_byte(0x80);
        link.push_byte(0x00);
        link.push_silence();
        link.push_frame(50, 0);
        let mut cl = ControlLoop::new(link, SimulatedActuator::new(), config);

        assert!(matches!(cl.step().unwrap(), CycleOutcome::Driven { .. }));
        let first_update = cl.last_update;
        // First update uses the fixed period
        let integral = cl.context().x.integral;
        assert!((integral - 50.0 * 0.001).abs() < 1e-6);

        let missed = [
            CycleOutcome::Idle,
            CycleOutcome::Rejected(Sample::new(-128, 0)),
            CycleOutcome::Idle,
        ];
        for expected in missed {
            std::thread::sleep(std::time::Duration::from_millis(5));
            assert_eq!(cl.step().unwrap(), expected);
            assert_eq!(cl.last_update, first_update);
        }

        assert!(matches!(cl.step().unwrap(), CycleOutcome::Driven { .. }));
        // integral grew by error * dt, with dt covering the three missed cycles
        let dt = (cl.context().x.integral - integral) / 50.0;
        assert!(dt >= 0.015 - 1e-4, "dt {}", dt);
        assert!(dt <= MAX_DT);
    }
}
