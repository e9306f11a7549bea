// Keyboard stand-in for the camera host: arrows move the fake ball, C sends a
// corrupt frame, Space recenters, Q quits.
//
// Usage: cargo run --example frame_sender -- --port /dev/ttyUSB0
//
// Each frame is sent one byte at a time and the controller must answer 0xAA
// then 0xBB, exactly like the camera side does.

use std::io::{Read, Write};
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use serialport::SerialPort;
use tracing::{info, warn};

use ball_tracker_runtime::config::{ACK_FIRST, ACK_SECOND, LINK_BAUDRATE};

const STEP: i8 = 10; // offset change per key press
const LIMIT: i8 = 125; // the camera clamps offsets to +/-125
const FRAME_INTERVAL_MS: u64 = 50;
const ACK_TIMEOUT_MS: u64 = 100;

#[derive(Parser, Debug)]
#[command(about = "Send fake ball offsets to the controller")]
struct Args {
    /// Serial port wired to the controller's sensor link
    #[arg(short, long)]
    port: String,

    #[arg(short, long, default_value_t = LINK_BAUDRATE)]
    baudrate: u32,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut port = serialport::new(&args.port, args.baudrate)
        .timeout(Duration::from_millis(ACK_TIMEOUT_MS))
        .open()?;
    info!("Connected to {} at {} baud", args.port, args.baudrate);
    info!("Controls: arrows=move ball, C=corrupt frame, Space=center, Q=quit");

    enable_raw_mode()?;
    let result = run_sender(port.as_mut());
    disable_raw_mode()?;

    result
}

fn run_sender(port: &mut dyn SerialPort) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut x: i8 = 0;
    let mut y: i8 = 0;
    let mut last_sent: Option<(i8, i8)> = None;

    loop {
        let mut corrupt = false;
        if event::poll(Duration::from_millis(FRAME_INTERVAL_MS))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                match code {
                    KeyCode::Left if pressed => x = nudge(x, -STEP),
                    KeyCode::Right if pressed => x = nudge(x, STEP),
                    KeyCode::Up if pressed => y = nudge(y, -STEP),
                    KeyCode::Down if pressed => y = nudge(y, STEP),
                    KeyCode::Char(' ') if pressed => {
                        x = 0;
                        y = 0;
                    }
                    KeyCode::Char('c') if pressed => corrupt = true,
                    KeyCode::Char('q') | KeyCode::Esc if pressed => break,
                    _ => {}
                }
            }
        }

        let first = if corrupt { 0x80 } else { x as u8 };
        if !send_byte(port, first, ACK_FIRST)? || !send_byte(port, y as u8, ACK_SECOND)? {
            warn!("Frame ({}, {}) not acknowledged", x, y);
            continue;
        }
        if worth_logging(last_sent, (x, y), corrupt) {
            info!("Sent ({}, {}){}", x, y, if corrupt { " [corrupt]" } else { "" });
        }
        last_sent = if corrupt { None } else { Some((x, y)) };
    }

    Ok(())
}

/// Only announce frames that differ from the last clean one sent
fn worth_logging(last_sent: Option<(i8, i8)>, current: (i8, i8), corrupt: bool) -> bool {
    corrupt || last_sent != Some(current)
}

fn nudge(value: i8, step: i8) -> i8 {
    value.saturating_add(step).clamp(-LIMIT, LIMIT)
}

/// Write one byte and wait for the expected acknowledgement
fn send_byte(
    port: &mut dyn SerialPort,
    byte: u8,
    ack: u8,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    port.write_all(&[byte])?;
    port.flush()?;

    let mut reply = [0u8; 1];
    match port.read_exact(&mut reply) {
        Ok(()) => Ok(reply[0] == ack),
        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(false),
        Err(e) => Err(e.into()),
    }
}
