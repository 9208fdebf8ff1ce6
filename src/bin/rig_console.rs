/**
 * Rig Console
 *
 * Interactive console for the haptic rig:
 * 1. Connects to the board over USB-serial
 * 2. Streams decoded telemetry into a bounded window
 * 3. Sends motor / vibration / tare commands typed on stdin
 *
 * Usage: rig_console [port] [baud]
 * Default: /dev/ttyACM0, 115200
 */

use std::io::{self, Write};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use wrist_sync::{
    addresses, sine_sweep, BridgeConfig, Command, LinkError, MotorDirection,
    RigBridge, SendOutcome, Sequencer, SweepOutcome, TelemetryFrame,
};

//the two DA7281 drivers every rig carries on its first bus
const DEFAULT_DRIVERS: [u8; 2] = [0x48, 0x49];

fn report(result: Result<SendOutcome, LinkError>) {
    match result {
        Ok(SendOutcome::Acked(ack)) => match ack.timing_ms {
            Some(ms) => println!("[ACK] DONE in {} ms", ms),
            None => println!("[ACK] {}", if ack.ok { "DONE" } else { "rejected" }),
        },
        Ok(SendOutcome::NoAck) => println!("[NO ACK] board stayed quiet"),
        Ok(SendOutcome::Sent) => println!("[SENT]"),
        Err(e) => println!("[LINK ERROR] {}", e),
    }
}

fn describe(frame: &TelemetryFrame) -> String {
    match frame {
        TelemetryFrame::Imu(imu) => format!(
            "accel=({:.3}, {:.3}, {:.3}) gyro=({:.3}, {:.3}, {:.3})",
            imu.accel_x, imu.accel_y, imu.accel_z, imu.gyro_x, imu.gyro_y, imu.gyro_z
        ),
        TelemetryFrame::Force(force) => format!("force={:.3} N", force.newtons),
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let port = args.get(1).map(|s| s.as_str()).unwrap_or("/dev/ttyACM0");
    let baud: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(115_200);

    println!("==============================================");
    println!("  Wrist-Sync Rig Console");
    println!("==============================================");
    println!("  Port: {}", port);
    println!("  Baud: {}", baud);
    println!("==============================================\n");

    let mut config = BridgeConfig::default();
    config.port = port.to_string();
    config.baud = baud;

    let bridge = match RigBridge::open(&config) {
        Ok(bridge) => bridge,
        Err(e) => {
            eprintln!("Failed to open {}: {}", port, e);
            std::process::exit(1);
        }
    };

    println!("[Commands]");
    println!("  l / r     - jog motor cw / ccw");
    println!("  x         - stop motor");
    println!("  a N / b N - turn cw / ccw by N degrees");
    println!("  s N       - set motor speed");
    println!("  v HH      - drive both vibrators at hex amplitude");
    println!("  sweep     - 20-330Hz sine sweep on the vibrators");
    println!("  stop      - cancel a running sweep");
    println!("  tare      - zero the force sensor");
    println!("  snap      - show the latest telemetry window");
    println!("  q         - quit\n");

    let drivers = addresses(&DEFAULT_DRIVERS).expect("default driver addresses");
    let sequencer = Arc::new(Sequencer::new());
    let mut sweep_handle: Option<JoinHandle<Result<SweepOutcome, LinkError>>> = None;

    loop {
        print!("> ");
        io::stdout().flush().unwrap();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            break;
        }

        let input = input.trim();
        let mut parts = input.split_whitespace();
        let verb = parts.next().unwrap_or("");
        let arg = parts.next();

        match verb {
            "" => {}
            "l" => report(bridge.send(&Command::motor_move(MotorDirection::Cw), false)),
            "r" => report(bridge.send(&Command::motor_move(MotorDirection::Ccw), false)),
            "x" => report(bridge.send(&Command::motor_move(MotorDirection::Stop), false)),
            "a" | "b" => {
                let dir = if verb == "a" { MotorDirection::Cw } else { MotorDirection::Ccw };
                match arg.and_then(|s| s.parse::<u16>().ok()) {
                    Some(angle) => match Command::motor_turn(dir, angle) {
                        Ok(cmd) => report(bridge.send(&cmd, true)),
                        Err(e) => println!("[BAD COMMAND] {}", e),
                    },
                    None => println!("usage: {} <degrees>", verb),
                }
            }
            "s" => match arg.and_then(|s| s.parse::<u8>().ok()) {
                Some(value) => report(bridge.send(&Command::set_speed(value), false)),
                None => println!("usage: s <0-255>"),
            },
            "v" => match arg.and_then(|s| u8::from_str_radix(s, 16).ok()) {
                Some(amp) => match Command::constant_drive(&drivers, amp) {
                    Ok(cmd) => report(bridge.send(&cmd, true)),
                    Err(e) => println!("[BAD COMMAND] {}", e),
                },
                None => println!("usage: v <00-FF>"),
            },
            "tare" => report(bridge.send(&Command::tare(), true)),
            "sweep" => {
                if sweep_handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false) {
                    println!("[SWEEP] already running, use 'stop' first");
                    continue;
                }
                match sine_sweep(&drivers, 20, 330, 10, 0x46, Duration::from_secs(2)) {
                    Ok(steps) => {
                        println!("[SWEEP] {} steps, 2s each", steps.len());
                        sweep_handle = Some(Arc::clone(&sequencer).start_background(
                            bridge.dispatcher(),
                            steps,
                            Box::new(|index, _cmd| {
                                println!("[SWEEP] step {} ({}Hz)", index, 20 + index as u32 * 10);
                            }),
                        ));
                    }
                    Err(e) => println!("[BAD COMMAND] {}", e),
                }
            }
            "stop" => {
                sequencer.cancel();
                if let Some(handle) = sweep_handle.take() {
                    match handle.join() {
                        Ok(Ok(outcome)) => println!("[SWEEP] {:?}", outcome),
                        Ok(Err(e)) => println!("[SWEEP] link error: {}", e),
                        Err(_) => println!("[SWEEP] worker panicked"),
                    }
                }
            }
            "snap" => {
                let window = bridge.snapshot();
                println!("[WINDOW] {} frames", window.len());
                for frame in window.iter().rev().take(5).rev() {
                    println!("  #{:<6} {}", frame.seq, describe(&frame.frame));
                }
                if let Some(fault) = bridge.fault() {
                    println!("[FAULT] {}", fault);
                }
            }
            "q" | "quit" | "exit" => {
                println!("[SHUTDOWN]");
                break;
            }
            other => println!("Unknown command: {}", other),
        }
    }

    sequencer.cancel();
    if let Some(handle) = sweep_handle.take() {
        let _ = handle.join();
    }
    bridge.shutdown();
    println!("Goodbye!");
}
