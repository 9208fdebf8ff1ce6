/**
 * Wrist-Sync Ack Latency Test
 *
 * Measures the command round trip:
 * - host write to DONE line seen by the ingest loop
 * - firmware-reported execution time embedded in the ack
 *
 * Outputs CSV for analysis and prints summary statistics.
 */

use std::fs::File;
use std::io::Write;
use std::time::{Duration, Instant};

use wrist_sync::{BridgeConfig, Command, RigBridge, SendOutcome};

const NUM_SAMPLES: usize = 200;

fn stats(name: &str, data: &[u64]) {
    if data.is_empty() {
        println!("{}: No data", name);
        return;
    }

    let mut sorted = data.to_vec();
    sorted.sort();

    let sum: u64 = sorted.iter().sum();
    let mean = sum as f64 / sorted.len() as f64;

    let variance: f64 = sorted.iter()
        .map(|&x| (x as f64 - mean).powi(2))
        .sum::<f64>() / sorted.len() as f64;
    let std_dev = variance.sqrt();

    let p50 = sorted[sorted.len() * 50 / 100];
    let p95 = sorted[sorted.len() * 95 / 100];
    let p99 = sorted[sorted.len() * 99 / 100];
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    println!("{:12} │ Mean: {:8.2} µs │ Std Dev: {:8.2} µs", name, mean, std_dev);
    println!("{:12} │ P50:  {:8} µs │ P95: {:8} µs │ P99: {:8} µs", "", p50, p95, p99);
    println!("{:12} │ Min:  {:8} µs │ Max: {:8} µs", "", min, max);
    println!();
}

fn main() {
    env_logger::init();

    println!("==============================================");
    println!("  Wrist-Sync Ack Latency Test");
    println!("==============================================\n");

    let args: Vec<String> = std::env::args().collect();
    let port = args.get(1).map(|s| s.as_str()).unwrap_or("/dev/ttyACM0");

    println!("Port: {}", port);
    println!("Samples: {}", NUM_SAMPLES);
    println!("----------------------------------------------\n");

    let mut config = BridgeConfig::default();
    config.port = port.to_string();

    let bridge = RigBridge::open(&config).expect("Failed to open the rig port");
    println!("✅ Port opened, sending {} acked commands...\n", NUM_SAMPLES);

    let mut csv_file = File::create("/tmp/wrist_sync_ack_latency.csv")
        .expect("Failed to create CSV file");
    writeln!(csv_file, "sample,round_trip_us,firmware_ms,outcome").unwrap();

    let mut round_trips: Vec<u64> = Vec::new();
    let mut firmware_times: Vec<u64> = Vec::new();
    let mut no_acks = 0u32;

    let test_start = Instant::now();

    for sample in 0..NUM_SAMPLES {
        let send_start = Instant::now();
        let outcome = bridge.send(&Command::set_speed(80), true);
        let round_trip_us = send_start.elapsed().as_micros() as u64;

        match outcome {
            Ok(SendOutcome::Acked(ack)) => {
                round_trips.push(round_trip_us);
                let firmware_ms = ack.timing_ms.unwrap_or(0);
                firmware_times.push(firmware_ms);
                writeln!(csv_file, "{},{},{},acked", sample, round_trip_us, firmware_ms).unwrap();
            }
            Ok(_) => {
                no_acks += 1;
                writeln!(csv_file, "{},{},,no_ack", sample, round_trip_us).unwrap();
            }
            Err(e) => {
                eprintln!("Link error after {} samples: {}", sample, e);
                break;
            }
        }

        if (sample + 1) % 50 == 0 {
            println!("  Collected {} samples...", sample + 1);
        }

        std::thread::sleep(Duration::from_millis(20));
    }

    let test_duration = test_start.elapsed();

    println!("\n==============================================");
    println!("  RESULTS ({} acked in {:.2}s, {} unacked)",
        round_trips.len(), test_duration.as_secs_f64(), no_acks);
    println!("==============================================\n");

    stats("Round Trip", &round_trips);

    if !firmware_times.is_empty() {
        let sum: u64 = firmware_times.iter().sum();
        println!(
            "Firmware-reported mean: {:.2} ms",
            sum as f64 / firmware_times.len() as f64
        );
    }

    let throughput = round_trips.len() as f64 / test_duration.as_secs_f64();
    println!("Throughput: {:.1} acked cmd/sec", throughput);

    println!("\n----------------------------------------------");
    println!("CSV saved to: /tmp/wrist_sync_ack_latency.csv");
    println!("----------------------------------------------\n");

    bridge.shutdown();
}
