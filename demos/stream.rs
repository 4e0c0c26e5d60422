//! Stream rigid bodies from a simulated server to stdout.
//!
//! Usage: cargo run --example stream
//! Press Ctrl+C to stop.

use std::time::{Duration, Instant};
use vicon_mocap::sim::SimulatedClient;
use vicon_mocap::{CaptureConfig, CaptureStream, RetryPolicy, ViconCapture};

fn main() {
    env_logger::init();

    let config = CaptureConfig::from_env()
        .pointcloud(true)
        .frame_retry(RetryPolicy::forever().with_timeout(Duration::from_millis(100)));
    let client = SimulatedClient::orbit(&["cf1", "cf2"], 1000, 750.0);

    let capture = match ViconCapture::with_config(client, &config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    let stream = match CaptureStream::start(capture, 256) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to start capture: {}", e);
            std::process::exit(1);
        }
    };

    println!("Streaming (Ctrl+C to stop)...");

    let start = Instant::now();
    let mut count: u64 = 0;
    let mut last_report = Instant::now();

    loop {
        match stream.recv_timeout(Duration::from_secs(2)) {
            Ok(snapshot) => {
                count += 1;

                // Print every ~1000th frame to avoid flooding the terminal
                if count % 1000 == 1 {
                    let mut names: Vec<_> = snapshot.rigid_bodies.keys().collect();
                    names.sort();
                    for name in names {
                        let body = &snapshot.rigid_bodies[name];
                        let p = body.position();
                        let q = body.orientation();
                        println!(
                            "frame={:<8} {:<6} pos=[{:+.3}, {:+.3}, {:+.3}]  quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}]",
                            snapshot.frame, name, p[0], p[1], p[2], q.w, q.x, q.y, q.z,
                        );
                    }
                    println!("             markers={}", snapshot.point_cloud.len());
                }

                let now = Instant::now();
                if now.duration_since(last_report) >= Duration::from_secs(3) {
                    let elapsed = start.elapsed().as_secs_f64();
                    println!("--- {} frames in {:.1}s ({:.1} Hz) ---", count, elapsed, count as f64 / elapsed);
                    last_report = now;
                }
            }
            Err(vicon_mocap::MocapError::Timeout) => {
                eprintln!("Timeout waiting for frames");
                break;
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                break;
            }
        }
    }
}
