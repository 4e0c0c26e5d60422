//! Connect using `MOCAP_*` environment settings and print session info.
//!
//! Runs against the simulated server, since no vendor client ships with
//! this crate.

use vicon_mocap::sim::SimulatedClient;
use vicon_mocap::{CaptureConfig, MotionCapture, ViconCapture};

fn main() {
    env_logger::init();

    let config = CaptureConfig::from_env();
    let client = SimulatedClient::orbit(&["cf1", "cf2", "wand"], 240, 1000.0);

    match ViconCapture::with_config(client, &config) {
        Ok(capture) => {
            println!("Host:        {}", config.hostname);
            println!("Version:     {}", capture.version());
            println!("Layers:      {:?}", capture.session().data_layers());
            println!("Rigid:       {}", capture.supports_rigid_body_tracking());
            println!("Pointcloud:  {}", capture.supports_point_cloud());
            println!("Latency:     {}", capture.supports_latency_estimate());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
