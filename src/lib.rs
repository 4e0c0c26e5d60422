//! # vicon-mocap - normalized pose streams from a Vicon DataStream server
//!
//! Wraps a DataStream client session and republishes each frame as
//! engine-agnostic data:
//! - Named rigid bodies with position (meters) and orientation (w, x, y, z)
//! - A point cloud of unlabeled markers, optionally followed by labeled ones
//! - Per-frame latency samples
//!
//! The vendor client sits behind [`DataStreamClient`]; [`sim::SimulatedClient`]
//! provides a scripted server for tests and demos, and [`ffi`] lets C hosts
//! plug in their own client.
//!
//! ## Quick Start
//! ```no_run
//! use vicon_mocap::{CaptureConfig, MotionCapture, ViconCapture};
//! use vicon_mocap::sim::SimulatedClient;
//!
//! let client = SimulatedClient::orbit(&["cf1", "cf2"], 240, 1000.0);
//! let config = CaptureConfig::new("vicon:801").pointcloud(true);
//! let mut capture = ViconCapture::with_config(client, &config).unwrap();
//! println!("Version: {}", capture.version());
//!
//! for _ in 0..100 {
//!     capture.wait_for_next_frame().unwrap();
//!     for (name, body) in capture.rigid_bodies() {
//!         println!("{}: {:?}", name, body.position());
//!     }
//! }
//! ```

pub mod error;
pub mod types;
pub mod convert;
pub mod client;
pub mod config;
pub mod session;
pub mod capture;
pub mod stream;
pub mod sim;
pub mod ffi;

pub use error::MocapError;
pub use types::*;
pub use client::DataStreamClient;
pub use config::{CaptureConfig, RetryPolicy};
pub use session::Session;
pub use capture::{FrameSnapshot, MotionCapture, ViconCapture};
pub use stream::CaptureStream;

/// Result type alias for vicon-mocap operations.
pub type Result<T> = std::result::Result<T, MocapError>;
