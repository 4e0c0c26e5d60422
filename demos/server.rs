//! Broadcast rigid bodies as JSON to WebSocket clients.
//!
//! Each message is one frame:
//!
//! {"frame":42,"bodies":[{"name":"cf1","p":[0.1,0.2,1.0],"q":[1.0,0.0,0.0,0.0]}],"markers":4}
//!
//! Usage:
//!   cargo run --release --example server
//!   Connect a WebSocket client to ws://localhost:8090

use std::fmt::Write as _;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tungstenite::Message;
use vicon_mocap::sim::SimulatedClient;
use vicon_mocap::{CaptureConfig, CaptureStream, FrameSnapshot, MocapError, RetryPolicy, ViconCapture};

const PORT: u16 = 8090;

type WsClient = Arc<Mutex<tungstenite::WebSocket<TcpStream>>>;

fn main() {
    env_logger::init();

    let clients: Arc<Mutex<Vec<WsClient>>> = Arc::new(Mutex::new(Vec::new()));

    let capture_clients = clients.clone();
    let running = Arc::new(AtomicBool::new(true));
    let capture_running = running.clone();

    let capture_thread = std::thread::Builder::new()
        .name("mocap-broadcast".into())
        .spawn(move || {
            broadcast_loop(capture_clients, capture_running);
        })
        .expect("Failed to spawn broadcast thread");

    let listener = TcpListener::bind(format!("0.0.0.0:{}", PORT)).unwrap_or_else(|e| {
        eprintln!("Failed to bind port {}: {}", PORT, e);
        std::process::exit(1);
    });
    eprintln!("[WS] Listening on ws://localhost:{}", PORT);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[TCP] accept error: {}", e);
                continue;
            }
        };

        // Write timeout keeps a slow client from stalling the broadcast.
        stream.set_write_timeout(Some(Duration::from_secs(2))).ok();
        stream.set_nodelay(true).ok();

        match tungstenite::accept(stream) {
            Ok(ws) => {
                let mut list = clients.lock().unwrap();
                list.push(Arc::new(Mutex::new(ws)));
                eprintln!("[WS] Client connected ({} total)", list.len());
            }
            Err(e) => eprintln!("[WS] handshake error: {}", e),
        }
    }

    running.store(false, Ordering::Relaxed);
    let _ = capture_thread.join();
}

fn broadcast_loop(clients: Arc<Mutex<Vec<WsClient>>>, running: Arc<AtomicBool>) {
    let config = CaptureConfig::from_env()
        .pointcloud(true)
        .frame_retry(RetryPolicy::forever().with_timeout(Duration::from_millis(100)));
    let client = SimulatedClient::orbit(&["cf1", "cf2", "cf3"], 2000, 1000.0);

    let capture = match ViconCapture::with_config(client, &config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[MOCAP] Failed to connect: {}", e);
            return;
        }
    };
    let stream = match CaptureStream::start(capture, 16) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("[MOCAP] Failed to start capture: {}", e);
            return;
        }
    };

    let mut last_broadcast = std::time::Instant::now();
    let broadcast_interval = Duration::from_millis(16); // ~60 Hz

    while running.load(Ordering::Relaxed) {
        let snapshot = match stream.recv_timeout(Duration::from_secs(2)) {
            Ok(s) => s,
            Err(MocapError::Timeout) => continue,
            Err(e) => {
                eprintln!("[MOCAP] Error: {}", e);
                break;
            }
        };

        let now = std::time::Instant::now();
        if now.duration_since(last_broadcast) < broadcast_interval {
            continue;
        }
        last_broadcast = now;

        let msg = Message::Text(to_json(&snapshot));
        let mut list = clients.lock().unwrap();
        list.retain(|ws_arc| {
            let mut ws = ws_arc.lock().unwrap();
            ws.send(msg.clone()).is_ok()
        });
    }
}

fn to_json(snapshot: &FrameSnapshot) -> String {
    let mut names: Vec<_> = snapshot.rigid_bodies.keys().collect();
    names.sort();

    let mut json = format!("{{\"frame\":{},\"bodies\":[", snapshot.frame);
    for (i, name) in names.into_iter().enumerate() {
        let body = &snapshot.rigid_bodies[name];
        let p = body.position();
        let q = body.orientation();
        if i > 0 {
            json.push(',');
        }
        let _ = write!(
            json,
            "{{\"name\":\"{}\",\"p\":[{:.4},{:.4},{:.4}],\"q\":[{:.4},{:.4},{:.4},{:.4}]}}",
            json_escape(name),
            p[0],
            p[1],
            p[2],
            q.w,
            q.x,
            q.y,
            q.z
        );
    }
    let _ = write!(json, "],\"markers\":{}}}", snapshot.point_cloud.len());
    json
}

fn json_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_escaped() {
        assert_eq!(json_escape("cf1"), "cf1");
        assert_eq!(json_escape("a\"b\\c"), "a\\\"b\\\\c");
        assert_eq!(json_escape("tab\there\u{1}"), "tab\\there\\u0001");
    }
}
