//! Scripted DataStream server for tests and demos without a Vicon system.
//!
//! [`SimulatedClient`] plays back a list of [`SimFrame`]s. Each successful
//! `get_frame` makes the next frame current; the query methods then answer
//! from that frame, only for the data layers the session enabled.
//!
//! ```rust
//! use vicon_mocap::sim::{SimFrame, SimSubject, SimulatedClient};
//! use vicon_mocap::{MotionCapture, ViconCapture};
//!
//! let frame = SimFrame::new()
//!     .subject(SimSubject::new("cf1", [1000.0, 0.0, 500.0], [0.0, 0.0, 0.0, 1.0]));
//! let client = SimulatedClient::new(vec![frame]);
//!
//! let mut capture = ViconCapture::create(client, "localhost:801", true, false, false).unwrap();
//! capture.wait_for_next_frame().unwrap();
//! let body = capture.rigid_body_by_name("cf1").unwrap();
//! assert_eq!(body.position(), [1.0, 0.0, 0.5]);
//! ```

use crate::client::{DataStreamClient, SegmentRotation, SegmentTranslation};
use crate::types::{AxisMapping, DataLayers, QueryResult, ServerVersion, StreamMode};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One subject in a simulated frame. Its root segment shares its name.
#[derive(Debug, Clone, PartialEq)]
pub struct SimSubject {
    pub name: String,
    /// Global translation in millimeters.
    pub translation_mm: [f64; 3],
    /// Global rotation as [x, y, z, w].
    pub rotation_xyzw: [f64; 4],
    pub translation_result: QueryResult,
    pub rotation_result: QueryResult,
    pub translation_occluded: bool,
    pub rotation_occluded: bool,
}

impl SimSubject {
    pub fn new(name: impl Into<String>, translation_mm: [f64; 3], rotation_xyzw: [f64; 4]) -> Self {
        Self {
            name: name.into(),
            translation_mm,
            rotation_xyzw,
            translation_result: QueryResult::Success,
            rotation_result: QueryResult::Success,
            translation_occluded: false,
            rotation_occluded: false,
        }
    }

    pub fn translation_occluded(mut self) -> Self {
        self.translation_occluded = true;
        self
    }

    pub fn rotation_occluded(mut self) -> Self {
        self.rotation_occluded = true;
        self
    }

    pub fn translation_result(mut self, result: QueryResult) -> Self {
        self.translation_result = result;
        self
    }

    pub fn rotation_result(mut self, result: QueryResult) -> Self {
        self.rotation_result = result;
        self
    }
}

/// Everything the server reports for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimFrame {
    pub subjects: Vec<SimSubject>,
    /// Unlabeled marker positions in millimeters.
    pub unlabeled_markers: Vec<[f64; 3]>,
    /// Labeled marker positions in millimeters.
    pub labeled_markers: Vec<[f64; 3]>,
    /// Latency samples (name, seconds) in reporting order.
    pub latency: Vec<(String, f64)>,
}

impl SimFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subject(mut self, subject: SimSubject) -> Self {
        self.subjects.push(subject);
        self
    }

    pub fn unlabeled(mut self, position_mm: [f64; 3]) -> Self {
        self.unlabeled_markers.push(position_mm);
        self
    }

    pub fn labeled(mut self, position_mm: [f64; 3]) -> Self {
        self.labeled_markers.push(position_mm);
        self
    }

    pub fn latency(mut self, name: impl Into<String>, seconds: f64) -> Self {
        self.latency.push((name.into(), seconds));
        self
    }
}

/// In-memory [`DataStreamClient`] replaying scripted frames.
#[derive(Debug)]
pub struct SimulatedClient {
    frames: Vec<SimFrame>,
    current: Option<usize>,
    next: usize,
    looping: bool,
    version: ServerVersion,
    connected: bool,
    refuse_connections: bool,
    connect_failures: u32,
    frame_misses: u32,
    misses_left: u32,
    layers: DataLayers,
    stream_mode: Option<StreamMode>,
    axis_mapping: Option<AxisMapping>,
    host: Option<String>,
    connect_calls: u32,
    frame_requests: u32,
    disconnected: Arc<AtomicBool>,
}

impl SimulatedClient {
    pub fn new(frames: Vec<SimFrame>) -> Self {
        Self {
            frames,
            current: None,
            next: 0,
            looping: false,
            version: ServerVersion {
                major: 1,
                minor: 12,
                point: 0,
            },
            connected: false,
            refuse_connections: false,
            connect_failures: 0,
            frame_misses: 0,
            misses_left: 0,
            layers: DataLayers::empty(),
            stream_mode: None,
            axis_mapping: None,
            host: None,
            connect_calls: 0,
            frame_requests: 0,
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subjects circling the origin at 1 m height, one revolution over `frames`.
    ///
    /// Each subject also contributes a labeled marker at its center and an
    /// unlabeled marker 50 mm above it.
    pub fn orbit(names: &[&str], frames: usize, radius_mm: f64) -> Self {
        let frames = frames.max(1);
        let count = names.len().max(1) as f64;
        let mut script = Vec::with_capacity(frames);
        for i in 0..frames {
            let mut frame = SimFrame::new()
                .latency("Tracker Time", 0.004)
                .latency("Data Stream", 0.0015);
            for (k, name) in names.iter().enumerate() {
                let angle = std::f64::consts::TAU * (i as f64 / frames as f64 + k as f64 / count);
                let position = [radius_mm * angle.cos(), radius_mm * angle.sin(), 1000.0];
                // Heading follows the tangent of the circle.
                let yaw = angle + std::f64::consts::FRAC_PI_2;
                let rotation = [0.0, 0.0, (yaw / 2.0).sin(), (yaw / 2.0).cos()];
                frame = frame
                    .subject(SimSubject::new(*name, position, rotation))
                    .labeled(position)
                    .unlabeled([position[0], position[1], position[2] + 50.0]);
            }
            script.push(frame);
        }
        Self::new(script).looping(true)
    }

    pub fn with_version(mut self, major: u32, minor: u32, point: u32) -> Self {
        self.version = ServerVersion {
            major,
            minor,
            point,
        };
        self
    }

    /// Fail the first `count` connection attempts.
    pub fn failing_connects(mut self, count: u32) -> Self {
        self.connect_failures = count;
        self
    }

    /// Never accept a connection.
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Report `NoFrame` this many times before each frame is delivered.
    pub fn missing_frames(mut self, count: u32) -> Self {
        self.frame_misses = count;
        self.misses_left = count;
        self
    }

    /// Restart from the first frame after the last one.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn enabled_layers(&self) -> DataLayers {
        self.layers
    }

    pub fn stream_mode(&self) -> Option<StreamMode> {
        self.stream_mode
    }

    pub fn axis_mapping(&self) -> Option<AxisMapping> {
        self.axis_mapping
    }

    /// Host passed to the most recent `connect` call.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls
    }

    pub fn frame_requests(&self) -> u32 {
        self.frame_requests
    }

    /// Flag set once the client has been disconnected, observable after
    /// the client has been moved into a session.
    pub fn disconnected_flag(&self) -> Arc<AtomicBool> {
        self.disconnected.clone()
    }

    fn frame(&self) -> Option<&SimFrame> {
        self.current.and_then(|i| self.frames.get(i))
    }

    fn find_subject(&self, subject: &str, segment: &str) -> Result<&SimSubject, QueryResult> {
        let frame = self.frame().ok_or(QueryResult::NoFrame)?;
        if !self.layers.contains(DataLayers::SEGMENTS) {
            return Err(QueryResult::Unknown);
        }
        let found = frame
            .subjects
            .iter()
            .find(|s| s.name == subject)
            .ok_or(QueryResult::InvalidSubjectName)?;
        if segment != found.name {
            return Err(QueryResult::InvalidSegmentName);
        }
        Ok(found)
    }

    fn markers(&self, layer: DataLayers) -> &[[f64; 3]] {
        let frame = match self.frame() {
            Some(frame) if self.layers.contains(layer) => frame,
            _ => return &[],
        };
        if layer == DataLayers::LABELED_MARKERS {
            &frame.labeled_markers
        } else {
            &frame.unlabeled_markers
        }
    }
}

impl DataStreamClient for SimulatedClient {
    fn connect(&mut self, host: &str) -> bool {
        self.connect_calls += 1;
        self.host = Some(host.to_string());
        if self.refuse_connections {
            return false;
        }
        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return false;
        }
        self.connected = true;
        self.disconnected.store(false, Ordering::Relaxed);
        true
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.disconnected.store(true, Ordering::Relaxed);
    }

    fn enable_segment_data(&mut self) {
        self.layers |= DataLayers::SEGMENTS;
    }

    fn enable_unlabeled_marker_data(&mut self) {
        self.layers |= DataLayers::UNLABELED_MARKERS;
    }

    fn enable_marker_data(&mut self) {
        self.layers |= DataLayers::LABELED_MARKERS;
    }

    fn set_stream_mode(&mut self, mode: StreamMode) {
        self.stream_mode = Some(mode);
    }

    fn set_axis_mapping(&mut self, mapping: AxisMapping) {
        self.axis_mapping = Some(mapping);
    }

    fn version(&self) -> ServerVersion {
        self.version
    }

    fn get_frame(&mut self) -> QueryResult {
        self.frame_requests += 1;
        if !self.connected {
            return QueryResult::NotConnected;
        }
        if self.misses_left > 0 {
            self.misses_left -= 1;
            return QueryResult::NoFrame;
        }
        if self.next >= self.frames.len() {
            if !self.looping || self.frames.is_empty() {
                return QueryResult::NoFrame;
            }
            self.next = 0;
        }
        self.current = Some(self.next);
        self.next += 1;
        self.misses_left = self.frame_misses;
        QueryResult::Success
    }

    fn subject_count(&self) -> usize {
        match self.frame() {
            Some(frame) if self.layers.contains(DataLayers::SEGMENTS) => frame.subjects.len(),
            _ => 0,
        }
    }

    fn subject_name(&self, index: usize) -> String {
        self.frame()
            .and_then(|f| f.subjects.get(index))
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    fn segment_global_translation(&self, subject: &str, segment: &str) -> SegmentTranslation {
        match self.find_subject(subject, segment) {
            Ok(s) => SegmentTranslation {
                result: s.translation_result,
                occluded: s.translation_occluded,
                translation: s.translation_mm,
            },
            Err(result) => SegmentTranslation::failed(result),
        }
    }

    fn segment_global_rotation_quaternion(&self, subject: &str, segment: &str) -> SegmentRotation {
        match self.find_subject(subject, segment) {
            Ok(s) => SegmentRotation {
                result: s.rotation_result,
                occluded: s.rotation_occluded,
                rotation: s.rotation_xyzw,
            },
            Err(result) => SegmentRotation::failed(result),
        }
    }

    fn unlabeled_marker_count(&self) -> usize {
        self.markers(DataLayers::UNLABELED_MARKERS).len()
    }

    fn unlabeled_marker_global_translation(&self, index: usize) -> [f64; 3] {
        self.markers(DataLayers::UNLABELED_MARKERS)
            .get(index)
            .copied()
            .unwrap_or([0.0; 3])
    }

    fn labeled_marker_count(&self) -> usize {
        self.markers(DataLayers::LABELED_MARKERS).len()
    }

    fn labeled_marker_global_translation(&self, index: usize) -> [f64; 3] {
        self.markers(DataLayers::LABELED_MARKERS)
            .get(index)
            .copied()
            .unwrap_or([0.0; 3])
    }

    fn latency_sample_count(&self) -> usize {
        self.frame().map_or(0, |f| f.latency.len())
    }

    fn latency_sample_name(&self, index: usize) -> String {
        self.frame()
            .and_then(|f| f.latency.get(index))
            .map(|(name, _)| name.clone())
            .unwrap_or_default()
    }

    fn latency_sample_value(&self, name: &str) -> f64 {
        self.frame()
            .and_then(|f| f.latency.iter().find(|(n, _)| n == name))
            .map_or(0.0, |(_, v)| *v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_require_connection() {
        let mut client = SimulatedClient::new(vec![SimFrame::new()]);
        assert_eq!(client.get_frame(), QueryResult::NotConnected);
        assert!(client.connect("localhost"));
        assert_eq!(client.get_frame(), QueryResult::Success);
        assert_eq!(client.get_frame(), QueryResult::NoFrame);
    }

    #[test]
    fn test_looping_playback() {
        let mut client = SimulatedClient::new(vec![
            SimFrame::new().latency("a", 1.0),
            SimFrame::new().latency("b", 2.0),
        ])
        .looping(true);
        client.connect("localhost");
        let mut names = Vec::new();
        for _ in 0..3 {
            assert!(client.get_frame().is_success());
            names.push(client.latency_sample_name(0));
        }
        assert_eq!(names, ["a", "b", "a"]);
    }

    #[test]
    fn test_layers_gate_data() {
        let frame = SimFrame::new()
            .subject(SimSubject::new("s", [0.0; 3], [0.0, 0.0, 0.0, 1.0]))
            .unlabeled([1.0, 2.0, 3.0])
            .labeled([4.0, 5.0, 6.0]);
        let mut client = SimulatedClient::new(vec![frame]);
        client.connect("localhost");
        client.get_frame();
        assert_eq!(client.subject_count(), 0);
        assert_eq!(client.unlabeled_marker_count(), 0);
        assert_eq!(client.labeled_marker_count(), 0);

        client.enable_segment_data();
        client.enable_unlabeled_marker_data();
        assert_eq!(client.subject_count(), 1);
        assert_eq!(client.unlabeled_marker_count(), 1);
        assert_eq!(client.labeled_marker_count(), 0);
    }

    #[test]
    fn test_segment_lookup_results() {
        let frame = SimFrame::new().subject(SimSubject::new("s", [1.0; 3], [0.0, 0.0, 0.0, 1.0]));
        let mut client = SimulatedClient::new(vec![frame]);
        client.connect("localhost");
        client.enable_segment_data();
        assert_eq!(
            client.segment_global_translation("s", "s").result,
            QueryResult::NoFrame
        );
        client.get_frame();
        assert!(client.segment_global_translation("s", "s").result.is_success());
        assert_eq!(
            client.segment_global_translation("t", "t").result,
            QueryResult::InvalidSubjectName
        );
        assert_eq!(
            client.segment_global_rotation_quaternion("s", "root").result,
            QueryResult::InvalidSegmentName
        );
    }

    #[test]
    fn test_missing_frames_before_each_delivery() {
        let mut client =
            SimulatedClient::new(vec![SimFrame::new(), SimFrame::new()]).missing_frames(2);
        client.connect("localhost");
        let results: Vec<_> = (0..6).map(|_| client.get_frame()).collect();
        assert_eq!(
            results,
            [
                QueryResult::NoFrame,
                QueryResult::NoFrame,
                QueryResult::Success,
                QueryResult::NoFrame,
                QueryResult::NoFrame,
                QueryResult::Success,
            ]
        );
    }

    #[test]
    fn test_orbit_frames() {
        let mut client = SimulatedClient::orbit(&["a", "b"], 4, 1000.0);
        client.connect("localhost");
        client.enable_segment_data();
        client.enable_unlabeled_marker_data();
        client.enable_marker_data();
        for _ in 0..5 {
            assert!(client.get_frame().is_success());
        }
        assert_eq!(client.subject_count(), 2);
        assert_eq!(client.unlabeled_marker_count(), 2);
        assert_eq!(client.labeled_marker_count(), 2);
        assert_eq!(client.latency_sample_count(), 2);
        let t = client.segment_global_translation("a", "a").translation;
        assert!((t[0] - 1000.0).abs() < 1e-9);
        assert!(t[1].abs() < 1e-9);
    }
}
