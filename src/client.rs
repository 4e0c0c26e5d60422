use crate::types::{AxisMapping, QueryResult, ServerVersion, StreamMode};

/// Global translation of a segment, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentTranslation {
    pub result: QueryResult,
    pub occluded: bool,
    pub translation: [f64; 3],
}

/// Global rotation of a segment as a raw `[x, y, z, w]` quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentRotation {
    pub result: QueryResult,
    pub occluded: bool,
    pub rotation: [f64; 4],
}

impl SegmentTranslation {
    pub fn failed(result: QueryResult) -> Self {
        Self {
            result,
            occluded: false,
            translation: [0.0; 3],
        }
    }
}

impl SegmentRotation {
    pub fn failed(result: QueryResult) -> Self {
        Self {
            result,
            occluded: false,
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Capabilities of a DataStream client session.
///
/// This is the seam between the adapter and the vendor SDK. Queries read
/// the frame made current by the most recent successful [`get_frame`].
/// Implementations are not expected to be internally synchronized.
///
/// [`get_frame`]: DataStreamClient::get_frame
pub trait DataStreamClient {
    /// Attempt to connect to `host` ("name:port"). Returns true once connected.
    fn connect(&mut self, host: &str) -> bool;
    fn is_connected(&self) -> bool;
    fn disconnect(&mut self) {}

    fn enable_segment_data(&mut self);
    fn enable_unlabeled_marker_data(&mut self);
    fn enable_marker_data(&mut self);
    fn set_stream_mode(&mut self, mode: StreamMode);
    fn set_axis_mapping(&mut self, mapping: AxisMapping);
    fn version(&self) -> ServerVersion;

    /// Advance to the next available frame.
    fn get_frame(&mut self) -> QueryResult;

    fn subject_count(&self) -> usize;
    fn subject_name(&self, index: usize) -> String;
    fn segment_global_translation(&self, subject: &str, segment: &str) -> SegmentTranslation;
    fn segment_global_rotation_quaternion(&self, subject: &str, segment: &str)
        -> SegmentRotation;

    fn unlabeled_marker_count(&self) -> usize;
    fn unlabeled_marker_global_translation(&self, index: usize) -> [f64; 3];
    fn labeled_marker_count(&self) -> usize;
    fn labeled_marker_global_translation(&self, index: usize) -> [f64; 3];

    fn latency_sample_count(&self) -> usize;
    fn latency_sample_name(&self, index: usize) -> String;
    fn latency_sample_value(&self, name: &str) -> f64;
}
