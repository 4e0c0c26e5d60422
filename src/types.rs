use std::collections::HashMap;
use std::fmt;

/// Unit quaternion in (w, x, y, z) order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    pub fn norm(&self) -> f64 {
        (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// Rotate a vector by this quaternion (assumed unit length).
    pub fn rotate(&self, v: [f64; 3]) -> [f64; 3] {
        let (w, x, y, z) = (self.w, self.x, self.y, self.z);
        // t = 2 * (q.xyz x v); v' = v + w*t + q.xyz x t
        let t = [
            2.0 * (y * v[2] - z * v[1]),
            2.0 * (z * v[0] - x * v[2]),
            2.0 * (x * v[1] - y * v[0]),
        ];
        [
            v[0] + w * t[0] + (y * t[2] - z * t[1]),
            v[1] + w * t[1] + (z * t[0] - x * t[2]),
            v[2] + w * t[2] + (x * t[1] - y * t[0]),
        ]
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A tracked subject's pose in the Z-up world frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    name: String,
    position: [f64; 3],
    orientation: Quaternion,
}

impl RigidBody {
    pub fn new(name: impl Into<String>, position: [f64; 3], orientation: Quaternion) -> Self {
        Self {
            name: name.into(),
            position,
            orientation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position in meters [x, y, z].
    pub fn position(&self) -> [f64; 3] {
        self.position
    }

    pub fn orientation(&self) -> Quaternion {
        self.orientation
    }
}

/// All visible rigid bodies of a frame, keyed by subject name.
pub type RigidBodies = HashMap<String, RigidBody>;

/// Marker positions in meters, one row per marker.
///
/// Unlabeled markers come first, followed by labeled markers when those
/// are routed into the point cloud.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    points: Vec<[f64; 3]>,
}

impl PointCloud {
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            points: Vec::with_capacity(rows),
        }
    }

    pub(crate) fn push(&mut self, point: [f64; 3]) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<[f64; 3]> {
        self.points.get(index).copied()
    }

    pub fn points(&self) -> &[[f64; 3]] {
        &self.points
    }

    pub fn into_points(self) -> Vec<[f64; 3]> {
        self.points
    }
}

impl From<Vec<[f64; 3]>> for PointCloud {
    fn from(points: Vec<[f64; 3]>) -> Self {
        Self { points }
    }
}

/// A named stream latency measurement, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySample {
    pub name: String,
    pub value: f64,
}

impl LatencySample {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// DataStream protocol version reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub point: u32,
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.point)
    }
}

bitflags::bitflags! {
    /// Data layers the session asks the server to stream.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(C)]
    pub struct DataLayers: u32 {
        const SEGMENTS          = 1 << 0;
        const UNLABELED_MARKERS = 1 << 1;
        const LABELED_MARKERS   = 1 << 2;
    }
}

/// How frames are delivered by the server.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    /// Client requests each frame.
    ClientPull = 0,
    /// Client requests, server prefetches the next frame.
    ClientPullPreFetch = 1,
    /// Server pushes frames as soon as they are available. Lowest latency.
    ServerPush = 2,
}

/// Axis direction used to describe the world frame.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Forward = 4,
    Backward = 5,
}

/// World axis convention: where the x, y and z axes point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisMapping {
    pub x: Direction,
    pub y: Direction,
    pub z: Direction,
}

impl AxisMapping {
    /// x forward, y left, z up.
    pub const Z_UP: AxisMapping = AxisMapping {
        x: Direction::Forward,
        y: Direction::Left,
        z: Direction::Up,
    };
}

/// Outcome of a single upstream query.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResult {
    Success = 0,
    NotConnected = 1,
    NoFrame = 2,
    InvalidIndex = 3,
    InvalidSubjectName = 4,
    InvalidSegmentName = 5,
    Unknown = 6,
}

impl QueryResult {
    pub fn is_success(self) -> bool {
        self == QueryResult::Success
    }

    /// Map a raw C result code; unrecognised codes become `Unknown`.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => QueryResult::Success,
            1 => QueryResult::NotConnected,
            2 => QueryResult::NoFrame,
            3 => QueryResult::InvalidIndex,
            4 => QueryResult::InvalidSubjectName,
            5 => QueryResult::InvalidSegmentName,
            _ => QueryResult::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_eq(a: [f64; 3], b: [f64; 3]) {
        for i in 0..3 {
            assert!((a[i] - b[i]).abs() < 1e-12, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_identity_rotation_is_noop() {
        let v = [0.3, -1.2, 4.0];
        assert_vec_eq(Quaternion::IDENTITY.rotate(v), v);
    }

    #[test]
    fn test_half_turn_about_x() {
        let q = Quaternion::new(0.0, 1.0, 0.0, 0.0);
        assert_vec_eq(q.rotate([1.0, 0.0, 0.0]), [1.0, 0.0, 0.0]);
        assert_vec_eq(q.rotate([0.0, 1.0, 0.0]), [0.0, -1.0, 0.0]);
        assert_vec_eq(q.rotate([0.0, 0.0, 1.0]), [0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_quarter_turn_about_z() {
        let h = std::f64::consts::FRAC_1_SQRT_2;
        let q = Quaternion::new(h, 0.0, 0.0, h);
        assert_vec_eq(q.rotate([1.0, 0.0, 0.0]), [0.0, 1.0, 0.0]);
        assert!((q.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_version_display() {
        let v = ServerVersion {
            major: 1,
            minor: 12,
            point: 0,
        };
        assert_eq!(v.to_string(), "1.12.0");
    }

    #[test]
    fn test_query_result_from_raw() {
        assert_eq!(QueryResult::from_raw(0), QueryResult::Success);
        assert_eq!(QueryResult::from_raw(2), QueryResult::NoFrame);
        assert_eq!(QueryResult::from_raw(-7), QueryResult::Unknown);
        assert_eq!(QueryResult::from_raw(99), QueryResult::Unknown);
    }

    #[test]
    fn test_point_cloud_rows() {
        let cloud = PointCloud::from(vec![[1.0, 2.0, 3.0]]);
        assert_eq!(cloud.len(), 1);
        assert_eq!(cloud.row(0), Some([1.0, 2.0, 3.0]));
        assert_eq!(cloud.row(1), None);
    }
}
