use crate::client::{DataStreamClient, SegmentRotation, SegmentTranslation};
use crate::config::{CaptureConfig, RetryPolicy};
use crate::convert::{millimeters_to_meters, quaternion_from_xyzw};
use crate::session::Session;
use crate::types::{DataLayers, LatencySample, PointCloud, RigidBodies, RigidBody};
use crate::{MocapError, Result};

/// Everything extracted from one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSnapshot {
    /// Sequence number of the frame since the session opened, starting at 1.
    pub frame: u64,
    pub rigid_bodies: RigidBodies,
    pub point_cloud: PointCloud,
    pub latency: Vec<LatencySample>,
}

/// Engine-agnostic view of a motion capture system.
///
/// Extraction methods read the frame made current by the most recent
/// successful [`wait_for_next_frame`](MotionCapture::wait_for_next_frame).
/// Each call returns freshly built values.
pub trait MotionCapture {
    fn version(&self) -> &str;

    /// Block until the next frame is current.
    fn wait_for_next_frame(&mut self) -> Result<()>;

    /// All rigid bodies that are tracked and not occluded.
    fn rigid_bodies(&self) -> RigidBodies;

    /// Look up one rigid body. Fails if it is not observable in this frame.
    fn rigid_body_by_name(&self, name: &str) -> Result<RigidBody>;

    fn point_cloud(&self) -> PointCloud;

    fn latency(&self) -> Vec<LatencySample>;

    /// Number of the current frame, 0 before the first one.
    fn frame_number(&self) -> u64;

    fn supports_rigid_body_tracking(&self) -> bool {
        false
    }

    fn supports_point_cloud(&self) -> bool {
        false
    }

    fn supports_latency_estimate(&self) -> bool {
        false
    }

    /// Collect the supported views of the current frame.
    fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            frame: self.frame_number(),
            rigid_bodies: if self.supports_rigid_body_tracking() {
                self.rigid_bodies()
            } else {
                RigidBodies::new()
            },
            point_cloud: if self.supports_point_cloud() {
                self.point_cloud()
            } else {
                PointCloud::default()
            },
            latency: if self.supports_latency_estimate() {
                self.latency()
            } else {
                Vec::new()
            },
        }
    }
}

/// Motion capture adapter over a Vicon DataStream client.
pub struct ViconCapture<C: DataStreamClient> {
    session: Session<C>,
    frame_retry: RetryPolicy,
}

impl<C: DataStreamClient> ViconCapture<C> {
    /// Connect and configure with retry-forever policies.
    ///
    /// Blocks until `hostname` accepts the connection.
    pub fn create(
        client: C,
        hostname: &str,
        enable_objects: bool,
        enable_pointcloud: bool,
        add_labeled_markers_to_pointcloud: bool,
    ) -> Result<Self> {
        let config = CaptureConfig::new(hostname)
            .objects(enable_objects)
            .pointcloud(enable_pointcloud)
            .labeled_markers_in_pointcloud(add_labeled_markers_to_pointcloud);
        Self::with_config(client, &config)
    }

    pub fn with_config(client: C, config: &CaptureConfig) -> Result<Self> {
        let session = Session::open(client, config)?;
        Ok(Self {
            session,
            frame_retry: config.frame_retry,
        })
    }

    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// Wait for the next frame with a policy other than the configured one.
    pub fn wait_for_next_frame_with(&mut self, policy: &RetryPolicy) -> Result<()> {
        self.session.wait_for_next_frame(policy)
    }

    fn labeled_in_pointcloud(&self) -> bool {
        self.session
            .data_layers()
            .contains(DataLayers::LABELED_MARKERS)
    }

    /// Query and convert the root segment of `name`.
    fn observe(&self, name: &str) -> Result<RigidBody> {
        let client = self.session.client();
        let translation = client.segment_global_translation(name, name);
        let rotation = client.segment_global_rotation_quaternion(name, name);
        to_rigid_body(name, &translation, &rotation)
    }
}

fn to_rigid_body(
    name: &str,
    translation: &SegmentTranslation,
    rotation: &SegmentRotation,
) -> Result<RigidBody> {
    for result in [translation.result, rotation.result] {
        if !result.is_success() {
            return Err(MocapError::UnknownRigidBody {
                name: name.to_string(),
                result,
            });
        }
    }
    if translation.occluded || rotation.occluded {
        return Err(MocapError::Occluded(name.to_string()));
    }
    Ok(RigidBody::new(
        name,
        millimeters_to_meters(translation.translation),
        quaternion_from_xyzw(rotation.rotation),
    ))
}

impl<C: DataStreamClient> MotionCapture for ViconCapture<C> {
    fn version(&self) -> &str {
        self.session.version()
    }

    fn wait_for_next_frame(&mut self) -> Result<()> {
        let policy = self.frame_retry;
        self.session.wait_for_next_frame(&policy)
    }

    fn rigid_bodies(&self) -> RigidBodies {
        let client = self.session.client();
        let count = client.subject_count();
        let mut bodies = RigidBodies::with_capacity(count);
        for i in 0..count {
            let name = client.subject_name(i);
            match self.observe(&name) {
                Ok(body) => {
                    bodies.insert(name, body);
                }
                Err(e) => log::trace!("Skipping subject {}: {}", i, e),
            }
        }
        bodies
    }

    fn rigid_body_by_name(&self, name: &str) -> Result<RigidBody> {
        self.observe(name)
    }

    fn point_cloud(&self) -> PointCloud {
        let client = self.session.client();
        let unlabeled = client.unlabeled_marker_count();
        let labeled = if self.labeled_in_pointcloud() {
            client.labeled_marker_count()
        } else {
            0
        };

        let mut cloud = PointCloud::with_capacity(unlabeled + labeled);
        for i in 0..unlabeled {
            cloud.push(millimeters_to_meters(
                client.unlabeled_marker_global_translation(i),
            ));
        }
        for i in 0..labeled {
            cloud.push(millimeters_to_meters(
                client.labeled_marker_global_translation(i),
            ));
        }
        cloud
    }

    fn latency(&self) -> Vec<LatencySample> {
        let client = self.session.client();
        (0..client.latency_sample_count())
            .map(|i| {
                let name = client.latency_sample_name(i);
                let value = client.latency_sample_value(&name);
                LatencySample { name, value }
            })
            .collect()
    }

    fn frame_number(&self) -> u64 {
        self.session.frames_received()
    }

    fn supports_rigid_body_tracking(&self) -> bool {
        self.session.data_layers().contains(DataLayers::SEGMENTS)
    }

    fn supports_point_cloud(&self) -> bool {
        self.session
            .data_layers()
            .contains(DataLayers::UNLABELED_MARKERS)
    }

    fn supports_latency_estimate(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimFrame, SimSubject, SimulatedClient};
    use crate::types::{Quaternion, QueryResult};

    const IDENTITY_XYZW: [f64; 4] = [0.0, 0.0, 0.0, 1.0];

    fn capture_with(
        frames: Vec<SimFrame>,
        pointcloud: bool,
        labeled: bool,
    ) -> ViconCapture<SimulatedClient> {
        let mut capture =
            ViconCapture::create(SimulatedClient::new(frames), "localhost:801", true, pointcloud, labeled)
                .unwrap();
        capture.wait_for_next_frame().unwrap();
        capture
    }

    fn marker_frame() -> SimFrame {
        SimFrame::new()
            .unlabeled([1000.0, 0.0, 0.0])
            .unlabeled([0.0, 2000.0, 0.0])
            .unlabeled([0.0, 0.0, 3000.0])
            .labeled([-1000.0, 0.0, 0.0])
            .labeled([0.0, -500.0, 0.0])
    }

    #[test]
    fn test_rigid_body_conversion() {
        let frame = SimFrame::new().subject(SimSubject::new(
            "cf1",
            [1234.0, -500.0, 250.0],
            [1.0, 0.0, 0.0, 0.0],
        ));
        let capture = capture_with(vec![frame], false, false);

        let bodies = capture.rigid_bodies();
        assert_eq!(bodies.len(), 1);
        let body = &bodies["cf1"];
        assert_eq!(body.name(), "cf1");
        assert_eq!(body.position(), [1.234, -0.5, 0.25]);
        assert_eq!(body.orientation(), Quaternion::new(0.0, 1.0, 0.0, 0.0));
    }

    #[test]
    fn test_occluded_subjects_are_omitted() {
        let frame = SimFrame::new()
            .subject(SimSubject::new("visible", [1.0, 2.0, 3.0], IDENTITY_XYZW))
            .subject(SimSubject::new("t_occluded", [1.0, 2.0, 3.0], IDENTITY_XYZW).translation_occluded())
            .subject(SimSubject::new("r_occluded", [1.0, 2.0, 3.0], IDENTITY_XYZW).rotation_occluded())
            .subject(
                SimSubject::new("t_failed", [1.0, 2.0, 3.0], IDENTITY_XYZW)
                    .translation_result(QueryResult::Unknown),
            )
            .subject(
                SimSubject::new("r_failed", [1.0, 2.0, 3.0], IDENTITY_XYZW)
                    .rotation_result(QueryResult::InvalidSegmentName),
            );
        let capture = capture_with(vec![frame], false, false);

        let bodies = capture.rigid_bodies();
        assert_eq!(bodies.keys().collect::<Vec<_>>(), ["visible"]);

        for name in ["t_occluded", "r_occluded"] {
            match capture.rigid_body_by_name(name) {
                Err(MocapError::Occluded(n)) => assert_eq!(n, name),
                other => panic!("{}: unexpected {:?}", name, other),
            }
        }
        for name in ["t_failed", "r_failed"] {
            let err = capture.rigid_body_by_name(name).unwrap_err();
            assert!(matches!(err, MocapError::UnknownRigidBody { .. }));
            assert!(err.is_not_observable());
        }
    }

    #[test]
    fn test_lookup_of_absent_subject() {
        let capture = capture_with(vec![SimFrame::new()], false, false);
        match capture.rigid_body_by_name("ghost") {
            Err(MocapError::UnknownRigidBody { name, result }) => {
                assert_eq!(name, "ghost");
                assert_eq!(result, QueryResult::InvalidSubjectName);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lookup_matches_bulk_view() {
        let frame = SimFrame::new()
            .subject(SimSubject::new("a", [10.0, 20.0, 30.0], [0.0, 0.0, 0.6, 0.8]));
        let capture = capture_with(vec![frame], false, false);
        assert_eq!(capture.rigid_body_by_name("a").unwrap(), capture.rigid_bodies()["a"]);
    }

    #[test]
    fn test_rebuild_is_idempotent_within_frame() {
        let frame = SimFrame::new()
            .subject(SimSubject::new("a", [1.0, 0.0, 0.0], IDENTITY_XYZW))
            .subject(SimSubject::new("b", [0.0, 1.0, 0.0], IDENTITY_XYZW));
        let capture = capture_with(vec![frame], false, false);
        assert_eq!(capture.rigid_bodies(), capture.rigid_bodies());
        assert_eq!(capture.rigid_bodies().len(), 2);
    }

    #[test]
    fn test_collection_tracks_current_frame() {
        let frames = vec![
            SimFrame::new()
                .subject(SimSubject::new("a", [1.0, 0.0, 0.0], IDENTITY_XYZW))
                .subject(SimSubject::new("b", [0.0, 1.0, 0.0], IDENTITY_XYZW)),
            SimFrame::new()
                .subject(SimSubject::new("a", [2.0, 0.0, 0.0], IDENTITY_XYZW))
                .subject(SimSubject::new("b", [0.0, 1.0, 0.0], IDENTITY_XYZW).translation_occluded()),
        ];
        let mut capture = capture_with(frames, false, false);
        assert_eq!(capture.rigid_bodies().len(), 2);

        capture.wait_for_next_frame().unwrap();
        let bodies = capture.rigid_bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies["a"].position(), [0.002, 0.0, 0.0]);
        assert_eq!(capture.frame_number(), 2);
    }

    #[test]
    fn test_duplicate_names_collapse_to_one_entry() {
        let frame = SimFrame::new()
            .subject(SimSubject::new("dup", [1000.0, 0.0, 0.0], IDENTITY_XYZW))
            .subject(SimSubject::new("dup", [2000.0, 0.0, 0.0], IDENTITY_XYZW));
        let capture = capture_with(vec![frame], false, false);
        // Both entries resolve by name to the same segment data.
        let bodies = capture.rigid_bodies();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies["dup"].position(), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_point_cloud_without_labeled_markers() {
        let capture = capture_with(vec![marker_frame()], true, false);
        let cloud = capture.point_cloud();
        assert_eq!(cloud.len(), 3);
        assert_eq!(cloud.points(), &[[1.0, 0.0, 0.0], [0.0, 2.0, 0.0], [0.0, 0.0, 3.0]]);
    }

    #[test]
    fn test_point_cloud_appends_labeled_markers() {
        let capture = capture_with(vec![marker_frame()], true, true);
        let cloud = capture.point_cloud();
        assert_eq!(cloud.len(), 5);
        assert_eq!(cloud.row(0), Some([1.0, 0.0, 0.0]));
        assert_eq!(cloud.row(2), Some([0.0, 0.0, 3.0]));
        assert_eq!(cloud.row(3), Some([-1.0, 0.0, 0.0]));
        assert_eq!(cloud.row(4), Some([0.0, -0.5, 0.0]));
    }

    #[test]
    fn test_point_cloud_shrinks_with_frame() {
        let frames = vec![marker_frame(), SimFrame::new().unlabeled([5.0, 5.0, 5.0])];
        let mut capture = capture_with(frames, true, true);
        assert_eq!(capture.point_cloud().len(), 5);
        capture.wait_for_next_frame().unwrap();
        assert_eq!(capture.point_cloud().points(), &[[0.005, 0.005, 0.005]]);
    }

    #[test]
    fn test_labeled_flag_needs_pointcloud() {
        let capture = capture_with(vec![marker_frame()], false, true);
        assert!(!capture.supports_point_cloud());
        assert!(capture.point_cloud().is_empty());
    }

    #[test]
    fn test_latency_in_enumeration_order() {
        let frame = SimFrame::new().latency("a", 0.001).latency("b", 0.002);
        let capture = capture_with(vec![frame], false, false);
        assert_eq!(
            capture.latency(),
            vec![LatencySample::new("a", 0.001), LatencySample::new("b", 0.002)]
        );
    }

    #[test]
    fn test_empty_frame() {
        let capture = capture_with(vec![SimFrame::new()], true, true);
        assert!(capture.rigid_bodies().is_empty());
        assert!(capture.point_cloud().is_empty());
        assert!(capture.latency().is_empty());
    }

    #[test]
    fn test_snapshot_honors_capabilities() {
        let frame = marker_frame()
            .subject(SimSubject::new("a", [0.0; 3], IDENTITY_XYZW))
            .latency("Tracker Time", 0.004);

        let capture = capture_with(vec![frame.clone()], false, false);
        let snapshot = capture.snapshot();
        assert_eq!(snapshot.frame, 1);
        assert_eq!(snapshot.rigid_bodies.len(), 1);
        assert!(snapshot.point_cloud.is_empty());
        assert_eq!(snapshot.latency.len(), 1);

        let capture = capture_with(vec![frame], true, true);
        assert_eq!(capture.snapshot().point_cloud.len(), 5);
    }

    #[test]
    fn test_version_and_capabilities() {
        let client = SimulatedClient::new(vec![]).with_version(1, 12, 0);
        let capture = ViconCapture::create(client, "h", false, true, false).unwrap();
        assert_eq!(capture.version(), "1.12.0");
        assert!(!capture.supports_rigid_body_tracking());
        assert!(capture.supports_point_cloud());
        assert!(capture.supports_latency_estimate());
        assert_eq!(capture.frame_number(), 0);
    }
}
