use crate::client::DataStreamClient;
use crate::config::{CaptureConfig, RetryPolicy};
use crate::types::{AxisMapping, DataLayers, QueryResult, ServerVersion, StreamMode};
use crate::{MocapError, Result};
use std::time::Instant;

/// A connected and configured DataStream session.
///
/// Owns the client for its whole lifetime and disconnects it on drop.
/// Not internally synchronized: drive it from one thread at a time.
pub struct Session<C: DataStreamClient> {
    client: C,
    layers: DataLayers,
    server_version: ServerVersion,
    version: String,
    frames_received: u64,
}

impl<C: DataStreamClient> Session<C> {
    /// Connect to `config.hostname` and configure the stream.
    ///
    /// With the default retry policy this blocks until the server accepts
    /// the connection.
    pub fn open(mut client: C, config: &CaptureConfig) -> Result<Session<C>> {
        let attempts = connect(&mut client, &config.hostname, &config.connect_retry)?;

        let layers = config.data_layers();
        if layers.contains(DataLayers::SEGMENTS) {
            client.enable_segment_data();
        }
        if layers.contains(DataLayers::UNLABELED_MARKERS) {
            client.enable_unlabeled_marker_data();
        }
        if layers.contains(DataLayers::LABELED_MARKERS) {
            client.enable_marker_data();
        }
        log::debug!("Enabled data layers {:?}", layers);

        client.set_stream_mode(StreamMode::ServerPush);
        client.set_axis_mapping(AxisMapping::Z_UP);

        let server_version = client.version();
        let version = server_version.to_string();

        log::info!(
            "Connected to {} after {} attempt(s): version={} layers={:?}",
            config.hostname,
            attempts,
            version,
            layers
        );

        Ok(Session {
            client,
            layers,
            server_version,
            version,
            frames_received: 0,
        })
    }

    /// Protocol version as "major.minor.point".
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn server_version(&self) -> ServerVersion {
        self.server_version
    }

    pub fn data_layers(&self) -> DataLayers {
        self.layers
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Number of frames made current since the session opened.
    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    /// Advance the client to the next available frame.
    pub fn wait_for_next_frame(&mut self, policy: &RetryPolicy) -> Result<()> {
        let started = Instant::now();
        let mut attempts: u32 = 0;
        loop {
            let result = self.client.get_frame();
            if result.is_success() {
                self.frames_received += 1;
                return Ok(());
            }
            attempts = attempts.saturating_add(1);
            log::trace!("get_frame attempt {} returned {:?}", attempts, result);
            if policy.exhausted(attempts, started) {
                return Err(frame_unavailable(attempts, result));
            }
            policy.pause();
        }
    }
}

impl<C: DataStreamClient> Drop for Session<C> {
    fn drop(&mut self) {
        if self.client.is_connected() {
            log::debug!("Disconnecting DataStream client");
            self.client.disconnect();
        }
    }
}

fn connect<C: DataStreamClient>(client: &mut C, host: &str, policy: &RetryPolicy) -> Result<u32> {
    let started = Instant::now();
    let mut attempts: u32 = 0;
    loop {
        if client.is_connected() {
            return Ok(attempts);
        }
        if attempts > 0 {
            if policy.exhausted(attempts, started) {
                log::warn!("Giving up on {} after {} attempt(s)", host, attempts);
                return Err(MocapError::ConnectFailed {
                    host: host.to_string(),
                    attempts,
                });
            }
            policy.pause();
        }
        attempts = attempts.saturating_add(1);
        log::trace!("Connecting to {} (attempt {})", host, attempts);
        client.connect(host);
    }
}

fn frame_unavailable(attempts: u32, last: QueryResult) -> MocapError {
    log::warn!("No frame after {} attempt(s), last result {:?}", attempts, last);
    MocapError::FrameUnavailable { attempts, last }
}
