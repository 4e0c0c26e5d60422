use crate::types::DataLayers;
use std::time::{Duration, Instant};

/// How long a blocking wait (connect, next frame) keeps retrying.
///
/// The default retries forever with no delay. Exhaustion is only checked
/// after a failed attempt, so every policy makes at least one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub max_attempts: Option<u32>,
    pub timeout: Option<Duration>,
    /// Sleep between failed attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn forever() -> Self {
        Self {
            max_attempts: None,
            timeout: None,
            delay: Duration::ZERO,
        }
    }

    pub const fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            timeout: None,
            delay: Duration::ZERO,
        }
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some() || self.timeout.is_some()
    }

    /// Whether the wait should give up after `attempts` failures.
    pub fn exhausted(&self, attempts: u32, started: Instant) -> bool {
        if let Some(max) = self.max_attempts {
            if attempts >= max {
                return true;
            }
        }
        if let Some(timeout) = self.timeout {
            if started.elapsed() >= timeout {
                return true;
            }
        }
        false
    }

    /// Sleep for the configured delay, if any.
    pub(crate) fn pause(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

/// Construction-time settings for a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Server address, "host" or "host:port".
    pub hostname: String,
    /// Stream segment data for rigid body extraction.
    pub enable_objects: bool,
    /// Stream unlabeled markers for the point cloud.
    pub enable_pointcloud: bool,
    /// Append labeled markers to the point cloud. Needs `enable_pointcloud`.
    pub add_labeled_markers_to_pointcloud: bool,
    pub connect_retry: RetryPolicy,
    pub frame_retry: RetryPolicy,
}

pub const DEFAULT_HOSTNAME: &str = "localhost:801";

impl CaptureConfig {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            enable_objects: true,
            enable_pointcloud: false,
            add_labeled_markers_to_pointcloud: false,
            connect_retry: RetryPolicy::forever(),
            frame_retry: RetryPolicy::forever(),
        }
    }

    pub fn objects(mut self, enable: bool) -> Self {
        self.enable_objects = enable;
        self
    }

    pub fn pointcloud(mut self, enable: bool) -> Self {
        self.enable_pointcloud = enable;
        self
    }

    pub fn labeled_markers_in_pointcloud(mut self, enable: bool) -> Self {
        self.add_labeled_markers_to_pointcloud = enable;
        self
    }

    pub fn connect_retry(mut self, policy: RetryPolicy) -> Self {
        self.connect_retry = policy;
        self
    }

    pub fn frame_retry(mut self, policy: RetryPolicy) -> Self {
        self.frame_retry = policy;
        self
    }

    /// Layers the session will enable on the server.
    pub fn data_layers(&self) -> DataLayers {
        let mut layers = DataLayers::empty();
        if self.enable_objects {
            layers |= DataLayers::SEGMENTS;
        }
        if self.enable_pointcloud {
            layers |= DataLayers::UNLABELED_MARKERS;
            if self.add_labeled_markers_to_pointcloud {
                layers |= DataLayers::LABELED_MARKERS;
            }
        }
        layers
    }

    /// Read the configuration from `MOCAP_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from a variable lookup function.
    ///
    /// Unparsable values are logged and replaced by their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let hostname = read_string(&lookup, "MOCAP_HOSTNAME", DEFAULT_HOSTNAME);
        let retry_delay = Duration::from_millis(read_u64(&lookup, "MOCAP_RETRY_DELAY_MS", 0));

        let mut connect_retry = RetryPolicy::forever().with_delay(retry_delay);
        // 0 keeps retrying forever.
        if let Some(attempts) = read_opt_u64(&lookup, "MOCAP_CONNECT_ATTEMPTS").filter(|&n| n > 0) {
            connect_retry.max_attempts = Some(attempts.min(u32::MAX as u64) as u32);
        }
        if let Some(ms) = read_opt_u64(&lookup, "MOCAP_CONNECT_TIMEOUT_MS") {
            connect_retry.timeout = Some(Duration::from_millis(ms));
        }

        let mut frame_retry = RetryPolicy::forever().with_delay(retry_delay);
        if let Some(ms) = read_opt_u64(&lookup, "MOCAP_FRAME_TIMEOUT_MS") {
            frame_retry.timeout = Some(Duration::from_millis(ms));
        }

        Self {
            hostname,
            enable_objects: read_bool(&lookup, "MOCAP_ENABLE_OBJECTS", true),
            enable_pointcloud: read_bool(&lookup, "MOCAP_ENABLE_POINTCLOUD", false),
            add_labeled_markers_to_pointcloud: read_bool(
                &lookup,
                "MOCAP_ADD_LABELED_MARKERS",
                false,
            ),
            connect_retry,
            frame_retry,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOSTNAME)
    }
}

fn read_bool<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str, default: bool) -> bool {
    match lookup(name) {
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                log::warn!("Invalid {}='{}', using default {}", name, v, default);
                default
            }
        },
        None => default,
    }
}

fn read_opt_u64<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str) -> Option<u64> {
    let v = lookup(name)?;
    match v.trim().parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!("Invalid {}='{}', ignoring", name, v);
            None
        }
    }
}

fn read_u64<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str, default: u64) -> u64 {
    read_opt_u64(lookup, name).unwrap_or(default)
}

fn read_string<F: Fn(&str) -> Option<String>>(lookup: &F, name: &str, default: &str) -> String {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_retry_forever() {
        let config = CaptureConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.hostname, DEFAULT_HOSTNAME);
        assert!(config.enable_objects);
        assert!(!config.enable_pointcloud);
        assert!(!config.connect_retry.is_bounded());
        assert!(!config.frame_retry.is_bounded());
    }

    #[test]
    fn test_env_overrides() {
        let config = CaptureConfig::from_lookup(lookup_from(&[
            ("MOCAP_HOSTNAME", "vicon.lab:801"),
            ("MOCAP_ENABLE_OBJECTS", "0"),
            ("MOCAP_ENABLE_POINTCLOUD", "yes"),
            ("MOCAP_ADD_LABELED_MARKERS", "true"),
            ("MOCAP_CONNECT_ATTEMPTS", "25"),
            ("MOCAP_FRAME_TIMEOUT_MS", "500"),
            ("MOCAP_RETRY_DELAY_MS", "10"),
        ]));
        assert_eq!(config.hostname, "vicon.lab:801");
        assert!(!config.enable_objects);
        assert!(config.enable_pointcloud);
        assert!(config.add_labeled_markers_to_pointcloud);
        assert_eq!(config.connect_retry.max_attempts, Some(25));
        assert_eq!(config.connect_retry.delay, Duration::from_millis(10));
        assert_eq!(config.frame_retry.timeout, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = CaptureConfig::from_lookup(lookup_from(&[
            ("MOCAP_HOSTNAME", "  "),
            ("MOCAP_ENABLE_OBJECTS", "maybe"),
            ("MOCAP_CONNECT_ATTEMPTS", "-3"),
        ]));
        assert_eq!(config.hostname, DEFAULT_HOSTNAME);
        assert!(config.enable_objects);
        assert_eq!(config.connect_retry.max_attempts, None);
    }

    #[test]
    fn test_labeled_markers_need_pointcloud() {
        let config = CaptureConfig::new("h").labeled_markers_in_pointcloud(true);
        assert_eq!(config.data_layers(), DataLayers::SEGMENTS);

        let config = config.pointcloud(true).objects(false);
        assert_eq!(
            config.data_layers(),
            DataLayers::UNLABELED_MARKERS | DataLayers::LABELED_MARKERS
        );
    }

    #[test]
    fn test_retry_policy_exhaustion() {
        let started = Instant::now();
        assert!(!RetryPolicy::forever().exhausted(u32::MAX, started));

        let policy = RetryPolicy::attempts(3);
        assert!(!policy.exhausted(2, started));
        assert!(policy.exhausted(3, started));

        let policy = RetryPolicy::forever().with_timeout(Duration::ZERO);
        assert!(policy.exhausted(0, started));
    }
}
