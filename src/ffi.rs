//! C FFI layer for vicon-mocap.
//!
//! The host application supplies the DataStream client as a table of C
//! callbacks ([`McClientCallbacks`]); the adapter drives it and hands back
//! normalized data through an opaque [`McCapture`] handle.
//! The generated C header is written to `include/vicon_mocap.h` by cbindgen.

use crate::capture::{MotionCapture, ViconCapture};
use crate::client::{DataStreamClient, SegmentRotation, SegmentTranslation};
use crate::config::{CaptureConfig, RetryPolicy};
use crate::error::LastError;
use crate::types::{AxisMapping, Quaternion, QueryResult, ServerVersion, StreamMode};
use crate::MocapError;
use std::ffi::{c_char, c_int, c_void, CStr, CString};
use std::time::Duration;

thread_local! {
    /// Last error message of the calling thread, for C consumers.
    static LAST_ERROR: LastError = const { LastError::new() };
}

fn set_last_error(e: &MocapError) {
    LAST_ERROR.with(|slot| slot.set(e));
}

/// Capacity of the first buffer passed to name callbacks, including the NUL.
pub const MC_NAME_CAPACITY: usize = 128;

/// DataStream client implemented by the host.
///
/// Every callback receives `user_data` as its first argument. A null
/// callback behaves like a failed or empty query. Result codes follow
/// `QueryResult` (0 = success).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct McClientCallbacks {
    pub user_data: *mut c_void,
    pub connect: Option<unsafe extern "C" fn(*mut c_void, *const c_char) -> bool>,
    pub is_connected: Option<unsafe extern "C" fn(*mut c_void) -> bool>,
    pub disconnect: Option<unsafe extern "C" fn(*mut c_void)>,
    pub enable_segment_data: Option<unsafe extern "C" fn(*mut c_void)>,
    pub enable_unlabeled_marker_data: Option<unsafe extern "C" fn(*mut c_void)>,
    pub enable_marker_data: Option<unsafe extern "C" fn(*mut c_void)>,
    /// Stream mode as `StreamMode`.
    pub set_stream_mode: Option<unsafe extern "C" fn(*mut c_void, c_int)>,
    /// Directions of the x, y and z axes as `Direction`.
    pub set_axis_mapping: Option<unsafe extern "C" fn(*mut c_void, c_int, c_int, c_int)>,
    pub get_version: Option<unsafe extern "C" fn(*mut c_void, *mut u32, *mut u32, *mut u32)>,
    pub get_frame: Option<unsafe extern "C" fn(*mut c_void) -> c_int>,
    pub get_subject_count: Option<unsafe extern "C" fn(*mut c_void) -> usize>,
    /// Write the NUL-terminated name of subject `index` into a buffer of
    /// `capacity` bytes, truncating like `snprintf`, and return the full name
    /// length without the NUL. A length that does not fit is asked for again
    /// with a larger buffer.
    pub get_subject_name:
        Option<unsafe extern "C" fn(*mut c_void, usize, *mut c_char, usize) -> usize>,
    /// Write `occluded` and `[x, y, z]` (mm) for (subject, segment); return a result code.
    pub get_segment_global_translation: Option<
        unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, *mut bool, *mut f64) -> c_int,
    >,
    /// Write `occluded` and `[x, y, z, w]` for (subject, segment); return a result code.
    pub get_segment_global_rotation_quaternion: Option<
        unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, *mut bool, *mut f64) -> c_int,
    >,
    pub get_unlabeled_marker_count: Option<unsafe extern "C" fn(*mut c_void) -> usize>,
    pub get_unlabeled_marker_global_translation:
        Option<unsafe extern "C" fn(*mut c_void, usize, *mut f64)>,
    pub get_labeled_marker_count: Option<unsafe extern "C" fn(*mut c_void) -> usize>,
    pub get_labeled_marker_global_translation:
        Option<unsafe extern "C" fn(*mut c_void, usize, *mut f64)>,
    pub get_latency_sample_count: Option<unsafe extern "C" fn(*mut c_void) -> usize>,
    /// Same contract as `get_subject_name`.
    pub get_latency_sample_name:
        Option<unsafe extern "C" fn(*mut c_void, usize, *mut c_char, usize) -> usize>,
    pub get_latency_sample_value: Option<unsafe extern "C" fn(*mut c_void, *const c_char) -> f64>,
}

/// [`DataStreamClient`] backed by host callbacks.
struct CallbackClient {
    cb: McClientCallbacks,
}

impl CallbackClient {
    fn read_name(
        &self,
        f: Option<unsafe extern "C" fn(*mut c_void, usize, *mut c_char, usize) -> usize>,
        index: usize,
    ) -> String {
        let Some(f) = f else {
            return String::new();
        };
        let mut buf = vec![0 as c_char; MC_NAME_CAPACITY];
        let len = unsafe { f(self.cb.user_data, index, buf.as_mut_ptr(), buf.len()) };
        if len >= buf.len() {
            buf = vec![0 as c_char; len + 1];
            unsafe { f(self.cb.user_data, index, buf.as_mut_ptr(), buf.len()) };
        }
        if let Some(last) = buf.last_mut() {
            *last = 0;
        }
        c_char_to_string(&buf)
    }

    fn count(&self, f: Option<unsafe extern "C" fn(*mut c_void) -> usize>) -> usize {
        f.map_or(0, |f| unsafe { f(self.cb.user_data) })
    }

    fn marker(
        &self,
        f: Option<unsafe extern "C" fn(*mut c_void, usize, *mut f64)>,
        index: usize,
    ) -> [f64; 3] {
        let mut out = [0.0; 3];
        if let Some(f) = f {
            unsafe { f(self.cb.user_data, index, out.as_mut_ptr()) };
        }
        out
    }

    fn notify(&self, f: Option<unsafe extern "C" fn(*mut c_void)>) {
        if let Some(f) = f {
            unsafe { f(self.cb.user_data) };
        }
    }

    /// Call a segment query with NUL-terminated copies of the names.
    fn segment<const N: usize>(
        &self,
        f: Option<
            unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, *mut bool, *mut f64) -> c_int,
        >,
        subject: &str,
        segment: &str,
        out: &mut [f64; N],
    ) -> (QueryResult, bool) {
        let (Some(f), Ok(subject), Ok(segment)) = (f, CString::new(subject), CString::new(segment))
        else {
            return (QueryResult::Unknown, false);
        };
        let mut occluded = false;
        let code = unsafe {
            f(
                self.cb.user_data,
                subject.as_ptr(),
                segment.as_ptr(),
                &mut occluded,
                out.as_mut_ptr(),
            )
        };
        (QueryResult::from_raw(code), occluded)
    }
}

impl DataStreamClient for CallbackClient {
    fn connect(&mut self, host: &str) -> bool {
        match (self.cb.connect, CString::new(host)) {
            (Some(f), Ok(host)) => unsafe { f(self.cb.user_data, host.as_ptr()) },
            _ => false,
        }
    }

    fn is_connected(&self) -> bool {
        self.cb
            .is_connected
            .is_some_and(|f| unsafe { f(self.cb.user_data) })
    }

    fn disconnect(&mut self) {
        self.notify(self.cb.disconnect);
    }

    fn enable_segment_data(&mut self) {
        self.notify(self.cb.enable_segment_data);
    }

    fn enable_unlabeled_marker_data(&mut self) {
        self.notify(self.cb.enable_unlabeled_marker_data);
    }

    fn enable_marker_data(&mut self) {
        self.notify(self.cb.enable_marker_data);
    }

    fn set_stream_mode(&mut self, mode: StreamMode) {
        if let Some(f) = self.cb.set_stream_mode {
            unsafe { f(self.cb.user_data, mode as c_int) };
        }
    }

    fn set_axis_mapping(&mut self, mapping: AxisMapping) {
        if let Some(f) = self.cb.set_axis_mapping {
            unsafe {
                f(
                    self.cb.user_data,
                    mapping.x as c_int,
                    mapping.y as c_int,
                    mapping.z as c_int,
                )
            };
        }
    }

    fn version(&self) -> ServerVersion {
        let mut v = ServerVersion::default();
        if let Some(f) = self.cb.get_version {
            unsafe { f(self.cb.user_data, &mut v.major, &mut v.minor, &mut v.point) };
        }
        v
    }

    fn get_frame(&mut self) -> QueryResult {
        match self.cb.get_frame {
            Some(f) => QueryResult::from_raw(unsafe { f(self.cb.user_data) }),
            None => QueryResult::Unknown,
        }
    }

    fn subject_count(&self) -> usize {
        self.count(self.cb.get_subject_count)
    }

    fn subject_name(&self, index: usize) -> String {
        self.read_name(self.cb.get_subject_name, index)
    }

    fn segment_global_translation(&self, subject: &str, segment: &str) -> SegmentTranslation {
        let mut translation = [0.0; 3];
        let (result, occluded) = self.segment(
            self.cb.get_segment_global_translation,
            subject,
            segment,
            &mut translation,
        );
        SegmentTranslation {
            result,
            occluded,
            translation,
        }
    }

    fn segment_global_rotation_quaternion(&self, subject: &str, segment: &str) -> SegmentRotation {
        let mut rotation = [0.0, 0.0, 0.0, 1.0];
        let (result, occluded) = self.segment(
            self.cb.get_segment_global_rotation_quaternion,
            subject,
            segment,
            &mut rotation,
        );
        SegmentRotation {
            result,
            occluded,
            rotation,
        }
    }

    fn unlabeled_marker_count(&self) -> usize {
        self.count(self.cb.get_unlabeled_marker_count)
    }

    fn unlabeled_marker_global_translation(&self, index: usize) -> [f64; 3] {
        self.marker(self.cb.get_unlabeled_marker_global_translation, index)
    }

    fn labeled_marker_count(&self) -> usize {
        self.count(self.cb.get_labeled_marker_count)
    }

    fn labeled_marker_global_translation(&self, index: usize) -> [f64; 3] {
        self.marker(self.cb.get_labeled_marker_global_translation, index)
    }

    fn latency_sample_count(&self) -> usize {
        self.count(self.cb.get_latency_sample_count)
    }

    fn latency_sample_name(&self, index: usize) -> String {
        self.read_name(self.cb.get_latency_sample_name, index)
    }

    fn latency_sample_value(&self, name: &str) -> f64 {
        match (self.cb.get_latency_sample_value, CString::new(name)) {
            (Some(f), Ok(name)) => unsafe { f(self.cb.user_data, name.as_ptr()) },
            _ => 0.0,
        }
    }
}

/// Opaque capture handle for C consumers.
pub struct McCapture {
    capture: ViconCapture<CallbackClient>,
    version: CString,
}

/// Rigid body in C-compatible layout.
#[repr(C)]
pub struct McRigidBody {
    /// Null-terminated subject name (truncated to 63 bytes at a character boundary).
    pub name: [c_char; 64],
    /// Position [x, y, z] in meters.
    pub position: [f64; 3],
    /// Orientation (w, x, y, z).
    pub orientation: Quaternion,
}

/// Latency sample in C-compatible layout.
#[repr(C)]
pub struct McLatencySample {
    /// Null-terminated sample name (truncated to 63 bytes at a character boundary).
    pub name: [c_char; 64],
    /// Latency in seconds.
    pub value: f64,
}

fn str_to_fixed<const N: usize>(s: &str) -> [c_char; N] {
    let mut buf = [0 as c_char; N];
    let mut len = s.len().min(N - 1);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    for (i, &b) in s.as_bytes()[..len].iter().enumerate() {
        buf[i] = b as c_char;
    }
    buf
}

fn c_char_to_string(buf: &[c_char]) -> String {
    let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    let bytes: Vec<u8> = buf[..end].iter().map(|&c| c as u8).collect();
    String::from_utf8_lossy(&bytes).to_string()
}

unsafe fn str_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str, MocapError> {
    if ptr.is_null() {
        return Err(MocapError::InvalidArgument(format!("{} is null", what)));
    }
    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|_| MocapError::InvalidArgument(format!("{} is not valid UTF-8", what)))
}

fn fail(e: MocapError) -> c_int {
    set_last_error(&e);
    -1
}

/// Connect to `hostname` through the host's client and configure the stream.
///
/// `max_connect_attempts` = 0 retries forever.
/// Returns NULL on error (check `mc_last_error()`).
///
/// # Safety
/// `callbacks` must point to a valid `McClientCallbacks` whose callbacks
/// stay valid until `mc_destroy`; `hostname` must be a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn mc_create(
    callbacks: *const McClientCallbacks,
    hostname: *const c_char,
    enable_objects: bool,
    enable_pointcloud: bool,
    add_labeled_markers_to_pointcloud: bool,
    max_connect_attempts: u32,
) -> *mut McCapture {
    if callbacks.is_null() {
        set_last_error(&MocapError::InvalidArgument("callbacks is null".into()));
        return std::ptr::null_mut();
    }
    let hostname = match str_arg(hostname, "hostname") {
        Ok(h) => h,
        Err(e) => {
            set_last_error(&e);
            return std::ptr::null_mut();
        }
    };

    let mut config = CaptureConfig::new(hostname)
        .objects(enable_objects)
        .pointcloud(enable_pointcloud)
        .labeled_markers_in_pointcloud(add_labeled_markers_to_pointcloud);
    if max_connect_attempts > 0 {
        config = config.connect_retry(RetryPolicy::attempts(max_connect_attempts));
    }

    let client = CallbackClient { cb: *callbacks };
    match ViconCapture::with_config(client, &config) {
        Ok(capture) => {
            let version = CString::new(capture.version()).unwrap_or_default();
            LAST_ERROR.with(|slot| slot.clear());
            Box::into_raw(Box::new(McCapture { capture, version }))
        }
        Err(e) => {
            set_last_error(&e);
            std::ptr::null_mut()
        }
    }
}

/// Disconnect and free a capture handle.
///
/// # Safety
/// `cap` must be a pointer returned by `mc_create`, or null.
#[no_mangle]
pub unsafe extern "C" fn mc_destroy(cap: *mut McCapture) {
    if !cap.is_null() {
        drop(Box::from_raw(cap));
    }
}

/// Server protocol version "major.minor.point", valid for the lifetime of the handle.
///
/// # Safety
/// `cap` must be a valid capture pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mc_version(cap: *const McCapture) -> *const c_char {
    if cap.is_null() {
        return std::ptr::null();
    }
    (*cap).version.as_ptr()
}

/// Wait for the next frame.
/// `timeout_ms`: -1 blocks until a frame arrives, otherwise gives up after that long.
/// Returns 0 on success, -1 on error/timeout.
///
/// # Safety
/// `cap` must be a valid capture pointer, or null.
#[no_mangle]
pub unsafe extern "C" fn mc_wait_for_next_frame(cap: *mut McCapture, timeout_ms: c_int) -> c_int {
    if cap.is_null() {
        return -1;
    }
    let cap = &mut *cap;
    let policy = if timeout_ms < 0 {
        RetryPolicy::forever()
    } else {
        RetryPolicy::forever().with_timeout(Duration::from_millis(timeout_ms as u64))
    };
    match cap.capture.wait_for_next_frame_with(&policy) {
        Ok(()) => 0,
        Err(e) => fail(e),
    }
}

/// Write up to `max` visible rigid bodies, sorted by name, into `out`.
/// Returns the total number of visible rigid bodies, or -1 on error.
///
/// # Safety
/// `out` must point to at least `max` `McRigidBody` elements, or be null.
#[no_mangle]
pub unsafe extern "C" fn mc_rigid_bodies(
    cap: *const McCapture,
    out: *mut McRigidBody,
    max: c_int,
) -> c_int {
    if cap.is_null() {
        return -1;
    }
    let mut bodies: Vec<_> = (*cap).capture.rigid_bodies().into_values().collect();
    bodies.sort_by(|a, b| a.name().cmp(b.name()));
    if !out.is_null() {
        for (i, body) in bodies.iter().take(max.max(0) as usize).enumerate() {
            out.add(i).write(McRigidBody {
                name: str_to_fixed(body.name()),
                position: body.position(),
                orientation: body.orientation(),
            });
        }
    }
    bodies.len() as c_int
}

/// Look up one rigid body.
/// Returns 0 on success, 1 if it is occluded or unknown in this frame, -1 on error.
///
/// # Safety
/// `name` must be a NUL-terminated string; `out` must be a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn mc_rigid_body_by_name(
    cap: *const McCapture,
    name: *const c_char,
    out: *mut McRigidBody,
) -> c_int {
    if cap.is_null() || out.is_null() {
        return -1;
    }
    let name = match str_arg(name, "name") {
        Ok(n) => n,
        Err(e) => return fail(e),
    };
    match (*cap).capture.rigid_body_by_name(name) {
        Ok(body) => {
            out.write(McRigidBody {
                name: str_to_fixed(body.name()),
                position: body.position(),
                orientation: body.orientation(),
            });
            0
        }
        Err(e) if e.is_not_observable() => {
            set_last_error(&e);
            1
        }
        Err(e) => fail(e),
    }
}

/// Write up to `max` points as packed `[x, y, z]` triples (meters) into `out`.
/// Returns the total number of points, or -1 on error.
///
/// # Safety
/// `out` must point to at least `3 * max` doubles, or be null.
#[no_mangle]
pub unsafe extern "C" fn mc_point_cloud(cap: *const McCapture, out: *mut f64, max: c_int) -> c_int {
    if cap.is_null() {
        return -1;
    }
    let cloud = (*cap).capture.point_cloud();
    if !out.is_null() {
        for (i, p) in cloud.points().iter().take(max.max(0) as usize).enumerate() {
            std::ptr::copy_nonoverlapping(p.as_ptr(), out.add(3 * i), 3);
        }
    }
    cloud.len() as c_int
}

/// Write up to `max` latency samples into `out`, in server order.
/// Returns the total number of samples, or -1 on error.
///
/// # Safety
/// `out` must point to at least `max` `McLatencySample` elements, or be null.
#[no_mangle]
pub unsafe extern "C" fn mc_latency(
    cap: *const McCapture,
    out: *mut McLatencySample,
    max: c_int,
) -> c_int {
    if cap.is_null() {
        return -1;
    }
    let samples = (*cap).capture.latency();
    if !out.is_null() {
        for (i, s) in samples.iter().take(max.max(0) as usize).enumerate() {
            out.add(i).write(McLatencySample {
                name: str_to_fixed(&s.name),
                value: s.value,
            });
        }
    }
    samples.len() as c_int
}

/// Get the calling thread's last error message. Returns NULL if no error.
/// The returned pointer is valid until the next vicon-mocap API call on that thread.
#[no_mangle]
pub extern "C" fn mc_last_error() -> *const c_char {
    LAST_ERROR.with(|slot| slot.as_ptr())
}
