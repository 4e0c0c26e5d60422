use crate::types::QueryResult;
use std::cell::RefCell;
use std::fmt;

/// Errors that can occur while acquiring data from a capture server.
#[derive(Debug, thiserror::Error)]
pub enum MocapError {
    #[error("Could not connect to {host} after {attempts} attempt(s)")]
    ConnectFailed { host: String, attempts: u32 },

    #[error("No frame available after {attempts} attempt(s), last result {last:?}")]
    FrameUnavailable { attempts: u32, last: QueryResult },

    #[error("Rigid body '{0}' is occluded")]
    Occluded(String),

    #[error("Unknown rigid body '{name}' ({result:?})")]
    UnknownRigidBody { name: String, result: QueryResult },

    #[error("Capture stream stopped")]
    StreamStopped,

    #[error("Timeout waiting for data")]
    Timeout,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to spawn capture thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl MocapError {
    /// True when a single-name lookup failed because the subject is not
    /// observable in the current frame, as opposed to a session fault.
    pub fn is_not_observable(&self) -> bool {
        matches!(
            self,
            MocapError::Occluded(_) | MocapError::UnknownRigidBody { .. }
        )
    }
}

/// Last-error storage for the C FFI layer, one slot per thread.
pub(crate) struct LastError {
    message: RefCell<String>,
}

impl LastError {
    pub const fn new() -> Self {
        Self {
            message: RefCell::new(String::new()),
        }
    }

    pub fn set(&self, err: &MocapError) {
        *self.message.borrow_mut() = fmt::format(format_args!("{}\0", err));
    }

    pub fn clear(&self) {
        self.message.borrow_mut().clear();
    }

    /// Pointer to the NUL-terminated message, valid until the next `set` or `clear`.
    pub fn as_ptr(&self) -> *const std::ffi::c_char {
        let msg = self.message.borrow();
        if msg.is_empty() {
            std::ptr::null()
        } else {
            msg.as_ptr() as *const std::ffi::c_char
        }
    }
}
