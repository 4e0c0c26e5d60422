//! Unit and axis conversions from DataStream values to the crate's types.
//!
//! The server reports translations in millimeters and rotations as
//! `[x, y, z, w]`; consumers get meters and `(w, x, y, z)`.

use crate::types::Quaternion;

pub const MILLIMETERS_PER_METER: f64 = 1000.0;

/// Scale a millimeter translation to meters.
pub fn millimeters_to_meters(mm: [f64; 3]) -> [f64; 3] {
    [
        mm[0] / MILLIMETERS_PER_METER,
        mm[1] / MILLIMETERS_PER_METER,
        mm[2] / MILLIMETERS_PER_METER,
    ]
}

/// Build a quaternion from a raw `[x, y, z, w]` buffer.
pub fn quaternion_from_xyzw(raw: [f64; 4]) -> Quaternion {
    Quaternion::new(raw[3], raw[0], raw[1], raw[2])
}
