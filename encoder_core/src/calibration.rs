//! Degree arithmetic for null-angle calibration.
//!
//! Raw sensor angles live in `[0, 360)`; calibrated joint angles are the
//! shortest signed distance from the null angle, in `[-180, 180)`, with the
//! sign fixed by the mounting direction.

/// Wrap any angle into `[-180, 180)`.
#[inline]
pub fn wrap_degrees(deg: f32) -> f32 {
    normalize_degrees(deg + 180.0) - 180.0
}

/// Wrap any angle into `[0, 360)`.
#[inline]
pub fn normalize_degrees(deg: f32) -> f32 {
    let d = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs.
    if d >= 360.0 { 0.0 } else { d }
}

/// Place `deg` on the same turn as `reference` (within +-180 of it).
#[inline]
pub fn unwrap_near(reference: f32, deg: f32) -> f32 {
    reference + wrap_degrees(deg - reference)
}

/// `raw - null`, negated for counter-clockwise mounting.
///
/// The difference is wrapped into `[-180, 180)`, so it departs from plain
/// `raw - null` once that exceeds 180 degrees: raw 5 against null 355 is 10,
/// not -350.
#[inline]
pub fn calibrated_angle(raw_deg: f32, null_deg: f32, clockwise: bool) -> f32 {
    let delta = wrap_degrees(raw_deg - null_deg);
    if clockwise { delta } else { -delta }
}
