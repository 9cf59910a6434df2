//! AS5048B register map and the pure conversions around it.
//!
//! Kept free of any bus access so both the `rppal` backend and the simulator
//! encode angles and addresses the same way.

use crate::error::{HwError, Result};

/// Factory I2C address with both A1/A2 pins low.
pub const DEFAULT_ADDRESS: u8 = 0x40;

/// Programmable I2C slave address register (bits 4..0, volatile).
pub const REG_I2C_ADDRESS: u8 = 0x15;

/// Angle high byte (bits 13..6).
pub const REG_ANGLE_MSB: u8 = 0xFE;

/// Angle low byte (bits 5..0).
pub const REG_ANGLE_LSB: u8 = 0xFF;

/// Register read by a presence probe; an acknowledged one-byte read means a device answers.
pub const REG_PROBE: u8 = REG_ANGLE_MSB;

/// Resolution of one mechanical turn.
pub const COUNTS_PER_REV: u16 = 1 << 14;

/// The two lowest address bits come from the A1/A2 pins and cannot be programmed.
pub const PIN_STRAPPED_MASK: u8 = 0b11;

/// Combine the two angle registers into a 14-bit count.
#[inline]
pub fn angle_counts(msb: u8, lsb: u8) -> u16 {
    (u16::from(msb) << 6) | u16::from(lsb & 0x3F)
}

/// Convert a 14-bit count into degrees in `[0, 360)`.
#[inline]
pub fn counts_to_degrees(counts: u16) -> f32 {
    f32::from(counts % COUNTS_PER_REV) * 360.0 / f32::from(COUNTS_PER_REV)
}

/// Quantize degrees to the nearest 14-bit count, wrapping into one turn.
#[inline]
pub fn degrees_to_counts(deg: f32) -> u16 {
    if !deg.is_finite() {
        return 0;
    }
    let turns = (deg / 360.0).rem_euclid(1.0);
    let counts = (turns * f32::from(COUNTS_PER_REV)).round() as u32;
    (counts % u32::from(COUNTS_PER_REV)) as u16
}

/// Split a count back into the (msb, lsb) register pair.
#[inline]
pub fn split_counts(counts: u16) -> (u8, u8) {
    let c = counts % COUNTS_PER_REV;
    ((c >> 6) as u8, (c & 0x3F) as u8)
}

/// Value to write into `REG_I2C_ADDRESS` so a device at `old` answers at `new`.
///
/// The register holds address bits 6..2 with bit 6 inverted.
pub fn address_register_value(old: u8, new: u8) -> Result<u8> {
    if new > 0x7F || (old & PIN_STRAPPED_MASK) != (new & PIN_STRAPPED_MASK) {
        return Err(HwError::AddressMismatch { old, new });
    }
    Ok(((new ^ 0x40) >> 2) & 0x1F)
}
