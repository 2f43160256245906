//! Sensor payload codec
//!
//! Pure decoders for the three payload encodings the gateway understands:
//!
//! ```text
//! Broadcast frame (manufacturer data, 5 bytes):
//! [0-1] : Humidity    (u16, byte0 high / byte1 low, tenths of %RH)
//! [2-3] : Temperature (i16, byte2 high / byte3 low, tenths of °C)
//! [4]   : Checksum    (low byte of sum of [0-3])
//!
//! Humidity/temperature characteristic (>= 2 bytes):
//! [0-1] : raw (u16 little-endian), °C = raw / 65536 * 165 - 40
//!         %RH = (raw & !0b11) / 65536 * 100
//!
//! Optical characteristic (>= 2 bytes):
//! [0-1] : raw (u16 little-endian)
//!         bits 0-11 mantissa, bits 12-15 exponent
//!         lux = trunc(mantissa * 0.01 * 2^exponent)
//! ```

use crate::domain::error::CodecError;

/// Exact length of a broadcast frame.
pub const BROADCAST_FRAME_LEN: usize = 5;

/// Minimum length of a characteristic payload.
pub const CHARACTERISTIC_MIN_LEN: usize = 2;

fn require_exact(bytes: &[u8], expected: usize) -> Result<(), CodecError> {
    if bytes.len() != expected {
        return Err(CodecError::MalformedPayload {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn le_u16(bytes: &[u8]) -> Result<u16, CodecError> {
    if bytes.len() < CHARACTERISTIC_MIN_LEN {
        return Err(CodecError::MalformedPayload {
            expected: CHARACTERISTIC_MIN_LEN,
            actual: bytes.len(),
        });
    }
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Temperature in °C from a 5-byte broadcast frame.
pub fn decode_broadcast_temperature(bytes: &[u8]) -> Result<f64, CodecError> {
    require_exact(bytes, BROADCAST_FRAME_LEN)?;
    // Signed, as the sensor reports sub-zero temperatures in two's complement.
    let raw = i16::from_be_bytes([bytes[2], bytes[3]]);
    Ok(raw as f64 / 10.0)
}

/// Relative humidity in %RH from a 5-byte broadcast frame.
pub fn decode_broadcast_humidity(bytes: &[u8]) -> Result<f64, CodecError> {
    require_exact(bytes, BROADCAST_FRAME_LEN)?;
    let raw = u16::from_be_bytes([bytes[0], bytes[1]]);
    Ok(raw as f64 / 10.0)
}

/// Temperature in °C from the humidity/temperature data characteristic.
pub fn decode_characteristic_temperature(bytes: &[u8]) -> Result<f64, CodecError> {
    let raw = le_u16(bytes)?;
    Ok((raw as f64 / 65536.0) * 165.0 - 40.0)
}

/// Relative humidity in %RH from the humidity/temperature data characteristic.
pub fn decode_characteristic_humidity(bytes: &[u8]) -> Result<f64, CodecError> {
    // Two low bits are status flags.
    let raw = le_u16(bytes)? & !0x0003;
    Ok((raw as f64 / 65536.0) * 100.0)
}

/// Illuminance in lux from the optical data characteristic, truncated toward
/// zero.
///
/// The result is not wrapped to 16 bits, so full scale reads 1341849 lux
/// rather than the sensor firmware's wrapped `i16` value.
pub fn decode_illuminance(bytes: &[u8]) -> Result<f64, CodecError> {
    let raw = le_u16(bytes)?;

    let mantissa = raw & 0x0FFF;
    let exponent = (raw & 0xF000) >> 12;
    let multiplier: u32 = if exponent == 0 { 1 } else { 2 << (exponent - 1) };

    let lux = mantissa as f64 * (0.01 * multiplier as f64);
    Ok(lux.trunc())
}
