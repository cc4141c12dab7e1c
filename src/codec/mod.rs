//! Byte- and bit-level conversions between target representations and
//! host scalars.

pub mod fixed;
pub mod packed;

pub use fixed::{delta, fixed_to_float, float_to_fixed, scaling_factor};
pub use packed::{assign_packed_component, extract_packed_value, move_bits, unpack_bits};

use crate::error::{Error, Result};

/// Decode an integer of `bytes.len()` bytes (at most 8).
pub fn unpack_integer(bytes: &[u8], signed: bool, big_endian: bool) -> i64 {
    let len = bytes.len().min(8);
    if len == 0 {
        return 0;
    }
    let mut raw: u64 = 0;
    if big_endian {
        for &b in &bytes[bytes.len() - len..] {
            raw = (raw << 8) | u64::from(b);
        }
    } else {
        for &b in bytes[..len].iter().rev() {
            raw = (raw << 8) | u64::from(b);
        }
    }
    if signed && len < 8 {
        let shift = 64 - 8 * len as u32;
        ((raw << shift) as i64) >> shift
    } else {
        raw as i64
    }
}

/// Encode `value` into `len` bytes, truncating high-order bits.
pub fn pack_integer(value: i64, len: usize, big_endian: bool) -> Vec<u8> {
    let raw = value as u64;
    let mut out: Vec<u8> = (0..len).map(|i| if i < 8 { (raw >> (8 * i)) as u8 } else if value < 0 { 0xff } else { 0 }).collect();
    if big_endian {
        out.reverse();
    }
    out
}

pub fn unpack_float(bytes: &[u8], big_endian: bool) -> Result<f64> {
    match bytes.len() {
        4 => {
            let arr: [u8; 4] = bytes.try_into().map_err(|_| Error::internal("float width"))?;
            Ok(f64::from(if big_endian { f32::from_be_bytes(arr) } else { f32::from_le_bytes(arr) }))
        }
        8 => {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| Error::internal("float width"))?;
            Ok(if big_endian { f64::from_be_bytes(arr) } else { f64::from_le_bytes(arr) })
        }
        n => Err(Error::eval(format!("unsupported floating-point size of {n} bytes"))),
    }
}

pub fn pack_float(value: f64, len: usize, big_endian: bool) -> Result<Vec<u8>> {
    match len {
        4 => {
            let v = value as f32;
            Ok(if big_endian { v.to_be_bytes().to_vec() } else { v.to_le_bytes().to_vec() })
        }
        8 => Ok(if big_endian { value.to_be_bytes().to_vec() } else { value.to_le_bytes().to_vec() }),
        n => Err(Error::eval(format!("unsupported floating-point size of {n} bytes"))),
    }
}

/// Truncating remainder: the result has the sign of the dividend.
pub fn rem(v1: i64, v2: i64) -> Result<i64> {
    if v2 == 0 {
        return Err(Error::eval("Division by zero"));
    }
    Ok(v1.wrapping_rem(v2))
}

/// Floor modulus: the result has the sign of the divisor.
pub fn modulo(v1: i64, v2: i64) -> Result<i64> {
    let v = rem(v1, v2)?;
    if v != 0 && (v < 0) != (v2 < 0) { Ok(v + v2) } else { Ok(v) }
}

pub fn div(v1: i64, v2: i64) -> Result<i64> {
    if v2 == 0 {
        return Err(Error::eval("Division by zero"));
    }
    Ok(v1.wrapping_div(v2))
}

/// Reduce `v` into `0 .. modulus`; a zero modulus stands for 2**64.
pub fn reduce_modular(v: i64, modulus: u64) -> i64 {
    if modulus == 0 {
        return v;
    }
    let m = modulus as i128;
    (((v as i128 % m) + m) % m) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_in_both_byte_orders() {
        assert_eq!(unpack_integer(&[0x2a, 0, 0, 0], true, false), 42);
        assert_eq!(unpack_integer(&[0, 0, 0, 0x2a], true, true), 42);
        assert_eq!(unpack_integer(&[0xff, 0xff], true, false), -1);
        assert_eq!(unpack_integer(&[0xff, 0xff], false, false), 0xffff);
        assert_eq!(pack_integer(-2, 2, false), vec![0xfe, 0xff]);
        assert_eq!(pack_integer(0x1234, 2, true), vec![0x12, 0x34]);
    }

    #[test]
    fn floats_round_trip_through_bytes() {
        let bytes = pack_float(1.5, 4, false).unwrap();
        assert_eq!(unpack_float(&bytes, false).unwrap(), 1.5);
        let bytes = pack_float(-0.25, 8, true).unwrap();
        assert_eq!(unpack_float(&bytes, true).unwrap(), -0.25);
        assert!(unpack_float(&[0; 3], false).is_err());
    }

    #[test]
    fn mod_takes_sign_of_divisor() {
        assert_eq!(modulo(-5, 256).unwrap(), 251);
        assert_eq!(modulo(150, 256).unwrap(), 150);
        assert_eq!(modulo(5, -3).unwrap(), -1);
        assert_eq!(modulo(-6, 3).unwrap(), 0);
    }

    #[test]
    fn rem_takes_sign_of_dividend() {
        assert_eq!(rem(-5, 3).unwrap(), -2);
        assert_eq!(rem(5, -3).unwrap(), 2);
        assert!(rem(1, 0).is_err());
        assert!(modulo(1, 0).is_err());
    }

    #[test]
    fn modular_reduction() {
        assert_eq!(reduce_modular(-5, 256), 251);
        assert_eq!(reduce_modular(300, 256), 44);
        assert_eq!(reduce_modular(-1, 0), -1);
    }
}
