//! Bit-granular access to packed arrays and records.

use crate::error::{Error, Result};
use crate::types::{TypeId, TypeTable};
use crate::value::Value;

/// Copy `n` bits from `source` at bit `src_offset` into `target` at bit
/// `targ_offset`, leaving the other bits of `target` untouched.
///
/// Bit 0 of a byte is its most significant bit when `big_endian_bits`.
pub fn move_bits(
    target: &mut [u8],
    targ_offset: u64,
    source: &[u8],
    src_offset: u64,
    n: u64,
    big_endian_bits: bool,
) {
    let mut t = (targ_offset / 8) as usize;
    let mut targ_offset = (targ_offset % 8) as u32;
    let mut s = (src_offset / 8) as usize;
    let src_offset = (src_offset % 8) as u32;
    let src = |i: usize| u32::from(source.get(i).copied().unwrap_or(0));
    let mut n = n as u32;

    if big_endian_bits {
        let mut accum = src(s);
        s += 1;
        let mut accum_bits = 8 - src_offset;
        while n > 0 {
            accum = (accum << 8) | src(s);
            accum_bits += 8;
            s += 1;
            let chunk_size = (8 - targ_offset).min(n);
            let unused_right = 8 - (chunk_size + targ_offset);
            let mask = ((1u32 << chunk_size) - 1) << unused_right;
            if let Some(byte) = target.get_mut(t) {
                let bits = (accum >> (accum_bits - chunk_size - unused_right)) & mask;
                *byte = ((u32::from(*byte) & !mask) | bits) as u8;
            }
            n -= chunk_size;
            accum_bits -= chunk_size;
            t += 1;
            targ_offset = 0;
        }
    } else {
        let mut accum = src(s) >> src_offset;
        s += 1;
        let mut accum_bits = 8 - src_offset;
        while n > 0 {
            accum += src(s) << accum_bits;
            accum_bits += 8;
            s += 1;
            let chunk_size = (8 - targ_offset).min(n);
            let mask = ((1u32 << chunk_size) - 1) << targ_offset;
            if let Some(byte) = target.get_mut(t) {
                *byte = ((u32::from(*byte) & !mask) | ((accum << targ_offset) & mask)) as u8;
            }
            n -= chunk_size;
            accum_bits -= chunk_size;
            accum >>= chunk_size;
            t += 1;
            targ_offset = 0;
        }
    }
}

/// Unpack `bit_size` bits found at `bit_offset` of `bytes` into a
/// `target_len`-byte natural representation.
///
/// Scalars are right-justified and sign-extended when `signed`; aggregates
/// are left-justified in big-endian bit order.
pub fn unpack_bits(
    bytes: &[u8],
    bit_offset: u32,
    bit_size: u64,
    target_len: usize,
    aggregate: bool,
    signed: bool,
    big_endian_bits: bool,
) -> Vec<u8> {
    let mut unpacked = vec![0u8; target_len];
    if bit_size == 0 || target_len == 0 {
        return unpacked;
    }
    let len = (bit_size as usize + bit_offset as usize).div_ceil(8);
    let byte = |i: usize| u32::from(bytes.get(i).copied().unwrap_or(0));
    let mut src_bits_left = bit_size as i64;
    let mut nsrc = len as i64;
    let mut ntarg = target_len as i64;
    let mut sign: u32 = 0;
    let mut accum: u64 = 0;
    let mut accum_size: u32;
    let mut unused_ls: u32;
    let (mut src, mut targ): (i64, i64);
    let delta: i64 = if big_endian_bits { -1 } else { 1 };

    if big_endian_bits {
        src = len as i64 - 1;
        if signed && ((byte(0) << bit_offset) & 0x80) != 0 {
            sign = 0xff;
        }
        unused_ls = (8 - (bit_size as u32 + bit_offset) % 8) % 8;
        if aggregate {
            accum_size = ((8 - bit_size % 8) % 8) as u32;
            targ = (bit_size as i64 + 7) / 8 - 1;
            ntarg = targ + 1;
        } else {
            accum_size = 0;
            targ = target_len as i64 - 1;
        }
    } else {
        let sign_bit_offset = (bit_size as u32 + bit_offset - 1) % 8;
        src = 0;
        targ = 0;
        unused_ls = bit_offset;
        accum_size = 0;
        if signed && (byte(len - 1) & (1 << sign_bit_offset)) != 0 {
            sign = 0xff;
        }
    }

    while nsrc > 0 {
        let take = if src_bits_left >= 8 { 8 } else { src_bits_left.max(0) as u32 };
        let unused_ms_mask: u32 = (1u32 << take) - 1;
        let sign_mask = sign & !unused_ms_mask;
        let chunk = ((byte(src as usize) >> unused_ls) & unused_ms_mask) | sign_mask;
        accum |= u64::from(chunk) << accum_size;
        accum_size += 8 - unused_ls;
        if accum_size >= 8 {
            if let Some(slot) = unpacked.get_mut(targ as usize) {
                *slot = (accum & 0xff) as u8;
            }
            accum_size -= 8;
            accum >>= 8;
            ntarg -= 1;
            targ += delta;
        }
        src_bits_left -= i64::from(8 - unused_ls);
        unused_ls = 0;
        nsrc -= 1;
        src += delta;
    }
    while ntarg > 0 {
        accum |= u64::from(sign) << accum_size;
        if targ >= 0
            && let Some(slot) = unpacked.get_mut(targ as usize)
        {
            *slot = (accum & 0xff) as u8;
        }
        accum >>= 8;
        ntarg -= 1;
        targ += delta;
    }
    unpacked
}

/// Read a packed component of `bit_size` bits at `byte_offset * 8 + bit_offset`
/// of `container` (or of `raw` when there is no container) as a value of `ty`.
///
/// The container must already be fetched. The result keeps the
/// component's location so that it can be assigned to.
pub fn extract_packed_value(
    types: &TypeTable,
    container: Option<&Value>,
    raw: Option<&[u8]>,
    byte_offset: u64,
    bit_offset: u64,
    bit_size: u64,
    ty: TypeId,
    big_endian_bits: bool,
) -> Result<Value> {
    if bit_offset >= 8 {
        return Err(Error::internal(format!("packed bit offset {bit_offset} out of range")));
    }
    let id = types.check_typedef(ty);
    let target_len = types.length(id) as usize;
    let bytes = match (container, raw) {
        (Some(v), _) => v.bytes()?,
        (None, Some(raw)) => raw,
        (None, None) => return Err(Error::internal("packed extraction without a source")),
    };
    let start = byte_offset as usize;
    let source = bytes.get(start..).unwrap_or(&[]);
    let aggregate = types.is_struct(id) || types.is_array(id) || types.is_union(id);
    let unpacked = unpack_bits(
        source,
        bit_offset as u32,
        bit_size,
        target_len,
        aggregate,
        types.has_negatives(id),
        big_endian_bits,
    );

    let mut value = Value::from_bytes(ty, unpacked);
    if let Some(container) = container {
        value.lval = container.lval.clone();
        value.modifiable = container.modifiable;
        let mut bitpos = bit_offset + container.bitpos;
        let mut offset = byte_offset;
        if bitpos >= 8 {
            offset += 1;
            bitpos -= 8;
        }
        value.offset = container.offset + offset;
        value.address = container.address.map(|a| a + offset);
        value.bitpos = bitpos;
    }
    value.bitsize = bit_size;
    Ok(value)
}

/// Write `new_value` into the bits of `container` that `component` occupies.
///
/// Only the container's fetched bytes change; flushing them to the target
/// is up to the caller.
pub fn assign_packed_component(
    types: &TypeTable,
    container: &mut Value,
    component: &Value,
    new_value: &Value,
    big_endian_bits: bool,
) -> Result<()> {
    let offset_in_container = component
        .offset
        .checked_sub(container.offset)
        .ok_or_else(|| Error::internal("component lies before its container"))?;
    let bit_offset_in_container = component.bitpos as i64 - container.bitpos as i64;
    let comp_len = types.length(types.check_typedef(component.ty));
    let bits = if component.bitsize == 0 { 8 * comp_len } else { component.bitsize };
    let source = new_value.bytes()?;
    let dest_bit = (container.bitpos as i64 + bit_offset_in_container).max(0) as u64;
    let dest = container.bytes_mut()?;
    let dest = dest
        .get_mut(offset_in_container as usize..)
        .ok_or_else(|| Error::internal("component outside its container"))?;
    let src_offset = if big_endian_bits { (8 * source.len() as u64).saturating_sub(bits) } else { 0 };
    move_bits(dest, dest_bit, source, src_offset, bits, big_endian_bits);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TypeDesc, TypeKind};
    use proptest::prelude::*;

    fn pack(value: i64, bit_offset: u64, bit_size: u64, big_endian: bool) -> Vec<u8> {
        let mut buf = vec![0u8; 10];
        let src = if big_endian { value.to_be_bytes() } else { value.to_le_bytes() };
        let src_offset = if big_endian { 64 - bit_size } else { 0 };
        move_bits(&mut buf, bit_offset, &src, src_offset, bit_size, big_endian);
        buf
    }

    #[test]
    fn three_bit_elements_big_endian() {
        let buf = [0b1011_0101u8, 0b1000_0000];
        let e0 = unpack_bits(&buf, 0, 3, 1, false, false, true);
        let e1 = unpack_bits(&buf, 3, 3, 1, false, false, true);
        assert_eq!(e0, vec![5]);
        assert_eq!(e1, vec![5]);
        let e2 = unpack_bits(&buf[0..], 6, 3, 1, false, false, true);
        assert_eq!(e2, vec![0b011]);
    }

    #[test]
    fn signed_fields_are_sign_extended() {
        let buf = pack(-3, 2, 4, false);
        let out = unpack_bits(&buf, 2, 4, 2, false, true, false);
        assert_eq!(i16::from_le_bytes([out[0], out[1]]), -3);
        let buf = pack(-3, 5, 6, true);
        let out = unpack_bits(&buf, 5, 6, 2, false, true, true);
        assert_eq!(i16::from_be_bytes([out[0], out[1]]), -3);
    }

    #[test]
    fn aggregates_are_left_justified_in_big_endian() {
        let buf = [0b0001_1110u8, 0b1100_0000];
        let out = unpack_bits(&buf, 3, 7, 2, true, false, true);
        assert_eq!(out[0], 0b1111_0110);
    }

    #[test]
    fn move_bits_preserves_neighbours() {
        let mut target = [0xffu8, 0xff];
        move_bits(&mut target, 4, &[0], 0, 6, false);
        assert_eq!(target, [0x0f, 0xfc]);
        let mut target = [0xffu8, 0xff];
        move_bits(&mut target, 4, &[0], 0, 6, true);
        assert_eq!(target, [0xf0, 0x3f]);
    }

    #[test]
    fn assignment_goes_through_the_container() {
        let mut types = TypeTable::new();
        let nibble = types.add(TypeDesc::named("pck__nibble", TypeKind::Int { signed: false }, 1));
        let mut container = Value::from_bytes(types.builtins().integer, vec![0, 0, 0, 0]);
        let component =
            extract_packed_value(&types, Some(&container), None, 1, 4, 4, nibble, false).unwrap();
        assert_eq!(component.offset, 1);
        assert_eq!(component.bitpos, 4);
        let new_value = Value::from_bytes(nibble, vec![0xa]);
        assign_packed_component(&types, &mut container, &component, &new_value, false).unwrap();
        assert_eq!(container.bytes().unwrap(), &[0, 0xa0, 0, 0]);
        let reread = extract_packed_value(&types, Some(&container), None, 1, 4, 4, nibble, false).unwrap();
        assert_eq!(reread.bytes().unwrap(), &[0xa]);
    }

    proptest! {
        #[test]
        fn packing_round_trips(
            raw in any::<i64>(),
            bit_size in 1u64..=64,
            bit_offset in 0u64..8,
            big_endian in any::<bool>(),
            signed in any::<bool>(),
        ) {
            let value = if bit_size == 64 {
                raw
            } else if signed {
                (raw << (64 - bit_size)) >> (64 - bit_size)
            } else {
                ((raw as u64) & ((1u64 << bit_size) - 1)) as i64
            };
            let buf = pack(value, bit_offset, bit_size, big_endian);
            let out = unpack_bits(&buf, bit_offset as u32, bit_size, 8, false, signed, big_endian);
            let arr: [u8; 8] = out.try_into().unwrap();
            let back = if big_endian { i64::from_be_bytes(arr) } else { i64::from_le_bytes(arr) };
            prop_assert_eq!(back, value);
        }
    }
}
