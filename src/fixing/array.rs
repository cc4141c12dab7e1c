use super::{fix_type, primitive_field, search_struct_field};
use crate::codec;
use crate::descriptor::{self, BoundSide};
use crate::error::{Error, Result, eval_bail};
use crate::lookup;
use crate::names;
use crate::session::Session;
use crate::types::{Bound, TypeId, TypeKind};
use crate::value::Value;
use tracing::debug;

/// Fixed array type for `ty`, with bounds taken from the `___XA` index
/// description (resolved against `dval`) and the element type fixed.
///
/// Constrained packed arrays are decoded first; their byte length is the
/// element bit size times the element count, rounded up. Unless
/// `ignore_too_big`, a derived array longer than the oversize limit is an
/// error.
pub fn to_fixed_array_type(
    s: &mut Session,
    ty: TypeId,
    dval: Option<&Value>,
    ignore_too_big: bool,
) -> Result<TypeId> {
    let orig = s.types.check_typedef(ty);
    if s.types.get(orig).is_fixed_instance() {
        return Ok(orig);
    }
    let packed = descriptor::is_constrained_packed_array_type(&s.types, orig);
    let type0 = if packed {
        match decode_constrained_packed_array_type(s, orig)? {
            Some(decoded) => decoded,
            None => return Ok(orig),
        }
    } else {
        orig
    };
    if !s.types.is_array(type0) {
        return Ok(orig);
    }
    let name = s.types.name(type0).map(str::to_string);

    let mut result = match s.types.parallel_type(type0, "___XA") {
        None => {
            let (Some(elt0), Some(index0)) = (s.types.array_element(type0), s.types.array_index(type0))
            else {
                return Ok(orig);
            };
            let elt = fix_type(s, elt0, None, None, dval, true)?;
            let index = to_fixed_range_type(s, index0, dval)?;
            if elt == elt0 && index == index0 && !packed {
                s.types.mark_fixed(type0);
                type0
            } else {
                let result = s.types.create_array(name.as_deref(), elt, index);
                if !ignore_too_big {
                    s.ensure_size_limit(result)?;
                }
                result
            }
        }
        Some(index_desc) => {
            let index_fields = s.types.get(s.types.check_typedef(index_desc)).fields().to_vec();
            let mut elt0 = type0;
            for _ in 0..index_fields.len() {
                elt0 = s.types.array_element(elt0).unwrap_or(elt0);
            }
            let mut result = fix_type(s, elt0, None, None, dval, true)?;
            for (i, field) in index_fields.iter().enumerate().rev() {
                let range = to_fixed_range_type(s, field.ty, dval)?;
                let array_name = if i == 0 { name.as_deref() } else { None };
                result = s.types.create_array(array_name, result, range);
            }
            if !ignore_too_big {
                s.ensure_size_limit(result)?;
            }
            result
        }
    };

    if packed {
        let bits = s.types.array_element_bitsize(type0);
        if let (Some(elt), Some(index)) = (s.types.array_element(result), s.types.array_index(result)) {
            result = s.types.create_packed_array(name.as_deref(), elt, index, bits);
        }
    }
    s.types.mark_fixed(result);
    Ok(result)
}

/// Read a bound encoded in a `___XD` name: a number, or the name of a
/// discriminant of `dval` ending at the next `__`.
fn scan_bound(s: &mut Session, text: &str, k: usize, dval: Option<&Value>) -> Result<Option<(i64, usize)>> {
    if let Some(found) = names::scan_number(text, k) {
        return Ok(Some(found));
    }
    let Some(rest) = text.get(k..) else {
        return Ok(None);
    };
    let end = rest.find("__").map_or(text.len(), |e| k + e);
    let discriminant = &text[k..end];
    if discriminant.is_empty() {
        return Ok(None);
    }
    Ok(discriminant_value(s, discriminant, dval)?.map(|v| (v, end)))
}

fn discriminant_value(s: &mut Session, name: &str, dval: Option<&Value>) -> Result<Option<i64>> {
    let Some(dval) = dval else {
        return Ok(None);
    };
    match search_struct_field(s, name, dval, dval.ty)? {
        Some(v) => s.value_as_long(&v).map(Some),
        None => Ok(None),
    }
}

fn resolve_bound(s: &mut Session, bound: &Bound, dval: Option<&Value>) -> Result<Option<i64>> {
    match bound {
        Bound::Static(v) => Ok(Some(*v)),
        Bound::Discriminant(name) => discriminant_value(s, name, dval),
        Bound::Variable(name) => lookup::get_int_var_value(s, name),
        Bound::Unknown => Ok(None),
    }
}

/// Static range for the index type `raw`, reading `___XD` bounds from
/// discriminants of `dval` or from `<prefix>___L`/`<prefix>___U` variables.
///
/// An unknown low bound defaults to 1 and an unknown high bound to the low
/// bound, with a warning.
pub fn to_fixed_range_type(s: &mut Session, raw: TypeId, dval: Option<&Value>) -> Result<TypeId> {
    let raw_c = s.types.check_typedef(raw);
    let base = match s.types.kind(raw_c) {
        TypeKind::Range { base, .. } => *base,
        _ => raw_c,
    };
    let name = s.types.name(raw_c).map(str::to_string);

    let Some(at) = name.as_deref().and_then(|n| n.find("___XD")) else {
        let (low, high) = match s.types.kind(raw_c).clone() {
            TypeKind::Range { low, high, .. } => (low, high),
            _ => return Ok(raw),
        };
        if matches!((&low, &high), (Bound::Static(_), Bound::Static(_))) {
            return Ok(raw);
        }
        let lo = match resolve_bound(s, &low, dval)? {
            Some(v) => v,
            None => {
                s.warn("Unknown lower bound, using 1.");
                1
            }
        };
        let hi = match resolve_bound(s, &high, dval)? {
            Some(v) => v,
            None => {
                s.warn("Unknown upper bound, using lower bound.");
                lo
            }
        };
        let fixed = s.types.create_range(base, lo, hi);
        return Ok(fixed);
    };

    let name = name.unwrap_or_default();
    let prefix = &name[..at];
    let info = &name[at + 5..];
    let bounds_str = info.find('_').map_or("", |p| &info[p..]);
    let mut n = 1usize;
    let mut info_pos = 0usize;

    let lo = if info.as_bytes().first() == Some(&b'L') {
        info_pos += 1;
        match scan_bound(s, bounds_str, n, dval)? {
            Some((v, next)) => {
                n = next;
                match bounds_str.as_bytes().get(n) {
                    Some(b'_') => n += 2,
                    Some(b'.') => n += 1,
                    _ => {}
                }
                Some(v)
            }
            None => None,
        }
    } else {
        lookup::get_int_var_value(s, &format!("{prefix}___L"))?
    };
    let lo = lo.unwrap_or_else(|| {
        s.warn("Unknown lower bound, using 1.");
        1
    });

    let hi = if info.as_bytes().get(info_pos) == Some(&b'U') {
        scan_bound(s, bounds_str, n, dval)?.map(|(v, _)| v)
    } else {
        lookup::get_int_var_value(s, &format!("{prefix}___U"))?
    };
    let hi = hi.unwrap_or_else(|| {
        s.warn("Unknown upper bound, using lower bound.");
        lo
    });

    debug!("range {name} fixed to {lo} .. {hi}");
    let fixed = s.types.create_range(base, lo, hi);
    let mut desc = s.types.get(fixed).clone();
    desc.name = Some(name.clone());
    Ok(s.types.add_derived(desc.fixed()))
}

/// Array type of the `___XP`-encoded blob `ty`, built from the shadow array
/// type named by the part before `___XP`.
pub(crate) fn decode_constrained_packed_array_type(s: &mut Session, ty: TypeId) -> Result<Option<TypeId>> {
    let raw_name = {
        let base = descriptor::desc_base_type(&s.types, ty);
        let name = s.types.name(s.types.check_typedef(ty)).or_else(|| s.types.name(base));
        match name {
            Some(n) => n.to_string(),
            None => return Ok(None),
        }
    };
    let Some(tail) = raw_name.find("___XP") else {
        return Ok(None);
    };
    let Some(shadow) = s.types.lookup(&raw_name[..tail]) else {
        s.warn("could not find bounds information on packed array");
        return Ok(None);
    };
    let shadow = s.types.check_typedef(shadow);
    if !s.types.is_array(shadow) {
        s.warn("could not understand bounds information on packed array");
        return Ok(None);
    }
    let mut bits = match names::packed_array_bitsize(&raw_name) {
        Some(bits) => u64::from(bits),
        None => {
            s.warn("could not understand bit size information on packed array");
            return Ok(None);
        }
    };
    constrained_packed_array_type(s, shadow, &mut bits).map(Some)
}

/// Copy of the array `ty` whose innermost elements occupy `elt_bits` bits;
/// on return `elt_bits` is the bit size of the whole array.
fn constrained_packed_array_type(s: &mut Session, ty: TypeId, elt_bits: &mut u64) -> Result<TypeId> {
    let ty = s.types.check_typedef(ty);
    let (Some(element), Some(index0)) = (s.types.array_element(ty), s.types.array_index(ty)) else {
        return Ok(ty);
    };
    let index = match s.types.parallel_type(ty, "___XA") {
        Some(desc) => {
            let first = s.types.get(s.types.check_typedef(desc)).fields().first().map(|f| f.ty);
            match first {
                Some(range) => to_fixed_range_type(s, range, None)?,
                None => index0,
            }
        }
        None => to_fixed_range_type(s, index0, None)?,
    };
    let element = s.types.check_typedef(element);
    let new_elt = constrained_packed_array_type(s, element, elt_bits)?;
    let name = s.types.name(ty).map(str::to_string);
    let new_type = s.types.create_packed_array(name.as_deref(), new_elt, index, *elt_bits);
    match s.types.discrete_bounds(index) {
        Some((lo, hi)) if hi >= lo => *elt_bits *= crate::types::element_count(lo, hi),
        _ => *elt_bits = 0,
    }
    Ok(new_type)
}

/// The packed array value `arr` viewed through its decoded array type.
pub(crate) fn decode_constrained_packed_array(s: &mut Session, arr: Value) -> Result<Value> {
    let arr = deref_if_pointer(s, arr)?;
    let Some(decoded) = decode_constrained_packed_array_type(s, arr.ty)? else {
        eval_bail!("can't unpack array");
    };
    let bits_big_endian = s.bits_big_endian();
    if bits_big_endian && let Some(modulus) = s.types.modulus(arr.ty) {
        // Right-justified modular blob: left-justify it for the array view.
        let bit_size = if modulus == 0 { 64 } else { u64::from(64 - (modulus - 1).leading_zeros()) };
        let bit_pos = 8 * s.types.length(s.types.check_typedef(arr.ty)) - bit_size;
        let arr = s.fetched(&arr)?;
        return codec::extract_packed_value(
            &s.types,
            Some(&arr),
            None,
            bit_pos / 8,
            bit_pos % 8,
            bit_size,
            decoded,
            bits_big_endian,
        );
    }
    Ok(super::coerce_to_type(s, arr, decoded))
}

fn deref_if_pointer(s: &mut Session, v: Value) -> Result<Value> {
    let ty = s.types.check_typedef(v.ty);
    match s.types.kind(ty) {
        TypeKind::Pointer { target } | TypeKind::Reference { target } => {
            let target = *target;
            let address = s.value_as_address(&v)?;
            Ok(Value::lazy_at(target, address))
        }
        _ => Ok(v),
    }
}

/// Element of the packed array `arr` at `indices`, one per dimension.
pub fn value_subscript_packed(s: &mut Session, arr: &Value, indices: &[i64]) -> Result<Value> {
    let mut elt_type = s.types.check_typedef(arr.ty);
    let mut bit_offset = 0u64;
    let mut bits = 0u64;
    for &idx in indices {
        let (index, element, element_bitsize) = match s.types.kind(elt_type) {
            TypeKind::Array { index, element, element_bitsize } if *element_bitsize > 0 => {
                (*index, *element, *element_bitsize)
            }
            _ => eval_bail!("attempt to do packed indexing of something other than a packed array"),
        };
        let (lo, hi) = s.types.discrete_bounds(index).unwrap_or((0, -1));
        if idx < lo || idx > hi {
            eval_bail!("packed array index {idx} out of bounds");
        }
        bits = element_bitsize;
        bit_offset += (idx - lo) as u64 * bits;
        elt_type = s.types.check_typedef(element);
    }
    let container = s.fetched(arr)?;
    codec::extract_packed_value(
        &s.types,
        Some(&container),
        None,
        bit_offset / 8,
        bit_offset % 8,
        bits,
        elt_type,
        s.bits_big_endian(),
    )
}

fn descriptor_value(s: &mut Session, arr: Value) -> Result<Value> {
    let ty = s.types.check_typedef(arr.ty);
    if s.types.is_pointer(ty) && !descriptor::is_thin_pointer(&s.types, ty) {
        return deref_if_pointer(s, arr);
    }
    Ok(arr)
}

/// The bounds record of the descriptor `arr`; `None` for a null array.
pub fn desc_bounds_value(s: &mut Session, arr: &Value) -> Result<Option<Value>> {
    let types = &s.types;
    let Some(bounds_ty) = descriptor::desc_bounds_type(types, arr.ty) else {
        eval_bail!("Bad GNAT array descriptor");
    };
    if descriptor::is_thin_pointer(types, arr.ty) {
        let data = s.value_as_address(arr)?;
        if data == 0 {
            return Ok(None);
        }
        let len = s.types.length(bounds_ty);
        return Ok(Some(Value::lazy_at(bounds_ty, data.wrapping_sub(len))));
    }
    let desc = descriptor_value(s, arr.clone())?;
    let base = s.types.check_typedef(desc.ty);
    let Some(idx) = s.types.field_index(base, "P_BOUNDS") else {
        eval_bail!("Bad GNAT array descriptor");
    };
    let pointer = primitive_field(s, &desc, idx, base)?;
    match s.value_as_address(&pointer)? {
        0 => Ok(None),
        address => Ok(Some(Value::lazy_at(bounds_ty, address))),
    }
}

fn desc_data_address(s: &mut Session, arr: &Value) -> Result<u64> {
    if descriptor::is_thin_pointer(&s.types, arr.ty) {
        return s.value_as_address(arr);
    }
    let desc = descriptor_value(s, arr.clone())?;
    let base = s.types.check_typedef(desc.ty);
    let Some(idx) = s.types.field_index(base, "P_ARRAY") else {
        eval_bail!("Bad GNAT array descriptor");
    };
    let pointer = primitive_field(s, &desc, idx, base)?;
    s.value_as_address(&pointer)
}

/// Low or high bound of dimension `dim` (1-based) of a bounds record.
pub(crate) fn desc_one_bound(s: &mut Session, bounds: &Value, dim: usize, side: BoundSide) -> Result<i64> {
    let base = s.types.check_typedef(bounds.ty);
    let index = 2 * dim.saturating_sub(1) + usize::from(side == BoundSide::High);
    if index >= s.types.get(base).fields().len() {
        eval_bail!("bad dimension number {dim}");
    }
    let v = primitive_field(s, bounds, index, base)?;
    s.value_as_long(&v)
}

/// Array type described by the descriptor `arr`, with static bounds.
fn type_of_array(s: &mut Session, arr: &Value) -> Result<Option<TypeId>> {
    let arity = descriptor::array_arity(&s.types, arr.ty);
    let Some(mut elt) = descriptor::array_element_type(&s.types, arr.ty, None) else {
        return Ok(None);
    };
    let Some(bounds) = desc_bounds_value(s, arr)? else {
        return Ok(None);
    };
    let bounds_ty = s.types.check_typedef(bounds.ty);
    let packed_bits = descriptor::packed_array_bitsize(&s.types, arr.ty);
    for dim in (1..=arity).rev() {
        let lo = desc_one_bound(s, &bounds, dim, BoundSide::Low)?;
        let hi = desc_one_bound(s, &bounds, dim, BoundSide::High)?;
        let index_base = descriptor::desc_index_type(&s.types, bounds_ty, dim)
            .unwrap_or_else(|| s.types.builtins().long_integer);
        let range = s.types.create_range(index_base, lo, hi);
        elt = match packed_bits {
            Some(bits) if dim == arity => s.types.create_packed_array(None, elt, range, bits),
            _ => s.types.create_array(None, elt, range),
        };
    }
    Ok(Some(elt))
}

/// Ordinary array value for `arr`: descriptors are followed to their data
/// and packed blobs decoded. Other values are returned unchanged.
pub fn coerce_to_simple_array(s: &mut Session, arr: Value) -> Result<Value> {
    if descriptor::is_array_descriptor_type(&s.types, arr.ty) {
        let Some(array_ty) = type_of_array(s, &arr)? else {
            return Err(Error::eval("Bounds unavailable for null array pointer."));
        };
        s.ensure_size_limit(array_ty)?;
        let data = desc_data_address(s, &arr)?;
        return Ok(Value::lazy_at(array_ty, data));
    }
    if descriptor::is_constrained_packed_array_type(&s.types, arr.ty) {
        return decode_constrained_packed_array(s, arr);
    }
    Ok(arr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::symbols::{Domain, Symbol, SymbolClass, SymbolTable};
    use crate::target::MemoryTarget;
    use crate::types::{Field, TypeDesc, TypeTable};

    fn session(types: TypeTable, symbols: SymbolTable, target: MemoryTarget) -> Session {
        Session::new(types, symbols, EngineConfig::default()).with_target(target)
    }

    #[test]
    fn xd_bounds_from_numbers_and_discriminants() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let static_range = types.add(TypeDesc::named(
            "pck__idx___XDLU_5m__10",
            TypeKind::Range { base: int, low: Bound::Unknown, high: Bound::Unknown },
            4,
        ));
        let disc_range = types.add(TypeDesc::named(
            "pck__rec__idx___XDLU_1__n",
            TypeKind::Range { base: int, low: Bound::Unknown, high: Bound::Unknown },
            4,
        ));
        let holder = types.add(TypeDesc::new(
            None,
            TypeKind::Struct { fields: vec![Field::new("n", 0, int)] },
            4,
        ));
        let mut s = session(types, SymbolTable::new(), MemoryTarget::new());

        let fixed = to_fixed_range_type(&mut s, static_range, None).unwrap();
        assert_eq!(s.types.discrete_bounds(fixed), Some((-5, 10)));
        assert!(s.types.name(fixed).is_some_and(|n| n.contains("___XD")));

        let dval = Value::from_bytes(holder, 7i32.to_le_bytes().to_vec());
        let fixed = to_fixed_range_type(&mut s, disc_range, Some(&dval)).unwrap();
        assert_eq!(s.types.discrete_bounds(fixed), Some((1, 7)));
        assert!(s.warnings.messages().is_empty());
    }

    #[test]
    fn missing_bound_variables_fall_back_with_warnings() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let range = types.add(TypeDesc::named(
            "pck__r___XD",
            TypeKind::Range { base: int, low: Bound::Unknown, high: Bound::Unknown },
            4,
        ));
        let mut s = session(types, SymbolTable::new(), MemoryTarget::new());
        let fixed = to_fixed_range_type(&mut s, range, None).unwrap();
        assert_eq!(s.types.discrete_bounds(fixed), Some((1, 1)));
        assert_eq!(s.warnings.messages().len(), 2);
    }

    #[test]
    fn bound_variables_are_read_from_memory() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let range = types.add(TypeDesc::named(
            "pck__r___XD",
            TypeKind::Range { base: int, low: Bound::Unknown, high: Bound::Unknown },
            4,
        ));
        let mut symbols = SymbolTable::new();
        let global = symbols.global_block();
        symbols.add_symbol(
            global,
            Symbol::new("pck__r___L", Domain::Var, SymbolClass::Static { address: 0x100 }, Some(int)),
        );
        symbols.add_symbol(
            global,
            Symbol::new("pck__r___U", Domain::Var, SymbolClass::Static { address: 0x104 }, Some(int)),
        );
        let mut target = MemoryTarget::new();
        target.map(0x100, [3i32.to_le_bytes(), 9i32.to_le_bytes()].concat());
        let mut s = session(types, symbols, target);
        let fixed = to_fixed_range_type(&mut s, range, None).unwrap();
        assert_eq!(s.types.discrete_bounds(fixed), Some((3, 9)));
    }

    #[test]
    fn oversized_dynamic_arrays_are_rejected() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let index = types.add(TypeDesc::named(
            "pck__big___XDLU_1__100000000",
            TypeKind::Range { base: int, low: Bound::Unknown, high: Bound::Unknown },
            4,
        ));
        let arr = types.add(TypeDesc::named(
            "pck__big_arr",
            TypeKind::Array { element: int, index, element_bitsize: 0 },
            0,
        ));
        let mut s = session(types, SymbolTable::new(), MemoryTarget::new());

        let err = fix_type(&mut s, arr, None, Some(0x1000), None, true).unwrap_err();
        assert!(err.is_internal());
        assert!(to_fixed_array_type(&mut s, arr, None, false).unwrap_err().is_internal());

        // a descriptor's nominal array may be oversized
        let nominal = to_fixed_array_type(&mut s, arr, None, true).unwrap();
        assert_eq!(s.types.length(nominal), 400_000_000);
    }

    #[test]
    fn constrained_packed_array_is_decoded() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let small = types.create_range(int, 0, 7);
        let small = {
            let mut d = types.get(small).clone();
            d.length = 1;
            types.add(d)
        };
        let index = types.create_range(int, 0, 4);
        types.add(TypeDesc::named(
            "pck__arr",
            TypeKind::Array { element: small, index, element_bitsize: 0 },
            5,
        ));
        let blob = types.add(TypeDesc::named("pck__arr___XP3", TypeKind::Modular { modulus: 1 << 15 }, 2));
        let mut target = MemoryTarget::new();
        // elements 0..5 = 1, 2, 3, 4, 5 at 3 bits each, little-endian bit order
        let packed: u16 = 1 | (2 << 3) | (3 << 6) | (4 << 9) | (5 << 12);
        target.map(0x40, packed.to_le_bytes().to_vec());
        let mut s = session(types, SymbolTable::new(), target);

        let fixed = to_fixed_array_type(&mut s, blob, None, true).unwrap();
        assert_eq!(s.types.length(fixed), 2);
        assert_eq!(s.types.array_element_bitsize(fixed), 3);

        let arr = coerce_to_simple_array(&mut s, Value::lazy_at(blob, 0x40)).unwrap();
        for (i, expected) in (1..=5).enumerate() {
            let elt = value_subscript_packed(&mut s, &arr, &[i as i64]).unwrap();
            assert_eq!(s.value_as_long(&elt).unwrap(), expected);
        }
        assert!(value_subscript_packed(&mut s, &arr, &[5]).is_err());
    }

    #[test]
    fn fat_pointer_is_coerced_to_its_array() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let character = types.builtins().character;
        let bounds = types.add(TypeDesc::named(
            "string___XUB",
            TypeKind::Struct { fields: vec![Field::new("LB0", 0, int), Field::new("UB0", 32, int)] },
            8,
        ));
        let any_index = types.add(TypeDesc::new(
            None,
            TypeKind::Range { base: int, low: Bound::Unknown, high: Bound::Unknown },
            4,
        ));
        let data = types.add(TypeDesc::named(
            "string___XUA",
            TypeKind::Array { element: character, index: any_index, element_bitsize: 0 },
            0,
        ));
        let data_ptr = types.add(TypeDesc::new(None, TypeKind::Pointer { target: data }, 8));
        let bounds_ptr = types.add(TypeDesc::new(None, TypeKind::Pointer { target: bounds }, 8));
        let fat = types.add(TypeDesc::named(
            "string",
            TypeKind::Struct {
                fields: vec![Field::new("P_ARRAY", 0, data_ptr), Field::new("P_BOUNDS", 64, bounds_ptr)],
            },
            16,
        ));
        let mut target = MemoryTarget::new();
        target.map(0x100, [0x200u64.to_le_bytes(), 0x300u64.to_le_bytes()].concat());
        target.map(0x200, b"hello".to_vec());
        target.map(0x300, [2i32.to_le_bytes(), 4i32.to_le_bytes()].concat());
        let mut s = session(types, SymbolTable::new(), target);

        let arr = coerce_to_simple_array(&mut s, Value::lazy_at(fat, 0x100)).unwrap();
        let index = s.types.array_index(arr.ty).unwrap();
        assert_eq!(s.types.discrete_bounds(index), Some((2, 4)));
        let arr = s.fetched(&arr).unwrap();
        assert_eq!(arr.bytes().unwrap(), b"hel");
    }
}
