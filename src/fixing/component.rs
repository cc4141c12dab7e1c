use super::fix_value;
use crate::codec;
use crate::descriptor;
use crate::error::{Error, Result};
use crate::names;
use crate::session::Session;
use crate::types::{TypeId, TypeKind};
use crate::value::Value;

/// Component `fieldno` of the record `arg`, viewed as a record of type
/// `arg_type`. Bit-aligned components are unpacked.
pub fn primitive_field(s: &Session, arg: &Value, fieldno: usize, arg_type: TypeId) -> Result<Value> {
    let arg_type = s.types.check_typedef(arg_type);
    let field = s.types.get(arg_type).fields().get(fieldno).cloned().ok_or_else(|| {
        Error::internal(format!(
            "component {fieldno} of {} does not exist",
            s.types.display_name(arg_type)
        ))
    })?;
    if field.bitsize > 0 || field.bitpos % 8 != 0 {
        let bit_size = if field.bitsize > 0 {
            field.bitsize
        } else {
            8 * s.types.length(s.types.check_typedef(field.ty))
        };
        let container = s.fetched(arg)?;
        return codec::extract_packed_value(
            &s.types,
            Some(&container),
            None,
            field.bitpos / 8,
            field.bitpos % 8,
            bit_size,
            field.ty,
            s.bits_big_endian(),
        );
    }
    Ok(arg.component(&s.types, field.ty, field.bitpos / 8))
}

/// Component `name` of `arg` viewed as `ty`, looking through wrapper
/// components and every branch of variant parts.
pub fn search_struct_field(s: &Session, name: &str, arg: &Value, ty: TypeId) -> Result<Option<Value>> {
    let ty = s.types.check_typedef(ty);
    let types = &s.types;
    for (i, field) in types.get(ty).fields().iter().enumerate() {
        if field.name.is_empty() {
            continue;
        }
        if names::field_name_match(&field.name, name) {
            return primitive_field(s, arg, i, ty).map(Some);
        }
        if descriptor::is_wrapper_field(&field.name) {
            let inner = primitive_field(s, arg, i, ty)?;
            if let Some(v) = search_struct_field(s, name, &inner, field.ty)? {
                return Ok(Some(v));
            }
        } else if descriptor::is_variant_part(types, field.ty, &field.name)
            && !types.is_pointer(field.ty)
        {
            let union = descriptor::variant_union_type(types, field.ty);
            let part = arg.component(types, union, field.bitpos / 8);
            for branch in types.get(union).fields() {
                let branch_value = part.component(types, branch.ty, branch.bitpos / 8);
                if let Some(v) = search_struct_field(s, name, &branch_value, branch.ty)? {
                    return Ok(Some(v));
                }
            }
        }
    }
    Ok(None)
}

/// Component `name` of the record `arg`, dereferencing access values and
/// fixing the record first. With `no_err`, a missing component yields
/// `None` instead of an error.
pub fn value_struct_elt(s: &mut Session, arg: Value, name: &str, no_err: bool) -> Result<Option<Value>> {
    let mut arg = arg;
    let ty = s.types.check_typedef(arg.ty);
    if let TypeKind::Pointer { target } | TypeKind::Reference { target } = s.types.kind(ty) {
        let target = *target;
        if !s.types.is_struct(target) && !s.types.is_union(target) {
            return not_a_record(no_err);
        }
        let address = s.value_as_address(&arg)?;
        arg = Value::lazy_at(target, address);
    }
    let ty = s.types.check_typedef(arg.ty);
    if !s.types.is_struct(ty) && !s.types.is_union(ty) {
        return not_a_record(no_err);
    }
    if s.types.is_struct(ty) {
        arg = fix_value(s, arg)?;
    }
    let found = search_struct_field(s, name, &arg, arg.ty)?;
    if found.is_none() && !no_err {
        return Err(Error::eval(format!("There is no member named {name}.")));
    }
    Ok(found)
}

fn not_a_record(no_err: bool) -> Result<Option<Value>> {
    if no_err {
        Ok(None)
    } else {
        Err(Error::eval("Attempt to extract a component of a value that is not a record."))
    }
}
