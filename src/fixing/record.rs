use super::{fix_type, get_base_type, search_struct_field};
use crate::descriptor;
use crate::error::Result;
use crate::names;
use crate::session::Session;
use crate::types::{Field, TypeDesc, TypeId, TypeKind, TypeTable};
use crate::value::Value;
use tracing::trace;

/// The `___XVE` template describing `ty`, if its layout is variable.
pub(crate) fn dynamic_template_type(types: &TypeTable, ty: TypeId) -> Option<TypeId> {
    let ty = types.check_typedef(ty);
    if !types.is_struct(ty) {
        return None;
    }
    if types.name(ty).is_some_and(|n| n.ends_with("___XVE")) {
        return Some(ty);
    }
    types.parallel_type(ty, "___XVE").filter(|&t| types.is_struct(t))
}

/// Fixed record type for the object at `contents`/`address`.
///
/// Records with a template are laid out from scratch; records with a variant
/// part keep their layout and get the selected branch. Other records are
/// fixed already.
pub fn to_fixed_record_type(
    s: &mut Session,
    ty: TypeId,
    contents: Option<&[u8]>,
    address: Option<u64>,
    dval: Option<&Value>,
) -> Result<TypeId> {
    let ty = s.types.check_typedef(ty);
    if s.types.get(ty).is_fixed_instance() {
        return Ok(ty);
    }
    if let Some(template) = dynamic_template_type(&s.types, ty) {
        let name = fixed_record_name(&s.types, ty);
        return template_to_fixed_record(s, template, name.as_deref(), contents, address, dval);
    }
    if descriptor::variant_field_index(&s.types, ty).is_none() {
        s.types.mark_fixed(ty);
        return Ok(ty);
    }
    record_with_fixed_variant_part(s, ty, contents, address, dval)
}

fn fixed_record_name(types: &TypeTable, ty: TypeId) -> Option<String> {
    let name = types.name(ty)?;
    Some(name.strip_suffix("___XVE").unwrap_or(name).to_string())
}

fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 { value } else { value.div_ceil(align) * align }
}

fn field_bit_len(types: &TypeTable, field: &Field) -> u64 {
    if field.bitsize > 0 {
        field.bitsize
    } else {
        8 * types.length(types.check_typedef(field.ty))
    }
}

fn sub_contents(contents: Option<&[u8]>, byte_offset: u64) -> Option<&[u8]> {
    contents.map(|c| c.get(byte_offset as usize..).unwrap_or(&[]))
}

/// A value of the record built so far, for reading its discriminants.
fn partial_record_value(
    s: &mut Session,
    name: Option<&str>,
    fields: &[Field],
    length: u64,
    contents: Option<&[u8]>,
    address: Option<u64>,
) -> Result<Option<Value>> {
    let partial = s.types.add_derived(TypeDesc::new(
        name,
        TypeKind::Struct { fields: fields.to_vec() },
        length,
    ));
    s.ensure_size_limit(partial)?;
    Ok(match (contents, address) {
        (Some(bytes), address) => {
            let end = (length as usize).min(bytes.len());
            Some(Value::at_with_contents(partial, address, bytes[..end].to_vec()))
        }
        (None, Some(address)) => Some(Value::lazy_at(partial, address)),
        (None, None) => None,
    })
}

/// Lay out the `___XVE` template `template` for one object.
///
/// Component positions in a template are relative to the end of the
/// previous component. Dynamic (`___XVL`) components are fixed from the
/// object's bytes, and the variant part is replaced by the branch that
/// the discriminants select, or dropped when none applies.
fn template_to_fixed_record(
    s: &mut Session,
    template: TypeId,
    name: Option<&str>,
    contents: Option<&[u8]>,
    address: Option<u64>,
    dval0: Option<&Value>,
) -> Result<TypeId> {
    let template_fields = s.types.get(template).fields().to_vec();
    let template_len = s.types.length(template);
    let mut fields: Vec<Field> = Vec::with_capacity(template_fields.len());
    let mut off = 0u64;
    let mut bit_len = 0u64;
    let mut variant_field = None;

    for (f, field) in template_fields.iter().enumerate() {
        off = align_up(off, names::field_alignment_bits(&field.name)) + field.bitpos;
        let mut fixed = Field::new(field.name.clone(), off, field.ty);
        let fld_bit_len = if descriptor::is_variant_part(&s.types, field.ty, &field.name) {
            variant_field = Some(f);
            0
        } else if descriptor::is_dynamic_field(&s.types, field.ty, &field.name) {
            let partial;
            let dval = match dval0 {
                Some(d) => Some(d),
                None => {
                    partial = partial_record_value(s, name, &fields, bit_len.div_ceil(8), contents, address)?;
                    partial.as_ref()
                }
            };
            let Some(mut field_type) = s.types.target(field.ty) else {
                continue;
            };
            let mut field_off = off / 8;
            if s.types.is_aligner(field_type) {
                let inner = s.types.get(s.types.check_typedef(field_type)).fields()[0].clone();
                field_off += inner.bitpos / 8;
                field_type = inner.ty;
            }
            let field_type = get_base_type(s, s.types.check_typedef(field_type));
            let field_fixed = fix_type(
                s,
                field_type,
                sub_contents(contents, field_off),
                address.map(|a| a + field_off),
                dval,
                false,
            )?;
            s.ensure_size_limit(field_fixed)?;
            fixed.ty = field_fixed;
            8 * s.types.length(s.types.check_typedef(field_fixed))
        } else {
            fixed.bitsize = field.bitsize;
            field_bit_len(&s.types, field)
        };
        bit_len = bit_len.max(off + fld_bit_len);
        off += fld_bit_len;
        fields.push(fixed);
    }

    let mut length = bit_len.div_ceil(8);
    if let Some(vf) = variant_field {
        let var_off = fields[vf].bitpos;
        let partial;
        let dval = match dval0 {
            Some(d) => Some(d),
            None => {
                partial = partial_record_value(s, name, &fields, length, contents, address)?;
                partial.as_ref()
            }
        };
        let branch = match dval {
            Some(dval) => {
                let var_ty = fields[vf].ty;
                let var_name = fields[vf].name.clone();
                fixed_variant_branch(
                    s,
                    var_ty,
                    Some(&var_name),
                    sub_contents(contents, var_off / 8),
                    address.map(|a| a + var_off / 8),
                    dval,
                )?
            }
            None => Some(descriptor::variant_union_type(&s.types, fields[vf].ty)),
        };
        match branch {
            None => {
                fields.remove(vf);
            }
            Some(branch) => {
                fields[vf].ty = branch;
                fields[vf].name = "S".to_string();
                let fld_bit_len = 8 * s.types.length(s.types.check_typedef(branch));
                bit_len = bit_len.max(var_off + fld_bit_len);
                length = bit_len.div_ceil(8);
            }
        }
    }

    if template_len == 0 {
        s.warn(format!(
            "Invalid type size for `{}' detected: 0.",
            name.unwrap_or("<anonymous record>")
        ));
    } else {
        length = align_up(length, template_len);
    }
    let rtype = s.types.add_derived(TypeDesc::new(name, TypeKind::Struct { fields }, length).fixed());
    s.ensure_size_limit(rtype)?;
    trace!("fixed record {} is {length} bytes", s.types.display_name(rtype));
    Ok(rtype)
}

/// Replace the variant part of a record with static component positions.
fn record_with_fixed_variant_part(
    s: &mut Session,
    ty: TypeId,
    contents: Option<&[u8]>,
    address: Option<u64>,
    dval0: Option<&Value>,
) -> Result<TypeId> {
    let Some(vf) = descriptor::variant_field_index(&s.types, ty) else {
        return Ok(ty);
    };
    let own;
    let dval = match (dval0, contents, address) {
        (Some(d), _, _) => d,
        (None, Some(bytes), address) => {
            own = Value::at_with_contents(ty, address, bytes.to_vec());
            &own
        }
        (None, None, Some(address)) => {
            own = Value::lazy_at(ty, address);
            &own
        }
        (None, None, None) => return Ok(ty),
    };
    let desc = s.types.get(ty).clone();
    let mut fields = desc.fields().to_vec();
    let var_field = fields[vf].clone();
    let byte_off = var_field.bitpos / 8;
    let branch = fixed_variant_branch(
        s,
        var_field.ty,
        Some(&var_field.name),
        sub_contents(contents, byte_off),
        address.map(|a| a + byte_off),
        dval,
    )?;
    let mut length = desc.length;
    match branch {
        None => {
            fields.remove(vf);
        }
        Some(branch) => {
            fields[vf] = Field::new("S", var_field.bitpos, branch);
            length += s.types.length(s.types.check_typedef(branch));
        }
    }
    length = length.saturating_sub(s.types.length(s.types.check_typedef(var_field.ty)));
    let rtype = s.types.add_derived(
        TypeDesc::new(desc.name.as_deref(), TypeKind::Struct { fields }, length)
            .with_align(desc.align)
            .fixed(),
    );
    Ok(rtype)
}

/// Name of the discriminant controlling a variant part, from the union's
/// type name or else from the variant part's own component name.
fn discriminant_name(types: &TypeTable, union: TypeId, field_name: Option<&str>) -> Option<String> {
    if let Some(name) = types.name(union).and_then(names::variant_discriminant_name) {
        return Some(name);
    }
    let field_name = field_name?;
    names::variant_discriminant_name(field_name)
        .or_else(|| field_name.strip_suffix("___XVN").filter(|n| !n.is_empty()).map(str::to_string))
}

/// Index of the branch of `union` selected by the discriminant found in
/// `outer`: the first branch whose choices contain it, else the `others`
/// branch.
///
/// `None` when no branch applies or the discriminant cannot be read.
pub fn which_variant_applies(
    s: &mut Session,
    union: TypeId,
    field_name: Option<&str>,
    outer: &Value,
) -> Result<Option<usize>> {
    let Some(disc_name) = discriminant_name(&s.types, union, field_name) else {
        return Ok(None);
    };
    let disc = match search_struct_field(s, &disc_name, outer, outer.ty) {
        Ok(Some(disc)) => disc,
        Ok(None) => return Ok(None),
        Err(err) if err.is_target() => {
            s.warn(format!("unable to read discriminant {disc_name}: {err}"));
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let value = match s.value_as_long(&disc) {
        Ok(v) => v,
        Err(err) if err.is_target() => {
            s.warn(format!("unable to read discriminant {disc_name}: {err}"));
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let union = s.types.check_typedef(union);
    let mut others = None;
    for (i, branch) in s.types.get(union).fields().iter().enumerate() {
        if names::is_others_choice(&branch.name) {
            others = Some(i);
        } else if names::in_variant_choices(value, &branch.name) {
            return Ok(Some(i));
        }
    }
    Ok(others)
}

/// Fixed type of the branch of variant part `var_type0` selected by the
/// discriminants in `dval`.
///
/// A union whose discriminant is not a component of `dval` is an unchecked
/// union and is returned whole. `None` means no branch applies.
pub(crate) fn fixed_variant_branch(
    s: &mut Session,
    var_type0: TypeId,
    field_name: Option<&str>,
    contents: Option<&[u8]>,
    address: Option<u64>,
    dval: &Value,
) -> Result<Option<TypeId>> {
    let mut var_type = descriptor::variant_union_type(&s.types, var_type0);
    if let Some(parallel) = s.types.parallel_type(var_type, "___XVU") {
        var_type = s.types.check_typedef(parallel);
    }
    let unchecked = match discriminant_name(&s.types, var_type, field_name) {
        Some(name) => descriptor::lookup_struct_elt_type(&s.types, dval.ty, &name).is_none(),
        None => true,
    };
    if unchecked {
        return Ok(Some(var_type));
    }
    let Some(which) = which_variant_applies(s, var_type, field_name, dval)? else {
        return Ok(None);
    };
    let branch = s.types.get(var_type).fields()[which].clone();
    if descriptor::is_dynamic_field(&s.types, branch.ty, &branch.name) {
        let Some(target) = s.types.target(branch.ty) else {
            return Ok(Some(branch.ty));
        };
        return to_fixed_record_type(s, target, contents, address, Some(dval)).map(Some);
    }
    if descriptor::variant_field_index(&s.types, branch.ty).is_some() {
        return to_fixed_record_type(s, branch.ty, contents, address, Some(dval)).map(Some);
    }
    Ok(Some(branch.ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::symbols::SymbolTable;
    use crate::target::MemoryTarget;

    struct Shapes {
        rec: TypeId,
        union: TypeId,
    }

    // type Rec (Empty : Boolean) is record
    //    case Empty is
    //       when True => null;
    //       when False => Value : Integer;
    //    end case;
    // end record;
    fn shapes(types: &mut TypeTable) -> Shapes {
        let int = types.builtins().integer;
        let boolean = types.builtins().boolean;
        let empty = types.add(TypeDesc::new(None, TypeKind::Struct { fields: vec![] }, 0));
        let with_value = types.add(TypeDesc::new(
            None,
            TypeKind::Struct { fields: vec![Field::new("value", 0, int)] },
            4,
        ));
        let union = types.add(TypeDesc::named(
            "pck__rec___empty___XVN",
            TypeKind::Union { fields: vec![Field::new("S1", 0, empty), Field::new("O", 0, with_value)] },
            4,
        ));
        let rec = types.add(TypeDesc::named(
            "pck__rec",
            TypeKind::Struct {
                fields: vec![Field::new("empty", 0, boolean), Field::new("empty___XVN", 8, union)],
            },
            5,
        ));
        Shapes { rec, union }
    }

    fn session(types: TypeTable, target: MemoryTarget) -> Session {
        Session::new(types, SymbolTable::new(), EngineConfig::default()).with_target(target)
    }

    #[test]
    fn variant_branch_follows_discriminant() {
        let mut types = TypeTable::new();
        let sh = shapes(&mut types);
        let mut target = MemoryTarget::new();
        target.map(0x1000, vec![0, 42, 0, 0, 0]);
        target.map(0x2000, vec![1, 0, 0, 0, 0]);
        let mut s = session(types, target);

        let full = to_fixed_record_type(&mut s, sh.rec, None, Some(0x1000), None).unwrap();
        assert_eq!(s.types.length(full), 5);
        let fields = s.types.get(full).fields().to_vec();
        assert_eq!(fields[1].name, "S");
        assert_eq!(fields[1].bitpos, 8);
        assert_eq!(s.types.get(fields[1].ty).fields()[0].name, "value");

        let empty = to_fixed_record_type(&mut s, sh.rec, None, Some(0x2000), None).unwrap();
        assert_eq!(s.types.length(empty), 1);
        assert!(s.types.get(full).is_fixed_instance());
        assert!(s.types.get(empty).is_fixed_instance());
    }

    #[test]
    fn unknown_discriminant_value_selects_others_or_nothing() {
        let mut types = TypeTable::new();
        let sh = shapes(&mut types);
        let mut s = session(types, MemoryTarget::new());
        let boolean = s.types.builtins().boolean;
        let dval_ty = s.types.add(TypeDesc::new(
            None,
            TypeKind::Struct { fields: vec![Field::new("empty", 0, boolean)] },
            1,
        ));
        let dval = Value::from_bytes(dval_ty, vec![7]);
        assert_eq!(which_variant_applies(&mut s, sh.union, None, &dval).unwrap(), Some(1));
        let dval = Value::from_bytes(dval_ty, vec![1]);
        assert_eq!(which_variant_applies(&mut s, sh.union, None, &dval).unwrap(), Some(0));
    }

    #[test]
    fn union_without_discriminant_component_is_unchecked() {
        let mut types = TypeTable::new();
        let sh = shapes(&mut types);
        let mut s = session(types, MemoryTarget::new());
        let int = s.types.builtins().integer;
        let other = s.types.add(TypeDesc::new(
            None,
            TypeKind::Struct { fields: vec![Field::new("x", 0, int)] },
            4,
        ));
        let dval = Value::from_bytes(other, vec![0; 4]);
        let branch = fixed_variant_branch(&mut s, sh.union, None, None, None, &dval).unwrap();
        assert_eq!(branch, Some(sh.union));
    }

    #[test]
    fn template_positions_are_relative_and_aligned() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let character = types.builtins().character;
        let template = types.add(TypeDesc::named(
            "pck__t___XVE",
            TypeKind::Struct {
                fields: vec![Field::new("c", 0, character), Field::new("n___XVA4", 0, int)],
            },
            4,
        ));
        let mut target = MemoryTarget::new();
        target.map(0x10, vec![0; 8]);
        let mut s = session(types, target);
        let fixed = to_fixed_record_type(&mut s, template, None, Some(0x10), None).unwrap();
        let fields = s.types.get(fixed).fields();
        assert_eq!(fields[0].bitpos, 0);
        assert_eq!(fields[1].bitpos, 32);
        assert_eq!(s.types.length(fixed), 8);
        assert_eq!(s.types.name(fixed), Some("pck__t"));
    }
}
