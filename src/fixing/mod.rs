//! Resolution of dynamic types into fixed ones.
//!
//! GNAT describes records whose layout depends on discriminants, arrays with
//! run-time bounds and packed arrays through encoded parallel types. Fixing
//! turns such a description, together with an object's bytes or address,
//! into an ordinary type with concrete offsets and sizes. Fixed types are
//! added to the session's [`TypeTable`](crate::types::TypeTable) and flagged
//! so that fixing them again returns them unchanged.

mod array;
mod component;
mod record;
mod tag;

pub use array::{
    coerce_to_simple_array, desc_bounds_value, to_fixed_array_type, to_fixed_range_type,
    value_subscript_packed,
};
pub(crate) use array::desc_one_bound;
pub use component::{primitive_field, search_struct_field, value_struct_elt};
pub use record::{to_fixed_record_type, which_variant_applies};
pub use tag::{is_tagged_type, tag_name, type_from_tag};

use crate::error::Result;
use crate::session::Session;
use crate::types::{TypeDesc, TypeId, TypeKind};
use crate::value::Value;
use crate::{descriptor, lookup};
use tracing::trace;

/// Fixed version of `ty` for the object whose bytes are `contents` (or which
/// lives at `address`), with `dval` supplying discriminants when the object
/// itself does not.
///
/// With `check_tag`, a tagged record's run-time tag selects the actual
/// specific type. A typedef whose target is already fixed is kept.
pub fn fix_type(
    s: &mut Session,
    ty: TypeId,
    contents: Option<&[u8]>,
    address: Option<u64>,
    dval: Option<&Value>,
    check_tag: bool,
) -> Result<TypeId> {
    let fixed = fix_type_1(s, ty, contents, address, dval, check_tag)?;
    if matches!(s.types.kind(ty), TypeKind::Typedef { .. }) && s.types.check_typedef(ty) == fixed {
        return Ok(ty);
    }
    Ok(fixed)
}

fn fix_type_1(
    s: &mut Session,
    ty: TypeId,
    contents: Option<&[u8]>,
    address: Option<u64>,
    dval: Option<&Value>,
    check_tag: bool,
) -> Result<TypeId> {
    let base = s.types.check_typedef(ty);
    if s.types.get(base).is_fixed_instance() {
        return Ok(base);
    }
    if !s.resolving.insert(base) {
        s.warn(format!(
            "recursive layout description for {}, using it unresolved",
            s.types.display_name(base)
        ));
        return Ok(base);
    }
    let result = fix_type_uncached(s, base, contents, address, dval, check_tag);
    s.resolving.remove(&base);
    result
}

fn fix_type_uncached(
    s: &mut Session,
    ty: TypeId,
    contents: Option<&[u8]>,
    address: Option<u64>,
    dval: Option<&Value>,
    check_tag: bool,
) -> Result<TypeId> {
    match s.types.kind(ty) {
        TypeKind::Struct { .. } => {
            if contents.is_none() && address.is_none() && dval.is_none() {
                return Ok(static_fixed_type(s, ty));
            }
            let static_type = static_fixed_type(s, ty);
            let fixed = to_fixed_record_type(s, ty, contents, address, None)?;
            if check_tag
                && s.config.trust_runtime_tags
                && let Some(address) = address.filter(|&a| a != 0)
                && is_tagged_type(&s.types, static_type)
            {
                if let Some(real) = tag::dynamic_type_at(s, fixed, address)? {
                    trace!(
                        "tag at {address:#x} selects {} for {}",
                        s.types.display_name(real),
                        s.types.display_name(ty)
                    );
                    let real = to_fixed_record_type(s, real, None, Some(address), None)?;
                    return size_override(s, real);
                }
            }
            size_override(s, fixed)
        }
        TypeKind::Array { .. } => to_fixed_array_type(s, ty, dval, false),
        TypeKind::Union { .. } => match dval {
            None => Ok(ty),
            Some(dval) => {
                match record::fixed_variant_branch(s, ty, None, contents, address, dval)? {
                    Some(branch) => Ok(branch),
                    None => Ok(s.types.empty_record(None)),
                }
            }
        },
        TypeKind::Int { .. } | TypeKind::Modular { .. }
            if descriptor::is_constrained_packed_array_type(&s.types, ty) =>
        {
            to_fixed_array_type(s, ty, dval, false)
        }
        _ => Ok(ty),
    }
}

/// A `<name>___XVZ` variable overrides the size of an object of type `name`.
fn size_override(s: &mut Session, fixed: TypeId) -> Result<TypeId> {
    let Some(name) = s.types.name(fixed).map(str::to_string) else {
        return Ok(fixed);
    };
    let Some(size) = lookup::get_int_var_value(s, &format!("{name}___XVZ"))? else {
        return Ok(fixed);
    };
    let size = size as u64;
    if size == s.types.length(fixed) {
        return Ok(fixed);
    }
    let mut desc = s.types.get(fixed).clone();
    desc.length = size;
    Ok(s.types.add_derived(desc.fixed()))
}

/// Fixed value for `v`: aligner wrappers are stripped and the type is fixed
/// against the value's own contents, following its run-time tag.
pub fn fix_value(s: &mut Session, v: Value) -> Result<Value> {
    let v = unwrap_value(s, v)?;
    let ty = v.ty;
    if s.types.get(s.types.check_typedef(ty)).is_fixed_instance() {
        return Ok(v);
    }
    let fixed = match (v.is_lazy(), v.address) {
        (true, address) => fix_type(s, ty, None, address, None, true)?,
        (false, address) => {
            let bytes = v.bytes()?.to_vec();
            fix_type(s, ty, Some(&bytes), address, None, true)?
        }
    };
    if fixed == ty {
        return Ok(v);
    }
    Ok(coerce_to_type(s, v, fixed))
}

/// View `v` as `ty`, re-reading memory when the length changes.
pub(crate) fn coerce_to_type(s: &Session, v: Value, ty: TypeId) -> Value {
    let old_len = s.types.length(s.types.check_typedef(v.ty));
    let new_len = s.types.length(s.types.check_typedef(ty));
    if old_len == new_len || v.is_lazy() {
        return v.retyped(ty);
    }
    if v.address.is_some() {
        return v.relocated(ty);
    }
    let mut bytes = v.bytes().map(<[u8]>::to_vec).unwrap_or_default();
    bytes.resize(new_len as usize, 0);
    let mut out = Value::from_bytes(ty, bytes);
    out.lval = v.lval;
    out
}

/// Strip aligner records and switch to the `___XVS` base type.
pub fn unwrap_value(s: &mut Session, v: Value) -> Result<Value> {
    let ty = s.types.check_typedef(v.ty);
    if s.types.is_aligner(ty) {
        let inner = primitive_field(s, &v, 0, ty)?;
        return unwrap_value(s, inner);
    }
    let raw_real = s.types.check_typedef(get_base_type(s, ty));
    if raw_real == ty && s.types.parallel_type(ty, "___XVE").is_none() {
        return Ok(v);
    }
    let contents = if v.is_lazy() { None } else { Some(v.bytes()?.to_vec()) };
    let fixed = fix_type(s, raw_real, contents.as_deref(), v.address, None, true)?;
    Ok(coerce_to_type(s, v, fixed))
}

/// The real type named by an `___XVS` companion, or `ty` itself.
pub fn get_base_type(s: &Session, ty: TypeId) -> TypeId {
    let types = &s.types;
    if !types.is_struct(ty) || types.is_aligner(ty) {
        return ty;
    }
    let Some(namer) = types.parallel_type(ty, "___XVS") else {
        return ty;
    };
    let namer = types.check_typedef(namer);
    let fields = types.get(namer).fields();
    if !types.is_struct(namer) || fields.len() != 1 {
        return ty;
    }
    let field = &fields[0];
    match types.kind(types.check_typedef(field.ty)) {
        TypeKind::Reference { target } => *target,
        _ => types.lookup(&field.name).unwrap_or(ty),
    }
}

/// Layout usable without any object: dynamic components are replaced by
/// their own static approximations and variant parts are kept whole.
///
/// Computed once per template.
pub fn static_fixed_type(s: &mut Session, ty: TypeId) -> TypeId {
    let ty = s.types.check_typedef(ty);
    if s.types.get(ty).is_fixed_instance() {
        return ty;
    }
    match s.types.kind(ty) {
        TypeKind::Struct { .. } => {
            let template = record::dynamic_template_type(&s.types, ty).unwrap_or(ty);
            template_to_static_fixed_type(s, template)
        }
        TypeKind::Union { .. } => {
            let template = s.types.parallel_type(ty, "___XVU").unwrap_or(ty);
            template_to_static_fixed_type(s, template)
        }
        _ => ty,
    }
}

fn template_to_static_fixed_type(s: &mut Session, template: TypeId) -> TypeId {
    if s.types.get(template).is_fixed_instance() {
        return template;
    }
    if let Some(cached) = s.types.cached_static_approximation(template) {
        return cached;
    }
    if !s.resolving.insert(template) {
        return template;
    }
    let desc = s.types.get(template).clone();
    let mut fields = desc.fields().to_vec();
    let mut changed = false;
    for field in &mut fields {
        let new_ty = if descriptor::is_dynamic_field(&s.types, field.ty, &field.name) {
            match s.types.target(field.ty) {
                Some(target) => static_fixed_type(s, target),
                None => field.ty,
            }
        } else {
            static_unwrap_type(s, field.ty)
        };
        if new_ty != field.ty {
            field.ty = new_ty;
            changed = true;
        }
    }
    s.resolving.remove(&template);

    let approx = if changed {
        let length = fields
            .iter()
            .map(|f| {
                let bits = if f.bitsize > 0 { f.bitsize } else { 8 * s.types.length(f.ty) };
                (f.bitpos + bits).div_ceil(8)
            })
            .max()
            .unwrap_or(0);
        let kind = match desc.kind {
            TypeKind::Union { .. } => TypeKind::Union { fields },
            _ => TypeKind::Struct { fields },
        };
        s.types.add_derived(TypeDesc::new(desc.name.as_deref(), kind, length).fixed())
    } else {
        template
    };
    s.types.cache_static_approximation(template, approx);
    approx
}

/// Static layout of `ty` with aligners and `___XVS` indirections removed.
pub fn static_unwrap_type(s: &mut Session, ty: TypeId) -> TypeId {
    if s.types.is_aligner(ty) {
        let inner = s.types.get(s.types.check_typedef(ty)).fields()[0].ty;
        return static_unwrap_type(s, inner);
    }
    let raw_real = get_base_type(s, ty);
    if raw_real == ty { ty } else { static_fixed_type(s, raw_real) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::symbols::{Domain, Symbol, SymbolClass, SymbolTable};
    use crate::target::MemoryTarget;
    use crate::types::{Field, TypeTable};

    fn session(types: TypeTable) -> Session {
        Session::new(types, SymbolTable::new(), EngineConfig::default())
    }

    #[test]
    fn static_records_are_their_own_fixed_type() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let point = types.add(TypeDesc::named(
            "pck__point",
            TypeKind::Struct { fields: vec![Field::new("x", 0, int), Field::new("y", 32, int)] },
            8,
        ));
        let mut s = session(types);
        let fixed = fix_type(&mut s, point, Some(&[0; 8]), Some(0x1000), None, false).unwrap();
        assert_eq!(fixed, point);
        assert!(s.types.get(point).is_fixed_instance());
        assert_eq!(fix_type(&mut s, fixed, None, Some(0x1000), None, false).unwrap(), fixed);
    }

    #[test]
    fn typedef_layer_is_kept_when_target_is_fixed() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let alias = types.add(TypeDesc::named("pck__count", TypeKind::Typedef { target: int }, 4));
        let mut s = session(types);
        assert_eq!(fix_type(&mut s, alias, None, None, None, false).unwrap(), alias);
    }

    #[test]
    fn aligner_values_are_unwrapped() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let aligner = types.add(TypeDesc::named(
            "pck__aligned",
            TypeKind::Struct { fields: vec![Field::new("F", 0, int)] },
            8,
        ));
        let mut s = session(types);
        let v = Value::from_bytes(aligner, vec![9, 0, 0, 0, 0, 0, 0, 0]);
        let v = fix_value(&mut s, v).unwrap();
        assert_eq!(v.ty, int);
        assert_eq!(s.value_as_long(&v).unwrap(), 9);
    }

    #[test]
    fn tagged_objects_take_their_specific_type_and_its_size() {
        let mut types = TypeTable::new();
        let address = types.builtins().address;
        let int = types.builtins().integer;
        let char_ptr = types.create_pointer(types.builtins().character);
        types.add(TypeDesc::named(
            "ada__tags__type_specific_data",
            TypeKind::Struct {
                fields: vec![Field::new("idepth", 0, address), Field::new("expanded_name", 64, char_ptr)],
            },
            16,
        ));
        let root = types.add(TypeDesc::named(
            "pck__root",
            TypeKind::Struct { fields: vec![Field::new("_tag", 0, address)] },
            8,
        ));
        let child = types.add(TypeDesc::named(
            "pck__child",
            TypeKind::Struct { fields: vec![Field::new("_parent", 0, root), Field::new("extra", 64, int)] },
            12,
        ));
        let mut symbols = SymbolTable::new();
        let global = symbols.global_block();
        symbols.add_symbol(
            global,
            Symbol::new("pck__child___XVZ", Domain::Var, SymbolClass::Static { address: 0x6000 }, Some(int)),
        );
        let mut target = MemoryTarget::new();
        target.map(0x2000, 0x3000u64.to_le_bytes().to_vec());
        target.map(0x3000, [0u64.to_le_bytes(), 0x4000u64.to_le_bytes()].concat());
        target.map(0x4000, b"PCK.CHILD\0".to_vec());
        target.map(0x5000, [0x2008u64.to_le_bytes().to_vec(), vec![0; 8]].concat());
        target.map(0x6000, 16i32.to_le_bytes().to_vec());
        let mut s = Session::new(types, symbols, EngineConfig::default()).with_target(target);

        let fixed = fix_type(&mut s, root, None, Some(0x5000), None, true).unwrap();
        assert_eq!(s.types.name(fixed), Some("pck__child"));
        assert_eq!(s.types.length(fixed), 16);
        assert_ne!(fixed, child);
    }

    #[test]
    fn static_approximation_is_memoized() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let inner = types.add(TypeDesc::named(
            "pck__inner___XVE",
            TypeKind::Struct { fields: vec![Field::new("a", 0, int)] },
            4,
        ));
        let ptr = types.add(TypeDesc::new(None, TypeKind::Pointer { target: inner }, 8));
        let outer = types.add(TypeDesc::named(
            "pck__outer___XVE",
            TypeKind::Struct { fields: vec![Field::new("n", 0, int), Field::new("data___XVL", 32, ptr)] },
            4,
        ));
        let mut s = session(types);
        let first = static_fixed_type(&mut s, outer);
        let second = static_fixed_type(&mut s, outer);
        assert_eq!(first, second);
        assert_ne!(first, outer);
        assert_eq!(s.types.get(first).fields()[1].ty, inner);
        assert_eq!(s.types.length(first), 8);
    }
}
