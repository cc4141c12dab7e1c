//! Structural accessors for unconstrained-array descriptors.
//!
//! A fat pointer is a record `{P_ARRAY, P_BOUNDS}`; a thin pointer points
//! at the data of a `___XUT` record `{BOUNDS, ARRAY}`. Bounds records hold
//! `LB0, UB0, LB1, UB1, ...`. None of these functions read target memory.

use crate::names::{self, LayoutHint};
use crate::types::{TypeId, TypeKind, TypeTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorField {
    Data,
    Bounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundSide {
    Low,
    High,
}

/// The record underneath typedefs and one level of pointer/reference.
pub fn desc_base_type(types: &TypeTable, ty: TypeId) -> TypeId {
    let ty = types.check_typedef(ty);
    match types.kind(ty) {
        TypeKind::Pointer { target } | TypeKind::Reference { target } => types.check_typedef(*target),
        _ => ty,
    }
}

pub fn is_thin_pointer(types: &TypeTable, ty: TypeId) -> bool {
    let base = desc_base_type(types, ty);
    matches!(types.get(base).hint(), LayoutHint::ThinPointerTarget)
}

fn thin_descriptor_type(types: &TypeTable, ty: TypeId) -> TypeId {
    let base = desc_base_type(types, ty);
    if types.name(base).is_some_and(|n| n.ends_with("___XVE")) {
        base
    } else {
        types.parallel_type(base, "___XVE").unwrap_or(base)
    }
}

/// Type of a record component named `name`, looking through wrapper
/// components and variant parts.
pub fn lookup_struct_elt_type(types: &TypeTable, ty: TypeId, name: &str) -> Option<TypeId> {
    lookup_struct_elt(types, ty, name).map(|(ty, _)| ty)
}

/// Like [`lookup_struct_elt_type`], also returning the bit offset.
pub fn lookup_struct_elt(types: &TypeTable, ty: TypeId, name: &str) -> Option<(TypeId, u64)> {
    let ty = types.check_typedef(ty);
    let fields = match types.kind(ty) {
        TypeKind::Struct { fields } | TypeKind::Union { fields } => fields,
        _ => return None,
    };
    for field in fields {
        if names::field_name_match(&field.name, name) {
            return Some((field.ty, field.bitpos));
        }
        if is_wrapper_field(&field.name) {
            if let Some((t, pos)) = lookup_struct_elt(types, field.ty, name) {
                return Some((t, field.bitpos + pos));
            }
        } else if is_variant_part(types, field.ty, &field.name) {
            let union = types.check_typedef(variant_union_type(types, field.ty));
            for branch in types.get(union).fields().iter().rev() {
                if names::field_name_match(&branch.name, name) {
                    return Some((types.check_typedef(branch.ty), field.bitpos + branch.bitpos));
                }
                if let Some((t, pos)) = lookup_struct_elt(types, branch.ty, name) {
                    return Some((t, field.bitpos + branch.bitpos + pos));
                }
            }
        }
    }
    None
}

/// Components that stand for an enclosing scope rather than a user field.
pub fn is_wrapper_field(name: &str) -> bool {
    name == "RETVAL"
        || name.starts_with("PARENT")
        || name == "REP"
        || name.starts_with("_parent")
        || name.starts_with(['S', 'R', 'O'])
}

/// Whether a record component of type `field_ty` named `field_name` is a
/// variant part: a union, possibly behind an `___XVL` pointer.
pub fn is_variant_part(types: &TypeTable, field_ty: TypeId, field_name: &str) -> bool {
    let ty = types.check_typedef(field_ty);
    match types.kind(ty) {
        TypeKind::Union { .. } => true,
        TypeKind::Pointer { target } if names::is_dynamic_field_name(field_name) => {
            types.is_union(*target)
        }
        _ => false,
    }
}

/// The union type of a variant part, looking through a dynamic-field pointer.
pub fn variant_union_type(types: &TypeTable, field_ty: TypeId) -> TypeId {
    let ty = types.check_typedef(field_ty);
    match types.kind(ty) {
        TypeKind::Pointer { target } => types.check_typedef(*target),
        _ => ty,
    }
}

/// A pointer component whose target is laid out at run time.
pub fn is_dynamic_field(types: &TypeTable, field_ty: TypeId, field_name: &str) -> bool {
    names::is_dynamic_field_name(field_name) && types.is_pointer(field_ty)
}

pub fn variant_field_index(types: &TypeTable, ty: TypeId) -> Option<usize> {
    let ty = types.check_typedef(ty);
    types.get(ty).fields().iter().position(|f| is_variant_part(types, f.ty, &f.name))
}

pub fn is_thick_pointer(types: &TypeTable, ty: TypeId) -> bool {
    let base = desc_base_type(types, ty);
    types.is_struct(base) && lookup_struct_elt_type(types, base, "P_BOUNDS").is_some()
}

/// Record type holding the `LBi`/`UBi` bounds.
pub fn desc_bounds_type(types: &TypeTable, ty: TypeId) -> Option<TypeId> {
    let base = desc_base_type(types, ty);
    if is_thin_pointer(types, base) {
        let desc = thin_descriptor_type(types, base);
        return lookup_struct_elt_type(types, desc, "BOUNDS").map(|t| types.check_typedef(t));
    }
    if types.is_struct(base) {
        let r = lookup_struct_elt_type(types, base, "P_BOUNDS")?;
        return types.target(types.check_typedef(r)).map(|t| types.check_typedef(t));
    }
    None
}

/// Array type the descriptor's data component designates.
pub fn desc_data_target_type(types: &TypeTable, ty: TypeId) -> Option<TypeId> {
    let base = desc_base_type(types, ty);
    if is_thin_pointer(types, base) {
        let desc = thin_descriptor_type(types, base);
        let field = types.get(types.check_typedef(desc)).fields().get(1)?;
        return Some(desc_base_type(types, field.ty));
    }
    if is_thick_pointer(types, base) {
        let data = types.check_typedef(lookup_struct_elt_type(types, base, "P_ARRAY")?);
        if let TypeKind::Pointer { target } = types.kind(data) {
            return Some(types.check_typedef(*target));
        }
    }
    None
}

/// Bit position of the data or bounds component of a fat pointer.
pub fn fat_pointer_field_bitpos(types: &TypeTable, ty: TypeId, which: DescriptorField) -> Option<u64> {
    let base = desc_base_type(types, ty);
    let index = match which {
        DescriptorField::Data => 0,
        DescriptorField::Bounds => 1,
    };
    types.get(base).fields().get(index).map(|f| f.bitpos)
}

/// Bit size of the data or bounds component, defaulting to its type's size.
pub fn fat_pointer_field_bitsize(types: &TypeTable, ty: TypeId, which: DescriptorField) -> Option<u64> {
    let base = desc_base_type(types, ty);
    let index = match which {
        DescriptorField::Data => 0,
        DescriptorField::Bounds => 1,
    };
    let field = types.get(base).fields().get(index)?;
    Some(if field.bitsize > 0 { field.bitsize } else { 8 * types.length(types.check_typedef(field.ty)) })
}

fn bound_field_index(dimension: usize, which: BoundSide) -> Option<usize> {
    let side = match which {
        BoundSide::Low => 0,
        BoundSide::High => 1,
    };
    (2 * dimension + side).checked_sub(2)
}

/// Bit position of `LBi` or `UBi` (dimension `i` is 1-based).
pub fn desc_bound_bitpos(types: &TypeTable, bounds: TypeId, dimension: usize, which: BoundSide) -> Option<u64> {
    let base = desc_base_type(types, bounds);
    types.get(base).fields().get(bound_field_index(dimension, which)?).map(|f| f.bitpos)
}

pub fn desc_bound_bitsize(types: &TypeTable, bounds: TypeId, dimension: usize, which: BoundSide) -> Option<u64> {
    let base = desc_base_type(types, bounds);
    let field = types.get(base).fields().get(bound_field_index(dimension, which)?)?;
    Some(if field.bitsize > 0 { field.bitsize } else { 8 * types.length(types.check_typedef(field.ty)) })
}

/// Type of the low bound of dimension `i` (1-based), named `LB<i-1>`.
pub fn desc_index_type(types: &TypeTable, bounds: TypeId, dimension: usize) -> Option<TypeId> {
    let base = desc_base_type(types, bounds);
    if !types.is_struct(base) {
        return None;
    }
    lookup_struct_elt_type(types, base, &format!("LB{}", dimension.checked_sub(1)?))
}

pub fn desc_arity(types: &TypeTable, bounds: Option<TypeId>) -> usize {
    bounds.map_or(0, |b| types.get(desc_base_type(types, b)).fields().len() / 2)
}

pub fn is_array_descriptor_type(types: &TypeTable, ty: TypeId) -> bool {
    let Some(data) = desc_data_target_type(types, ty) else {
        return false;
    };
    types.is_array(data) && desc_arity(types, desc_bounds_type(types, ty)) > 0
}

/// A record shaped like a descriptor whose components make no sense.
pub fn is_bogus_array_descriptor(types: &TypeTable, ty: TypeId) -> bool {
    let base = types.check_typedef(ty);
    types.is_struct(base)
        && (types.field_index(base, "BOUNDS").is_some() || types.field_index(base, "P_BOUNDS").is_some())
        && !is_array_descriptor_type(types, base)
}

/// An array, or a pointer to one.
pub fn is_direct_array_type(types: &TypeTable, ty: TypeId) -> bool {
    let ty = types.check_typedef(ty);
    types.is_array(ty) || types.target(ty).is_some_and(|t| types.is_pointer(ty) && types.is_array(t))
}

pub fn is_simple_array_type(types: &TypeTable, ty: TypeId) -> bool {
    is_direct_array_type(types, ty)
}

/// Number of dimensions of an array or array descriptor.
pub fn array_arity(types: &TypeTable, ty: TypeId) -> usize {
    let base = desc_base_type(types, ty);
    if types.is_struct(base) {
        return desc_arity(types, desc_bounds_type(types, base));
    }
    let mut arity = 0;
    let mut cur = base;
    while let TypeKind::Array { element, .. } = types.kind(cur) {
        arity += 1;
        cur = types.check_typedef(*element);
    }
    arity
}

/// Element type after applying `nindices` subscripts (all of them when `None`).
pub fn array_element_type(types: &TypeTable, ty: TypeId, nindices: Option<usize>) -> Option<TypeId> {
    let ty = types.check_typedef(ty);
    let arity = array_arity(types, ty);
    let k = match nindices {
        Some(n) if n <= arity => n,
        Some(_) => return None,
        None => arity,
    };
    let mut cur = if is_array_descriptor_type(types, ty) {
        desc_data_target_type(types, ty)?
    } else {
        desc_base_type(types, ty)
    };
    for _ in 0..k {
        cur = types.array_element(cur)?;
    }
    Some(cur)
}

/// Element bit size from the `___XP<bits>` tail of a packed array type name.
pub fn packed_array_bitsize(types: &TypeTable, ty: TypeId) -> Option<u64> {
    let base = desc_base_type(types, ty);
    let name = types.name(types.check_typedef(ty)).or_else(|| types.name(base))?;
    names::packed_array_bitsize(name).map(u64::from)
}

pub fn is_packed_array_type(types: &TypeTable, ty: TypeId) -> bool {
    let base = desc_base_type(types, ty);
    types.name(base).is_some_and(|n| n.contains("___XP"))
        || types.name(types.check_typedef(ty)).is_some_and(|n| n.contains("___XP"))
}

/// A packed array with static bounds, encoded as a plain byte blob.
pub fn is_constrained_packed_array_type(types: &TypeTable, ty: TypeId) -> bool {
    is_packed_array_type(types, ty) && !is_array_descriptor_type(types, ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bound, Field, TypeDesc};

    struct Fixture {
        types: TypeTable,
        fat: TypeId,
        bounds: TypeId,
        array: TypeId,
    }

    fn fat_pointer() -> Fixture {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let index = types.add(TypeDesc::new(
            None,
            TypeKind::Range { base: int, low: Bound::Unknown, high: Bound::Unknown },
            4,
        ));
        let array = types.add(TypeDesc::named(
            "pck__vec",
            TypeKind::Array { element: int, index, element_bitsize: 0 },
            0,
        ));
        let bounds = types.add(TypeDesc::named(
            "pck__vec___XUB",
            TypeKind::Struct { fields: vec![Field::new("LB0", 0, int), Field::new("UB0", 32, int)] },
            8,
        ));
        let data_ptr = types.add(TypeDesc::new(None, TypeKind::Pointer { target: array }, 8));
        let bounds_ptr = types.add(TypeDesc::new(None, TypeKind::Pointer { target: bounds }, 8));
        let fat = types.add(TypeDesc::named(
            "pck__vec_ptr",
            TypeKind::Struct {
                fields: vec![Field::new("P_ARRAY", 0, data_ptr), Field::new("P_BOUNDS", 64, bounds_ptr)],
            },
            16,
        ));
        Fixture { types, fat, bounds, array }
    }

    #[test]
    fn fat_pointer_components() {
        let f = fat_pointer();
        assert!(is_thick_pointer(&f.types, f.fat));
        assert!(!is_thin_pointer(&f.types, f.fat));
        assert_eq!(desc_bounds_type(&f.types, f.fat), Some(f.bounds));
        assert_eq!(desc_data_target_type(&f.types, f.fat), Some(f.array));
        assert!(is_array_descriptor_type(&f.types, f.fat));
        assert_eq!(array_arity(&f.types, f.fat), 1);
        assert_eq!(fat_pointer_field_bitpos(&f.types, f.fat, DescriptorField::Bounds), Some(64));
        assert_eq!(fat_pointer_field_bitsize(&f.types, f.fat, DescriptorField::Data), Some(64));
    }

    #[test]
    fn bound_positions() {
        let f = fat_pointer();
        assert_eq!(desc_bound_bitpos(&f.types, f.bounds, 1, BoundSide::Low), Some(0));
        assert_eq!(desc_bound_bitpos(&f.types, f.bounds, 1, BoundSide::High), Some(32));
        assert_eq!(desc_bound_bitsize(&f.types, f.bounds, 1, BoundSide::High), Some(32));
        assert_eq!(desc_bound_bitpos(&f.types, f.bounds, 2, BoundSide::Low), None);
        assert_eq!(desc_bound_bitpos(&f.types, f.bounds, 0, BoundSide::Low), None);
        let int = f.types.builtins().integer;
        assert_eq!(desc_index_type(&f.types, f.bounds, 1), Some(int));
    }

    #[test]
    fn non_descriptors_are_not_applicable() {
        let f = fat_pointer();
        let int = f.types.builtins().integer;
        assert!(!is_array_descriptor_type(&f.types, int));
        assert_eq!(desc_bounds_type(&f.types, int), None);
        assert_eq!(array_arity(&f.types, int), 0);
        assert_eq!(array_arity(&f.types, f.array), 1);
        assert_eq!(array_element_type(&f.types, f.array, Some(1)), Some(int));
        assert_eq!(array_element_type(&f.types, f.array, Some(2)), None);
    }

    #[test]
    fn bogus_descriptor_detection() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let bogus = types.add(TypeDesc::new(
            None,
            TypeKind::Struct { fields: vec![Field::new("P_ARRAY", 0, int), Field::new("P_BOUNDS", 32, int)] },
            8,
        ));
        assert!(is_bogus_array_descriptor(&types, bogus));
    }

    #[test]
    fn packed_array_names() {
        let mut types = TypeTable::new();
        let blob = types.add(TypeDesc::named("pck__bits___XP3", TypeKind::Modular { modulus: 1 << 16 }, 2));
        assert!(is_packed_array_type(&types, blob));
        assert!(is_constrained_packed_array_type(&types, blob));
        assert_eq!(packed_array_bitsize(&types, blob), Some(3));
    }

    #[test]
    fn struct_elements_through_wrappers() {
        let mut types = TypeTable::new();
        let int = types.builtins().integer;
        let parent = types.add(TypeDesc::named(
            "pck__base",
            TypeKind::Struct { fields: vec![Field::new("_tag", 0, int), Field::new("id", 64, int)] },
            12,
        ));
        let child = types.add(TypeDesc::named(
            "pck__child",
            TypeKind::Struct { fields: vec![Field::new("_parent", 0, parent), Field::new("extra", 128, int)] },
            20,
        ));
        assert_eq!(lookup_struct_elt(&types, child, "id"), Some((int, 64)));
        assert_eq!(lookup_struct_elt(&types, child, "extra"), Some((int, 128)));
        assert_eq!(lookup_struct_elt(&types, child, "missing"), None);
    }
}
