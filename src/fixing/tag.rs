use crate::descriptor;
use crate::error::Result;
use crate::names;
use crate::session::Session;
use crate::types::{TypeId, TypeTable};
use tracing::debug;

const TSD_TYPE_NAME: &str = "ada__tags__type_specific_data";
const MAX_TAG_NAME: usize = 1024;

/// A record with a `_tag` component, directly or through its parents.
pub fn is_tagged_type(types: &TypeTable, ty: TypeId) -> bool {
    let base = types.check_typedef(ty);
    types.is_struct(base) && descriptor::lookup_struct_elt_type(types, base, "_tag").is_some()
}

/// Specific type of the tagged object of static type `record` at `address`.
pub(super) fn dynamic_type_at(s: &mut Session, record: TypeId, address: u64) -> Result<Option<TypeId>> {
    let Some((tag_type, bitpos)) = descriptor::lookup_struct_elt(&s.types, record, "_tag") else {
        return Ok(None);
    };
    let tag = match s.read_address(address + bitpos / 8) {
        Ok(tag) => tag,
        Err(err) if err.is_target() => {
            s.warn(format!("unable to read the tag of the object at {address:#x}: {err}"));
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    Ok(type_from_tag(s, tag, Some(tag_type)))
}

/// Type whose dispatch table `tag` points to. Results are cached for the
/// lifetime of the current inferior.
pub fn type_from_tag(s: &mut Session, tag: u64, tag_type: Option<TypeId>) -> Option<TypeId> {
    if tag == 0 {
        return None;
    }
    if let Some(cached) = s.cached_tag(tag) {
        return cached;
    }
    let ty = tag_name(s, tag, tag_type)
        .and_then(|name| names::encode(&name).ok())
        .and_then(|encoded| s.types.lookup(&encoded));
    debug!("tag {tag:#x} resolves to {:?}", ty.map(|t| s.types.display_name(t)));
    s.cache_tag(tag, ty);
    ty
}

/// Expanded Ada name recorded in the type-specific data of `tag`, lower
/// cased, or `None` when the runtime data cannot be read.
pub fn tag_name(s: &Session, tag: u64, tag_type: Option<TypeId>) -> Option<String> {
    let tsd_type = s.types.lookup(TSD_TYPE_NAME)?;
    let tsd = tsd_address(s, tag, tag_type)?;
    let (_, bitpos) = descriptor::lookup_struct_elt(&s.types, tsd_type, "expanded_name")?;
    let name_address = s.read_address(tsd + bitpos / 8).ok()?;
    if name_address == 0 {
        return None;
    }
    let mut name = Vec::new();
    let mut byte = [0u8; 1];
    while name.len() < MAX_TAG_NAME {
        s.target().read_memory(name_address + name.len() as u64, &mut byte).ok()?;
        if byte[0] == 0 {
            break;
        }
        name.push(byte[0]);
    }
    let name = String::from_utf8_lossy(&name).to_lowercase();
    (!name.is_empty()).then_some(name)
}

/// The type-specific data either hangs off a `tsd` component of the
/// dispatch table or sits one address before it.
fn tsd_address(s: &Session, tag: u64, tag_type: Option<TypeId>) -> Option<u64> {
    if let Some(table) = tag_type.and_then(|t| s.types.target(t))
        && let Some((_, bitpos)) = descriptor::lookup_struct_elt(&s.types, table, "tsd")
    {
        return s.read_address(tag + bitpos / 8).ok();
    }
    let size = u64::from(s.target().address_size());
    s.read_address(tag.checked_sub(size)?).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::symbols::SymbolTable;
    use crate::target::MemoryTarget;
    use crate::types::{Field, TypeDesc, TypeKind};

    fn tagged_types(types: &mut TypeTable) -> (TypeId, TypeId) {
        let address = types.builtins().address;
        let char_ptr = types.create_pointer(types.builtins().character);
        types.add(TypeDesc::named(
            TSD_TYPE_NAME,
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
            TypeKind::Struct {
                fields: vec![Field::new("_parent", 0, root), Field::new("extra", 64, types.builtins().integer)],
            },
            12,
        ));
        (root, child)
    }

    fn runtime() -> MemoryTarget {
        let mut target = MemoryTarget::new();
        // tsd pointer just before the dispatch table at 0x2008
        target.map(0x2000, 0x3000u64.to_le_bytes().to_vec());
        target.map(0x3000, [0u64.to_le_bytes(), 0x4000u64.to_le_bytes()].concat());
        target.map(0x4000, b"PCK.CHILD\0".to_vec());
        target
    }

    #[test]
    fn tag_name_comes_from_type_specific_data() {
        let mut types = TypeTable::new();
        let (root, _) = tagged_types(&mut types);
        let s = Session::new(types, SymbolTable::new(), EngineConfig::default()).with_target(runtime());
        assert!(is_tagged_type(&s.types, root));
        assert_eq!(tag_name(&s, 0x2008, None).as_deref(), Some("pck.child"));
    }

    #[test]
    fn type_from_tag_is_cached_per_inferior() {
        let mut types = TypeTable::new();
        let (_, child) = tagged_types(&mut types);
        let mut s = Session::new(types, SymbolTable::new(), EngineConfig::default()).with_target(runtime());
        assert_eq!(type_from_tag(&mut s, 0x2008, None), Some(child));
        assert_eq!(s.tag_cache_len(), 1);
        assert_eq!(type_from_tag(&mut s, 0x2008, None), Some(child));
        assert_eq!(s.tag_cache_len(), 1);
        assert_eq!(type_from_tag(&mut s, 0, None), None);
    }

    #[test]
    fn unreadable_tags_have_no_dynamic_type() {
        let mut types = TypeTable::new();
        tagged_types(&mut types);
        let mut s = Session::new(types, SymbolTable::new(), EngineConfig::default())
            .with_target(MemoryTarget::new());
        assert_eq!(type_from_tag(&mut s, 0x9008, None), None);
    }
}
