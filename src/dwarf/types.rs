use super::{attr, die_name, read_i64_from_attr, read_u64_from_attr, unit_ref};
use super::expr::member_location;
use crate::error::{Error, Result};
use crate::loader::DwarfSlice;
use crate::types::{Bound, EnumLiteral, Field, TypeDesc, TypeId, TypeKind, TypeTable, element_count};
use gimli::{AttributeValue, DebuggingInformationEntry, Dwarf, Unit, UnitOffset};
use std::collections::HashMap;
use tracing::trace;

/// Converts the type DIEs of one unit into [`TypeTable`] entries.
pub struct TypeBuilder<'a, 'b> {
    dwarf: &'b Dwarf<DwarfSlice<'a>>,
    unit: &'b Unit<DwarfSlice<'a>>,
    address_size: u8,
    big_endian: bool,
    /// Lower bound assumed when a subrange omits it.
    default_lower_bound: i64,
    cache: HashMap<UnitOffset, TypeId>,
}

impl<'a, 'b> TypeBuilder<'a, 'b> {
    pub fn new(
        dwarf: &'b Dwarf<DwarfSlice<'a>>,
        unit: &'b Unit<DwarfSlice<'a>>,
        address_size: u8,
        big_endian: bool,
        default_lower_bound: i64,
    ) -> Self {
        Self { dwarf, unit, address_size, big_endian, default_lower_bound, cache: HashMap::new() }
    }

    pub fn resolve(&mut self, table: &mut TypeTable, offset: UnitOffset) -> Result<TypeId> {
        self.resolve_inner(table, offset, 0)
    }

    /// Type referenced by `DW_AT_type` of `entry`, void when absent.
    pub fn type_of(
        &mut self,
        table: &mut TypeTable,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
    ) -> Result<Option<TypeId>> {
        self.type_ref(table, entry, 0)
    }

    fn type_ref(
        &mut self,
        table: &mut TypeTable,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        depth: usize,
    ) -> Result<Option<TypeId>> {
        match attr(entry, gimli::DW_AT_type).and_then(|v| unit_ref(self.unit, v)) {
            Some(offset) => self.resolve_inner(table, offset, depth + 1).map(Some),
            None => Ok(None),
        }
    }

    fn resolve_inner(&mut self, table: &mut TypeTable, offset: UnitOffset, depth: usize) -> Result<TypeId> {
        if let Some(&id) = self.cache.get(&offset) {
            return Ok(id);
        }
        if depth > 64 {
            return Err(Error::Dwarf(format!("type chain at {:#x} is too deep", offset.0)));
        }

        let entry = self
            .unit
            .entry(offset)
            .map_err(|e| Error::Dwarf(format!("Failed to get type entry: {}", e)))?;
        let name = die_name(self.dwarf, self.unit, &entry, gimli::DW_AT_name)?;
        let stub = matches!(attr(&entry, gimli::DW_AT_declaration), Some(AttributeValue::Flag(true)));
        let byte_size = read_u64_from_attr(attr(&entry, gimli::DW_AT_byte_size));
        let align = read_u64_from_attr(attr(&entry, gimli::DW_AT_alignment)).unwrap_or(0);
        let void = table.builtins().void;

        let id = match entry.tag() {
            gimli::DW_TAG_base_type => {
                let kind = match attr(&entry, gimli::DW_AT_encoding) {
                    Some(AttributeValue::Encoding(gimli::DW_ATE_boolean)) => TypeKind::Bool,
                    Some(AttributeValue::Encoding(gimli::DW_ATE_float)) => TypeKind::Float,
                    Some(AttributeValue::Encoding(gimli::DW_ATE_signed_char | gimli::DW_ATE_unsigned_char)) => {
                        TypeKind::Char
                    }
                    Some(AttributeValue::Encoding(gimli::DW_ATE_UTF)) => TypeKind::Char,
                    Some(AttributeValue::Encoding(gimli::DW_ATE_unsigned)) => TypeKind::Int { signed: false },
                    _ => TypeKind::Int { signed: true },
                };
                table.add(TypeDesc::new(name.as_deref(), kind, byte_size.unwrap_or(0)).with_align(align))
            }

            gimli::DW_TAG_pointer_type | gimli::DW_TAG_reference_type | gimli::DW_TAG_rvalue_reference_type => {
                let id = table.reserve(name.as_deref());
                self.cache.insert(offset, id);
                let target = self.type_ref(table, &entry, depth)?.unwrap_or(void);
                let kind = if entry.tag() == gimli::DW_TAG_pointer_type {
                    TypeKind::Pointer { target }
                } else {
                    TypeKind::Reference { target }
                };
                let length = byte_size.unwrap_or(self.address_size as u64);
                table.define(id, kind, length, align, false);
                id
            }

            gimli::DW_TAG_const_type
            | gimli::DW_TAG_volatile_type
            | gimli::DW_TAG_restrict_type
            | gimli::DW_TAG_atomic_type => {
                // Qualifiers carry no layout of their own.
                let id = self.type_ref(table, &entry, depth)?.unwrap_or(void);
                self.cache.insert(offset, id);
                return Ok(id);
            }

            gimli::DW_TAG_typedef => {
                let id = table.reserve(name.as_deref());
                self.cache.insert(offset, id);
                let target = self.type_ref(table, &entry, depth)?.unwrap_or(void);
                let length = table.length(table.check_typedef(target));
                table.define(id, TypeKind::Typedef { target }, length, align, stub);
                id
            }

            gimli::DW_TAG_subrange_type => self.subrange(table, &entry, name.as_deref(), depth, true)?,

            gimli::DW_TAG_enumeration_type => {
                let literals = self.enumerators(&entry)?;
                let length = byte_size.unwrap_or(4);
                table.add(TypeDesc::new(name.as_deref(), TypeKind::Enum { literals }, length).with_align(align))
            }

            gimli::DW_TAG_array_type => {
                let id = table.reserve(name.as_deref());
                self.cache.insert(offset, id);
                self.array(table, &entry, id, depth)?;
                id
            }

            gimli::DW_TAG_structure_type | gimli::DW_TAG_class_type | gimli::DW_TAG_union_type => {
                let id = table.reserve(name.as_deref());
                self.cache.insert(offset, id);
                let fields = self.members(table, &entry, depth)?;
                let kind = if entry.tag() == gimli::DW_TAG_union_type {
                    TypeKind::Union { fields }
                } else {
                    TypeKind::Struct { fields }
                };
                table.define(id, kind, byte_size.unwrap_or(0), align, stub || byte_size.is_none());
                id
            }

            gimli::DW_TAG_subroutine_type | gimli::DW_TAG_subprogram => {
                let id = table.reserve(name.as_deref());
                self.cache.insert(offset, id);
                let kind = self.function_kind(table, &entry, depth)?;
                table.define(id, kind, 1, 0, false);
                id
            }

            tag => {
                trace!("treating {tag} at {:#x} as void", offset.0);
                table.add(TypeDesc::new(name.as_deref(), TypeKind::Void, byte_size.unwrap_or(0)))
            }
        };

        self.cache.insert(offset, id);
        Ok(id)
    }

    /// Signature of a subprogram or subroutine type DIE.
    pub fn function_kind(
        &mut self,
        table: &mut TypeTable,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        depth: usize,
    ) -> Result<TypeKind> {
        let ret = self.type_ref(table, entry, depth)?;
        let mut params = Vec::new();
        let mut tree = self
            .unit
            .entries_tree(Some(entry.offset()))
            .map_err(|e| Error::Dwarf(format!("Failed to create tree: {}", e)))?;
        let root = tree.root().map_err(|e| Error::Dwarf(format!("Failed to get root: {}", e)))?;
        let mut children = root.children();
        while let Some(child) =
            children.next().map_err(|e| Error::Dwarf(format!("Failed to iterate: {}", e)))?
        {
            let child = child.entry();
            if child.tag() == gimli::DW_TAG_formal_parameter {
                let ty = self.type_ref(table, child, depth)?.unwrap_or(table.builtins().void);
                params.push(ty);
            }
        }
        Ok(TypeKind::Function { ret, params })
    }

    fn subrange(
        &mut self,
        table: &mut TypeTable,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        name: Option<&str>,
        depth: usize,
        standalone: bool,
    ) -> Result<TypeId> {
        let base = self.type_ref(table, entry, depth)?.unwrap_or(table.builtins().integer);
        let low = match self.bound(entry, gimli::DW_AT_lower_bound)? {
            Bound::Unknown if attr(entry, gimli::DW_AT_lower_bound).is_none() => {
                Bound::Static(self.default_lower_bound)
            }
            other => other,
        };
        let high = match (self.bound(entry, gimli::DW_AT_upper_bound)?, &low) {
            (Bound::Unknown, Bound::Static(lo)) => {
                match read_u64_from_attr(attr(entry, gimli::DW_AT_count)) {
                    Some(count) => Bound::Static(lo + count as i64 - 1),
                    None => Bound::Unknown,
                }
            }
            (high, _) => high,
        };
        let length = read_u64_from_attr(attr(entry, gimli::DW_AT_byte_size))
            .unwrap_or_else(|| table.length(table.check_typedef(base)));

        // A named range over an unsigned type starting at zero is how modular
        // types are described.
        if standalone
            && name.is_some()
            && table.is_unsigned(base)
            && let (Bound::Static(0), Bound::Static(hi)) = (&low, &high)
        {
            let modulus = (*hi as u64).wrapping_add(1);
            return Ok(table.add(TypeDesc::new(name, TypeKind::Modular { modulus }, length)));
        }
        Ok(table.add(TypeDesc::new(name, TypeKind::Range { base, low, high }, length)))
    }

    /// A subrange bound: a constant, or a reference to the variable holding it.
    fn bound(&self, entry: &DebuggingInformationEntry<DwarfSlice<'a>>, at: gimli::DwAt) -> Result<Bound> {
        let Some(value) = attr(entry, at) else {
            return Ok(Bound::Unknown);
        };
        if let Some(n) = read_i64_from_attr(Some(value.clone())) {
            return Ok(Bound::Static(n));
        }
        let Some(target) = unit_ref(self.unit, value) else {
            return Ok(Bound::Unknown);
        };
        let target = self
            .unit
            .entry(target)
            .map_err(|e| Error::Dwarf(format!("Failed to get bound entry: {}", e)))?;
        if matches!(target.tag(), gimli::DW_TAG_variable | gimli::DW_TAG_member)
            && let Some(name) = die_name(self.dwarf, self.unit, &target, gimli::DW_AT_name)?
        {
            return Ok(if target.tag() == gimli::DW_TAG_member {
                Bound::Discriminant(name)
            } else {
                Bound::Variable(name)
            });
        }
        Ok(Bound::Unknown)
    }

    fn enumerators(&self, entry: &DebuggingInformationEntry<DwarfSlice<'a>>) -> Result<Vec<EnumLiteral>> {
        let mut literals = Vec::new();
        let mut tree = self
            .unit
            .entries_tree(Some(entry.offset()))
            .map_err(|e| Error::Dwarf(format!("Failed to create tree: {}", e)))?;
        let root = tree.root().map_err(|e| Error::Dwarf(format!("Failed to get root: {}", e)))?;
        let mut children = root.children();
        while let Some(child) =
            children.next().map_err(|e| Error::Dwarf(format!("Failed to iterate: {}", e)))?
        {
            let child = child.entry();
            if child.tag() != gimli::DW_TAG_enumerator {
                continue;
            }
            let Some(name) = die_name(self.dwarf, self.unit, child, gimli::DW_AT_name)? else {
                continue;
            };
            let value = read_i64_from_attr(attr(child, gimli::DW_AT_const_value)).unwrap_or(literals.len() as i64);
            literals.push(EnumLiteral { name, value });
        }
        Ok(literals)
    }

    /// Fill the reserved array `id`. Multi-dimensional arrays become nested
    /// `Array` levels, the first dimension outermost.
    fn array(
        &mut self,
        table: &mut TypeTable,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        id: TypeId,
        depth: usize,
    ) -> Result<()> {
        let element = self.type_ref(table, entry, depth)?.unwrap_or(table.builtins().void);
        let mut bit_stride = read_u64_from_attr(attr(entry, gimli::DW_AT_bit_stride)).unwrap_or(0);
        let mut indexes = Vec::new();

        let mut tree = self
            .unit
            .entries_tree(Some(entry.offset()))
            .map_err(|e| Error::Dwarf(format!("Failed to create tree: {}", e)))?;
        let root = tree.root().map_err(|e| Error::Dwarf(format!("Failed to get root: {}", e)))?;
        let mut children = root.children();
        while let Some(child) =
            children.next().map_err(|e| Error::Dwarf(format!("Failed to iterate: {}", e)))?
        {
            let child = child.entry();
            match child.tag() {
                gimli::DW_TAG_subrange_type => {
                    if let Some(stride) = read_u64_from_attr(attr(child, gimli::DW_AT_bit_stride)) {
                        bit_stride = stride;
                    }
                    indexes.push(self.subrange(table, child, None, depth, false)?);
                }
                gimli::DW_TAG_enumeration_type => {
                    indexes.push(self.resolve_inner(table, child.offset(), depth + 1)?);
                }
                _ => {}
            }
        }
        if indexes.is_empty() {
            indexes.push(table.create_range(table.builtins().integer, 0, -1));
        }

        let element_len = table.length(table.check_typedef(element));
        let element_bitsize = if bit_stride > 0 && bit_stride != element_len * 8 { bit_stride } else { 0 };
        let mut inner = element;
        let last = indexes.len() - 1;
        for (dim, &index) in indexes.iter().enumerate().rev() {
            let count = table.discrete_bounds(index).map_or(0, |(lo, hi)| element_count(lo, hi));
            let stride_bits = if element_bitsize > 0 && dim == last {
                element_bitsize
            } else {
                table.length(table.check_typedef(inner)) * 8
            };
            let length = count.saturating_mul(stride_bits).div_ceil(8);
            let kind = TypeKind::Array { element: inner, index, element_bitsize: if dim == last { element_bitsize } else { 0 } };
            if dim == 0 {
                let length = read_u64_from_attr(attr(entry, gimli::DW_AT_byte_size)).unwrap_or(length);
                table.define(id, kind, length, 0, false);
            } else {
                inner = table.add(TypeDesc::new(None, kind, length));
            }
        }
        Ok(())
    }

    fn members(
        &mut self,
        table: &mut TypeTable,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        depth: usize,
    ) -> Result<Vec<Field>> {
        let mut fields = Vec::new();
        let mut tree = self
            .unit
            .entries_tree(Some(entry.offset()))
            .map_err(|e| Error::Dwarf(format!("Failed to create entries tree: {}", e)))?;
        let root = tree.root().map_err(|e| Error::Dwarf(format!("Failed to get tree root: {}", e)))?;

        let mut children = root.children();
        while let Some(child) = children
            .next()
            .map_err(|e| Error::Dwarf(format!("Failed to iterate children: {}", e)))?
        {
            let child = child.entry();
            let name = match child.tag() {
                gimli::DW_TAG_member => {
                    die_name(self.dwarf, self.unit, child, gimli::DW_AT_name)?.unwrap_or_default()
                }
                gimli::DW_TAG_inheritance => "_parent".to_string(),
                _ => continue,
            };
            let ty = self.type_ref(table, child, depth)?.unwrap_or(table.builtins().void);
            fields.push(self.member_field(table, child, name, ty)?);
        }
        Ok(fields)
    }

    /// Bit position and size of a member, normalized to big-endian-style
    /// positions from the start of the record for DWARF 4 bit fields.
    fn member_field(
        &self,
        table: &TypeTable,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        name: String,
        ty: TypeId,
    ) -> Result<Field> {
        let bit_size = read_u64_from_attr(attr(entry, gimli::DW_AT_bit_size)).unwrap_or(0);
        let data_bit_offset = read_u64_from_attr(attr(entry, gimli::DW_AT_data_bit_offset));
        let byte_offset = member_location(self.unit, entry)?;

        let bitpos = match (data_bit_offset, byte_offset) {
            (Some(bits), _) => bits,
            (None, Some(bytes)) => {
                let mut bitpos = bytes * 8;
                if let Some(raw) = read_u64_from_attr(attr(entry, gimli::DW_AT_bit_offset))
                    && bit_size > 0
                {
                    let storage_bits = read_u64_from_attr(attr(entry, gimli::DW_AT_byte_size))
                        .unwrap_or_else(|| table.length(table.check_typedef(ty)))
                        * 8;
                    if raw + bit_size <= storage_bits {
                        bitpos += if self.big_endian { raw } else { storage_bits - raw - bit_size };
                    }
                }
                bitpos
            }
            (None, None) => 0,
        };
        Ok(Field { name, bitpos, bitsize: bit_size, ty })
    }
}
