use crate::error::{Error, Result};
use crate::loader::{DwarfSlice, LoadedDwarf};
use crate::symbols::{BlockId, Domain, Symbol, SymbolClass, SymbolTable};
use crate::types::{TypeDesc, TypeKind, TypeTable};
use gimli::{AttributeValue, DebuggingInformationEntry, Dwarf, EntriesTreeNode, Unit};
use serde::Serialize;
use tracing::{debug, trace};

use super::TypeBuilder;
use super::expr::location_class;
use super::{attr, die_name, read_i64_from_attr};

/// Counts of what a load added, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub units: usize,
    pub types: usize,
    pub symbols: usize,
}

pub struct DwarfContext<'a> {
    dwarf: &'a Dwarf<DwarfSlice<'a>>,
    address_size: u8,
    endian: gimli::RunTimeEndian,
}

/// Where a walk over DIEs is adding symbols.
#[derive(Clone, Copy)]
struct Scope {
    block: BlockId,
    /// Unit-level scope, where external objects go to the global block.
    file_level: bool,
}

impl<'a> DwarfContext<'a> {
    pub fn new(loaded: &'a LoadedDwarf<'a>) -> Self {
        Self { dwarf: &loaded.dwarf, address_size: loaded.address_size, endian: loaded.endian }
    }

    pub fn is_big_endian(&self) -> bool {
        self.endian == gimli::RunTimeEndian::Big
    }

    /// Populate `types` and `symbols` from every compilation unit.
    pub fn load_into(&self, types: &mut TypeTable, symbols: &mut SymbolTable) -> Result<LoadSummary> {
        let types_before = types.len();
        let symbols_before = symbols.symbols().count();
        let mut summary = LoadSummary::default();
        let mut units = self.dwarf.units();

        while let Some(header) =
            units.next().map_err(|e| Error::Dwarf(format!("Failed to read unit header: {}", e)))?
        {
            let unit = self
                .dwarf
                .unit(header)
                .map_err(|e| Error::Dwarf(format!("Failed to parse unit: {}", e)))?;

            self.process_unit(&unit, types, symbols)?;
            summary.units += 1;
        }

        summary.types = types.len() - types_before;
        summary.symbols = symbols.symbols().count() - symbols_before;
        debug!("loaded {} units, {} types, {} symbols", summary.units, summary.types, summary.symbols);
        Ok(summary)
    }

    fn process_unit(
        &self,
        unit: &Unit<DwarfSlice<'a>>,
        types: &mut TypeTable,
        symbols: &mut SymbolTable,
    ) -> Result<()> {
        let mut tree =
            unit.entries_tree(None).map_err(|e| Error::Dwarf(format!("Failed to create entries tree: {}", e)))?;
        let root = tree.root().map_err(|e| Error::Dwarf(format!("Failed to get tree root: {}", e)))?;

        let lower_bound = match attr(root.entry(), gimli::DW_AT_language) {
            Some(AttributeValue::Language(lang)) if is_one_based(lang) => 1,
            _ => 0,
        };
        let mut builder = TypeBuilder::new(self.dwarf, unit, self.address_size, self.is_big_endian(), lower_bound);
        let block = symbols.add_static_block();
        self.process_children(unit, root, Scope { block, file_level: true }, &mut builder, types, symbols)
    }

    fn process_children(
        &self,
        unit: &Unit<DwarfSlice<'a>>,
        node: EntriesTreeNode<DwarfSlice<'a>>,
        scope: Scope,
        builder: &mut TypeBuilder<'a, '_>,
        types: &mut TypeTable,
        symbols: &mut SymbolTable,
    ) -> Result<()> {
        let mut children = node.children();
        while let Some(child) = children
            .next()
            .map_err(|e| Error::Dwarf(format!("Failed to iterate children: {}", e)))?
        {
            let entry = child.entry();
            match entry.tag() {
                gimli::DW_TAG_subprogram => {
                    if let Some(body) = self.process_subprogram(unit, entry, scope, builder, types, symbols)? {
                        let body = Scope { block: body, file_level: false };
                        self.process_children(unit, child, body, builder, types, symbols)?;
                    }
                }
                gimli::DW_TAG_lexical_block => {
                    let block = symbols.add_lexical_block(scope.block);
                    let inner = Scope { block, file_level: false };
                    self.process_children(unit, child, inner, builder, types, symbols)?;
                }
                gimli::DW_TAG_namespace | gimli::DW_TAG_module => {
                    self.process_children(unit, child, scope, builder, types, symbols)?;
                }
                gimli::DW_TAG_variable | gimli::DW_TAG_constant | gimli::DW_TAG_formal_parameter => {
                    self.process_object(unit, entry, scope, builder, types, symbols)?;
                }
                gimli::DW_TAG_base_type
                | gimli::DW_TAG_structure_type
                | gimli::DW_TAG_union_type
                | gimli::DW_TAG_enumeration_type
                | gimli::DW_TAG_typedef
                | gimli::DW_TAG_subrange_type
                | gimli::DW_TAG_array_type
                | gimli::DW_TAG_pointer_type => {
                    self.process_type(unit, entry, scope, builder, types, symbols)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Add a subprogram symbol and return the block its locals go in.
    fn process_subprogram(
        &self,
        unit: &Unit<DwarfSlice<'a>>,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        scope: Scope,
        builder: &mut TypeBuilder<'a, '_>,
        types: &mut TypeTable,
        symbols: &mut SymbolTable,
    ) -> Result<Option<BlockId>> {
        let Some(name) = self.linkage_name(unit, entry)? else {
            return Ok(None);
        };
        let Some(entry_pc) = self.low_pc(unit, entry)? else {
            trace!("skipping subprogram {name} without code");
            return Ok(None);
        };
        let kind = builder.function_kind(types, entry, 0)?;
        let ty = types.add(TypeDesc::new(None, kind, 1));
        let block = if scope.file_level && is_external(entry) { symbols.global_block() } else { scope.block };
        let symbol = symbols.add_symbol(
            block,
            Symbol::new(&name, Domain::Var, SymbolClass::Function { entry: entry_pc }, Some(ty)),
        );
        Ok(Some(symbols.add_function_block(scope.block, symbol)))
    }

    fn process_object(
        &self,
        unit: &Unit<DwarfSlice<'a>>,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        scope: Scope,
        builder: &mut TypeBuilder<'a, '_>,
        types: &mut TypeTable,
        symbols: &mut SymbolTable,
    ) -> Result<()> {
        let Some(name) = self.linkage_name(unit, entry)? else {
            return Ok(());
        };
        let ty = builder.type_of(types, entry)?;
        let is_parameter = entry.tag() == gimli::DW_TAG_formal_parameter;

        let class = if let Some(value) = read_i64_from_attr(attr(entry, gimli::DW_AT_const_value)) {
            SymbolClass::Constant { value }
        } else {
            match attr(entry, gimli::DW_AT_location) {
                Some(AttributeValue::Exprloc(expr)) => {
                    location_class(expr, unit.encoding(), is_parameter).unwrap_or(SymbolClass::OptimizedOut)
                }
                Some(_) => SymbolClass::OptimizedOut,
                None if attr(entry, gimli::DW_AT_declaration).is_some() => SymbolClass::Unresolved,
                None => SymbolClass::OptimizedOut,
            }
        };
        let block = if scope.file_level && is_external(entry) { symbols.global_block() } else { scope.block };
        symbols.add_symbol(block, Symbol::new(&name, Domain::Var, class, ty));
        Ok(())
    }

    /// Build a named type and declare it; enumeration literals become
    /// constants in the same block.
    fn process_type(
        &self,
        unit: &Unit<DwarfSlice<'a>>,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
        scope: Scope,
        builder: &mut TypeBuilder<'a, '_>,
        types: &mut TypeTable,
        symbols: &mut SymbolTable,
    ) -> Result<()> {
        let id = builder.resolve(types, entry.offset())?;
        let Some(name) = die_name(self.dwarf, unit, entry, gimli::DW_AT_name)? else {
            return Ok(());
        };
        let domain = match entry.tag() {
            gimli::DW_TAG_structure_type | gimli::DW_TAG_union_type => Domain::Struct,
            _ => Domain::Var,
        };
        symbols.add_symbol(scope.block, Symbol::new(&name, domain, SymbolClass::Typedef, Some(id)));
        if let TypeKind::Enum { literals } = types.kind(id) {
            for literal in literals {
                symbols.add_symbol(
                    scope.block,
                    Symbol::new(&literal.name, Domain::Var, SymbolClass::Constant { value: literal.value }, Some(id)),
                );
            }
        }
        Ok(())
    }

    fn linkage_name(
        &self,
        unit: &Unit<DwarfSlice<'a>>,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
    ) -> Result<Option<String>> {
        if let Some(name) = die_name(self.dwarf, unit, entry, gimli::DW_AT_linkage_name)? {
            return Ok(Some(name));
        }
        if let Some(name) = die_name(self.dwarf, unit, entry, gimli::DW_AT_MIPS_linkage_name)? {
            return Ok(Some(name));
        }
        die_name(self.dwarf, unit, entry, gimli::DW_AT_name)
    }

    fn low_pc(
        &self,
        unit: &Unit<DwarfSlice<'a>>,
        entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
    ) -> Result<Option<u64>> {
        match attr(entry, gimli::DW_AT_low_pc) {
            Some(AttributeValue::Addr(address)) => Ok(Some(address)),
            Some(AttributeValue::DebugAddrIndex(index)) => self
                .dwarf
                .address(unit, index)
                .map(Some)
                .map_err(|e| Error::Dwarf(format!("Failed to read low_pc: {}", e))),
            _ => Ok(None),
        }
    }
}

fn is_external(entry: &DebuggingInformationEntry<DwarfSlice<'_>>) -> bool {
    matches!(attr(entry, gimli::DW_AT_external), Some(AttributeValue::Flag(true)))
}

/// Languages whose array bounds default to 1.
fn is_one_based(lang: gimli::DwLang) -> bool {
    matches!(
        lang,
        gimli::DW_LANG_Ada83
            | gimli::DW_LANG_Ada95
            | gimli::DwLang(0x2c)
            | gimli::DwLang(0x2e)
            | gimli::DW_LANG_Fortran77
            | gimli::DW_LANG_Fortran90
            | gimli::DW_LANG_Fortran95
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ada_arrays_default_to_one() {
        assert!(is_one_based(gimli::DW_LANG_Ada95));
        assert!(!is_one_based(gimli::DW_LANG_C99));
    }
}
