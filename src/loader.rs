use crate::dwarf::{DwarfContext, LoadSummary};
use crate::error::{Error, Result};
use crate::symbols::SymbolTable;
use crate::types::TypeTable;
use gimli::{Dwarf, EndianSlice, RunTimeEndian, SectionId};
use memmap2::Mmap;
use object::{Object, ObjectSection, ObjectSymbol, SymbolKind};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::pin::Pin;
use tracing::debug;

pub struct BinaryData {
    pub mmap: Mmap,
}

pub type DwarfSlice<'a> = EndianSlice<'a, RunTimeEndian>;

/// Storage for decompressed DWARF sections.
/// Pinned to ensure stable addresses for slices pointing into the data.
pub struct DecompressedSections {
    sections: HashMap<&'static str, Vec<u8>>,
}

impl DecompressedSections {
    fn new() -> Pin<Box<Self>> {
        Box::pin(Self { sections: HashMap::new() })
    }

    fn insert(self: &mut Pin<Box<Self>>, name: &'static str, data: Vec<u8>) {
        // SAFETY: We only modify the HashMap contents, not the Box location.
        // The HashMap's heap allocations (Vec<u8>) have stable addresses.
        unsafe { self.as_mut().get_unchecked_mut() }.sections.insert(name, data);
    }

    fn get(&self, name: &str) -> Option<&[u8]> {
        self.sections.get(name).map(|v| v.as_slice())
    }
}

pub struct LoadedDwarf<'a> {
    pub dwarf: Dwarf<DwarfSlice<'a>>,
    pub address_size: u8,
    pub endian: RunTimeEndian,
    /// Keeps the decompressed section data the `dwarf` slices point into.
    _decompressed_sections: Pin<Box<DecompressedSections>>,
}

/// Debug sections read, with their compressed (`.zdebug_*`) spelling.
const DEBUG_SECTIONS: &[(&str, &str)] = &[
    (".debug_abbrev", ".zdebug_abbrev"),
    (".debug_addr", ".zdebug_addr"),
    (".debug_aranges", ".zdebug_aranges"),
    (".debug_info", ".zdebug_info"),
    (".debug_line", ".zdebug_line"),
    (".debug_line_str", ".zdebug_line_str"),
    (".debug_loc", ".zdebug_loc"),
    (".debug_loclists", ".zdebug_loclists"),
    (".debug_ranges", ".zdebug_ranges"),
    (".debug_rnglists", ".zdebug_rnglists"),
    (".debug_str", ".zdebug_str"),
    (".debug_str_offsets", ".zdebug_str_offsets"),
    (".debug_types", ".zdebug_types"),
];

/// Type and symbol tables of one program, ready to start a session on.
pub struct ProgramDatabase {
    pub types: TypeTable,
    pub symbols: SymbolTable,
    pub big_endian: bool,
    pub summary: LoadSummary,
}

impl BinaryData {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and we keep the mmap alive
        // for the lifetime of BinaryData.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    fn object(&self) -> Result<object::File<'_>> {
        let object = object::File::parse(&*self.mmap)?;
        if !matches!(
            object.format(),
            object::BinaryFormat::Elf | object::BinaryFormat::MachO | object::BinaryFormat::Pe
        ) {
            return Err(Error::UnsupportedFormat);
        }
        Ok(object)
    }

    pub fn load_dwarf(&self) -> Result<LoadedDwarf<'_>> {
        let object = self.object()?;
        let endian =
            if object.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let mut decompressed_sections = DecompressedSections::new();
        for &(debug_name, zdebug_name) in DEBUG_SECTIONS {
            for name in [debug_name, zdebug_name] {
                if let Some(section) = object.section_by_name(name)
                    && let Ok(Cow::Owned(vec)) = section.uncompressed_data()
                {
                    decompressed_sections.insert(name, vec);
                }
            }
        }

        // SAFETY: The Pin<Box<DecompressedSections>> ensures the data won't move.
        // We only read from it in the closure, and the LoadedDwarf keeps it alive.
        let decompressed_ptr = &*decompressed_sections as *const DecompressedSections;

        let load_section = |id: SectionId| -> std::result::Result<DwarfSlice<'_>, gimli::Error> {
            let section_name = id.name();
            let zdebug_name = section_name.replace(".debug_", ".zdebug_");

            let try_load = |name: &str| -> Option<&[u8]> {
                // SAFETY: decompressed_ptr points to pinned data that outlives this closure
                let decompressed = unsafe { &*decompressed_ptr };
                if let Some(slice) = decompressed.get(name) {
                    return Some(slice);
                }
                object.section_by_name(name).and_then(|s| s.uncompressed_data().ok()).and_then(
                    |data| match data {
                        Cow::Borrowed(b) => Some(b),
                        Cow::Owned(_) => None,
                    },
                )
            };

            let slice = try_load(section_name).or_else(|| try_load(&zdebug_name)).unwrap_or(&[]);
            Ok(EndianSlice::new(slice, endian))
        };

        let dwarf = Dwarf::load(load_section).map_err(|e| Error::Dwarf(e.to_string()))?;

        let mut units = dwarf.units();
        if units.next().map_err(|e| Error::Dwarf(e.to_string()))?.is_none() {
            return Err(Error::NoDebugInfo);
        }

        Ok(LoadedDwarf {
            dwarf,
            address_size: if object.is_64() { 8 } else { 4 },
            endian,
            _decompressed_sections: decompressed_sections,
        })
    }

    /// Record every defined text and data symbol of the object file.
    pub fn load_minimal_symbols(&self, symbols: &mut SymbolTable) -> Result<usize> {
        let object = self.object()?;
        let mut count = 0;
        for symbol in object.symbols().chain(object.dynamic_symbols()) {
            if symbol.is_undefined() || !matches!(symbol.kind(), SymbolKind::Text | SymbolKind::Data) {
                continue;
            }
            let Ok(name) = symbol.name() else { continue };
            if name.is_empty() {
                continue;
            }
            symbols.add_minimal_symbol(name, symbol.address());
            count += 1;
        }
        Ok(count)
    }

    /// Build the full type and symbol database of the program.
    pub fn load_database(&self) -> Result<ProgramDatabase> {
        let loaded = self.load_dwarf()?;
        let context = DwarfContext::new(&loaded);
        let mut types = TypeTable::new();
        let mut symbols = SymbolTable::new();
        let summary = context.load_into(&mut types, &mut symbols)?;
        let minimal = self.load_minimal_symbols(&mut symbols)?;
        debug!("{minimal} minimal symbols");
        Ok(ProgramDatabase { types, symbols, big_endian: context.is_big_endian(), summary })
    }
}
