//! Building the type and symbol tables from DWARF.

mod context;
mod expr;
mod types;

pub use context::{DwarfContext, LoadSummary};
pub use types::TypeBuilder;

use crate::error::{Error, Result};
use crate::loader::DwarfSlice;
use gimli::{AttributeValue, DebuggingInformationEntry, Dwarf, Unit, UnitOffset};

/// Extract a u64 value from a DWARF attribute, handling various encoding forms.
/// Returns None for negative Sdata values (invalid for offsets/sizes/indices).
pub(crate) fn read_u64_from_attr(attr: Option<AttributeValue<DwarfSlice<'_>>>) -> Option<u64> {
    match attr? {
        AttributeValue::FileIndex(idx) => Some(idx),
        AttributeValue::Udata(v) => Some(v),
        AttributeValue::Data1(v) => Some(v as u64),
        AttributeValue::Data2(v) => Some(v as u64),
        AttributeValue::Data4(v) => Some(v as u64),
        AttributeValue::Data8(v) => Some(v),
        AttributeValue::Sdata(v) if v >= 0 => Some(v as u64),
        _ => None,
    }
}

/// Signed constant of a bound or enumerator. Fixed-size data forms are
/// sign-extended, as producers emit negative bounds that way.
pub(crate) fn read_i64_from_attr(attr: Option<AttributeValue<DwarfSlice<'_>>>) -> Option<i64> {
    match attr? {
        AttributeValue::Sdata(v) => Some(v),
        AttributeValue::Udata(v) => Some(v as i64),
        AttributeValue::Data1(v) => Some(v as i8 as i64),
        AttributeValue::Data2(v) => Some(v as i16 as i64),
        AttributeValue::Data4(v) => Some(v as i32 as i64),
        AttributeValue::Data8(v) => Some(v as i64),
        _ => None,
    }
}

pub(crate) fn attr<'a>(entry: &DebuggingInformationEntry<DwarfSlice<'a>>, name: gimli::DwAt) -> Option<AttributeValue<DwarfSlice<'a>>> {
    entry.attr_value(name).ok().flatten()
}

pub(crate) fn die_name<'a>(
    dwarf: &Dwarf<DwarfSlice<'a>>,
    unit: &Unit<DwarfSlice<'a>>,
    entry: &DebuggingInformationEntry<DwarfSlice<'a>>,
    name: gimli::DwAt,
) -> Result<Option<String>> {
    match entry.attr_value(name) {
        Ok(Some(value)) => {
            let name = dwarf
                .attr_string(unit, value)
                .map_err(|e| Error::Dwarf(format!("Failed to read name: {}", e)))?;
            Ok(Some(name.to_string_lossy().to_string()))
        }
        Ok(None) => Ok(None),
        Err(e) => Err(Error::Dwarf(format!("Failed to read name attribute: {}", e))),
    }
}

/// Unit-relative offset of a reference attribute such as `DW_AT_type`.
pub(crate) fn unit_ref(unit: &Unit<DwarfSlice<'_>>, value: AttributeValue<DwarfSlice<'_>>) -> Option<UnitOffset> {
    match value {
        AttributeValue::UnitRef(offset) => Some(offset),
        AttributeValue::DebugInfoRef(debug_info_offset) => {
            let unit_debug_offset = unit.header.offset().as_debug_info_offset()?;
            let offset = debug_info_offset.0.checked_sub(unit_debug_offset.0)?;
            Some(UnitOffset(offset))
        }
        _ => None,
    }
}
