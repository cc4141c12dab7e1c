//! Rendering of command results.

mod json;
mod table;

pub use json::JsonFormatter;
pub use table::TableFormatter;

use crate::lookup::{self, AdaSymbolInfo};
use crate::session::Session;
use crate::symbols::{BlockKind, SymbolClass};
use serde::Serialize;

/// One symbol found by a lookup.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolReport {
    pub name: String,
    pub linkage_name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub location: String,
    pub scope: BlockKind,
}

impl SymbolReport {
    pub fn new(s: &Session, info: &AdaSymbolInfo) -> Self {
        let sym = s.symbols.symbol(info.symbol);
        let location = match &sym.class {
            SymbolClass::Constant { value } => format!("= {value}"),
            SymbolClass::Static { address } => format!("{address:#x}"),
            SymbolClass::Function { entry } => format!("{entry:#x}"),
            SymbolClass::Register { regnum } => format!("register {regnum}"),
            SymbolClass::Argument { frame_offset } | SymbolClass::Computed { frame_offset } => {
                format!("frame{frame_offset:+}")
            }
            SymbolClass::Typedef => "-".to_string(),
            SymbolClass::Unresolved => "unresolved".to_string(),
            SymbolClass::OptimizedOut => "optimized out".to_string(),
        };
        Self {
            name: sym.natural_name.clone(),
            linkage_name: sym.linkage_name.clone(),
            description: lookup::describe_symbol(s, info),
            type_name: sym.ty.map(|ty| s.types.display_name(ty)),
            location,
            scope: s.symbols.block(info.block).kind,
        }
    }
}

/// Result of the `decode` and `encode` commands.
#[derive(Debug, Clone, Serialize)]
pub struct NameReport {
    pub input: String,
    pub output: String,
}
