//! Ada dynamic type resolution and expression evaluation for debuggers.
//!
//! GNAT describes variable-size records, unconstrained arrays, packed data,
//! fixed-point types and renamings through naming conventions layered on
//! ordinary debug information. This crate reads those conventions, derives
//! the static layout of a value from its run-time contents, resolves and
//! disambiguates Ada names, and evaluates Ada expression trees against a
//! target's memory.

pub mod catchpoint;
pub mod cli;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod dwarf;
pub mod error;
pub mod eval;
pub mod fixing;
pub mod loader;
pub mod logging;
pub mod lookup;
pub mod names;
pub mod output;
pub mod session;
pub mod symbols;
pub mod target;
pub mod types;
pub mod value;

pub use catchpoint::{CatchKind, CatchpointLocation, catchpoint_location};
pub use cli::{Cli, Commands, DomainArg, OutputFormat};
pub use config::EngineConfig;
pub use dwarf::DwarfContext;
pub use error::{Error, Result};
pub use eval::{EvalMode, Expr, evaluate, evaluate_expression};
pub use fixing::{fix_type, fix_value};
pub use loader::{BinaryData, LoadedDwarf, ProgramDatabase};
pub use lookup::{AdaSymbolInfo, lookup_symbol_list};
pub use session::Session;
pub use target::{MemoryTarget, Target};
pub use types::{TypeId, TypeTable};
pub use value::Value;
