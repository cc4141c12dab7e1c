//! Ada symbol lookup.
//!
//! A name without `__` is matched in wildcard mode: it may denote the last
//! components of any qualified name (`foo` matches `pck__foo` and
//! `pck__inner__foo___2`). A qualified name must match exactly, apart from
//! the numeric and `___` noise suffixes the compiler appends. Lexically
//! enclosing blocks are searched first; global and then file-static
//! symbols are searched only when no local symbol matches.

mod overload;

pub use overload::{
    OverloadSelector, ScriptedSelector, Selection, args_match, resolve_function, return_match,
    type_match, user_select_syms,
};

use crate::error::{Error, Result};
use crate::names::{self, RenamingKind};
use crate::session::Session;
use crate::symbols::{BlockId, Domain, SymbolClass, SymbolId, SymbolTable};
use crate::types::{TypeId, TypeKind, TypeTable};
use crate::value::{Lval, Value};
use serde::Serialize;
use tracing::{debug, trace};

/// A symbol together with the block it was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdaSymbolInfo {
    pub symbol: SymbolId,
    pub block: BlockId,
}

const STANDARD_PREFIX: &str = "standard__";

fn domain_matches(symbol_domain: Domain, wanted: Domain) -> bool {
    symbol_domain == wanted || (wanted == Domain::Var && symbol_domain == Domain::Struct)
}

fn name_matches(linkage: &str, name: &str, wild: bool) -> bool {
    if wild {
        return names::wild_match(linkage, name);
    }
    names::full_match(linkage, name)
}

/// Symbols of one block matching `name`. Formal parameters are only
/// reported when nothing else in the block matches.
fn add_block_symbols(
    symbols: &SymbolTable,
    block: BlockId,
    name: &str,
    domain: Domain,
    wild: bool,
    out: &mut Vec<AdaSymbolInfo>,
) {
    let mut arg_sym = None;
    let mut found = false;
    for (id, sym) in symbols.block_symbols(block) {
        if !domain_matches(sym.domain, domain) || !name_matches(&sym.linkage_name, name, wild) {
            continue;
        }
        match sym.class {
            SymbolClass::Unresolved => continue,
            SymbolClass::Argument { .. } => arg_sym = Some(id),
            _ => {
                found = true;
                add_defn(out, AdaSymbolInfo { symbol: id, block });
            }
        }
    }
    if !found && let Some(id) = arg_sym {
        add_defn(out, AdaSymbolInfo { symbol: id, block });
    }
}

fn add_defn(out: &mut Vec<AdaSymbolInfo>, info: AdaSymbolInfo) {
    if !out.iter().any(|o| o.symbol == info.symbol) {
        out.push(info);
    }
}

/// Whether any candidate is something other than a subprogram or an
/// enumeration literal, which could still be overloaded further out.
pub(crate) fn is_nonfunction(symbols: &SymbolTable, types: &TypeTable, found: &[AdaSymbolInfo]) -> bool {
    found.iter().any(|info| {
        let sym = symbols.symbol(info.symbol);
        let ty = sym.ty.map(|t| types.check_typedef(t));
        let is_func = sym.is_function() || ty.is_some_and(|t| types.is_function(t));
        let is_enumeral = matches!(sym.class, SymbolClass::Constant { .. }) && ty.is_some_and(|t| types.is_enum(t));
        !is_func && !is_enumeral
    })
}

/// All symbols named `name` (encoded) visible from `block` in `domain`.
pub fn lookup_symbol_list(
    s: &Session,
    name: &str,
    block: Option<BlockId>,
    domain: Domain,
) -> Vec<AdaSymbolInfo> {
    let symbols = &s.symbols;
    let types = &s.types;
    let wild = !name.contains("__");
    let (name, block) = match name.strip_prefix(STANDARD_PREFIX) {
        Some(rest) => (rest, None),
        None => (name, block),
    };
    let mut found = Vec::new();

    let mut local_done = false;
    if let Some(start) = block {
        let mut cur = Some(start);
        while let Some(b) = cur {
            add_block_symbols(symbols, b, name, domain, wild, &mut found);
            if is_nonfunction(symbols, types, &found) {
                break;
            }
            cur = symbols.superblock(b);
        }
        local_done = !found.is_empty();
    }
    if !local_done {
        add_block_symbols(symbols, symbols.global_block(), name, domain, wild, &mut found);
        if found.is_empty() {
            for &b in symbols.static_blocks() {
                add_block_symbols(symbols, b, name, domain, wild, &mut found);
            }
        }
    }

    let found = remove_extra_symbols(symbols, types, found);
    let found = remove_irrelevant_renamings(symbols, found, block);
    trace!("lookup {name} ({}) found {} symbols", if wild { "wild" } else { "exact" }, found.len());
    found
}

/// Fold and encode a user-written name, then look it up.
pub fn lookup_name(s: &Session, user_name: &str, block: Option<BlockId>, domain: Domain) -> Result<Vec<AdaSymbolInfo>> {
    let encoded = names::encode(&names::fold_name(user_name))?;
    Ok(lookup_symbol_list(s, &encoded, block, domain))
}

/// First symbol named `name` visible from `block`.
pub fn lookup_symbol(s: &Session, name: &str, block: Option<BlockId>, domain: Domain) -> Option<AdaSymbolInfo> {
    lookup_symbol_list(s, name, block, domain).into_iter().next()
}

/// Drop stubs shadowed by complete definitions and duplicate static
/// entries of the same name and address.
fn remove_extra_symbols(symbols: &SymbolTable, types: &TypeTable, found: Vec<AdaSymbolInfo>) -> Vec<AdaSymbolInfo> {
    let is_stub = |info: &AdaSymbolInfo| {
        let sym = symbols.symbol(info.symbol);
        sym.stub || sym.ty.is_some_and(|t| types.get(t).stub)
    };
    let mut keep = vec![true; found.len()];
    for (i, a) in found.iter().enumerate() {
        let sa = symbols.symbol(a.symbol);
        if is_stub(a) {
            keep[i] = !found.iter().enumerate().any(|(j, b)| {
                j != i && !is_stub(b) && symbols.symbol(b.symbol).linkage_name == sa.linkage_name
            });
        } else if let SymbolClass::Static { address } = sa.class {
            keep[i] = !found[..i].iter().enumerate().any(|(j, b)| {
                let sb = symbols.symbol(b.symbol);
                keep[j] && sb.linkage_name == sa.linkage_name && sb.class == SymbolClass::Static { address }
            });
        }
    }
    found.into_iter().zip(keep).filter_map(|(info, k)| k.then_some(info)).collect()
}

/// Apply renaming visibility: a `___XR` renaming hides the entities of the
/// same prefix declared in its block, and legacy object renamings are only
/// visible inside the subprogram that declares them.
fn remove_irrelevant_renamings(
    symbols: &SymbolTable,
    mut found: Vec<AdaSymbolInfo>,
    current: Option<BlockId>,
) -> Vec<AdaSymbolInfo> {
    if found.len() < 2 {
        return found;
    }
    let mut hidden = vec![false; found.len()];
    let mut new_style = false;
    for (i, info) in found.iter().enumerate() {
        let sym = symbols.symbol(info.symbol);
        if sym.is_typedef() {
            continue;
        }
        let Some(at) = sym.linkage_name.find("___XR") else {
            continue;
        };
        new_style = true;
        let prefix = &sym.linkage_name[..at];
        for (j, other) in found.iter().enumerate() {
            if i != j
                && other.block == info.block
                && symbols.symbol(other.symbol).linkage_name.starts_with(prefix)
            {
                hidden[j] = true;
            }
        }
    }
    if new_style {
        return found.into_iter().zip(hidden).filter_map(|(info, h)| (!h).then_some(info)).collect();
    }

    let Some(function) = current.and_then(|b| symbols.enclosing_function(b)) else {
        return found;
    };
    let function_name = symbols.symbol(function).linkage_name.clone();
    found.retain(|info| {
        let sym = symbols.symbol(info.symbol);
        let is_object_renaming = sym.is_typedef()
            && names::parse_renaming(&sym.linkage_name).is_some_and(|r| r.kind == RenamingKind::Object);
        !is_object_renaming || function_name.contains(&sym.linkage_name)
    });
    found
}

/// Type named `name` (encoded), either declared by a type symbol or known
/// to the type table directly.
pub fn find_type(s: &Session, name: &str) -> Option<TypeId> {
    let found = lookup_symbol_list(s, name, s.frame.block, Domain::Var);
    for info in &found {
        let sym = s.symbols.symbol(info.symbol);
        if sym.is_typedef() {
            return sym.ty;
        }
    }
    s.types.lookup(name)
}

/// Value of the variable or constant `sym`.
pub fn symbol_value(s: &Session, id: SymbolId) -> Result<Value> {
    let sym = s.symbols.symbol(id);
    let ty = sym.ty.unwrap_or_else(|| s.types.builtins().integer);
    match &sym.class {
        SymbolClass::Constant { value } => Ok(s.value_from_long(ty, *value)),
        SymbolClass::Static { address } => Ok(Value::lazy_at(ty, *address)),
        SymbolClass::Function { entry } => Ok(Value::lazy_at(ty, *entry)),
        SymbolClass::Register { regnum } => {
            let mut bytes = s.target().read_register(*regnum)?;
            bytes.resize(s.types.length(s.types.check_typedef(ty)) as usize, 0);
            let mut v = Value::from_bytes(ty, bytes);
            v.lval = Lval::Register(*regnum);
            Ok(v)
        }
        SymbolClass::Argument { frame_offset } | SymbolClass::Computed { frame_offset } => {
            let base = s.frame.frame_base.ok_or_else(|| Error::eval("No frame selected."))?;
            Ok(Value::lazy_at(ty, base.wrapping_add_signed(*frame_offset)))
        }
        SymbolClass::Unresolved => match s.symbols.minimal_symbol(&sym.linkage_name) {
            Some(address) => Ok(Value::lazy_at(ty, address)),
            None => Err(Error::eval(format!("No symbol \"{}\" in current context.", sym.natural_name))),
        },
        SymbolClass::OptimizedOut => Err(Error::eval(format!("{} has been optimized out", sym.natural_name))),
        SymbolClass::Typedef => Err(Error::eval("Attempt to use a type name as an expression")),
    }
}

/// Integer value of the unique variable named exactly `name`, as used by
/// the `___L`, `___U` and `___XVZ` encodings. Unreadable variables count
/// as missing.
pub fn get_int_var_value(s: &Session, name: &str) -> Result<Option<i64>> {
    let found = lookup_symbol_list(s, name, None, Domain::Var);
    let [info] = found.as_slice() else {
        return Ok(None);
    };
    let sym = s.symbols.symbol(info.symbol);
    if sym.is_typedef() || sym.is_function() {
        return Ok(None);
    }
    let v = symbol_value(s, info.symbol)?;
    match s.value_as_long(&v) {
        Ok(n) => Ok(Some(n)),
        Err(err) if err.is_target() => {
            debug!("cannot read {name}: {err}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Address of a non-debugging (linker) symbol, or of a global symbol with
/// that exact linkage name.
pub fn lookup_minimal_symbol(s: &Session, name: &str) -> Option<u64> {
    if let Some(address) = s.symbols.minimal_symbol(name) {
        return Some(address);
    }
    let global = s.symbols.global_block();
    s.symbols
        .block_symbols(global)
        .find(|(_, sym)| sym.linkage_name == name)
        .and_then(|(_, sym)| sym.address())
}

/// Human-readable description of a candidate, used by overload menus and
/// the `lookup` command.
pub fn describe_symbol(s: &Session, info: &AdaSymbolInfo) -> String {
    let sym = s.symbols.symbol(info.symbol);
    let kind = match (&sym.class, sym.ty.map(|t| s.types.kind(s.types.check_typedef(t)))) {
        (SymbolClass::Function { .. }, _) | (_, Some(TypeKind::Function { .. })) => "function",
        (SymbolClass::Typedef, _) => "type",
        (SymbolClass::Constant { .. }, Some(TypeKind::Enum { .. })) => "enumeral",
        (SymbolClass::Constant { .. }, _) => "constant",
        _ => "variable",
    };
    match sym.ty {
        Some(ty) => format!("{} ({kind}, {})", sym.natural_name, s.types.display_name(ty)),
        None => format!("{} ({kind})", sym.natural_name),
    }
}
