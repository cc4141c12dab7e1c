use crate::names;
use crate::types::TypeId;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SymbolId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BlockId(u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    /// Objects, subprograms, enumeration literals and type names.
    Var,
    /// Record and union tags.
    Struct,
    Label,
}

/// Where a symbol's value lives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "class")]
pub enum SymbolClass {
    /// Compile-time constant, including enumeration literals.
    Constant { value: i64 },
    Static { address: u64 },
    Register { regnum: u32 },
    /// Formal parameter at an offset from the frame base.
    Argument { frame_offset: i64 },
    /// Local object at an offset from the frame base.
    Computed { frame_offset: i64 },
    Typedef,
    /// Subprogram with its entry address.
    Function { entry: u64 },
    Unresolved,
    OptimizedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    pub linkage_name: String,
    pub natural_name: String,
    pub domain: Domain,
    pub class: SymbolClass,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeId>,
    pub block: BlockId,
    /// Declaration only; a complete definition may exist elsewhere.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stub: bool,
}

impl Symbol {
    pub fn new(linkage_name: &str, domain: Domain, class: SymbolClass, ty: Option<TypeId>) -> Self {
        Self {
            linkage_name: linkage_name.to_string(),
            natural_name: names::natural_name(linkage_name),
            domain,
            class,
            ty,
            block: BlockId(0),
            stub: false,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.class, SymbolClass::Function { .. })
    }

    pub fn is_typedef(&self) -> bool {
        matches!(self.class, SymbolClass::Typedef)
    }

    pub fn address(&self) -> Option<u64> {
        match self.class {
            SymbolClass::Static { address } => Some(address),
            SymbolClass::Function { entry } => Some(entry),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Global,
    /// File-level statics of one compilation unit.
    Static,
    Function,
    Lexical,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub kind: BlockKind,
    pub parent: Option<BlockId>,
    /// Subprogram symbol owning a function block.
    pub function: Option<SymbolId>,
    pub symbols: Vec<SymbolId>,
}

/// Symbols of a program organized in nested lexical blocks.
///
/// Every compilation unit contributes one static block whose parent is the
/// shared global block.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    blocks: Vec<Block>,
    global: BlockId,
    statics: Vec<BlockId>,
    minimal: HashMap<String, u64>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        let global = Block { kind: BlockKind::Global, parent: None, function: None, symbols: Vec::new() };
        Self {
            symbols: Vec::new(),
            blocks: vec![global],
            global: BlockId(0),
            statics: Vec::new(),
            minimal: HashMap::new(),
        }
    }

    pub fn global_block(&self) -> BlockId {
        self.global
    }

    pub fn static_blocks(&self) -> &[BlockId] {
        &self.statics
    }

    pub fn add_static_block(&mut self) -> BlockId {
        let id = self.push_block(BlockKind::Static, Some(self.global), None);
        self.statics.push(id);
        id
    }

    /// Open the body block of `function` inside `parent`.
    pub fn add_function_block(&mut self, parent: BlockId, function: SymbolId) -> BlockId {
        self.push_block(BlockKind::Function, Some(parent), Some(function))
    }

    pub fn add_lexical_block(&mut self, parent: BlockId) -> BlockId {
        self.push_block(BlockKind::Lexical, Some(parent), None)
    }

    fn push_block(&mut self, kind: BlockKind, parent: Option<BlockId>, function: Option<SymbolId>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block { kind, parent, function, symbols: Vec::new() });
        id
    }

    pub fn add_symbol(&mut self, block: BlockId, mut symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        symbol.block = block;
        self.symbols.push(symbol);
        self.blocks[block.index()].symbols.push(id);
        id
    }

    /// Record an address-only symbol from the object file's symbol table.
    pub fn add_minimal_symbol(&mut self, name: &str, address: u64) {
        self.minimal.entry(name.to_string()).or_insert(address);
    }

    pub fn minimal_symbol(&self, name: &str) -> Option<u64> {
        self.minimal.get(name).copied()
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols.iter().enumerate().map(|(i, s)| (SymbolId(i as u32), s))
    }

    pub fn block_symbols(&self, id: BlockId) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.block(id).symbols.iter().map(|&s| (s, self.symbol(s)))
    }

    pub fn superblock(&self, id: BlockId) -> Option<BlockId> {
        self.block(id).parent
    }

    /// Innermost subprogram enclosing `block`.
    pub fn enclosing_function(&self, mut block: BlockId) -> Option<SymbolId> {
        loop {
            let b = self.block(block);
            if let Some(function) = b.function {
                return Some(function);
            }
            block = b.parent?;
        }
    }

    /// Whether `block` is the global or a file-static block.
    pub fn is_file_level(&self, block: BlockId) -> bool {
        matches!(self.block(block).kind, BlockKind::Global | BlockKind::Static)
    }

    /// Body block of the function symbol `function`.
    pub fn function_body(&self, function: SymbolId) -> Option<BlockId> {
        self.blocks
            .iter()
            .position(|b| b.function == Some(function))
            .map(|i| BlockId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_function() -> (SymbolTable, BlockId, BlockId) {
        let mut table = SymbolTable::new();
        let file = table.add_static_block();
        let func = table.add_symbol(
            table.global_block(),
            Symbol::new("pck__proc", Domain::Var, SymbolClass::Function { entry: 0x400 }, None),
        );
        let body = table.add_function_block(file, func);
        let inner = table.add_lexical_block(body);
        (table, body, inner)
    }

    #[test]
    fn natural_names_are_decoded() {
        let sym = Symbol::new("pck__counter", Domain::Var, SymbolClass::Static { address: 8 }, None);
        assert_eq!(sym.natural_name, "pck.counter");
        assert_eq!(sym.address(), Some(8));
    }

    #[test]
    fn block_chain_reaches_global() {
        let (table, body, inner) = table_with_function();
        assert_eq!(table.superblock(inner), Some(body));
        let file = table.superblock(body).unwrap();
        assert!(table.is_file_level(file));
        assert_eq!(table.superblock(file), Some(table.global_block()));
        assert_eq!(table.superblock(table.global_block()), None);
    }

    #[test]
    fn enclosing_function_of_nested_block() {
        let (table, body, inner) = table_with_function();
        let func = table.enclosing_function(inner).unwrap();
        assert_eq!(table.symbol(func).natural_name, "pck.proc");
        assert_eq!(table.function_body(func), Some(body));
        assert_eq!(table.enclosing_function(table.global_block()), None);
    }

    #[test]
    fn minimal_symbols_keep_first_address() {
        let mut table = SymbolTable::new();
        table.add_minimal_symbol("__gnat_debug_raise_exception", 0x10);
        table.add_minimal_symbol("__gnat_debug_raise_exception", 0x20);
        assert_eq!(table.minimal_symbol("__gnat_debug_raise_exception"), Some(0x10));
        assert_eq!(table.minimal_symbol("missing"), None);
    }
}
