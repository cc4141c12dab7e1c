use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::lookup::OverloadSelector;
use crate::symbols::{BlockId, SymbolTable};
use crate::target::{NoTarget, Target};
use crate::types::{TypeId, TypeTable};
use crate::value::{self, Lval, Value};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Caps advisory warnings per top-level command.
#[derive(Debug, Clone)]
pub struct WarningLimiter {
    limit: u32,
    emitted: Vec<String>,
    suppressed: u32,
}

impl WarningLimiter {
    pub fn new(limit: u32) -> Self {
        Self { limit, emitted: Vec::new(), suppressed: 0 }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        if (self.emitted.len() as u32) < self.limit {
            warn!("{message}");
            self.emitted.push(message);
        } else {
            self.suppressed += 1;
        }
    }

    pub fn reset(&mut self) {
        self.emitted.clear();
        self.suppressed = 0;
    }

    pub fn messages(&self) -> &[String] {
        &self.emitted
    }

    pub fn suppressed(&self) -> u32 {
        self.suppressed
    }
}

/// Dynamic types found through runtime tags, valid for one inferior.
#[derive(Debug, Default)]
pub struct TagCache {
    inferior: Option<u64>,
    entries: HashMap<u64, Option<TypeId>>,
}

impl TagCache {
    pub fn get(&mut self, inferior: u64, tag: u64) -> Option<Option<TypeId>> {
        if self.inferior != Some(inferior) {
            self.clear();
            self.inferior = Some(inferior);
        }
        self.entries.get(&tag).copied()
    }

    pub fn insert(&mut self, tag: u64, ty: Option<TypeId>) {
        self.entries.insert(tag, ty);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The selected frame: lexical scope for lookups and base for locals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Frame {
    pub block: Option<BlockId>,
    pub frame_base: Option<u64>,
}

/// Everything one debugging session needs to resolve types and evaluate
/// expressions.
pub struct Session {
    pub types: TypeTable,
    pub symbols: SymbolTable,
    pub config: EngineConfig,
    pub warnings: WarningLimiter,
    pub frame: Frame,
    target: Box<dyn Target>,
    tag_cache: TagCache,
    selector: Option<Box<dyn OverloadSelector>>,
    pub(crate) resolving: HashSet<TypeId>,
    /// Size of the type table before the first command.
    type_mark: Option<usize>,
}

impl Session {
    pub fn new(types: TypeTable, symbols: SymbolTable, config: EngineConfig) -> Self {
        let warnings = WarningLimiter::new(config.max_warnings);
        Self {
            types,
            symbols,
            config,
            warnings,
            frame: Frame::default(),
            target: Box::new(NoTarget),
            tag_cache: TagCache::default(),
            selector: None,
            resolving: HashSet::new(),
            type_mark: None,
        }
    }

    pub fn with_target(mut self, target: impl Target + 'static) -> Self {
        self.target = Box::new(target);
        self
    }

    pub fn with_selector(mut self, selector: impl OverloadSelector + 'static) -> Self {
        self.selector = Some(Box::new(selector));
        self
    }

    pub fn set_target(&mut self, target: Box<dyn Target>) {
        self.target = target;
        self.inferior_changed();
    }

    pub fn target(&self) -> &dyn Target {
        self.target.as_ref()
    }

    pub fn target_mut(&mut self) -> &mut dyn Target {
        self.target.as_mut()
    }

    pub(crate) fn selector_mut(&mut self) -> Option<&mut (dyn OverloadSelector + 'static)> {
        self.selector.as_deref_mut()
    }

    pub fn select_frame(&mut self, block: Option<BlockId>, frame_base: Option<u64>) {
        self.frame = Frame { block, frame_base };
    }

    /// Start a top-level command: the warning budget is replenished and the
    /// types derived by earlier commands are released, so values they
    /// returned must not outlive this call.
    pub fn begin_command(&mut self) {
        self.warnings.reset();
        self.resolving.clear();
        let mark = *self.type_mark.get_or_insert(self.types.mark());
        self.types.release(mark);
    }

    /// Forget everything tied to the previous inferior process.
    pub fn inferior_changed(&mut self) {
        debug!("inferior changed, dropping {} cached tags", self.tag_cache.len());
        self.tag_cache.clear();
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.warn(message);
    }

    pub fn big_endian(&self) -> bool {
        self.target.is_big_endian()
    }

    /// Bit order used for packed data.
    pub fn bits_big_endian(&self) -> bool {
        self.config.big_endian_bits.unwrap_or_else(|| self.big_endian())
    }

    pub(crate) fn cached_tag(&mut self, tag: u64) -> Option<Option<TypeId>> {
        let inferior = self.target.inferior_id();
        self.tag_cache.get(inferior, tag)
    }

    pub(crate) fn cache_tag(&mut self, tag: u64, ty: Option<TypeId>) {
        self.tag_cache.insert(tag, ty);
    }

    pub fn tag_cache_len(&self) -> usize {
        self.tag_cache.len()
    }

    // Value access

    pub fn fetch(&self, v: &mut Value) -> Result<()> {
        v.fetch(&self.types, self.target.as_ref())
    }

    /// Fetched copy of `v`.
    pub fn fetched(&self, v: &Value) -> Result<Value> {
        let mut v = v.clone();
        self.fetch(&mut v)?;
        Ok(v)
    }

    pub fn read_memory(&self, address: u64, length: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; length];
        self.target.read_memory(address, &mut buf)?;
        Ok(buf)
    }

    pub fn read_address(&self, address: u64) -> Result<u64> {
        let size = self.target.address_size() as usize;
        let bytes = self.read_memory(address, size)?;
        Ok(crate::codec::unpack_integer(&bytes, false, self.big_endian()) as u64)
    }

    pub fn value_as_long(&self, v: &Value) -> Result<i64> {
        if v.is_lazy() {
            let v = self.fetched(v)?;
            return value::unpack_long(&self.types, v.ty, v.bytes()?, self.big_endian());
        }
        value::unpack_long(&self.types, v.ty, v.bytes()?, self.big_endian())
    }

    pub fn value_as_double(&self, v: &Value) -> Result<f64> {
        if v.is_lazy() {
            let v = self.fetched(v)?;
            return value::unpack_double(&self.types, v.ty, v.bytes()?, self.big_endian());
        }
        value::unpack_double(&self.types, v.ty, v.bytes()?, self.big_endian())
    }

    pub fn value_as_address(&self, v: &Value) -> Result<u64> {
        Ok(self.value_as_long(v)? as u64)
    }

    pub fn value_from_long(&self, ty: TypeId, v: i64) -> Value {
        Value::from_i64(&self.types, ty, v, self.big_endian())
    }

    pub fn value_from_double(&self, ty: TypeId, v: f64) -> Result<Value> {
        Value::from_f64(&self.types, ty, v, self.big_endian())
    }

    pub fn value_from_pointer(&self, ty: TypeId, address: u64) -> Value {
        self.value_from_long(ty, address as i64)
    }

    /// Write a fetched value back to its location in the target.
    pub fn write_back(&mut self, v: &Value) -> Result<()> {
        match (&v.lval, v.address) {
            (Lval::Memory, Some(address)) => {
                let bytes = v.bytes()?.to_vec();
                self.target.write_memory(address, &bytes)
            }
            (Lval::Memory, None) => Err(Error::internal("memory lvalue without an address")),
            _ => Err(Error::eval("Left operand of assignment is not a modifiable lvalue.")),
        }
    }

    /// Reject a fixed type whose size betrays corrupt debug info.
    pub fn ensure_size_limit(&self, ty: TypeId) -> Result<()> {
        let length = self.types.length(self.types.check_typedef(ty));
        if length > self.config.oversize_limit {
            return Err(Error::internal(format!(
                "object size of {} bytes for type {} is larger than the limit of {} bytes",
                length,
                self.types.display_name(ty),
                self.config.oversize_limit
            )));
        }
        Ok(())
    }
}
