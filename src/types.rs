use crate::names::{self, FixedPointInfo, LayoutHint};
use serde::Serialize;
use std::cell::{Cell, OnceCell};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Handle to a type stored in a [`TypeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One end of a range subtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    Static(i64),
    /// Value of the named discriminant of the enclosing object.
    Discriminant(String),
    /// Value held by the named global variable.
    Variable(String),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub bitpos: u64,
    /// Explicit size in bits, 0 for the natural size of `ty`.
    pub bitsize: u64,
    pub ty: TypeId,
}

impl Field {
    pub fn new(name: impl Into<String>, bitpos: u64, ty: TypeId) -> Self {
        Self { name: name.into(), bitpos, bitsize: 0, ty }
    }

    pub fn packed(name: impl Into<String>, bitpos: u64, bitsize: u64, ty: TypeId) -> Self {
        Self { name: name.into(), bitpos, bitsize, ty }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumLiteral {
    pub name: String,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Void,
    Int { signed: bool },
    Float,
    Bool,
    Char,
    Enum { literals: Vec<EnumLiteral> },
    Range { base: TypeId, low: Bound, high: Bound },
    Modular { modulus: u64 },
    Struct { fields: Vec<Field> },
    Union { fields: Vec<Field> },
    /// `element_bitsize` is non-zero only for packed arrays.
    Array { element: TypeId, index: TypeId, element_bitsize: u64 },
    Pointer { target: TypeId },
    Reference { target: TypeId },
    Function { ret: Option<TypeId>, params: Vec<TypeId> },
    Typedef { target: TypeId },
}

impl TypeKind {
    pub fn tag(&self) -> &'static str {
        match self {
            TypeKind::Void => "void",
            TypeKind::Int { .. } => "integer",
            TypeKind::Float => "float",
            TypeKind::Bool => "boolean",
            TypeKind::Char => "character",
            TypeKind::Enum { .. } => "enumeration",
            TypeKind::Range { .. } => "range",
            TypeKind::Modular { .. } => "modular",
            TypeKind::Struct { .. } => "record",
            TypeKind::Union { .. } => "union",
            TypeKind::Array { .. } => "array",
            TypeKind::Pointer { .. } => "access",
            TypeKind::Reference { .. } => "reference",
            TypeKind::Function { .. } => "subprogram",
            TypeKind::Typedef { .. } => "typedef",
        }
    }
}

/// A type as described by debug information, or derived from one by fixing.
#[derive(Debug, Clone)]
pub struct TypeDesc {
    pub name: Option<String>,
    pub kind: TypeKind,
    /// Byte length. For `___XVE` templates this holds the record alignment.
    pub length: u64,
    pub align: u64,
    /// Declaration without a definition.
    pub stub: bool,
    fixed_instance: Cell<bool>,
    hint: OnceCell<LayoutHint>,
}

impl TypeDesc {
    pub fn new(name: Option<&str>, kind: TypeKind, length: u64) -> Self {
        Self {
            name: name.map(str::to_string),
            kind,
            length,
            align: 0,
            stub: false,
            fixed_instance: Cell::new(false),
            hint: OnceCell::new(),
        }
    }

    pub fn named(name: &str, kind: TypeKind, length: u64) -> Self {
        Self::new(Some(name), kind, length)
    }

    pub fn with_align(mut self, align: u64) -> Self {
        self.align = align;
        self
    }

    pub fn stub(mut self) -> Self {
        self.stub = true;
        self
    }

    pub fn fixed(self) -> Self {
        self.fixed_instance.set(true);
        self
    }

    pub fn is_fixed_instance(&self) -> bool {
        self.fixed_instance.get()
    }

    /// Structural role parsed from the encoded name, computed once.
    pub fn hint(&self) -> &LayoutHint {
        self.hint.get_or_init(|| names::layout_hint(self.name.as_deref()))
    }

    pub fn fields(&self) -> &[Field] {
        match &self.kind {
            TypeKind::Struct { fields } | TypeKind::Union { fields } => fields,
            _ => &[],
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, TypeKind::Struct { .. })
    }

    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => names::natural_name(name),
            None => format!("<anonymous {}>", self.kind.tag()),
        }
    }
}

/// Owner of every type known to a session.
///
/// Types loaded from debug info are never mutated; fixing adds new entries.
#[derive(Debug)]
pub struct TypeTable {
    types: Vec<TypeDesc>,
    by_name: HashMap<String, Vec<TypeId>>,
    static_approx: HashMap<TypeId, TypeId>,
    /// Types below this index survive [`release`](Self::release): everything
    /// added by name and every cached static approximation.
    pinned: usize,
    builtins: Builtins,
}

#[derive(Debug, Clone, Copy)]
pub struct Builtins {
    pub void: TypeId,
    pub integer: TypeId,
    pub long_integer: TypeId,
    pub natural: TypeId,
    pub boolean: TypeId,
    pub character: TypeId,
    pub float: TypeId,
    pub long_float: TypeId,
    pub address: TypeId,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    pub fn new() -> Self {
        let mut table = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
            static_approx: HashMap::new(),
            pinned: 0,
            builtins: Builtins {
                void: TypeId(0),
                integer: TypeId(0),
                long_integer: TypeId(0),
                natural: TypeId(0),
                boolean: TypeId(0),
                character: TypeId(0),
                float: TypeId(0),
                long_float: TypeId(0),
                address: TypeId(0),
            },
        };
        let void = table.add(TypeDesc::named("void", TypeKind::Void, 1));
        let integer = table.add(TypeDesc::named("integer", TypeKind::Int { signed: true }, 4));
        let long_integer =
            table.add(TypeDesc::named("long_long_integer", TypeKind::Int { signed: true }, 8));
        let natural = table.add(TypeDesc::named(
            "natural",
            TypeKind::Range { base: integer, low: Bound::Static(0), high: Bound::Static(i32::MAX as i64) },
            4,
        ));
        let boolean = table.add(TypeDesc::named("boolean", TypeKind::Bool, 1));
        let character = table.add(TypeDesc::named("character", TypeKind::Char, 1));
        let float = table.add(TypeDesc::named("float", TypeKind::Float, 4));
        let long_float = table.add(TypeDesc::named("long_float", TypeKind::Float, 8));
        let address = table.add(TypeDesc::named(
            "system__address",
            TypeKind::Modular { modulus: 0 },
            8,
        ));
        table.builtins = Builtins {
            void,
            integer,
            long_integer,
            natural,
            boolean,
            character,
            float,
            long_float,
            address,
        };
        table
    }

    pub fn builtins(&self) -> Builtins {
        self.builtins
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn add(&mut self, desc: TypeDesc) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        if let Some(name) = &desc.name {
            self.by_name.entry(name.clone()).or_default().push(id);
        }
        self.types.push(desc);
        self.pinned = self.types.len();
        id
    }

    /// Register `name` before its definition is known, so that recursive
    /// references can point at it. Completed by [`define`](Self::define).
    pub fn reserve(&mut self, name: Option<&str>) -> TypeId {
        self.add(TypeDesc::new(name, TypeKind::Void, 0))
    }

    pub fn define(&mut self, id: TypeId, kind: TypeKind, length: u64, align: u64, stub: bool) {
        let desc = &mut self.types[id.index()];
        desc.kind = kind;
        desc.length = length;
        desc.align = align;
        desc.stub = stub;
    }

    /// Add a type derived during evaluation; it is not indexed by name.
    pub fn add_derived(&mut self, desc: TypeDesc) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(desc);
        id
    }

    pub fn get(&self, id: TypeId) -> &TypeDesc {
        &self.types[id.index()]
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.get(id).kind
    }

    pub fn name(&self, id: TypeId) -> Option<&str> {
        self.get(id).name.as_deref()
    }

    pub fn length(&self, id: TypeId) -> u64 {
        self.get(id).length
    }

    pub fn display_name(&self, id: TypeId) -> String {
        self.get(id).display_name()
    }

    /// Named lookup, preferring complete definitions over stubs.
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        let ids = self.by_name.get(name)?;
        ids.iter().copied().find(|&id| !self.get(id).stub).or_else(|| ids.first().copied())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// The companion type `<name><suffix>` emitted next to `id`.
    pub fn parallel_type(&self, id: TypeId, suffix: &str) -> Option<TypeId> {
        let name = self.name(self.check_typedef(id))?;
        self.lookup(&format!("{name}{suffix}"))
    }

    /// Strip typedef layers and replace stubs by their complete definition.
    pub fn check_typedef(&self, mut id: TypeId) -> TypeId {
        let mut guard = 0;
        loop {
            let desc = self.get(id);
            match desc.kind {
                TypeKind::Typedef { target } if guard < 64 => {
                    id = target;
                    guard += 1;
                }
                _ => {
                    if desc.stub
                        && let Some(name) = &desc.name
                        && let Some(full) = self.lookup(name)
                        && !self.get(full).stub
                    {
                        return full;
                    }
                    return id;
                }
            }
        }
    }

    /// Peel a typedef layer, and for ranges, the base type.
    pub fn base_type(&self, id: TypeId) -> TypeId {
        let id = self.check_typedef(id);
        match self.kind(id) {
            TypeKind::Range { base, .. } => self.base_type(*base),
            _ => id,
        }
    }

    pub fn target(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(self.check_typedef(id)) {
            TypeKind::Pointer { target } | TypeKind::Reference { target } => Some(*target),
            TypeKind::Range { base, .. } => Some(*base),
            TypeKind::Array { element, .. } => Some(*element),
            _ => None,
        }
    }

    pub fn mark_fixed(&self, id: TypeId) {
        self.get(id).fixed_instance.set(true);
    }

    pub fn cached_static_approximation(&self, template: TypeId) -> Option<TypeId> {
        self.static_approx.get(&template).copied()
    }

    pub fn cache_static_approximation(&mut self, template: TypeId, approx: TypeId) {
        self.static_approx.insert(template, approx);
        self.pinned = self.pinned.max(approx.index() + 1);
    }

    /// Position to [`release`](Self::release) back to.
    pub fn mark(&self) -> usize {
        self.types.len()
    }

    /// Drop the derived types added after `mark`. Pinned types and the
    /// derived types they were built from are kept.
    pub fn release(&mut self, mark: usize) {
        let keep = mark.max(self.pinned);
        if keep < self.types.len() {
            trace!("releasing {} derived types", self.types.len() - keep);
            self.types.truncate(keep);
        }
    }

    // Classification

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.kind(self.check_typedef(id)), TypeKind::Pointer { .. })
    }

    pub fn is_reference(&self, id: TypeId) -> bool {
        matches!(self.kind(self.check_typedef(id)), TypeKind::Reference { .. })
    }

    pub fn is_array(&self, id: TypeId) -> bool {
        matches!(self.kind(self.check_typedef(id)), TypeKind::Array { .. })
    }

    pub fn is_struct(&self, id: TypeId) -> bool {
        matches!(self.kind(self.check_typedef(id)), TypeKind::Struct { .. })
    }

    pub fn is_union(&self, id: TypeId) -> bool {
        matches!(self.kind(self.check_typedef(id)), TypeKind::Union { .. })
    }

    pub fn is_function(&self, id: TypeId) -> bool {
        matches!(self.kind(self.check_typedef(id)), TypeKind::Function { .. })
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        matches!(self.kind(self.check_typedef(id)), TypeKind::Float)
    }

    pub fn is_enum(&self, id: TypeId) -> bool {
        matches!(self.kind(self.check_typedef(id)), TypeKind::Enum { .. })
    }

    pub fn is_discrete(&self, id: TypeId) -> bool {
        matches!(
            self.kind(self.check_typedef(id)),
            TypeKind::Int { .. }
                | TypeKind::Enum { .. }
                | TypeKind::Range { .. }
                | TypeKind::Modular { .. }
                | TypeKind::Bool
                | TypeKind::Char
        )
    }

    pub fn is_integral(&self, id: TypeId) -> bool {
        let id = self.check_typedef(id);
        match self.kind(id) {
            TypeKind::Int { .. } | TypeKind::Modular { .. } => true,
            TypeKind::Range { base, .. } => self.is_integral(*base),
            _ => false,
        }
    }

    pub fn is_scalar(&self, id: TypeId) -> bool {
        self.is_discrete(id) || self.is_float(id) || self.is_pointer(id)
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_integral(id) || self.is_float(id)
    }

    pub fn fixed_point_info(&self, id: TypeId) -> Option<Option<&FixedPointInfo>> {
        let id = self.check_typedef(id);
        let desc = self.get(id);
        if let LayoutHint::FixedPoint(info) = desc.hint() {
            if matches!(desc.kind, TypeKind::Int { .. } | TypeKind::Range { .. }) {
                return Some(info.as_ref());
            }
            return None;
        }
        match desc.kind {
            TypeKind::Range { base, .. } if base != id => self.fixed_point_info(base),
            _ => None,
        }
    }

    pub fn is_fixed_point(&self, id: TypeId) -> bool {
        self.fixed_point_info(id).is_some()
    }

    pub fn modulus(&self, id: TypeId) -> Option<u64> {
        let id = self.check_typedef(id);
        match self.kind(id) {
            TypeKind::Modular { modulus } => Some(*modulus),
            TypeKind::Range { base, .. } => self.modulus(*base),
            _ => None,
        }
    }

    pub fn is_modular(&self, id: TypeId) -> bool {
        self.modulus(id).is_some()
    }

    pub fn is_unsigned(&self, id: TypeId) -> bool {
        match self.kind(self.check_typedef(id)) {
            TypeKind::Int { signed } => !signed,
            TypeKind::Modular { .. } | TypeKind::Bool | TypeKind::Char | TypeKind::Pointer { .. } => true,
            TypeKind::Range { base, .. } => self.is_unsigned(*base),
            TypeKind::Enum { literals } => literals.iter().all(|l| l.value >= 0),
            _ => false,
        }
    }

    /// Whether values of `id` can be negative; decides sign extension of packed data.
    pub fn has_negatives(&self, id: TypeId) -> bool {
        let id = self.check_typedef(id);
        match self.kind(id) {
            TypeKind::Int { signed } => *signed,
            TypeKind::Range { .. } => self.discrete_bounds(id).is_some_and(|(lo, _)| lo < 0),
            _ => false,
        }
    }

    /// An aligner wrapper: a record whose single field is named `F`.
    pub fn is_aligner(&self, id: TypeId) -> bool {
        if self.parallel_type(id, "___XVS").is_some() {
            return false;
        }
        let desc = self.get(self.check_typedef(id));
        matches!(&desc.kind, TypeKind::Struct { fields } if fields.len() == 1 && fields[0].name == "F")
    }

    pub fn field_index(&self, id: TypeId, name: &str) -> Option<usize> {
        self.get(self.check_typedef(id)).fields().iter().position(|f| f.name == name)
    }

    /// Static bounds of a discrete type; `None` if they depend on run-time data.
    pub fn discrete_bounds(&self, id: TypeId) -> Option<(i64, i64)> {
        let id = self.check_typedef(id);
        let desc = self.get(id);
        match &desc.kind {
            TypeKind::Range { low: Bound::Static(lo), high: Bound::Static(hi), .. } => Some((*lo, *hi)),
            TypeKind::Range { .. } => None,
            TypeKind::Enum { literals } => {
                Some((literals.first()?.value, literals.last()?.value))
            }
            TypeKind::Bool => Some((0, 1)),
            TypeKind::Char => Some((0, (1i64 << (8 * desc.length.min(4))) - 1)),
            TypeKind::Modular { modulus } if *modulus > 0 => Some((0, (*modulus - 1) as i64)),
            TypeKind::Modular { .. } => Some((0, i64::MAX)),
            TypeKind::Int { signed } => Some(int_bounds(desc.length, *signed)),
            _ => None,
        }
    }

    pub fn array_index(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(self.check_typedef(id)) {
            TypeKind::Array { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn array_element(&self, id: TypeId) -> Option<TypeId> {
        match self.kind(self.check_typedef(id)) {
            TypeKind::Array { element, .. } => Some(*element),
            _ => None,
        }
    }

    pub fn array_element_bitsize(&self, id: TypeId) -> u64 {
        match self.kind(self.check_typedef(id)) {
            TypeKind::Array { element_bitsize, .. } => *element_bitsize,
            _ => 0,
        }
    }

    pub fn enum_literal_position(&self, id: TypeId, value: i64) -> Option<usize> {
        match self.kind(self.check_typedef(id)) {
            TypeKind::Enum { literals } => literals.iter().position(|l| l.value == value),
            _ => None,
        }
    }

    // Construction of derived types

    pub fn create_range(&mut self, base: TypeId, low: i64, high: i64) -> TypeId {
        let length = self.length(base);
        let name = self.get(base).name.clone();
        let desc = TypeDesc::new(
            name.as_deref(),
            TypeKind::Range { base, low: Bound::Static(low), high: Bound::Static(high) },
            length,
        );
        self.add_derived(desc.fixed())
    }

    /// Array of `element` indexed by `index`, with its byte length computed.
    pub fn create_array(&mut self, name: Option<&str>, element: TypeId, index: TypeId) -> TypeId {
        let count = self.discrete_bounds(index).map_or(0, |(lo, hi)| element_count(lo, hi));
        let length = count.saturating_mul(self.length(element));
        let desc = TypeDesc::new(name, TypeKind::Array { element, index, element_bitsize: 0 }, length);
        self.add_derived(desc.fixed())
    }

    /// Packed variant of [`create_array`](Self::create_array).
    pub fn create_packed_array(
        &mut self,
        name: Option<&str>,
        element: TypeId,
        index: TypeId,
        element_bitsize: u64,
    ) -> TypeId {
        let count = self.discrete_bounds(index).map_or(0, |(lo, hi)| element_count(lo, hi));
        let length = count.saturating_mul(element_bitsize).div_ceil(8);
        let desc = TypeDesc::new(name, TypeKind::Array { element, index, element_bitsize }, length);
        self.add_derived(desc.fixed())
    }

    pub fn create_pointer(&mut self, target: TypeId) -> TypeId {
        let length = self.length(self.builtins.address);
        self.add_derived(TypeDesc::new(None, TypeKind::Pointer { target }, length).fixed())
    }

    pub fn empty_record(&mut self, name: Option<&str>) -> TypeId {
        self.add_derived(TypeDesc::new(name, TypeKind::Struct { fields: Vec::new() }, 0).fixed())
    }

    /// Same field count, offsets and sizes, ignoring identity.
    pub fn layout_equivalent(&self, a: TypeId, b: TypeId) -> bool {
        let (a, b) = (self.check_typedef(a), self.check_typedef(b));
        if a == b {
            return true;
        }
        let (da, db) = (self.get(a), self.get(b));
        if da.length != db.length || da.kind.tag() != db.kind.tag() {
            return false;
        }
        match (&da.kind, &db.kind) {
            (TypeKind::Struct { fields: fa }, TypeKind::Struct { fields: fb })
            | (TypeKind::Union { fields: fa }, TypeKind::Union { fields: fb }) => {
                fa.len() == fb.len()
                    && fa.iter().zip(fb).all(|(x, y)| {
                        x.name == y.name
                            && x.bitpos == y.bitpos
                            && x.bitsize == y.bitsize
                            && self.layout_equivalent(x.ty, y.ty)
                    })
            }
            (TypeKind::Array { element: ea, index: ia, .. }, TypeKind::Array { element: eb, index: ib, .. }) => {
                self.discrete_bounds(*ia) == self.discrete_bounds(*ib) && self.layout_equivalent(*ea, *eb)
            }
            _ => true,
        }
    }
}

fn int_bounds(length: u64, signed: bool) -> (i64, i64) {
    let bits = (length * 8).clamp(1, 64);
    if signed {
        if bits == 64 { (i64::MIN, i64::MAX) } else { (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1) }
    } else if bits >= 63 {
        (0, i64::MAX)
    } else {
        (0, (1i64 << bits) - 1)
    }
}

/// Number of elements in `lo..hi`, 0 for a null range.
pub fn element_count(lo: i64, hi: i64) -> u64 {
    if hi < lo { 0 } else { (hi as i128 - lo as i128 + 1) as u64 }
}

/// Printable layout of a fixed record, used by the `layout` command.
#[derive(Debug, Clone, Serialize)]
pub struct RecordLayout {
    pub name: String,
    pub kind: &'static str,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<u64>,
    pub fields: Vec<FieldLayout>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldLayout {
    pub name: String,
    pub type_name: String,
    pub offset: u64,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_offset: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit_size: Option<u64>,
}

impl FieldLayout {
    pub fn end_offset(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }
}

impl RecordLayout {
    pub fn from_type(table: &TypeTable, id: TypeId) -> Self {
        let id = table.check_typedef(id);
        let desc = table.get(id);
        let fields = desc
            .fields()
            .iter()
            .map(|field| {
                let field_len = table.length(table.check_typedef(field.ty));
                let packed = field.bitsize > 0 || field.bitpos % 8 != 0;
                FieldLayout {
                    name: field.name.clone(),
                    type_name: table.display_name(field.ty),
                    offset: field.bitpos / 8,
                    size: if field.bitsize > 0 { field.bitsize.div_ceil(8) } else { field_len },
                    bit_offset: packed.then_some(field.bitpos % 8),
                    bit_size: packed.then_some(if field.bitsize > 0 { field.bitsize } else { field_len * 8 }),
                }
            })
            .collect();
        Self {
            name: desc.display_name(),
            kind: desc.kind.tag(),
            size: desc.length,
            alignment: (desc.align > 0).then_some(desc.align),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_keeps_named_and_memoized_types() {
        let mut table = TypeTable::new();
        let int = table.builtins().integer;
        let mark = table.mark();
        table.create_range(int, 1, 10);
        table.release(mark);
        assert_eq!(table.len(), mark);

        let named = table.add(TypeDesc::named("pck__late", TypeKind::Int { signed: true }, 2));
        let part = table.create_range(int, 0, 3);
        let approx = table.create_array(None, int, part);
        table.cache_static_approximation(named, approx);
        let transient = table.create_pointer(int);
        table.release(mark);
        assert_eq!(table.len(), approx.index() + 1);
        assert_eq!(table.lookup("pck__late"), Some(named));
        assert_eq!(table.cached_static_approximation(named), Some(approx));
        assert_eq!(table.array_index(approx), Some(part));
        assert!(transient.index() >= table.len());
    }

    #[test]
    fn builtins_are_registered_by_name() {
        let table = TypeTable::new();
        let b = table.builtins();
        assert_eq!(table.lookup("integer"), Some(b.integer));
        assert_eq!(table.length(b.long_float), 8);
        assert_eq!(table.discrete_bounds(b.boolean), Some((0, 1)));
        assert_eq!(table.discrete_bounds(b.integer), Some((i32::MIN as i64, i32::MAX as i64)));
    }

    #[test]
    fn stubs_resolve_to_complete_definitions() {
        let mut table = TypeTable::new();
        let stub = table.add(TypeDesc::named("pck__rec", TypeKind::Struct { fields: vec![] }, 0).stub());
        let int = table.builtins().integer;
        let full = table.add(TypeDesc::named(
            "pck__rec",
            TypeKind::Struct { fields: vec![Field::new("x", 0, int)] },
            4,
        ));
        assert_eq!(table.lookup("pck__rec"), Some(full));
        assert_eq!(table.check_typedef(stub), full);
    }

    #[test]
    fn parallel_types_are_found_by_suffix() {
        let mut table = TypeTable::new();
        let rec = table.add(TypeDesc::named("pck__rec", TypeKind::Struct { fields: vec![] }, 0));
        let xve = table.add(TypeDesc::named("pck__rec___XVE", TypeKind::Struct { fields: vec![] }, 1));
        assert_eq!(table.parallel_type(rec, "___XVE"), Some(xve));
        assert_eq!(table.parallel_type(rec, "___XVU"), None);
        assert_eq!(table.get(xve).hint(), &LayoutHint::VariableTemplate);
    }

    #[test]
    fn arrays_compute_length_from_bounds() {
        let mut table = TypeTable::new();
        let int = table.builtins().integer;
        let index = table.create_range(int, 1, 10);
        let array = table.create_array(None, int, index);
        assert_eq!(table.length(array), 40);
        let empty_index = table.create_range(int, 5, 4);
        let empty = table.create_array(None, int, empty_index);
        assert_eq!(table.length(empty), 0);
        let packed = table.create_packed_array(None, int, index, 3);
        assert_eq!(table.length(packed), 4);
    }

    #[test]
    fn fixed_point_types_are_recognized_through_ranges() {
        let mut table = TypeTable::new();
        let raw = table.add(TypeDesc::named("pck__money___XF_1_100", TypeKind::Int { signed: true }, 4));
        let sub = table.add(TypeDesc::new(
            None,
            TypeKind::Range { base: raw, low: Bound::Static(0), high: Bound::Static(1000) },
            4,
        ));
        assert!(table.is_fixed_point(raw));
        assert!(table.is_fixed_point(sub));
        assert!(!table.is_fixed_point(table.builtins().integer));
    }

    #[test]
    fn aligner_records_have_a_single_f_field() {
        let mut table = TypeTable::new();
        let int = table.builtins().integer;
        let wrapper = table.add(TypeDesc::new(None, TypeKind::Struct { fields: vec![Field::new("F", 0, int)] }, 4));
        assert!(table.is_aligner(wrapper));
        assert!(!table.is_aligner(int));
    }

    #[test]
    fn record_layout_reports_packed_fields() {
        let mut table = TypeTable::new();
        let int = table.builtins().integer;
        let rec = table.add(TypeDesc::named(
            "pck__flags",
            TypeKind::Struct { fields: vec![Field::packed("a", 0, 3, int), Field::new("b", 8, int)] },
            5,
        ));
        let layout = RecordLayout::from_type(&table, rec);
        assert_eq!(layout.name, "pck.flags");
        assert_eq!(layout.fields[0].bit_size, Some(3));
        assert_eq!(layout.fields[1].offset, 1);
        assert_eq!(layout.fields[1].end_offset(), Some(5));
    }
}
