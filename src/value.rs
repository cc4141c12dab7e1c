use crate::codec;
use crate::error::{Error, Result};
use crate::target::Target;
use crate::types::{TypeId, TypeTable};

/// Where a value can be written back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lval {
    NotLval,
    Memory,
    Register(u32),
    /// Debugger-side convenience variable.
    Internal(String),
}

/// A typed piece of data: either fetched bytes or a lazy reference to
/// target memory.
#[derive(Debug, Clone)]
pub struct Value {
    pub ty: TypeId,
    contents: Option<Vec<u8>>,
    pub lval: Lval,
    /// Address of the first byte, for memory lvalues.
    pub address: Option<u64>,
    /// Byte offset of this value within its outermost container.
    pub offset: u64,
    /// Bit offset (0..8) of a packed sub-object within its first byte.
    pub bitpos: u64,
    /// Size in bits of a packed sub-object; 0 for whole bytes.
    pub bitsize: u64,
    pub modifiable: bool,
}

impl Value {
    /// Reference to target memory, read on first use.
    pub fn lazy_at(ty: TypeId, address: u64) -> Self {
        Self {
            ty,
            contents: None,
            lval: Lval::Memory,
            address: Some(address),
            offset: 0,
            bitpos: 0,
            bitsize: 0,
            modifiable: true,
        }
    }

    /// Debugger-side value with no target location.
    pub fn from_bytes(ty: TypeId, bytes: Vec<u8>) -> Self {
        Self {
            ty,
            contents: Some(bytes),
            lval: Lval::NotLval,
            address: None,
            offset: 0,
            bitpos: 0,
            bitsize: 0,
            modifiable: true,
        }
    }

    pub fn at_with_contents(ty: TypeId, address: Option<u64>, bytes: Vec<u8>) -> Self {
        let mut v = Self::from_bytes(ty, bytes);
        if let Some(address) = address {
            v.lval = Lval::Memory;
            v.address = Some(address);
        }
        v
    }

    pub fn zero(types: &TypeTable, ty: TypeId) -> Self {
        let len = types.length(types.check_typedef(ty)) as usize;
        Self::from_bytes(ty, vec![0; len])
    }

    pub fn from_i64(types: &TypeTable, ty: TypeId, v: i64, big_endian: bool) -> Self {
        let len = types.length(types.check_typedef(ty)) as usize;
        Self::from_bytes(ty, codec::pack_integer(v, len, big_endian))
    }

    pub fn from_f64(types: &TypeTable, ty: TypeId, v: f64, big_endian: bool) -> Result<Self> {
        let len = types.length(types.check_typedef(ty)) as usize;
        Ok(Self::from_bytes(ty, codec::pack_float(v, len, big_endian)?))
    }

    pub fn is_lazy(&self) -> bool {
        self.contents.is_none()
    }

    pub fn is_lval(&self) -> bool {
        self.lval != Lval::NotLval
    }

    /// Read the value's bytes from `target` if not yet fetched.
    pub fn fetch(&mut self, types: &TypeTable, target: &dyn Target) -> Result<()> {
        if self.contents.is_some() {
            return Ok(());
        }
        let address = self
            .address
            .ok_or_else(|| Error::internal("lazy value without an address"))?;
        let mut buf = vec![0u8; types.length(types.check_typedef(self.ty)) as usize];
        target.read_memory(address, &mut buf)?;
        self.contents = Some(buf);
        Ok(())
    }

    /// Fetched contents; errors on a lazy value.
    pub fn bytes(&self) -> Result<&[u8]> {
        self.contents.as_deref().ok_or_else(|| Error::internal("value contents not fetched"))
    }

    pub fn bytes_mut(&mut self) -> Result<&mut Vec<u8>> {
        self.contents.as_mut().ok_or_else(|| Error::internal("value contents not fetched"))
    }

    pub fn into_bytes(self) -> Result<Vec<u8>> {
        self.contents.ok_or_else(|| Error::internal("value contents not fetched"))
    }

    /// Same location and contents viewed as `ty`.
    pub fn retyped(mut self, ty: TypeId) -> Self {
        self.ty = ty;
        self
    }

    /// Reinterpret under `ty`, keeping the location but dropping contents so
    /// that they are re-read with the new length.
    pub fn relocated(&self, ty: TypeId) -> Self {
        let mut v = self.clone();
        v.ty = ty;
        if v.address.is_some() && v.lval == Lval::Memory {
            v.contents = None;
        }
        v
    }

    /// Non-lvalue copy of this value.
    pub fn detached(mut self) -> Self {
        self.lval = Lval::NotLval;
        self.address = None;
        self
    }

    /// Component of `ty` at `byte_offset` inside this (fetched or lazy) value.
    pub fn component(&self, types: &TypeTable, ty: TypeId, byte_offset: u64) -> Self {
        let len = types.length(types.check_typedef(ty)) as usize;
        let start = byte_offset as usize;
        let contents = self.contents.as_ref().and_then(|c| c.get(start..start + len)).map(<[u8]>::to_vec);
        Self {
            ty,
            contents,
            lval: self.lval.clone(),
            address: self.address.map(|a| a + byte_offset),
            offset: self.offset + byte_offset,
            bitpos: 0,
            bitsize: 0,
            modifiable: self.modifiable,
        }
    }
}

/// Scalar view of fetched bytes according to `ty`.
pub fn unpack_long(types: &TypeTable, ty: TypeId, bytes: &[u8], big_endian: bool) -> Result<i64> {
    let id = types.check_typedef(ty);
    if types.is_float(id) {
        return Ok(codec::unpack_float(bytes, big_endian)? as i64);
    }
    if !types.is_scalar(id) {
        return Err(Error::eval(format!(
            "Value of type {} is not a scalar",
            types.display_name(id)
        )));
    }
    Ok(codec::unpack_integer(bytes, !types.is_unsigned(id), big_endian))
}

pub fn unpack_double(types: &TypeTable, ty: TypeId, bytes: &[u8], big_endian: bool) -> Result<f64> {
    let id = types.check_typedef(ty);
    if types.is_float(id) {
        codec::unpack_float(bytes, big_endian)
    } else if types.is_unsigned(id) {
        Ok(codec::unpack_integer(bytes, false, big_endian) as u64 as f64)
    } else {
        Ok(codec::unpack_integer(bytes, true, big_endian) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MemoryTarget;

    #[test]
    fn lazy_values_fetch_from_target() {
        let types = TypeTable::new();
        let int = types.builtins().integer;
        let mut target = MemoryTarget::new();
        target.map(0x100, 42i32.to_le_bytes().to_vec());
        let mut v = Value::lazy_at(int, 0x100);
        assert!(v.is_lazy());
        assert!(v.bytes().is_err());
        v.fetch(&types, &target).unwrap();
        assert_eq!(unpack_long(&types, int, v.bytes().unwrap(), false).unwrap(), 42);
    }

    #[test]
    fn components_track_offsets() {
        let types = TypeTable::new();
        let b = types.builtins();
        let parent = Value::at_with_contents(b.long_integer, Some(0x200), vec![1, 2, 3, 4, 5, 6, 7, 8]);
        let part = parent.component(&types, b.integer, 4);
        assert_eq!(part.address, Some(0x204));
        assert_eq!(part.offset, 4);
        assert_eq!(part.bytes().unwrap(), &[5, 6, 7, 8]);
    }

    #[test]
    fn scalar_conversions() {
        let types = TypeTable::new();
        let b = types.builtins();
        let v = Value::from_i64(&types, b.integer, -3, true);
        assert_eq!(unpack_long(&types, b.integer, v.bytes().unwrap(), true).unwrap(), -3);
        let f = Value::from_f64(&types, b.long_float, 2.5, false).unwrap();
        assert_eq!(unpack_double(&types, b.long_float, f.bytes().unwrap(), false).unwrap(), 2.5);
        let z = Value::zero(&types, b.boolean);
        assert_eq!(z.bytes().unwrap(), &[0]);
    }
}
