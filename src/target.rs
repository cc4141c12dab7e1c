use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};

/// Access to the debugged program's memory and registers.
pub trait Target {
    fn read_memory(&self, address: u64, buf: &mut [u8]) -> Result<()>;

    fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<()>;

    fn read_register(&self, regnum: u32) -> Result<Vec<u8>>;

    /// Identity of the current inferior process; caches keyed on it are
    /// dropped when it changes.
    fn inferior_id(&self) -> u64 {
        0
    }

    fn is_big_endian(&self) -> bool {
        false
    }

    fn address_size(&self) -> u64 {
        8
    }

    /// Run the subprogram at `entry` in the inferior with the given
    /// argument images and return the `ret_len`-byte result image.
    fn call_function(&mut self, entry: u64, args: &[Vec<u8>], ret_len: usize) -> Result<Vec<u8>> {
        let _ = (args, ret_len);
        Err(Error::eval(format!("Cannot call the function at {entry:#x} without a running process")))
    }
}

/// Target with no process attached; every access fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTarget;

impl Target for NoTarget {
    fn read_memory(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        Err(Error::Target { address, length: buf.len(), reason: "no process".into() })
    }

    fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<()> {
        Err(Error::Target { address, length: data.len(), reason: "no process".into() })
    }

    fn read_register(&self, regnum: u32) -> Result<Vec<u8>> {
        Err(Error::Register { regnum, reason: "no process".into() })
    }
}

/// Sparse memory image made of mapped regions, with a register file.
#[derive(Debug, Default, Clone)]
pub struct MemoryTarget {
    regions: BTreeMap<u64, Vec<u8>>,
    registers: HashMap<u32, Vec<u8>>,
    /// Canned results of inferior calls, by entry address.
    call_results: HashMap<u64, Vec<u8>>,
    /// Calls performed so far, with their argument images.
    pub calls: Vec<(u64, Vec<Vec<u8>>)>,
    big_endian: bool,
    inferior: u64,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    /// Map `bytes` at `address`, replacing any region starting there.
    pub fn map(&mut self, address: u64, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.regions.insert(address, bytes.into());
        self
    }

    pub fn set_register(&mut self, regnum: u32, bytes: impl Into<Vec<u8>>) -> &mut Self {
        self.registers.insert(regnum, bytes.into());
        self
    }

    /// Make calls to the subprogram at `entry` return `result`.
    pub fn set_call_result(&mut self, entry: u64, result: impl Into<Vec<u8>>) -> &mut Self {
        self.call_results.insert(entry, result.into());
        self
    }

    /// Simulate a new inferior process.
    pub fn restart(&mut self) {
        self.inferior += 1;
    }

    fn region_for(&self, address: u64, length: usize) -> Option<(u64, &Vec<u8>)> {
        let (&start, bytes) = self.regions.range(..=address).next_back()?;
        let end = start.checked_add(bytes.len() as u64)?;
        let wanted_end = address.checked_add(length as u64)?;
        (wanted_end <= end).then_some((start, bytes))
    }

    fn unmapped(address: u64, length: usize) -> Error {
        Error::Target { address, length, reason: "address not mapped".into() }
    }
}

impl Target for MemoryTarget {
    fn read_memory(&self, address: u64, buf: &mut [u8]) -> Result<()> {
        let (start, bytes) =
            self.region_for(address, buf.len()).ok_or_else(|| Self::unmapped(address, buf.len()))?;
        let offset = (address - start) as usize;
        buf.copy_from_slice(&bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write_memory(&mut self, address: u64, data: &[u8]) -> Result<()> {
        let start = self
            .region_for(address, data.len())
            .map(|(start, _)| start)
            .ok_or_else(|| Self::unmapped(address, data.len()))?;
        if let Some(bytes) = self.regions.get_mut(&start) {
            let offset = (address - start) as usize;
            bytes[offset..offset + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    fn read_register(&self, regnum: u32) -> Result<Vec<u8>> {
        self.registers
            .get(&regnum)
            .cloned()
            .ok_or_else(|| Error::Register { regnum, reason: "register not available".into() })
    }

    fn inferior_id(&self) -> u64 {
        self.inferior
    }

    fn call_function(&mut self, entry: u64, args: &[Vec<u8>], ret_len: usize) -> Result<Vec<u8>> {
        let mut result = self
            .call_results
            .get(&entry)
            .cloned()
            .ok_or_else(|| Error::eval(format!("no subprogram at {entry:#x}")))?;
        self.calls.push((entry, args.to_vec()));
        result.resize(ret_len, 0);
        Ok(result)
    }

    fn is_big_endian(&self) -> bool {
        self.big_endian
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_within_a_region() {
        let mut target = MemoryTarget::new();
        target.map(0x1000, vec![1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        target.read_memory(0x1001, &mut buf).unwrap();
        assert_eq!(buf, [2, 3]);
    }

    #[test]
    fn reads_crossing_the_end_fail() {
        let mut target = MemoryTarget::new();
        target.map(0x1000, vec![1, 2, 3, 4]);
        let mut buf = [0u8; 4];
        let err = target.read_memory(0x1002, &mut buf).unwrap_err();
        assert!(err.is_target());
        assert!(target.read_memory(0x0fff, &mut [0u8; 1]).is_err());
    }

    #[test]
    fn writes_update_the_image() {
        let mut target = MemoryTarget::new();
        target.map(0x2000, vec![0; 4]);
        target.write_memory(0x2002, &[9, 9]).unwrap();
        let mut buf = [0u8; 4];
        target.read_memory(0x2000, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 9, 9]);
    }

    #[test]
    fn registers_and_missing_process() {
        let mut target = MemoryTarget::new();
        target.set_register(3, vec![7, 0, 0, 0]);
        assert_eq!(target.read_register(3).unwrap(), vec![7, 0, 0, 0]);
        assert!(matches!(target.read_register(4), Err(Error::Register { regnum: 4, .. })));
        assert!(NoTarget.read_memory(0, &mut [0u8; 1]).is_err());
    }

    #[test]
    fn calls_return_canned_results() {
        let mut target = MemoryTarget::new();
        target.set_call_result(0x400, vec![42, 0, 0, 0]);
        assert_eq!(target.call_function(0x400, &[vec![1]], 4).unwrap(), vec![42, 0, 0, 0]);
        assert_eq!(target.calls, vec![(0x400, vec![vec![1]])]);
        assert!(target.call_function(0x500, &[], 4).is_err());
        assert!(NoTarget.call_function(0x400, &[], 4).is_err());
    }
}
