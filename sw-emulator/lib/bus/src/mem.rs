/*++

Licensed under the Apache-2.0 license.

File Name:

    mem.rs

Abstract:

    File contains the byte storage backing memory devices.

--*/

use crate::BusError;
use symcrypto_emu_types::{RvAddr, RvData, RvSize};

/// Memory Exception
#[derive(Debug, PartialEq, Eq)]
pub enum MemError {
    /// Read Access fault
    ReadAccessFault,

    /// Write access fault
    WriteAccessFault,
}

impl From<MemError> for BusError {
    /// Converts to this type from the input type.
    fn from(exception: MemError) -> BusError {
        match exception {
            MemError::ReadAccessFault => BusError::LoadAccessFault,
            MemError::WriteAccessFault => BusError::StoreAccessFault,
        }
    }
}

/// Little-endian byte storage. Accesses need not be aligned.
pub struct Mem {
    /// Data storage
    data: Vec<u8>,
}

impl Mem {
    /// Create a new memory object
    ///
    /// # Arguments
    ///
    /// * `data` - Data contents for memory
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Size of the memory in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Immutable reference to data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable reference to data
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Byte range covered by an access, `None` when it leaves the memory.
    fn span(&self, size: RvSize, addr: RvAddr) -> Option<std::ops::Range<usize>> {
        let width = size.value()?;
        let start = addr as usize;
        let end = start.checked_add(width)?;
        (end <= self.data.len()).then_some(start..end)
    }

    /// Read data of specified size from given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    /// * `addr` - Address to read from
    ///
    /// # Error
    ///
    /// * `MemError::ReadAccessFault` - Read from invalid or non existent address
    #[inline]
    pub fn read(&self, size: RvSize, addr: RvAddr) -> Result<RvData, MemError> {
        let span = self.span(size, addr).ok_or(MemError::ReadAccessFault)?;
        Ok(self.data[span]
            .iter()
            .rev()
            .fold(0, |acc, b| (acc << 8) | *b as RvData))
    }

    /// Write data of specified size to given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the write
    /// * `addr` - Address to write
    /// * `val` - Data to write
    ///
    /// # Error
    ///
    /// * `MemError::WriteAccessFault` - Write to invalid or non existent address
    #[inline]
    pub fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), MemError> {
        let span = self.span(size, addr).ok_or(MemError::WriteAccessFault)?;
        let width = span.len();
        self.data[span].copy_from_slice(&val.to_le_bytes()[..width]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_sizes() {
        let mem = Mem::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(mem.read(RvSize::Byte, 4), Ok(5));
        assert_eq!(mem.read(RvSize::HalfWord, 1), Ok(0x0302));
        assert_eq!(mem.read(RvSize::Word, 1), Ok(0x05040302));
    }

    #[test]
    fn test_read_out_of_range() {
        let mem = Mem::new(vec![1, 2, 3, 4, 5]);
        assert_eq!(mem.read(RvSize::Word, 2), Err(MemError::ReadAccessFault));
        assert_eq!(mem.read(RvSize::Invalid, 0), Err(MemError::ReadAccessFault));
        assert_eq!(
            mem.read(RvSize::Byte, RvAddr::MAX),
            Err(MemError::ReadAccessFault)
        );
    }

    #[test]
    fn test_write_sizes() {
        let mut mem = Mem::new(vec![0; 8]);
        assert_eq!(mem.write(RvSize::Word, 0, 0xddccbbaa), Ok(()));
        assert_eq!(mem.write(RvSize::HalfWord, 4, 0x1234_5678), Ok(()));
        assert_eq!(mem.write(RvSize::Byte, 7, 0xff), Ok(()));
        assert_eq!(mem.data(), &[0xaa, 0xbb, 0xcc, 0xdd, 0x78, 0x56, 0x00, 0xff]);
    }

    #[test]
    fn test_write_out_of_range() {
        let mut mem = Mem::new(vec![0; 4]);
        assert_eq!(
            mem.write(RvSize::HalfWord, 3, 0),
            Err(MemError::WriteAccessFault)
        );
        assert_eq!(mem.data(), &[0; 4]);
    }
}
