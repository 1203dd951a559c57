/*++

Licensed under the Apache-2.0 license.

File Name:

    ram.rs

Abstract:

    File contains the RAM device backing the simulated system memory that
    descriptors and payloads live in.

--*/

use crate::{mem::Mem, Bus, BusError};
use symcrypto_emu_types::{RvAddr, RvData, RvSize};

/// Read Write Memory Device
pub struct Ram {
    mem: Mem,
}

impl Ram {
    /// Create a RAM holding `data`, mapped from address zero.
    pub fn new(data: Vec<u8>) -> Self {
        Self { mem: Mem::new(data) }
    }

    /// Zero-filled RAM of `len` bytes.
    pub fn zeroed(len: usize) -> Self {
        Self::new(vec![0; len])
    }

    pub fn mmap_size(&self) -> RvAddr {
        self.mem.len() as RvAddr
    }

    pub fn data(&self) -> &[u8] {
        self.mem.data()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.mem.data_mut()
    }
}

impl Bus for Ram {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        self.mem.read(size, addr).map_err(|err| {
            tracing::trace!(addr, ?size, "RAM read outside memory");
            err.into()
        })
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        self.mem.write(size, addr, val).map_err(|err| {
            tracing::trace!(addr, ?size, "RAM write outside memory");
            err.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed() {
        let ram = Ram::zeroed(0x40);
        assert_eq!(ram.mmap_size(), 0x40);
        assert!(ram.data().iter().all(|b| *b == 0));
    }

    #[test]
    fn test_unaligned_word() {
        let mut ram = Ram::new((0..8).collect());
        assert_eq!(ram.read(RvSize::Word, 3), Ok(0x0605_0403));
        ram.write(RvSize::Word, 1, 0xaabb_ccdd).unwrap();
        assert_eq!(ram.data(), &[0, 0xdd, 0xcc, 0xbb, 0xaa, 5, 6, 7]);
    }

    #[test]
    fn test_access_past_end() {
        let mut ram = Ram::zeroed(4);
        assert_eq!(ram.read(RvSize::HalfWord, 3), Err(BusError::LoadAccessFault));
        assert_eq!(
            ram.write(RvSize::Byte, 4, 0),
            Err(BusError::StoreAccessFault)
        );
        ram.data_mut()[3] = 0x5a;
        assert_eq!(ram.read(RvSize::Byte, 3), Ok(0x5a));
    }
}
