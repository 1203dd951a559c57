/*++

Licensed under the Apache-2.0 license.

File Name:

    access.rs

Abstract:

    File contains byte and word helpers for peripherals that master the bus.

--*/

use crate::{Bus, BusError};
use symcrypto_emu_types::{RvAddr, RvSize};

/// Byte-stream access on top of any [`Bus`]. Words are little-endian.
pub trait MemoryAccess: Bus {
    fn read_byte(&mut self, addr: RvAddr) -> Result<u8, BusError> {
        Ok(self.read(RvSize::Byte, addr)? as u8)
    }

    fn write_byte(&mut self, addr: RvAddr, val: u8) -> Result<(), BusError> {
        self.write(RvSize::Byte, addr, val as u32)
    }

    fn read_word(&mut self, addr: RvAddr) -> Result<u32, BusError> {
        self.read(RvSize::Word, addr)
    }

    fn write_word(&mut self, addr: RvAddr, val: u32) -> Result<(), BusError> {
        self.write(RvSize::Word, addr, val)
    }

    /// Read `len` consecutive bytes starting at `addr`.
    ///
    /// # Error
    ///
    /// * `BusError::LoadAccessFault` - the range wraps the address space or
    ///   any byte in it faults
    fn read_bytes(&mut self, addr: RvAddr, len: usize) -> Result<Vec<u8>, BusError> {
        (0..len)
            .map(|i| {
                let addr = addr
                    .checked_add(i as RvAddr)
                    .ok_or(BusError::LoadAccessFault)?;
                self.read_byte(addr)
            })
            .collect()
    }

    /// Write `data` to consecutive bytes starting at `addr`.
    fn write_bytes(&mut self, addr: RvAddr, data: &[u8]) -> Result<(), BusError> {
        for (i, b) in data.iter().enumerate() {
            let addr = addr
                .checked_add(i as RvAddr)
                .ok_or(BusError::StoreAccessFault)?;
            self.write_byte(addr, *b)?;
        }
        Ok(())
    }

    /// Copy `len` bytes from `src` to `dst`, one byte at a time in
    /// ascending order.
    fn copy_bytes(&mut self, src: RvAddr, dst: RvAddr, len: usize) -> Result<(), BusError> {
        let data = self.read_bytes(src, len)?;
        self.write_bytes(dst, &data)
    }
}

impl<T: Bus + ?Sized> MemoryAccess for T {}
