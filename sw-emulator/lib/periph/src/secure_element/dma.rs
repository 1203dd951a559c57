/*++

Licensed under the Apache-2.0 license.

File Name:

    dma.rs

Abstract:

    File contains the DMA descriptor chains used by secure element commands.

--*/

use super::error::SeError;
use symcrypto_emu_bus::{Bus, BusError, MemoryAccess};
use symcrypto_emu_types::{emu_enum, RvAddr};

mod constants {
    #![allow(unused)]

    pub const DATA_ADDR_OFFSET: u32 = 0;
    pub const NEXT_OFFSET: u32 = 4;
    pub const SIZE_OFFSET: u32 = 8;

    pub const SIZE_MASK: u32 = 0x0fff_ffff;
    pub const OPTIONS_SHIFT: u32 = 28;
}

/// Next-pointer value that terminates a chain.
pub const NULL_DESCRIPTOR: RvAddr = 1;

emu_enum!(
    /// Transfer options, bits 31:28 of the size word
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub TransferOptions;
    u32;
    {
        Plain = 0,
        Register = 1,
        MemoryRealign = 2,
        Discard = 4,
    };
    Unknown
);

/// One secure element DMA node: data pointer, next pointer and size word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeDescriptor {
    pub address: RvAddr,
    pub data_address: RvAddr,
    pub next: RvAddr,
    pub size: usize,
    pub options: TransferOptions,
}

impl SeDescriptor {
    pub fn read(memory: &mut dyn Bus, address: RvAddr) -> Result<Self, SeError> {
        if address == NULL_DESCRIPTOR {
            tracing::error!("null descriptor dereferenced");
            Err(SeError::NullDescriptor)?
        }
        let field = |offset: u32| {
            address
                .checked_add(offset)
                .ok_or(BusError::LoadAccessFault)
        };
        let data_address = memory.read_word(field(constants::DATA_ADDR_OFFSET)?)?;
        let next = memory.read_word(field(constants::NEXT_OFFSET)?)?;
        let size_word = memory.read_word(field(constants::SIZE_OFFSET)?)?;

        let descriptor = Self {
            address,
            data_address,
            next,
            size: (size_word & constants::SIZE_MASK) as usize,
            options: TransferOptions::from(size_word >> constants::OPTIONS_SHIFT),
        };
        tracing::trace!(
            address,
            data_address,
            next,
            size = descriptor.size,
            options = %descriptor.options,
            "DMA descriptor"
        );
        Ok(descriptor)
    }

    pub fn is_discard(&self) -> bool {
        self.options == TransferOptions::Discard
    }

    /// Read the whole buffer.
    pub fn fetch(&self, memory: &mut dyn Bus) -> Result<Vec<u8>, BusError> {
        memory.read_bytes(self.data_address, self.size)
    }

    /// Write `data` into the buffer, truncated to the buffer size.
    pub fn store(&self, memory: &mut dyn Bus, data: &[u8]) -> Result<(), BusError> {
        let len = data.len().min(self.size);
        memory.write_bytes(self.data_address, &data[..len])
    }
}

/// Cursor over a descriptor chain.
pub struct DmaChain {
    next: RvAddr,
    visited: usize,
    max: usize,
}

impl DmaChain {
    pub fn new(head: RvAddr, max: usize) -> Self {
        Self {
            next: head,
            visited: 0,
            max,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next != NULL_DESCRIPTOR
    }

    pub fn next_descriptor(&mut self, memory: &mut dyn Bus) -> Result<SeDescriptor, SeError> {
        if self.visited >= self.max {
            tracing::error!(max = self.max, "DMA chain too long");
            Err(SeError::MalformedChain { max: self.max })?
        }
        let descriptor = SeDescriptor::read(memory, self.next)?;
        self.next = descriptor.next;
        self.visited += 1;
        Ok(descriptor)
    }

    /// Read the buffer of the next node.
    pub fn next_data(&mut self, memory: &mut dyn Bus) -> Result<Vec<u8>, SeError> {
        let descriptor = self.next_descriptor(memory)?;
        Ok(descriptor.fetch(memory)?)
    }

    /// Collect `len` bytes from consecutive nodes, skipping discard nodes.
    pub fn gather(&mut self, memory: &mut dyn Bus, len: usize) -> Result<Vec<u8>, SeError> {
        let mut data = Vec::with_capacity(len);
        while data.len() < len {
            let descriptor = self.next_descriptor(memory)?;
            if descriptor.is_discard() {
                continue;
            }
            data.extend(descriptor.fetch(memory)?);
        }
        data.truncate(len);
        Ok(data)
    }

    /// Spread `data` over consecutive nodes, skipping discard nodes.
    pub fn scatter(&mut self, memory: &mut dyn Bus, data: &[u8]) -> Result<(), SeError> {
        let mut offset = 0;
        while offset < data.len() {
            let descriptor = self.next_descriptor(memory)?;
            if descriptor.is_discard() {
                continue;
            }
            descriptor.store(memory, &data[offset..])?;
            offset += descriptor.size;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcrypto_emu_bus::Ram;

    const DISCARD: u32 = 4 << 28;

    fn write_words(ram: &mut Ram, at: u32, words: &[u32]) {
        for (i, word) in words.iter().enumerate() {
            ram.write_word(at + 4 * i as u32, *word).unwrap();
        }
    }

    #[test]
    fn test_read_descriptor() {
        let mut ram = Ram::new(vec![0; 0x400]);
        write_words(&mut ram, 0x100, &[0x200, NULL_DESCRIPTOR, (2 << 28) | 0x30]);
        let descriptor = SeDescriptor::read(&mut ram, 0x100).unwrap();
        assert_eq!(descriptor.data_address, 0x200);
        assert_eq!(descriptor.next, NULL_DESCRIPTOR);
        assert_eq!(descriptor.size, 0x30);
        assert_eq!(descriptor.options, TransferOptions::MemoryRealign);
    }

    #[test]
    fn test_null_descriptor() {
        let mut ram = Ram::new(vec![0; 0x100]);
        assert_eq!(
            SeDescriptor::read(&mut ram, NULL_DESCRIPTOR),
            Err(SeError::NullDescriptor)
        );
    }

    #[test]
    fn test_gather_skips_discard() {
        let mut ram = Ram::new(vec![0; 0x400]);
        ram.write_bytes(0x200, &[1, 2, 3]).unwrap();
        ram.write_bytes(0x280, &[9, 9]).unwrap();
        ram.write_bytes(0x300, &[4, 5, 6]).unwrap();
        write_words(&mut ram, 0x100, &[0x200, 0x110, 3]);
        write_words(&mut ram, 0x110, &[0x280, 0x120, DISCARD | 2]);
        write_words(&mut ram, 0x120, &[0x300, NULL_DESCRIPTOR, 3]);

        let mut chain = DmaChain::new(0x100, 8);
        assert_eq!(
            chain.gather(&mut ram, 5).unwrap(),
            vec![1, 2, 3, 4, 5]
        );
        assert!(!chain.has_next());
    }

    #[test]
    fn test_scatter() {
        let mut ram = Ram::new(vec![0; 0x400]);
        write_words(&mut ram, 0x100, &[0x200, 0x110, 2]);
        write_words(&mut ram, 0x110, &[0x300, NULL_DESCRIPTOR, 4]);

        let mut chain = DmaChain::new(0x100, 8);
        chain.scatter(&mut ram, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(ram.read_bytes(0x200, 3).unwrap(), vec![1, 2, 0]);
        assert_eq!(ram.read_bytes(0x300, 4).unwrap(), vec![3, 4, 5, 0]);
    }

    #[test]
    fn test_chain_guard() {
        let mut ram = Ram::new(vec![0; 0x400]);
        // node pointing at itself
        write_words(&mut ram, 0x100, &[0x200, 0x100, 0]);
        let mut chain = DmaChain::new(0x100, 4);
        assert_eq!(
            chain.gather(&mut ram, 1),
            Err(SeError::MalformedChain { max: 4 })
        );
    }
}
