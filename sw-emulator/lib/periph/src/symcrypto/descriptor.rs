/*++

Licensed under the Apache-2.0 license.

File Name:

    descriptor.rs

Abstract:

    File contains the scatter-gather descriptor format of the SYMCRYPTO
    fetcher and pusher, and the chain walker.

--*/

use super::error::EngineError;
use bitfield::bitfield;
use symcrypto_emu_bus::{Bus, BusError, MemoryAccess};
use symcrypto_emu_types::{emu_enum, RvAddr};
use tock_registers::interfaces::Readable;
use tock_registers::{register_bitfields, LocalRegisterCopy};

register_bitfields! [
    u32,

    /// Length word of a descriptor, also the layout of FETCHLEN and PUSHLEN
    pub DmaLength [
        LENGTH OFFSET(0) NUMBITS(28) [],
        CONSTADDR OFFSET(28) NUMBITS(1) [],
        REALIGN OFFSET(29) NUMBITS(1) [],
        /// Zero padding on the fetcher, discard on the pusher
        ZPAD_DISCARD OFFSET(30) NUMBITS(1) [],
        IE OFFSET(31) NUMBITS(1) [],
    ],
];

mod constants {
    #![allow(unused)]

    pub const DATA_ADDR_OFFSET: u32 = 0x0;
    pub const NEXT_ADDR_OFFSET: u32 = 0x4;
    pub const LENGTH_OFFSET: u32 = 0x8;
    pub const TAG_OFFSET: u32 = 0xc;

    /// Bit 0 of the next pointer marks the last node
    pub const LAST_DESCRIPTOR: u32 = 0x1;
    pub const NEXT_ADDR_MASK: u32 = !0x3;
}

emu_enum!(
    /// Engine selected by the low nibble of a fetcher tag
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub EngineSelect;
    u32;
    {
        Bypass = 0x0,
        Aes = 0x1,
        Des = 0x2,
        Hash = 0x3,
        ChaChaPoly = 0x4,
        Sha3 = 0x5,
        AesGcm = 0x6,
        AesXts = 0x7,
        HashPlusAes = 0x8,
        AesPlusHash = 0x9,
        Zuc = 0xa,
        Sm4 = 0xb,
        HpChaChaPoly = 0xc,
        Snow3g = 0xd,
        Kasumi = 0xe,
        Aria = 0xf,
    };
    Invalid
);

emu_enum!(
    /// Offset of an AES parameter carried by a config node
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub AesParameter;
    u8;
    {
        Config = 0x00,
        Key = 0x08,
        Iv = 0x28,
        Iv2 = 0x38,
        Key2 = 0x48,
        Mask = 0x68,
    };
    Unknown
);

/// Meaning of a data node, which depends on the engine the node feeds.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DataType {
    Unused,
    Payload,
    Header,
    Message,
    InitializationData,
    HmacKey,
    ReferenceHash,
    ReferenceTag,
    ReferenceDigest,
}

impl DataType {
    fn decode(engine: EngineSelect, code: u8) -> Self {
        use EngineSelect::*;
        match (engine, code) {
            (Aes | Sm4 | Aria, 0) => DataType::Payload,
            (Aes | Sm4 | Aria, 1) => DataType::Header,
            (Hash | Sha3, 0) => DataType::Message,
            (Hash | Sha3, 1) => DataType::InitializationData,
            (Hash | Sha3, 2) => DataType::HmacKey,
            (Hash | Sha3, 3) => DataType::ReferenceHash,
            (AesGcm | ChaChaPoly | HpChaChaPoly, 0) => DataType::Payload,
            (AesGcm | ChaChaPoly | HpChaChaPoly, 1) => DataType::Header,
            (AesGcm, 3) => DataType::ReferenceTag,
            (ChaChaPoly | HpChaChaPoly, 3) => DataType::ReferenceDigest,
            _ => DataType::Unused,
        }
    }
}

/// Role of a fetcher node, decoded once from its tag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TagRole {
    Data { data_type: DataType, invalid_bytes: u32 },
    Config { offset: u8 },
}

bitfield! {
    /// Tag word of a fetcher descriptor
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct FetcherTag(u32);

    pub u32, engine_code, _: 3, 0;
    pub is_config, _: 4;
    pub last_of_kind, _: 5;
    pub u8, data_type_code, _: 7, 6;
    pub u8, offset, _: 15, 8;
}

impl FetcherTag {
    pub fn engine(&self) -> EngineSelect {
        EngineSelect::from(self.engine_code())
    }

    pub fn is_data(&self) -> bool {
        !self.is_config()
    }

    /// Invalid trailing bytes (or bits) of a data node, bits 15:14 and 11:8.
    pub fn invalid_bytes(&self) -> u32 {
        (self.0 & 0xcf00) >> 8
    }

    pub fn role(&self) -> TagRole {
        if self.is_config() {
            TagRole::Config {
                offset: self.offset(),
            }
        } else {
            TagRole::Data {
                data_type: DataType::decode(self.engine(), self.data_type_code()),
                invalid_bytes: self.invalid_bytes(),
            }
        }
    }
}

/// DMA direction a chain belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Side {
    Fetcher,
    Pusher,
}

/// One scatter-gather node as read from memory.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub side: Side,
    /// Address of the node itself
    pub address: RvAddr,
    pub data_address: RvAddr,
    pub next: RvAddr,
    pub last: bool,
    pub length: LocalRegisterCopy<u32, DmaLength::Register>,
    /// Always zero on the pusher side
    pub tag: FetcherTag,
    /// Node payload, zero-filled for pusher and zero-padding nodes
    pub data: Vec<u8>,
}

impl Descriptor {
    /// Decode the node at `address`.
    pub fn read(memory: &mut dyn Bus, address: RvAddr, side: Side) -> Result<Self, BusError> {
        let field = |offset: u32| {
            address
                .checked_add(offset)
                .ok_or(BusError::LoadAccessFault)
        };

        let data_address = memory.read_word(field(constants::DATA_ADDR_OFFSET)?)?;
        let next_raw = memory.read_word(field(constants::NEXT_ADDR_OFFSET)?)?;
        let length = LocalRegisterCopy::new(memory.read_word(field(constants::LENGTH_OFFSET)?)?);
        let tag = match side {
            Side::Fetcher => FetcherTag(memory.read_word(field(constants::TAG_OFFSET)?)?),
            Side::Pusher => FetcherTag(0),
        };

        let mut descriptor = Self {
            side,
            address,
            data_address,
            next: next_raw & constants::NEXT_ADDR_MASK,
            last: next_raw & constants::LAST_DESCRIPTOR != 0,
            length,
            tag,
            data: Vec::new(),
        };
        descriptor.data = if descriptor.zero_padding() || side == Side::Pusher {
            vec![0; descriptor.len()]
        } else {
            memory.read_bytes(data_address, descriptor.len())?
        };
        Ok(descriptor)
    }

    pub fn len(&self) -> usize {
        self.length.read(DmaLength::LENGTH) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn const_addr(&self) -> bool {
        self.length.is_set(DmaLength::CONSTADDR)
    }

    pub fn realign(&self) -> bool {
        self.length.is_set(DmaLength::REALIGN)
    }

    pub fn zero_padding(&self) -> bool {
        self.side == Side::Fetcher && self.length.is_set(DmaLength::ZPAD_DISCARD)
    }

    pub fn discard(&self) -> bool {
        self.side == Side::Pusher && self.length.is_set(DmaLength::ZPAD_DISCARD)
    }

    pub fn interrupt_enable(&self) -> bool {
        self.length.is_set(DmaLength::IE)
    }

    pub fn role(&self) -> TagRole {
        self.tag.role()
    }

    /// Invalid trailing bytes of a data node, zero for config nodes.
    pub fn invalid_bytes(&self) -> usize {
        match self.role() {
            TagRole::Data { invalid_bytes, .. } => invalid_bytes as usize,
            TagRole::Config { .. } => 0,
        }
    }

    /// Data bytes less the invalid trailing bytes, which only count on
    /// block-aligned nodes.
    pub fn valid_data(&self) -> &[u8] {
        let invalid = if self.len() % 16 == 0 {
            self.invalid_bytes()
        } else {
            0
        };
        &self.data[..self.data.len().saturating_sub(invalid)]
    }

    /// Write `bytes` to the node's buffer, truncated to the node length.
    /// Writes to a discard node are dropped.
    pub fn push(&self, memory: &mut dyn Bus, bytes: &[u8]) -> Result<(), BusError> {
        if self.discard() {
            return Ok(());
        }
        let len = bytes.len().min(self.len());
        memory.write_bytes(self.data_address, &bytes[..len])
    }
}

/// Walk the chain whose head is in `address`.
///
/// Nodes are read until one is marked last. With `auto_advance` set, every
/// non-terminal node without CONSTADDR moves `address` to its next pointer,
/// the way the hardware address register moves.
///
/// # Error
///
/// * `EngineError::MalformedChain` - `max_nodes` nodes were read without
///   reaching a terminal node
pub fn walk(
    memory: &mut dyn Bus,
    address: &mut RvAddr,
    side: Side,
    auto_advance: bool,
    max_nodes: usize,
) -> Result<Vec<Descriptor>, EngineError> {
    let mut list = Vec::new();
    let mut node = *address;
    loop {
        if list.len() >= max_nodes {
            tracing::error!(?side, head = *address, max_nodes, "descriptor chain has no end");
            Err(EngineError::MalformedChain { max: max_nodes })?
        }

        let descriptor = Descriptor::read(memory, node, side)?;
        tracing::trace!(
            ?side,
            node,
            data = descriptor.data_address,
            len = descriptor.len(),
            tag = descriptor.tag.0,
            last = descriptor.last,
            "descriptor"
        );

        let more = !descriptor.last;
        if auto_advance && more && !descriptor.const_addr() {
            *address = descriptor.next;
        }
        node = descriptor.next;
        list.push(descriptor);
        if !more {
            break;
        }
    }
    Ok(list)
}
