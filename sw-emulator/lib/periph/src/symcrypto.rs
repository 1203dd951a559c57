/*++

Licensed under the Apache-2.0 license.

File Name:

    symcrypto.rs

Abstract:

    File contains the SYMCRYPTO accelerator peripheral: the fetcher/pusher
    register front-end and the dispatch of scatter-gather requests to the
    crypto engines.

--*/

mod aes_engine;
mod bypass;
mod descriptor;
mod error;
mod hash_engine;

pub use descriptor::{
    AesParameter, DataType, Descriptor, DmaLength, EngineSelect, FetcherTag, Side, TagRole,
};
pub use error::EngineError;

use crate::key_store::VolatileKeyStore;
use aes_engine::AesEngine;
use std::cell::RefCell;
use std::rc::Rc;
use symcrypto_emu_bus::{
    Bus, BusError, Irq, MemoryAccess, ReadOnlyRegister, ReadWriteRegister, Register, SharedBus,
};
use symcrypto_emu_crypto::HashEngine;
use symcrypto_emu_types::{RvAddr, RvData, RvSize};
use tock_registers::interfaces::{ReadWriteable, Readable, Writeable};
use tock_registers::{register_bitfields, LocalRegisterCopy};

register_bitfields! [
    u32,

    /// Interrupt sources, shared by IEN, IF and their set/clear registers
    pub Interrupt [
        FETCHER_END_OF_BLOCK OFFSET(0) NUMBITS(1) [],
        FETCHER_STOPPED OFFSET(1) NUMBITS(1) [],
        FETCHER_ERROR OFFSET(2) NUMBITS(1) [],
        PUSHER_END_OF_BLOCK OFFSET(3) NUMBITS(1) [],
        PUSHER_STOPPED OFFSET(4) NUMBITS(1) [],
        PUSHER_ERROR OFFSET(5) NUMBITS(1) [],
    ],

    /// Control register
    pub Control [
        FETCHER_SCATTER_GATHER OFFSET(0) NUMBITS(1) [],
        PUSHER_SCATTER_GATHER OFFSET(1) NUMBITS(1) [],
        STOP_FETCHER OFFSET(2) NUMBITS(1) [],
        STOP_PUSHER OFFSET(3) NUMBITS(1) [],
    ],

    /// Command register
    pub Command [
        START_FETCHER OFFSET(0) NUMBITS(1) [],
        START_PUSHER OFFSET(1) NUMBITS(1) [],
    ],

    /// Status register
    pub Status [
        FETCHER_BUSY OFFSET(0) NUMBITS(1) [],
        PUSHER_BUSY OFFSET(1) NUMBITS(1) [],
    ],
];

mod constants {
    #![allow(unused)]

    pub const INTERRUPT_MASK: u32 = 0x3f;

    pub const INCL_IPS_HW_CFG_RESET: u32 = 0x0000_0011;
    pub const BA411E_HW_CFG_1_RESET: u32 = 0x0f03_017f;
    pub const BA413_HW_CFG_RESET: u32 = 0x0013_007f;

    pub const DEFAULT_MAX_DESCRIPTORS: usize = 1024;
}

/// SYMCRYPTO configuration
#[derive(Debug, Clone)]
pub struct SymCryptoConfig {
    /// Upper bound on the nodes of one descriptor chain
    pub max_descriptors: usize,

    /// Decode the AES context save request from bit 4 of the config word
    /// instead of bit 5
    pub cx_save_reads_cx_load_bit: bool,
}

impl Default for SymCryptoConfig {
    fn default() -> Self {
        Self {
            max_descriptors: constants::DEFAULT_MAX_DESCRIPTORS,
            cx_save_reads_cx_load_bit: false,
        }
    }
}

/// SYMCRYPTO accelerator
#[derive(Clone)]
pub struct SymCrypto {
    regs: Rc<RefCell<SymCryptoRegs>>,
}

impl SymCrypto {
    /// Create a new instance of the accelerator
    ///
    /// # Arguments
    ///
    /// * `memory` - System address space walked by the fetcher and pusher
    /// * `irq` - Interrupt line
    /// * `key_store` - Volatile key slots selected by the AES config word
    /// * `config` - Accelerator configuration
    pub fn new(
        memory: SharedBus,
        irq: Irq,
        key_store: VolatileKeyStore,
        config: SymCryptoConfig,
    ) -> Self {
        Self {
            regs: Rc::new(RefCell::new(SymCryptoRegs::new(
                memory, irq, key_store, config,
            ))),
        }
    }

    /// Memory map size.
    pub fn mmap_size(&self) -> RvAddr {
        SymCryptoRegs::MMAP_SIZE
    }

    pub fn reset(&self) {
        self.regs.borrow_mut().reset();
    }
}

impl Bus for SymCrypto {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        self.regs.borrow_mut().read(size, addr)
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        self.regs.borrow_mut().write(size, addr, val)
    }

    fn warm_reset(&mut self) {
        self.reset();
    }
}

/// Write applied through one of the register aliases.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Alias {
    None,
    Set,
    Clear,
    Toggle,
}

impl Alias {
    fn decode(addr: RvAddr) -> (Self, RvAddr) {
        let alias = match addr & SymCryptoRegs::ALIAS_MASK {
            SymCryptoRegs::ALIAS_SET => Alias::Set,
            SymCryptoRegs::ALIAS_CLEAR => Alias::Clear,
            SymCryptoRegs::ALIAS_TOGGLE => Alias::Toggle,
            _ => Alias::None,
        };
        (alias, addr & !SymCryptoRegs::ALIAS_MASK)
    }

    fn apply(self, current: u32, val: u32) -> u32 {
        match self {
            Alias::None => val,
            Alias::Set => current | val,
            Alias::Clear => current & !val,
            Alias::Toggle => current ^ val,
        }
    }
}

struct SymCryptoRegs {
    fetch_addr: ReadWriteRegister,
    fetch_len: ReadWriteRegister<DmaLength::Register>,
    fetch_tag: ReadWriteRegister,
    push_addr: ReadWriteRegister,
    push_len: ReadWriteRegister<DmaLength::Register>,
    ien: ReadWriteRegister<Interrupt::Register>,
    flags: ReadOnlyRegister<Interrupt::Register>,
    ctrl: ReadWriteRegister<Control::Register>,
    status: ReadOnlyRegister<Status::Register>,
    incl_ips_hw_cfg: ReadOnlyRegister,
    ba411e_hw_cfg_1: ReadOnlyRegister,
    ba413_hw_cfg: ReadOnlyRegister,

    memory: SharedBus,
    irq: Irq,
    key_store: VolatileKeyStore,
    config: SymCryptoConfig,

    /// Running digest between hash update requests
    hash_session: Option<HashEngine>,
}

impl SymCryptoRegs {
    const MMAP_SIZE: RvAddr = 0x4000;

    const FETCH_ADDR: RvAddr = 0x000;
    const FETCH_LEN: RvAddr = 0x008;
    const FETCH_TAG: RvAddr = 0x00c;
    const PUSH_ADDR: RvAddr = 0x010;
    const PUSH_LEN: RvAddr = 0x018;
    const IEN: RvAddr = 0x01c;
    const IEN_SET: RvAddr = 0x020;
    const IEN_CLR: RvAddr = 0x024;
    const IF: RvAddr = 0x028;
    const IF_MASKED: RvAddr = 0x02c;
    const IF_CLR: RvAddr = 0x030;
    const CTRL: RvAddr = 0x034;
    const CMD: RvAddr = 0x038;
    const STATUS: RvAddr = 0x03c;
    const INCL_IPS_HW_CFG: RvAddr = 0x400;
    const BA411E_HW_CFG_1: RvAddr = 0x404;
    const BA413_HW_CFG: RvAddr = 0x40c;

    const ALIAS_MASK: RvAddr = 0x3000;
    const ALIAS_SET: RvAddr = 0x1000;
    const ALIAS_CLEAR: RvAddr = 0x2000;
    const ALIAS_TOGGLE: RvAddr = 0x3000;

    fn new(
        memory: SharedBus,
        irq: Irq,
        key_store: VolatileKeyStore,
        config: SymCryptoConfig,
    ) -> Self {
        Self {
            fetch_addr: ReadWriteRegister::new(0),
            fetch_len: ReadWriteRegister::new(0),
            fetch_tag: ReadWriteRegister::new(0),
            push_addr: ReadWriteRegister::new(0),
            push_len: ReadWriteRegister::new(0),
            ien: ReadWriteRegister::new(0),
            flags: ReadOnlyRegister::new(0),
            ctrl: ReadWriteRegister::new(0),
            status: ReadOnlyRegister::new(0),
            incl_ips_hw_cfg: ReadOnlyRegister::new(constants::INCL_IPS_HW_CFG_RESET),
            ba411e_hw_cfg_1: ReadOnlyRegister::new(constants::BA411E_HW_CFG_1_RESET),
            ba413_hw_cfg: ReadOnlyRegister::new(constants::BA413_HW_CFG_RESET),
            memory,
            irq,
            key_store,
            config,
            hash_session: None,
        }
    }

    fn reset(&mut self) {
        for reg in [&self.fetch_addr, &self.fetch_tag, &self.push_addr] {
            reg.reg.set(0);
        }
        self.fetch_len.reg.set(0);
        self.push_len.reg.set(0);
        self.ien.reg.set(0);
        self.flags.reg.set(0);
        self.ctrl.reg.set(0);
        self.status.reg.set(0);
        self.hash_session = None;
        self.update_interrupts();
    }

    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        let (alias, offset) = Alias::decode(addr);
        if alias != Alias::None {
            tracing::warn!(addr, ?alias, "read through register alias");
        }

        match offset {
            Self::FETCH_ADDR => self.fetch_addr.read(size),
            Self::FETCH_LEN => self.fetch_len.read(size),
            Self::FETCH_TAG => self.fetch_tag.read(size),
            Self::PUSH_ADDR => self.push_addr.read(size),
            Self::PUSH_LEN => self.push_len.read(size),
            Self::IEN => self.ien.read(size),
            Self::IF => self.flags.read(size),
            Self::IF_MASKED => {
                if size != RvSize::Word {
                    Err(BusError::LoadAccessFault)?
                }
                Ok(self.masked_flags())
            }
            Self::CTRL => self.ctrl.read(size),
            Self::STATUS => self.status.read(size),
            Self::INCL_IPS_HW_CFG => self.incl_ips_hw_cfg.read(size),
            Self::BA411E_HW_CFG_1 => self.ba411e_hw_cfg_1.read(size),
            Self::BA413_HW_CFG => self.ba413_hw_cfg.read(size),
            _ => Err(BusError::LoadAccessFault),
        }
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word {
            Err(BusError::StoreAccessFault)?
        }
        let (alias, offset) = Alias::decode(addr);
        let val = alias.apply(self.alias_base(offset), val);

        match offset {
            Self::FETCH_ADDR => self.fetch_addr.write(size, val)?,
            Self::FETCH_LEN => self.fetch_len.write(size, val)?,
            Self::FETCH_TAG => self.fetch_tag.write(size, val)?,
            Self::PUSH_ADDR => self.push_addr.write(size, val)?,
            Self::PUSH_LEN => self.push_len.write(size, val)?,
            Self::IEN => {
                self.ien.reg.set(val & constants::INTERRUPT_MASK);
                self.update_interrupts();
            }
            Self::IEN_SET => {
                self.ien
                    .reg
                    .set(self.ien.reg.get() | (val & constants::INTERRUPT_MASK));
                self.update_interrupts();
            }
            Self::IEN_CLR => {
                self.ien.reg.set(self.ien.reg.get() & !val);
                self.update_interrupts();
            }
            // IF is only writable through the aliases
            Self::IF if alias != Alias::None => {
                self.flags.reg.set(val & constants::INTERRUPT_MASK);
                self.update_interrupts();
            }
            Self::IF_CLR => {
                self.flags.reg.set(self.flags.reg.get() & !val);
                self.update_interrupts();
            }
            Self::CTRL => self.ctrl.write(size, val)?,
            Self::CMD => self.command(val)?,
            _ => Err(BusError::StoreAccessFault)?,
        }
        Ok(())
    }

    /// Current value an alias write operates on. Strobe registers read as
    /// zero.
    fn alias_base(&self, offset: RvAddr) -> u32 {
        match offset {
            Self::FETCH_ADDR => self.fetch_addr.reg.get(),
            Self::FETCH_LEN => self.fetch_len.reg.get(),
            Self::FETCH_TAG => self.fetch_tag.reg.get(),
            Self::PUSH_ADDR => self.push_addr.reg.get(),
            Self::PUSH_LEN => self.push_len.reg.get(),
            Self::IEN => self.ien.reg.get(),
            Self::IF => self.flags.reg.get(),
            Self::CTRL => self.ctrl.reg.get(),
            _ => 0,
        }
    }

    fn masked_flags(&self) -> u32 {
        self.flags.reg.get() & self.ien.reg.get() & constants::INTERRUPT_MASK
    }

    /// Publish the interrupt line, the OR over every enabled flag.
    fn update_interrupts(&self) {
        self.irq.set_level(self.masked_flags() != 0);
    }

    fn command(&mut self, val: u32) -> Result<(), BusError> {
        let cmd = LocalRegisterCopy::<u32, Command::Register>::new(val);
        if cmd.is_set(Command::START_PUSHER) {
            tracing::debug!("start pusher");
        }
        if cmd.is_set(Command::START_FETCHER) {
            self.start_fetcher()?;
        }
        Ok(())
    }

    fn start_fetcher(&mut self) -> Result<(), BusError> {
        self.status
            .reg
            .write(Status::FETCHER_BUSY::SET + Status::PUSHER_BUSY::SET);

        let result = if self.ctrl.reg.is_set(Control::FETCHER_SCATTER_GATHER) {
            self.run_scatter_gather()
        } else {
            self.run_direct()
        };

        self.status.reg.set(0);
        let result = match result {
            Ok(()) => {
                self.flags
                    .reg
                    .modify(Interrupt::FETCHER_STOPPED::SET + Interrupt::PUSHER_STOPPED::SET);
                Ok(())
            }
            Err(err) => {
                tracing::error!(%err, "fetcher operation failed");
                self.flags.reg.modify(Interrupt::FETCHER_ERROR::SET);
                Err(BusError::StoreAccessFault)
            }
        };
        self.update_interrupts();
        result
    }

    #[tracing::instrument(skip_all)]
    fn run_scatter_gather(&mut self) -> Result<(), EngineError> {
        let memory = self.memory.clone();
        let mut memory = memory.borrow_mut();
        let max = self.config.max_descriptors;

        let mut address = self.fetch_addr.reg.get();
        let fetcher = descriptor::walk(&mut *memory, &mut address, Side::Fetcher, true, max);
        self.fetch_addr.reg.set(address);
        let fetcher = fetcher?;

        let mut address = self.push_addr.reg.get();
        let auto_advance = self.ctrl.reg.is_set(Control::PUSHER_SCATTER_GATHER);
        let pusher = descriptor::walk(&mut *memory, &mut address, Side::Pusher, auto_advance, max);
        self.push_addr.reg.set(address);
        let pusher = pusher?;

        let engine = fetcher
            .first()
            .map(|node| node.tag.engine())
            .ok_or(EngineError::EmptyChain)?;
        tracing::debug!(
            %engine,
            fetcher = fetcher.len(),
            pusher = pusher.len(),
            "scatter-gather request"
        );

        match engine {
            EngineSelect::Aes => AesEngine {
                memory: &mut *memory,
                key_store: &self.key_store,
                cx_save_reads_cx_load_bit: self.config.cx_save_reads_cx_load_bit,
            }
            .run(&fetcher, &pusher),
            EngineSelect::Bypass => bypass::run(&mut *memory, &fetcher, &pusher),
            EngineSelect::Hash => {
                hash_engine::run(&mut *memory, &mut self.hash_session, &fetcher, &pusher)
            }
            _ => {
                tracing::error!(%engine, "engine not supported");
                Err(EngineError::UnsupportedEngine(engine))
            }
        }
    }

    fn run_direct(&mut self) -> Result<(), EngineError> {
        let len = self.fetch_len.reg.read(DmaLength::LENGTH) as usize;
        let (src, dst) = (self.fetch_addr.reg.get(), self.push_addr.reg.get());
        tracing::debug!(src, dst, len, "direct transfer");
        self.memory.borrow_mut().copy_bytes(src, dst, len)?;
        Ok(())
    }
}
