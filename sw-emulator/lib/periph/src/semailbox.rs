/*++

Licensed under the Apache-2.0 license.

File Name:

    semailbox.rs

Abstract:

    File contains the secure element mailbox: the register window through
    which software pushes command words and pops responses.

--*/

use crate::secure_element::{ResponseCode, SecureElement};
use std::cell::RefCell;
use std::rc::Rc;
use symcrypto_emu_bus::{Bus, BusError, Irq, ReadWriteRegister, Register};
use symcrypto_emu_types::{RvAddr, RvData, RvSize};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::{register_bitfields, LocalRegisterCopy};

register_bitfields! [
    u32,

    /// TX status register
    pub TxStatus [
        REMWORDS OFFSET(0) NUMBITS(16) [],
        TXINT OFFSET(20) NUMBITS(1) [],
        TXFULL OFFSET(21) NUMBITS(1) [],
    ],

    /// RX status register
    pub RxStatus [
        REMWORDS OFFSET(0) NUMBITS(16) [],
        RXINT OFFSET(20) NUMBITS(1) [],
        RXEMPTY OFFSET(21) NUMBITS(1) [],
        RXHDR OFFSET(22) NUMBITS(1) [],
    ],

    /// Configuration register
    pub Config [
        TXINTEN OFFSET(0) NUMBITS(1) [],
        RXINTEN OFFSET(1) NUMBITS(1) [],
    ],
];

mod constants {
    #![allow(unused)]

    pub const TX_FIFO_CAPACITY: usize = 16;

    /// TX is almost full once it holds this many words
    pub const TX_ALMOST_FULL: usize = 1;

    pub const CONFIG_MASK: u32 = 0x3;
}

/// Secure element mailbox
#[derive(Clone)]
pub struct SeMailbox {
    regs: Rc<RefCell<SeMailboxRegs>>,
}

impl SeMailbox {
    /// Create a new mailbox
    ///
    /// # Arguments
    ///
    /// * `se` - Secure element answering the commands
    /// * `tx_irq` - Raised while TX has room for a message
    /// * `rx_irq` - Raised when a response is ready
    pub fn new(se: SecureElement, tx_irq: Irq, rx_irq: Irq) -> Self {
        Self {
            regs: Rc::new(RefCell::new(SeMailboxRegs::new(se, tx_irq, rx_irq))),
        }
    }

    /// Memory map size.
    pub fn mmap_size(&self) -> RvAddr {
        SeMailboxRegs::MMAP_SIZE
    }

    pub fn reset(&self) {
        self.regs.borrow_mut().reset();
    }
}

impl Bus for SeMailbox {
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

struct SeMailboxRegs {
    config: ReadWriteRegister<Config::Register>,

    /// RX interrupt status, set when a response completes
    rx_int: bool,

    /// A response code waits to be read through RX_HEADER
    rx_header_available: bool,

    se: SecureElement,
    tx_irq: Irq,
    rx_irq: Irq,
}

impl SeMailboxRegs {
    const MMAP_SIZE: RvAddr = 0x4000;

    const FIFO_START: RvAddr = 0x00;
    const FIFO_END: RvAddr = 0x3c;
    const TX_STATUS: RvAddr = 0x40;
    const RX_STATUS: RvAddr = 0x44;
    const TX_PROTECTION: RvAddr = 0x48;
    const RX_PROTECTION: RvAddr = 0x4c;
    const TX_HEADER: RvAddr = 0x50;
    const RX_HEADER: RvAddr = 0x54;
    const CONFIG: RvAddr = 0x58;

    fn new(se: SecureElement, tx_irq: Irq, rx_irq: Irq) -> Self {
        let regs = Self {
            config: ReadWriteRegister::new(0),
            rx_int: false,
            rx_header_available: false,
            se,
            tx_irq,
            rx_irq,
        };
        regs.update_interrupts();
        regs
    }

    fn reset(&mut self) {
        self.config.reg.set(0);
        self.rx_int = false;
        self.rx_header_available = false;
        self.se.reset();
        self.update_interrupts();
    }

    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            Err(BusError::LoadAccessFault)?
        }
        match addr {
            Self::FIFO_START..=Self::FIFO_END if addr % 4 == 0 => Ok(self.rx_dequeue()),
            Self::TX_STATUS => Ok(self.tx_status()),
            Self::RX_STATUS => Ok(self.rx_status()),
            Self::TX_PROTECTION | Self::RX_PROTECTION => Ok(0),
            Self::RX_HEADER => Ok(self.rx_header()),
            Self::CONFIG => self.config.read(size),
            _ => Err(BusError::LoadAccessFault),
        }
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word {
            Err(BusError::StoreAccessFault)?
        }
        match addr {
            Self::FIFO_START..=Self::FIFO_END if addr % 4 == 0 => self.tx_enqueue(val, false),
            Self::TX_PROTECTION | Self::RX_PROTECTION => {
                tracing::debug!(addr, val, "protection register write ignored");
            }
            Self::TX_HEADER => self.tx_enqueue(val, true),
            Self::CONFIG => {
                self.config.reg.set(val & constants::CONFIG_MASK);
                self.update_interrupts();
            }
            _ => Err(BusError::StoreAccessFault)?,
        }
        Ok(())
    }

    fn tx_is_full(&self) -> bool {
        self.se.tx_len() >= constants::TX_FIFO_CAPACITY
    }

    fn tx_is_almost_full(&self) -> bool {
        self.se.tx_len() >= constants::TX_ALMOST_FULL
    }

    fn tx_enqueue(&mut self, val: u32, header: bool) {
        if self.tx_is_full() {
            tracing::error!(val, "TX FIFO full, word dropped");
            return;
        }
        let done = if header {
            self.se.write_header(val)
        } else {
            self.se.enqueue_word(val)
        };
        if done {
            self.rx_int = true;
            self.rx_header_available = true;
        }
        self.update_interrupts();
    }

    fn rx_dequeue(&mut self) -> u32 {
        match self.se.dequeue_response() {
            Some(word) => word,
            None => {
                tracing::warn!("RX FIFO read while empty");
                0
            }
        }
    }

    fn rx_header(&mut self) -> u32 {
        let code = if self.rx_header_available {
            self.rx_header_available = false;
            self.se.dequeue_response()
        } else {
            None
        };
        self.rx_int = false;
        self.update_interrupts();
        code.unwrap_or_else(|| {
            tracing::warn!("RX header read with no response available");
            ResponseCode::InternalError as u32
        })
    }

    fn tx_status(&self) -> u32 {
        let mut status = LocalRegisterCopy::<u32, TxStatus::Register>::new(0);
        status.write(
            TxStatus::REMWORDS.val(self.se.tx_len() as u32)
                + TxStatus::TXINT.val(u32::from(!self.tx_is_almost_full()))
                + TxStatus::TXFULL.val(u32::from(self.tx_is_full())),
        );
        status.get()
    }

    fn rx_status(&self) -> u32 {
        let mut status = LocalRegisterCopy::<u32, RxStatus::Register>::new(0);
        status.write(
            RxStatus::REMWORDS.val(self.se.rx_len() as u32)
                + RxStatus::RXINT.val(u32::from(self.rx_int))
                + RxStatus::RXEMPTY.val(u32::from(self.se.rx_len() == 0))
                + RxStatus::RXHDR.val(u32::from(self.rx_header_available)),
        );
        status.get()
    }

    fn update_interrupts(&self) {
        let config = &self.config.reg;
        self.tx_irq
            .set_level(config.is_set(Config::TXINTEN) && !self.tx_is_almost_full());
        self.rx_irq
            .set_level(config.is_set(Config::RXINTEN) && self.rx_int);
    }
}
