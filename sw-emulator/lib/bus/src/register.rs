/*++

Licensed under the Apache-2.0 license.

File Name:

    register.rs

Abstract:

    File contains implementation of the 32-bit register types used by peripherals

--*/

use crate::BusError;
use symcrypto_emu_types::{RvData, RvSize};
use tock_registers::interfaces::{Readable, Writeable};
use tock_registers::registers::InMemoryRegister;
use tock_registers::RegisterLongName;

pub trait Register {
    /// Read the register. Only full word accesses are accepted.
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::LoadAccessFault`
    fn read(&self, size: RvSize) -> Result<RvData, BusError>;

    /// Write the register. Only full word accesses are accepted.
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the write
    /// * `val` - Data to write
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::StoreAccessFault`
    fn write(&mut self, size: RvSize, val: RvData) -> Result<(), BusError>;
}

/// Read Write Register
pub struct ReadWriteRegister<R: RegisterLongName = ()> {
    pub reg: InMemoryRegister<u32, R>,
}

impl<R: RegisterLongName> ReadWriteRegister<R> {
    /// Create an instance of Read Write Register
    pub fn new(val: u32) -> Self {
        Self {
            reg: InMemoryRegister::new(val),
        }
    }
}

impl<R: RegisterLongName> Register for ReadWriteRegister<R> {
    fn read(&self, size: RvSize) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            Err(BusError::LoadAccessFault)?
        }
        Ok(self.reg.get())
    }

    fn write(&mut self, size: RvSize, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word {
            Err(BusError::StoreAccessFault)?
        }
        self.reg.set(val);
        Ok(())
    }
}

/// Read Only Register. Bus writes fault; the owning peripheral updates it
/// through `reg`.
pub struct ReadOnlyRegister<R: RegisterLongName = ()> {
    pub reg: InMemoryRegister<u32, R>,
}

impl<R: RegisterLongName> ReadOnlyRegister<R> {
    /// Create an instance of Read Only Register
    pub fn new(val: u32) -> Self {
        Self {
            reg: InMemoryRegister::new(val),
        }
    }
}

impl<R: RegisterLongName> Register for ReadOnlyRegister<R> {
    fn read(&self, size: RvSize) -> Result<RvData, BusError> {
        if size != RvSize::Word {
            Err(BusError::LoadAccessFault)?
        }
        Ok(self.reg.get())
    }

    fn write(&mut self, _size: RvSize, _val: RvData) -> Result<(), BusError> {
        Err(BusError::StoreAccessFault)
    }
}

/// Write Only Register. Bus reads fault.
pub struct WriteOnlyRegister<R: RegisterLongName = ()> {
    pub reg: InMemoryRegister<u32, R>,
}

impl<R: RegisterLongName> WriteOnlyRegister<R> {
    /// Create an instance of Write Only Register
    pub fn new(val: u32) -> Self {
        Self {
            reg: InMemoryRegister::new(val),
        }
    }
}

impl<R: RegisterLongName> Register for WriteOnlyRegister<R> {
    fn read(&self, _size: RvSize) -> Result<RvData, BusError> {
        Err(BusError::LoadAccessFault)
    }

    fn write(&mut self, size: RvSize, val: RvData) -> Result<(), BusError> {
        if size != RvSize::Word {
            Err(BusError::StoreAccessFault)?
        }
        self.reg.set(val);
        Ok(())
    }
}
