/*++

Licensed under the Apache-2.0 license.

File Name:

    bus.rs

Abstract:

    File contains definition of the Bus trait.

--*/

use std::cell::RefCell;
use std::rc::Rc;
use symcrypto_emu_types::{RvAddr, RvData, RvSize};
use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum BusError {
    /// Load address misaligned exception
    #[error("load address misaligned")]
    LoadAddrMisaligned,

    /// Load access fault exception
    #[error("load access fault")]
    LoadAccessFault,

    /// Store address misaligned exception
    #[error("store address misaligned")]
    StoreAddrMisaligned,

    /// Store access fault exception
    #[error("store access fault")]
    StoreAccessFault,
}

/// Represents an abstract memory bus. Used to read and write from RAM and
/// peripheral addresses.
pub trait Bus {
    /// Read data of specified size from given address
    ///
    /// # Arguments
    ///
    /// * `size` - Size of the read
    /// * `addr` - Address to read from
    ///
    /// # Error
    ///
    /// * `BusError` - Exception with cause `BusError::LoadAccessFault` or `BusError::LoadAddrMisaligned`
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError>;

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
    /// * `BusError` - Exception with cause `BusError::StoreAccessFault` or `BusError::StoreAddrMisaligned`
    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError>;

    /// This method is used to notify peripherals of the passage of time. The
    /// owner of this bus MAY call this function periodically.
    fn poll(&mut self) {
        // By default, do nothing
    }

    fn warm_reset(&mut self) {
        // By default, do nothing
    }
}

/// Handle to the system address space shared between the peripherals that
/// master it. The handle must not route back into the peripheral holding it.
pub type SharedBus = Rc<RefCell<dyn Bus>>;

impl<T: Bus + ?Sized> Bus for Box<T> {
    fn read(&mut self, size: RvSize, addr: RvAddr) -> Result<RvData, BusError> {
        T::read(self, size, addr)
    }

    fn write(&mut self, size: RvSize, addr: RvAddr, val: RvData) -> Result<(), BusError> {
        T::write(self, size, addr, val)
    }

    fn poll(&mut self) {
        T::poll(self)
    }

    fn warm_reset(&mut self) {
        T::warm_reset(self)
    }
}
