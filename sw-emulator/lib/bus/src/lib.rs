/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the SYMCRYPTO Emulator Bus library.

--*/
mod access;
mod bus;
mod irq;
mod mem;
mod ram;
mod register;

pub use crate::access::MemoryAccess;
pub use crate::bus::{Bus, BusError, SharedBus};
pub use crate::irq::Irq;
pub use crate::ram::Ram;
pub use crate::register::{ReadOnlyRegister, ReadWriteRegister, Register, WriteOnlyRegister};
