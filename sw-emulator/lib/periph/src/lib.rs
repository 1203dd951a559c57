/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the SYMCRYPTO Emulator Peripheral library.

--*/

mod key_store;
pub mod secure_element;
mod semailbox;
pub mod symcrypto;

pub use key_store::{VolatileKeyStore, DEVICE_KEY_SLOT};
pub use secure_element::{
    CommandId, FlashGeometry, ResponseCode, SecureElement, SecureElementConfig,
};
pub use semailbox::SeMailbox;
pub use symcrypto::{EngineError, SymCrypto, SymCryptoConfig};
