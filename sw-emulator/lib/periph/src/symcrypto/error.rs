/*++

Licensed under the Apache-2.0 license.

File Name:

    error.rs

Abstract:

    File contains the error type of the SYMCRYPTO engine dispatch path.

--*/

use super::descriptor::EngineSelect;
use symcrypto_emu_bus::BusError;
use symcrypto_emu_crypto::CryptoError;
use thiserror::Error;

/// Failure of a scatter-gather operation. Any of these aborts the in-flight
/// operation; nothing is retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("descriptor chain exceeds {max} nodes without a terminal node")]
    MalformedChain { max: usize },

    #[error("descriptor chain is empty")]
    EmptyChain,

    #[error("engine {0} is not supported")]
    UnsupportedEngine(EngineSelect),

    #[error("AES mode {0:#05x} is not supported")]
    UnsupportedAesMode(u32),

    #[error("unknown parameter offset {0:#04x}")]
    UnknownParameterOffset(u8),

    #[error("missing {0} descriptor")]
    MissingDescriptor(&'static str),

    #[error("{what} length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("no key in slot {0}")]
    KeyNotFound(u32),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("bus error: {0}")]
    Bus(#[from] BusError),
}
