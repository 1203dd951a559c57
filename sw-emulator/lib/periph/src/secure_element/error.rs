/*++

Licensed under the Apache-2.0 license.

File Name:

    error.rs

Abstract:

    File contains the error type of the secure element command handlers.

--*/

use super::ResponseCode;
use symcrypto_emu_bus::BusError;
use symcrypto_emu_crypto::CryptoError;
use thiserror::Error;

/// Failure of a secure element command. Every variant maps to the response
/// code published for the command.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeError {
    #[error("command rejected with {0}")]
    Response(ResponseCode),

    #[error("null descriptor dereferenced")]
    NullDescriptor,

    #[error("descriptor chain exceeds {max} nodes")]
    MalformedChain { max: usize },

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl SeError {
    pub fn response_code(&self) -> ResponseCode {
        match self {
            SeError::Response(code) => *code,
            SeError::NullDescriptor | SeError::MalformedChain { .. } | SeError::Bus(_) => {
                ResponseCode::Abort
            }
            SeError::Crypto(_) => ResponseCode::CryptoError,
        }
    }
}

impl From<ResponseCode> for SeError {
    fn from(code: ResponseCode) -> Self {
        SeError::Response(code)
    }
}
