/*++

Licensed under the Apache-2.0 license.

File Name:

    error.rs

Abstract:

    File contains the error type shared by the crypto wrappers.

--*/

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length {0}")]
    InvalidKeyLength(usize),

    #[error("invalid IV length {0}")]
    InvalidIvLength(usize),

    #[error("invalid nonce length {0}")]
    InvalidNonceLength(usize),

    #[error("invalid tag length {0}")]
    InvalidTagLength(usize),

    #[error("invalid data length {0}")]
    InvalidDataLength(usize),

    #[error("invalid key material")]
    InvalidKey,

    #[error("authentication tag mismatch")]
    TagMismatch,

    #[error("zero-knowledge proof does not verify")]
    InvalidProof,

    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
}
