/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the SYMCRYPTO Emulator Crypto library.

--*/

mod aes_modes;
mod ccm;
mod cmac;
mod ecc;
mod error;
mod gcm;
mod hash;
mod jpake;

pub use aes_modes::{Aes, AesBlockMode, AES_BLOCK_SIZE};
pub use ccm::{AesCcm, AES_CCM_MAX_NONCE_SIZE, AES_CCM_MIN_NONCE_SIZE};
pub use cmac::AesCmac;
pub use ecc::{Ecc, EccCurve, EccKeyPair};
pub use error::CryptoError;
pub use gcm::{AesGcm, AES_GCM_IV_SIZE, AES_GCM_TAG_SIZE};
pub use hash::{HashAlgorithm, HashEngine};
pub use jpake::{
    EcJpake, JpakeRound1, JpakeRound2, JPAKE_POINT_SIZE, JPAKE_PROOF_SIZE, JPAKE_SCALAR_SIZE,
    JPAKE_SESSION_KEY_SIZE,
};
