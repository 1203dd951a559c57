/*++

Licensed under the Apache-2.0 license.

File Name:

    cmac.rs

Abstract:

    File contains implementation of the AES-CMAC message authentication code.

--*/

use crate::aes_modes::{with_aes_cipher, AES_BLOCK_SIZE};
use crate::CryptoError;
use cmac::{Cmac, Mac};

pub enum AesCmac {}

impl AesCmac {
    /// One-shot AES-CMAC over `data`.
    pub fn mac(key: &[u8], data: &[u8]) -> Result<[u8; AES_BLOCK_SIZE], CryptoError> {
        let mut out = [0u8; AES_BLOCK_SIZE];
        with_aes_cipher!(key, C => {
            let mut mac = Cmac::<C>::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;
            mac.update(data);
            out.copy_from_slice(&mac.finalize().into_bytes());
            Ok(())
        })?;
        Ok(out)
    }
}
