/*++

Licensed under the Apache-2.0 license.

File Name:

    cipher.rs

Abstract:

    File contains the AES commands of the secure element: block modes,
    CMAC, GCM and CCM.

--*/

use super::key::{cipher_key, KeyMetadata};
use super::{Request, ResponseCode, SeError};
use crate::key_store::VolatileKeyStore;
use symcrypto_emu_crypto::{Aes, AesBlockMode, AesCcm, AesCmac, AesGcm, AES_GCM_IV_SIZE};
use symcrypto_emu_types::emu_enum;

mod constants {
    #![allow(unused)]

    pub const CRYPTO_MODE_SHIFT: u32 = 8;
    pub const CRYPTO_MODE_MASK: u32 = 0xf;
    pub const CONTEXT_MODE_MASK: u32 = 0xf;

    pub const AEAD_TAG_SHIFT: u32 = 8;
    pub const AEAD_TAG_MASK: u32 = 0xff;
    pub const AEAD_CONTEXT_MASK: u32 = 0xff;

    pub const CCM_TAG_MASK: u32 = 0xffff;
    pub const CCM_NONCE_SHIFT: u32 = 16;
    pub const CCM_MIN_NONCE: usize = 8;
    pub const CCM_MAX_NONCE: usize = 13;
}

emu_enum!(
    /// Chaining mode of AesEncrypt and AesDecrypt, options bits 11:8
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub CryptoMode;
    u32;
    {
        Ecb = 1,
        Cbc = 2,
        Ctr = 3,
        Cfb = 4,
        Ofb = 5,
    };
    Unknown
);

impl CryptoMode {
    fn block_mode(self) -> Option<AesBlockMode> {
        match self {
            CryptoMode::Ecb => Some(AesBlockMode::Ecb),
            CryptoMode::Cbc => Some(AesBlockMode::Cbc),
            CryptoMode::Ctr => Some(AesBlockMode::Ctr),
            CryptoMode::Cfb => Some(AesBlockMode::Cfb),
            CryptoMode::Ofb => Some(AesBlockMode::Ofb),
            CryptoMode::Unknown => None,
        }
    }

    fn is_valid_length(self, len: usize) -> bool {
        match self {
            CryptoMode::Ecb | CryptoMode::Cbc | CryptoMode::Cfb | CryptoMode::Ofb => {
                len > 0 && len % 16 == 0
            }
            CryptoMode::Ctr => len > 0,
            CryptoMode::Unknown => false,
        }
    }
}

emu_enum!(
    /// Position of a call within a multi-call message
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub ContextMode;
    u32;
    {
        Whole = 0,
        Start = 1,
        End = 2,
        Middle = 3,
    };
    Unknown
);

impl ContextMode {
    fn is_terminal(self) -> bool {
        matches!(self, ContextMode::Whole | ContextMode::End)
    }
}

/// GCM tag length in bytes from its options code.
fn gcm_tag_length(code: u32) -> usize {
    match code {
        0x4 => 4,
        0x8 => 8,
        0xc => 12,
        0xd => 13,
        0xe => 14,
        0xf => 15,
        _ => 16,
    }
}

/// Warn when a node does not carry the size announced by the parameters.
fn check_announced(what: &str, node: usize, announced: u32) {
    if node != announced as usize {
        tracing::warn!(what, node, announced, "node length differs from parameter");
    }
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn aes(req: &mut Request, store: &VolatileKeyStore, encrypt: bool) -> Result<(), SeError> {
    req.expect_params(2, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);
    let size = req.params[1] as usize;
    let mode = CryptoMode::from(
        (req.options >> constants::CRYPTO_MODE_SHIFT) & constants::CRYPTO_MODE_MASK,
    );
    let context = ContextMode::from(req.options & constants::CONTEXT_MODE_MASK);
    tracing::debug!(%mode, %context, size, encrypt, "AES");

    if !mode.is_valid_length(size) {
        tracing::error!(%mode, size, "invalid data length");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    let Some(block_mode) = mode.block_mode() else {
        return Err(SeError::Response(ResponseCode::InvalidParameter));
    };

    let mut inputs = req.inputs();
    let _auth = inputs.next_data(req.memory)?;
    let key = cipher_key(req.memory, &mut inputs, metadata, store)?;
    let iv = if block_mode.uses_iv() {
        inputs.next_data(req.memory)?
    } else {
        vec![]
    };
    let data = inputs.gather(req.memory, size)?;

    let result = if encrypt {
        Aes::encrypt(block_mode, &key, &iv, &data)?
    } else {
        Aes::decrypt(block_mode, &key, &iv, &data)?
    };
    let mut outputs = req.outputs();
    outputs.scatter(req.memory, &result)?;

    if block_mode.uses_iv() && !context.is_terminal() {
        // placeholder chaining context: every IV byte plus one
        let next: Vec<u8> = iv.iter().map(|b| b.wrapping_add(1)).collect();
        let node = outputs.next_descriptor(req.memory)?;
        node.store(req.memory, &next)?;
    }
    Ok(())
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn cmac(req: &mut Request, store: &VolatileKeyStore) -> Result<(), SeError> {
    req.expect_params(2, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);
    let size = req.params[1] as usize;

    let mut inputs = req.inputs();
    let _auth = inputs.next_data(req.memory)?;
    let key = cipher_key(req.memory, &mut inputs, metadata, store)?;
    let data = inputs.gather(req.memory, size)?;
    let mac = AesCmac::mac(&key, &data)?;

    let output = req.outputs().next_descriptor(req.memory)?;
    Ok(output.store(req.memory, &mac)?)
}

/// AES-GCM over whole messages.
///
/// Inputs: auth, key, 12 byte IV, AAD, data, then the tag (decrypt only) and
/// an optional `len(A) || len(C)` node which is not used. Outputs: data, then
/// the tag (encrypt only).
#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn gcm(req: &mut Request, store: &VolatileKeyStore, encrypt: bool) -> Result<(), SeError> {
    req.expect_params(3, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);
    let tag_len =
        gcm_tag_length((req.options >> constants::AEAD_TAG_SHIFT) & constants::AEAD_TAG_MASK);
    let context = ContextMode::from(req.options & constants::AEAD_CONTEXT_MASK);
    if context != ContextMode::Whole {
        tracing::error!(%context, "only whole messages are supported");
        Err(SeError::Response(ResponseCode::Abort))?
    }

    let mut inputs = req.inputs();
    let _auth = inputs.next_data(req.memory)?;
    let key = cipher_key(req.memory, &mut inputs, metadata, store)?;
    let iv = inputs.next_data(req.memory)?;
    if iv.len() != AES_GCM_IV_SIZE {
        tracing::error!(len = iv.len(), "invalid IV length");
        Err(SeError::Response(ResponseCode::Abort))?
    }
    let aad = inputs.next_data(req.memory)?;
    check_announced("aad", aad.len(), req.params[1]);
    let data = inputs.next_data(req.memory)?;
    check_announced("data", data.len(), req.params[2]);

    let mut outputs = req.outputs();
    if encrypt {
        if inputs.has_next() {
            let _lengths = inputs.next_data(req.memory)?;
        }
        let (ciphertext, tag) = AesGcm::encrypt(&key, &iv, &aad, &data)?;
        let node = outputs.next_descriptor(req.memory)?;
        node.store(req.memory, &ciphertext)?;
        let node = outputs.next_descriptor(req.memory)?;
        node.store(req.memory, &tag[..tag_len])?;
    } else {
        let tag = if inputs.has_next() {
            let mut tag = inputs.next_data(req.memory)?;
            if tag.len() < tag_len {
                tracing::error!(len = tag.len(), tag_len, "tag node too short");
                Err(SeError::Response(ResponseCode::InvalidParameter))?
            }
            tag.truncate(tag_len);
            tag
        } else {
            tracing::error!("missing tag node");
            Err(SeError::Response(ResponseCode::InvalidParameter))?
        };
        if inputs.has_next() {
            let _lengths = inputs.next_data(req.memory)?;
        }
        let plaintext = AesGcm::decrypt(&key, &iv, &aad, &data, &tag)?;
        let node = outputs.next_descriptor(req.memory)?;
        node.store(req.memory, &plaintext)?;
    }
    Ok(())
}

/// AES-CCM. Inputs: auth, key, nonce, AAD, data, then the tag when
/// decrypting. Outputs: data, then the tag when encrypting.
#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn ccm(req: &mut Request, store: &VolatileKeyStore, encrypt: bool) -> Result<(), SeError> {
    req.expect_params(4, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);
    let tag_len = (req.params[1] & constants::CCM_TAG_MASK) as usize;
    let nonce_len = (req.params[1] >> constants::CCM_NONCE_SHIFT) as usize;
    if !AesCcm::is_valid_tag_len(tag_len)
        || !(constants::CCM_MIN_NONCE..=constants::CCM_MAX_NONCE).contains(&nonce_len)
    {
        tracing::error!(tag_len, nonce_len, "invalid CCM sizes");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }

    let mut inputs = req.inputs();
    let _auth = inputs.next_data(req.memory)?;
    let key = cipher_key(req.memory, &mut inputs, metadata, store)?;
    let nonce = inputs.next_data(req.memory)?;
    check_announced("nonce", nonce.len(), nonce_len as u32);
    let aad = inputs.next_data(req.memory)?;
    check_announced("aad", aad.len(), req.params[2]);
    let data = inputs.next_data(req.memory)?;
    check_announced("data", data.len(), req.params[3]);

    let mut outputs = req.outputs();
    if encrypt {
        let (ciphertext, tag) = AesCcm::encrypt(&key, &nonce, &aad, &data, tag_len)?;
        let node = outputs.next_descriptor(req.memory)?;
        node.store(req.memory, &ciphertext)?;
        if tag_len > 0 {
            let node = outputs.next_descriptor(req.memory)?;
            node.store(req.memory, &tag)?;
        }
    } else {
        let tag = if tag_len > 0 {
            let mut tag = inputs.next_data(req.memory)?;
            tag.truncate(tag_len);
            tag
        } else {
            vec![]
        };
        let plaintext = AesCcm::decrypt(&key, &nonce, &aad, &data, &tag)?;
        let node = outputs.next_descriptor(req.memory)?;
        node.store(req.memory, &plaintext)?;
    }
    Ok(())
}
