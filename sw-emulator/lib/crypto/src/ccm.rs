/*++

Licensed under the Apache-2.0 license.

File Name:

    ccm.rs

Abstract:

    File contains implementation of AES-CCM (NIST SP 800-38C) with run-time
    selectable tag and nonce lengths.

--*/

use crate::aes_modes::with_aes_cipher;
use crate::CryptoError;
use ::ccm::aead::generic_array::GenericArray;
use ::ccm::aead::{AeadInPlace, KeyInit};
use ::ccm::consts::{U10, U11, U12, U13, U14, U16, U4, U6, U7, U8, U9};

pub const AES_CCM_MIN_NONCE_SIZE: usize = 7;
pub const AES_CCM_MAX_NONCE_SIZE: usize = 13;
pub const AES_CCM_MAX_TAG_SIZE: usize = 16;

/// Bind `$tag` to the tag size type of `$len` bytes.
macro_rules! with_tag_size {
    ($len:expr, $tag:ident => $body:expr) => {
        match $len {
            4 => {
                type $tag = U4;
                $body
            }
            6 => {
                type $tag = U6;
                $body
            }
            8 => {
                type $tag = U8;
                $body
            }
            10 => {
                type $tag = U10;
                $body
            }
            12 => {
                type $tag = U12;
                $body
            }
            14 => {
                type $tag = U14;
                $body
            }
            16 => {
                type $tag = U16;
                $body
            }
            len => Err(CryptoError::InvalidTagLength(len)),
        }
    };
}

/// Bind `$nonce` to the nonce size type of `$len` bytes.
macro_rules! with_nonce_size {
    ($len:expr, $nonce:ident => $body:expr) => {
        match $len {
            7 => {
                type $nonce = U7;
                $body
            }
            8 => {
                type $nonce = U8;
                $body
            }
            9 => {
                type $nonce = U9;
                $body
            }
            10 => {
                type $nonce = U10;
                $body
            }
            11 => {
                type $nonce = U11;
                $body
            }
            12 => {
                type $nonce = U12;
                $body
            }
            13 => {
                type $nonce = U13;
                $body
            }
            len => Err(CryptoError::InvalidNonceLength(len)),
        }
    };
}

pub enum AesCcm {}

impl AesCcm {
    /// Whether `len` is an acceptable tag length: zero, or an even value in
    /// `4..=16`.
    pub fn is_valid_tag_len(len: usize) -> bool {
        len == 0 || ((4..=AES_CCM_MAX_TAG_SIZE).contains(&len) && len % 2 == 0)
    }

    /// One-shot CCM encryption. Returns the ciphertext and a tag of
    /// `tag_len` bytes.
    ///
    /// A zero `tag_len` encrypts without authentication and returns an
    /// empty tag. The ciphertext does not depend on the tag length.
    pub fn encrypt(
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        plaintext: &[u8],
        tag_len: usize,
    ) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        if !(AES_CCM_MIN_NONCE_SIZE..=AES_CCM_MAX_NONCE_SIZE).contains(&nonce.len()) {
            Err(CryptoError::InvalidNonceLength(nonce.len()))?
        }
        if !Self::is_valid_tag_len(tag_len) {
            Err(CryptoError::InvalidTagLength(tag_len))?
        }
        let mut buffer = plaintext.to_vec();
        let mut tag = with_aes_cipher!(key, C => {
            with_tag_size!(tag_len.max(4), M => {
                with_nonce_size!(nonce.len(), N => {
                    let cipher = ::ccm::Ccm::<C, M, N>::new_from_slice(key)
                        .map_err(|_| CryptoError::InvalidKey)?;
                    cipher
                        .encrypt_in_place_detached(GenericArray::from_slice(nonce), aad, &mut buffer)
                        .map(|tag| tag.to_vec())
                        .map_err(|_| CryptoError::InvalidDataLength(plaintext.len()))
                })
            })
        })?;
        tag.truncate(tag_len);
        Ok((buffer, tag))
    }

    /// Decrypt without checking any tag. Returns the plaintext and the tag
    /// computed over it.
    pub fn decrypt_unverified(
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag_len: usize,
    ) -> Result<(Vec<u8>, Vec<u8>), CryptoError> {
        // the payload is CTR encrypted, so encrypting the ciphertext recovers
        // the plaintext and encrypting that again yields its tag
        let (plaintext, _) = Self::encrypt(key, nonce, aad, ciphertext, tag_len)?;
        let (_, tag) = Self::encrypt(key, nonce, aad, &plaintext, tag_len)?;
        Ok((plaintext, tag))
    }

    /// Decrypt and verify.
    ///
    /// # Error
    ///
    /// * `CryptoError::TagMismatch` - The computed tag differs from `tag`
    pub fn decrypt(
        key: &[u8],
        nonce: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let (plaintext, computed) =
            Self::decrypt_unverified(key, nonce, aad, ciphertext, tag.len())?;
        if computed != tag {
            Err(CryptoError::TagMismatch)?
        }
        Ok(plaintext)
    }
}
