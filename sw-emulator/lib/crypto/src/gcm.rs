/*++

Licensed under the Apache-2.0 license.

File Name:

    gcm.rs

Abstract:

    File contains implementation of the AES-GCM authenticated cipher with a
    96-bit nonce and truncatable tags.

--*/

use crate::aes_modes::with_aes_cipher;
use crate::CryptoError;
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};

pub const AES_GCM_IV_SIZE: usize = 12;
pub const AES_GCM_TAG_SIZE: usize = 16;

/// Smallest tag the verifier accepts.
pub const AES_GCM_MIN_TAG_SIZE: usize = 4;

pub enum AesGcm {}

impl AesGcm {
    /// One-shot AES-GCM encryption. Returns the ciphertext and the full tag.
    pub fn encrypt(
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<(Vec<u8>, [u8; AES_GCM_TAG_SIZE]), CryptoError> {
        if iv.len() != AES_GCM_IV_SIZE {
            Err(CryptoError::InvalidIvLength(iv.len()))?
        }
        let mut buffer = plaintext.to_vec();
        let mut tag = [0u8; AES_GCM_TAG_SIZE];
        with_aes_cipher!(key, C => {
            let cipher = aes_gcm::AesGcm::<C, U12>::new_from_slice(key)
                .map_err(|_| CryptoError::InvalidKey)?;
            let computed = cipher
                .encrypt_in_place_detached(GenericArray::from_slice(iv), aad, &mut buffer)
                .map_err(|_| CryptoError::InvalidDataLength(plaintext.len()))?;
            tag.copy_from_slice(&computed);
            Ok(())
        })?;
        Ok((buffer, tag))
    }

    /// Decrypt without checking any tag. Returns the plaintext and the tag
    /// computed over `ciphertext`, leaving verification to the caller.
    pub fn decrypt_unverified(
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<(Vec<u8>, [u8; AES_GCM_TAG_SIZE]), CryptoError> {
        // GCM is CTR underneath: running the encryption over the ciphertext
        // recovers the plaintext, and re-encrypting it yields the tag.
        let (plaintext, _) = Self::encrypt(key, iv, aad, ciphertext)?;
        let (_, tag) = Self::encrypt(key, iv, aad, &plaintext)?;
        Ok((plaintext, tag))
    }

    /// Decrypt and verify against a tag truncated to `tag.len()` bytes.
    ///
    /// # Error
    ///
    /// * `CryptoError::TagMismatch` - The computed tag prefix differs from `tag`
    pub fn decrypt(
        key: &[u8],
        iv: &[u8],
        aad: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if !(AES_GCM_MIN_TAG_SIZE..=AES_GCM_TAG_SIZE).contains(&tag.len()) {
            Err(CryptoError::InvalidTagLength(tag.len()))?
        }
        let (plaintext, computed) = Self::decrypt_unverified(key, iv, aad, ciphertext)?;
        if computed[..tag.len()] != *tag {
            Err(CryptoError::TagMismatch)?
        }
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    // from https://github.com/C2SP/wycheproof/blob/master/testvectors/aes_gcm_test.json
    #[test]
    fn test_wycheproof_aes256() {
        let key = h("92ace3e348cd821092cd921aa3546374299ab46209691bc28b8752d17f123c20");
        let iv = h("00112233445566778899aabb");
        let aad = h("00000000ffffffff");
        let pt = h("00010203040506070809");

        let (ct, tag) = AesGcm::encrypt(&key, &iv, &aad, &pt).unwrap();
        assert_eq!(ct, h("e27abdd2d2a53d2f136b"));
        assert_eq!(tag.to_vec(), h("9a4a2579529301bcfb71c78d4060f52c"));

        assert_eq!(AesGcm::decrypt(&key, &iv, &aad, &ct, &tag).unwrap(), pt);
    }

    #[test]
    fn test_decrypt_unverified_recomputes_tag() {
        let key = [7u8; 16];
        let iv = [9u8; 12];
        let aad = b"header";
        let pt = b"some payload that spans blocks!!!";

        let (ct, tag) = AesGcm::encrypt(&key, &iv, aad, pt).unwrap();
        let (recovered, recomputed) = AesGcm::decrypt_unverified(&key, &iv, aad, &ct).unwrap();
        assert_eq!(recovered, pt);
        assert_eq!(recomputed, tag);
    }

    #[test]
    fn test_truncated_tag() {
        let key = [3u8; 24];
        let iv = [1u8; 12];
        let (ct, tag) = AesGcm::encrypt(&key, &iv, &[], b"abc").unwrap();
        assert!(AesGcm::decrypt(&key, &iv, &[], &ct, &tag[..8]).is_ok());

        let mut bad = tag;
        bad[0] ^= 1;
        assert_eq!(
            AesGcm::decrypt(&key, &iv, &[], &ct, &bad[..8]),
            Err(CryptoError::TagMismatch)
        );
        assert_eq!(
            AesGcm::decrypt(&key, &iv, &[], &ct, &tag[..3]),
            Err(CryptoError::InvalidTagLength(3))
        );
    }

    #[test]
    fn test_invalid_iv() {
        assert_eq!(
            AesGcm::encrypt(&[0; 16], &[0; 16], &[], &[]),
            Err(CryptoError::InvalidIvLength(16))
        );
    }
}
