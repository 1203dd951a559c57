/*++

Licensed under the Apache-2.0 license.

File Name:

    aes_modes.rs

Abstract:

    File contains the AES block cipher modes used by the accelerator and the
    secure element.

--*/

use crate::CryptoError;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{
    AsyncStreamCipher, BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit,
    KeyIvInit, StreamCipher,
};

/// AES block size in bytes
pub const AES_BLOCK_SIZE: usize = 16;

/// Runs `$body` with `$cipher` aliased to the AES variant matching the key
/// length. Other key lengths return `CryptoError::InvalidKeyLength`.
macro_rules! with_aes_cipher {
    ($key:expr, $cipher:ident => $body:expr) => {
        match $key.len() {
            16 => {
                type $cipher = aes::Aes128;
                $body
            }
            24 => {
                type $cipher = aes::Aes192;
                $body
            }
            32 => {
                type $cipher = aes::Aes256;
                $body
            }
            len => Err(CryptoError::InvalidKeyLength(len)),
        }
    };
}

pub(crate) use with_aes_cipher;

/// Unauthenticated AES chaining mode
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AesBlockMode {
    Ecb,
    Cbc,
    Ctr,
    Cfb,
    Ofb,
}

impl AesBlockMode {
    /// Whether the mode takes an initialization vector.
    pub fn uses_iv(self) -> bool {
        self != AesBlockMode::Ecb
    }

    /// Whether the payload must be a whole number of blocks.
    pub fn needs_whole_blocks(self) -> bool {
        matches!(self, AesBlockMode::Ecb | AesBlockMode::Cbc)
    }
}

pub enum Aes {}

impl Aes {
    /// Encrypt `data` with the given mode. The key selects AES-128/192/256.
    ///
    /// # Arguments
    ///
    /// * `mode` - Chaining mode
    /// * `key` - 16, 24 or 32 byte key
    /// * `iv` - 16 byte IV, ignored for ECB
    /// * `data` - Plaintext
    pub fn encrypt(
        mode: AesBlockMode,
        key: &[u8],
        iv: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        Self::crypt(mode, key, iv, data, true)
    }

    /// Decrypt `data` with the given mode.
    pub fn decrypt(
        mode: AesBlockMode,
        key: &[u8],
        iv: &[u8],
        data: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        Self::crypt(mode, key, iv, data, false)
    }

    fn crypt(
        mode: AesBlockMode,
        key: &[u8],
        iv: &[u8],
        data: &[u8],
        encrypt: bool,
    ) -> Result<Vec<u8>, CryptoError> {
        if mode.needs_whole_blocks() && data.len() % AES_BLOCK_SIZE != 0 {
            Err(CryptoError::InvalidDataLength(data.len()))?
        }
        if mode.uses_iv() && iv.len() != AES_BLOCK_SIZE {
            Err(CryptoError::InvalidIvLength(iv.len()))?
        }

        let mut buf = data.to_vec();
        with_aes_cipher!(key, C => {
            match mode {
                AesBlockMode::Ecb => {
                    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::InvalidKey)?;
                    for block in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
                        let block = GenericArray::from_mut_slice(block);
                        if encrypt {
                            cipher.encrypt_block(block);
                        } else {
                            cipher.decrypt_block(block);
                        }
                    }
                }
                AesBlockMode::Cbc if encrypt => {
                    let mut cipher = cbc::Encryptor::<C>::new_from_slices(key, iv)
                        .map_err(|_| CryptoError::InvalidKey)?;
                    for block in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
                        cipher.encrypt_block_mut(GenericArray::from_mut_slice(block));
                    }
                }
                AesBlockMode::Cbc => {
                    let mut cipher = cbc::Decryptor::<C>::new_from_slices(key, iv)
                        .map_err(|_| CryptoError::InvalidKey)?;
                    for block in buf.chunks_exact_mut(AES_BLOCK_SIZE) {
                        cipher.decrypt_block_mut(GenericArray::from_mut_slice(block));
                    }
                }
                AesBlockMode::Ctr => {
                    let mut cipher = ctr::Ctr128BE::<C>::new_from_slices(key, iv)
                        .map_err(|_| CryptoError::InvalidKey)?;
                    cipher.apply_keystream(&mut buf);
                }
                AesBlockMode::Cfb if encrypt => {
                    cfb_mode::Encryptor::<C>::new_from_slices(key, iv)
                        .map_err(|_| CryptoError::InvalidKey)?
                        .encrypt(&mut buf);
                }
                AesBlockMode::Cfb => {
                    cfb_mode::Decryptor::<C>::new_from_slices(key, iv)
                        .map_err(|_| CryptoError::InvalidKey)?
                        .decrypt(&mut buf);
                }
                AesBlockMode::Ofb => {
                    let mut cipher = ofb::Ofb::<C>::new_from_slices(key, iv)
                        .map_err(|_| CryptoError::InvalidKey)?;
                    cipher.apply_keystream(&mut buf);
                }
            }
            Ok(())
        })?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SP800_38A_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const SP800_38A_IV: &str = "000102030405060708090a0b0c0d0e0f";
    const SP800_38A_PT: &str = "6bc1bee22e409f96e93d7e117393172a";

    fn h(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    #[test]
    fn test_ecb_fips197() {
        let pt = h("00112233445566778899aabbccddeeff");
        let cases = [
            (
                "000102030405060708090a0b0c0d0e0f",
                "69c4e0d86a7b0430d8cdb78070b4c55a",
            ),
            (
                "000102030405060708090a0b0c0d0e0f1011121314151617",
                "dda97ca4864cdfe06eaf70a0ec0d7191",
            ),
            (
                "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
                "8ea2b7ca516745bfeafc49904b496089",
            ),
        ];
        for (key, ct) in cases {
            let key = h(key);
            let out = Aes::encrypt(AesBlockMode::Ecb, &key, &[], &pt).unwrap();
            assert_eq!(out, h(ct));
            assert_eq!(Aes::decrypt(AesBlockMode::Ecb, &key, &[], &out).unwrap(), pt);
        }
    }

    #[test]
    fn test_sp800_38a_first_block() {
        let key = h(SP800_38A_KEY);
        let pt = h(SP800_38A_PT);

        let cbc = Aes::encrypt(AesBlockMode::Cbc, &key, &h(SP800_38A_IV), &pt).unwrap();
        assert_eq!(cbc, h("7649abac8119b246cee98e9b12e9197d"));

        let cfb = Aes::encrypt(AesBlockMode::Cfb, &key, &h(SP800_38A_IV), &pt).unwrap();
        assert_eq!(cfb, h("3b3fd92eb72dad20333449f8e83cfb4a"));

        let ofb = Aes::encrypt(AesBlockMode::Ofb, &key, &h(SP800_38A_IV), &pt).unwrap();
        assert_eq!(ofb, h("3b3fd92eb72dad20333449f8e83cfb4a"));

        let ctr_iv = h("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff");
        let ctr = Aes::encrypt(AesBlockMode::Ctr, &key, &ctr_iv, &pt).unwrap();
        assert_eq!(ctr, h("874d6191b620e3261bef6864990db6ce"));
    }

    #[test]
    fn test_round_trip_all_modes() {
        let key = [0x5au8; 32];
        let iv = [0xa5u8; 16];
        let data: Vec<u8> = (0..64u8).collect();
        for mode in [
            AesBlockMode::Ecb,
            AesBlockMode::Cbc,
            AesBlockMode::Ctr,
            AesBlockMode::Cfb,
            AesBlockMode::Ofb,
        ] {
            let ct = Aes::encrypt(mode, &key, &iv, &data).unwrap();
            assert_ne!(ct, data, "{mode:?}");
            assert_eq!(Aes::decrypt(mode, &key, &iv, &ct).unwrap(), data, "{mode:?}");
        }
    }

    #[test]
    fn test_stream_modes_accept_partial_block() {
        let key = [1u8; 16];
        let iv = [2u8; 16];
        let data = [3u8; 21];
        for mode in [AesBlockMode::Ctr, AesBlockMode::Cfb, AesBlockMode::Ofb] {
            let ct = Aes::encrypt(mode, &key, &iv, &data).unwrap();
            assert_eq!(ct.len(), 21);
            assert_eq!(Aes::decrypt(mode, &key, &iv, &ct).unwrap(), data);
        }
    }

    #[test]
    fn test_invalid_lengths() {
        assert_eq!(
            Aes::encrypt(AesBlockMode::Ecb, &[0; 15], &[], &[0; 16]),
            Err(CryptoError::InvalidKeyLength(15))
        );
        assert_eq!(
            Aes::encrypt(AesBlockMode::Cbc, &[0; 16], &[0; 16], &[0; 17]),
            Err(CryptoError::InvalidDataLength(17))
        );
        assert_eq!(
            Aes::encrypt(AesBlockMode::Ctr, &[0; 16], &[0; 12], &[0; 4]),
            Err(CryptoError::InvalidIvLength(12))
        );
    }
}
