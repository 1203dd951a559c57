/*++

Licensed under the Apache-2.0 license.

File Name:

    hash.rs

Abstract:

    File contains a streaming hash engine over the MD5, SHA-1, SHA-2 and SM3
    digests.

--*/

use sha2::digest::DynDigest;

/// Hash algorithm
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
    Sm3,
}

impl HashAlgorithm {
    /// Digest size in bytes
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha224 => 28,
            HashAlgorithm::Sha256 | HashAlgorithm::Sm3 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    fn hasher(self) -> Box<dyn DynDigest> {
        match self {
            HashAlgorithm::Md5 => Box::<md5::Md5>::default(),
            HashAlgorithm::Sha1 => Box::<sha1::Sha1>::default(),
            HashAlgorithm::Sha224 => Box::<sha2::Sha224>::default(),
            HashAlgorithm::Sha256 => Box::<sha2::Sha256>::default(),
            HashAlgorithm::Sha384 => Box::<sha2::Sha384>::default(),
            HashAlgorithm::Sha512 => Box::<sha2::Sha512>::default(),
            HashAlgorithm::Sm3 => Box::<sm3::Sm3>::default(),
        }
    }
}

/// Streaming hash computation
pub struct HashEngine {
    algorithm: HashAlgorithm,
    hasher: Box<dyn DynDigest>,
    bytes_absorbed: usize,
}

impl HashEngine {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            algorithm,
            hasher: algorithm.hasher(),
            bytes_absorbed: 0,
        }
    }

    /// One-shot digest of `data`.
    pub fn digest(algorithm: HashAlgorithm, data: &[u8]) -> Vec<u8> {
        let mut engine = Self::new(algorithm);
        engine.update(data);
        engine.finalize()
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Number of bytes absorbed so far.
    pub fn bytes_absorbed(&self) -> usize {
        self.bytes_absorbed
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes_absorbed += data.len();
    }

    /// Consume the engine and return the digest.
    pub fn finalize(self) -> Vec<u8> {
        self.hasher.finalize().into_vec()
    }
}

impl std::fmt::Debug for HashEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashEngine")
            .field("algorithm", &self.algorithm)
            .field("bytes_absorbed", &self.bytes_absorbed)
            .finish()
    }
}
