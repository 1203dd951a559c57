/*++

Licensed under the Apache-2.0 license.

File Name:

    hash_engine.rs

Abstract:

    File contains the hash engine of the SYMCRYPTO accelerator.

--*/

use super::descriptor::{Descriptor, TagRole};
use super::error::EngineError;
use bitfield::bitfield;
use symcrypto_emu_bus::Bus;
use symcrypto_emu_crypto::{CryptoError, HashAlgorithm, HashEngine};
use symcrypto_emu_types::emu_enum;

emu_enum!(
    /// Hash mode, bits 6:0 of the config word
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub HashMode;
    u32;
    {
        Md5 = 0x01,
        Sha1 = 0x02,
        Sha224 = 0x04,
        Sha256 = 0x08,
        Sha384 = 0x10,
        Sha512 = 0x20,
        Sm3 = 0x40,
    };
    Invalid
);

impl HashMode {
    fn algorithm(self) -> Option<HashAlgorithm> {
        match self {
            HashMode::Md5 => Some(HashAlgorithm::Md5),
            HashMode::Sha1 => Some(HashAlgorithm::Sha1),
            HashMode::Sha224 => Some(HashAlgorithm::Sha224),
            HashMode::Sha256 => Some(HashAlgorithm::Sha256),
            HashMode::Sha384 => Some(HashAlgorithm::Sha384),
            HashMode::Sha512 => Some(HashAlgorithm::Sha512),
            HashMode::Sm3 => Some(HashAlgorithm::Sm3),
            HashMode::Invalid => None,
        }
    }
}

bitfield! {
    /// First word of the hash config node
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct HashConfig(u32);

    pub u32, mode_code, _: 6, 0;
    pub hmac, _: 8;
    pub padding, _: 9;
    pub is_final, _: 10;
    pub verify, _: 11;
    u32, key_sel_hi, _: 27, 26;
    u32, key_sel_lo, _: 31, 28;
}

impl HashConfig {
    pub fn mode(&self) -> HashMode {
        HashMode::from(self.mode_code())
    }

    /// HMAC key slot selector, 1-based.
    pub fn key_sel(&self) -> u32 {
        (self.key_sel_hi() << 4) | self.key_sel_lo()
    }
}

/// Output pattern of a non-final request.
const INTERMEDIATE_STATE_FILL: u8 = 0xf4;

/// Run a hash request. `session` carries the running digest between
/// update requests and is closed by a final request.
#[tracing::instrument(skip_all, fields(nodes = fetcher.len()))]
pub fn run(
    memory: &mut dyn Bus,
    session: &mut Option<HashEngine>,
    fetcher: &[Descriptor],
    pusher: &[Descriptor],
) -> Result<(), EngineError> {
    let mut config = None;
    for node in fetcher {
        match node.role() {
            TagRole::Config { offset: 0 } => config = Some(node),
            TagRole::Config { offset } => {
                tracing::error!(offset, "unknown hash parameter offset");
                Err(EngineError::UnknownParameterOffset(offset))?
            }
            TagRole::Data { .. } => {}
        }
    }

    let Some(config) = config else {
        tracing::error!("hash request without config");
        return Ok(());
    };
    let mut word = [0u8; 4];
    let n = config.data.len().min(4);
    word[..n].copy_from_slice(&config.data[..n]);
    let config = HashConfig(u32::from_le_bytes(word));

    let mode = config.mode();
    tracing::debug!(
        %mode,
        hmac = config.hmac(),
        padding = config.padding(),
        is_final = config.is_final(),
        verify = config.verify(),
        key_sel = config.key_sel(),
        "hash request"
    );
    if config.hmac() {
        tracing::error!("HMAC is not supported");
        return Ok(());
    }
    if config.verify() {
        tracing::error!("hash verify is not supported");
        return Ok(());
    }

    let algorithm = mode
        .algorithm()
        .ok_or(EngineError::Crypto(CryptoError::UnsupportedAlgorithm))?;
    if let Some(open) = session.as_ref().map(HashEngine::algorithm) {
        if open != algorithm {
            tracing::error!(?open, requested = ?algorithm, "hash update with a different mode");
            return Ok(());
        }
    }
    let mut engine = session.take().unwrap_or_else(|| HashEngine::new(algorithm));

    // every data node is absorbed, initialization data included
    for node in fetcher {
        if let TagRole::Data { .. } = node.role() {
            engine.update(&node.data);
        }
    }

    if !config.is_final() {
        *session = Some(engine);
        let output = pusher
            .first()
            .ok_or(EngineError::MissingDescriptor("output"))?;
        output.push(memory, &vec![INTERMEDIATE_STATE_FILL; output.len()])?;
        return Ok(());
    }

    let output = pusher
        .first()
        .ok_or(EngineError::MissingDescriptor("output"))?;
    let mut digest = engine.finalize();
    if output.len() != digest.len() {
        tracing::error!(
            got = output.len(),
            want = digest.len(),
            "output length does not match digest size"
        );
    }
    digest.resize(output.len(), 0);
    output.push(memory, &digest)?;
    Ok(())
}
