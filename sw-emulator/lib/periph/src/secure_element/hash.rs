/*++

Licensed under the Apache-2.0 license.

File Name:

    hash.rs

Abstract:

    File contains the secure element hash commands: one-shot Hash and the
    HashUpdate / HashFinish session.

--*/

use super::dma::SeDescriptor;
use super::{Request, ResponseCode, SeError};
use symcrypto_emu_crypto::{HashAlgorithm, HashEngine};
use symcrypto_emu_types::emu_enum;

mod constants {
    #![allow(unused)]

    pub const SHA_MODE_SHIFT: u32 = 8;
    pub const SHA_MODE_MASK: u32 = 0xf;
}

emu_enum!(
    /// Hash algorithm, options bits 11:8
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub ShaMode;
    u32;
    {
        Sha1 = 2,
        Sha224 = 3,
        Sha256 = 4,
        Sha384 = 5,
        Sha512 = 6,
    };
    Unknown
);

impl ShaMode {
    fn from_options(options: u32) -> Self {
        ShaMode::from((options >> constants::SHA_MODE_SHIFT) & constants::SHA_MODE_MASK)
    }

    fn algorithm(self) -> Result<HashAlgorithm, SeError> {
        match self {
            ShaMode::Sha1 => Ok(HashAlgorithm::Sha1),
            ShaMode::Sha224 => Ok(HashAlgorithm::Sha224),
            ShaMode::Sha256 => Ok(HashAlgorithm::Sha256),
            ShaMode::Sha384 => Ok(HashAlgorithm::Sha384),
            ShaMode::Sha512 => Ok(HashAlgorithm::Sha512),
            ShaMode::Unknown => {
                tracing::error!("unsupported hash mode");
                Err(SeError::Response(ResponseCode::Abort))
            }
        }
    }
}

/// First output node, which must fit the digest exactly.
fn digest_output(req: &mut Request, algorithm: HashAlgorithm) -> Result<SeDescriptor, SeError> {
    let output = req.outputs().next_descriptor(req.memory)?;
    if output.size != algorithm.digest_size() {
        tracing::error!(size = output.size, ?algorithm, "digest size mismatch");
        Err(SeError::Response(ResponseCode::Abort))?
    }
    Ok(output)
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn hash(req: &mut Request) -> Result<(), SeError> {
    req.expect_params(1, ResponseCode::Abort)?;
    let algorithm = ShaMode::from_options(req.options).algorithm()?;

    let payload = req.inputs().next_data(req.memory)?;
    let output = digest_output(req, algorithm)?;
    let digest = HashEngine::digest(algorithm, &payload);
    Ok(output.store(req.memory, &digest)?)
}

/// HashUpdate and HashFinish. The session lives in the secure element
/// rather than in the state node, which is read and ignored.
#[tracing::instrument(skip_all, fields(command = %req.id, finish))]
pub(super) fn update(
    req: &mut Request,
    session: &mut Option<HashEngine>,
    finish: bool,
) -> Result<(), SeError> {
    if !(1..=2).contains(&req.params.len()) {
        tracing::error!(count = req.params.len(), "invalid parameter count");
        Err(SeError::Response(ResponseCode::Abort))?
    }
    let algorithm = ShaMode::from_options(req.options).algorithm()?;

    let mut inputs = req.inputs();
    let _state = inputs.next_data(req.memory)?;
    let payload = inputs.next_data(req.memory)?;

    if let Some(engine) = session {
        if engine.algorithm() != algorithm {
            tracing::error!(
                open = ?engine.algorithm(),
                requested = ?algorithm,
                "hash session algorithm mismatch"
            );
            Err(SeError::Response(ResponseCode::Abort))?
        }
    }
    let mut engine = session.take().unwrap_or_else(|| HashEngine::new(algorithm));
    engine.update(&payload);
    let output = match finish.then(|| digest_output(req, algorithm)).transpose() {
        Ok(Some(output)) => output,
        other => {
            // the session stays open until a finish writes its digest
            *session = Some(engine);
            return other.map(|_| ());
        }
    };
    Ok(output.store(req.memory, &engine.finalize())?)
}
