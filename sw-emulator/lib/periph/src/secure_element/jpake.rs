/*++

Licensed under the Apache-2.0 license.

File Name:

    jpake.rs

Abstract:

    File contains the EC-JPAKE commands of the secure element. Each round
    generates this side's values or, with the verify option, checks the
    peer's. Only P-256 with SHA-256 is supported.

--*/

use super::dma::DmaChain;
use super::key::{write_wrapped, KeyMetadata, KeyMode, KeyType};
use super::{Request, ResponseCode, SeError};
use crate::key_store::VolatileKeyStore;
use symcrypto_emu_bus::Bus;
use symcrypto_emu_crypto::{CryptoError, EcJpake};

mod constants {
    #![allow(unused)]

    /// Options bit selecting verification of the peer's round values
    pub const VERIFY: u32 = 0x100;
}

fn is_verify(options: u32) -> bool {
    options & constants::VERIFY != 0
}

fn check_key_type(metadata: KeyMetadata) -> Result<(), SeError> {
    if metadata.key_type() != KeyType::EccWeierstrass {
        tracing::error!(key_type = %metadata.key_type(), "J-PAKE needs a Weierstrass curve key");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    Ok(())
}

/// Buffer of the next input node, whose size must match the length passed
/// as a command parameter.
fn sized_input(
    memory: &mut dyn Bus,
    inputs: &mut DmaChain,
    expected: u32,
    what: &'static str,
) -> Result<Vec<u8>, SeError> {
    let node = inputs.next_descriptor(memory)?;
    if node.size != expected as usize {
        tracing::error!(what, size = node.size, expected, "input length mismatch");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    Ok(node.fetch(memory)?)
}

fn write_output(
    memory: &mut dyn Bus,
    outputs: &mut DmaChain,
    data: &[u8],
    what: &'static str,
) -> Result<(), SeError> {
    let node = outputs.next_descriptor(memory)?;
    if node.size != data.len() {
        tracing::error!(what, size = node.size, len = data.len(), "output length mismatch");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    Ok(node.store(memory, data)?)
}

fn rejected(err: CryptoError) -> SeError {
    tracing::error!(%err, "J-PAKE input rejected");
    SeError::Response(ResponseCode::InvalidParameter)
}

#[tracing::instrument(skip_all, fields(command = %req.id, verify = is_verify(req.options)))]
pub(super) fn round1(req: &mut Request) -> Result<(), SeError> {
    let verify = is_verify(req.options);
    req.expect_params(if verify { 3 } else { 2 }, ResponseCode::Abort)?;
    check_key_type(KeyMetadata(req.params[0]))?;

    let mut inputs = req.inputs();
    let _key = inputs.next_descriptor(req.memory)?;
    let user_id = sized_input(req.memory, &mut inputs, req.params[1], "user ID")?;

    if verify {
        let peer_id = sized_input(req.memory, &mut inputs, req.params[2], "peer user ID")?;
        let point3 = inputs.next_data(req.memory)?;
        let proof3 = inputs.next_data(req.memory)?;
        let point4 = inputs.next_data(req.memory)?;
        let proof4 = inputs.next_data(req.memory)?;
        return EcJpake::verify_round1(&peer_id, &point3, &proof3, &point4, &proof4).map_err(
            |err| match err {
                CryptoError::InvalidProof => {
                    tracing::info!("round one proof does not verify");
                    SeError::Crypto(err)
                }
                err => rejected(err),
            },
        );
    }

    let round = EcJpake::round1(&user_id, &mut rand::thread_rng())?;
    let mut outputs = req.outputs();
    for (data, what) in [
        (&round.secret[..], "secret"),
        (&round.point1[..], "X1"),
        (&round.proof1[..], "X1 proof"),
        (&round.point2[..], "X2"),
        (&round.proof2[..], "X2 proof"),
    ] {
        write_output(req.memory, &mut outputs, data, what)?;
    }
    Ok(())
}

#[tracing::instrument(skip_all, fields(command = %req.id, verify = is_verify(req.options)))]
pub(super) fn round2(req: &mut Request) -> Result<(), SeError> {
    let verify = is_verify(req.options);
    req.expect_params(if verify { 2 } else { 3 }, ResponseCode::Abort)?;
    check_key_type(KeyMetadata(req.params[0]))?;

    let mut inputs = req.inputs();
    let _key = inputs.next_descriptor(req.memory)?;

    if verify {
        let peer_id = sized_input(req.memory, &mut inputs, req.params[1], "peer user ID")?;
        let point1 = inputs.next_data(req.memory)?;
        let point2 = inputs.next_data(req.memory)?;
        let point3 = inputs.next_data(req.memory)?;
        let point_b = inputs.next_data(req.memory)?;
        let proof = inputs.next_data(req.memory)?;
        return EcJpake::verify_round2(&peer_id, &point1, &point2, &point3, &point_b, &proof)
            .map_err(rejected);
    }

    let password = sized_input(req.memory, &mut inputs, req.params[1], "password")?;
    let user_id = sized_input(req.memory, &mut inputs, req.params[2], "user ID")?;
    let secret = inputs.next_data(req.memory)?;
    let point1 = inputs.next_data(req.memory)?;
    let point3 = inputs.next_data(req.memory)?;
    let point4 = inputs.next_data(req.memory)?;
    let round = EcJpake::round2(
        &user_id,
        &password,
        &secret,
        &point1,
        &point3,
        &point4,
        &mut rand::thread_rng(),
    )
    .map_err(rejected)?;

    let mut outputs = req.outputs();
    write_output(req.memory, &mut outputs, &round.point, "A")?;
    write_output(req.memory, &mut outputs, &round.proof, "A proof")
}

/// Derives the session key and places it according to the output key
/// metadata. The hash mode in the options is not consulted.
#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn session_key(req: &mut Request, store: &VolatileKeyStore) -> Result<(), SeError> {
    req.expect_params(3, ResponseCode::Abort)?;
    check_key_type(KeyMetadata(req.params[0]))?;
    let derived = KeyMetadata(req.params[2]);
    tracing::debug!(mode = %derived.mode(), index = derived.index(), "session key");

    let mut inputs = req.inputs();
    let _key = inputs.next_descriptor(req.memory)?;
    let password = sized_input(req.memory, &mut inputs, req.params[1], "password")?;
    let _point2 = inputs.next_descriptor(req.memory)?;
    let point4 = inputs.next_data(req.memory)?;
    let point_b = inputs.next_data(req.memory)?;
    let secret = inputs.next_data(req.memory)?;
    // auth data of a wrapped result, not checked
    let _auth = inputs.next_descriptor(req.memory)?;

    let key = EcJpake::session_key(&password, &secret, &point4, &point_b).map_err(rejected)?;
    match derived.mode() {
        KeyMode::Unprotected => {
            let mut outputs = req.outputs();
            write_output(req.memory, &mut outputs, &key, "session key")
        }
        KeyMode::Wrapped => {
            let output = req.outputs().next_descriptor(req.memory)?;
            write_wrapped(req.memory, &output, &key)
        }
        KeyMode::Volatile => {
            store.insert(derived.index(), key.to_vec());
            Ok(())
        }
        mode => {
            tracing::error!(%mode, "unsupported session key mode");
            Err(SeError::Response(ResponseCode::InvalidParameter))
        }
    }
}
