/*++

Licensed under the Apache-2.0 license.

File Name:

    key.rs

Abstract:

    File contains the key management commands of the secure element and the
    key material helpers shared with the cipher commands.

--*/

use super::dma::{DmaChain, SeDescriptor};
use super::{Request, ResponseCode, SeError};
use crate::key_store::VolatileKeyStore;
use bitfield::bitfield;
use rand::RngCore;
use symcrypto_emu_bus::Bus;
use symcrypto_emu_crypto::{Ecc, EccCurve};
use symcrypto_emu_types::emu_enum;

mod constants {
    #![allow(unused)]

    pub const WRAPPED_IV_MARKER: u8 = 0xae;
    pub const WRAPPED_TAG_MARKER: u8 = 0xbe;
    pub const WRAPPED_IV_LEN: usize = 12;
    pub const WRAPPED_TAG_LEN: usize = 16;
    pub const WRAPPED_OVERHEAD: usize = WRAPPED_IV_LEN + WRAPPED_TAG_LEN;

    pub const TRANSFER_MODE_SHIFT: u32 = 8;
    pub const TRANSFER_MODE_MASK: u32 = 0x3;
    pub const TRANSFER_INDEX_MASK: u32 = 0xff;
}

emu_enum!(
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub KeyType;
    u32;
    {
        Raw = 0x0,
        EccWeierstrass = 0x8,
        EccEdwards = 0xa,
        EccEddsa = 0xb,
        Ed25519 = 0xc,
    };
    Unknown
);

emu_enum!(
    /// Where key material lives between commands
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub KeyMode;
    u32;
    {
        Unprotected = 0,
        Volatile = 1,
        Wrapped = 2,
        WrappedAntiReplay = 3,
    };
    Unknown
);

emu_enum!(
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub KeyRestriction;
    u32;
    {
        Unlocked = 0,
        Locked = 1,
        Internal = 2,
        Restricted = 3,
    };
    Unknown
);

bitfield! {
    /// Key metadata word passed as a command parameter
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct KeyMetadata(u32);

    /// Key length in bytes, raw keys only
    pub u32, raw_len, _: 14, 0;
    /// Scalar size minus one, ECC keys only
    u32, ecc_size_code, _: 6, 0;
    pub ecc_domain, _: 12;
    pub ecc_public, _: 13;
    pub ecc_private, _: 14;
    pub u32, index, _: 23, 16;
    u32, restriction_code, _: 25, 24;
    u32, mode_code, _: 27, 26;
    u32, type_code, _: 31, 28;
}

impl KeyMetadata {
    pub fn key_type(&self) -> KeyType {
        KeyType::from(self.type_code())
    }

    pub fn mode(&self) -> KeyMode {
        KeyMode::from(self.mode_code())
    }

    pub fn restriction(&self) -> KeyRestriction {
        KeyRestriction::from(self.restriction_code())
    }

    /// ECC scalar size in bytes
    pub fn ecc_size(&self) -> usize {
        self.ecc_size_code() as usize + 1
    }

    fn ecc_curve(&self) -> Result<EccCurve, SeError> {
        EccCurve::from_scalar_size(self.ecc_size()).ok_or_else(|| {
            tracing::error!(size = self.ecc_size(), "unsupported curve size");
            SeError::Response(ResponseCode::InvalidParameter)
        })
    }
}

/// Wrapped key blob: IV marker, plaintext key, tag marker.
fn wrap(key: &[u8]) -> Vec<u8> {
    let mut blob = vec![constants::WRAPPED_IV_MARKER; constants::WRAPPED_IV_LEN];
    blob.extend_from_slice(key);
    blob.extend([constants::WRAPPED_TAG_MARKER; constants::WRAPPED_TAG_LEN]);
    blob
}

fn unwrap(blob: &[u8]) -> Result<Vec<u8>, SeError> {
    if blob.len() <= constants::WRAPPED_OVERHEAD {
        tracing::error!(len = blob.len(), "wrapped key too short");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    let end = blob.len() - constants::WRAPPED_TAG_LEN;
    Ok(blob[constants::WRAPPED_IV_LEN..end].to_vec())
}

/// Store the wrapped form of `key` into `output`, which must fit it exactly.
pub(super) fn write_wrapped(
    memory: &mut dyn Bus,
    output: &SeDescriptor,
    key: &[u8],
) -> Result<(), SeError> {
    if output.size != key.len() + constants::WRAPPED_OVERHEAD {
        tracing::error!(
            size = output.size,
            key_len = key.len(),
            "wrapped key buffer size mismatch"
        );
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    Ok(output.store(memory, &wrap(key))?)
}

fn volatile_key(store: &VolatileKeyStore, index: u32) -> Result<Vec<u8>, SeError> {
    store.get(index).ok_or_else(|| {
        tracing::error!(index, "volatile key slot empty");
        SeError::Response(ResponseCode::InvalidParameter)
    })
}

/// Key of a symmetric cipher command, read from the next input node.
pub(super) fn cipher_key(
    memory: &mut dyn Bus,
    inputs: &mut DmaChain,
    metadata: KeyMetadata,
    store: &VolatileKeyStore,
) -> Result<Vec<u8>, SeError> {
    if metadata.key_type() != KeyType::Raw {
        tracing::error!(key_type = %metadata.key_type(), "cipher key must be raw");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    let node = inputs.next_data(memory)?;
    match metadata.mode() {
        KeyMode::Unprotected => Ok(node),
        KeyMode::Wrapped => unwrap(&node),
        KeyMode::Volatile => volatile_key(store, metadata.index()),
        mode => {
            tracing::error!(%mode, "unsupported cipher key mode");
            Err(SeError::Response(ResponseCode::Abort))
        }
    }
}

/// Private scalar of an ECC key, read from the next input node. Stored keys
/// may carry the public point after the scalar.
fn private_key(
    memory: &mut dyn Bus,
    inputs: &mut DmaChain,
    metadata: KeyMetadata,
    store: &VolatileKeyStore,
) -> Result<Vec<u8>, SeError> {
    let size = metadata.ecc_size();
    let node = inputs.next_descriptor(memory)?;
    let mut key = match metadata.mode() {
        KeyMode::Unprotected => {
            if node.size != size {
                tracing::error!(node = node.size, size, "private key length mismatch");
                Err(SeError::Response(ResponseCode::InvalidParameter))?
            }
            node.fetch(memory)?
        }
        KeyMode::Wrapped => unwrap(&node.fetch(memory)?)?,
        KeyMode::Volatile => volatile_key(store, metadata.index())?,
        mode => {
            tracing::error!(%mode, "unsupported private key mode");
            Err(SeError::Response(ResponseCode::InvalidParameter))?
        }
    };
    if key.len() < size {
        tracing::error!(len = key.len(), size, "private key too short");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    key.truncate(size);
    Ok(key)
}

/// Checks shared by the commands that use an ECC private key.
fn ecc_private_metadata(metadata: KeyMetadata) -> Result<EccCurve, SeError> {
    if metadata.key_type() != KeyType::EccWeierstrass {
        tracing::error!(key_type = %metadata.key_type(), "key type not supported");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    if !metadata.ecc_private() {
        tracing::error!("key has no private part");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    metadata.ecc_curve()
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn import_key(req: &mut Request, store: &VolatileKeyStore) -> Result<(), SeError> {
    req.expect_params(1, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);
    tracing::debug!(index = metadata.index(), mode = %metadata.mode(), "import key");

    let mut inputs = req.inputs();
    match metadata.mode() {
        KeyMode::Unprotected => {
            tracing::error!("unprotected keys cannot be imported");
            Err(SeError::Response(ResponseCode::Abort))
        }
        KeyMode::Volatile => {
            // the auth node that follows is not checked
            let key = inputs.next_data(req.memory)?;
            store.insert(metadata.index(), key);
            Ok(())
        }
        KeyMode::Wrapped => {
            let key = inputs.next_data(req.memory)?;
            let output = req.outputs().next_descriptor(req.memory)?;
            write_wrapped(req.memory, &output, &key)
        }
        mode => {
            tracing::error!(%mode, "invalid key mode");
            Err(SeError::Response(ResponseCode::InvalidParameter))
        }
    }
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn export_key(req: &mut Request, store: &VolatileKeyStore) -> Result<(), SeError> {
    req.expect_params(1, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);

    match metadata.mode() {
        KeyMode::Unprotected => {
            tracing::error!("unprotected keys cannot be exported");
            Err(SeError::Response(ResponseCode::Abort))
        }
        KeyMode::Volatile => {
            let key = volatile_key(store, metadata.index())?;
            let output = req.outputs().next_descriptor(req.memory)?;
            if output.size != key.len() {
                tracing::error!(size = output.size, len = key.len(), "export buffer size mismatch");
                Err(SeError::Response(ResponseCode::InvalidParameter))?
            }
            Ok(output.store(req.memory, &key)?)
        }
        KeyMode::Wrapped => {
            if metadata.restriction() != KeyRestriction::Unlocked {
                tracing::error!(restriction = %metadata.restriction(), "key is not exportable");
                Err(SeError::Response(ResponseCode::AuthorizationError))?
            }
            let output = req.outputs().next_descriptor(req.memory)?;
            let mut inputs = req.inputs();
            inputs.next_descriptor(req.memory)?;
            let key = unwrap(&inputs.next_data(req.memory)?)?;
            Ok(output.store(req.memory, &key)?)
        }
        _ => Err(SeError::Response(ResponseCode::InvalidParameter)),
    }
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn transfer_key(req: &mut Request, store: &VolatileKeyStore) -> Result<(), SeError> {
    req.expect_params(2, ResponseCode::Abort)?;
    let source = KeyMetadata(req.params[0]);
    let update = req.params[1];
    let dest_mode =
        KeyMode::from((update >> constants::TRANSFER_MODE_SHIFT) & constants::TRANSFER_MODE_MASK);
    let dest_index = update & constants::TRANSFER_INDEX_MASK;
    tracing::debug!(
        source_mode = %source.mode(),
        source_index = source.index(),
        %dest_mode,
        dest_index,
        "transfer key"
    );

    let mut inputs = req.inputs();
    let data = inputs.next_data(req.memory)?;
    let _auth = inputs.next_data(req.memory)?;

    let key = match source.mode() {
        KeyMode::Unprotected => data,
        KeyMode::Wrapped => unwrap(&data)?,
        KeyMode::Volatile => volatile_key(store, source.index())?,
        mode => {
            tracing::error!(%mode, "invalid source key mode");
            Err(SeError::Response(ResponseCode::InvalidParameter))?
        }
    };

    let output = match dest_mode {
        KeyMode::Unprotected => key,
        KeyMode::Wrapped => wrap(&key),
        KeyMode::Volatile => {
            store.insert(dest_index, key);
            return Ok(());
        }
        mode => {
            tracing::error!(%mode, "invalid destination key mode");
            Err(SeError::Response(ResponseCode::InvalidParameter))?
        }
    };
    let node = req.outputs().next_descriptor(req.memory)?;
    Ok(node.store(req.memory, &output)?)
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn create_key(req: &mut Request, store: &VolatileKeyStore) -> Result<(), SeError> {
    req.expect_params(1, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);
    if metadata.key_type() == KeyType::EccWeierstrass && metadata.ecc_domain() {
        tracing::error!("custom curves not supported");
        Err(SeError::Response(ResponseCode::Abort))?
    }

    let mut inputs = req.inputs();
    let _auth = inputs.next_data(req.memory)?;

    let key = match metadata.key_type() {
        KeyType::Raw => {
            let mut key = vec![0; metadata.raw_len() as usize];
            rand::thread_rng().fill_bytes(&mut key);
            key
        }
        KeyType::EccWeierstrass => {
            let pair = Ecc::generate(metadata.ecc_curve()?, &mut rand::thread_rng())?;
            let mut key = vec![];
            if metadata.ecc_private() {
                key.extend(pair.private);
            }
            if metadata.ecc_public() {
                key.extend(pair.public);
            }
            key
        }
        key_type => {
            tracing::error!(%key_type, "key type not supported");
            Err(SeError::Response(ResponseCode::InvalidParameter))?
        }
    };

    match metadata.mode() {
        KeyMode::Unprotected => {
            let output = req.outputs().next_descriptor(req.memory)?;
            if output.size != key.len() {
                tracing::error!(size = output.size, len = key.len(), "output length mismatch");
                Err(SeError::Response(ResponseCode::InvalidParameter))?
            }
            Ok(output.store(req.memory, &key)?)
        }
        KeyMode::Wrapped => {
            let output = req.outputs().next_descriptor(req.memory)?;
            write_wrapped(req.memory, &output, &key)
        }
        KeyMode::Volatile => {
            store.insert(metadata.index(), key);
            Ok(())
        }
        mode => {
            tracing::error!(%mode, "invalid key mode");
            Err(SeError::Response(ResponseCode::InvalidParameter))
        }
    }
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn read_public_key(req: &mut Request, store: &VolatileKeyStore) -> Result<(), SeError> {
    req.expect_params(1, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);
    let curve = ecc_private_metadata(metadata)?;

    let mut inputs = req.inputs();
    let _auth = inputs.next_data(req.memory)?;
    let private = private_key(req.memory, &mut inputs, metadata, store)?;
    let public = Ecc::public_key(curve, &private)?;

    let output = req.outputs().next_descriptor(req.memory)?;
    if output.size != public.len() {
        tracing::error!(size = output.size, len = public.len(), "output length mismatch");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    Ok(output.store(req.memory, &public)?)
}

#[tracing::instrument(skip_all, fields(command = %req.id))]
pub(super) fn diffie_hellman(req: &mut Request, store: &VolatileKeyStore) -> Result<(), SeError> {
    req.expect_params(2, ResponseCode::Abort)?;
    let metadata = KeyMetadata(req.params[0]);
    let curve = ecc_private_metadata(metadata)?;
    let derived = KeyMetadata(req.params[1]);
    if derived.key_type() != KeyType::Raw {
        tracing::error!(key_type = %derived.key_type(), "shared secret must be a raw key");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }

    let mut inputs = req.inputs();
    let _auth = inputs.next_data(req.memory)?;
    let private = private_key(req.memory, &mut inputs, metadata, store)?;
    let peer = inputs.next_descriptor(req.memory)?;
    if peer.size != 2 * curve.scalar_size() {
        tracing::error!(size = peer.size, "peer public key length mismatch");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    let shared = Ecc::shared_point(curve, &private, &peer.fetch(req.memory)?)?;

    let output = req.outputs().next_descriptor(req.memory)?;
    if output.size != shared.len() {
        tracing::error!(size = output.size, len = shared.len(), "output length mismatch");
        Err(SeError::Response(ResponseCode::InvalidParameter))?
    }
    Ok(output.store(req.memory, &shared)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secure_element::harness::Harness;
    use crate::secure_element::{SecureElementConfig, NULL_DESCRIPTOR};

    const IMPORT_KEY: u32 = 0x0100;
    const EXPORT_KEY: u32 = 0x0102;
    const TRANSFER_KEY: u32 = 0x0106;
    const CREATE_KEY: u32 = 0x0200;
    const READ_PUBLIC_KEY: u32 = 0x0201;
    const DIFFIE_HELLMAN: u32 = 0x0e00;

    fn metadata(key_type: u32, mode: u32, index: u32, low: u32) -> u32 {
        (key_type << 28) | (mode << 26) | (index << 16) | low
    }

    /// P-256 key with private and public parts
    fn ecc_metadata(mode: u32, index: u32, public: bool) -> u32 {
        let mut low = (1 << 14) | 31;
        if public {
            low |= 1 << 13;
        }
        metadata(8, mode, index, low)
    }

    #[test]
    fn test_metadata_fields() {
        let metadata = KeyMetadata(metadata(8, 2, 0x42, (1 << 14) | (1 << 13) | 47));
        assert_eq!(metadata.key_type(), KeyType::EccWeierstrass);
        assert_eq!(metadata.mode(), KeyMode::Wrapped);
        assert_eq!(metadata.index(), 0x42);
        assert_eq!(metadata.ecc_size(), 48);
        assert!(metadata.ecc_private());
        assert!(metadata.ecc_public());
        assert!(!metadata.ecc_domain());
        assert_eq!(metadata.restriction(), KeyRestriction::Unlocked);
    }

    #[test]
    fn test_wrap_unwrap() {
        let blob = wrap(&[1, 2, 3]);
        assert_eq!(blob.len(), 31);
        assert_eq!(&blob[..12], &[0xae; 12]);
        assert_eq!(&blob[15..], &[0xbe; 16]);
        assert_eq!(unwrap(&blob).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            unwrap(&[0; 28]),
            Err(SeError::Response(ResponseCode::InvalidParameter))
        );
    }

    #[test]
    fn test_wrapped_import_export() {
        let mut h = Harness::new(SecureElementConfig::default());
        let key = [0x5a; 16];
        h.write_bytes(0x2000, &key);

        let meta = metadata(0, 2, 0, 16);
        let input = h.chain(&[(0x2000, 16), (0x2100, 8)]);
        let output = h.chain(&[(0x3000, 44)]);
        assert_eq!(h.command(IMPORT_KEY, 0, input, output, &[meta]), ResponseCode::Ok);
        assert_eq!(h.read_bytes(0x3000, 44), wrap(&key));

        let input = h.chain(&[(0x2100, 8), (0x3000, 44)]);
        let output = h.chain(&[(0x4000, 16)]);
        assert_eq!(h.command(EXPORT_KEY, 0, input, output, &[meta]), ResponseCode::Ok);
        assert_eq!(h.read_bytes(0x4000, 16), key);
    }

    #[test]
    fn test_wrapped_import_size_mismatch() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2000, 16)]);
        let output = h.chain(&[(0x3000, 40)]);
        assert_eq!(
            h.command(IMPORT_KEY, 0, input, output, &[metadata(0, 2, 0, 16)]),
            ResponseCode::InvalidParameter
        );
    }

    #[test]
    fn test_import_rejected_modes() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2000, 16)]);
        assert_eq!(
            h.command(IMPORT_KEY, 0, input, NULL_DESCRIPTOR, &[metadata(0, 0, 0, 16)]),
            ResponseCode::Abort
        );
        assert_eq!(
            h.command(IMPORT_KEY, 0, input, NULL_DESCRIPTOR, &[metadata(0, 3, 0, 16)]),
            ResponseCode::InvalidParameter
        );
        assert_eq!(
            h.command(IMPORT_KEY, 0, input, NULL_DESCRIPTOR, &[]),
            ResponseCode::Abort
        );
    }

    #[test]
    fn test_export_errors() {
        let mut h = Harness::new(SecureElementConfig::default());
        let output = h.chain(&[(0x3000, 16)]);
        // empty slot
        assert_eq!(
            h.command(EXPORT_KEY, 0, NULL_DESCRIPTOR, output, &[metadata(0, 1, 9, 0)]),
            ResponseCode::InvalidParameter
        );
        // size mismatch
        h.store.insert(9, vec![1; 32]);
        assert_eq!(
            h.command(EXPORT_KEY, 0, NULL_DESCRIPTOR, output, &[metadata(0, 1, 9, 0)]),
            ResponseCode::InvalidParameter
        );
        // locked wrapped key
        let locked = metadata(0, 2, 0, 16) | (1 << 24);
        assert_eq!(
            h.command(EXPORT_KEY, 0, NULL_DESCRIPTOR, output, &[locked]),
            ResponseCode::AuthorizationError
        );
    }

    #[test]
    fn test_transfer_volatile_to_wrapped() {
        let mut h = Harness::new(SecureElementConfig::default());
        h.store.insert(3, vec![7; 16]);
        let input = h.chain(&[(0x2000, 16), (0x2100, 8)]);
        let output = h.chain(&[(0x3000, 44)]);
        let update = (2 << 8) | 0x11;
        assert_eq!(
            h.command(TRANSFER_KEY, 0, input, output, &[metadata(0, 1, 3, 16), update]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_bytes(0x3000, 44), wrap(&[7; 16]));
    }

    #[test]
    fn test_transfer_unprotected_to_volatile() {
        let mut h = Harness::new(SecureElementConfig::default());
        h.write_bytes(0x2000, &[3; 24]);
        let input = h.chain(&[(0x2000, 24), (0x2100, 8)]);
        let update = (1 << 8) | 0x20;
        assert_eq!(
            h.command(TRANSFER_KEY, 0, input, NULL_DESCRIPTOR, &[metadata(0, 0, 0, 24), update]),
            ResponseCode::Ok
        );
        assert_eq!(h.store.get(0x20), Some(vec![3; 24]));
    }

    #[test]
    fn test_transfer_missing_source() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2000, 16), (0x2100, 8)]);
        assert_eq!(
            h.command(TRANSFER_KEY, 0, input, NULL_DESCRIPTOR, &[metadata(0, 1, 40, 16), 0x100]),
            ResponseCode::InvalidParameter
        );
    }

    #[test]
    fn test_create_raw_volatile() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2100, 8)]);
        assert_eq!(
            h.command(CREATE_KEY, 0, input, NULL_DESCRIPTOR, &[metadata(0, 1, 12, 32)]),
            ResponseCode::Ok
        );
        assert_eq!(h.store.get(12).map(|key| key.len()), Some(32));
    }

    #[test]
    fn test_create_unprotected_size_mismatch() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2100, 8)]);
        let output = h.chain(&[(0x3000, 16)]);
        assert_eq!(
            h.command(CREATE_KEY, 0, input, output, &[metadata(0, 0, 0, 32)]),
            ResponseCode::InvalidParameter
        );
    }

    #[test]
    fn test_create_custom_curve() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2100, 8)]);
        let meta = ecc_metadata(1, 0, true) | (1 << 12);
        assert_eq!(
            h.command(CREATE_KEY, 0, input, NULL_DESCRIPTOR, &[meta]),
            ResponseCode::Abort
        );
    }

    #[test]
    fn test_create_ecc_and_read_public() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2100, 8)]);
        let output = h.chain(&[(0x3000, 96)]);
        let meta = ecc_metadata(0, 0, true);
        assert_eq!(h.command(CREATE_KEY, 0, input, output, &[meta]), ResponseCode::Ok);
        let created = h.read_bytes(0x3000, 96);

        let input = h.chain(&[(0x2100, 8), (0x3000, 32)]);
        let output = h.chain(&[(0x4000, 64)]);
        assert_eq!(
            h.command(READ_PUBLIC_KEY, 0, input, output, &[meta]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_bytes(0x4000, 64), created[32..]);
    }

    #[test]
    fn test_read_public_volatile() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2100, 8)]);
        let meta = ecc_metadata(1, 4, true);
        assert_eq!(
            h.command(CREATE_KEY, 0, input, NULL_DESCRIPTOR, &[meta]),
            ResponseCode::Ok
        );
        let stored = h.store.get(4).unwrap();
        assert_eq!(stored.len(), 96);

        let input = h.chain(&[(0x2100, 8), (0x2200, 96)]);
        let output = h.chain(&[(0x4000, 64)]);
        assert_eq!(
            h.command(READ_PUBLIC_KEY, 0, input, output, &[meta]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_bytes(0x4000, 64), stored[32..]);
    }

    #[test]
    fn test_read_public_rejects_raw() {
        let mut h = Harness::new(SecureElementConfig::default());
        let input = h.chain(&[(0x2100, 8), (0x2200, 32)]);
        let output = h.chain(&[(0x4000, 64)]);
        assert_eq!(
            h.command(READ_PUBLIC_KEY, 0, input, output, &[metadata(0, 0, 0, 32)]),
            ResponseCode::InvalidParameter
        );
    }

    #[test]
    fn test_diffie_hellman_agreement() {
        let mut h = Harness::new(SecureElementConfig::default());
        let meta = ecc_metadata(0, 0, true);
        let auth = h.chain(&[(0x2100, 8)]);
        let a = h.chain(&[(0x3000, 96)]);
        let b = h.chain(&[(0x3100, 96)]);
        assert_eq!(h.command(CREATE_KEY, 0, auth, a, &[meta]), ResponseCode::Ok);
        assert_eq!(h.command(CREATE_KEY, 0, auth, b, &[meta]), ResponseCode::Ok);

        let shared = metadata(0, 0, 0, 64);
        let input = h.chain(&[(0x2100, 8), (0x3000, 32), (0x3120, 64)]);
        let output = h.chain(&[(0x4000, 64)]);
        assert_eq!(
            h.command(DIFFIE_HELLMAN, 0, input, output, &[meta, shared]),
            ResponseCode::Ok
        );
        let input = h.chain(&[(0x2100, 8), (0x3100, 32), (0x3020, 64)]);
        let output = h.chain(&[(0x4100, 64)]);
        assert_eq!(
            h.command(DIFFIE_HELLMAN, 0, input, output, &[meta, shared]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_bytes(0x4000, 64), h.read_bytes(0x4100, 64));
        assert_ne!(h.read_bytes(0x4000, 64), vec![0; 64]);
    }

    #[test]
    fn test_diffie_hellman_errors() {
        let mut h = Harness::new(SecureElementConfig::default());
        let meta = ecc_metadata(0, 0, false);
        let input = h.chain(&[(0x2100, 8), (0x3000, 32), (0x3100, 64)]);
        let output = h.chain(&[(0x4000, 64)]);
        // derived key must be raw
        assert_eq!(
            h.command(DIFFIE_HELLMAN, 0, input, output, &[meta, metadata(8, 0, 0, 0)]),
            ResponseCode::InvalidParameter
        );
        assert_eq!(
            h.command(DIFFIE_HELLMAN, 0, input, output, &[meta]),
            ResponseCode::Abort
        );
    }
}
