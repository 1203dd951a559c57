/*++

Licensed under the Apache-2.0 license.

File Name:

    aes_engine.rs

Abstract:

    File contains the AES engine of the SYMCRYPTO accelerator. The fetcher
    list is classified into parameter and data nodes, then dispatched on
    the mode carried by the config word.

--*/

use super::descriptor::{AesParameter, DataType, Descriptor, TagRole};
use super::error::EngineError;
use crate::key_store::VolatileKeyStore;
use bitfield::bitfield;
use symcrypto_emu_bus::Bus;
use symcrypto_emu_crypto::{Aes, AesBlockMode, AesCcm, AesCmac, AesGcm, AES_GCM_IV_SIZE};
use symcrypto_emu_types::emu_enum;

emu_enum!(
    /// AES mode of operation, bits 16:8 of the config word
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub AesMode;
    u32;
    {
        Ecb = 0x001,
        Cbc = 0x002,
        Ctr = 0x004,
        Cfb = 0x008,
        Ofb = 0x010,
        Ccm = 0x020,
        GcmGmac = 0x040,
        Xts = 0x080,
        Cmac = 0x100,
    };
    Invalid
);

bitfield! {
    /// First word of the config node
    #[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
    pub struct AesConfig(u32);

    pub decrypt, _: 0;
    pub cx_load, _: 4;
    cx_save_bit, _: 5;
    u32, key_sel_lo, _: 7, 6;
    pub u32, mode_code, _: 16, 8;
    u32, key_sel_hi, _: 31, 28;
}

impl AesConfig {
    fn from_bytes(data: &[u8]) -> Result<Self, EngineError> {
        let word: [u8; 4] = data
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(EngineError::LengthMismatch {
                what: "config",
                expected: 4,
                actual: data.len(),
            })?;
        Ok(Self(u32::from_le_bytes(word)))
    }

    pub fn mode(&self) -> AesMode {
        AesMode::from(self.mode_code())
    }

    /// Context save request. With `reads_cx_load_bit` the bit is taken from
    /// the context load position, as some firmware expects.
    pub fn cx_save(&self, reads_cx_load_bit: bool) -> bool {
        if reads_cx_load_bit {
            self.cx_load()
        } else {
            self.cx_save_bit()
        }
    }

    /// Key slot selector, 1-based.
    pub fn key_sel(&self) -> u32 {
        self.key_sel_lo() | (self.key_sel_hi() << 2)
    }
}

/// Fetcher nodes sorted by role.
#[derive(Default)]
struct AesRequest<'a> {
    config: Option<&'a Descriptor>,
    key: Option<&'a Descriptor>,
    iv: Option<&'a Descriptor>,
    mask: Option<&'a Descriptor>,
    headers: Vec<&'a Descriptor>,
    payloads: Vec<&'a Descriptor>,
}

impl<'a> AesRequest<'a> {
    fn classify(fetcher: &'a [Descriptor]) -> Result<Self, EngineError> {
        let mut request = Self::default();
        for node in fetcher {
            match node.role() {
                TagRole::Data {
                    data_type: DataType::Header,
                    ..
                } => request.headers.push(node),
                TagRole::Data {
                    data_type: DataType::Payload,
                    ..
                } => request.payloads.push(node),
                TagRole::Data { data_type, .. } => {
                    tracing::trace!(?data_type, node = node.address, "data node ignored");
                }
                TagRole::Config { offset } => match AesParameter::from(offset) {
                    AesParameter::Config => request.config = Some(node),
                    AesParameter::Key => request.key = Some(node),
                    AesParameter::Iv => request.iv = Some(node),
                    AesParameter::Mask => request.mask = Some(node),
                    AesParameter::Iv2 | AesParameter::Key2 => {
                        tracing::trace!(offset, node = node.address, "parameter node ignored");
                    }
                    AesParameter::Unknown => {
                        tracing::error!(offset, "unknown AES parameter offset");
                        Err(EngineError::UnknownParameterOffset(offset))?
                    }
                },
            }
        }
        Ok(request)
    }
}

/// Execution context of one AES operation.
pub struct AesEngine<'a> {
    pub memory: &'a mut dyn Bus,
    pub key_store: &'a VolatileKeyStore,
    pub cx_save_reads_cx_load_bit: bool,
}

impl AesEngine<'_> {
    /// Run the operation described by `fetcher`, writing results through
    /// `pusher`.
    #[tracing::instrument(skip_all, fields(nodes = fetcher.len()))]
    pub fn run(&mut self, fetcher: &[Descriptor], pusher: &[Descriptor]) -> Result<(), EngineError> {
        let request = AesRequest::classify(fetcher)?;

        // Key schedule and reseed requests carry a mask node and no work
        if request.mask.is_some() && (request.config.is_none() || request.payloads.is_empty()) {
            tracing::debug!("mask request acknowledged");
            return Ok(());
        }

        let config = request
            .config
            .ok_or(EngineError::MissingDescriptor("config"))?;
        let config = AesConfig::from_bytes(&config.data)?;
        let payload = *request
            .payloads
            .first()
            .ok_or(EngineError::MissingDescriptor("payload"))?;

        let key = match request.key {
            Some(node) => node.data.clone(),
            None => {
                let slot = config.key_sel().wrapping_sub(1);
                self.key_store
                    .get(slot)
                    .ok_or(EngineError::KeyNotFound(slot))?
            }
        };

        let mode = config.mode();
        tracing::debug!(
            %mode,
            decrypt = config.decrypt(),
            cx_load = config.cx_load(),
            key_sel = config.key_sel(),
            "AES request"
        );

        match mode {
            AesMode::Ecb | AesMode::Ctr => self.block_mode(&config, &key, &request, payload, pusher),
            AesMode::Cmac => {
                let mac = AesCmac::mac(&key, &payload.data)?;
                first(pusher, "output")?.push(self.memory, &mac)?;
                Ok(())
            }
            AesMode::GcmGmac => self.gcm(&config, &key, &request, fetcher, pusher),
            AesMode::Ccm => self.ccm(&config, &key, &request, pusher),
            _ => {
                tracing::error!(code = config.mode_code(), "unsupported AES mode");
                Err(EngineError::UnsupportedAesMode(config.mode_code()))
            }
        }
    }

    fn block_mode(
        &mut self,
        config: &AesConfig,
        key: &[u8],
        request: &AesRequest,
        payload: &Descriptor,
        pusher: &[Descriptor],
    ) -> Result<(), EngineError> {
        let output = first(pusher, "output")?;
        if payload.len() > output.len() {
            Err(EngineError::LengthMismatch {
                what: "output",
                expected: payload.len(),
                actual: output.len(),
            })?
        }

        let (block_mode, iv) = if config.mode() == AesMode::Ctr {
            let iv = request.iv.ok_or(EngineError::MissingDescriptor("iv"))?;
            (AesBlockMode::Ctr, iv.data.as_slice())
        } else {
            (AesBlockMode::Ecb, &[][..])
        };

        let mut text = if config.decrypt() {
            Aes::decrypt(block_mode, key, iv, &payload.data)?
        } else {
            Aes::encrypt(block_mode, key, iv, &payload.data)?
        };
        text.resize(output.len(), 0);
        output.push(self.memory, &text)?;

        if block_mode == AesBlockMode::Ctr && config.cx_save(self.cx_save_reads_cx_load_bit) {
            // Placeholder counter: every IV byte plus one
            let context = pusher
                .get(1)
                .ok_or(EngineError::MissingDescriptor("context"))?;
            let next_iv: Vec<u8> = iv
                .iter()
                .take(context.len())
                .map(|b| b.wrapping_add(1))
                .collect();
            context.push(self.memory, &next_iv)?;
        }
        Ok(())
    }

    fn gcm(
        &mut self,
        config: &AesConfig,
        key: &[u8],
        request: &AesRequest,
        fetcher: &[Descriptor],
        pusher: &[Descriptor],
    ) -> Result<(), EngineError> {
        // The last fetcher node carries len(A) || len(C) in bits
        let lengths = fetcher
            .last()
            .filter(|node| {
                matches!(
                    node.role(),
                    TagRole::Data {
                        data_type: DataType::Payload,
                        ..
                    }
                ) && node.data.len() == 16
            })
            .ok_or(EngineError::MissingDescriptor("len(A) || len(C)"))?;
        let bits = |range: std::ops::Range<usize>| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&lengths.data[range]);
            (u64::from_be_bytes(word) / 8) as usize
        };
        let aad_len = bits(0..8);
        let payload_len = bits(8..16);

        let aad = match request.headers.first() {
            Some(header) => {
                check_len("AAD", aad_len, header.len().saturating_sub(header.invalid_bytes()))?;
                &header.data[..aad_len]
            }
            None if aad_len == 0 => &[][..],
            None => Err(EngineError::MissingDescriptor("header"))?,
        };

        let payload = match request
            .payloads
            .iter()
            .find(|node| node.address != lengths.address)
        {
            Some(node) => {
                check_len(
                    "payload",
                    payload_len,
                    node.len().saturating_sub(node.invalid_bytes()),
                )?;
                &node.data[..payload_len]
            }
            None if payload_len == 0 => &[][..],
            None => Err(EngineError::MissingDescriptor("payload"))?,
        };

        let iv = request.iv.ok_or(EngineError::MissingDescriptor("iv"))?;
        let nonce = iv.data.get(..AES_GCM_IV_SIZE).ok_or(EngineError::LengthMismatch {
            what: "iv",
            expected: AES_GCM_IV_SIZE,
            actual: iv.data.len(),
        })?;

        // The tag is returned to software unverified
        let (text, tag) = if config.decrypt() {
            AesGcm::decrypt_unverified(key, nonce, aad, payload)?
        } else {
            AesGcm::encrypt(key, nonce, aad, payload)?
        };
        tracing::trace!(aad_len, payload_len, "GCM done");

        // Pusher 0 takes the AAD pass-through
        let mut outputs = pusher.iter().skip(1);
        if payload_len > 0 {
            let output = outputs
                .next()
                .ok_or(EngineError::MissingDescriptor("output"))?;
            check_len("output", payload_len, output.len())?;
            output.push(self.memory, &text)?;
        }
        let tag_node = outputs
            .find(|node| !node.discard())
            .ok_or(EngineError::MissingDescriptor("tag"))?;
        tag_node.push(self.memory, &tag)?;
        Ok(())
    }

    fn ccm(
        &mut self,
        config: &AesConfig,
        key: &[u8],
        request: &AesRequest,
        pusher: &[Descriptor],
    ) -> Result<(), EngineError> {
        if request.headers.is_empty() {
            tracing::error!("CCM request without header");
            return Ok(());
        }

        let header = concat(&request.headers);
        if header.len() < 16 {
            Err(EngineError::LengthMismatch {
                what: "CCM header",
                expected: 16,
                actual: header.len(),
            })?
        }

        // B0: flags, nonce, message length
        let flags = header[0];
        let has_aad = flags & (1 << 6) != 0;
        let length_size = usize::from(flags & 0x7) + 1;
        let nonce = &header[1..16 - length_size];
        let tag_len = usize::from((flags >> 3) & 0x7) * 2 + 2;

        let aad = if has_aad && header.len() >= 18 {
            let aad_len = usize::from(u16::from_be_bytes([header[16], header[17]]));
            &header[18..header.len().min(18 + aad_len)]
        } else {
            &[][..]
        };
        tracing::trace!(nonce_len = nonce.len(), tag_len, aad_len = aad.len(), "CCM header");

        let payload = concat(&request.payloads);
        let output = if config.decrypt() {
            let split = payload
                .len()
                .checked_sub(tag_len)
                .ok_or(EngineError::LengthMismatch {
                    what: "CCM payload",
                    expected: tag_len,
                    actual: payload.len(),
                })?;
            let (text, tag) = AesCcm::decrypt_unverified(key, nonce, aad, &payload[..split], tag_len)?;
            if tag != payload[split..] {
                tracing::debug!("CCM tag differs, returned to software");
            }
            [text, tag].concat()
        } else {
            let (text, tag) = AesCcm::encrypt(key, nonce, aad, &payload, tag_len)?;
            [text, tag].concat()
        };

        let mut rest = output.as_slice();
        let mut outputs = pusher.iter().filter(|node| !node.discard());
        while !rest.is_empty() {
            let node = outputs
                .next()
                .ok_or(EngineError::MissingDescriptor("output"))?;
            let n = rest.len().min(node.len());
            node.push(self.memory, &rest[..n])?;
            rest = &rest[n..];
        }
        Ok(())
    }
}

fn first<'a>(pusher: &'a [Descriptor], what: &'static str) -> Result<&'a Descriptor, EngineError> {
    pusher.first().ok_or(EngineError::MissingDescriptor(what))
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<(), EngineError> {
    if expected != actual {
        tracing::error!(what, expected, actual, "length mismatch");
        Err(EngineError::LengthMismatch {
            what,
            expected,
            actual,
        })?
    }
    Ok(())
}

fn concat(nodes: &[&Descriptor]) -> Vec<u8> {
    nodes.iter().flat_map(|node| node.valid_data()).copied().collect()
}
