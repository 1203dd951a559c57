/*++

Licensed under the Apache-2.0 license.

File Name:

    secure_element.rs

Abstract:

    File contains the secure element command processor. Commands arrive as
    words pushed into the TX FIFO of the mailbox; a completed message is
    decoded, dispatched to its handler and answered through the RX FIFO.

--*/

mod cipher;
mod dma;
mod error;
mod hash;
mod jpake;
mod key;
mod system;

pub use dma::{SeDescriptor, TransferOptions, NULL_DESCRIPTOR};
pub use error::SeError;
pub use key::{KeyMetadata, KeyMode, KeyRestriction, KeyType};

use crate::key_store::VolatileKeyStore;
use dma::DmaChain;
use smlang::statemachine;
use std::collections::VecDeque;
use symcrypto_emu_bus::{Bus, SharedBus};
use symcrypto_emu_crypto::HashEngine;
use symcrypto_emu_types::{emu_enum, RvAddr};

mod constants {
    #![allow(unused)]

    pub const DEFAULT_MAX_DESCRIPTORS: usize = 1024;

    /// Parameter words that fit in one message
    pub const MAX_PARAMS: usize = 13;

    /// Envelope words before the parameters: header, command, input, output
    pub const ENVELOPE_WORDS: u32 = 4;

    pub const HEADER_SIZE_MASK: u32 = 0xffff;
    pub const COMMAND_ID_SHIFT: u32 = 16;
    pub const COMMAND_OPTIONS_MASK: u32 = 0xffff;
}

emu_enum!(
    /// Status word returned for every command
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub ResponseCode;
    u32;
    {
        Ok = 0x0000_0000,
        InvalidCommand = 0x0001_0000,
        AuthorizationError = 0x0002_0000,
        InvalidSignature = 0x0003_0000,
        BusError = 0x0004_0000,
        InternalError = 0x0005_0000,
        CryptoError = 0x0006_0000,
        InvalidParameter = 0x0007_0000,
        SecureBootError = 0x0009_0000,
        SelfTestError = 0x000a_0000,
        NotInitialized = 0x000b_0000,
        MailboxInvalid = 0x00fe_0000,
        Abort = 0x00ff_0000,
    };
    Unknown
);

emu_enum!(
    /// Command identifier, high half of the command word
    #[derive(Debug, Copy, Clone, Eq, PartialEq)]
    pub CommandId;
    u32;
    {
        ImportKey = 0x0100,
        ExportKey = 0x0102,
        DeleteKey = 0x0105,
        TransferKey = 0x0106,
        InstallKey = 0x0107,
        CreateKey = 0x0200,
        ReadPublicKey = 0x0201,
        DeriveKey = 0x0202,
        Hash = 0x0300,
        HashUpdate = 0x0301,
        HashHmac = 0x0302,
        HashFinish = 0x0303,
        AesEncrypt = 0x0400,
        AesDecrypt = 0x0401,
        AesGcmEncrypt = 0x0402,
        AesGcmDecrypt = 0x0403,
        AesCmac = 0x0404,
        AesCcmEncrypt = 0x0405,
        AesCcmDecrypt = 0x0406,
        Random = 0x0700,
        JPakeRound1 = 0x0b00,
        JPakeRound2 = 0x0b01,
        JPakeGenerateSessionKey = 0x0b02,
        DiffieHellman = 0x0e00,
        ReadDeviceData = 0x4330,
        ConfigureQspiRefClock = 0xff15,
        FlashGetCodeRegionConfig = 0xff53,
        FlashEraseDataRegion = 0xff62,
        FlashWriteDataRegion = 0xff63,
        FlashGetDataRegionLocation = 0xff64,
    };
    Unknown
);

/// Flash layout reported and modified by the flash commands. All-zero
/// geometry makes those commands abort.
#[derive(Debug, Clone, Default)]
pub struct FlashGeometry {
    pub size: u32,
    pub page_size: u32,
    pub region_size: u32,
    pub code_region_start: u32,
    pub code_region_end: u32,
    pub data_region_start: u32,
}

#[derive(Debug, Clone)]
pub struct SecureElementConfig {
    /// Messages carry a command handle that is echoed in the response.
    pub series3: bool,
    pub flash: FlashGeometry,
    /// Longest DMA chain a command may walk.
    pub max_descriptors: usize,
}

impl Default for SecureElementConfig {
    fn default() -> Self {
        Self {
            series3: false,
            flash: FlashGeometry::default(),
            max_descriptors: constants::DEFAULT_MAX_DESCRIPTORS,
        }
    }
}

#[derive(PartialEq)]
/// Message header, total message size in bytes
pub struct MessageHeader(pub u32);

impl MessageHeader {
    fn word_count(&self) -> u32 {
        (self.0 & constants::HEADER_SIZE_MASK) / 4
    }
}

#[derive(PartialEq)]
/// Data In
pub struct DataIn(pub u32);

statemachine! {
    transitions: {
        // CurrentState Event [guard] / action = NextState

        // a header opens a message, also while a previous one is incomplete
        *Idle + Header(MessageHeader) [has_words] / begin = Accumulating,
        Accumulating + Header(MessageHeader) [has_words] / begin = Accumulating,

        Accumulating + Word(DataIn) / accumulate = Accumulating,

        // the last word completes the message
        Accumulating + LastWord(DataIn) / accumulate = Idle,
    }
}

/// State machine extended variables.
#[derive(Default)]
pub struct Context {
    /// Words of the message being received
    pub tx: VecDeque<u32>,
    /// Words still expected
    pub words_left: u32,
}

impl StateMachineContext for Context {
    // guards
    fn has_words(&mut self, header: &MessageHeader) -> Result<(), ()> {
        if header.word_count() > 0 {
            Ok(())
        } else {
            // no transition
            Err(())
        }
    }

    // actions
    fn begin(&mut self, header: &MessageHeader) {
        if !self.tx.is_empty() {
            tracing::warn!(words = self.tx.len(), "dropping incomplete message");
            self.tx.clear();
        }
        self.words_left = header.word_count();
    }

    fn accumulate(&mut self, word: &DataIn) {
        self.tx.push_back(word.0);
        self.words_left = self.words_left.saturating_sub(1);
    }
}

/// Decoded command envelope handed to a handler.
struct Request<'a> {
    memory: &'a mut dyn Bus,
    id: CommandId,
    options: u32,
    input: RvAddr,
    output: RvAddr,
    params: &'a [u32],
    max_descriptors: usize,
}

impl Request<'_> {
    /// Fail with `code` unless exactly `count` parameters were sent.
    fn expect_params(&self, count: usize, code: ResponseCode) -> Result<(), SeError> {
        if self.params.len() != count {
            tracing::error!(
                command = %self.id,
                expected = count,
                got = self.params.len(),
                "invalid parameter count"
            );
            Err(SeError::Response(code))?
        }
        Ok(())
    }

    fn inputs(&self) -> DmaChain {
        DmaChain::new(self.input, self.max_descriptors)
    }

    fn outputs(&self) -> DmaChain {
        DmaChain::new(self.output, self.max_descriptors)
    }
}

/// Secure element command processor
pub struct SecureElement {
    memory: SharedBus,
    key_store: VolatileKeyStore,
    config: SecureElementConfig,
    state_machine: StateMachine<Context>,
    rx: VecDeque<u32>,
    hash_session: Option<HashEngine>,
}

impl SecureElement {
    /// Create a new secure element
    ///
    /// # Arguments
    ///
    /// * `memory` - System address space holding descriptors and buffers
    /// * `key_store` - Volatile key slots
    /// * `config` - Protocol variant and flash layout
    pub fn new(memory: SharedBus, key_store: VolatileKeyStore, config: SecureElementConfig) -> Self {
        Self {
            memory,
            key_store,
            config,
            state_machine: StateMachine::new(Context::default()),
            rx: VecDeque::new(),
            hash_session: None,
        }
    }

    /// Start a message. The header is also its first word, so this returns
    /// true when a one-word message completed.
    pub fn write_header(&mut self, header: u32) -> bool {
        if self
            .state_machine
            .process_event(Events::Header(MessageHeader(header)))
            .is_err()
        {
            tracing::error!(header, "message header without words");
        }
        self.enqueue_word(header)
    }

    /// Push one message word. Returns true when the word completed a message
    /// and its response is ready.
    pub fn enqueue_word(&mut self, word: u32) -> bool {
        let event = if self.state_machine.context.words_left == 1 {
            Events::LastWord(DataIn(word))
        } else {
            Events::Word(DataIn(word))
        };
        if self.state_machine.process_event(event).is_err() {
            tracing::error!(word, "TX word with no message open");
            return false;
        }
        if !matches!(self.state_machine.state(), States::Idle) {
            return false;
        }
        self.process_command();
        true
    }

    pub fn dequeue_response(&mut self) -> Option<u32> {
        self.rx.pop_front()
    }

    /// Words of the message being received.
    pub fn tx_len(&self) -> usize {
        self.state_machine.context.tx.len()
    }

    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state_machine.state(), States::Idle)
    }

    pub fn reset(&mut self) {
        self.state_machine = StateMachine::new(Context::default());
        self.rx.clear();
        self.hash_session = None;
        self.key_store.reset();
    }

    fn process_command(&mut self) {
        let mut words = std::mem::take(&mut self.state_machine.context.tx).into_iter();
        let mut handle = 0;
        let code = match self.run_command(&mut words, &mut handle) {
            Ok(()) => ResponseCode::Ok,
            Err(err) => {
                tracing::info!(%err, "command failed");
                err.response_code()
            }
        };
        tracing::debug!(%code, "command response");
        self.rx.push_back(code as u32);
        if self.config.series3 {
            self.rx.push_back(handle);
        }
    }

    fn run_command(
        &mut self,
        words: &mut impl Iterator<Item = u32>,
        handle: &mut u32,
    ) -> Result<(), SeError> {
        let mut next = || {
            words.next().ok_or_else(|| {
                tracing::error!("message shorter than its envelope");
                SeError::Response(ResponseCode::InvalidParameter)
            })
        };

        let header = next()?;
        let word_count = MessageHeader(header).word_count();
        let mut envelope = constants::ENVELOPE_WORDS;
        if self.config.series3 {
            *handle = next()?;
            envelope += 1;
        }
        let command = next()?;
        let raw_id = command >> constants::COMMAND_ID_SHIFT;
        let id = CommandId::from(raw_id);
        let options = command & constants::COMMAND_OPTIONS_MASK;
        let input = next()?;
        let output = next()?;

        let param_count = word_count.saturating_sub(envelope) as usize;
        if param_count > constants::MAX_PARAMS {
            tracing::error!(param_count, "too many command parameters");
            Err(SeError::Response(ResponseCode::InvalidParameter))?
        }
        let params = (0..param_count)
            .map(|_| next())
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(%id, raw_id, options, params = params.len(), "secure element command");

        let memory = self.memory.clone();
        let mut memory = memory.borrow_mut();
        let mut req = Request {
            memory: &mut *memory,
            id,
            options,
            input,
            output,
            params: &params,
            max_descriptors: self.config.max_descriptors,
        };
        let store = &self.key_store;
        let flash = &self.config.flash;

        match id {
            CommandId::ImportKey => key::import_key(&mut req, store),
            CommandId::ExportKey => key::export_key(&mut req, store),
            CommandId::TransferKey => key::transfer_key(&mut req, store),
            CommandId::CreateKey => key::create_key(&mut req, store),
            CommandId::ReadPublicKey => key::read_public_key(&mut req, store),
            CommandId::DiffieHellman => key::diffie_hellman(&mut req, store),
            CommandId::Hash => hash::hash(&mut req),
            CommandId::HashUpdate => hash::update(&mut req, &mut self.hash_session, false),
            CommandId::HashFinish => hash::update(&mut req, &mut self.hash_session, true),
            CommandId::AesEncrypt => cipher::aes(&mut req, store, true),
            CommandId::AesDecrypt => cipher::aes(&mut req, store, false),
            CommandId::AesCmac => cipher::cmac(&mut req, store),
            CommandId::AesGcmEncrypt => cipher::gcm(&mut req, store, true),
            CommandId::AesGcmDecrypt => cipher::gcm(&mut req, store, false),
            CommandId::AesCcmEncrypt => cipher::ccm(&mut req, store, true),
            CommandId::AesCcmDecrypt => cipher::ccm(&mut req, store, false),
            CommandId::JPakeRound1 => jpake::round1(&mut req),
            CommandId::JPakeRound2 => jpake::round2(&mut req),
            CommandId::JPakeGenerateSessionKey => jpake::session_key(&mut req, store),
            CommandId::Random => system::random(&mut req),
            CommandId::ReadDeviceData => system::read_device_data(&mut req),
            CommandId::FlashEraseDataRegion => system::flash_erase(&mut req, flash),
            CommandId::FlashWriteDataRegion => system::flash_write(&mut req, flash),
            CommandId::FlashGetDataRegionLocation => system::flash_data_region(&mut req, flash),
            CommandId::FlashGetCodeRegionConfig => system::flash_code_region(&mut req, flash),
            CommandId::ConfigureQspiRefClock => system::configure_qspi(&mut req),
            _ => {
                tracing::error!(%id, raw_id, "command not handled");
                Err(SeError::Response(ResponseCode::InvalidCommand))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod harness {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use symcrypto_emu_bus::{MemoryAccess, Ram};

    const NODE_AREA: RvAddr = 0x100;
    const NODE_SIZE: RvAddr = 16;

    /// Secure element over a RAM, with helpers to lay out DMA chains and
    /// send complete messages.
    pub struct Harness {
        pub ram: Rc<RefCell<Ram>>,
        pub store: VolatileKeyStore,
        pub se: SecureElement,
        series3: bool,
        next_node: RvAddr,
        next_handle: u32,
    }

    impl Harness {
        pub fn new(config: SecureElementConfig) -> Self {
            let ram = Rc::new(RefCell::new(Ram::new(vec![0; 0x10000])));
            let store = VolatileKeyStore::new();
            let series3 = config.series3;
            let se = SecureElement::new(ram.clone(), store.clone(), config);
            Self {
                ram,
                store,
                se,
                series3,
                next_node: NODE_AREA,
                next_handle: 0x1000,
            }
        }

        pub fn write_bytes(&self, at: RvAddr, data: &[u8]) {
            self.ram.borrow_mut().write_bytes(at, data).unwrap();
        }

        pub fn read_bytes(&self, at: RvAddr, len: usize) -> Vec<u8> {
            self.ram.borrow_mut().read_bytes(at, len).unwrap()
        }

        pub fn read_word(&self, at: RvAddr) -> u32 {
            self.ram.borrow_mut().read_word(at).unwrap()
        }

        /// Lay out a chain of `(data address, size word)` nodes and return
        /// its head, or the null descriptor when empty.
        pub fn chain(&mut self, nodes: &[(RvAddr, u32)]) -> RvAddr {
            if nodes.is_empty() {
                return NULL_DESCRIPTOR;
            }
            let head = self.next_node;
            self.next_node += NODE_SIZE * nodes.len() as u32;
            let mut ram = self.ram.borrow_mut();
            for (i, (data, size)) in nodes.iter().enumerate() {
                let at = head + NODE_SIZE * i as u32;
                let next = if i + 1 == nodes.len() {
                    NULL_DESCRIPTOR
                } else {
                    at + NODE_SIZE
                };
                for (j, word) in [*data, next, *size].iter().enumerate() {
                    ram.write_word(at + 4 * j as u32, *word).unwrap();
                }
            }
            head
        }

        /// Message words of a command, header first.
        pub fn message(
            &mut self,
            id: u32,
            options: u32,
            input: RvAddr,
            output: RvAddr,
            params: &[u32],
        ) -> Vec<u32> {
            let mut words = vec![0];
            if self.series3 {
                self.next_handle += 1;
                words.push(self.next_handle);
            }
            words.extend([(id << 16) | options, input, output]);
            words.extend(params);
            words[0] = 4 * words.len() as u32;
            words
        }

        /// Send a command and return its response code.
        pub fn command(
            &mut self,
            id: u32,
            options: u32,
            input: RvAddr,
            output: RvAddr,
            params: &[u32],
        ) -> ResponseCode {
            let words = self.message(id, options, input, output, params);
            let mut done = self.se.write_header(words[0]);
            for word in &words[1..] {
                assert!(!done);
                done = self.se.enqueue_word(*word);
            }
            assert!(done);
            let code = ResponseCode::from(self.se.dequeue_response().unwrap());
            if self.series3 {
                assert_eq!(self.se.dequeue_response(), Some(words[1]));
            }
            assert_eq!(self.se.rx_len(), 0);
            code
        }
    }
}

#[cfg(test)]
mod tests {
    use super::harness::Harness;
    use super::*;

    #[test]
    fn test_unknown_command() {
        let mut h = Harness::new(SecureElementConfig::default());
        assert_eq!(
            h.command(0x1234, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[]),
            ResponseCode::InvalidCommand
        );
    }

    #[test]
    fn test_unhandled_known_commands() {
        let mut h = Harness::new(SecureElementConfig::default());
        for id in [CommandId::DeleteKey, CommandId::HashHmac, CommandId::DeriveKey] {
            assert_eq!(
                h.command(id.value().unwrap(), 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[]),
                ResponseCode::InvalidCommand
            );
        }
    }

    #[test]
    fn test_series3_handle_echo() {
        let mut h = Harness::new(SecureElementConfig {
            series3: true,
            ..Default::default()
        });
        let words = h.message(0x1234, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[]);
        assert_eq!(words.len(), 5);
        assert!(!h.se.write_header(words[0]));
        for word in &words[1..4] {
            assert!(!h.se.enqueue_word(*word));
        }
        assert!(h.se.enqueue_word(words[4]));
        assert_eq!(
            h.se.dequeue_response(),
            Some(ResponseCode::InvalidCommand as u32)
        );
        assert_eq!(h.se.dequeue_response(), Some(words[1]));
        assert_eq!(h.se.dequeue_response(), None);
    }

    #[test]
    fn test_word_without_message() {
        let mut h = Harness::new(SecureElementConfig::default());
        assert!(!h.se.enqueue_word(0x55));
        assert_eq!(h.se.tx_len(), 0);
        assert!(h.se.is_idle());
        assert_eq!(h.se.rx_len(), 0);
    }

    #[test]
    fn test_empty_header_rejected() {
        let mut h = Harness::new(SecureElementConfig::default());
        assert!(!h.se.write_header(0));
        assert!(h.se.is_idle());
        assert_eq!(h.se.rx_len(), 0);
    }

    #[test]
    fn test_new_header_restarts_message() {
        let mut h = Harness::new(SecureElementConfig::default());
        assert!(!h.se.write_header(0x14));
        assert!(!h.se.enqueue_word(0x1234_0000));
        assert_eq!(h.se.tx_len(), 2);

        assert_eq!(
            h.command(0x1234, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[]),
            ResponseCode::InvalidCommand
        );
    }

    #[test]
    fn test_short_envelope() {
        let mut h = Harness::new(SecureElementConfig::default());
        // header and command word only
        assert!(!h.se.write_header(8));
        assert!(h.se.enqueue_word(0x1234_0000));
        assert_eq!(
            h.se.dequeue_response(),
            Some(ResponseCode::InvalidParameter as u32)
        );
    }

    #[test]
    fn test_volatile_import_export() {
        let mut h = Harness::new(SecureElementConfig::default());
        let key: Vec<u8> = (0..32).collect();
        h.write_bytes(0x2000, &key);

        let metadata = (1 << 26) | (5 << 16);
        let input = h.chain(&[(0x2000, 32), (0x2100, 8)]);
        assert_eq!(
            h.command(0x0100, 0, input, NULL_DESCRIPTOR, &[metadata]),
            ResponseCode::Ok
        );
        assert_eq!(h.store.get(5), Some(key.clone()));

        let output = h.chain(&[(0x3000, 32)]);
        assert_eq!(
            h.command(0x0102, 0, NULL_DESCRIPTOR, output, &[metadata]),
            ResponseCode::Ok
        );
        assert_eq!(h.read_bytes(0x3000, 32), key);
    }

    #[test]
    fn test_null_descriptor_aborts() {
        let mut h = Harness::new(SecureElementConfig::default());
        let metadata = (1 << 26) | (5 << 16);
        assert_eq!(
            h.command(0x0100, 0, NULL_DESCRIPTOR, NULL_DESCRIPTOR, &[metadata]),
            ResponseCode::Abort
        );
    }

    #[test]
    fn test_reset() {
        let mut h = Harness::new(SecureElementConfig::default());
        h.store.insert(5, vec![1; 16]);
        assert!(!h.se.write_header(0x10));
        h.se.reset();
        assert!(h.se.is_idle());
        assert_eq!(h.se.tx_len(), 0);
        assert!(!h.store.contains(5));
        assert!(h.store.contains(crate::key_store::DEVICE_KEY_SLOT));
    }
}
