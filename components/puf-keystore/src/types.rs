use core::convert::TryFrom;
use core::fmt;

use heapless::Vec;

use crate::config::*;
use crate::error::{Error, Result};

/// Key code size the PUF produces for a key of `key_size` bytes.
///
/// Keys up to 256 bits all take the minimum 52 byte code; larger keys grow
/// in 8 byte steps on top of the 20 byte header and tag.
pub const fn key_code_size(key_size: usize) -> usize {
    if key_size < 32 {
        MIN_KEY_CODE_SIZE
    } else {
        20 + ((key_size + 7) / 8) * 8
    }
}

/// True if the memory holds nothing but erased or cleared bytes.
pub fn is_empty_mem(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0x00) || bytes.iter().all(|b| *b == 0xFF)
}

/// Plaintext key as reconstructed by the PUF.
pub type Key = Vec<u8, MAX_KEY_SIZE>;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyType {
    User = 0,
    Intrinsic = 1,
}

impl KeyType {
    pub fn name(self) -> &'static str {
        match self {
            KeyType::User => "user",
            KeyType::Intrinsic => "intrinsic",
        }
    }
}

impl TryFrom<u8> for KeyType {
    type Error = HeaderError;

    fn try_from(value: u8) -> core::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(KeyType::User),
            1 => Ok(KeyType::Intrinsic),
            _ => Err(HeaderError::InvalidType),
        }
    }
}

/// PUF key index, 0..=15.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyIndex(u8);

impl KeyIndex {
    pub fn new(index: u32) -> Result<Self> {
        if index < NUM_KEY_INDICES as u32 {
            Ok(KeyIndex(index as u8))
        } else {
            Err(Error::InvalidInput)
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Index 0 keys never leave the PUF as plaintext.
    pub fn routes_to_bus(self) -> bool {
        self.0 == 0
    }
}

/// Key size class as stored in byte 3 of a key code.
///
/// Code 0 stands for 4096 bits, code n for n * 64 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeySize(u8);

impl KeySize {
    pub const MAX: KeySize = KeySize(0);

    /// Size as typed by the operator: 1..=64 (and 0) in units of 64 bits.
    pub fn from_operator(value: u32) -> Result<Self> {
        if value > 64 {
            return Err(Error::InvalidInput);
        }
        Ok(KeySize((value & 0x3f) as u8))
    }

    pub fn from_code(code: u8) -> core::result::Result<Self, HeaderError> {
        if code < 64 {
            Ok(KeySize(code))
        } else {
            Err(HeaderError::InvalidSize)
        }
    }

    /// Inverse of `bytes`; `None` unless `bytes` is a multiple of 8 in 8..=512.
    pub fn from_bytes(bytes: usize) -> Option<Self> {
        if bytes < MIN_KEY_SIZE || bytes > MAX_KEY_SIZE || bytes % 8 != 0 {
            return None;
        }
        Some(KeySize(((bytes / 8) & 0x3f) as u8))
    }

    pub fn code(self) -> u8 {
        self.0
    }

    pub fn bytes(self) -> usize {
        match self.0 {
            0 => MAX_KEY_SIZE,
            n => 8 * n as usize,
        }
    }

    pub fn bits(self) -> usize {
        8 * self.bytes()
    }

    pub fn key_code_size(self) -> usize {
        key_code_size(self.bytes())
    }
}

/// Hardware key consumers reachable over the PUF key bus.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyDestination {
    Aes = 0,
    Prince1 = 1,
    Prince2 = 2,
    Prince3 = 3,
}

impl KeyDestination {
    pub fn name(self) -> &'static str {
        match self {
            KeyDestination::Aes => "AES",
            KeyDestination::Prince1 => "Prince 1",
            KeyDestination::Prince2 => "Prince 2",
            KeyDestination::Prince3 => "Prince 3",
        }
    }
}

impl TryFrom<u8> for KeyDestination {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(KeyDestination::Aes),
            1 => Ok(KeyDestination::Prince1),
            2 => Ok(KeyDestination::Prince2),
            3 => Ok(KeyDestination::Prince3),
            _ => Err(Error::InvalidInput),
        }
    }
}

/// Which header field of a key code is out of range.
///
/// The discriminants are the status codes reported to the operator.
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HeaderError {
    InvalidType = 1,
    InvalidIndex = 2,
    InvalidSize = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyCodeHeader {
    pub key_type: KeyType,
    pub index: KeyIndex,
    pub size: KeySize,
}

impl KeyCodeHeader {
    /// Checks type, index and size, in that order.
    pub fn parse(key_code: &[u8]) -> core::result::Result<Self, HeaderError> {
        let field = |i: usize| key_code.get(i).copied().unwrap_or(0xff);

        let key_type = KeyType::try_from(field(0))?;
        if field(1) >= NUM_KEY_INDICES {
            return Err(HeaderError::InvalidIndex);
        }
        let index = KeyIndex(field(1));
        let size = KeySize::from_code(field(3))?;

        Ok(KeyCodeHeader { key_type, index, size })
    }

    pub fn to_bytes(&self) -> [u8; KEY_CODE_HEADER_SIZE] {
        [self.key_type as u8, self.index.value(), 0, self.size.code()]
    }
}

/// Status code of a key code header: 0 when valid, else the `HeaderError` code.
pub fn key_code_check(key_code: &[u8]) -> u32 {
    match KeyCodeHeader::parse(key_code) {
        Ok(_) => 0,
        Err(error) => error as u32,
    }
}

/// What the reconstruction path works with.
///
/// With a corrupt header the raw type and index are kept for display and
/// the key size falls back to the maximum, so the reconstruction buffer is
/// never undersized.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyCodeInfo {
    pub key_type: u8,
    pub index: u8,
    pub key_size: usize,
    pub check: core::result::Result<(), HeaderError>,
}

impl KeyCodeInfo {
    pub fn of(key_code: &[u8]) -> Self {
        let raw = |i: usize| key_code.get(i).copied().unwrap_or(0xff);
        match KeyCodeHeader::parse(key_code) {
            Ok(header) => KeyCodeInfo {
                key_type: header.key_type as u8,
                index: header.index.value(),
                key_size: header.size.bytes(),
                check: Ok(()),
            },
            Err(error) => KeyCodeInfo {
                key_type: raw(0),
                index: raw(1),
                key_size: MAX_KEY_SIZE,
                check: Err(error),
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        if self.key_type == KeyType::User as u8 { "user" } else { "intrinsic" }
    }

    pub fn routes_to_bus(&self) -> bool {
        self.index == 0
    }

    pub fn key_code_size(&self) -> usize {
        key_code_size(self.key_size)
    }
}

/// Device specific output of PUF enroll.
#[derive(Clone, PartialEq, Eq)]
pub struct ActivationCode([u8; ACTIVATION_CODE_SIZE]);

impl ActivationCode {
    pub const fn new(bytes: [u8; ACTIVATION_CODE_SIZE]) -> Self {
        ActivationCode(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ACTIVATION_CODE_SIZE {
            return Err(Error::InvalidInput);
        }
        let mut ac = [0u8; ACTIVATION_CODE_SIZE];
        ac.copy_from_slice(bytes);
        Ok(ActivationCode(ac))
    }

    pub fn as_bytes(&self) -> &[u8; ACTIVATION_CODE_SIZE] {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        is_empty_mem(&self.0)
    }
}

impl fmt::Debug for ActivationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActivationCode(")?;
        for byte in &self.0[..8] {
            write!(f, "{:02X}", byte)?;
        }
        write!(f, "..)")
    }
}

/// Wrapped key, as produced by the PUF set-key commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyCode(Vec<u8, MAX_KEY_CODE_SIZE>);

impl KeyCode {
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < KEY_CODE_HEADER_SIZE {
            return Err(Error::InvalidInput);
        }
        Vec::from_slice(bytes).map(KeyCode).map_err(|_| Error::InvalidInput)
    }

    /// Key code stored in a fixed size slot; the header says how much of the
    /// slot is in use. A corrupt header yields the whole slot.
    pub fn from_slot(slot: &[u8]) -> Result<Self> {
        let len = match KeyCodeHeader::parse(slot) {
            Ok(header) => header.size.key_code_size().min(slot.len()),
            Err(_) => slot.len(),
        };
        Self::from_slice(&slot[..len])
    }

    pub fn header(&self) -> core::result::Result<KeyCodeHeader, HeaderError> {
        KeyCodeHeader::parse(&self.0)
    }

    pub fn info(&self) -> KeyCodeInfo {
        KeyCodeInfo::of(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Where the key wrapped by a new key code comes from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeySource<'a> {
    /// Operator supplied; padded with spaces or cut to the key size.
    User(&'a [u8]),
    /// Generated inside the PUF.
    Intrinsic,
}
