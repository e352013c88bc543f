//! Hashcrypt AES engine collaborator, ECB only.

use generic_array::{typenum::U16, GenericArray};
use heapless::Vec;

pub type Block = GenericArray<u8, U16>;

/// AES key, either delivered over the PUF key bus or handed in by software.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Puf,
    User(Vec<u8, 32>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Key length is not 128, 192 or 256 bits
    KeySize,
    /// Secret key requested but nothing was delivered to the AES slot
    NoKey,
}

pub trait AesEngine {
    fn set_key(&mut self, key: Key) -> core::result::Result<(), Error>;

    fn encrypt_block(&mut self, block: &mut Block);

    fn decrypt_block(&mut self, block: &mut Block);
}
