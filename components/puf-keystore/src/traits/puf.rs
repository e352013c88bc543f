//! PUF collaborator.
//!
//! Once a PUF is started, you can generate or derive keys.
//! Check NXP AN12324 for the best explanation.
//! 1. Enroll once per device. This outputs the Activation Code (AC), which has
//!    to be kept in non-volatile memory and fed back on every start.
//! 2. With a started PUF, generate a key using `set_intrinsic_key` or
//!    `set_user_key`. Both output a Key Code (KC), which is used to derive the
//!    key later. They differ in that `set_user_key` wraps an operator supplied
//!    key and `set_intrinsic_key` lets the PUF pick it.
//! 3. The KC starts with a fixed 4-byte header with information on key type,
//!    index and size.
//! 4. Derive the real key with `get_key` (index 1..=15, key is returned) or
//!    `get_hw_key` (index 0, key goes to the AES or PRINCE IP via the secure
//!    key bus).

use crate::config::ACTIVATION_CODE_SIZE;
use crate::types::{KeyDestination, KeyIndex};

/// PUF error
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// PUF Command could not start
    CommandFailedToStart,
    /// PUF Command could not complete
    CommandFailed,
    /// PUF Command is not allowed
    NotAllowed,
}

pub type Result<T> = core::result::Result<T, Error>;

/// The ALLOW register: which commands the PUF accepts right now.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Allow {
    pub enroll: bool,
    pub start: bool,
    pub set_key: bool,
    pub get_key: bool,
}

/// The STAT register after the last command.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub busy: bool,
    pub success: bool,
    pub error: bool,
}

pub trait Puf {
    /// Power up the PUF SRAM and wait until the block is ready.
    fn init(&mut self) -> Result<()>;

    /// Power down; the PUF needs a full power cycle before the next start.
    fn deinit(&mut self);

    /// Writes the device AC. Enroll should occur once per device.
    fn enroll(&mut self, activation_code: &mut [u8; ACTIVATION_CODE_SIZE]) -> Result<()>;

    fn start(&mut self, activation_code: &[u8; ACTIVATION_CODE_SIZE]) -> Result<()>;

    // key_code must be at least `key_code_size(key.len())` long
    fn set_user_key(&mut self, index: KeyIndex, key: &[u8], key_code: &mut [u8]) -> Result<()>;

    fn set_intrinsic_key(&mut self, index: KeyIndex, key_size: usize, key_code: &mut [u8]) -> Result<()>;

    /// Reconstructs the key of an index 1..=15 key code into `key`, returns its length.
    fn get_key(&mut self, key_code: &[u8], key: &mut [u8]) -> Result<usize>;

    /// Reconstructs an index 0 key code straight into a hardware key slot.
    /// `mask` seeds the masking of the key on the bus.
    fn get_hw_key(&mut self, key_code: &[u8], destination: KeyDestination, mask: u32) -> Result<()>;

    /// Disables enroll until the next reset.
    fn block_enroll(&mut self);

    /// Disables key generation until the next reset.
    fn block_set_key(&mut self);

    /// Wipes the PUF SRAM and locks the block until it is power cycled.
    fn zeroize(&mut self) -> Result<()>;

    fn allowed(&self) -> Allow;

    fn status(&self) -> Status;
}
