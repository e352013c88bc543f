//! Activation code and key code storage.
//!
//! Three mediums:
//! - RAM: one AC and `NUM_OF_KEYS` key codes, lost on reset,
//! - internal flash: the same layout as one record at `FLASHSTORE_BASE`,
//! - the factory key store: read-only.
//!
//! Flash can only turn bits from 1 to 0 without an erase, so every update
//! reads the whole record into a mirror, erases the region, patches the
//! mirror and programs the whole region again, verifying both steps.

use aligned::{Aligned, A16};

use crate::config::*;
use crate::error::{Error, Result};
use crate::traits::{
    flash::Flash,
    keystore::{FactoryKeyCode, FactoryKeystore},
};
use crate::types::{is_empty_mem, ActivationCode, KeyCode};

const AC_OFFSET: usize = 0;
const KC_OFFSET: usize = AC_OFFSET + ACTIVATION_CODE_SIZE;
const RECORD_SIZE: usize = KC_OFFSET + NUM_OF_KEYS * MAX_KEY_CODE_SIZE;

const _: () = assert!(RECORD_SIZE <= FLASHSTORE_LEN);
const _: () = assert!(FLASHSTORE_BASE % FLASH_PAGE_SIZE == 0 && FLASHSTORE_LEN % FLASH_PAGE_SIZE == 0);
const _: () = assert!(FLASH_PAGE_SIZE % FLASH_READ_SIZE == 0);

type Mirror = Aligned<A16, [u8; FLASHSTORE_LEN]>;

/// Where an activation code lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcLocation {
    Ram,
    Flash,
    Factory,
}

/// Where a key code lives.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyCodeSlot {
    Ram(usize),
    Flash(usize),
    Factory(FactoryKeyCode),
}

struct PufData {
    activation_code: [u8; ACTIVATION_CODE_SIZE],
    key_codes: [[u8; MAX_KEY_CODE_SIZE]; NUM_OF_KEYS],
}

impl PufData {
    const fn new() -> Self {
        PufData {
            activation_code: [0u8; ACTIVATION_CODE_SIZE],
            key_codes: [[0u8; MAX_KEY_CODE_SIZE]; NUM_OF_KEYS],
        }
    }
}

pub struct KeyCodeStore<F, K> {
    ram: PufData,
    flash: F,
    keystore: K,
}

fn key_code_offset(index: usize) -> Result<usize> {
    if index < NUM_OF_KEYS {
        Ok(KC_OFFSET + index * MAX_KEY_CODE_SIZE)
    } else {
        Err(Error::InvalidInput)
    }
}

// zero padded copy of a key code, so a shorter code never inherits stale bytes
fn slot_bytes(key_code: &KeyCode) -> [u8; MAX_KEY_CODE_SIZE] {
    let mut slot = [0u8; MAX_KEY_CODE_SIZE];
    slot[..key_code.len()].copy_from_slice(key_code.as_bytes());
    slot
}

impl<F: Flash, K: FactoryKeystore> KeyCodeStore<F, K> {
    pub fn new(flash: F, keystore: K) -> Self {
        KeyCodeStore { ram: PufData::new(), flash, keystore }
    }

    /// Program an all-zero record if the record region is still erased.
    ///
    /// Returns whether formatting happened. An existing record is left alone.
    pub fn format(&mut self) -> Result<bool> {
        if self.flash.verify_erase(FLASHSTORE_BASE, FLASHSTORE_LEN).is_err() {
            return Ok(false);
        }
        info!("PUF record at 0x{:X} is blank, formatting", FLASHSTORE_BASE);
        let mirror: Mirror = Aligned([0u8; FLASHSTORE_LEN]);
        let record: &[u8; FLASHSTORE_LEN] = &mirror;
        self.flash.write(FLASHSTORE_BASE, record)?;
        self.flash.verify_program(FLASHSTORE_BASE, record)?;
        Ok(true)
    }

    pub fn store_activation_code(&mut self, location: AcLocation, ac: &ActivationCode) -> Result<()> {
        match location {
            AcLocation::Ram => {
                self.ram.activation_code.copy_from_slice(ac.as_bytes());
                Ok(())
            }
            AcLocation::Flash => self.update_record(AC_OFFSET, ac.as_bytes()),
            AcLocation::Factory => Err(Error::InvalidOperation),
        }
    }

    pub fn load_activation_code(&self, location: AcLocation) -> Result<ActivationCode> {
        let ac = match location {
            AcLocation::Ram => ActivationCode::new(self.ram.activation_code),
            AcLocation::Flash => {
                let mirror = self.read_record()?;
                let record: &[u8; FLASHSTORE_LEN] = &mirror;
                ActivationCode::from_slice(&record[AC_OFFSET..AC_OFFSET + ACTIVATION_CODE_SIZE])?
            }
            AcLocation::Factory => {
                let mut ac = [0u8; ACTIVATION_CODE_SIZE];
                self.keystore.activation_code(&mut ac).map_err(|_| {
                    warn!("reading AC from the factory key store failed");
                    Error::Uninitialized
                })?;
                ActivationCode::new(ac)
            }
        };

        if ac.is_blank() {
            return Err(Error::Uninitialized);
        }
        Ok(ac)
    }

    pub fn store_key_code(&mut self, slot: KeyCodeSlot, key_code: &KeyCode) -> Result<()> {
        match slot {
            KeyCodeSlot::Ram(index) => {
                key_code_offset(index)?;
                self.ram.key_codes[index] = slot_bytes(key_code);
                Ok(())
            }
            KeyCodeSlot::Flash(index) => {
                let offset = key_code_offset(index)?;
                self.update_record(offset, &slot_bytes(key_code))
            }
            KeyCodeSlot::Factory(_) => Err(Error::InvalidOperation),
        }
    }

    pub fn load_key_code(&self, slot: KeyCodeSlot) -> Result<KeyCode> {
        let mut buffer = [0u8; MAX_KEY_CODE_SIZE];
        match slot {
            KeyCodeSlot::Ram(index) => {
                key_code_offset(index)?;
                buffer = self.ram.key_codes[index];
            }
            KeyCodeSlot::Flash(index) => {
                let offset = key_code_offset(index)?;
                let mirror = self.read_record()?;
                let record: &[u8; FLASHSTORE_LEN] = &mirror;
                buffer.copy_from_slice(&record[offset..offset + MAX_KEY_CODE_SIZE]);
            }
            KeyCodeSlot::Factory(kind) => {
                self.keystore.key_code(kind, &mut buffer).map_err(|_| {
                    warn!("reading {:?} from the factory key store failed", kind);
                    Error::Uninitialized
                })?;
            }
        }

        if is_empty_mem(&buffer) {
            return Err(Error::Uninitialized);
        }
        KeyCode::from_slot(&buffer)
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    fn read_record(&self) -> Result<Mirror> {
        let mut mirror: Mirror = Aligned([0u8; FLASHSTORE_LEN]);
        let record: &mut [u8; FLASHSTORE_LEN] = &mut mirror;
        self.flash.read(FLASHSTORE_BASE, record)?;
        Ok(mirror)
    }

    fn update_record(&mut self, offset: usize, field: &[u8]) -> Result<()> {
        let mut mirror = self.read_record()?;
        let record: &mut [u8; FLASHSTORE_LEN] = &mut mirror;

        self.flash.erase(FLASHSTORE_BASE, FLASHSTORE_LEN)?;
        self.flash.verify_erase(FLASHSTORE_BASE, FLASHSTORE_LEN)?;

        record[offset..offset + field.len()].copy_from_slice(field);

        self.flash.write(FLASHSTORE_BASE, record)?;
        self.flash.verify_program(FLASHSTORE_BASE, record).map_err(|error| {
            warn!("PUF record verify failed: {:?}", error);
            Error::from(error)
        })?;
        debug!("PUF record updated, {} bytes at offset {}", field.len(), offset);
        Ok(())
    }
}
