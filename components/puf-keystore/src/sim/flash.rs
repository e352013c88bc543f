use generic_array::{
    typenum::{U16, U512},
    GenericArray,
};

use crate::config::{FLASHSTORE_BASE, FLASHSTORE_LEN, FLASH_PAGE_SIZE};
use crate::traits::flash::{Error, Read, Result, WriteErase};

/// Internal flash region held in memory.
///
/// Programming can only clear bits, so writing a page that was not erased
/// first leaves a mix of old and new data that the verify pass catches.
pub struct RamFlash {
    base: usize,
    memory: std::vec::Vec<u8>,
    flip: Option<usize>,
    fail_erase: bool,
    fail_program: bool,
}

impl RamFlash {
    /// Erased region covering the PUF record.
    pub fn new() -> Self {
        Self::with_region(FLASHSTORE_BASE, FLASHSTORE_LEN)
    }

    pub fn with_region(base: usize, len: usize) -> Self {
        Self::from_image(base, vec![0xFF; len])
    }

    pub fn from_image(base: usize, image: std::vec::Vec<u8>) -> Self {
        RamFlash { base, memory: image, flip: None, fail_erase: false, fail_program: false }
    }

    pub fn image(&self) -> &[u8] {
        &self.memory
    }

    /// Make the next program operation covering `address` flip its lowest bit.
    pub fn flip_bit_on_program(&mut self, address: usize) {
        self.flip = Some(address);
    }

    /// Make the next page erase report a controller failure.
    pub fn fail_next_erase(&mut self) {
        self.fail_erase = true;
    }

    /// Make the next program operation report a controller failure.
    pub fn fail_next_program(&mut self) {
        self.fail_program = true;
    }

    fn offset(&self, address: usize, len: usize) -> Option<usize> {
        let offset = address.checked_sub(self.base)?;
        if offset + len <= self.memory.len() {
            Some(offset)
        } else {
            None
        }
    }
}

impl Default for RamFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl Read<U16> for RamFlash {
    fn read_native(&self, address: usize, array: &mut GenericArray<u8, U16>) -> Result {
        let len = array.len();
        let offset = self.offset(address, len).ok_or(Error::Illegal)?;
        array.copy_from_slice(&self.memory[offset..offset + len]);
        Ok(())
    }
}

impl WriteErase<U512, U512> for RamFlash {
    fn erase_page(&mut self, page: usize) -> Result {
        if core::mem::take(&mut self.fail_erase) {
            return Err(Error::Failure);
        }
        let offset = self.offset(page * FLASH_PAGE_SIZE, FLASH_PAGE_SIZE).ok_or(Error::Illegal)?;
        self.memory[offset..offset + FLASH_PAGE_SIZE].iter_mut().for_each(|byte| *byte = 0xFF);
        Ok(())
    }

    fn write_native(&mut self, address: usize, array: &GenericArray<u8, U512>) -> Result {
        if core::mem::take(&mut self.fail_program) {
            return Err(Error::Failure);
        }
        let offset = self.offset(address, array.len()).ok_or(Error::Illegal)?;
        for (cell, byte) in self.memory[offset..offset + array.len()].iter_mut().zip(array.iter()) {
            *cell &= *byte;
        }

        if let Some(flip) = self.flip {
            if flip >= address && flip < address + array.len() {
                self.memory[flip - self.base] ^= 1;
                self.flip = None;
            }
        }
        Ok(())
    }
}
