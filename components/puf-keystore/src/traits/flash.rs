use crate::config::FLASH_READ_SIZE;
use generic_array::{
    typenum::{U16, U512},
    ArrayLength,
    GenericArray,
};

/// Flash operation error
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Error detected (by command execution, or because no command could be executed)
    Illegal,
    /// (Legal) command failed
    Failure,
    /// Address or length is not a multiple of the native size
    Alignment,
    /// Read back differs: first failing address and the word found there
    Mismatch { address: usize, data: u32 },
}

/// A type alias for the result of a Flash operation.
pub type Result = core::result::Result<(), Error>;

pub trait Read<ReadSize: ArrayLength<u8>> {
    fn read_native(&self, address: usize, array: &mut GenericArray<u8, ReadSize>) -> Result;

    /// read a buffer of bytes from memory
    /// checks that the address and buffer size are multiples of native
    /// FLASH ReadSize.
    fn read(&self, address: usize, buf: &mut [u8]) -> Result {
        let read_size = ReadSize::to_usize();
        if buf.len() % read_size != 0 || address % read_size != 0 {
            return Err(Error::Alignment);
        }

        for i in (0..buf.len()).step_by(read_size) {
            self.read_native(
                address + i,
                GenericArray::from_mut_slice(&mut buf[i..i + read_size]),
            )?;
        }
        Ok(())
    }
}

pub trait WriteErase<EraseSize: ArrayLength<u8>, WriteSize: ArrayLength<u8>> {
    /// What an erased byte reads back as.
    const ERASED_VALUE: u8 = 0xFF;

    /// Erase specified flash page.
    fn erase_page(&mut self, page: usize) -> Result;

    /// The smallest possible write, depends on platform
    fn write_native(&mut self, address: usize, array: &GenericArray<u8, WriteSize>) -> Result;

    fn write(&mut self, address: usize, data: &[u8]) -> Result {
        let write_size = WriteSize::to_usize();
        if data.len() % write_size != 0 || address % write_size != 0 {
            return Err(Error::Alignment);
        }

        for i in (0..data.len()).step_by(write_size) {
            self.write_native(address + i, GenericArray::from_slice(&data[i..i + write_size]))?;
        }
        Ok(())
    }

    /// Erase all pages of `address .. address + len`.
    fn erase(&mut self, address: usize, len: usize) -> Result {
        let erase_size = EraseSize::to_usize();
        if len % erase_size != 0 || address % erase_size != 0 {
            return Err(Error::Alignment);
        }

        let first_page = address / erase_size;
        for page in first_page..first_page + len / erase_size {
            self.erase_page(page)?;
        }
        Ok(())
    }
}

/// Internal flash of the LPC55: reads in 16 byte physical words,
/// erases and writes in 512 byte pages.
pub trait Flash: Read<U16> + WriteErase<U512, U512> {
    /// Check that `address .. address + len` reads back erased.
    fn verify_erase(&self, address: usize, len: usize) -> Result {
        let mut word = [0u8; FLASH_READ_SIZE];
        for offset in (0..len).step_by(word.len()) {
            self.read(address + offset, &mut word)?;
            if let Some(i) = word.iter().position(|b| *b != <Self as WriteErase<U512, U512>>::ERASED_VALUE) {
                return Err(mismatch(address + offset, &word, i));
            }
        }
        Ok(())
    }

    /// Compare `address ..` with `expected`.
    fn verify_program(&self, address: usize, expected: &[u8]) -> Result {
        let mut word = [0u8; FLASH_READ_SIZE];
        for (offset, chunk) in expected.chunks(word.len()).enumerate() {
            let chunk_address = address + offset * word.len();
            self.read(chunk_address, &mut word)?;
            if let Some(i) = word.iter().zip(chunk).position(|(a, b)| a != b) {
                return Err(mismatch(chunk_address, &word, i));
            }
        }
        Ok(())
    }
}

impl<T> Flash for T where T: Read<U16> + WriteErase<U512, U512> {}

// report the 32 bit word containing the first bad byte, like the IAP verify calls
fn mismatch(chunk_address: usize, word: &[u8; FLASH_READ_SIZE], byte: usize) -> Error {
    let start = byte & !3;
    let mut data = [0u8; 4];
    data.copy_from_slice(&word[start..start + 4]);
    Error::Mismatch {
        address: chunk_address + start,
        data: u32::from_ne_bytes(data),
    }
}
