//! Internal flash of the simulated device, persisted to a single binary file.
//!
//! The file holds the flash region starting at `FLASHSTORE_BASE`; a fresh
//! file starts out erased.

use std::fs::{File, OpenOptions};
use std::io::{self, Read as _, Seek as _, SeekFrom, Write as _};

use generic_array::{
    typenum::{U16, U512},
    GenericArray,
};
use log::{error, info};

use puf_keystore::config::{FLASHSTORE_BASE, FLASHSTORE_LEN, FLASH_PAGE_SIZE};
use puf_keystore::traits::flash::{Error, Read, Result, WriteErase};

pub struct FileFlash {
    path: std::path::PathBuf,
}

impl FileFlash {
    const BASE: usize = FLASHSTORE_BASE;
    const SIZE: u64 = FLASHSTORE_LEN as u64;

    pub fn new(state_path: impl AsRef<std::path::Path>) -> io::Result<Self> {
        let path: std::path::PathBuf = state_path.as_ref().into();

        match File::open(&path) {
            Ok(file) => {
                let len = file.metadata()?.len();
                if len != Self::SIZE {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("{:?} is {} bytes, expected {}", path, len, Self::SIZE),
                    ));
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let mut file = File::create(&path)?;
                file.write_all(&[0xFFu8; FLASHSTORE_LEN])?;
                file.flush()?;
                info!("Created new state file");
            }
            Err(err) => return Err(err),
        }
        Ok(Self { path })
    }

    fn offset(address: usize, len: usize) -> core::result::Result<u64, Error> {
        match address.checked_sub(Self::BASE) {
            Some(offset) if (offset + len) as u64 <= Self::SIZE => Ok(offset as u64),
            _ => Err(Error::Illegal),
        }
    }

    fn read_at(&self, offset: u64, buffer: &mut [u8]) -> io::Result<()> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buffer)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()
    }
}

impl Read<U16> for FileFlash {
    fn read_native(&self, address: usize, array: &mut GenericArray<u8, U16>) -> Result {
        let offset = Self::offset(address, array.len())?;
        self.read_at(offset, array).map_err(|err| {
            error!("reading 0x{:X} failed: {}", address, err);
            Error::Failure
        })
    }
}

impl WriteErase<U512, U512> for FileFlash {
    fn erase_page(&mut self, page: usize) -> Result {
        let offset = Self::offset(page * FLASH_PAGE_SIZE, FLASH_PAGE_SIZE)?;
        self.write_at(offset, &[0xFFu8; FLASH_PAGE_SIZE]).map_err(|err| {
            error!("erasing page {} failed: {}", page, err);
            Error::Failure
        })
    }

    fn write_native(&mut self, address: usize, array: &GenericArray<u8, U512>) -> Result {
        let offset = Self::offset(address, array.len())?;

        // programming only clears bits
        let mut cells = [0u8; FLASH_PAGE_SIZE];
        self.read_at(offset, &mut cells).map_err(|_| Error::Failure)?;
        for (cell, byte) in cells.iter_mut().zip(array.iter()) {
            *cell &= *byte;
        }

        self.write_at(offset, &cells).map_err(|err| {
            error!("programming 0x{:X} failed: {}", address, err);
            Error::Failure
        })
    }
}
