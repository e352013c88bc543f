use core::fmt;

use crate::traits::{flash, puf};
use crate::types::HeaderError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// An earlier step of the key lifecycle has not happened yet
    /// (PUF not started, empty activation code or key code slot).
    Uninitialized,
    /// The PUF refused the command: its allow bit is clear, either because
    /// of the current PUF state or because the command was blocked.
    NotAllowed,
    /// The PUF accepted the command but it did not succeed.
    Puf(puf::Error),
    /// Operator input out of range.
    InvalidInput,
    /// Key code header fields out of range.
    HeaderCorrupt(HeaderError),
    /// Flash controller reported an error during erase or program.
    Flash(flash::Error),
    /// Read back after erase or program does not match.
    FlashVerifyFailed { address: usize },
    /// Write to the read-only factory key store.
    InvalidOperation,
    /// The AES engine rejected the key.
    Cipher,
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<puf::Error> for Error {
    fn from(error: puf::Error) -> Self {
        match error {
            puf::Error::NotAllowed => Error::NotAllowed,
            other => Error::Puf(other),
        }
    }
}

impl From<flash::Error> for Error {
    fn from(error: flash::Error) -> Self {
        match error {
            flash::Error::Mismatch { address, .. } => Error::FlashVerifyFailed { address },
            other => Error::Flash(other),
        }
    }
}

impl From<HeaderError> for Error {
    fn from(error: HeaderError) -> Self {
        Error::HeaderCorrupt(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Uninitialized => f.write_str("not initialized, run the previous step first"),
            Error::NotAllowed => f.write_str("operation not allowed by the PUF"),
            Error::Puf(puf::Error::CommandFailedToStart) => f.write_str("PUF command could not start"),
            Error::Puf(_) => f.write_str("PUF command failed"),
            Error::InvalidInput => f.write_str("bad input value"),
            Error::HeaderCorrupt(error) => write!(f, "key code header corrupt ({})", *error as u32),
            Error::Flash(error) => write!(f, "flash error: {:?}", error),
            Error::FlashVerifyFailed { address } => write!(f, "flash verify failed at 0x{:X}", address),
            Error::InvalidOperation => f.write_str("factory key store is read-only"),
            Error::Cipher => f.write_str("AES engine rejected the key"),
        }
    }
}
