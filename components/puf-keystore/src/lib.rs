//! # PUF key store
//!
//! Key lifecycle around the LPC55S69 PUF: enroll the PUF, keep its
//! activation code and the key codes it produces in RAM, internal flash or
//! the factory key store, and reconstruct keys either as plaintext or into
//! the AES/PRINCE engines over the key bus.
//!
//! The hardware sits behind the collaborator traits in [`traits`]; a board
//! bundles them into a [`traits::Platform`]. With the `sim` feature, a
//! software model of all of them is available in `sim`.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
extern crate delog;
generate_macros!();

pub mod config;
pub mod console;
pub mod error;
pub mod menu;
pub mod session;
pub mod store;
pub mod traits;
pub mod types;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use menu::App;
pub use session::{Session, State};
pub use store::{AcLocation, KeyCodeSlot, KeyCodeStore};
