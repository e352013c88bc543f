//! Factory key store (CMPA/FFR key store region), read-only from the application.

use crate::config::{ACTIVATION_CODE_SIZE, MAX_KEY_CODE_SIZE};

/// Key codes provisioned into the factory key store.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FactoryKeyCode {
    SecureBoot = 0,
    UserKek = 1,
    UniqueDeviceSecret = 2,
    Prince0 = 3,
    Prince1 = 4,
    Prince2 = 5,
}

impl FactoryKeyCode {
    pub const ALL: [FactoryKeyCode; 6] = [
        FactoryKeyCode::SecureBoot,
        FactoryKeyCode::UserKek,
        FactoryKeyCode::UniqueDeviceSecret,
        FactoryKeyCode::Prince0,
        FactoryKeyCode::Prince1,
        FactoryKeyCode::Prince2,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FactoryKeyCode::SecureBoot => "Secure Boot Key Code",
            FactoryKeyCode::UserKek => "User KEK",
            FactoryKeyCode::UniqueDeviceSecret => "Unique Device Secret Key Code",
            FactoryKeyCode::Prince0 => "Princ0 Key Code",
            FactoryKeyCode::Prince1 => "Princ1 Key Code",
            FactoryKeyCode::Prince2 => "Princ2 Key Code",
        }
    }
}

/// The factory region failed to read (bad CRC, not provisioned).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReadError;

pub trait FactoryKeystore {
    fn activation_code(&self, ac: &mut [u8; ACTIVATION_CODE_SIZE]) -> Result<(), ReadError>;

    fn key_code(&self, kind: FactoryKeyCode, kc: &mut [u8; MAX_KEY_CODE_SIZE]) -> Result<(), ReadError>;
}
