use crate::config::{ACTIVATION_CODE_SIZE, MAX_KEY_CODE_SIZE};
use crate::traits::keystore::{FactoryKeyCode, FactoryKeystore, ReadError};
use crate::types::{ActivationCode, KeyCode};

/// Factory key store contents; reads of anything not provisioned fail like
/// an unprogrammed CMPA region.
#[derive(Default)]
pub struct SimKeystore {
    activation_code: Option<ActivationCode>,
    key_codes: [Option<KeyCode>; 6],
}

impl SimKeystore {
    pub fn provision_activation_code(&mut self, ac: ActivationCode) {
        self.activation_code = Some(ac);
    }

    pub fn provision_key_code(&mut self, kind: FactoryKeyCode, key_code: KeyCode) {
        self.key_codes[kind as usize] = Some(key_code);
    }
}

impl FactoryKeystore for SimKeystore {
    fn activation_code(&self, ac: &mut [u8; ACTIVATION_CODE_SIZE]) -> Result<(), ReadError> {
        let stored = self.activation_code.as_ref().ok_or(ReadError)?;
        ac.copy_from_slice(stored.as_bytes());
        Ok(())
    }

    fn key_code(&self, kind: FactoryKeyCode, kc: &mut [u8; MAX_KEY_CODE_SIZE]) -> Result<(), ReadError> {
        let stored = self.key_codes[kind as usize].as_ref().ok_or(ReadError)?;
        kc.iter_mut().for_each(|byte| *byte = 0);
        kc[..stored.len()].copy_from_slice(stored.as_bytes());
        Ok(())
    }
}
