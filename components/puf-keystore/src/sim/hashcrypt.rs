use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};

use crate::traits::cipher::{AesEngine, Block, Error, Key};
use crate::types::KeyDestination;

use super::SharedBus;

enum Engine {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl Engine {
    fn load(key: &[u8]) -> Result<Self, Error> {
        let engine = match key.len() {
            16 => Aes128::new_from_slice(key).map(Engine::Aes128),
            24 => Aes192::new_from_slice(key).map(Engine::Aes192),
            32 => Aes256::new_from_slice(key).map(Engine::Aes256),
            _ => return Err(Error::KeySize),
        };
        engine.map_err(|_| Error::KeySize)
    }
}

/// AES-ECB with either a software key or the key the PUF delivered to the
/// AES slot of the key bus.
pub struct SimAes {
    bus: SharedBus,
    engine: Option<Engine>,
}

impl SimAes {
    pub fn new(bus: SharedBus) -> Self {
        SimAes { bus, engine: None }
    }
}

impl AesEngine for SimAes {
    fn set_key(&mut self, key: Key) -> Result<(), Error> {
        self.engine = None;
        let engine = match key {
            Key::Puf => {
                let bus = self.bus.borrow();
                let secret = bus.slot(KeyDestination::Aes).ok_or(Error::NoKey)?;
                Engine::load(secret)?
            }
            Key::User(key) => Engine::load(&key)?,
        };
        self.engine = Some(engine);
        Ok(())
    }

    fn encrypt_block(&mut self, block: &mut Block) {
        match &self.engine {
            Some(Engine::Aes128(aes)) => aes.encrypt_block(block),
            Some(Engine::Aes192(aes)) => aes.encrypt_block(block),
            Some(Engine::Aes256(aes)) => aes.encrypt_block(block),
            None => {}
        }
    }

    fn decrypt_block(&mut self, block: &mut Block) {
        match &self.engine {
            Some(Engine::Aes128(aes)) => aes.decrypt_block(block),
            Some(Engine::Aes192(aes)) => aes.decrypt_block(block),
            Some(Engine::Aes256(aes)) => aes.decrypt_block(block),
            None => {}
        }
    }
}
