//! The PUF session: one object owning the hardware and the key code store,
//! tracking how far the key lifecycle has progressed.

use heapless::Vec;
use rand_core::RngCore;

use crate::config::*;
use crate::error::{Error, Result};
use crate::store::{AcLocation, KeyCodeSlot, KeyCodeStore};
use crate::traits::{
    cipher::{self, AesEngine, Block},
    puf::{self, Puf},
    Parts, Platform,
};
use crate::types::{ActivationCode, Key, KeyCode, KeyCodeInfo, KeyDestination, KeyIndex, KeySize, KeySource};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    Uninitialized,
    Initialized,
    Enrolled,
    Started,
    KeyGenerated,
    KeyReconstructed,
    Stopped,
}

impl State {
    pub fn is_started(self) -> bool {
        matches!(self, State::Started | State::KeyGenerated | State::KeyReconstructed)
    }
}

/// Result of a key reconstruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reconstruction {
    /// Index 1..=15: the key itself.
    Plaintext(Key),
    /// Index 0: the key went to a hardware key slot and stays there.
    Delivered(KeyDestination),
}

/// Key used for the AES demo.
#[derive(Copy, Clone, Debug)]
pub enum AesKeySource<'a> {
    /// Whatever was delivered to the AES slot over the PUF key bus.
    Secret,
    /// Reconstruct the key of this key code and load it by software.
    KeyCode(&'a KeyCode),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AesReport {
    /// Software key used, `None` for the secret key.
    pub key: Option<Key>,
    pub plain: Block,
    pub cipher: Block,
    pub decrypted: Block,
}

/// PUF allow and status flags, as shown above the menu.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PufFlags {
    pub allow: puf::Allow,
    pub status: puf::Status,
}

pub struct Session<P: Platform> {
    puf: P::Puf,
    aes: P::Aes,
    rng: P::Rng,
    store: KeyCodeStore<P::Flash, P::Keystore>,
    state: State,
}

impl<P: Platform> Session<P> {
    pub fn new(platform: P) -> Self {
        let Parts { puf, aes, flash, keystore, rng } = platform.split();
        Session {
            puf,
            aes,
            rng,
            store: KeyCodeStore::new(flash, keystore),
            state: State::Uninitialized,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn flags(&self) -> PufFlags {
        PufFlags { allow: self.puf.allowed(), status: self.puf.status() }
    }

    pub fn store(&self) -> &KeyCodeStore<P::Flash, P::Keystore> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut KeyCodeStore<P::Flash, P::Keystore> {
        &mut self.store
    }

    pub fn init(&mut self) -> Result<()> {
        self.puf.init()?;
        self.state = State::Initialized;
        Ok(())
    }

    pub fn stop(&mut self) {
        self.puf.deinit();
        self.state = State::Stopped;
    }

    pub fn zeroize(&mut self) -> Result<()> {
        self.puf.zeroize()?;
        // nothing but a power cycle brings the PUF back
        self.state = State::Stopped;
        Ok(())
    }

    pub fn block_enroll(&mut self) {
        self.puf.block_enroll();
    }

    pub fn block_set_key(&mut self) {
        self.puf.block_set_key();
    }

    /// Initialize the PUF and enroll it; the caller stores the returned AC.
    pub fn enroll(&mut self) -> Result<ActivationCode> {
        self.init().map_err(|error| {
            warn!("PUF init failed: {:?}", error);
            error
        })?;

        let mut ac = [0u8; ACTIVATION_CODE_SIZE];
        self.puf.enroll(&mut ac)?;
        self.state = State::Enrolled;
        info!("PUF enrolled");
        Ok(ActivationCode::new(ac))
    }

    /// Power cycle the PUF and start it with `ac`.
    pub fn start(&mut self, ac: &ActivationCode) -> Result<()> {
        if ac.is_blank() {
            return Err(Error::Uninitialized);
        }

        self.puf.deinit();
        self.state = State::Stopped;
        self.init()?;

        self.puf.start(ac.as_bytes())?;
        self.state = State::Started;
        info!("PUF started");
        Ok(())
    }

    pub fn start_from(&mut self, location: AcLocation) -> Result<ActivationCode> {
        let ac = self.store.load_activation_code(location)?;
        self.start(&ac)?;
        Ok(ac)
    }

    pub fn store_activation_code(&mut self, location: AcLocation, ac: &ActivationCode) -> Result<()> {
        self.store.store_activation_code(location, ac)
    }

    pub fn generate_key(&mut self, source: KeySource<'_>, index: KeyIndex, size: KeySize) -> Result<KeyCode> {
        if !self.state.is_started() {
            return Err(Error::Uninitialized);
        }

        let key_size = size.bytes();
        let mut key_code = [0u8; MAX_KEY_CODE_SIZE];
        let key_code = &mut key_code[..size.key_code_size()];

        match source {
            KeySource::User(password) => {
                let mut key = [b' '; MAX_KEY_SIZE];
                let used = password.len().min(key_size);
                key[..used].copy_from_slice(&password[..used]);
                self.puf.set_user_key(index, &key[..key_size], key_code)?;
            }
            KeySource::Intrinsic => {
                self.puf.set_intrinsic_key(index, key_size, key_code)?;
            }
        }

        self.state = State::KeyGenerated;
        debug!("key code generated: index {}, {} bits", index.value(), size.bits());
        KeyCode::from_slice(key_code)
    }

    pub fn store_key_code(&mut self, slot: KeyCodeSlot, key_code: &KeyCode) -> Result<()> {
        self.store.store_key_code(slot, key_code)
    }

    pub fn load_key_code(&self, slot: KeyCodeSlot) -> Result<KeyCode> {
        self.store.load_key_code(slot)
    }

    /// Reconstruct the key of `key_code`.
    ///
    /// Index 0 key codes go to `destination` over the key bus, masked with a
    /// fresh random word; other indices return the plaintext. With a corrupt
    /// header the maximum key size is assumed.
    pub fn reconstruct_key(&mut self, key_code: &KeyCode, destination: KeyDestination) -> Result<Reconstruction> {
        if !self.state.is_started() {
            return Err(Error::Uninitialized);
        }

        let info = key_code.info();
        if let Err(error) = info.check {
            warn!("key code header corrupt ({}), assuming {} bytes", error as u32, info.key_size);
        }
        let code = &key_code.as_bytes()[..info.key_code_size().min(key_code.len())];

        let reconstruction = if info.routes_to_bus() {
            let mask = self.rng.next_u32();
            self.puf.get_hw_key(code, destination, mask)?;
            Reconstruction::Delivered(destination)
        } else {
            Reconstruction::Plaintext(self.get_key(code, &info)?)
        };

        self.state = State::KeyReconstructed;
        Ok(reconstruction)
    }

    fn get_key(&mut self, code: &[u8], info: &KeyCodeInfo) -> Result<Key> {
        let mut key = [0u8; MAX_KEY_SIZE];
        let len = self.puf.get_key(code, &mut key[..info.key_size])?;
        Vec::from_slice(&key[..len]).map_err(|_| Error::Puf(puf::Error::CommandFailed))
    }

    /// Encrypt one ECB block and decrypt it again.
    pub fn aes_roundtrip(&mut self, plaintext: &[u8], key: AesKeySource<'_>) -> Result<AesReport> {
        let mut plain = Block::default();
        for (i, byte) in plain.iter_mut().enumerate() {
            *byte = plaintext.get(i).copied().unwrap_or(b' ');
        }

        let software_key = match key {
            AesKeySource::Secret => {
                self.aes.set_key(cipher::Key::Puf).map_err(|_| Error::Cipher)?;
                None
            }
            AesKeySource::KeyCode(key_code) => {
                let key = match self.reconstruct_key(key_code, KeyDestination::Aes)? {
                    Reconstruction::Plaintext(key) => key,
                    // index 0 codes load the engine over the bus
                    Reconstruction::Delivered(_) => return self.aes_roundtrip(plaintext, AesKeySource::Secret),
                };
                let aes_key = Vec::from_slice(&key).map_err(|_| Error::Cipher)?;
                self.aes.set_key(cipher::Key::User(aes_key)).map_err(|_| Error::Cipher)?;
                Some(key)
            }
        };

        let mut cipher = plain;
        self.aes.encrypt_block(&mut cipher);
        let mut decrypted = cipher;
        self.aes.decrypt_block(&mut decrypted);

        Ok(AesReport { key: software_key, plain, cipher, decrypted })
    }
}
