//! Software model of the LPC55 PUF, hashcrypt AES engine, internal flash
//! and factory key store, for running the key lifecycle on a PC.
//!
//! The model keeps the contracts the menu relies on (allow bits, key code
//! layout, index 0 keys never leaving the key bus, flash only clearing bits
//! between erases), not the silicon's actual cryptography.

use std::cell::RefCell;
use std::rc::Rc;

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use heapless::Vec;
use rand_core::RngCore;
use sha2::{Digest, Sha256};

use crate::config::*;
use crate::traits::{
    flash::Flash,
    keystore::FactoryKeyCode,
    puf::{self as hw, Puf as _},
    Parts, Platform,
};
use crate::types::{key_code_size, ActivationCode, Key, KeyCode, KeyDestination, KeyIndex};

pub mod flash;
pub mod hashcrypt;
pub mod keystore;
pub mod puf;

pub use self::flash::RamFlash;
pub use self::hashcrypt::SimAes;
pub use self::keystore::SimKeystore;
pub use self::puf::SimPuf;

/// Hardware key slots fed by the PUF key bus, one per `KeyDestination`.
#[derive(Default)]
pub struct KeyBus {
    slots: [Option<Key>; NUM_KEY_SLOTS as usize],
}

impl KeyBus {
    pub fn deliver(&mut self, destination: KeyDestination, key: &[u8]) {
        self.slots[destination as usize] = Vec::from_slice(key).ok();
    }

    pub fn slot(&self, destination: KeyDestination) -> Option<&[u8]> {
        self.slots[destination as usize].as_deref()
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}

pub type SharedBus = Rc<RefCell<KeyBus>>;

fn derive(label: &[u8], seed: &[u8]) -> [u8; 32] {
    let mut hash = Sha256::new();
    hash.update(label);
    hash.update(seed);
    hash.finalize().into()
}

/// ChaCha20 keystream as random source.
pub struct SimRng(ChaCha20);

impl SimRng {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let nonce = *b"puf sim rng\0";
        Self(ChaCha20::new(&seed.into(), &nonce.into()))
    }
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.iter_mut().for_each(|byte| *byte = 0);
        self.0.apply_keystream(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

// index and key size of the key codes a factory provisioning run creates
fn factory_layout(kind: FactoryKeyCode) -> (u32, usize) {
    match kind {
        FactoryKeyCode::SecureBoot => (1, 32),
        FactoryKeyCode::UserKek => (2, 32),
        FactoryKeyCode::UniqueDeviceSecret => (3, 32),
        FactoryKeyCode::Prince0 | FactoryKeyCode::Prince1 | FactoryKeyCode::Prince2 => (0, 16),
    }
}

/// One simulated device. The same seed always yields the same device.
pub struct SimPlatform<F = RamFlash> {
    puf: SimPuf,
    aes: SimAes,
    flash: F,
    keystore: SimKeystore,
    rng: SimRng,
    bus: SharedBus,
}

impl SimPlatform<RamFlash> {
    pub fn new(seed: &[u8]) -> Self {
        Self::with_flash(seed, RamFlash::new())
    }
}

impl<F: Flash> SimPlatform<F> {
    pub fn with_flash(seed: &[u8], flash: F) -> Self {
        let bus = SharedBus::default();
        SimPlatform {
            puf: SimPuf::new(derive(b"puf-sim device", seed), derive(b"puf-sim puf rng", seed), bus.clone()),
            aes: SimAes::new(bus.clone()),
            flash,
            keystore: SimKeystore::default(),
            rng: SimRng::from_seed(derive(b"puf-sim rng", seed)),
            bus,
        }
    }

    /// Handle on the key slots, to observe what `get_hw_key` delivered.
    pub fn bus(&self) -> SharedBus {
        self.bus.clone()
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn keystore_mut(&mut self) -> &mut SimKeystore {
        &mut self.keystore
    }

    /// Enroll the PUF and fill the factory key store with the resulting AC
    /// and one intrinsic key code per factory kind, as a programming station
    /// would. Leaves the PUF powered down.
    pub fn provision_factory(&mut self) -> hw::Result<ActivationCode> {
        let mut ac = [0u8; ACTIVATION_CODE_SIZE];
        self.puf.init()?;
        self.puf.enroll(&mut ac)?;
        let ac = ActivationCode::new(ac);

        self.puf.deinit();
        self.puf.init()?;
        self.puf.start(ac.as_bytes())?;

        for kind in FactoryKeyCode::ALL.iter().copied() {
            let (index, key_size) = factory_layout(kind);
            let index = KeyIndex::new(index).map_err(|_| hw::Error::CommandFailed)?;
            let mut buffer = [0u8; MAX_KEY_CODE_SIZE];
            let key_code = &mut buffer[..key_code_size(key_size)];
            self.puf.set_intrinsic_key(index, key_size, key_code)?;
            let key_code = KeyCode::from_slice(key_code).map_err(|_| hw::Error::CommandFailed)?;
            self.keystore.provision_key_code(kind, key_code);
        }

        self.puf.deinit();
        self.keystore.provision_activation_code(ac.clone());
        info!("factory key store provisioned");
        Ok(ac)
    }
}

impl<F: Flash> Platform for SimPlatform<F> {
    type Puf = SimPuf;
    type Aes = SimAes;
    type Flash = F;
    type Keystore = SimKeystore;
    type Rng = SimRng;

    fn split(self) -> Parts<Self> {
        Parts {
            puf: self.puf,
            aes: self.aes,
            flash: self.flash,
            keystore: self.keystore,
            rng: self.rng,
        }
    }
}
