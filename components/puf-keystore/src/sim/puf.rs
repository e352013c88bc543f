use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::ChaCha20;
use generic_array::{typenum::U64, GenericArray};
use hmac::{Hmac, Mac};
use rand_core::RngCore;
use sha2::Sha256;

use crate::config::*;
use crate::traits::puf::{Allow, Error, Puf, Result, Status};
use crate::types::{KeyCodeHeader, KeyDestination, KeyIndex, KeySize, KeyType};

use super::{SharedBus, SimRng};

type HmacSha256 = Hmac<Sha256>;

// activation code: salt | filler | tag
const SALT_SIZE: usize = 32;
const TAG_SIZE: usize = 32;
const AC_BODY: usize = ACTIVATION_CODE_SIZE - TAG_SIZE;

// key code: header | nonce | tag | wrapped key
const KC_NONCE: usize = KEY_CODE_HEADER_SIZE;
const KC_TAG: usize = KC_NONCE + 8;
const KC_BODY: usize = KC_TAG + 8;

fn mac(key: &[u8; 32], parts: &[&[u8]]) -> [u8; 32] {
    let mut padded = GenericArray::<u8, U64>::default();
    padded[..32].copy_from_slice(key);
    let mut mac = <HmacSha256 as Mac>::new(&padded);
    for part in parts {
        mac.update(part);
    }
    mac.finalize().into_bytes().into()
}

fn keystream(key: &[u8; 32], nonce: &[u8; 12], data: &mut [u8]) {
    ChaCha20::new(GenericArray::from_slice(key), GenericArray::from_slice(nonce)).apply_keystream(data);
}

/// PUF model keyed by a per-device secret.
///
/// Enroll draws a salt and seals it into the activation code with the
/// device secret; start only accepts activation codes sealed by the same
/// device, and derives the key wrapping root from the salt.
pub struct SimPuf {
    device_secret: [u8; 32],
    rng: SimRng,
    bus: SharedBus,
    root: Option<[u8; 32]>,
    allow: Allow,
    status: Status,
    enroll_blocked: bool,
    set_key_blocked: bool,
}

impl SimPuf {
    pub fn new(device_secret: [u8; 32], rng_seed: [u8; 32], bus: SharedBus) -> Self {
        SimPuf {
            device_secret,
            rng: SimRng::from_seed(rng_seed),
            bus,
            root: None,
            allow: Allow::default(),
            status: Status::default(),
            enroll_blocked: false,
            set_key_blocked: false,
        }
    }

    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        self.status = Status { busy: false, success: result.is_ok(), error: result.is_err() };
        result
    }

    fn started(&mut self, salt: &[u8]) {
        self.root = Some(mac(&self.device_secret, &[b"root", salt]));
        self.allow = Allow { set_key: !self.set_key_blocked, get_key: true, ..Allow::default() };
    }

    fn wrap_key(&mut self, key_type: KeyType, index: KeyIndex, key: &[u8], key_code: &mut [u8]) -> Result<()> {
        let root = self.root.ok_or(Error::CommandFailed)?;
        let size = KeySize::from_bytes(key.len()).ok_or(Error::CommandFailed)?;
        let key_code = key_code.get_mut(..size.key_code_size()).ok_or(Error::CommandFailed)?;

        key_code.iter_mut().for_each(|byte| *byte = 0);
        key_code[..KC_NONCE].copy_from_slice(&KeyCodeHeader { key_type, index, size }.to_bytes());
        self.rng.fill_bytes(&mut key_code[KC_NONCE..KC_TAG]);

        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&key_code[..KC_TAG]);
        let body = &mut key_code[KC_BODY..];
        body[..key.len()].copy_from_slice(key);
        keystream(&root, &nonce, body);

        let tag = mac(&root, &[&nonce, &key_code[KC_BODY..]]);
        key_code[KC_TAG..KC_BODY].copy_from_slice(&tag[..KC_BODY - KC_TAG]);
        Ok(())
    }

    fn unwrap_key(&self, key_code: &[u8], key: &mut [u8]) -> Result<(KeyCodeHeader, usize)> {
        let root = self.root.ok_or(Error::CommandFailed)?;
        let header = KeyCodeHeader::parse(key_code).map_err(|_| Error::CommandFailed)?;
        let key_code = key_code.get(..header.size.key_code_size()).ok_or(Error::CommandFailed)?;
        let len = header.size.bytes();
        if key.len() < len {
            return Err(Error::CommandFailed);
        }

        let mut nonce = [0u8; 12];
        nonce.copy_from_slice(&key_code[..KC_TAG]);
        let tag = mac(&root, &[&nonce, &key_code[KC_BODY..]]);
        if tag[..KC_BODY - KC_TAG] != key_code[KC_TAG..KC_BODY] {
            return Err(Error::CommandFailed);
        }

        let mut body = [0u8; MAX_KEY_CODE_SIZE];
        let body = &mut body[..key_code.len() - KC_BODY];
        body.copy_from_slice(&key_code[KC_BODY..]);
        keystream(&root, &nonce, body);
        key[..len].copy_from_slice(&body[..len]);
        Ok((header, len))
    }
}

impl Puf for SimPuf {
    fn init(&mut self) -> Result<()> {
        self.root = None;
        self.allow = Allow { enroll: !self.enroll_blocked, start: true, ..Allow::default() };
        self.status = Status::default();
        Ok(())
    }

    fn deinit(&mut self) {
        self.root = None;
        self.allow = Allow::default();
        self.status = Status::default();
    }

    fn enroll(&mut self, activation_code: &mut [u8; ACTIVATION_CODE_SIZE]) -> Result<()> {
        if !self.allow.enroll {
            return self.finish(Err(Error::NotAllowed));
        }

        let mut salt = [0u8; SALT_SIZE];
        self.rng.fill_bytes(&mut salt);
        activation_code.iter_mut().for_each(|byte| *byte = 0);
        activation_code[..SALT_SIZE].copy_from_slice(&salt);
        let filler_key = mac(&self.device_secret, &[b"filler", &salt]);
        keystream(&filler_key, &[0u8; 12], &mut activation_code[SALT_SIZE..AC_BODY]);
        let tag = mac(&self.device_secret, &[b"ac", &activation_code[..AC_BODY]]);
        activation_code[AC_BODY..].copy_from_slice(&tag);

        self.started(&salt);
        // after enroll the PUF only accepts key generation
        self.allow.get_key = false;
        self.finish(Ok(()))
    }

    fn start(&mut self, activation_code: &[u8; ACTIVATION_CODE_SIZE]) -> Result<()> {
        if !self.allow.start {
            return self.finish(Err(Error::NotAllowed));
        }

        let tag = mac(&self.device_secret, &[b"ac", &activation_code[..AC_BODY]]);
        if tag[..] != activation_code[AC_BODY..] {
            warn!("activation code was not enrolled on this device");
            self.allow = Allow::default();
            return self.finish(Err(Error::CommandFailed));
        }

        self.started(&activation_code[..SALT_SIZE]);
        self.finish(Ok(()))
    }

    fn set_user_key(&mut self, index: KeyIndex, key: &[u8], key_code: &mut [u8]) -> Result<()> {
        if !self.allow.set_key {
            return self.finish(Err(Error::NotAllowed));
        }
        let result = self.wrap_key(KeyType::User, index, key, key_code);
        self.finish(result)
    }

    fn set_intrinsic_key(&mut self, index: KeyIndex, key_size: usize, key_code: &mut [u8]) -> Result<()> {
        if !self.allow.set_key {
            return self.finish(Err(Error::NotAllowed));
        }
        if key_size > MAX_KEY_SIZE {
            return self.finish(Err(Error::CommandFailed));
        }
        let mut key = [0u8; MAX_KEY_SIZE];
        self.rng.fill_bytes(&mut key[..key_size]);
        let result = self.wrap_key(KeyType::Intrinsic, index, &key[..key_size], key_code);
        self.finish(result)
    }

    fn get_key(&mut self, key_code: &[u8], key: &mut [u8]) -> Result<usize> {
        if !self.allow.get_key {
            return self.finish(Err(Error::NotAllowed));
        }
        // index 0 keys only ever go out on the key bus
        let result = match KeyCodeHeader::parse(key_code) {
            Ok(header) if header.index.routes_to_bus() => Err(Error::CommandFailed),
            _ => self.unwrap_key(key_code, key).map(|(_, len)| len),
        };
        self.finish(result)
    }

    fn get_hw_key(&mut self, key_code: &[u8], destination: KeyDestination, mask: u32) -> Result<()> {
        if !self.allow.get_key {
            return self.finish(Err(Error::NotAllowed));
        }
        let mut key = [0u8; MAX_KEY_SIZE];
        let result = match self.unwrap_key(key_code, &mut key) {
            Ok((header, len)) if header.index.routes_to_bus() => {
                debug!("key bus: {} bytes to {}, mask {:08x}", len, destination.name(), mask);
                self.bus.borrow_mut().deliver(destination, &key[..len]);
                Ok(())
            }
            Ok(_) => Err(Error::CommandFailed),
            Err(error) => Err(error),
        };
        key.iter_mut().for_each(|byte| *byte = 0);
        self.finish(result)
    }

    fn block_enroll(&mut self) {
        self.enroll_blocked = true;
        self.allow.enroll = false;
    }

    fn block_set_key(&mut self) {
        self.set_key_blocked = true;
        self.allow.set_key = false;
    }

    fn zeroize(&mut self) -> Result<()> {
        self.root = None;
        self.allow = Allow::default();
        self.bus.borrow_mut().clear();
        self.finish(Ok(()))
    }

    fn allowed(&self) -> Allow {
        self.allow
    }

    fn status(&self) -> Status {
        self.status
    }
}
