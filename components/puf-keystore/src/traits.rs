pub mod cipher;
pub mod flash;
pub mod keystore;
pub mod puf;

/// The hardware a `Session` runs on.
///
/// Board crates (or the simulation) bundle their PUF, AES engine, internal
/// flash, factory key store and random source, and hand them over in one go.
pub trait Platform {
    type Puf: puf::Puf;
    type Aes: cipher::AesEngine;
    type Flash: flash::Flash;
    type Keystore: keystore::FactoryKeystore;
    type Rng: rand_core::RngCore;

    fn split(self) -> Parts<Self>
    where
        Self: Sized;
}

pub struct Parts<P: Platform + ?Sized> {
    pub puf: P::Puf,
    pub aes: P::Aes,
    pub flash: P::Flash,
    pub keystore: P::Keystore,
    pub rng: P::Rng,
}
