use rand::rngs::OsRng;
use rand::{CryptoRng, Rng, RngCore};
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha20Rng;
use std::cell::UnsafeCell;

thread_local! {
    static RNG: UnsafeCell<ChaCha20Rng> = UnsafeCell::new(ChaCha20Rng::from_seed(OsRng.gen()));
}

pub struct SecureRng;

impl RngCore for SecureRng {
    fn next_u32(&mut self) -> u32 {
        RNG.with(|rng| unsafe { rand_chacha::rand_core::RngCore::next_u32(&mut *rng.get()) })
    }

    fn next_u64(&mut self) -> u64 {
        RNG.with(|rng| unsafe { rand_chacha::rand_core::RngCore::next_u64(&mut *rng.get()) })
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        RNG.with(|rng| unsafe {
            rand_chacha::rand_core::RngCore::fill_bytes(&mut *rng.get(), dest)
        })
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        // try_fill_bytes is infallible for ChaCha20Rng
        RNG.with(|rng| unsafe {
            let _ = (*rng.get()).try_fill_bytes(dest);
        });
        Ok(())
    }
}

impl CryptoRng for SecureRng {}
