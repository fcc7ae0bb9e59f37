use ahash::RandomState;
use rand_core::{CryptoRng, RngCore};

/// Draws four fresh 64-bit seeds for an [`ahash::RandomState`], so the
/// public-key-keyed peer map cannot be driven into worst-case buckets by
/// an attacker who only sees the wire.
pub fn random_hash_seeds(rng: &mut (impl CryptoRng + RngCore)) -> (u64, u64, u64, u64) {
    (rng.next_u64(), rng.next_u64(), rng.next_u64(), rng.next_u64())
}

/// Builds a fresh keyed hasher state for the peer map from CSPRNG output.
pub fn random_hasher(rng: &mut (impl CryptoRng + RngCore)) -> RandomState {
    let (k0, k1, k2, k3) = random_hash_seeds(rng);
    RandomState::with_seeds(k0, k1, k2, k3)
}
