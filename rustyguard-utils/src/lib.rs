#![no_std]

//! Small, crypto-free helpers shared by `rustyguard-core`: the
//! anti-replay bitmap and a keyed hasher for the peer map, kept out of
//! `rustyguard-crypto` because neither needs an AEAD/DH dependency.

mod hash;
mod replay;

pub use ahash::RandomState;
pub use hash::{random_hash_seeds, random_hasher};
pub use replay::ReplayWindow;
