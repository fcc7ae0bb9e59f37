use std::time::Instant;

use rustyguard_crypto::{HandshakeState as CryptoState, PublicKey, StaticSecret};

/// Transient per-peer Noise_IKpsk2 state (§3): wraps the crypto crate's
/// rolling hash/chaining-key pair with the engine-level bookkeeping
/// (ephemeral keys, indices, role) needed to drive a handshake attempt
/// to completion or abandon it.
pub struct HandshakeState {
    pub crypto: CryptoState,
    pub ephemeral_private: StaticSecret,
    pub local_index: u32,
    pub remote_index: Option<u32>,
    pub remote_ephemeral: Option<PublicKey>,
    pub is_initiator: bool,
    pub started_at: Instant,
}

impl HandshakeState {
    pub fn new(
        local_index: u32,
        ephemeral_private: StaticSecret,
        is_initiator: bool,
        now: Instant,
    ) -> Self {
        Self {
            crypto: CryptoState::default(),
            ephemeral_private,
            local_index,
            remote_index: None,
            remote_ephemeral: None,
            is_initiator,
            started_at: now,
        }
    }
}
