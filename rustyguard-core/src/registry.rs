use rand_core::{CryptoRng, RngCore};
use std::collections::HashMap;

use rustyguard_utils::RandomState;

use crate::peer::{Peer, PeerId};

/// §4.2: draws a 32-bit value from the CSPRNG, rejecting `0`,
/// `0xFFFFFFFF`, and any value already in use as a `local_index`
/// anywhere in `peers` (a handshake-in-progress or any keypair slot).
pub fn generate_unique_index(
    peers: &HashMap<PeerId, Peer, RandomState>,
    rng: &mut (impl CryptoRng + RngCore),
) -> u32 {
    loop {
        let idx = rng.next_u32();
        if idx == 0 || idx == u32::MAX {
            continue;
        }
        if in_use(peers, idx) {
            continue;
        }
        return idx;
    }
}

fn in_use(peers: &HashMap<PeerId, Peer, RandomState>, idx: u32) -> bool {
    peers.values().any(|p| {
        matches!(&p.handshake, Some(h) if h.local_index == idx) || p.keypairs.local_indices().any(|i| i == idx)
    })
}

/// §4.2 `lookup_by_receiver`: the peer owning a keypair slot whose
/// `local_index == idx`, and which slot.
pub fn lookup_by_receiver(
    peers: &HashMap<PeerId, Peer, RandomState>,
    idx: u32,
) -> Option<PeerId> {
    peers
        .values()
        .find(|p| p.keypairs.local_indices().any(|i| i == idx))
        .map(|p| p.id)
}

/// §4.2 `lookup_by_handshake`: the peer with a valid, initiator-started
/// handshake whose `local_index == idx`.
pub fn lookup_by_handshake(
    peers: &HashMap<PeerId, Peer, RandomState>,
    idx: u32,
) -> Option<PeerId> {
    peers
        .values()
        .find(|p| matches!(&p.handshake, Some(h) if h.is_initiator && h.local_index == idx))
        .map(|p| p.id)
}
