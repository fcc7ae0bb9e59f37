use std::time::Instant;

use rustyguard_crypto::{DecryptionKey, EncryptionKey};
use rustyguard_utils::ReplayWindow;

use crate::constants::{REJECT_AFTER_MESSAGES, REJECT_AFTER_TIME};

/// One half of a session (§3): a sending key and a receiving key bound
/// to a pair of indices, with independent send/receive state.
pub struct Keypair {
    pub sending: EncryptionKey,
    pub receiving: DecryptionKey,
    pub sending_counter: u64,
    pub local_index: u32,
    pub remote_index: u32,
    pub expires_at: Instant,
    pub rejected_at: Instant,
    pub last_tx: Option<Instant>,
    pub last_rx: Option<Instant>,
    pub replay: ReplayWindow,
    pub is_initiator: bool,
}

impl Keypair {
    pub fn new(
        now: Instant,
        sending: EncryptionKey,
        receiving: DecryptionKey,
        local_index: u32,
        remote_index: u32,
        is_initiator: bool,
    ) -> Self {
        Self {
            sending,
            receiving,
            sending_counter: 0,
            local_index,
            remote_index,
            expires_at: now + REJECT_AFTER_TIME,
            rejected_at: now + 3 * REJECT_AFTER_TIME,
            last_tx: None,
            last_rx: None,
            replay: ReplayWindow::new(),
            is_initiator,
        }
    }

    /// §4.10 precondition: a responder-originated keypair may only send
    /// once it has received at least one transport packet confirming
    /// the peer completed the handshake too.
    pub fn is_sending_valid(&self) -> bool {
        self.is_initiator || self.last_rx.is_some()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at || self.sending_counter >= REJECT_AFTER_MESSAGES
    }

    pub fn is_rejected(&self, now: Instant) -> bool {
        now >= self.rejected_at
    }

    /// §4.10 step 8 / §4.11 step 12: close enough to expiry that the
    /// scheduler or the data path itself should trigger a rekey.
    pub fn expires_soon(&self, now: Instant) -> bool {
        now + crate::constants::REKEY_MARGIN >= self.expires_at
    }
}

/// The three-slot keypair ring held by each peer (§4.9).
#[derive(Default)]
pub struct KeypairRing {
    pub previous: Option<Keypair>,
    pub current: Option<Keypair>,
    pub next: Option<Keypair>,
}

impl KeypairRing {
    /// Installs a freshly completed handshake's keypair per §4.9.
    pub fn promote_new(&mut self, kp: Keypair) {
        if kp.is_initiator {
            if self.next.is_some() {
                self.previous = self.next.take();
            } else {
                self.previous = self.current.take();
            }
            self.current = Some(kp);
        } else {
            self.previous = None;
            self.next = Some(kp);
        }
    }

    /// §4.11 step 6: the first inbound data packet accepted on `next`
    /// promotes it to `current`, discarding whatever `previous` held.
    pub fn promote_next_to_current_if(&mut self, local_index: u32) {
        if matches!(&self.next, Some(k) if k.local_index == local_index) {
            self.previous = self.current.take();
            self.current = self.next.take();
        }
    }

    pub fn destroy_all(&mut self) {
        self.previous = None;
        self.current = None;
        self.next = None;
    }

    /// All `local_index` values currently registered across the three
    /// slots, for [`crate::registry::generate_unique_index`] collision
    /// checks.
    pub fn local_indices(&self) -> impl Iterator<Item = u32> + '_ {
        [&self.previous, &self.current, &self.next]
            .into_iter()
            .filter_map(|k| k.as_ref().map(|k| k.local_index))
    }

    pub fn slot_by_local_index_mut(&mut self, idx: u32) -> Option<&mut Keypair> {
        for slot in [&mut self.previous, &mut self.current, &mut self.next] {
            if matches!(slot, Some(k) if k.local_index == idx) {
                return slot.as_mut();
            }
        }
        None
    }

    /// Destroys `current` (and everything downstream of it through
    /// `next`, since losing `current` means the handshake must restart)
    /// when expired or counter-exhausted (§4.12).
    pub fn expire_current(&mut self, now: Instant) {
        if matches!(&self.current, Some(k) if k.is_expired(now)) {
            self.current = None;
        }
    }
}
