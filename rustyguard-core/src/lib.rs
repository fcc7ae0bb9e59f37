//! A WireGuard endpoint core: the Noise_IKpsk2 handshake engine,
//! per-peer session lifecycle, and the encrypted transport data path.
//!
//! This crate owns none of the I/O: UDP socket reads/writes and the
//! virtual network interface are external collaborators. Entry points
//! ([`InterfaceContext::on_datagram`], [`InterfaceContext::accept_inner`],
//! [`InterfaceContext::tick`]) take what they need as parameters and
//! push side effects ([`Event`]) into a caller-supplied sink instead of
//! performing I/O directly.
//!
//! Concurrency: one [`InterfaceContext`] per virtual tunnel, one mutex
//! around it. This crate does not take that mutex itself; a caller
//! driving it from multiple threads (a UDP receive loop and a TUN
//! receive loop, say) is responsible for serializing access.

pub mod allowed_ip;
mod codec;
pub mod config;
pub mod constants;
mod engine_handshake;
mod engine_transport;
pub mod error;
pub mod event;
pub mod handshake;
mod interface;
pub mod keypair;
pub mod peer;
mod registry;
mod scheduler;
pub mod stats;

pub use allowed_ip::AllowedIp;
pub use codec::Message;
pub use config::{InterfaceConfig, PeerConfig};
pub use error::Error;
pub use event::Event;
pub use interface::InterfaceContext;
pub use peer::{Peer, PeerId};
pub use stats::Statistics;

pub use rustyguard_crypto::{Key, PublicKey, StaticSecret};
pub use tai64::Tai64N;

use std::net::SocketAddr;
use std::time::Instant;

use rand_core::{CryptoRng, RngCore};

impl InterfaceContext {
    /// Top-level dispatch for one received UDP datagram (§1, §4.5):
    /// classifies it by message type and routes to the matching
    /// handler. Every failure is recorded in [`Statistics`] rather than
    /// surfaced to the caller — a dropped, malformed, or unauthenticated
    /// message is normal operation, not an error the caller must act on.
    pub fn on_datagram(
        &mut self,
        src: SocketAddr,
        buf: &mut [u8],
        overload: bool,
        now: Instant,
        rng: &mut (impl CryptoRng + RngCore),
        events: &mut Vec<Event>,
    ) {
        let result = match codec::decode(buf) {
            Ok(Message::Init(msg)) => self
                .handle_initiation(src, msg, overload, now, rng)
                .map(|(dst, payload)| events.push(Event::SendDatagram { dst, payload })),
            Ok(Message::Response(resp)) => self.handle_response(src, resp, now),
            Ok(Message::Cookie(reply)) => self.handle_cookie_reply(src, &reply, now),
            Ok(Message::Data(header, tail)) => self.handle_data(src, header, tail, now, events),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            log::debug!("dropping datagram from {src}: {e}");
            self.stats.record(e);
        }
    }

    /// Entry point for a plaintext packet handed down from the host
    /// network stack (§1's "inner packet accept" collaborator),
    /// addressed to `peer`.
    pub fn accept_inner(
        &mut self,
        peer: PeerId,
        packet: &[u8],
        now: Instant,
        events: &mut Vec<Event>,
    ) {
        if let Err(e) = self.send_data(peer, packet, now, events) {
            log::debug!("dropping outbound packet for {peer:?}: {e}");
            self.stats.record(e);
        }
    }
}
