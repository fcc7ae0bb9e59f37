use std::net::SocketAddr;

use crate::peer::PeerId;

/// A side effect the engine wants performed. Both public entry points
/// (`on_datagram`, `accept_inner`, `tick`) push these into a caller
/// supplied sink rather than doing I/O themselves — sending the
/// datagram and delivering the inner packet upward are both named as
/// external collaborators (§1, §6).
#[derive(Debug)]
pub enum Event {
    /// Enqueue `payload` to be sent as a UDP datagram to `dst`.
    SendDatagram { dst: SocketAddr, payload: Vec<u8> },
    /// Deliver a decrypted, filtered inner packet to the host stack for
    /// `peer`.
    DeliverInner { peer: PeerId, packet: Vec<u8> },
}
