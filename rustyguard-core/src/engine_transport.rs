use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Instant;

use rustyguard_types::{Tag, TransportHeader, MSG_DATA, TRANSPORT_HEADER_LEN};
use zerocopy::{little_endian, AsBytes};

use crate::allowed_ip;
use crate::constants::REKEY_AFTER_MESSAGES;
use crate::error::Error;
use crate::event::Event;
use crate::interface::InterfaceContext;
use crate::peer::PeerId;
use crate::registry;

fn pad_to_16(len: usize) -> usize {
    (len + 15) / 16 * 16
}

impl InterfaceContext {
    /// §4.10: seals `plaintext` (padded to a 16-byte boundary, §6) under
    /// the peer's current sending keypair and enqueues the resulting
    /// datagram. An empty `plaintext` is a keep-alive.
    pub fn send_data(
        &mut self,
        peer_id: PeerId,
        plaintext: &[u8],
        now: Instant,
        events: &mut Vec<Event>,
    ) -> Result<(), Error> {
        let peer = self.peers.get_mut(&peer_id).ok_or(Error::UnknownPeer)?;
        let dst = peer.current_endpoint.ok_or(Error::NoRoute)?;
        let padded_len = pad_to_16(plaintext.len());
        let mut buf = vec![0u8; TRANSPORT_HEADER_LEN + padded_len + 16];

        let remote_index;
        let counter;
        {
            let kp = peer.keypairs.current.as_mut().ok_or(Error::KeyExpired)?;
            if !kp.is_sending_valid() || kp.is_rejected(now) {
                peer.send_handshake = true;
                log::debug!("peer {peer_id:?}: sending key expired, rekey requested");
                return Err(Error::KeyExpired);
            }
            if kp.expires_soon(now) || kp.sending_counter >= REKEY_AFTER_MESSAGES {
                peer.send_handshake = true;
                log::trace!("peer {peer_id:?}: sending key nearing expiry, rekey requested");
            }

            remote_index = kp.remote_index;
            counter = kp.sending_counter;
            kp.sending_counter += 1;

            let header = TransportHeader {
                message_type: little_endian::U32::new(MSG_DATA),
                receiver: little_endian::U32::new(remote_index),
                counter: little_endian::U64::new(counter),
            };
            buf[..TRANSPORT_HEADER_LEN].copy_from_slice(header.as_bytes());
            buf[TRANSPORT_HEADER_LEN..TRANSPORT_HEADER_LEN + plaintext.len()]
                .copy_from_slice(plaintext);

            let tag = kp.sending.seal_in_place(
                counter,
                &mut buf[TRANSPORT_HEADER_LEN..TRANSPORT_HEADER_LEN + padded_len],
            );
            buf[TRANSPORT_HEADER_LEN + padded_len..].copy_from_slice(tag.as_array());
            kp.last_tx = Some(now);
        }

        peer.last_tx = Some(now);
        let is_keepalive = plaintext.is_empty();
        if is_keepalive {
            self.stats.keepalives_tx += 1;
        } else {
            self.stats.data_tx += 1;
        }
        events.push(Event::SendDatagram { dst, payload: buf });
        Ok(())
    }

    pub fn send_keepalive_now(
        &mut self,
        peer_id: PeerId,
        now: Instant,
        events: &mut Vec<Event>,
    ) -> Result<(), Error> {
        self.send_data(peer_id, &[], now, events)
    }

    /// §4.11: opens a received TransportData message against whichever
    /// keypair slot owns `header.receiver`, checks the anti-replay
    /// window, promotes `next` to `current` on first successful receive,
    /// and (for non-keep-alive payloads) filters the inner packet's
    /// source address against the peer's AllowedIPs before handing it
    /// upward.
    pub fn handle_data(
        &mut self,
        src: SocketAddr,
        header: TransportHeader,
        ciphertext_and_tag: &mut [u8],
        now: Instant,
        events: &mut Vec<Event>,
    ) -> Result<(), Error> {
        if ciphertext_and_tag.len() < 16 {
            return Err(Error::InvalidMessage);
        }
        let local_index = header.receiver.get();
        let counter = header.counter.get();

        let peer_id =
            registry::lookup_by_receiver(&self.peers, local_index).ok_or(Error::UnknownPeer)?;
        let peer = self.peers.get_mut(&peer_id).ok_or(Error::UnknownPeer)?;

        let (ct, tag_bytes) =
            ciphertext_and_tag.split_at_mut(ciphertext_and_tag.len() - 16);
        let tag = Tag::from_bytes(tag_bytes.try_into().unwrap());

        let is_keepalive;
        {
            let slot = peer
                .keypairs
                .slot_by_local_index_mut(local_index)
                .ok_or(Error::UnknownPeer)?;
            if slot.is_expired(now) || slot.is_rejected(now) {
                log::debug!("peer {peer_id:?}: data on expired keypair (local_index={local_index})");
                return Err(Error::KeyExpired);
            }
            if !slot.replay.check(counter) {
                log::warn!("peer {peer_id:?}: replayed counter {counter} from {src}");
                return Err(Error::Replay);
            }

            let plaintext = slot.receiving.open_in_place(counter, ct, &tag)?;
            slot.last_rx = Some(now);
            is_keepalive = plaintext.is_empty();
        }

        peer.keypairs.promote_next_to_current_if(local_index);
        peer.current_endpoint = Some(src);
        peer.last_rx = Some(now);

        if is_keepalive {
            self.stats.keepalives_rx += 1;
            return Ok(());
        }
        self.stats.data_rx += 1;

        if !source_allowed(&peer.allowed_ips, ct) {
            log::warn!("peer {peer_id:?}: inner packet source not in allowed ips, dropped");
            return Err(Error::NoRoute);
        }

        events.push(Event::DeliverInner {
            peer: peer_id,
            packet: ct.to_vec(),
        });
        Ok(())
    }
}

/// §4.11 step 9: the inner packet's IP version selects which AllowedIPs
/// family to check; an inner packet too short to carry the relevant
/// source-address field, or of neither version, is denied.
fn source_allowed(allowed_ips: &[crate::allowed_ip::AllowedIp], packet: &[u8]) -> bool {
    match packet.first().map(|b| b >> 4) {
        Some(4) if packet.len() >= 20 => {
            let src = Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]);
            allowed_ip::allows_v4(allowed_ips, src)
        }
        Some(6) if packet.len() >= 40 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&packet[8..24]);
            allowed_ip::allows_v6(allowed_ips, Ipv6Addr::from(octets))
        }
        _ => false,
    }
}
