use rustyguard_types::{
    CookieReply, HandshakeInit, HandshakeResp, TransportHeader, COOKIE_REPLY_LEN,
    HANDSHAKE_INIT_LEN, HANDSHAKE_RESP_LEN, MSG_COOKIE, MSG_DATA, MSG_FIRST, MSG_SECOND,
    TRANSPORT_HEADER_LEN,
};
use zerocopy::FromBytes;

use crate::Error;

/// A received UDP payload, classified by its first four bytes
/// (message_type as a little-endian u32, §4.5) and reinterpreted
/// as the matching wire struct. `TransportData`'s fixed header is
/// copied out (it's small and `Copy`); the variable-length ciphertext
/// tail is handed back as a mutable slice for in-place AEAD opening.
pub enum Message<'a> {
    Init(&'a mut HandshakeInit),
    Response(&'a mut HandshakeResp),
    Cookie(CookieReply),
    Data(TransportHeader, &'a mut [u8]),
}

pub fn decode(buf: &mut [u8]) -> Result<Message<'_>, Error> {
    if buf.len() < 4 {
        return Err(Error::InvalidMessage);
    }
    let message_type = u32::from_le_bytes(buf[0..4].try_into().unwrap());

    match message_type {
        MSG_FIRST => {
            if buf.len() != HANDSHAKE_INIT_LEN {
                return Err(Error::InvalidMessage);
            }
            let init = HandshakeInit::mut_from(buf).ok_or(Error::InvalidMessage)?;
            Ok(Message::Init(init))
        }
        MSG_SECOND => {
            if buf.len() != HANDSHAKE_RESP_LEN {
                return Err(Error::InvalidMessage);
            }
            let resp = HandshakeResp::mut_from(buf).ok_or(Error::InvalidMessage)?;
            Ok(Message::Response(resp))
        }
        MSG_COOKIE => {
            if buf.len() != COOKIE_REPLY_LEN {
                return Err(Error::InvalidMessage);
            }
            let reply = CookieReply::read_from(&buf[..]).ok_or(Error::InvalidMessage)?;
            Ok(Message::Cookie(reply))
        }
        MSG_DATA => {
            if buf.len() < TRANSPORT_HEADER_LEN {
                return Err(Error::InvalidMessage);
            }
            let header =
                TransportHeader::read_from_prefix(&buf[..]).ok_or(Error::InvalidMessage)?;
            let (_head, tail) = buf.split_at_mut(TRANSPORT_HEADER_LEN);
            Ok(Message::Data(header, tail))
        }
        _ => Err(Error::InvalidMessage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf_of(message_type: u32, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        buf[0..4].copy_from_slice(&message_type.to_le_bytes());
        buf
    }

    #[test]
    fn classifies_each_message_type() {
        let mut init = buf_of(MSG_FIRST, HANDSHAKE_INIT_LEN);
        assert!(matches!(decode(&mut init), Ok(Message::Init(_))));

        let mut resp = buf_of(MSG_SECOND, HANDSHAKE_RESP_LEN);
        assert!(matches!(decode(&mut resp), Ok(Message::Response(_))));

        let mut cookie = buf_of(MSG_COOKIE, COOKIE_REPLY_LEN);
        assert!(matches!(decode(&mut cookie), Ok(Message::Cookie(_))));

        let mut data = buf_of(MSG_DATA, TRANSPORT_HEADER_LEN + 16);
        assert!(matches!(decode(&mut data), Ok(Message::Data(_, _))));
    }

    #[test]
    fn rejects_wrong_length_for_fixed_messages() {
        let mut short_init = buf_of(MSG_FIRST, HANDSHAKE_INIT_LEN - 1);
        assert_eq!(decode(&mut short_init), Err(Error::InvalidMessage));
    }

    #[test]
    fn rejects_unknown_message_type() {
        let mut buf = buf_of(0xDEAD_BEEF, 32);
        assert_eq!(decode(&mut buf), Err(Error::InvalidMessage));
    }

    #[test]
    fn rejects_too_short_to_carry_a_type() {
        let mut buf = vec![0u8; 2];
        assert_eq!(decode(&mut buf), Err(Error::InvalidMessage));
    }
}
