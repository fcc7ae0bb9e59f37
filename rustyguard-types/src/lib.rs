#![no_std]

//! Wire layouts for the four WireGuard message types.
//!
//! Every struct here is `repr(C)` and derives `zerocopy`'s `FromBytes`/
//! `AsBytes`/`FromZeroes` so a received UDP payload can be reinterpreted
//! in place without a copy. Type and reserved bytes are folded together
//! into a single little-endian `u32` (byte 0 is the type, bytes 1..3 are
//! the reserved zeroes) so "reserved must be zero" falls out of "the
//! value equals the expected constant".

use zerocopy::little_endian::{U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes};

pub const MSG_FIRST: u32 = 1;
pub const MSG_SECOND: u32 = 2;
pub const MSG_COOKIE: u32 = 3;
pub const MSG_DATA: u32 = 4;

pub const HANDSHAKE_INIT_LEN: usize = 148;
pub const HANDSHAKE_RESP_LEN: usize = 92;
pub const COOKIE_REPLY_LEN: usize = 64;
pub const TRANSPORT_HEADER_LEN: usize = 16;

#[derive(Clone, Copy, Default, PartialEq, Eq, FromBytes, FromZeroes, AsBytes)]
#[repr(transparent)]
pub struct Tag([u8; 16]);

impl Tag {
    pub fn as_array(&self) -> &[u8; 16] {
        &self.0
    }
    pub fn from_bytes(b: [u8; 16]) -> Self {
        Self(b)
    }
}

#[derive(Clone, Copy, Default, PartialEq, Eq, FromBytes, FromZeroes, AsBytes)]
#[repr(transparent)]
pub struct Cookie(pub [u8; 16]);

impl Cookie {
    pub fn as_array(&self) -> &[u8; 16] {
        &self.0
    }
    pub fn from_bytes(b: [u8; 16]) -> Self {
        Self(b)
    }
}

macro_rules! encrypted_field {
    ($name:ident, $n:literal) => {
        #[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes)]
        #[repr(C)]
        pub struct $name {
            pub msg: [u8; $n],
            pub tag: Tag,
        }
    };
}

encrypted_field!(EncryptedEmpty, 0);
encrypted_field!(EncryptedTimestamp, 12);
encrypted_field!(EncryptedPublicKey, 32);

#[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct EncryptedCookie {
    pub msg: Cookie,
    pub tag: Tag,
}

/// 5.4.2 First Message: Initiator to Responder.
#[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct HandshakeInit {
    pub message_type: U32,
    pub sender: U32,
    pub ephemeral_key: [u8; 32],
    pub static_key: EncryptedPublicKey,
    pub timestamp: EncryptedTimestamp,
    pub mac1: [u8; 16],
    pub mac2: [u8; 16],
}

/// 5.4.3 Second Message: Responder to Initiator.
#[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct HandshakeResp {
    pub message_type: U32,
    pub sender: U32,
    pub receiver: U32,
    pub ephemeral_key: [u8; 32],
    pub empty: EncryptedEmpty,
    pub mac1: [u8; 16],
    pub mac2: [u8; 16],
}

/// 5.4.7 Under Load: Cookie Reply Message.
#[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct CookieReply {
    pub message_type: U32,
    pub receiver: U32,
    pub nonce: [u8; 24],
    pub cookie: EncryptedCookie,
}

/// Fixed header of 5.4.6 Subsequent Messages; the encrypted packet
/// itself is a variable-length tail handled as a raw byte slice by the
/// caller rather than as part of this struct.
#[derive(Clone, Copy, FromBytes, FromZeroes, AsBytes)]
#[repr(C)]
pub struct TransportHeader {
    pub message_type: U32,
    pub receiver: U32,
    pub counter: U64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_sizes() {
        assert_eq!(core::mem::size_of::<HandshakeInit>(), HANDSHAKE_INIT_LEN);
        assert_eq!(core::mem::size_of::<HandshakeResp>(), HANDSHAKE_RESP_LEN);
        assert_eq!(core::mem::size_of::<CookieReply>(), COOKIE_REPLY_LEN);
        assert_eq!(core::mem::size_of::<TransportHeader>(), TRANSPORT_HEADER_LEN);
    }

    #[test]
    fn message_type_is_first_byte_of_le_u32() {
        let v = U32::new(MSG_FIRST);
        assert_eq!(v.as_bytes()[0], 1);
        assert_eq!(&v.as_bytes()[1..], &[0, 0, 0]);
    }
}
