use std::fmt;

use rustyguard_crypto::CryptoError;

/// All internal failure modes (§7). None of these ever travel back to a
/// peer or to the host stack as a visible protocol error: every call
/// site that produces one drops the offending message and bumps the
/// matching [`crate::Statistics`] counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    InvalidMessage,
    InvalidMac1,
    InvalidMac2,
    AuthFail,
    InvalidKey,
    UnknownPeer,
    Replay,
    KeyExpired,
    NoRoute,
    RateLimited,
    BackPressure,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::InvalidMessage => "malformed wire message",
            Error::InvalidMac1 => "mac1 verification failed",
            Error::InvalidMac2 => "mac2 verification failed",
            Error::AuthFail => "AEAD authentication failed",
            Error::InvalidKey => "Diffie-Hellman produced an invalid (all-zero) output",
            Error::UnknownPeer => "no configured peer for this static key",
            Error::Replay => "replayed timestamp or counter",
            Error::KeyExpired => "keypair expired or counter exhausted",
            Error::NoRoute => "inner source address not in AllowedIPs",
            Error::RateLimited => "initiation rate limit exceeded",
            Error::BackPressure => "datagram transport or upward delivery refused",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}

impl From<CryptoError> for Error {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::DecryptionError => Error::AuthFail,
            CryptoError::Rejected => Error::InvalidMac1,
            CryptoError::InvalidKey => Error::InvalidKey,
        }
    }
}
