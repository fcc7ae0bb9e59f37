use std::time::Duration;

pub const REKEY_AFTER_MESSAGES: u64 = 1 << 60;
pub const REJECT_AFTER_MESSAGES: u64 = u64::MAX - (1 << 13) - 1;

pub const REKEY_TIMEOUT: Duration = Duration::from_secs(5);
pub const REKEY_AFTER_TIME: Duration = Duration::from_secs(120);
pub const REJECT_AFTER_TIME: Duration = Duration::from_secs(180);
pub const KEEPALIVE_TIMEOUT: Duration = Duration::from_secs(25);
pub const COOKIE_SECRET_MAX_AGE: Duration = Duration::from_secs(120);

/// `REJECT_AFTER_TIME - REKEY_AFTER_TIME`: how far ahead of a keypair's
/// expiry a rekey is triggered on send/receive (§4.10 step 8, §4.11
/// step 12).
pub const REKEY_MARGIN: Duration = Duration::from_secs(60);

pub const MAX_INITIATIONS_PER_SECOND: u32 = 2;
pub const INITIATION_RATE_LIMIT: Duration = Duration::from_millis(1000 / MAX_INITIATIONS_PER_SECOND as u64);

pub const WG_TIMER_PERIOD: Duration = Duration::from_millis(500);
