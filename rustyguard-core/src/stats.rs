/// Plain counters, one per drop/accept reason, grounded on
/// `wg_stats.h`'s `vpn_stats_update_*` call sites. Every failure path in
/// this crate increments exactly one of these, which is what makes the
/// "every drop is accounted for" property auditable.
#[derive(Debug, Default, Clone, Copy)]
pub struct Statistics {
    pub initiations_tx: u64,
    pub initiations_rx: u64,
    pub responses_tx: u64,
    pub responses_rx: u64,
    pub cookie_replies_tx: u64,
    pub cookie_replies_rx: u64,
    pub data_tx: u64,
    pub data_rx: u64,
    pub keepalives_tx: u64,
    pub keepalives_rx: u64,

    pub invalid_message: u64,
    pub invalid_mac1: u64,
    pub invalid_mac2: u64,
    pub auth_fail: u64,
    pub invalid_key: u64,
    pub unknown_peer: u64,
    pub replay: u64,
    pub key_expired: u64,
    pub denied_ip: u64,
    pub rate_limited: u64,
    pub back_pressure: u64,

    pub rekeys_initiated: u64,
    pub rekeys_completed: u64,
    pub keypairs_expired: u64,
}

impl Statistics {
    pub fn record(&mut self, err: crate::Error) {
        use crate::Error::*;
        let counter = match err {
            InvalidMessage => &mut self.invalid_message,
            InvalidMac1 => &mut self.invalid_mac1,
            InvalidMac2 => &mut self.invalid_mac2,
            AuthFail => &mut self.auth_fail,
            InvalidKey => &mut self.invalid_key,
            UnknownPeer => &mut self.unknown_peer,
            Replay => &mut self.replay,
            KeyExpired => &mut self.key_expired,
            NoRoute => &mut self.denied_ip,
            RateLimited => &mut self.rate_limited,
            BackPressure => &mut self.back_pressure,
        };
        *counter += 1;
    }
}
