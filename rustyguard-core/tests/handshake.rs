use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

use rand::SeedableRng;
use rustyguard_core::{
    AllowedIp, Event, InterfaceConfig, InterfaceContext, PeerConfig, PeerId, PublicKey,
    StaticSecret, Tai64N,
};

fn ipv4_packet(src: Ipv4Addr, dst: Ipv4Addr, payload: &[u8]) -> Vec<u8> {
    let mut pkt = vec![0u8; 20 + payload.len()];
    pkt[0] = 0x45;
    pkt[9] = 17;
    pkt[12..16].copy_from_slice(&src.octets());
    pkt[16..20].copy_from_slice(&dst.octets());
    pkt[20..].copy_from_slice(payload);
    pkt
}

struct Pair {
    alice: InterfaceContext,
    bob: InterfaceContext,
    alice_addr: SocketAddr,
    bob_addr: SocketAddr,
    alice_peer: PeerId,
    bob_peer: PeerId,
    rng: rand::rngs::StdRng,
}

impl Pair {
    fn new(seed: u64, bob_allowed: Vec<AllowedIp>, alice_allowed: Vec<AllowedIp>) -> Self {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let now = Instant::now();

        let alice_sk = StaticSecret::random_from_rng(&mut rng);
        let alice_pk = PublicKey::from(&alice_sk);
        let bob_sk = StaticSecret::random_from_rng(&mut rng);
        let bob_pk = PublicKey::from(&bob_sk);

        let alice_addr: SocketAddr = "127.0.0.1:51820".parse().unwrap();
        let bob_addr: SocketAddr = "127.0.0.1:51821".parse().unwrap();

        let mut alice = InterfaceContext::new(InterfaceConfig::new(alice_sk), now, &mut rng);
        let mut bob = InterfaceContext::new(InterfaceConfig::new(bob_sk), now, &mut rng);

        let mut alice_peer_cfg = PeerConfig::new(bob_pk).with_endpoint(bob_addr);
        for ip in alice_allowed {
            alice_peer_cfg = alice_peer_cfg.with_allowed_ip(ip);
        }
        let alice_peer = alice.add_peer(alice_peer_cfg).unwrap();

        let mut bob_peer_cfg = PeerConfig::new(alice_pk);
        for ip in bob_allowed {
            bob_peer_cfg = bob_peer_cfg.with_allowed_ip(ip);
        }
        let bob_peer = bob.add_peer(bob_peer_cfg).unwrap();

        Self {
            alice,
            bob,
            alice_addr,
            bob_addr,
            alice_peer,
            bob_peer,
            rng,
        }
    }

    /// Drives a full, uncontested (no cookie) Initiation/Response
    /// exchange to completion.
    fn complete_handshake(&mut self, now: Instant) {
        let (dst, mut init) = self
            .alice
            .create_initiation(self.alice_peer, now, Tai64N::now(), &mut self.rng)
            .unwrap();
        assert_eq!(dst, self.bob_addr);

        let mut events = Vec::new();
        self.bob
            .on_datagram(self.alice_addr, &mut init, false, now, &mut self.rng, &mut events);
        let Some(Event::SendDatagram { dst, mut payload }) = events.pop() else {
            panic!("bob did not reply to a clean initiation");
        };
        assert_eq!(dst, self.alice_addr);

        let mut events = Vec::new();
        self.alice
            .on_datagram(self.bob_addr, &mut payload, false, now, &mut self.rng, &mut events);
        assert!(events.is_empty(), "a response carries no further event");

        assert!(self.alice.peer(self.alice_peer).unwrap().keypairs.current.is_some());
        assert!(self.bob.peer(self.bob_peer).unwrap().keypairs.next.is_some());
    }
}

fn open_allowed_ips() -> Vec<AllowedIp> {
    vec![AllowedIp::V4 {
        addr: Ipv4Addr::new(0, 0, 0, 0),
        prefix_len: 0,
    }]
}

#[test]
fn full_handshake_then_data_round_trip() {
    let mut pair = Pair::new(1, open_allowed_ips(), open_allowed_ips());
    let now = Instant::now();
    pair.complete_handshake(now);

    let inner = ipv4_packet(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), b"hello");
    let mut events = Vec::new();
    pair.alice.accept_inner(pair.alice_peer, &inner, now, &mut events);
    let Some(Event::SendDatagram { mut payload, .. }) = events.pop() else {
        panic!("expected a data datagram");
    };

    let mut events = Vec::new();
    pair.bob
        .on_datagram(pair.alice_addr, &mut payload, false, now, &mut pair.rng, &mut events);
    match events.pop() {
        Some(Event::DeliverInner { peer, packet }) => {
            assert_eq!(peer, pair.bob_peer);
            assert_eq!(packet, inner);
        }
        other => panic!("expected delivered inner packet, got {other:?}"),
    }
    // bob's keypair was responder-originated and promotes next -> current
    // on its first successful receive.
    assert!(pair.bob.peer(pair.bob_peer).unwrap().keypairs.current.is_some());
}

#[test]
fn replayed_data_packet_is_dropped() {
    let mut pair = Pair::new(2, open_allowed_ips(), open_allowed_ips());
    let now = Instant::now();
    pair.complete_handshake(now);

    let inner = b"replay me";
    let mut events = Vec::new();
    pair.alice
        .accept_inner(pair.alice_peer, inner, now, &mut events);
    let Some(Event::SendDatagram { payload, .. }) = events.pop() else {
        panic!("expected a data datagram");
    };

    let mut first = payload.clone();
    let mut events = Vec::new();
    pair.bob
        .on_datagram(pair.alice_addr, &mut first, false, now, &mut pair.rng, &mut events);
    assert_eq!(events.len(), 1, "first delivery should succeed");

    let mut replay = payload;
    let mut events = Vec::new();
    pair.bob
        .on_datagram(pair.alice_addr, &mut replay, false, now, &mut pair.rng, &mut events);
    assert!(events.is_empty(), "replayed counter must be dropped");
    assert_eq!(pair.bob.stats.replay, 1);
}

#[test]
fn keepalive_produces_no_inner_delivery() {
    let mut pair = Pair::new(3, open_allowed_ips(), open_allowed_ips());
    let now = Instant::now();
    pair.complete_handshake(now);

    let mut events = Vec::new();
    pair.alice
        .send_keepalive_now(pair.alice_peer, now, &mut events)
        .unwrap();
    let Some(Event::SendDatagram { mut payload, .. }) = events.pop() else {
        panic!("expected a keep-alive datagram");
    };

    let mut events = Vec::new();
    pair.bob
        .on_datagram(pair.alice_addr, &mut payload, false, now, &mut pair.rng, &mut events);
    assert!(events.is_empty(), "a keep-alive never yields a deliverable packet");
    assert_eq!(pair.bob.stats.keepalives_rx, 1);
}

#[test]
fn inner_source_outside_allowed_ips_is_denied() {
    let narrow_allowed = vec![AllowedIp::V4 {
        addr: Ipv4Addr::new(10, 0, 0, 99),
        prefix_len: 32,
    }];
    let mut pair = Pair::new(4, narrow_allowed, open_allowed_ips());
    let now = Instant::now();
    pair.complete_handshake(now);

    let inner = ipv4_packet(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), b"denied");
    let mut events = Vec::new();
    pair.alice.accept_inner(pair.alice_peer, &inner, now, &mut events);
    let Some(Event::SendDatagram { mut payload, .. }) = events.pop() else {
        panic!("expected a data datagram");
    };

    let mut events = Vec::new();
    pair.bob
        .on_datagram(pair.alice_addr, &mut payload, false, now, &mut pair.rng, &mut events);
    assert!(events.is_empty(), "source not in AllowedIPs must be dropped");
    assert_eq!(pair.bob.stats.denied_ip, 1);
}

#[test]
fn overloaded_responder_sends_cookie_then_completes_on_retry() {
    let mut pair = Pair::new(5, open_allowed_ips(), open_allowed_ips());
    let now = Instant::now();

    let (_, mut init) = pair
        .alice
        .create_initiation(pair.alice_peer, now, Tai64N::now(), &mut pair.rng)
        .unwrap();

    let mut events = Vec::new();
    pair.bob
        .on_datagram(pair.alice_addr, &mut init, true, now, &mut pair.rng, &mut events);
    let Some(Event::SendDatagram { mut payload, .. }) = events.pop() else {
        panic!("an overloaded responder facing an uncookied initiation must reply");
    };
    assert_eq!(
        payload.len(),
        rustyguard_types::COOKIE_REPLY_LEN,
        "first reply under load must be a cookie, not a handshake response"
    );

    let mut events = Vec::new();
    pair.alice
        .on_datagram(pair.bob_addr, &mut payload, false, now, &mut pair.rng, &mut events);
    assert!(events.is_empty());
    assert_eq!(pair.bob.stats.invalid_mac2, 1);

    let (_, mut retry) = pair
        .alice
        .create_initiation(pair.alice_peer, now, Tai64N::now(), &mut pair.rng)
        .unwrap();

    let mut events = Vec::new();
    pair.bob
        .on_datagram(pair.alice_addr, &mut retry, true, now, &mut pair.rng, &mut events);
    let Some(Event::SendDatagram { mut payload, .. }) = events.pop() else {
        panic!("a cookied retry under load must complete the handshake");
    };
    assert_eq!(payload.len(), rustyguard_types::HANDSHAKE_RESP_LEN);

    let mut events = Vec::new();
    pair.alice
        .on_datagram(pair.bob_addr, &mut payload, false, now, &mut pair.rng, &mut events);
    assert!(events.is_empty());
    assert!(pair.alice.peer(pair.alice_peer).unwrap().keypairs.current.is_some());
}
