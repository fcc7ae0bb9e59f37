use rand::rngs::StdRng;
use rand::SeedableRng;
use rustyguard_crypto::{
    decrypt_handshake_init_ephemeral, decrypt_handshake_init_static, encrypt_handshake_init,
    HandshakeState, StaticInitiatorConfig, StaticPeerConfig, StaticSecret,
};
use tai64::Tai64N;

fn main() {
    divan::main();
}

struct Fixture {
    initiator: StaticInitiatorConfig,
    responder: StaticInitiatorConfig,
    peer_of_initiator: StaticPeerConfig,
    peer_of_responder: StaticPeerConfig,
}

fn fixture() -> Fixture {
    let mut rng = StdRng::seed_from_u64(3);
    let i_sk = StaticSecret::random_from_rng(&mut rng);
    let r_sk = StaticSecret::random_from_rng(&mut rng);
    let i_pk = (&i_sk).into();
    let r_pk = (&r_sk).into();

    let initiator = StaticInitiatorConfig::new(i_sk);
    let responder = StaticInitiatorConfig::new(r_sk);
    let peer_of_initiator = StaticPeerConfig::new(&initiator.private_key, r_pk, None).unwrap();
    let peer_of_responder = StaticPeerConfig::new(&responder.private_key, i_pk, None).unwrap();

    Fixture {
        initiator,
        responder,
        peer_of_initiator,
        peer_of_responder,
    }
}

#[divan::bench]
fn handshake_init_round_trip(bencher: divan::Bencher) {
    let fixture = fixture();
    let mut rng = StdRng::seed_from_u64(4);

    bencher.bench_local(|| {
        let esk_i = StaticSecret::random_from_rng(&mut rng);
        let mut hs_i = HandshakeState::default();
        let mut init = encrypt_handshake_init(
            &mut hs_i,
            &fixture.initiator,
            &fixture.peer_of_initiator,
            &esk_i,
            Tai64N(tai64::Tai64(0), 0),
            1,
            None,
        );

        let mut hs_r = HandshakeState::default();
        decrypt_handshake_init_ephemeral(&mut init, &mut hs_r, &fixture.responder).unwrap();
        decrypt_handshake_init_static(&mut init, &mut hs_r, &fixture.peer_of_responder).unwrap();
    });
}
