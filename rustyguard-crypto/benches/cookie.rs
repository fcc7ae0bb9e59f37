use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustyguard_crypto::{cookie_key, decrypt_cookie, encrypt_cookie, CookieState, PublicKey};
use rustyguard_types::Cookie;

fn main() {
    divan::main();
}

#[divan::bench]
fn generate_cookie(bencher: divan::Bencher) {
    let mut rng = StdRng::seed_from_u64(1);
    let mut state = CookieState::default();
    state.generate(&mut rng);
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(198, 51, 100, 7)), 51820);

    bencher.bench_local(|| state.new_cookie(divan::black_box(addr)));
}

#[divan::bench]
fn encrypt_then_decrypt(bencher: divan::Bencher) {
    let mut rng = StdRng::seed_from_u64(2);
    let peer_key = PublicKey::from(rand::Rng::gen::<[u8; 32]>(&mut rng));
    let key = cookie_key(&peer_key);
    let nonce: [u8; 24] = rand::Rng::gen(&mut rng);
    let aad = [0u8; 16];

    bencher.bench_local(|| {
        let cookie = Cookie(rand::Rng::gen(&mut rng));
        let mut encrypted = encrypt_cookie(cookie, &key, &nonce, &aad);
        decrypt_cookie(&mut encrypted, &key, &nonce, &aad).unwrap();
    });
}
