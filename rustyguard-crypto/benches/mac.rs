use rand::rngs::StdRng;
use rand::SeedableRng;
use rustyguard_crypto::mac;

fn main() {
    divan::main();
}

#[divan::bench]
fn mac128(bencher: divan::Bencher) {
    let mut rng = StdRng::seed_from_u64(0);
    let key: [u8; 32] = rand::Rng::gen(&mut rng);
    let msg: [u8; 116] = rand::Rng::gen(&mut rng);

    bencher.bench_local(|| mac(divan::black_box(&key), divan::black_box(&msg)));
}
