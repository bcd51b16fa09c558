use ovs_core::rng::{derive_substream_seed, RngHandle};
use rand::RngCore;

#[test]
fn rng_emits_reproducible_sequence() {
    let mut rng_a = RngHandle::from_seed(1234);
    let mut rng_b = RngHandle::from_seed(1234);

    let seq_a: Vec<u64> = (0..100).map(|_| rng_a.next_u64()).collect();
    let seq_b: Vec<u64> = (0..100).map(|_| rng_b.next_u64()).collect();

    assert_eq!(seq_a, seq_b);
}

#[test]
fn unit_draws_stay_in_range() {
    let mut rng = RngHandle::from_seed(0xFEED);
    for _ in 0..1000 {
        let draw = rng.next_unit();
        assert!((0.0..=1.0).contains(&draw));
    }
}

#[test]
fn substream_seeds_are_stable_and_distinct() {
    let master = 0xABCD_EF01;
    let first = derive_substream_seed(master, 0);
    assert_eq!(first, derive_substream_seed(master, 0));
    assert_ne!(first, derive_substream_seed(master, 1));
    assert_ne!(first, derive_substream_seed(master ^ 1, 0));
}
