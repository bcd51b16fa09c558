use ovs_core::{derive_substream_seed, Side};

/// Derives the deterministic seed for one side's sampling stream.
///
/// Each side owns its stream for the whole session; stage transitions never
/// reseed, so a run is a pure function of the master seed.
pub fn side_seed(master_seed: u64, side: Side) -> u64 {
    derive_substream_seed(master_seed, side.index() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sides_get_distinct_streams() {
        let reference = side_seed(42, Side::Reference);
        let target = side_seed(42, Side::Target);
        assert_ne!(reference, target);
        assert_eq!(reference, side_seed(42, Side::Reference));
    }
}
