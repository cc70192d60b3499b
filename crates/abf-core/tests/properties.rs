//! Property tests for the adaptive filter engine

use abf_core::domain::{
    AdaptiveBloomFilter, AdaptiveFilterConfig, AdaptiveFilterConfigBuilder, DigestFamily,
    SwapOutcome,
};
use abf_core::FilterError;
use proptest::collection::vec;
use proptest::prelude::*;

fn arb_config() -> impl Strategy<Value = AdaptiveFilterConfig> {
    (0u32..7, 3u32..8, 1usize..5, 1usize..5).prop_map(|(w, b, k, g)| {
        AdaptiveFilterConfigBuilder::new()
            .words(1 << w)
            .bits_per_word(1 << b)
            .hashes_per_group(k)
            .groups(g)
            .digest_family(DigestFamily::Sha512)
            .build()
            .expect("generated geometry fits a SHA-512 digest")
    })
}

fn arb_keys(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    vec(vec(any::<u8>(), 1..24), 1..max)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_no_false_negatives_without_swaps(
        config in arb_config(),
        keys in arb_keys(200),
    ) {
        let mut filter = AdaptiveBloomFilter::new(config).unwrap();
        for key in &keys {
            filter.insert(key);
            prop_assert!(filter.contains(key), "Key missing right after insert");
        }
        for key in &keys {
            prop_assert!(filter.contains(key));
        }
    }

    #[test]
    fn test_swap_terminates_with_postcondition(
        config in arb_config(),
        keys in arb_keys(200),
        probes in arb_keys(50),
    ) {
        let groups = config.groups;
        let mut filter = AdaptiveBloomFilter::new(config).unwrap();
        for key in &keys {
            filter.record(key);
        }

        for probe in &probes {
            let word = filter.word_index(probe);
            let original = filter.active_group(word);
            let outcome = filter.swap(probe);

            prop_assert!(outcome.fetches() <= groups);
            match outcome {
                SwapOutcome::Relieved { to, .. } => {
                    prop_assert_eq!(filter.active_group(word), to);
                    prop_assert!(!filter.contains(probe));
                }
                SwapOutcome::Exhausted { group, fetches, .. } => {
                    prop_assert_eq!(group, original);
                    prop_assert_eq!(filter.active_group(word), original);
                    prop_assert_eq!(fetches, groups);
                }
                SwapOutcome::Unavailable { group, .. } => {
                    prop_assert_eq!(groups, 1);
                    prop_assert_eq!(group, original);
                }
            }
        }
    }

    #[test]
    fn test_recorded_keys_survive_swaps(
        config in arb_config(),
        keys in arb_keys(200),
        probes in arb_keys(50),
    ) {
        let mut filter = AdaptiveBloomFilter::new(config).unwrap();
        for key in &keys {
            filter.record(key);
        }
        for probe in &probes {
            filter.swap(probe);
        }
        for key in &keys {
            prop_assert!(filter.contains(key), "Recorded key lost after swaps");
        }
    }

    #[test]
    fn test_swapped_word_matches_backing_pattern(
        config in arb_config(),
        keys in arb_keys(100),
        probe in vec(any::<u8>(), 1..24),
    ) {
        let mut filter = AdaptiveBloomFilter::new(config).unwrap();
        for key in &keys {
            filter.record(key);
        }

        let word = filter.word_index(&probe);
        if let SwapOutcome::Relieved { to, .. } | SwapOutcome::Exhausted { group: to, .. } =
            filter.swap(&probe)
        {
            let backing = filter.backing_store().unwrap();
            prop_assert_eq!(filter.live_word(word), backing.word_pattern(to, word));
        }
    }

    #[test]
    fn test_backing_store_only_grows(
        config in arb_config(),
        keys in arb_keys(100),
    ) {
        let mut filter = AdaptiveBloomFilter::new(config).unwrap();
        let mut previous = 0;
        for key in &keys {
            filter.record(key);
            let ones = filter.backing_store().map_or(0, |b| b.count_ones());
            prop_assert!(ones >= previous);
            previous = ones;
        }

        for key in &keys {
            filter.swap(key);
        }
        let after_swaps = filter.backing_store().map_or(0, |b| b.count_ones());
        prop_assert_eq!(after_swaps, previous, "Swaps never write the backing store");
    }

    #[test]
    fn test_non_power_of_two_words_rejected(words in 3usize..4096) {
        prop_assume!(!words.is_power_of_two());
        let result = AdaptiveFilterConfigBuilder::new().words(words).build();
        let is_not_power_of_two = matches!(
            result,
            Err(FilterError::NotPowerOfTwo { value, .. }) if value == words
        );
        prop_assert!(is_not_power_of_two);
    }
}
