mod common;

use common::test_utils::{
    TEST_CAPACITY, TEST_FPR, as_slices, generate_test_items, rotating_config,
    still_config,
};
use rotating_bloom_rs::rotating::MAX_TTL;
use rotating_bloom_rs::{
    BloomFilter, FilterError, FilterKind, FilterRef, HashStrategy, Mismatch,
    NoCompression, RotatingBloomFilter,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn create_still_filter(hash_strategy: HashStrategy) -> RotatingBloomFilter {
    RotatingBloomFilter::new(still_config(hash_strategy))
        .expect("Failed to create rotating filter")
}

#[cfg(test)]
mod sliding_window_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_element_lives_for_two_to_three_ttls() {
        let ttl = Duration::from_millis(5);
        let filter = RotatingBloomFilter::new(rotating_config(
            TEST_CAPACITY,
            TEST_FPR,
            HashStrategy::Optimal,
            ttl,
        ))
        .unwrap();

        filter.add(b"test").unwrap();
        assert!(filter.check(b"test").unwrap(), "visible right away");

        // halfway between ticks so every check sees a settled state
        tokio::time::sleep(ttl + ttl / 2).await;
        assert!(filter.check(b"test").unwrap(), "visible after 1 tick");

        tokio::time::sleep(ttl).await;
        assert!(filter.check(b"test").unwrap(), "visible after 2 ticks");

        tokio::time::sleep(ttl).await;
        assert!(!filter.check(b"test").unwrap(), "gone after 3 ticks");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_hands_down_generations() {
        let ttl = Duration::from_millis(10);
        let filter = RotatingBloomFilter::new(rotating_config(
            TEST_CAPACITY,
            TEST_FPR,
            HashStrategy::Default,
            ttl,
        ))
        .unwrap();
        filter.add(b"x").unwrap();

        let [previous, current, next] = filter.generation_fill_ratios().unwrap();
        assert_eq!(previous, 0.0);
        assert!(current > 0.0);
        assert_eq!(current, next);

        tokio::time::sleep(ttl + ttl / 2).await;
        let [previous, current, next] = filter.generation_fill_ratios().unwrap();
        assert!(previous > 0.0);
        assert!(current > 0.0);
        assert_eq!(next, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_scope_stops_rotation() {
        let ttl = Duration::from_millis(5);
        let scope = CancellationToken::new();
        let filter = RotatingBloomFilter::with_scope(
            rotating_config(TEST_CAPACITY, TEST_FPR, HashStrategy::Optimal, ttl),
            &scope,
        )
        .unwrap();
        filter.add(b"kept").unwrap();

        scope.cancel();
        tokio::time::sleep(ttl * 10).await;
        assert!(!filter.is_rotating());
        assert!(filter.check(b"kept").unwrap(), "no rotation after cancel");
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_rotation() {
        let ttl = Duration::from_millis(5);
        let filter = RotatingBloomFilter::new(rotating_config(
            TEST_CAPACITY,
            TEST_FPR,
            HashStrategy::Optimal,
            ttl,
        ))
        .unwrap();
        filter.add(b"kept").unwrap();

        filter.close();
        filter.close();
        tokio::time::sleep(ttl * 10).await;
        assert!(filter.check(b"kept").unwrap());
    }
}

#[cfg(test)]
mod membership_tests {
    use super::*;

    #[tokio::test]
    async fn test_no_false_negatives() {
        let filter = create_still_filter(HashStrategy::Optimal);
        let items = generate_test_items("member", TEST_CAPACITY);
        filter.add_bulk(&as_slices(&items)).unwrap();

        let checks = filter.check_bulk(&as_slices(&items)).unwrap();
        assert!(checks.iter().all(|&present| present));
    }

    #[tokio::test]
    async fn test_fill_ratio_is_monotonic_without_rotation() {
        let filter = create_still_filter(HashStrategy::Default);
        let mut last = filter.fill_ratio().unwrap();
        for item in generate_test_items("fill", 200) {
            filter.add(&item).unwrap();
            let ratio = filter.fill_ratio().unwrap();
            assert!(ratio >= last);
            assert!((0.0..=1.0).contains(&ratio));
            last = ratio;
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = RotatingBloomFilter::new(rotating_config(
            TEST_CAPACITY,
            TEST_FPR,
            HashStrategy::Optimal,
            Duration::ZERO,
        ))
        .unwrap_err();
        assert!(matches!(err, FilterError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_unbounded_ttl_is_rejected() {
        for ttl in [Duration::MAX, Duration::from_secs(u64::MAX)] {
            let err = RotatingBloomFilter::new(rotating_config(
                TEST_CAPACITY,
                TEST_FPR,
                HashStrategy::Optimal,
                ttl,
            ))
            .unwrap_err();
            assert!(matches!(err, FilterError::InvalidConfig(_)), "{ttl:?}");
        }
    }

    #[tokio::test]
    async fn test_longest_ttl_keeps_rotation_task_alive() {
        let filter = RotatingBloomFilter::new(rotating_config(
            TEST_CAPACITY,
            TEST_FPR,
            HashStrategy::Optimal,
            MAX_TTL,
        ))
        .unwrap();

        // let the task reach its first tick
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(filter.is_rotating());
        filter.add(b"kept").unwrap();
        assert!(filter.check(b"kept").unwrap());
    }
}

#[cfg(test)]
mod union_tests {
    use super::*;

    #[tokio::test]
    async fn test_union_merges_every_generation() {
        let ours = create_still_filter(HashStrategy::Optimal);
        let theirs = create_still_filter(HashStrategy::Optimal);
        ours.add(b"a").unwrap();
        theirs.add(b"b").unwrap();

        let ratio = ours.union(FilterRef::from(&theirs)).unwrap();
        assert_eq!(ratio, ours.fill_ratio().unwrap());
        assert!(ours.check(b"a").unwrap());
        assert!(ours.check(b"b").unwrap());
        assert!(!theirs.check(b"a").unwrap());
    }

    #[tokio::test]
    async fn test_union_rejects_different_n() {
        let ours = RotatingBloomFilter::new(rotating_config(
            100,
            TEST_FPR,
            HashStrategy::Optimal,
            Duration::from_secs(3600),
        ))
        .unwrap();
        let theirs = RotatingBloomFilter::new(rotating_config(
            1,
            TEST_FPR,
            HashStrategy::Optimal,
            Duration::from_secs(3600),
        ))
        .unwrap();

        let err = ours.union(FilterRef::from(&theirs)).unwrap_err();
        assert!(matches!(
            err,
            FilterError::ConfigMismatch(Mismatch::Capacity {
                ours: 100,
                theirs: 1
            })
        ));
        assert!(err.to_string().contains("different n values 100 vs. 1"));
    }

    #[tokio::test]
    async fn test_union_rejects_different_p() {
        let ours = create_still_filter(HashStrategy::Optimal);
        let theirs = RotatingBloomFilter::new(rotating_config(
            TEST_CAPACITY,
            0.5,
            HashStrategy::Optimal,
            Duration::from_secs(3600),
        ))
        .unwrap();

        let err = ours.union(FilterRef::from(&theirs)).unwrap_err();
        assert!(
            err.to_string().contains("different p values 0.001 vs. 0.5"),
            "{err}"
        );
    }

    #[tokio::test]
    async fn test_union_rejects_different_hashers() {
        let ours = create_still_filter(HashStrategy::Default);
        let theirs = create_still_filter(HashStrategy::Optimal);
        theirs.add(b"x").unwrap();

        let err = ours.union(FilterRef::from(&theirs)).unwrap_err();
        assert!(matches!(err, FilterError::HashIncompatible));
        assert_eq!(ours.fill_ratio().unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_union_rejects_static_operand() {
        let ours = create_still_filter(HashStrategy::Optimal);
        let other = BloomFilter::new(still_config(HashStrategy::Optimal).bloom)
            .unwrap();

        match ours.union(FilterRef::from(&other)) {
            Err(FilterError::IncompatibleType { expected, found }) => {
                assert_eq!(expected, FilterKind::Rotating);
                assert_eq!(found, FilterKind::Static);
            }
            other => panic!("Expected IncompatibleType, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_union_with_encoded_peer() {
        let ours = create_still_filter(HashStrategy::Optimal);
        let peer = create_still_filter(HashStrategy::Optimal);
        peer.add(b"from-peer").unwrap();

        let bytes = peer.marshal_binary().unwrap();
        ours.union_encoded(&bytes).unwrap();
        assert!(ours.check(b"from-peer").unwrap());

        assert!(matches!(
            ours.union_encoded(b"not a filter"),
            Err(FilterError::DecodeError(_))
        ));
    }

    #[tokio::test]
    async fn test_union_with_encoded_static_is_incompatible() {
        let ours = create_still_filter(HashStrategy::Optimal);
        let other = BloomFilter::new(still_config(HashStrategy::Optimal).bloom)
            .unwrap();
        let bytes = rotating_bloom_rs::codec::encode_bloom(&other).unwrap();

        assert!(matches!(
            ours.union_encoded(&bytes),
            Err(FilterError::IncompatibleType {
                expected: FilterKind::Rotating,
                found: FilterKind::Static,
            })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_union_during_concurrent_adds() {
        let ours = Arc::new(create_still_filter(HashStrategy::Optimal));
        let theirs = create_still_filter(HashStrategy::Optimal);
        let remote = generate_test_items("remote", 50);
        theirs.add_bulk(&as_slices(&remote)).unwrap();

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let filter = Arc::clone(&ours);
                std::thread::spawn(move || {
                    let items = generate_test_items(&format!("local{t}"), 100);
                    for item in &items {
                        filter.add(item).unwrap();
                    }
                    items
                })
            })
            .collect();

        for _ in 0..20 {
            ours.union(FilterRef::from(&theirs)).unwrap();
        }

        for writer in writers {
            for item in writer.join().unwrap() {
                assert!(ours.check(&item).unwrap(), "lost a concurrent add");
            }
        }
        for item in &remote {
            assert!(ours.check(item).unwrap(), "lost a merged element");
        }
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_preserves_checks() {
        let filter = create_still_filter(HashStrategy::Default);
        let items = generate_test_items("rt", 50);
        filter.add_bulk(&as_slices(&items)).unwrap();
        let unseen = generate_test_items("unseen", 200);

        let restored =
            RotatingBloomFilter::from_bytes(&filter.marshal_binary().unwrap())
                .unwrap();
        assert_eq!(restored.config().unwrap(), filter.config().unwrap());
        for item in items.iter().chain(&unseen) {
            assert_eq!(
                restored.check(item).unwrap(),
                filter.check(item).unwrap()
            );
        }
        assert!(restored.is_rotating());
    }

    #[tokio::test]
    async fn test_unmarshal_rejects_empty_and_truncated_input() {
        let filter = create_still_filter(HashStrategy::Optimal);
        filter.add(b"kept").unwrap();
        let bytes = filter.marshal_binary().unwrap();

        assert!(matches!(
            filter.unmarshal_binary(&[]),
            Err(FilterError::DecodeError(_))
        ));
        assert!(matches!(
            filter.unmarshal_binary(&bytes[..bytes.len() / 2]),
            Err(FilterError::DecodeError(_))
        ));
        assert!(filter.check(b"kept").unwrap());
        assert!(filter.is_rotating());
    }

    #[tokio::test]
    async fn test_unmarshal_restarts_rotation() {
        let source = RotatingBloomFilter::new(rotating_config(
            TEST_CAPACITY,
            TEST_FPR,
            HashStrategy::Optimal,
            Duration::from_secs(120),
        ))
        .unwrap();
        source.add(b"snap").unwrap();
        let bytes = source.marshal_binary().unwrap();

        let target = create_still_filter(HashStrategy::Optimal);
        target.close();
        assert!(!target.is_rotating());

        target.unmarshal_binary(&bytes).unwrap();
        assert!(target.is_rotating());
        assert!(target.check(b"snap").unwrap());
        assert_eq!(target.config().unwrap().ttl, Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restored_filter_rotates_with_decoded_ttl() {
        let ttl = Duration::from_millis(5);
        let source = RotatingBloomFilter::new(rotating_config(
            TEST_CAPACITY,
            TEST_FPR,
            HashStrategy::Optimal,
            ttl,
        ))
        .unwrap();
        source.add(b"short-lived").unwrap();
        let bytes = source.marshal_binary().unwrap();
        source.close();

        let target = create_still_filter(HashStrategy::Optimal);
        target.unmarshal_binary(&bytes).unwrap();
        assert!(target.check(b"short-lived").unwrap());

        tokio::time::sleep(ttl * 3 + ttl / 2).await;
        assert!(!target.check(b"short-lived").unwrap());
    }

    #[tokio::test]
    async fn test_compressors_must_match() {
        let filter = create_still_filter(HashStrategy::Optimal);
        filter.add(b"raw").unwrap();

        let raw = filter.marshal_binary_with(&NoCompression).unwrap();
        assert_eq!(&raw[..4], b"RBLM");
        assert!(filter.unmarshal_binary(&raw).is_err());

        let restored =
            RotatingBloomFilter::from_bytes_with(&raw, &NoCompression).unwrap();
        assert!(restored.check(b"raw").unwrap());
    }
}
