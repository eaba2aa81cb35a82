// Copyright 2022 Twitter, Inc.
// Licensed under the Apache License, Version 2.0
// http://www.apache.org/licenses/LICENSE-2.0

use super::*;

use std::time::Duration;

const MB: usize = 1024 * 1024;

fn small_cache() -> Ember {
    // prefaulting 64 shards is wasted work in unit tests
    Ember::builder().heap_size(64 * MB).prefault(false).build()
}

#[test]
fn init() {
    let cache = small_cache();
    let stats = cache.stats();
    assert_eq!(stats.curr_items, 0);
    assert_eq!(stats.pool_size, 64 * MB);
    // slab prewarm consumes arena up front
    assert!(stats.bytes > 0);
}

#[test]
fn round_trip() {
    let cache = small_cache();

    assert_eq!(cache.get(b"coffee"), Err(EmberError::NotFound));
    assert!(cache.set(b"coffee", b"strong", Ttl::none()).is_ok());
    assert_eq!(cache.get(b"coffee").unwrap(), b"strong");

    let stats = cache.stats();
    assert_eq!(stats.curr_items, 1);
    assert_eq!(stats.get_hits, 1);
    assert_eq!(stats.get_misses, 1);
}

#[test]
fn binary_transparency() {
    let cache = small_cache();

    // every byte value must survive the trip, in keys and values alike
    let value: Vec<u8> = (0..=255).collect();
    let key = b"\x01binary\x00key\xff";

    assert!(cache.set(key, &value, Ttl::none()).is_ok());
    assert_eq!(cache.get(key).unwrap(), value);
}

#[test]
fn empty_value() {
    let cache = small_cache();

    assert!(cache.set(b"empty", b"", Ttl::none()).is_ok());
    assert_eq!(cache.get(b"empty").unwrap(), b"");
}

#[test]
fn large_value() {
    let cache = small_cache();

    // larger than the biggest slab class, lands in the bump class
    let value = vec![0xab; 100 * 1024];
    assert!(cache.set(b"large", &value, Ttl::none()).is_ok());
    assert_eq!(cache.get(b"large").unwrap(), value);
}

#[test]
fn overwrite() {
    let cache = small_cache();

    assert!(cache.set(b"drink", b"coffee", Ttl::none()).is_ok());
    assert_eq!(cache.stats().curr_items, 1);
    assert_eq!(cache.get(b"drink").unwrap(), b"coffee");

    assert!(cache.set(b"drink", b"espresso", Ttl::none()).is_ok());
    assert_eq!(cache.stats().curr_items, 1);
    assert_eq!(cache.get(b"drink").unwrap(), b"espresso");

    // a different size class on overwrite recycles the old slot
    let long = vec![b'x'; 500];
    assert!(cache.set(b"drink", &long, Ttl::none()).is_ok());
    assert_eq!(cache.stats().curr_items, 1);
    assert_eq!(cache.get(b"drink").unwrap(), long);
}

#[test]
fn delete() {
    let cache = small_cache();

    assert_eq!(cache.delete(b"drink"), Err(EmberError::NotFound));

    assert!(cache.set(b"drink", b"coffee", Ttl::none()).is_ok());
    assert_eq!(cache.delete(b"drink"), Ok(()));
    assert_eq!(cache.get(b"drink"), Err(EmberError::NotFound));
    assert_eq!(cache.stats().curr_items, 0);

    // a second delete reports absence
    assert_eq!(cache.delete(b"drink"), Err(EmberError::NotFound));
}

#[test]
fn delete_then_reinsert() {
    let cache = small_cache();

    assert!(cache.set(b"key", b"one", Ttl::none()).is_ok());
    assert_eq!(cache.delete(b"key"), Ok(()));
    assert!(cache.set(b"key", b"two", Ttl::none()).is_ok());
    assert_eq!(cache.get(b"key").unwrap(), b"two");
    assert_eq!(cache.stats().curr_items, 1);
}

#[test]
fn probe_chains_survive_churn() {
    let cache = small_cache();

    // interleave inserts and deletes so probe chains cross tombstones, then
    // verify every surviving key is still reachable
    for i in 0..512u32 {
        let key = format!("churn_{i}");
        assert!(cache.set(key.as_bytes(), &i.to_be_bytes(), Ttl::none()).is_ok());
    }
    for i in (0..512u32).step_by(2) {
        let key = format!("churn_{i}");
        assert_eq!(cache.delete(key.as_bytes()), Ok(()));
    }
    for i in 0..128u32 {
        let key = format!("churn_{}", i * 4);
        assert!(cache.set(key.as_bytes(), b"back", Ttl::none()).is_ok());
    }

    for i in 0..512u32 {
        let key = format!("churn_{i}");
        let expect = if i % 4 == 0 {
            Some(b"back".to_vec())
        } else if i % 2 == 0 {
            None
        } else {
            Some(i.to_be_bytes().to_vec())
        };
        match expect {
            Some(value) => assert_eq!(cache.get(key.as_bytes()).unwrap(), value, "key {key}"),
            None => assert_eq!(cache.get(key.as_bytes()), Err(EmberError::NotFound), "key {key}"),
        }
    }
}

#[test]
fn capacity_counting() {
    let cache = small_cache();

    for i in 0..1000u32 {
        let key = format!("count_{i}");
        assert!(cache.set(key.as_bytes(), b"v", Ttl::none()).is_ok());
        assert_eq!(cache.stats().curr_items, i as usize + 1);
    }
}

#[test]
fn incremental_resize() {
    // a tiny initial index forces growth almost immediately; every
    // previously-written key must stay readable at every step
    let cache = Ember::builder()
        .heap_size(64 * MB)
        .hash_power(3)
        .prefault(false)
        .build();

    for i in 0..2048u32 {
        let key = format!("resize_{i}");
        assert!(cache.set(key.as_bytes(), &i.to_le_bytes(), Ttl::none()).is_ok());

        // spot-check a prefix of earlier keys mid-migration
        let step = (i / 7).max(1);
        let mut j = 0;
        while j <= i {
            let key = format!("resize_{j}");
            assert_eq!(
                cache.get(key.as_bytes()).unwrap(),
                j.to_le_bytes(),
                "key {key} lost after inserting {i} keys"
            );
            j += step;
        }
    }

    assert_eq!(cache.stats().curr_items, 2048);

    // push the shards through any in-flight migration and re-verify all
    for i in 0..2048u32 {
        let key = format!("resize_{i}");
        assert_eq!(cache.get(key.as_bytes()).unwrap(), i.to_le_bytes());
    }
}

#[test]
fn resize_preserves_deletes() {
    let cache = Ember::builder()
        .heap_size(64 * MB)
        .hash_power(3)
        .prefault(false)
        .build();

    for i in 0..1024u32 {
        let key = format!("rd_{i}");
        assert!(cache.set(key.as_bytes(), b"v", Ttl::none()).is_ok());
    }
    for i in (0..1024u32).step_by(3) {
        let key = format!("rd_{i}");
        assert_eq!(cache.delete(key.as_bytes()), Ok(()));
    }
    // more inserts drive the migration machinery past the tombstones
    for i in 1024..1536u32 {
        let key = format!("rd_{i}");
        assert!(cache.set(key.as_bytes(), b"v", Ttl::none()).is_ok());
    }

    // revive a slice of the deleted keys while resizes are still likely in
    // flight; a delete-then-set must survive the table swap
    for i in (0..1024u32).step_by(6) {
        let key = format!("rd_{i}");
        assert!(cache.set(key.as_bytes(), b"r", Ttl::none()).is_ok());
    }
    for i in 1536..2048u32 {
        let key = format!("rd_{i}");
        assert!(cache.set(key.as_bytes(), b"v", Ttl::none()).is_ok());
    }

    for i in 0..2048u32 {
        let key = format!("rd_{i}");
        let revived = i < 1024 && i % 6 == 0;
        let deleted = i < 1024 && i % 3 == 0 && !revived;
        if deleted {
            assert_eq!(cache.get(key.as_bytes()), Err(EmberError::NotFound), "key {key}");
        } else if revived {
            assert_eq!(cache.get(key.as_bytes()).unwrap(), b"r", "key {key}");
        } else {
            assert_eq!(cache.get(key.as_bytes()).unwrap(), b"v", "key {key}");
        }
    }
}

#[test]
fn expiration() {
    let cache = small_cache();

    assert!(cache.set(b"short", b"lived", Ttl::seconds(2)).is_ok());
    assert!(cache.set(b"keeper", b"forever", Ttl::none()).is_ok());
    assert_eq!(cache.get(b"short").unwrap(), b"lived");

    std::thread::sleep(Duration::from_secs(3));

    assert_eq!(cache.get(b"short"), Err(EmberError::NotFound));
    assert_eq!(cache.get(b"keeper").unwrap(), b"forever");
}

#[test]
fn already_expired_ttl() {
    let cache = small_cache();

    // negative wire exptimes map to Ttl::expired; the store accepts the
    // write but the next lookup misses
    assert!(cache.set(b"gone", b"never seen", Ttl::expired()).is_ok());
    assert_eq!(cache.get(b"gone"), Err(EmberError::NotFound));

    // overwriting an expired entry revives it
    assert!(cache.set(b"gone", b"back", Ttl::none()).is_ok());
    assert_eq!(cache.get(b"gone").unwrap(), b"back");
}

#[test]
fn get_into_too_small() {
    let cache = small_cache();

    assert!(cache.set(b"key", b"0123456789", Ttl::none()).is_ok());

    let mut dst = [0xee; 4];
    assert_eq!(
        cache.get_into(b"key", &mut dst),
        Err(EmberError::BufferTooSmall { required: 10 })
    );
    // the caller's buffer is untouched on the short path
    assert_eq!(dst, [0xee; 4]);

    let mut dst = [0; 16];
    assert_eq!(cache.get_into(b"key", &mut dst), Ok(10));
    assert_eq!(&dst[..10], b"0123456789");
}

#[test]
fn flush() {
    let cache = small_cache();

    for i in 0..100u32 {
        let key = format!("flush_{i}");
        assert!(cache.set(key.as_bytes(), b"v", Ttl::none()).is_ok());
    }
    assert_eq!(cache.stats().curr_items, 100);

    cache.flush();
    assert_eq!(cache.stats().curr_items, 0);
    assert_eq!(cache.get(b"flush_0"), Err(EmberError::NotFound));

    // the store accepts new writes after a flush
    assert!(cache.set(b"fresh", b"start", Ttl::none()).is_ok());
    assert_eq!(cache.get(b"fresh").unwrap(), b"start");

    // flushing an empty store is a no-op, repeatedly
    cache.flush();
    cache.flush();
    assert_eq!(cache.stats().curr_items, 1);
    assert_eq!(cache.get(b"fresh").unwrap(), b"start");
}

#[test]
fn arena_exhaustion() {
    // a minimum-size pool fills quickly with large values; writes must fail
    // cleanly and the shard must keep serving what it holds
    let cache = Ember::builder().heap_size(0).prefault(false).build();

    let value = vec![0xcd; 300 * 1024];
    let mut stored = Vec::new();
    let mut failed = false;
    for i in 0..256u32 {
        let key = format!("big_{i}");
        match cache.set(key.as_bytes(), &value, Ttl::none()) {
            Ok(()) => stored.push(key),
            Err(EmberError::OutOfMemory) => {
                failed = true;
                break;
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert!(failed, "a 64MiB pool must not hold 75MiB of values");

    for key in &stored {
        assert_eq!(cache.get(key.as_bytes()).unwrap(), value);
    }
}

#[test]
fn invalid_keys() {
    let cache = small_cache();

    assert_eq!(
        cache.set(b"", b"v", Ttl::none()),
        Err(EmberError::InvalidKey)
    );
    let long = vec![b'k'; MAX_KEY_LEN + 1];
    assert_eq!(
        cache.set(&long, b"v", Ttl::none()),
        Err(EmberError::InvalidKey)
    );

    let max = vec![b'k'; MAX_KEY_LEN];
    assert!(cache.set(&max, b"v", Ttl::none()).is_ok());
    assert_eq!(cache.get(&max).unwrap(), b"v");
}

#[test]
fn nolock_api() {
    let mut cache = small_cache();

    assert!(cache.set_nolock(b"key", b"value", Ttl::none()).is_ok());

    let mut dst = [0; 64];
    assert_eq!(cache.get_into_nolock(b"key", &mut dst), Ok(5));
    assert_eq!(&dst[..5], b"value");

    assert_eq!(cache.delete_nolock(b"key"), Ok(()));
    assert_eq!(
        cache.get_into_nolock(b"key", &mut dst),
        Err(EmberError::NotFound)
    );

    cache.flush_nolock();
    let stats = cache.stats_nolock();
    assert_eq!(stats.curr_items, 0);
    assert_eq!(stats.get_hits, 0);
    assert_eq!(stats.get_misses, 0);
}

#[test]
fn concurrent_shards() {
    use std::sync::Arc;

    // keys in distinct shards proceed in parallel; this just exercises the
    // locked API from multiple threads
    let cache = Arc::new(small_cache());
    let mut handles = Vec::new();

    for t in 0..4 {
        let cache = cache.clone();
        handles.push(std::thread::spawn(move || {
            for i in 0..500u32 {
                let key = format!("thread_{t}_{i}");
                cache.set(key.as_bytes(), &i.to_ne_bytes(), Ttl::none()).unwrap();
                assert_eq!(cache.get(key.as_bytes()).unwrap(), i.to_ne_bytes());
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.stats().curr_items, 2000);
}
