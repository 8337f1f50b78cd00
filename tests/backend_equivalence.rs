//! Differential tests: every backend against a naive scan of the same keys.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use jiten::error::Result;
use jiten::index::{
    Index, IndexBackend, KeyNormalizer, LowercaseNormalizer, MatchMode, RegionReader,
    RegionSource, RegionWriter,
};
use jiten::storage::{MemoryStorage, Storage, StructReader, StructWriter};

const MODES: [MatchMode; 4] = [
    MatchMode::Exact,
    MatchMode::Prefix,
    MatchMode::Suffix,
    MatchMode::Substring,
];

const BACKENDS: [IndexBackend; 3] = [
    IndexBackend::MemoryHash,
    IndexBackend::DiskHash,
    IndexBackend::Trie,
];

type Reference = BTreeMap<String, BTreeSet<u32>>;

fn random_word(rng: &mut StdRng, alphabet: &[char], max_len: usize) -> String {
    let len = rng.random_range(1..=max_len);
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())])
        .collect()
}

fn random_reference(rng: &mut StdRng, alphabet: &[char], keys: usize, max_len: usize) -> Reference {
    let mut reference = Reference::new();
    for _ in 0..keys {
        let key = random_word(rng, alphabet, max_len);
        let count = rng.random_range(1..=4);
        let ids = reference.entry(key).or_default();
        for _ in 0..count {
            ids.insert(rng.random_range(0..10_000));
        }
    }
    reference
}

fn naive(reference: &Reference, query: &str, mode: MatchMode) -> Vec<u32> {
    let mut found = BTreeSet::new();
    for (key, ids) in reference {
        if mode.matches(key, query) {
            found.extend(ids);
        }
    }
    found.into_iter().collect()
}

fn build(backend: IndexBackend, reference: &Reference) -> Result<Box<dyn Index>> {
    let mut index = backend.create(Arc::new(LowercaseNormalizer));
    for (key, ids) in reference {
        let ids: Vec<u32> = ids.iter().copied().collect();
        index.add(key, &ids)?;
    }
    index.finished_adding()?;
    Ok(index)
}

fn reload(index: &dyn Index) -> Result<Box<dyn Index>> {
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
    let mut writer: RegionWriter = StructWriter::new(storage.create_output("idx")?);
    index.save(&mut writer, None)?;
    writer.close()?;

    let mut reader: RegionReader = StructReader::new(storage.open_input("idx")?)?;
    let normalizer: Arc<dyn KeyNormalizer> = Arc::new(LowercaseNormalizer);
    let mut loaded = index.backend().create(normalizer);
    loaded.load(&mut reader, &RegionSource::new(storage, "idx"))?;
    Ok(loaded)
}

fn check_against_reference(index: &dyn Index, reference: &Reference, queries: &[String]) -> Result<()> {
    for query in queries {
        for mode in MODES {
            let found: Vec<u32> = index.search(query, mode)?.collect();
            assert_eq!(
                found,
                naive(reference, query, mode),
                "{:?} {mode:?} {query:?}",
                index.backend()
            );
        }
    }
    Ok(())
}

#[test]
fn test_backends_match_naive_scan() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(0x5EED);
    let alphabet = ['a', 'b', 'c', 'd', 'é', '猫'];
    let reference = random_reference(&mut rng, &alphabet, 300, 7);
    let queries: Vec<String> = (0..60).map(|_| random_word(&mut rng, &alphabet, 3)).collect();

    for backend in BACKENDS {
        let index = build(backend, &reference)?;
        check_against_reference(index.as_ref(), &reference, &queries)?;
        let loaded = reload(index.as_ref())?;
        assert_eq!(loaded.key_count(), reference.len());
        check_against_reference(loaded.as_ref(), &reference, &queries)?;
    }
    Ok(())
}

#[test]
fn test_repeated_character_keys() -> Result<()> {
    // Long runs of one symbol with a few interruptions stress the overlap
    // handling of suffix and substring matching.
    let mut rng = StdRng::seed_from_u64(42);
    let mut reference = Reference::new();
    for run in 1..=12 {
        let plain = "a".repeat(run);
        reference.entry(plain.clone()).or_default().insert(run as u32);
        reference
            .entry(format!("{plain}b"))
            .or_default()
            .insert(100 + run as u32);
        reference
            .entry(format!("b{plain}"))
            .or_default()
            .insert(200 + run as u32);
        let split = rng.random_range(0..=run);
        reference
            .entry(format!("{}b{}", &plain[..split], &plain[split..]))
            .or_default()
            .insert(300 + run as u32);
    }
    reference.entry("abab".into()).or_default().insert(400);
    reference.entry("aabaab".into()).or_default().insert(401);
    reference.entry("abaabaaab".into()).or_default().insert(402);

    let mut queries: Vec<String> = (1..=13).map(|n| "a".repeat(n)).collect();
    queries.extend(["ab", "ba", "aab", "aaab", "abab", "baa", "aba", "abaab", "b"].map(String::from));

    for backend in BACKENDS {
        let index = build(backend, &reference)?;
        check_against_reference(index.as_ref(), &reference, &queries)?;
        let loaded = reload(index.as_ref())?;
        check_against_reference(loaded.as_ref(), &reference, &queries)?;
    }
    Ok(())
}

#[test]
fn test_open_hash_retrieves_every_key() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let alphabet: Vec<char> = ('a'..='z').collect();
    for keys in [1, 2, 3, 17, 500, 4000] {
        let reference = random_reference(&mut rng, &alphabet, keys, 10);
        let index = build(IndexBackend::DiskHash, &reference)?;
        let loaded = reload(index.as_ref())?;
        assert_eq!(loaded.key_count(), reference.len());
        for (key, ids) in &reference {
            let found: Vec<u32> = loaded.search(key, MatchMode::Exact)?.collect();
            let expected: Vec<u32> = ids.iter().copied().collect();
            assert_eq!(found, expected, "key {key:?} of {keys}");
        }
        // Keys that are not there probe until an empty bucket and stop.
        for _ in 0..50 {
            let missing = format!("{}0", random_word(&mut rng, &alphabet, 5));
            assert!(loaded.search(&missing, MatchMode::Exact)?.next().is_none());
        }
    }
    Ok(())
}

#[test]
fn test_merging_adds_across_calls() -> Result<()> {
    for backend in BACKENDS {
        let mut index = backend.create(Arc::new(LowercaseNormalizer));
        index.add("Cat", &[5, 9])?;
        index.add("cat", &[1, 9, 12])?;
        index.add("CAT", &[3])?;
        index.finished_adding()?;
        assert_eq!(index.key_count(), 1);
        let found: Vec<u32> = index.search("cAt", MatchMode::Exact)?.collect();
        assert_eq!(found, vec![1, 3, 5, 9, 12], "{backend:?}");
    }
    Ok(())
}
