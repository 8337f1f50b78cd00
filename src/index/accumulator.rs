//! Build-phase key accumulation shared by every index backend.

use std::sync::Arc;

use ahash::AHashMap;

use crate::error::{JitenError, Result};
use crate::index::normalize::KeyNormalizer;
use crate::set::{IdStream, is_strictly_sorted, union};

/// Frozen keys in ascending key order.
pub type FrozenEntries = Vec<(String, Arc<[u32]>)>;

/// Collects normalized keys and merges their ID sets.
#[derive(Debug)]
pub struct KeyAccumulator {
    normalizer: Arc<dyn KeyNormalizer>,
    entries: AHashMap<String, Vec<u32>>,
}

impl KeyAccumulator {
    pub fn new(normalizer: Arc<dyn KeyNormalizer>) -> Self {
        KeyAccumulator {
            normalizer,
            entries: AHashMap::new(),
        }
    }

    /// Normalize a key, rejecting keys that normalize to nothing.
    pub fn normalize_key(&self, text: &str) -> Result<String> {
        normalize_key(self.normalizer.as_ref(), text)
    }

    /// Add `ids` to the set stored under `key`.
    pub fn add(&mut self, key: &str, ids: &[u32]) -> Result<()> {
        if ids.is_empty() {
            return Err(JitenError::invalid_argument(format!("no ids given for key {key:?}")));
        }
        if !is_strictly_sorted(ids) {
            return Err(JitenError::invalid_argument(format!(
                "ids for key {key:?} must be sorted ascending without duplicates"
            )));
        }

        let key = self.normalize_key(key)?;
        match self.entries.get_mut(&key) {
            Some(existing) => {
                let merged = union(vec![
                    IdStream::from_vec(std::mem::take(existing)),
                    IdStream::from_vec(ids.to_vec()),
                ]);
                *existing = merged.collect();
            }
            None => {
                self.entries.insert(key, ids.to_vec());
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain the accumulated keys, sorted by key.
    pub fn freeze(&mut self) -> FrozenEntries {
        let mut frozen: FrozenEntries = self
            .entries
            .drain()
            .map(|(key, ids)| (key, Arc::from(ids)))
            .collect();
        frozen.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        frozen
    }
}

/// Normalize `text` with `normalizer`, rejecting an empty result.
pub fn normalize_key(normalizer: &dyn KeyNormalizer, text: &str) -> Result<String> {
    let normalized = normalizer.normalize(text);
    if normalized.is_empty() {
        return Err(JitenError::invalid_operation(format!(
            "key {text:?} normalizes to an empty string"
        )));
    }
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::normalize::LowercaseNormalizer;

    fn accumulator() -> KeyAccumulator {
        KeyAccumulator::new(Arc::new(LowercaseNormalizer))
    }

    #[test]
    fn test_merges_ids_per_normalized_key() {
        let mut acc = accumulator();
        acc.add("Cat", &[1, 5]).unwrap();
        acc.add("cat", &[2, 5, 9]).unwrap();
        acc.add("dog", &[3]).unwrap();
        assert_eq!(acc.len(), 2);

        let frozen = acc.freeze();
        assert_eq!(frozen[0].0, "cat");
        assert_eq!(&*frozen[0].1, &[1, 2, 5, 9]);
        assert_eq!(frozen[1].0, "dog");
        assert!(acc.is_empty());
    }

    #[test]
    fn test_rejects_bad_input() {
        let mut acc = accumulator();
        assert!(acc.add("cat", &[3, 1]).is_err());
        assert!(acc.add("cat", &[1, 1]).is_err());
        assert!(acc.add("cat", &[]).is_err());
        assert!(matches!(
            acc.add("", &[1]),
            Err(JitenError::InvalidOperation(_))
        ));
    }
}
