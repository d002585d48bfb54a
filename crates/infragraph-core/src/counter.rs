use std::collections::BTreeMap;

/// Keyed tally used for store statistics.
///
/// Keys whose count drops to zero are removed, so two counters built from
/// the same graph compare equal no matter how they got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter<K: Ord> {
    counts: BTreeMap<K, usize>,
}

impl<K: Ord> Default for Counter<K> {
    fn default() -> Self {
        Self {
            counts: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone> Counter<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `key`, returning the new count.
    pub fn add(&mut self, key: K) -> usize {
        let count = self.counts.entry(key).or_insert(0);
        *count += 1;
        *count
    }

    /// Decrement `key`, returning the new count. Absent keys stay absent.
    pub fn subtract(&mut self, key: &K) -> usize {
        let Some(count) = self.counts.get_mut(key) else {
            return 0;
        };
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.counts.remove(key);
        }
        remaining
    }

    pub fn get(&self, key: &K) -> usize {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> &BTreeMap<K, usize> {
        &self.counts
    }
}
