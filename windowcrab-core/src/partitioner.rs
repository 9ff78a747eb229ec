//! # Partitioner
//!
//! Routes partition keys onto index shards.

use std::hash::{Hash, Hasher};

use ahash::AHasher;

/// Trait for spreading keys across a fixed number of partitions.
pub trait Partitioner<K: ?Sized>: Send + Sync {
    /// Determine which partition (0..num_partitions) this key should go to.
    fn partition(&self, key: &K, num_partitions: usize) -> usize;
}

/// Hash-based partitioner.
///
/// Uses ahash for fast hashing of short string keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashPartitioner;

impl<K: Hash + ?Sized> Partitioner<K> for HashPartitioner {
    fn partition(&self, key: &K, num_partitions: usize) -> usize {
        if num_partitions <= 1 {
            return 0;
        }
        let mut hasher = AHasher::default();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % num_partitions
    }
}

#[cfg(test)]
#[path = "tests/partitioner_tests.rs"]
mod tests;
