use std::cmp::Ordering;
use std::hash::Hasher;

use murmurhash3::murmurhash3_x64_128;

pub type ItemHash = u64;

#[inline]
pub fn hash_f(item: &[u8], seed: u64) -> ItemHash {
    murmurhash3_x64_128(item, seed).0
}

/// A kmer tagged with its hash; ordered by hash only so it can live in a
/// max-heap of the current bottom-n.
#[derive(Debug, Clone)]
pub(crate) struct HashedKmer {
    pub(crate) hash: ItemHash,
    pub(crate) kmer: Vec<u8>,
}

impl PartialEq for HashedKmer {
    fn eq(&self, other: &HashedKmer) -> bool {
        other.hash.eq(&self.hash)
    }
}

impl Eq for HashedKmer {}

impl Ord for HashedKmer {
    fn cmp(&self, other: &HashedKmer) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl PartialOrd for HashedKmer {
    fn partial_cmp(&self, other: &HashedKmer) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Keys of the sketcher's count table are already murmurhash values, so
/// hashing them again is wasted work.
#[derive(Default)]
pub struct NoHashHasher(u64);

impl Hasher for NoHashHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.0 = (self.0 << 8) | u64::from(*b);
        }
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }

    fn finish(&self) -> u64 {
        self.0
    }
}
