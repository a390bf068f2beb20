use std::collections::{BinaryHeap, HashMap};
use std::hash::BuildHasherDefault;

use crate::sketch_schemes::hashing::{hash_f, HashedKmer, NoHashHasher};
use crate::sketch_schemes::{
    is_acgt, normalize_seq, stored_form, ItemHash, KmerCount, SketchParams, SketchScheme,
};

/// Keeps the `size` kmers with the smallest hashes seen so far, along with
/// the kmer bytes themselves so the sketch can be used for containment
/// lookups later on.
#[derive(Clone, Debug)]
pub struct BottomSketcher {
    hashes: BinaryHeap<HashedKmer>,
    counts: HashMap<ItemHash, u32, BuildHasherDefault<NoHashHasher>>,
    kmer_length: u8,
    total_kmers: u64,
    total_bases: u64,
    size: usize,
    seed: u64,
    canonical: bool,
}

impl BottomSketcher {
    pub fn new(size: usize, kmer_length: u8, seed: u64, canonical: bool) -> Self {
        BottomSketcher {
            hashes: BinaryHeap::with_capacity(size + 1),
            counts: HashMap::with_capacity_and_hasher(size, BuildHasherDefault::default()),
            kmer_length,
            total_kmers: 0,
            total_bases: 0,
            size,
            seed,
            canonical,
        }
    }

    pub fn push(&mut self, kmer: &[u8]) {
        self.total_kmers += 1;
        let new_hash = hash_f(kmer, self.seed);
        let add_hash = match self.hashes.peek() {
            None => self.size > 0,
            Some(old_max_hash) => {
                (new_hash <= old_max_hash.hash) || (self.hashes.len() < self.size)
            }
        };
        if !add_hash {
            return;
        }

        if let Some(count) = self.counts.get_mut(&new_hash) {
            *count = count.saturating_add(1);
            return;
        }
        self.hashes.push(HashedKmer {
            hash: new_hash,
            kmer: kmer.to_owned(),
        });
        self.counts.insert(new_hash, 1);
        if self.hashes.len() > self.size {
            if let Some(evicted) = self.hashes.pop() {
                self.counts.remove(&evicted.hash);
            }
        }
    }
}

impl SketchScheme for BottomSketcher {
    fn process(&mut self, seq: &[u8]) {
        self.total_bases += seq.len() as u64;
        let k = usize::from(self.kmer_length);
        if k == 0 {
            return;
        }

        let norm_seq = normalize_seq(seq);
        for window in norm_seq.windows(k) {
            // kmers spanning ambiguous bases aren't sketched
            if !is_acgt(window) {
                continue;
            }
            let kmer = stored_form(window, self.canonical);
            self.push(&kmer);
        }
    }

    fn total_bases_and_kmers(&self) -> (u64, u64) {
        (self.total_bases, self.total_kmers)
    }

    fn to_vec(&self) -> Vec<KmerCount> {
        self.hashes
            .clone()
            .into_sorted_vec()
            .into_iter()
            .map(|item| KmerCount {
                hash: item.hash,
                count: self.counts.get(&item.hash).copied().unwrap_or(0),
                kmer: item.kmer,
            })
            .collect()
    }

    fn parameters(&self) -> SketchParams {
        SketchParams {
            kmer_length: self.kmer_length,
            sketch_size: self.size,
            hash_seed: self.seed,
            canonical: self.canonical,
        }
    }
}

#[test]
fn test_bottom_kmers() {
    let mut queue = BottomSketcher::new(3, 2, 42, false);
    queue.push(b"CA");
    queue.push(b"CC");
    queue.push(b"AC");
    queue.push(b"AC");
    let array = queue.to_vec();
    assert_eq!(array.len(), 3);
    assert!(array[0].hash < array[1].hash);
    assert!(array[1].hash < array[2].hash);

    let ac = array.iter().find(|k| k.kmer == b"AC").unwrap();
    assert_eq!(ac.count, 2);
    assert_eq!(queue.total_bases_and_kmers(), (0, 4));
}
