pub mod bottom;
mod hashing;

use std::borrow::Cow;

use needletail::sequence::{canonical, normalize};
use serde::{Deserialize, Serialize};

use crate::errors::{KcError, KcResult};
use crate::serialization::Sketch;
use crate::{bail, format_err};
pub use hashing::{hash_f, ItemHash};

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Hash, Serialize)]
pub struct KmerCount {
    pub hash: ItemHash,
    pub kmer: Vec<u8>,
    pub count: u32,
}

pub trait SketchScheme {
    fn process(&mut self, seq: &[u8]);
    fn total_bases_and_kmers(&self) -> (u64, u64);
    fn to_vec(&self) -> Vec<KmerCount>;
    fn parameters(&self) -> SketchParams;

    fn to_sketch(&self, name: &str) -> Sketch {
        let (seq_length, num_valid_kmers) = self.total_bases_and_kmers();
        Sketch {
            name: name.to_string(),
            seq_length,
            num_valid_kmers,
            comment: "".to_string(),
            hashes: self.to_vec(),
            sketch_params: self.parameters(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SketchParams {
    pub kmer_length: u8,
    pub sketch_size: usize,
    pub hash_seed: u64,
    pub canonical: bool,
}

impl Default for SketchParams {
    fn default() -> Self {
        SketchParams {
            kmer_length: 21,
            sketch_size: 1000,
            hash_seed: 0,
            canonical: false,
        }
    }
}

impl SketchParams {
    pub fn create_sketcher(&self) -> Box<dyn SketchScheme + Send> {
        Box::new(bottom::BottomSketcher::new(
            self.sketch_size,
            self.kmer_length,
            self.hash_seed,
            self.canonical,
        ))
    }

    pub fn k(&self) -> u8 {
        self.kmer_length
    }

    pub fn hash_info(&self) -> (&str, u16, u64) {
        ("MurmurHash3_x64_128", 64, self.hash_seed)
    }

    /// Parameters shared by every sketch in `sketches`; fails on the first
    /// sketch that can't be compared against the first one.
    pub fn from_sketches(sketches: &[Sketch]) -> KcResult<Self> {
        let first = sketches.first().ok_or(KcError::EmptyStore)?;
        let first_params = first.sketch_params.clone();
        for sketch in sketches.iter().skip(1) {
            let params = &sketch.sketch_params;
            if params.k() != first_params.k() {
                return Err(KcError::InconsistentKsize {
                    name: sketch.name.clone(),
                    expected: first_params.k(),
                    found: params.k(),
                });
            }
            if let Some((mismatched_param, v1, v2)) = first_params.check_compatibility(params) {
                bail!(
                    "First sketch has {} {}, but sketch {} has {0} {}",
                    mismatched_param,
                    v1,
                    sketch.name,
                    v2,
                );
            }
        }
        Ok(first_params)
    }

    /// Return any sketch parameter difference that would make stored kmers
    /// from these parameter sets not comparable. Hash seeds don't matter here
    /// because lookups go by kmer bytes.
    pub fn check_compatibility(&self, other: &SketchParams) -> Option<(&str, String, String)> {
        if self.k() != other.k() {
            return Some(("k", self.k().to_string(), other.k().to_string()));
        }
        if self.canonical != other.canonical {
            return Some((
                "canonical",
                self.canonical.to_string(),
                other.canonical.to_string(),
            ));
        }
        None
    }

    /// Like `from_sketches`, but also requires one hash seed, since a store
    /// records a single seed for all of its sketches.
    pub fn for_writing(sketches: &[Sketch]) -> KcResult<Self> {
        let params = SketchParams::from_sketches(sketches)?;
        if let Some(sketch) = sketches
            .iter()
            .find(|s| s.sketch_params.hash_seed != params.hash_seed)
        {
            bail!(
                "First sketch has hash seed {}, but sketch {} has hash seed {}",
                params.hash_seed,
                sketch.name,
                sketch.sketch_params.hash_seed
            );
        }
        Ok(params)
    }

    pub fn validate(&self) -> KcResult<()> {
        if self.kmer_length == 0 {
            return Err(format_err!("kmer length must be at least 1"));
        }
        if self.sketch_size == 0 {
            return Err(format_err!("sketch size must be at least 1"));
        }
        Ok(())
    }
}

/// Uppercase a sequence (and map U to T, anything unknown to N).
pub fn normalize_seq(seq: &[u8]) -> Cow<[u8]> {
    match normalize(seq, false) {
        Some(normalized) => Cow::Owned(normalized),
        None => Cow::Borrowed(seq),
    }
}

/// The form of a kmer that gets hashed, stored and looked up.
#[inline]
pub fn stored_form(kmer: &[u8], canonical_kmers: bool) -> Cow<[u8]> {
    if canonical_kmers {
        canonical(kmer)
    } else {
        Cow::Borrowed(kmer)
    }
}

#[inline]
pub fn is_acgt(kmer: &[u8]) -> bool {
    kmer.iter().all(|&b| matches!(b, b'A' | b'C' | b'G' | b'T'))
}
