use std::slice::Windows;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use tracing::warn;

use crate::errors::{KcError, KcResult};
use crate::format_err;
use crate::index::{build_indices, MembershipIndex};
use crate::serialization::Sketch;
use crate::sketch_schemes::{normalize_seq, stored_form, SketchParams};
use crate::validate_sketches;

/// How concurrent workers combine their hits into the run's counters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Aggregation {
    /// Every hit is an atomic increment on the shared counter.
    Shared,
    /// Each worker sums into its own vector; vectors are reduced per batch.
    PartialSums,
}

impl Default for Aggregation {
    fn default() -> Self {
        Aggregation::PartialSums
    }
}

impl FromStr for Aggregation {
    type Err = KcError;

    fn from_str(s: &str) -> KcResult<Self> {
        match s {
            "shared" => Ok(Aggregation::Shared),
            "partial" => Ok(Aggregation::PartialSums),
            other => Err(format_err!("Unknown aggregation strategy {}", other)),
        }
    }
}

/// Options for a counting run
#[derive(Clone, Debug, PartialEq)]
pub struct CountParams {
    /// Worker threads; 0 lets rayon pick.
    pub threads: usize,
    pub batch_size: usize,
    pub aggregation: Aggregation,
}

impl Default for CountParams {
    fn default() -> Self {
        CountParams {
            threads: 0,
            batch_size: 10_000,
            aggregation: Aggregation::default(),
        }
    }
}

/// One counter per reference sketch. Increments and reads are atomic so any
/// number of workers can share a `Counters` by reference.
#[derive(Debug, Default)]
pub struct Counters {
    counts: Vec<AtomicU64>,
}

impl Counters {
    pub fn new(len: usize) -> Self {
        Counters {
            counts: (0..len).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    #[inline]
    pub fn increment(&self, ix: usize) {
        self.counts[ix].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(&self, ix: usize, value: u64) {
        if value > 0 {
            self.counts[ix].fetch_add(value, Ordering::Relaxed);
        }
    }

    pub fn get(&self, ix: usize) -> u64 {
        self.counts[ix].load(Ordering::Relaxed)
    }

    pub fn to_vec(&self) -> Vec<u64> {
        (0..self.counts.len()).map(|ix| self.get(ix)).collect()
    }
}

/// Totals for one batch of reads (or a whole run).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct BatchStats {
    pub reads: u64,
    pub skipped_reads: u64,
    pub kmer_windows: u64,
}

impl BatchStats {
    pub fn merge(self, other: BatchStats) -> BatchStats {
        BatchStats {
            reads: self.reads + other.reads,
            skipped_reads: self.skipped_reads + other.skipped_reads,
            kmer_windows: self.kmer_windows + other.kmer_windows,
        }
    }
}

/// Result of a counting run; `counts[i]` belongs to the i-th sketch.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CountSummary {
    pub reads: u64,
    pub skipped_reads: u64,
    pub kmer_windows: u64,
    pub counts: Vec<u64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContainmentReport {
    pub reference: String,
    pub hits: u64,
    #[serde(rename = "sketchSize")]
    pub sketch_size: usize,
    #[serde(rename = "hitsPerSketchKmer")]
    pub hits_per_sketch_kmer: f64,
}

/// Every overlapping `k`-long window of `seq`; empty when `seq` is shorter
/// than `k`.
#[inline]
pub fn kmer_windows(seq: &[u8], k: usize) -> Windows<u8> {
    seq.windows(k)
}

/// Reads with bytes that can't be nucleotides (or gaps) are skipped.
pub fn is_valid_read(seq: &[u8]) -> bool {
    seq.iter()
        .all(|&b| b.is_ascii_alphabetic() || matches!(b, b'-' | b'.' | b'*'))
}

/// Streams reads against the membership indices of a validated sketch
/// collection.
#[derive(Clone, Debug)]
pub struct ContainmentCounter {
    names: Vec<String>,
    sketch_sizes: Vec<usize>,
    indices: Vec<MembershipIndex>,
    kmer_length: usize,
    canonical: bool,
}

#[allow(clippy::len_without_is_empty)]
impl ContainmentCounter {
    pub fn new(sketches: &[Sketch]) -> KcResult<Self> {
        let params: SketchParams = validate_sketches(sketches)?;
        Ok(ContainmentCounter {
            names: sketches.iter().map(|s| s.name.clone()).collect(),
            sketch_sizes: sketches.iter().map(Sketch::len).collect(),
            indices: build_indices(sketches),
            kmer_length: usize::from(params.k()),
            canonical: params.canonical,
        })
    }

    pub fn kmer_length(&self) -> usize {
        self.kmer_length
    }

    /// Number of reference sketches (never zero once constructed).
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Calls `on_hit(i)` once for every (window, sketch i) pair where the
    /// window is in sketch i. Returns the number of windows scanned.
    pub fn scan_read<F>(&self, seq: &[u8], mut on_hit: F) -> u64
    where
        F: FnMut(usize),
    {
        let norm_seq = normalize_seq(seq);
        let mut n_windows = 0;
        for window in kmer_windows(&norm_seq, self.kmer_length) {
            n_windows += 1;
            let kmer = stored_form(window, self.canonical);
            for (ix, index) in self.indices.iter().enumerate() {
                if index.contains(&kmer) {
                    on_hit(ix);
                }
            }
        }
        n_windows
    }

    pub fn count_into(&self, seq: &[u8], counts: &mut [u64]) -> u64 {
        self.scan_read(seq, |ix| counts[ix] += 1)
    }

    pub fn count_shared(&self, seq: &[u8], counters: &Counters) -> u64 {
        self.scan_read(seq, |ix| counters.increment(ix))
    }

    /// Count one batch of reads on the current rayon pool, adding the hits
    /// into `counters`.
    pub fn count_batch<S>(
        &self,
        reads: &[S],
        aggregation: Aggregation,
        counters: &Counters,
    ) -> BatchStats
    where
        S: AsRef<[u8]> + Sync,
    {
        match aggregation {
            Aggregation::Shared => reads
                .par_iter()
                .map(|read| {
                    self.stats_for(read.as_ref(), |seq| self.count_shared(seq, counters))
                })
                .reduce(BatchStats::default, BatchStats::merge),
            Aggregation::PartialSums => {
                let n = self.len();
                let (stats, partial) = reads
                    .par_iter()
                    .fold(
                        || (BatchStats::default(), vec![0u64; n]),
                        |(stats, mut acc), read| {
                            let read_stats =
                                self.stats_for(read.as_ref(), |seq| self.count_into(seq, &mut acc));
                            (stats.merge(read_stats), acc)
                        },
                    )
                    .reduce(
                        || (BatchStats::default(), vec![0u64; n]),
                        |(s1, mut v1), (s2, v2)| {
                            for (a, b) in v1.iter_mut().zip(v2) {
                                *a += b;
                            }
                            (s1.merge(s2), v1)
                        },
                    );
                for (ix, value) in partial.into_iter().enumerate() {
                    counters.add(ix, value);
                }
                stats
            }
        }
    }

    fn stats_for<F>(&self, seq: &[u8], count: F) -> BatchStats
    where
        F: FnOnce(&[u8]) -> u64,
    {
        if !is_valid_read(seq) {
            warn!(
                "skipping read with non-nucleotide bytes: {}",
                String::from_utf8_lossy(&seq[..seq.len().min(40)])
            );
            return BatchStats {
                reads: 1,
                skipped_reads: 1,
                kmer_windows: 0,
            };
        }
        BatchStats {
            reads: 1,
            skipped_reads: 0,
            kmer_windows: count(seq),
        }
    }

    pub fn report(&self, summary: &CountSummary) -> Vec<ContainmentReport> {
        self.names
            .iter()
            .zip(&self.sketch_sizes)
            .zip(&summary.counts)
            .map(|((name, &sketch_size), &hits)| ContainmentReport {
                reference: name.clone(),
                hits,
                sketch_size,
                hits_per_sketch_kmer: if sketch_size == 0 {
                    0.
                } else {
                    hits as f64 / sketch_size as f64
                },
            })
            .collect()
    }
}
