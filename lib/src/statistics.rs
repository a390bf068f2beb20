use crate::sketch_schemes::KmerCount;

/// Estimates the number of distinct kmers in the sequence a bottom-n sketch
/// was built from.
///
/// Uses the k-minimum values estimate: if the n-th smallest of the hashes
/// sits at fraction `f` of the hash space, there are about `(n - 1) / f`
/// distinct values. Sketches that never filled up hold every distinct kmer,
/// so their size is returned as-is.
pub fn cardinality(sketch: &[KmerCount], sketch_size: usize) -> u64 {
    let max_hash = match sketch.last() {
        None => return 0,
        Some(kmer) => kmer.hash,
    };
    if sketch.len() < sketch_size || max_hash == 0 {
        return sketch.len() as u64;
    }
    ((sketch.len() - 1) as f64 / (max_hash as f64 / u64::MAX as f64)) as u64
}
