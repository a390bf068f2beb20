use std::collections::HashSet;

use crate::serialization::Sketch;

/// Read-only set of the kmers retained in one sketch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MembershipIndex {
    kmers: HashSet<Vec<u8>>,
}

impl MembershipIndex {
    pub fn build(sketch: &Sketch) -> Self {
        MembershipIndex {
            kmers: sketch.kmers().map(|k| k.to_vec()).collect(),
        }
    }

    #[inline]
    pub fn contains(&self, kmer: &[u8]) -> bool {
        self.kmers.contains(kmer)
    }
}

pub fn build_indices(sketches: &[Sketch]) -> Vec<MembershipIndex> {
    sketches.iter().map(MembershipIndex::build).collect()
}
