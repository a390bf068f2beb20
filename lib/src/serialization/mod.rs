mod json;

use std::io::{BufRead, Read, Write};

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::errors::KcResult;
use crate::sketch_schemes::{KmerCount, SketchParams};
use crate::{bail, format_err};
pub use crate::serialization::json::{write_json_store, JsonSketch, MultiSketch};

pub const JSON_EXT: &str = ".sk";
pub const BINARY_EXT: &str = ".bsk";

const BINARY_MAGIC: [u8; 4] = *b"KCSK";
const BINARY_VERSION: u16 = 1;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Sketch {
    pub name: String,
    pub seq_length: u64,
    pub num_valid_kmers: u64,
    pub comment: String,

    pub hashes: Vec<KmerCount>,
    pub sketch_params: SketchParams,
}

impl Sketch {
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn kmers(&self) -> impl Iterator<Item = &[u8]> {
        self.hashes.iter().map(|h| h.kmer.as_slice())
    }
}

#[derive(Serialize)]
struct BinaryStore {
    magic: [u8; 4],
    version: u16,
    sketches: Vec<Sketch>,
}

/// Whether `filename` looks like a sketch store rather than sequence data.
pub fn is_store_filename(filename: &str) -> bool {
    filename.ends_with(JSON_EXT) || filename.ends_with(BINARY_EXT) || filename.ends_with(".json")
}

pub fn write_binary_store(file: &mut dyn Write, sketches: &[Sketch]) -> KcResult<()> {
    // refuse to persist a collection that couldn't be compared later
    SketchParams::for_writing(sketches)?;
    let store = BinaryStore {
        magic: BINARY_MAGIC,
        version: BINARY_VERSION,
        sketches: sketches.to_vec(),
    };
    bincode::serialize_into(file, &store)?;
    Ok(())
}

/// Same layout as `bincode::serialize_into`, but no length prefix may claim
/// more bytes than the store holds.
fn store_options(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit)
}

pub fn read_binary_store(file: &mut dyn BufRead) -> KcResult<Vec<Sketch>> {
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    let limit = buffer.len() as u64;
    let mut reader = buffer.as_slice();

    let magic: [u8; 4] = store_options(limit)
        .deserialize_from(&mut reader)
        .map_err(|_| format_err!("Not a kcontain binary sketch store"))?;
    if magic != BINARY_MAGIC {
        bail!("Not a kcontain binary sketch store");
    }
    let version: u16 = store_options(limit).deserialize_from(&mut reader)?;
    if version != BINARY_VERSION {
        bail!(
            "Unsupported binary sketch store version {} (expected {})",
            version,
            BINARY_VERSION
        );
    }
    let sketches: Vec<Sketch> = store_options(limit).deserialize_from(&mut reader)?;
    Ok(sketches)
}
