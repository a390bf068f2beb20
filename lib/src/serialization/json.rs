use std::fmt;
use std::io::Write;
use std::mem;

use serde::de::{self, Deserializer, Visitor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::bail;
use crate::errors::KcResult;
use crate::serialization::Sketch;
use crate::sketch_schemes::{KmerCount, SketchParams};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JsonSketch {
    pub name: String,
    pub seq_length: Option<u64>,
    pub num_valid_kmers: Option<u64>,
    pub comment: Option<String>,
    pub hashes: Vec<KmerCount>,
}

impl JsonSketch {
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl From<Sketch> for JsonSketch {
    fn from(s: Sketch) -> Self {
        JsonSketch {
            name: s.name,
            seq_length: Some(s.seq_length),
            num_valid_kmers: Some(s.num_valid_kmers),
            comment: Some(s.comment),
            hashes: s.hashes,
        }
    }
}

impl Serialize for JsonSketch {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut hash_list = Vec::with_capacity(self.hashes.len());
        let mut kmer_list = Vec::with_capacity(self.hashes.len());
        let mut count_list = Vec::with_capacity(self.hashes.len());
        for hash in &self.hashes {
            hash_list.push(hash.hash.to_string());
            kmer_list.push(String::from_utf8_lossy(&hash.kmer).into_owned());
            count_list.push(hash.count);
        }

        let mut state = serializer.serialize_struct("Sketch", 7)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("seqLength", &self.seq_length)?;
        state.serialize_field("numValidKmers", &self.num_valid_kmers)?;
        state.serialize_field("comment", &self.comment)?;
        state.serialize_field("hashes", &hash_list)?;
        state.serialize_field("kmers", &kmer_list)?;
        state.serialize_field("counts", &count_list)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for JsonSketch {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[allow(non_snake_case)]
        #[derive(Deserialize)]
        struct BaseJsonSketch {
            pub name: String,
            pub seqLength: Option<u64>,
            pub numValidKmers: Option<u64>,
            pub comment: Option<String>,
            hashes: Vec<QuotedU64>,
            kmers: Option<Vec<String>>,
            counts: Option<Vec<u32>>,
        }

        let mut jsketch = BaseJsonSketch::deserialize(deserializer)?;
        let n_hashes = jsketch.hashes.len();
        if let Some(kmers) = &jsketch.kmers {
            if kmers.len() != n_hashes {
                return Err(de::Error::custom(format!(
                    "sketch {} has {} hashes but {} kmers",
                    jsketch.name,
                    n_hashes,
                    kmers.len()
                )));
            }
        }
        if let Some(counts) = &jsketch.counts {
            if counts.len() != n_hashes {
                return Err(de::Error::custom(format!(
                    "sketch {} has {} hashes but {} counts",
                    jsketch.name,
                    n_hashes,
                    counts.len()
                )));
            }
        }

        let mut kmercount_list = Vec::with_capacity(n_hashes);
        for i in 0..n_hashes {
            let hash = jsketch.hashes[i].0;
            // stores written without kmer retention leave these empty; the
            // loader rejects them before they're used for counting
            let kmer = match &mut jsketch.kmers {
                Some(v) => mem::take(&mut v[i]).into_bytes(),
                None => Vec::new(),
            };
            let count = match &jsketch.counts {
                Some(v) => v[i],
                None => 1,
            };
            kmercount_list.push(KmerCount { hash, kmer, count });
        }
        Ok(JsonSketch {
            name: jsketch.name,
            seq_length: jsketch.seqLength,
            num_valid_kmers: jsketch.numValidKmers,
            comment: jsketch.comment,
            hashes: kmercount_list,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MultiSketch {
    pub kmer: u8,
    pub alphabet: String,
    pub canonical: bool,
    #[serde(rename = "sketchSize")]
    pub sketch_size: u32,
    #[serde(rename = "hashType")]
    pub hash_type: String,
    #[serde(rename = "hashBits")]
    pub hash_bits: u16,
    #[serde(rename = "hashSeed")]
    pub hash_seed: u64,
    pub sketches: Vec<JsonSketch>,
}

impl MultiSketch {
    pub fn get_params(&self) -> KcResult<SketchParams> {
        if self.hash_type != "MurmurHash3_x64_128" {
            bail!("{} sketch type is not supported", self.hash_type);
        }
        if self.hash_bits != 64 {
            bail!(
                "Multisketch has incompatible hash size ({} != 64)",
                self.hash_bits
            );
        }
        Ok(SketchParams {
            kmer_length: self.kmer,
            sketch_size: self.sketch_size as usize,
            hash_seed: self.hash_seed,
            canonical: self.canonical,
        })
    }

    pub fn from_sketches(sketches: &[Sketch]) -> KcResult<Self> {
        let sketch_params = SketchParams::for_writing(sketches)?;
        let json_sketches: Vec<JsonSketch> = sketches.iter().map(|x| x.clone().into()).collect();
        let (hash_type, hash_bits, hash_seed) = sketch_params.hash_info();
        Ok(MultiSketch {
            kmer: sketch_params.k(),
            alphabet: "ACGT".to_string(),
            canonical: sketch_params.canonical,
            sketch_size: sketch_params.sketch_size as u32,
            hash_type: hash_type.to_string(),
            hash_bits,
            hash_seed,
            sketches: json_sketches,
        })
    }

    pub fn to_sketches(&self) -> KcResult<Vec<Sketch>> {
        let sketch_params = self.get_params()?;
        Ok(self
            .sketches
            .iter()
            .map(|sketch| Sketch {
                name: sketch.name.clone(),
                seq_length: sketch.seq_length.unwrap_or(0),
                num_valid_kmers: sketch.num_valid_kmers.unwrap_or(0),
                comment: sketch.comment.clone().unwrap_or_default(),
                hashes: sketch.hashes.clone(),
                sketch_params: sketch_params.clone(),
            })
            .collect())
    }
}

pub fn write_json_store(file: &mut dyn Write, sketches: &[Sketch]) -> KcResult<()> {
    let multisketch = MultiSketch::from_sketches(sketches)?;
    serde_json::to_writer(file, &multisketch)?;
    Ok(())
}

struct QuotedU64(u64);

impl<'de> Deserialize<'de> for QuotedU64 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct QuotedU64Visitor;

        impl Visitor<'_> for QuotedU64Visitor {
            type Value = QuotedU64;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("u64 as a json string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                value.parse().map(QuotedU64).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(QuotedU64Visitor)
    }
}
