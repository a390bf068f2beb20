use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use memmap::MmapOptions;
use needletail::errors::ParseErrorKind;
use needletail::{parse_fastx_reader, FastxReader};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::counting::{BatchStats, ContainmentCounter, CountParams, CountSummary, Counters};
use crate::errors::{KcError, KcResult};
use crate::serialization::{read_binary_store, MultiSketch, Sketch, BINARY_EXT, JSON_EXT};
use crate::sketch_schemes::{SketchParams, SketchScheme};

pub mod counting;
pub mod errors;
pub mod index;
pub mod serialization;
pub mod sketch_schemes;
pub mod statistics;

/// Build one sketch per file, in parallel. Sketches are named after their
/// file and come back in the order of `filenames`.
pub fn sketch_files(filenames: &[&str], sketch_params: &SketchParams) -> KcResult<Vec<Sketch>> {
    sketch_params.validate()?;
    filenames
        .par_iter()
        .map(|filename| {
            let reader: Box<dyn Read + Send> = Box::new(File::open(&Path::new(filename))?);
            sketch_stream(reader, filename, sketch_params)
        })
        .collect()
}

pub fn sketch_stream<'a>(
    reader: Box<dyn Read + Send + 'a>,
    name: &str,
    sketch_params: &SketchParams,
) -> KcResult<Sketch> {
    sketch_params.validate()?;
    let mut sketcher = sketch_params.create_sketcher();
    if let Some(mut fastx_reader) = open_fastx(reader)? {
        while let Some(record) = fastx_reader.next() {
            let seqrec = record?;
            sketcher.process(&seqrec.seq());
        }
    }
    let sketch = sketcher.to_sketch(name);
    debug!(
        "sketched {}: {} bases, {} kmers, kept {}",
        name,
        sketch.seq_length,
        sketch.num_valid_kmers,
        sketch.len()
    );
    Ok(sketch)
}

/// Start parsing a FASTA/FASTQ stream; an empty stream has no records rather
/// than being an error.
fn open_fastx<'a>(
    reader: Box<dyn Read + Send + 'a>,
) -> KcResult<Option<Box<dyn FastxReader + 'a>>> {
    match parse_fastx_reader(reader) {
        Ok(fastx_reader) => Ok(Some(fastx_reader)),
        Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Read every sketch in a store without checking that they can be used
/// together.
pub fn read_sketch_file(filename: &str) -> KcResult<Vec<Sketch>> {
    let path = Path::new(filename);
    if !path.exists() {
        return Err(KcError::StoreNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    if filename.ends_with(BINARY_EXT) {
        let mut buf_reader = BufReader::new(file);
        read_binary_store(&mut buf_reader)
    } else if filename.ends_with(JSON_EXT) || filename.ends_with(".json") {
        let mapped = unsafe { MmapOptions::new().map(&file)? };
        let multisketch: MultiSketch = serde_json::from_slice(&mapped)?;
        multisketch.to_sketches()
    } else {
        Err(format_err!("File suffix is not *.bsk, *.sk or *.json"))
    }
}

/// Load a store for counting: read it and fail unless the sketches form a
/// usable collection.
pub fn open_sketch_file(filename: &str) -> KcResult<Vec<Sketch>> {
    let sketches = read_sketch_file(filename)?;
    let params = validate_sketches(&sketches)?;
    info!(
        "loaded {} sketches (k={}) from {}",
        sketches.len(),
        params.k(),
        filename
    );
    Ok(sketches)
}

/// Checks a sketch collection is non-empty, shares one kmer length and
/// hashing setup, and that every sketch carries its sampled kmers.
pub fn validate_sketches(sketches: &[Sketch]) -> KcResult<SketchParams> {
    let params = SketchParams::from_sketches(sketches)?;
    if params.kmer_length == 0 {
        bail!("Sketches have a kmer length of 0");
    }
    for sketch in sketches {
        if sketch.is_empty() || sketch.hashes.iter().any(|h| h.kmer.is_empty()) {
            return Err(KcError::MissingKmers(sketch.name.clone()));
        }
        if let Some(bad) = sketch
            .hashes
            .iter()
            .find(|h| h.kmer.len() != usize::from(params.kmer_length))
        {
            return Err(KcError::MalformedKmer {
                name: sketch.name.clone(),
                expected: params.kmer_length,
                found: bad.kmer.len(),
            });
        }
    }
    Ok(params)
}

/// Count every read of every file in `filenames` against `counter`; all
/// files add into the same set of counters.
pub fn count_files(
    filenames: &[&str],
    counter: &ContainmentCounter,
    params: &CountParams,
) -> KcResult<CountSummary> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.threads)
        .build()?;
    let counters = Counters::new(counter.len());
    let mut stats = BatchStats::default();
    for filename in filenames {
        let reader: Box<dyn Read + Send> = Box::new(File::open(&Path::new(filename))?);
        let file_stats = count_reader(reader, counter, params, &pool, &counters)?;
        info!(
            "{}: {} reads ({} skipped), {} kmers",
            filename, file_stats.reads, file_stats.skipped_reads, file_stats.kmer_windows
        );
        stats = stats.merge(file_stats);
    }
    Ok(summarize(stats, &counters))
}

/// Count a single FASTA/FASTQ stream against `counter`.
pub fn count_stream<'a>(
    reader: Box<dyn Read + Send + 'a>,
    counter: &ContainmentCounter,
    params: &CountParams,
) -> KcResult<CountSummary> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.threads)
        .build()?;
    let counters = Counters::new(counter.len());
    let stats = count_reader(reader, counter, params, &pool, &counters)?;
    Ok(summarize(stats, &counters))
}

fn count_reader<'a>(
    reader: Box<dyn Read + Send + 'a>,
    counter: &ContainmentCounter,
    params: &CountParams,
    pool: &rayon::ThreadPool,
    counters: &Counters,
) -> KcResult<BatchStats> {
    let batch_size = params.batch_size.max(1);
    let mut fastx_reader = match open_fastx(reader)? {
        Some(fastx_reader) => fastx_reader,
        None => {
            debug!("empty reads stream");
            return Ok(BatchStats::default());
        }
    };
    let mut batch: Vec<Vec<u8>> = Vec::with_capacity(batch_size);
    let mut stats = BatchStats::default();

    let flush = |batch: &mut Vec<Vec<u8>>, stats: &mut BatchStats| {
        let batch_stats =
            pool.install(|| counter.count_batch(&batch[..], params.aggregation, counters));
        debug!(
            "batch of {} reads: {} kmers, {} skipped",
            batch_stats.reads, batch_stats.kmer_windows, batch_stats.skipped_reads
        );
        *stats = stats.merge(batch_stats);
        batch.clear();
    };

    while let Some(record) = fastx_reader.next() {
        let seqrec = record?;
        batch.push(seqrec.seq().into_owned());
        if batch.len() >= batch_size {
            flush(&mut batch, &mut stats);
        }
    }
    if !batch.is_empty() {
        flush(&mut batch, &mut stats);
    }
    Ok(stats)
}

fn summarize(stats: BatchStats, counters: &Counters) -> CountSummary {
    CountSummary {
        reads: stats.reads,
        skipped_reads: stats.skipped_reads,
        kmer_windows: stats.kmer_windows,
        counts: counters.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;
    use crate::counting::Aggregation;
    use crate::serialization::{write_binary_store, write_json_store};
    use crate::sketch_schemes::KmerCount;

    fn params(k: u8) -> SketchParams {
        SketchParams {
            kmer_length: k,
            sketch_size: 100,
            ..SketchParams::default()
        }
    }

    fn sketch_of(name: &str, fasta: &'static str, k: u8) -> Sketch {
        sketch_stream(Box::new(Cursor::new(fasta)), name, &params(k)).unwrap()
    }

    fn handmade(name: &str, kmers: &[&str]) -> Sketch {
        Sketch {
            name: name.to_string(),
            seq_length: 0,
            num_valid_kmers: 0,
            comment: String::new(),
            hashes: kmers
                .iter()
                .enumerate()
                .map(|(i, k)| KmerCount {
                    hash: i as u64,
                    kmer: k.as_bytes().to_vec(),
                    count: 1,
                })
                .collect(),
            sketch_params: params(3),
        }
    }

    #[test]
    fn test_sketch_stream() {
        let sketch = sketch_of("ref", ">ref\nAAACCC\n>ref2\nGG\n", 3);
        assert_eq!(sketch.name, "ref");
        assert_eq!(sketch.seq_length, 8);
        assert_eq!(sketch.num_valid_kmers, 4);
        assert_eq!(sketch.len(), 4);
    }

    #[test]
    fn test_missing_store() {
        match open_sketch_file("/this/store/does/not/exist.sk") {
            Err(KcError::StoreNotFound(path)) => {
                assert_eq!(path, Path::new("/this/store/does/not/exist.sk"))
            }
            other => panic!("expected StoreNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_sketches() {
        assert!(matches!(validate_sketches(&[]), Err(KcError::EmptyStore)));

        let mut mixed = vec![handmade("a", &["AAA"]), handmade("b", &["CCCC"])];
        mixed[1].sketch_params.kmer_length = 4;
        assert!(matches!(
            validate_sketches(&mixed),
            Err(KcError::InconsistentKsize { .. })
        ));

        let mut no_kmers = vec![handmade("a", &["AAA"]), handmade("b", &["CCC"])];
        no_kmers[1].hashes[0].kmer.clear();
        assert!(matches!(
            validate_sketches(&no_kmers),
            Err(KcError::MissingKmers(name)) if name == "b"
        ));
        assert!(matches!(
            validate_sketches(&[handmade("empty", &[])]),
            Err(KcError::MissingKmers(_))
        ));

        assert!(matches!(
            validate_sketches(&[handmade("a", &["AAAA"])]),
            Err(KcError::MalformedKmer { found: 4, .. })
        ));

        let params = validate_sketches(&[handmade("a", &["AAA"])]).unwrap();
        assert_eq!(params.k(), 3);
    }

    #[test]
    fn test_mixed_ksize_store_rejected_before_counting() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let mut sketches = vec![handmade("a", &["AAA"]), handmade("b", &["CCCC"])];
        sketches[1].sketch_params.kmer_length = 4;

        // the writers refuse mixed collections too, so go through bincode directly
        let path = dir.path().join("mixed.bsk");
        let encoded = bincode::serialize(&(*b"KCSK", 1u16, &sketches))?;
        File::create(&path)?.write_all(&encoded)?;

        let path = path.to_str().unwrap();
        assert_eq!(read_sketch_file(path)?.len(), 2);
        assert!(matches!(
            open_sketch_file(path),
            Err(KcError::InconsistentKsize { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_store_round_trips() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let sketches = vec![
            sketch_of("a", ">a\nAAACCCTTT\n", 3),
            sketch_of("b", ">b\nCCCGGGA\n", 3),
        ];

        let json_path = dir.path().join("refs.sk");
        write_json_store(&mut File::create(&json_path)?, &sketches)?;
        assert_eq!(open_sketch_file(json_path.to_str().unwrap())?, sketches);

        let bin_path = dir.path().join("refs.bsk");
        write_binary_store(&mut File::create(&bin_path)?, &sketches)?;
        assert_eq!(open_sketch_file(bin_path.to_str().unwrap())?, sketches);

        let other_path = dir.path().join("refs.txt");
        File::create(&other_path)?;
        assert!(read_sketch_file(other_path.to_str().unwrap()).is_err());
        Ok(())
    }

    #[test]
    fn test_count_stream() -> Result<(), Box<dyn std::error::Error>> {
        let sketches = vec![
            handmade("A", &["AAA", "CCC"]),
            handmade("B", &["CCC", "GGG"]),
        ];
        let counter = ContainmentCounter::new(&sketches)?;
        let reads = "@r1\nAAACCCGGG\n+\nIIIIIIIII\n@r2\nAA\n+\nII\n@r3\nGGGG\n+\nIIII\n";

        for aggregation in &[Aggregation::Shared, Aggregation::PartialSums] {
            let params = CountParams {
                threads: 2,
                batch_size: 2,
                aggregation: *aggregation,
            };
            let summary = count_stream(Box::new(Cursor::new(reads)), &counter, &params)?;
            assert_eq!(summary.reads, 3);
            assert_eq!(summary.skipped_reads, 0);
            assert_eq!(summary.kmer_windows, 7 + 0 + 2);
            assert_eq!(summary.counts, vec![2, 4]);
        }
        Ok(())
    }

    #[test]
    fn test_count_empty_stream() -> Result<(), Box<dyn std::error::Error>> {
        let sketches = vec![
            handmade("A", &["AAA", "CCC"]),
            handmade("B", &["CCC", "GGG"]),
        ];
        let counter = ContainmentCounter::new(&sketches)?;
        let summary = count_stream(Box::new(Cursor::new("")), &counter, &CountParams::default())?;
        assert_eq!(summary.reads, 0);
        assert_eq!(summary.kmer_windows, 0);
        assert_eq!(summary.counts, vec![0, 0]);

        let sketch = sketch_stream(Box::new(Cursor::new("")), "empty", &params(3))?;
        assert!(sketch.is_empty());
        assert_eq!(sketch.seq_length, 0);
        Ok(())
    }

    #[test]
    fn test_mixed_seed_store_counts() -> Result<(), Box<dyn std::error::Error>> {
        let mut sketches = vec![
            handmade("A", &["AAA", "CCC"]),
            handmade("B", &["CCC", "GGG"]),
        ];
        sketches[1].sketch_params.hash_seed = 42;
        let counter = ContainmentCounter::new(&sketches)?;
        let reads = ">r1\nAAACCCGGG\n";
        let summary = count_stream(Box::new(Cursor::new(reads)), &counter, &CountParams::default())?;
        assert_eq!(summary.counts, vec![2, 2]);
        Ok(())
    }

    #[test]
    fn test_count_files_accumulates() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("reads.fa");
        File::create(&path)?.write_all(b">r1\nAAACCCGGG\n")?;
        let path = path.to_str().unwrap();

        let sketches = vec![
            handmade("A", &["AAA", "CCC"]),
            handmade("B", &["CCC", "GGG"]),
        ];
        let counter = ContainmentCounter::new(&sketches)?;
        let empty = dir.path().join("empty.fa");
        File::create(&empty)?;
        let empty = empty.to_str().unwrap();

        let summary = count_files(&[path, empty, path], &counter, &CountParams::default())?;
        assert_eq!(summary.reads, 2);
        assert_eq!(summary.counts, vec![4, 4]);
        Ok(())
    }
}
