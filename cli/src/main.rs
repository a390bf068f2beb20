use std::fs::File;
use std::io::{stdout, Write};

use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use serde::Serialize;
use tracing::info;

use crate::cli::{parse_count_options, parse_sketch_options};
use kcontain::counting::{ContainmentCounter, ContainmentReport};
use kcontain::serialization::{
    is_store_filename, write_binary_store, write_json_store, Sketch, BINARY_EXT, JSON_EXT,
};
use kcontain::statistics::cardinality;
use kcontain::{count_files, open_sketch_file, read_sketch_file, sketch_files};

mod cli;

#[derive(Serialize)]
struct CountOutput {
    reads: u64,
    #[serde(rename = "skippedReads")]
    skipped_reads: u64,
    #[serde(rename = "kmerWindows")]
    kmer_windows: u64,
    counts: Vec<ContainmentReport>,
}

fn output_to<F>(output_fn: F, output: Option<&str>, extension: &str) -> Result<()>
where
    F: Fn(&mut dyn Write) -> Result<()>,
{
    match output {
        None => {
            let mut out = stdout();
            output_fn(&mut out)?;
        }
        Some(o) => {
            // if the filename doesn't have the right extension
            // add it on
            let filename = String::from(o);
            let out_filename = if filename.ends_with(extension) {
                filename
            } else {
                filename + extension
            };

            let mut out = File::create(&out_filename)
                .context(format!("unable to create '{}'", out_filename))?;
            output_fn(&mut out)?;
        }
    };
    Ok(())
}

fn write_store(writer: &mut dyn Write, sketches: &[Sketch], binary: bool) -> Result<()> {
    if binary {
        write_binary_store(writer, sketches)?;
    } else {
        write_json_store(writer, sketches)?;
    }
    Ok(())
}

fn run() -> Result<()> {
    let matches = cli::build_cli().get_matches();

    match matches.subcommand() {
        ("sketch", Some(matches)) => {
            let binary = matches.is_present("binary_format");
            let file_ext = if binary { BINARY_EXT } else { JSON_EXT };

            if matches.is_present("output_file") || matches.is_present("std_out") {
                let sketches = sketch_inputs(matches)?;
                output_to(
                    |writer| write_store(writer, &sketches, binary),
                    matches.value_of("output_file"),
                    file_ext,
                )?;
            } else {
                // special case for "sketching in place"
                generate_sketch_files(matches, file_ext, binary)?;
            }
        }
        ("count", Some(matches)) => {
            let store = matches
                .value_of("STORE")
                .ok_or_else(|| anyhow!("Bad STORE"))?;
            let reads: Vec<_> = matches
                .values_of("READS")
                .ok_or_else(|| anyhow!("Bad READS"))?
                .collect();
            let count_params = parse_count_options(matches)?;

            let sketches =
                open_sketch_file(store).with_context(|| format!("could not load '{}'", store))?;
            let counter = ContainmentCounter::new(&sketches)?;
            info!(
                "counting {} read file(s) against {} references (k={})",
                reads.len(),
                counter.len(),
                counter.kmer_length()
            );
            let summary = count_files(&reads, &counter, &count_params)?;

            let output = CountOutput {
                reads: summary.reads,
                skipped_reads: summary.skipped_reads,
                kmer_windows: summary.kmer_windows,
                counts: counter.report(&summary),
            };
            output_to(
                |writer| {
                    serde_json::to_writer(writer, &output)
                        .map_err(|_| anyhow!("Could not serialize JSON to file"))?;
                    Ok(())
                },
                matches.value_of("output_file"),
                ".json",
            )?;
        }
        ("info", Some(matches)) => {
            let filenames = matches
                .values_of("INPUT")
                .ok_or_else(|| anyhow!("Bad INPUT"))?;
            for filename in filenames {
                let sketches = read_sketch_file(filename)
                    .with_context(|| format!("could not read '{}'", filename))?;
                for sketch in sketches {
                    let params = &sketch.sketch_params;
                    println!("{} (from {}bp)", &sketch.name, sketch.seq_length);
                    println!("  Kmer length: {}", params.k());
                    println!(
                        "  Sketch size: {} of {} kmers",
                        sketch.len(),
                        sketch.num_valid_kmers
                    );
                    println!(
                        "  Estimated # of Unique Kmers: {}",
                        cardinality(&sketch.hashes, params.sketch_size)
                    );
                    let has_kmers = !sketch.is_empty() && sketch.kmers().all(|k| !k.is_empty());
                    println!("  Kmers retained: {}", if has_kmers { "yes" } else { "no" });
                }
            }
        }
        other => bail!("Unknown subcommand: {:?}", other.0),
    };

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        eprintln!("Error: {:?}", err);
        std::process::exit(1);
    }
}

fn input_filenames<'a>(matches: &'a ArgMatches) -> Result<Vec<&'a str>> {
    let filenames: Vec<_> = matches
        .values_of("INPUT")
        .ok_or_else(|| anyhow!("Bad INPUT"))?
        .collect();
    for filename in &filenames {
        if is_store_filename(filename) {
            bail!("Filename {} is not a sequence file?", filename);
        }
    }
    Ok(filenames)
}

fn sketch_inputs(matches: &ArgMatches) -> Result<Vec<Sketch>> {
    let filenames = input_filenames(matches)?;
    let sketch_params = parse_sketch_options(matches)?;
    let sketches = sketch_files(&filenames, &sketch_params)?;
    info!("sketched {} reference file(s)", sketches.len());
    Ok(sketches)
}

fn generate_sketch_files(matches: &ArgMatches, file_ext: &str, binary: bool) -> Result<()> {
    let filenames = input_filenames(matches)?;
    let sketch_params = parse_sketch_options(matches)?;

    for filename in filenames {
        let sketches = sketch_files(&[filename], &sketch_params)?;

        let out_filename = filename.to_string() + file_ext;
        let mut out = File::create(&out_filename)
            .with_context(|| format!("Could not open {}", out_filename))?;
        write_store(&mut out, &sketches, binary)?;
        info!("wrote {}", out_filename);
    }
    Ok(())
}
