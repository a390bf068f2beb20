use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use clap::{crate_authors, crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use kcontain::counting::{Aggregation, CountParams};
use kcontain::sketch_schemes::SketchParams;

pub fn build_cli() -> App<'static, 'static> {
    App::new("kcontain")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Count k-mer containment of sequencing reads in reference sketches")
        .setting(AppSettings::VersionlessSubcommands)
        .setting(AppSettings::ArgRequiredElseHelp)
        .subcommand(sketch_command())
        .subcommand(count_command())
        .subcommand(info_command())
}

fn sketch_command() -> App<'static, 'static> {
    let mut sketch_command = SubCommand::with_name("sketch")
        .about("Build a sketch store from reference FASTA/Q file(s)")
        .arg(
            Arg::with_name("INPUT")
                .help("The reference file(s) to sketch")
                .multiple(true)
                .required(true),
        )
        .arg(
            Arg::with_name("binary_format")
                .short("b")
                .long("binary-format")
                .help("Write the store in the binary format"),
        );
    sketch_command = add_output_options(sketch_command);
    sketch_command = add_sketch_options(sketch_command);
    sketch_command
}

fn count_command() -> App<'static, 'static> {
    SubCommand::with_name("count")
        .about("Count read kmers found in each reference sketch")
        .arg(
            Arg::with_name("STORE")
                .help("Sketch store (*.sk, *.json or *.bsk) to count against")
                .required(true),
        )
        .arg(
            Arg::with_name("READS")
                .help("FASTA/Q file(s) of reads")
                .multiple(true)
                .required(true),
        )
        .arg(
            Arg::with_name("threads")
                .short("t")
                .long("threads")
                .takes_value(true)
                .default_value("0")
                .help("Number of worker threads (0 uses all cores)"),
        )
        .arg(
            Arg::with_name("batch_size")
                .long("batch-size")
                .takes_value(true)
                .default_value("10000")
                .help("How many reads to hand to the workers at a time"),
        )
        .arg(
            Arg::with_name("strategy")
                .long("strategy")
                .takes_value(true)
                .possible_values(&["partial", "shared"])
                .default_value("partial")
                .help("Sum hits per worker and merge (`partial`) or increment shared counters (`shared`)"),
        )
        .arg(
            Arg::with_name("output_file")
                .short("o")
                .long("output")
                .help("Write the report to this file instead of stdout")
                .takes_value(true),
        )
}

fn info_command() -> App<'static, 'static> {
    SubCommand::with_name("info")
        .about("Display basic statistics about sketch stores")
        .arg(
            Arg::with_name("INPUT")
                .help("Return stats on these store(s)")
                .multiple(true)
                .required(true),
        )
}

fn add_sketch_options<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(Arg::with_name("kmer_length")
         .short("k")
         .long("kmer-length")
         .takes_value(true)
         .default_value("21")
         .help("Length of kmers to use"))
    .arg(Arg::with_name("n_hashes")
         .short("n")
         .long("n-hashes")
         .takes_value(true)
         .default_value("1000")
         .help("How many kmers/hashes to keep per reference"))
    .arg(Arg::with_name("seed")
         .long("seed")
         .takes_value(true)
         .default_value("0")
         .help("Seed murmurhash with this value"))
    .arg(Arg::with_name("canonical")
         .short("c")
         .long("canonical")
         .help("Fold kmers and their reverse complements together"))
}

fn add_output_options<'a, 'b>(app: App<'a, 'b>) -> App<'a, 'b> {
    app.arg(
        Arg::with_name("output_file")
            .short("o")
            .long("output")
            .help("Output to this file")
            .takes_value(true),
    )
    .arg(
        Arg::with_name("std_out")
            .short("O")
            .long("std-out")
            .help("Output to stdout ('print to terminal')")
            .conflicts_with("output_file"),
    )
}

pub fn get_int_arg<T: FromStr>(matches: &ArgMatches, key: &str) -> Result<T> {
    let display_key = key.replace('_', "-");
    matches
        .value_of(key)
        .ok_or_else(|| anyhow!("Bad {}", display_key))?
        .parse::<T>()
        .map_err(|_| anyhow!("{} must be a positive integer", display_key))
}

pub fn parse_sketch_options(matches: &ArgMatches) -> Result<SketchParams> {
    let kmer_length: u8 = get_int_arg(matches, "kmer_length")?;
    if kmer_length == 0 {
        bail!("kmer-length must be at least 1");
    }
    let sketch_size: usize = get_int_arg(matches, "n_hashes")?;
    if sketch_size == 0 {
        bail!("n-hashes must be at least 1");
    }
    Ok(SketchParams {
        kmer_length,
        sketch_size,
        hash_seed: get_int_arg(matches, "seed")?,
        canonical: matches.is_present("canonical"),
    })
}

pub fn parse_count_options(matches: &ArgMatches) -> Result<CountParams> {
    let batch_size: usize = get_int_arg(matches, "batch_size")?;
    if batch_size == 0 {
        bail!("batch-size must be at least 1");
    }
    let aggregation: Aggregation = matches
        .value_of("strategy")
        .unwrap_or("partial")
        .parse()?;
    Ok(CountParams {
        threads: get_int_arg(matches, "threads")?,
        batch_size,
        aggregation,
    })
}
