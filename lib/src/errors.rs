use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KcError {
    #[error("failed to load/read/write file: {0:?}")]
    Io(#[from] std::io::Error),
    #[error("sketch store not found: {0}")]
    StoreNotFound(PathBuf),
    #[error("sketch store contains no sketches")]
    EmptyStore,
    #[error("first sketch has k {expected}, but sketch {name} has k {found}")]
    InconsistentKsize {
        name: String,
        expected: u8,
        found: u8,
    },
    #[error("sketch {0} has no stored kmers (was the store built with kmer retention?)")]
    MissingKmers(String),
    #[error("sketch {name} stores a kmer of length {found}, expected {expected}")]
    MalformedKmer {
        name: String,
        expected: u8,
        found: usize,
    },
    #[error("failed to parse the fasta/fastq file: {0}")]
    Needletail(#[from] needletail::errors::ParseError),
    #[error("binary store error: {0:?}")]
    Bincode(#[from] bincode::Error),
    #[error("json error: {0:?}")]
    Json(#[from] serde_json::Error),
    #[error("could not start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("kcontain error: {0}")]
    Message(String),
}

pub type KcResult<T> = StdResult<T, KcError>;

#[doc(hidden)]
#[macro_export]
macro_rules! bail {
    ($e:expr) => {
        return Err($crate::errors::KcError::Message($e.to_owned()));
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::KcError::Message(format!($fmt, $($arg)*)))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! format_err {
    ($($arg:tt)*) => { $crate::errors::KcError::Message(format!($($arg)*)) }
}
