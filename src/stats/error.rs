//! Error types shared by the snapshot parsers.
//!
//! - [`RefreshError`]: a `refresh()` call failed. The parser keeps its previous
//!   snapshot, so callers continue to see stale-but-present data.
//! - [`LookupError`]: a `report()` call asked for an entity the parser has never
//!   observed, or for a singleton that has not been populated yet.
//!
//! Malformed individual lines in free-form sources are not errors at all: they are
//! logged and skipped by the parser that encounters them.

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

use crate::fsutil::FileOpenError;

use super::cputime::CpuSlot;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    SourceUnavailable(#[from] FileOpenError),

    #[error("failed to read line for file `{path}`: {source}")]
    ReadLine {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for '{field}' at line {line} of `{path}`: '{value}': {source}")]
    InvalidValue {
        path: PathBuf,
        field: String,
        value: String,
        line: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("expected at least {expected} fields at line {line} of `{path}`, found {found}")]
    MissingFields {
        path: PathBuf,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("no usable data in `{path}`")]
    Empty { path: PathBuf },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("unknown processor id {0}")]
    UnknownProcessor(usize),

    #[error("unknown cpu time entry `{0}`")]
    UnknownCpuSlot(CpuSlot),

    #[error("invalid disk name `{0}`")]
    UnknownMount(String),

    #[error("no snapshot available yet")]
    NoSnapshot,
}
