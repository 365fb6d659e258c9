//! Parser for `/proc/cpuinfo`.
//!
//! The file is a sequence of `key : value` records, one block per processor.
//! Each block starts with a `processor : N` line that selects the index the
//! following attributes belong to. Before the first such line the index is `0`,
//! so kernels that print a single unnumbered block (some ARM boards) still yield
//! one processor.
//!
//! ```rust
//! use std::path::Path;
//! use sysmon::stats::{ProcessorInfoParser, SnapshotParser};
//!
//! let data = "processor : 0\nmodel name : Example CPU\n\nprocessor : 1\nmodel name : Example CPU\n";
//! let mut parser = ProcessorInfoParser::new("/proc/cpuinfo");
//! parser.refresh_from_reader(data.as_bytes(), Path::new("/proc/cpuinfo")).unwrap();
//!
//! assert_eq!(parser.processor_count(), 2);
//! assert_eq!(parser.report(&1).unwrap()["model name"], "Example CPU");
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::fsutil;

use super::parser::{AttributeTable, SnapshotParser, for_each_line, split_key_value};
use super::{LookupError, RefreshError};

const PROCESSOR_KEY: &str = "processor";

/// Keeps the latest attribute table of every processor listed in `/proc/cpuinfo`.
#[derive(Debug)]
pub struct ProcessorInfoParser {
    path: PathBuf,
    processors: BTreeMap<usize, AttributeTable>,
}

impl ProcessorInfoParser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            processors: BTreeMap::new(),
        }
    }

    /// Number of processors in the current snapshot.
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Parses a cpuinfo-formatted reader and replaces the snapshot with the result.
    ///
    /// Lines without a `:` separator, lines with an empty key, and `processor`
    /// lines whose value is not an integer are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::ReadLine`] if reading fails. The snapshot is only
    /// replaced once the whole input has been read.
    pub fn refresh_from_reader<R: BufRead>(
        &mut self,
        reader: R,
        origin: &Path,
    ) -> Result<(), RefreshError> {
        let mut processors: BTreeMap<usize, AttributeTable> = BTreeMap::new();
        let mut current = 0;

        for_each_line(reader, origin, |lineno, line| {
            let Some((key, value)) = split_key_value(line) else {
                return Ok(ControlFlow::Continue(()));
            };

            if key == PROCESSOR_KEY {
                match value.parse::<usize>() {
                    Ok(index) => current = index,
                    Err(err) => {
                        log::debug!(
                            "skipping malformed processor line {} in `{}`: '{}': {}",
                            lineno,
                            origin.display(),
                            value,
                            err
                        );
                        return Ok(ControlFlow::Continue(()));
                    }
                }
            }

            processors
                .entry(current)
                .or_default()
                .insert(key.to_owned(), value.to_owned());
            Ok(ControlFlow::Continue(()))
        })?;

        self.processors = processors;
        Ok(())
    }
}

impl SnapshotParser for ProcessorInfoParser {
    type Entity = usize;

    fn refresh(&mut self) -> Result<(), RefreshError> {
        let reader = fsutil::open_file_reader(&self.path)?;
        let path = self.path.clone();
        self.refresh_from_reader(reader, &path)
    }

    fn entities(&self) -> Vec<usize> {
        self.processors.keys().copied().collect()
    }

    fn report(&self, index: &usize) -> Result<&AttributeTable, LookupError> {
        self.processors
            .get(index)
            .ok_or(LookupError::UnknownProcessor(*index))
    }
}
