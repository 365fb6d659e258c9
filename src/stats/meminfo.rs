//! Parser for `/proc/meminfo`.
//!
//! Each line is `Key:   value [unit]`. Values are kept verbatim including the
//! unit suffix, e.g. `MemTotal` → `16318412 kB`. An optional allowlist restricts
//! which keys end up in the snapshot.

use std::collections::HashSet;
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::fsutil;

use super::parser::{AttributeTable, SnapshotParser, for_each_line, split_key_value};
use super::{LookupError, RefreshError};

/// Keeps the latest memory counters as a single attribute table.
#[derive(Debug)]
pub struct MemoryInfoParser {
    path: PathBuf,
    allowlist: HashSet<String>,
    memory: Option<AttributeTable>,
}

impl MemoryInfoParser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            allowlist: HashSet::new(),
            memory: None,
        }
    }

    /// Restricts the snapshot to the given keys. An empty list keeps every key.
    pub fn with_allowlist<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowlist = keys.into_iter().map(Into::into).collect();
        self
    }

    fn is_allowed(&self, key: &str) -> bool {
        self.allowlist.is_empty() || self.allowlist.contains(key)
    }

    /// Parses a meminfo-formatted reader and replaces the snapshot with the result.
    ///
    /// Malformed lines are skipped; a repeated key keeps its last value.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::ReadLine`] if reading fails.
    pub fn refresh_from_reader<R: BufRead>(
        &mut self,
        reader: R,
        origin: &Path,
    ) -> Result<(), RefreshError> {
        let mut memory = AttributeTable::new();

        for_each_line(reader, origin, |lineno, line| {
            match split_key_value(line) {
                Some((key, value)) if self.is_allowed(key) => {
                    memory.insert(key.to_owned(), value.to_owned());
                }
                Some(_) => {}
                None if line.trim().is_empty() => {}
                None => log::debug!(
                    "skipping malformed line {} in `{}`: '{}'",
                    lineno,
                    origin.display(),
                    line
                ),
            }
            Ok(ControlFlow::Continue(()))
        })?;

        self.memory = Some(memory);
        Ok(())
    }
}

impl SnapshotParser for MemoryInfoParser {
    type Entity = ();

    fn refresh(&mut self) -> Result<(), RefreshError> {
        let reader = fsutil::open_file_reader(&self.path)?;
        let path = self.path.clone();
        self.refresh_from_reader(reader, &path)
    }

    fn entities(&self) -> Vec<()> {
        vec![()]
    }

    fn report(&self, _: &()) -> Result<&AttributeTable, LookupError> {
        self.memory.as_ref().ok_or(LookupError::NoSnapshot)
    }
}
