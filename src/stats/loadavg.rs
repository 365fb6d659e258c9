//! Parser for `/proc/loadavg`.

use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::fsutil;

use super::parser::{AttributeTable, SnapshotParser, for_each_line};
use super::{LookupError, RefreshError};

/// Attribute names for the three load averages, in source order.
pub const LOAD_AVERAGE_FIELDS: [&str; 3] = ["1 minute", "5 minute", "15 minute"];

/// Keeps the latest 1, 5 and 15 minute load averages.
#[derive(Debug)]
pub struct LoadAverageParser {
    path: PathBuf,
    load: Option<AttributeTable>,
}

impl LoadAverageParser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            load: None,
        }
    }

    /// Parses the first non-blank line of a loadavg-formatted reader.
    ///
    /// The first three whitespace-separated tokens are kept verbatim; the
    /// running/total task counter and the last PID are ignored.
    ///
    /// # Errors
    ///
    /// - [`RefreshError::ReadLine`] if reading fails.
    /// - [`RefreshError::MissingFields`] if the line has fewer than three tokens.
    /// - [`RefreshError::Empty`] if the input has no non-blank line.
    pub fn refresh_from_reader<R: BufRead>(
        &mut self,
        reader: R,
        origin: &Path,
    ) -> Result<(), RefreshError> {
        let mut load = None;

        for_each_line(reader, origin, |lineno, line| {
            let tokens: Vec<&str> = line
                .split_whitespace()
                .take(LOAD_AVERAGE_FIELDS.len())
                .collect();
            if tokens.is_empty() {
                return Ok(ControlFlow::Continue(()));
            }
            if tokens.len() < LOAD_AVERAGE_FIELDS.len() {
                return Err(RefreshError::MissingFields {
                    path: origin.to_path_buf(),
                    line: lineno,
                    expected: LOAD_AVERAGE_FIELDS.len(),
                    found: tokens.len(),
                });
            }

            load = Some(
                LOAD_AVERAGE_FIELDS
                    .iter()
                    .zip(tokens)
                    .map(|(name, value)| ((*name).to_owned(), value.to_owned()))
                    .collect::<AttributeTable>(),
            );
            Ok(ControlFlow::Break(()))
        })?;

        match load {
            Some(load) => {
                self.load = Some(load);
                Ok(())
            }
            None => Err(RefreshError::Empty {
                path: origin.to_path_buf(),
            }),
        }
    }
}

impl SnapshotParser for LoadAverageParser {
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
        self.load.as_ref().ok_or(LookupError::NoSnapshot)
    }
}
