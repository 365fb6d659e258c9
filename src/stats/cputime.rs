//! Parser for the CPU time-accounting lines at the top of `/proc/stat`.
//!
//! Every `cpu` line carries ten tick counters in a fixed column order:
//!
//! ```text
//! cpu  4705 356 584 3699 23 23 0 0 0 0
//! cpu0 1393 280 283 3018 8 11 0 0 0 0
//! ```
//!
//! The first line is the aggregate over all processors, the `cpuN` lines that
//! follow are per processor. Parsing stops at the first line that is not a `cpu`
//! line. All ten columns are load-bearing: a short line or a non-numeric column
//! fails the whole refresh instead of producing a partial record.

use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use crate::fsutil;

use super::parser::{AttributeTable, SnapshotParser, for_each_line};
use super::{LookupError, RefreshError};

const CPU_PREFIX: &str = "cpu";
const TOTAL_FIELD: &str = "total";

/// Column names of a `cpu` line, in source order.
pub const CPU_TIME_FIELDS: [&str; 10] = [
    "user",
    "nice",
    "system",
    "idle",
    "iowait",
    "irq",
    "softirq",
    "steal",
    "guest",
    "guest_nice",
];

/// Selects either the aggregate `cpu` line or a single `cpuN` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CpuSlot {
    Aggregate,
    Processor(usize),
}

impl fmt::Display for CpuSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuSlot::Aggregate => write!(f, "{CPU_PREFIX}"),
            CpuSlot::Processor(index) => write!(f, "{CPU_PREFIX}{index}"),
        }
    }
}

/// Keeps the latest tick counters of the aggregate and every per-processor line.
#[derive(Debug)]
pub struct ProcessorTimeParser {
    path: PathBuf,
    aggregate: Option<AttributeTable>,
    processors: BTreeMap<usize, AttributeTable>,
}

impl ProcessorTimeParser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            aggregate: None,
            processors: BTreeMap::new(),
        }
    }

    /// Number of per-processor lines in the current snapshot, not counting the aggregate.
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Parses a `/proc/stat`-formatted reader and replaces the snapshot with the result.
    ///
    /// # Errors
    ///
    /// - [`RefreshError::ReadLine`] if reading fails.
    /// - [`RefreshError::MissingFields`] if a `cpu` line has fewer than ten counters.
    /// - [`RefreshError::InvalidValue`] if a counter or a `cpuN` index is not an integer.
    ///
    /// On error the previous snapshot is kept as it was.
    pub fn refresh_from_reader<R: BufRead>(
        &mut self,
        reader: R,
        origin: &Path,
    ) -> Result<(), RefreshError> {
        let mut aggregate = None;
        let mut processors = BTreeMap::new();

        for_each_line(reader, origin, |lineno, line| {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next().filter(|key| key.starts_with(CPU_PREFIX)) else {
                return Ok(ControlFlow::Break(()));
            };

            let slot = parse_slot(key, origin, lineno)?;
            let values: Vec<&str> = tokens.take(CPU_TIME_FIELDS.len()).collect();
            if values.len() < CPU_TIME_FIELDS.len() {
                return Err(RefreshError::MissingFields {
                    path: origin.to_path_buf(),
                    line: lineno,
                    expected: CPU_TIME_FIELDS.len() + 1,
                    found: values.len() + 1,
                });
            }

            let table = parse_counters(&values, origin, lineno)?;
            match slot {
                CpuSlot::Aggregate => aggregate = Some(table),
                CpuSlot::Processor(index) => {
                    processors.insert(index, table);
                }
            }
            Ok(ControlFlow::Continue(()))
        })?;

        self.aggregate = aggregate;
        self.processors = processors;
        Ok(())
    }
}

/// Maps `cpu` to the aggregate slot and `cpuN` to processor `N`.
fn parse_slot(key: &str, origin: &Path, lineno: usize) -> Result<CpuSlot, RefreshError> {
    let suffix = &key[CPU_PREFIX.len()..];
    if suffix.is_empty() {
        return Ok(CpuSlot::Aggregate);
    }

    suffix
        .parse::<usize>()
        .map(CpuSlot::Processor)
        .map_err(|source| RefreshError::InvalidValue {
            path: origin.to_path_buf(),
            field: "processor".to_owned(),
            value: suffix.to_owned(),
            line: lineno,
            source,
        })
}

/// Builds the attribute table for one `cpu` line: the ten raw counters plus their sum.
fn parse_counters(
    values: &[&str],
    origin: &Path,
    lineno: usize,
) -> Result<AttributeTable, RefreshError> {
    let mut table = AttributeTable::new();
    let mut total: u64 = 0;

    for (field, value) in CPU_TIME_FIELDS.iter().zip(values) {
        let ticks = value
            .parse::<u64>()
            .map_err(|source| RefreshError::InvalidValue {
                path: origin.to_path_buf(),
                field: (*field).to_owned(),
                value: (*value).to_owned(),
                line: lineno,
                source,
            })?;
        total = total.saturating_add(ticks);
        table.insert((*field).to_owned(), (*value).to_owned());
    }

    table.insert(TOTAL_FIELD.to_owned(), total.to_string());
    Ok(table)
}

impl SnapshotParser for ProcessorTimeParser {
    type Entity = CpuSlot;

    fn refresh(&mut self) -> Result<(), RefreshError> {
        let reader = fsutil::open_file_reader(&self.path)?;
        let path = self.path.clone();
        self.refresh_from_reader(reader, &path)
    }

    fn entities(&self) -> Vec<CpuSlot> {
        self.aggregate
            .iter()
            .map(|_| CpuSlot::Aggregate)
            .chain(self.processors.keys().copied().map(CpuSlot::Processor))
            .collect()
    }

    fn report(&self, slot: &CpuSlot) -> Result<&AttributeTable, LookupError> {
        let table = match slot {
            CpuSlot::Aggregate => self.aggregate.as_ref(),
            CpuSlot::Processor(index) => self.processors.get(index),
        };
        table.ok_or(LookupError::UnknownCpuSlot(*slot))
    }
}
