//! The contract shared by every snapshot parser, plus the line-reading helpers
//! they are built on.
//!
//! A parser owns exactly one snapshot: the set of entities it currently knows
//! about, each mapped to an [`AttributeTable`]. The snapshot starts out empty,
//! is replaced wholesale by every successful [`SnapshotParser::refresh`], and is
//! left untouched by every failed one.
//!
//! # Example: driving a parser
//!
//! ```no_run
//! use sysmon::stats::{LoadAverageParser, SnapshotParser};
//!
//! let mut loadavg = LoadAverageParser::new("/proc/loadavg");
//! loadavg.refresh()?;
//! for (name, value) in loadavg.report(&())? {
//!     println!("{name}: {value}");
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;
use std::io::BufRead;
use std::ops::ControlFlow;
use std::path::Path;

use super::{LookupError, RefreshError};

/// Attribute name to attribute value, both kept as the raw strings seen in the source.
pub type AttributeTable = BTreeMap<String, String>;

/// A stateful parser that keeps the latest snapshot of one kernel source.
pub trait SnapshotParser {
    /// Identifies one entity within this parser's snapshot.
    type Entity;

    /// Re-reads the source and replaces the snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`RefreshError`] if the source cannot be read or a load-bearing
    /// field fails to parse. The previous snapshot stays in place.
    fn refresh(&mut self) -> Result<(), RefreshError>;

    /// Returns every entity currently present in the snapshot.
    fn entities(&self) -> Vec<Self::Entity>;

    /// Returns the attribute table of one entity.
    ///
    /// # Errors
    ///
    /// Returns a [`LookupError`] if the entity is not part of the snapshot.
    fn report(&self, entity: &Self::Entity) -> Result<&AttributeTable, LookupError>;
}

/// Feeds every line of `reader` to `f` until the input ends or `f` breaks.
///
/// Line numbers passed to `f` are 1-based. Trailing newlines are stripped.
/// Lines that are not valid UTF-8 are skipped with a debug log message.
///
/// # Errors
///
/// Returns [`RefreshError::ReadLine`] if reading fails, or whatever `f` returns.
pub(crate) fn for_each_line<R, F>(
    mut reader: R,
    origin: &Path,
    mut f: F,
) -> Result<(), RefreshError>
where
    R: BufRead,
    F: FnMut(usize, &str) -> Result<ControlFlow<()>, RefreshError>,
{
    let mut line = Vec::with_capacity(256);
    let mut lineno = 0;

    while reader
        .read_until(b'\n', &mut line)
        .map_err(|source| RefreshError::ReadLine {
            path: origin.to_path_buf(),
            source,
        })?
        != 0
    {
        lineno += 1;
        match std::str::from_utf8(&line) {
            Ok(content) => {
                if f(lineno, content.trim_end_matches(['\n', '\r']))?.is_break() {
                    break;
                }
            }
            Err(err) => {
                log::debug!(
                    "skipping line {} in `{}`: {}",
                    lineno,
                    origin.display(),
                    err
                );
            }
        }
        line.clear();
    }

    Ok(())
}

/// Splits a `key: value` line on its first `:` and trims both halves.
///
/// Returns `None` if the line has no separator or the key is empty.
pub(crate) fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_key_value_trims_both_sides() {
        assert_eq!(
            split_key_value("model name\t: Intel(R) Xeon(R)  "),
            Some(("model name", "Intel(R) Xeon(R)"))
        );
    }

    #[test]
    fn test_split_key_value_keeps_later_separators() {
        assert_eq!(
            split_key_value("address sizes : 39 bits: physical"),
            Some(("address sizes", "39 bits: physical"))
        );
    }

    #[test]
    fn test_split_key_value_allows_empty_value() {
        assert_eq!(split_key_value("power management:"), Some(("power management", "")));
    }

    #[test]
    fn test_split_key_value_rejects_malformed() {
        assert_eq!(split_key_value("no separator here"), None);
        assert_eq!(split_key_value("   : orphan value"), None);
        assert_eq!(split_key_value(""), None);
    }

    #[test]
    fn test_for_each_line_numbers_and_stops() {
        let data = "a\nb\r\nc\nd\n";
        let mut seen = Vec::new();
        for_each_line(data.as_bytes(), Path::new("/dummy"), |lineno, line| {
            seen.push((lineno, line.to_owned()));
            if line == "c" {
                Ok(ControlFlow::Break(()))
            } else {
                Ok(ControlFlow::Continue(()))
            }
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![(1, "a".to_owned()), (2, "b".to_owned()), (3, "c".to_owned())]
        );
    }

    #[test]
    fn test_for_each_line_skips_invalid_utf8() {
        let data: &[u8] = b"first\ncaf\xE9\nthird\n";
        let mut seen = Vec::new();
        for_each_line(data, Path::new("/dummy"), |lineno, line| {
            seen.push((lineno, line.to_owned()));
            Ok(ControlFlow::Continue(()))
        })
        .unwrap();

        assert_eq!(seen, vec![(1, "first".to_owned()), (3, "third".to_owned())]);
    }

    #[test]
    fn test_for_each_line_propagates_callback_error() {
        let err = for_each_line("x\n".as_bytes(), Path::new("/dummy"), |_, _| {
            Err(RefreshError::Empty {
                path: Path::new("/dummy").to_path_buf(),
            })
        })
        .unwrap_err();
        assert!(matches!(err, RefreshError::Empty { .. }));
    }
}
