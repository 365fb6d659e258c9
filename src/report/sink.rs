use std::io::Write;

use super::{Error, Result, StatusReport};

/// Receives the status reports produced on every collection tick.
pub trait StatusSink {
    /// # Errors
    ///
    /// Returns an [`Error`] if the reports cannot be delivered.
    fn publish(&mut self, reports: &[StatusReport]) -> Result<()>;
}

/// Writes each report as one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> StatusSink for JsonLinesSink<W> {
    fn publish(&mut self, reports: &[StatusReport]) -> Result<()> {
        for report in reports {
            serde_json::to_writer(&mut self.writer, report).map_err(|source| {
                Error::Serialize {
                    name: report.name.clone(),
                    source,
                }
            })?;
            self.writer.write_all(b"\n").map_err(Error::Write)?;
        }
        self.writer.flush().map_err(Error::Write)
    }
}
