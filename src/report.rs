mod error;
mod models;
mod sink;

pub use error::{Error, Result};
pub use models::{KeyValue, Severity, StatusReport};
pub use sink::{JsonLinesSink, StatusSink};
