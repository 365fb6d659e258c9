#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to serialize status report `{name}`: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write status reports: {0}")]
    Write(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
