use thiserror::Error;

pub type Result<T> = std::result::Result<T, SiftError>;

#[derive(Error, Debug)]
pub enum SiftError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("CSV error on line {line}: {message}")]
    Csv { line: usize, message: String },
    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Geolocation error: {0}")]
    Geo(String),
    #[error("Time range needs {required} buckets, limit is {limit}")]
    BucketLimit { required: u64, limit: u64 },
}

impl SiftError {
    pub fn csv(line: usize, message: impl Into<String>) -> Self {
        SiftError::Csv {
            line,
            message: message.into(),
        }
    }
}
