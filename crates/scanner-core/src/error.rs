use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Data unavailable for {ticker}: {field}")]
    DataUnavailable { ticker: String, field: &'static str },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State store error: {0}")]
    StateStore(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Delivery error: {0}")]
    Delivery(String),
}
