// Error type shared by the loader, geocoder, config and output layers.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("number format error: {0}")]
    Format(#[from] num_format::Error),
    #[error("geocoding failed: {0}")]
    Geocode(String),
    #[error("input schema error: {0}")]
    Schema(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    /// A categorical value expected by a report is absent from the table.
    #[error("missing category: {0}")]
    MissingCategory(String),
}

pub type Result<T> = std::result::Result<T, DashboardError>;
