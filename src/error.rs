//! Error types for the qonto-export library.

use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while fetching, mapping and writing exports.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The configured IBAN failed structure or checksum validation.
    #[error("{0} is not a valid IBAN")]
    InvalidIban(String),

    /// The API answered with a non-success status.
    #[error("HTTP {status} returned by {url}")]
    Http { status: u16, url: String },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid API root or endpoint.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A lookup against the API came back empty.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error writing XML.
    #[error("XML error: {0}")]
    XmlError(String),

    /// Error writing the XLSX workbook.
    #[error("XLSX error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Error writing the zip archive.
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid amount format.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Neither a directory nor an output file was given where one is required.
    #[error("Please specify either a --dir or --out option")]
    MissingOutput,
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::XmlError(err.to_string())
    }
}
