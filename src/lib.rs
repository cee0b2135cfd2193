//! Qonto Export Library
//!
//! Fetches the transactions of a Qonto bank account and exports them as a
//! bank statement.
//!
//! # Supported Formats
//!
//! - **OFX 2.2**: XML statement for accounting software
//! - **XLSX**: one spreadsheet row per transaction
//!
//! # Features
//!
//! - Paginated transaction listing filtered by settlement date and status
//! - Optional download of transaction attachments next to the export
//! - Optional zip packaging of the output directory
//! - Pluggable HTTP transport for testing
//!
//! # Examples
//!
//! ## Writing an OFX statement
//!
//! ```no_run
//! use std::io;
//! use qonto_export::{Config, QontoClient};
//! use qonto_export::export::{export_ofx, ExportOptions};
//!
//! let config = Config::new("acme-1234", "secret-key", "FR7630006000011234567890189")?;
//! let client = QontoClient::new(config)?;
//! export_ofx(&client, &ExportOptions::default(), true, &mut io::stdout())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Building an OFX statement by hand
//!
//! ```no_run
//! use qonto_export::{Config, QontoClient, TransactionFilter};
//! use qonto_export::ofx_format::OfxStatement;
//!
//! let config = Config::new("acme-1234", "secret-key", "FR7630006000011234567890189")?;
//! let client = QontoClient::new(config)?;
//! let mut statement = OfxStatement::for_account(client.config().iban(), client.account()?)?;
//! for transaction in client.transactions(&TransactionFilter::default())? {
//!     statement.add_transaction(&transaction?)?;
//! }
//! println!("{}", statement.to_ofx_string(false)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod iban;
pub mod mapping;
pub mod ofx_format;
pub mod types;
pub mod xlsx_format;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use client::{HttpTransport, QontoClient, Transport};
pub use config::Config;
pub use error::{Error, Result};
pub use iban::Iban;
pub use types::{Account, Attachment, OperationKind, Side, Transaction, TransactionFilter};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// OFX 2.2 XML statement
    Ofx,
    /// Excel workbook
    Xlsx,
}

impl Format {
    /// Get file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Ofx => "ofx",
            Format::Xlsx => "xlsx",
        }
    }
}
