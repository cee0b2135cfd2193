//! Connection settings for the Qonto API.

use crate::error::Result;
use crate::iban::Iban;
use std::fmt;

/// Production API root.
pub const DEFAULT_API_ROOT: &str = "https://thirdparty.qonto.com";

/// Credentials and target account for one run.
///
/// Built once at process start and handed to the API client. The IBAN is
/// validated here so a bad value fails before any request is made.
#[derive(Clone)]
pub struct Config {
    api_id: String,
    api_key: String,
    iban: Iban,
    api_root: String,
}

impl Config {
    pub fn new(api_id: impl Into<String>, api_key: impl Into<String>, iban: &str) -> Result<Self> {
        Ok(Self {
            api_id: api_id.into(),
            api_key: api_key.into(),
            iban: Iban::parse(iban)?,
            api_root: DEFAULT_API_ROOT.to_string(),
        })
    }

    /// Point the client at another API root (sandbox, local stub).
    pub fn with_api_root(mut self, api_root: impl Into<String>) -> Self {
        self.api_root = api_root.into();
        self
    }

    /// The organization identifier, also the login part of the credentials.
    pub fn api_id(&self) -> &str {
        &self.api_id
    }

    pub fn iban(&self) -> &Iban {
        &self.iban
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    /// Value of the `Authorization` header: `<id>:<key>`.
    pub fn authorization(&self) -> String {
        format!("{}:{}", self.api_id, self.api_key)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_id", &self.api_id)
            .field("api_key", &"<redacted>")
            .field("iban", &self.iban.as_str())
            .field("api_root", &self.api_root)
            .finish()
    }
}
