//! Blocking client for the Qonto business API.
//!
//! Requests go through the [`Transport`] trait so the exporter can run
//! against an in-memory stub. Listings are exposed as [`Pages`], an iterator
//! that fetches the next page only when the current one is drained.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{Account, Attachment, Transaction, TransactionFilter};
use reqwest::blocking::{Client, Response};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::cell::OnceCell;
use std::collections::VecDeque;
use std::io::{Read, Write};
use tracing::{debug, info};
use url::Url;

/// Attachments are copied to disk in chunks of this size.
pub const DOWNLOAD_CHUNK_SIZE: usize = 8192;

/// The HTTP operations the client needs.
pub trait Transport {
    /// GET an API endpoint with credentials and decode the JSON body.
    fn get_json(&self, url: &Url) -> Result<Value>;

    /// Stream a pre-signed download URL into `sink`. Returns the byte count.
    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64>;
}

/// [`Transport`] backed by `reqwest`'s blocking client.
pub struct HttpTransport {
    client: Client,
    authorization: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            authorization: config.authorization(),
        })
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &Url) -> Result<Value> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, &self.authorization)
            .send()?;
        Ok(check_status(response)?.json()?)
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        let mut response = check_status(self.client.get(url).send()?)?;
        let mut chunk = [0u8; DOWNLOAD_CHUNK_SIZE];
        let mut total = 0u64;
        loop {
            let read = response.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            sink.write_all(&chunk[..read])?;
            total += read as u64;
        }
        Ok(total)
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(Error::Http {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}

/// Client for one organization and one bank account.
pub struct QontoClient<T = HttpTransport> {
    config: Config,
    transport: T,
    account: OnceCell<Account>,
}

impl QontoClient<HttpTransport> {
    /// Client talking to the API root from `config` over HTTPS.
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> QontoClient<T> {
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self {
            config,
            transport,
            account: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Transactions of the configured account matching `filter`, in server
    /// order, all pages.
    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Pages<'_, T, Transaction>> {
        let mut url = self.endpoint("/v2/transactions")?;
        url.query_pairs_mut()
            .append_pair("iban", self.config.iban().as_str())
            .extend_pairs(filter.query_pairs());
        Ok(Pages::new(&self.transport, url, "transactions"))
    }

    /// A single transaction by its API id ([`Transaction::id`]).
    pub fn transaction(&self, id: &str) -> Result<Transaction> {
        let url = self.endpoint(&format!("/v2/transactions/{id}"))?;
        let response: TransactionResponse = serde_json::from_value(self.transport.get_json(&url)?)?;
        Ok(response.transaction)
    }

    /// The bank account matching the configured IBAN. Fetched on first call
    /// and kept for the lifetime of the client.
    pub fn account(&self) -> Result<&Account> {
        if let Some(account) = self.account.get() {
            return Ok(account);
        }

        let url = self.endpoint(&format!("/v2/organizations/{}", self.config.api_id()))?;
        let response: OrganizationResponse = serde_json::from_value(self.transport.get_json(&url)?)?;

        let wanted = self.config.iban().as_str();
        let account = response
            .organization
            .bank_accounts
            .into_iter()
            .find(|a| compact_iban(&a.iban) == wanted)
            .ok_or_else(|| Error::NotFound(format!("no bank account with IBAN {wanted}")))?;

        info!(
            "Account {} holds {} {} as of {}",
            self.config.iban(),
            account.balance,
            account.currency,
            account.updated_at
        );
        Ok(self.account.get_or_init(|| account))
    }

    /// Attachments of one transaction. `transaction_id` is the API id
    /// ([`Transaction::id`]), not the human readable one.
    pub fn attachments(&self, transaction_id: &str) -> Result<Pages<'_, T, Attachment>> {
        let url = self.endpoint(&format!("/v2/transactions/{transaction_id}/attachments"))?;
        Ok(Pages::new(&self.transport, url, "attachments"))
    }

    /// Stream an attachment into `sink`.
    pub fn download(&self, attachment: &Attachment, sink: &mut dyn Write) -> Result<u64> {
        debug!("Downloading attachment {}", attachment.id);
        self.transport.download(&attachment.url, sink)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(self.config.api_root())?.join(path)?)
    }
}

fn compact_iban(iban: &str) -> String {
    iban.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[derive(Debug, Deserialize)]
struct TransactionResponse {
    transaction: Transaction,
}

#[derive(Debug, Deserialize)]
struct OrganizationResponse {
    organization: Organization,
}

#[derive(Debug, Deserialize)]
struct Organization {
    #[serde(default)]
    bank_accounts: Vec<Account>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    current_page: u32,
    total_pages: u32,
}

/// A paginated listing.
///
/// Holds the page cursor and the unread rest of the current page. The next
/// page is requested only once the buffer is empty. Single pass: after the
/// last page, or after an error, it yields `None`.
pub struct Pages<'a, T, I> {
    transport: &'a T,
    url: Url,
    key: &'static str,
    next_page: Option<u32>,
    buffer: VecDeque<I>,
}

impl<'a, T: Transport, I: DeserializeOwned> Pages<'a, T, I> {
    fn new(transport: &'a T, url: Url, key: &'static str) -> Self {
        Self {
            transport,
            url,
            key,
            next_page: Some(1),
            buffer: VecDeque::new(),
        }
    }

    fn fetch(&mut self, page: u32) -> Result<()> {
        let mut url = self.url.clone();
        if page > 1 {
            url.query_pairs_mut().append_pair("page", &page.to_string());
        }
        debug!("Fetching {} page {page}", self.key);

        let mut body = self.transport.get_json(&url)?;
        let items = body
            .get_mut(self.key)
            .map(Value::take)
            .ok_or_else(|| Error::MissingField(self.key.to_string()))?;
        let items: Vec<I> = serde_json::from_value(items)?;

        // A listing without meta is a single page.
        let meta: Option<PageMeta> = match body.get_mut("meta") {
            Some(meta) => serde_json::from_value(meta.take())?,
            None => None,
        };
        if let Some(meta) = meta {
            if meta.current_page < meta.total_pages && page < meta.total_pages {
                self.next_page = Some(page + 1);
            }
        }

        self.buffer.extend(items);
        Ok(())
    }
}

impl<T: Transport, I: DeserializeOwned> Iterator for Pages<'_, T, I> {
    type Item = Result<I>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            let page = self.next_page.take()?;
            if let Err(e) = self.fetch(page) {
                return Some(Err(e));
            }
        }
    }
}
