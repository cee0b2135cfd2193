//! In-memory stand-in for the Qonto API and JSON fixtures for unit tests.

use crate::client::Transport;
use crate::config::Config;
use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use url::Url;

pub(crate) const TEST_IBAN: &str = "FR7630006000011234567890189";

pub(crate) fn test_config() -> Config {
    Config::new("acme-1234", "secret", TEST_IBAN)
        .unwrap()
        .with_api_root("http://qonto.test")
}

/// Serves canned JSON by path (plus `?page=N` for pages after the first)
/// and canned bytes by download URL. Unknown routes answer 404. Every
/// request is recorded.
#[derive(Default)]
pub(crate) struct StubTransport {
    routes: HashMap<String, Value>,
    files: HashMap<String, Vec<u8>>,
    requests: RefCell<Vec<Url>>,
    downloads: RefCell<Vec<String>>,
}

impl StubTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(mut self, key: &str, body: Value) -> Self {
        self.routes.insert(key.to_string(), body);
        self
    }

    pub(crate) fn file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub(crate) fn requests(&self) -> Vec<Url> {
        self.requests.borrow().clone()
    }

    pub(crate) fn downloads(&self) -> Vec<String> {
        self.downloads.borrow().clone()
    }

    fn route_key(url: &Url) -> String {
        match url.query_pairs().find(|(k, _)| k == "page") {
            Some((_, page)) => format!("{}?page={page}", url.path()),
            None => url.path().to_string(),
        }
    }
}

impl Transport for StubTransport {
    fn get_json(&self, url: &Url) -> Result<Value> {
        self.requests.borrow_mut().push(url.clone());
        self.routes
            .get(&Self::route_key(url))
            .cloned()
            .ok_or_else(|| Error::Http {
                status: 404,
                url: url.to_string(),
            })
    }

    fn download(&self, url: &str, sink: &mut dyn Write) -> Result<u64> {
        self.downloads.borrow_mut().push(url.to_string());
        let bytes = self.files.get(url).ok_or_else(|| Error::Http {
            status: 403,
            url: url.to_string(),
        })?;
        sink.write_all(bytes)?;
        Ok(bytes.len() as u64)
    }
}

/// A transaction the way the API serializes it. `id` is reused as the API
/// UUID with a `uuid-` prefix.
pub(crate) fn transaction_json(id: &str, kind: &str, side: &str, amount: f64, settled_at: &str) -> Value {
    json!({
        "id": format!("uuid-{id}"),
        "transaction_id": id,
        "operation_type": kind,
        "settled_at": settled_at,
        "emitted_at": settled_at,
        "amount": amount,
        "currency": "EUR",
        "local_amount": amount,
        "local_currency": "EUR",
        "side": side,
        "label": format!("Label {id}"),
        "note": null,
        "reference": null,
        "status": "completed",
        "vat_amount": null,
        "category": "other_expense",
        "attachment_ids": []
    })
}

pub(crate) fn page_json(key: &str, items: Vec<Value>, current_page: u32, total_pages: u32) -> Value {
    let mut page = json!({
        "meta": {
            "current_page": current_page,
            "total_pages": total_pages,
            "per_page": 100
        }
    });
    page[key] = Value::Array(items);
    page
}

pub(crate) fn organization_json(iban: &str, balance: f64, updated_at: &str) -> Value {
    json!({
        "organization": {
            "slug": "acme-1234",
            "bank_accounts": [{
                "slug": "acme-1234-bank-account-1",
                "iban": iban,
                "bic": "QNTOFRP1XXX",
                "currency": "EUR",
                "balance": balance,
                "balance_cents": (balance * 100.0) as i64,
                "updated_at": updated_at
            }]
        }
    })
}

pub(crate) fn attachment_json(id: &str, file_name: &str) -> Value {
    json!({
        "id": id,
        "file_name": file_name,
        "file_size": "1024",
        "file_content_type": "application/pdf",
        "url": format!("https://files.qonto.test/{id}")
    })
}
