//! Records returned by the Qonto API and the filters sent to it.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Timestamp layout used by the API, e.g. `2020-02-25T08:01:48.727Z`.
pub const API_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// A transaction as returned by `GET /v2/transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// API identifier (UUID), used for the attachment endpoint.
    pub id: String,

    /// Human readable identifier, stable across exports.
    pub transaction_id: String,

    /// Raw operation kind, e.g. `card` or `transfer`.
    pub operation_type: String,

    /// Settlement timestamp, null while the transaction is pending.
    #[serde(default)]
    pub settled_at: Option<String>,

    #[serde(default)]
    pub emitted_at: Option<String>,

    /// Amount in the account currency.
    #[serde(default)]
    pub amount: Decimal,

    #[serde(default)]
    pub currency: String,

    /// Amount in the currency the operation was made in.
    pub local_amount: Decimal,

    #[serde(default)]
    pub local_currency: String,

    /// Debit or credit, credit when absent.
    #[serde(default)]
    pub side: Side,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub note: Option<String>,

    #[serde(default)]
    pub reference: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub vat_amount: Option<Decimal>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub attachment_ids: Vec<String>,
}

impl Transaction {
    /// The operation kind, parsed.
    pub fn kind(&self) -> OperationKind {
        // FromStr for OperationKind is infallible
        self.operation_type
            .parse()
            .unwrap_or_else(|_| OperationKind::Other(self.operation_type.clone()))
    }

    /// Settlement timestamp in UTC.
    pub fn settled_at(&self) -> Result<DateTime<Utc>> {
        let raw = self
            .settled_at
            .as_deref()
            .ok_or_else(|| Error::MissingField(format!("settled_at of {}", self.transaction_id)))?;
        parse_api_datetime(raw)
    }

    /// Emission timestamp in UTC, when the API sent one.
    pub fn emitted_at(&self) -> Result<Option<DateTime<Utc>>> {
        self.emitted_at.as_deref().map(parse_api_datetime).transpose()
    }

    /// Amount signed by side: negative for debits.
    pub fn signed_local_amount(&self) -> Decimal {
        match self.side {
            Side::Debit => -self.local_amount,
            Side::Credit => self.local_amount,
        }
    }
}

/// Direction of a transaction relative to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Outgoing.
    Debit,
    /// Incoming.
    #[default]
    Credit,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Debit => "debit",
            Side::Credit => "credit",
        }
    }
}

/// Operation kinds known to the exporter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationKind {
    QontoFee,
    DirectDebit,
    Card,
    Transfer,
    Income,
    /// Anything the API sends that is not listed above.
    Other(String),
}

impl FromStr for OperationKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "qonto_fee" => OperationKind::QontoFee,
            "direct_debit" => OperationKind::DirectDebit,
            "card" => OperationKind::Card,
            "transfer" => OperationKind::Transfer,
            "income" => OperationKind::Income,
            other => OperationKind::Other(other.to_string()),
        })
    }
}

/// A bank account of the organization, from `GET /v2/organizations/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub iban: String,

    #[serde(default)]
    pub bic: Option<String>,

    pub currency: String,

    pub balance: Decimal,

    /// When `balance` was last computed.
    pub updated_at: String,

    #[serde(default)]
    pub name: Option<String>,
}

impl Account {
    /// Timestamp the balance is valid for.
    pub fn balance_as_of(&self) -> Result<DateTime<Utc>> {
        parse_api_datetime(&self.updated_at)
    }
}

/// An attachment of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,

    pub file_name: String,

    /// Pre-signed download URL.
    pub url: String,
}

/// Filters applied by the API when listing transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub settled_at_from: Option<DateTime<Utc>>,
    pub settled_at_to: Option<DateTime<Utc>>,
    pub status: Vec<String>,
    pub operation_type: Vec<String>,
    /// e.g. `settled_at:asc`
    pub sort_by: Option<String>,
}

impl TransactionFilter {
    /// Query parameters for this filter. List fields repeat as `name[]`,
    /// datetimes are sent as UTC with millisecond precision.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(from) = self.settled_at_from {
            pairs.push(("settled_at_from".to_string(), format_api_datetime(&from)));
        }
        if let Some(to) = self.settled_at_to {
            pairs.push(("settled_at_to".to_string(), format_api_datetime(&to)));
        }
        for status in &self.status {
            pairs.push(("status[]".to_string(), status.clone()));
        }
        for operation_type in &self.operation_type {
            pairs.push(("operation_type[]".to_string(), operation_type.clone()));
        }
        if let Some(ref sort_by) = self.sort_by {
            pairs.push(("sort_by".to_string(), sort_by.clone()));
        }
        pairs
    }
}

/// Parse an API timestamp into UTC.
pub fn parse_api_datetime(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, API_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc)))
        .map_err(|_| Error::InvalidDate(value.to_string()))
}

/// Format a timestamp the way the API expects it in query strings.
pub fn format_api_datetime(value: &DateTime<Utc>) -> String {
    value.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_deserialize_transaction() {
        let json = r#"{
            "id": "7b7a5ed6-3903-4782-889d-b5a5c4ec5a2f",
            "transaction_id": "acme-corp-1-transaction-1",
            "operation_type": "card",
            "settled_at": "2020-02-25T08:01:48.727Z",
            "amount": 42.5,
            "currency": "EUR",
            "local_amount": 42.5,
            "local_currency": "EUR",
            "side": "debit",
            "label": "Coffee",
            "note": null,
            "reference": "INV-100",
            "attachment_ids": ["a1"]
        }"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.side, Side::Debit);
        assert_eq!(tx.kind(), OperationKind::Card);
        assert_eq!(tx.signed_local_amount(), Decimal::new(-425, 1));
        assert_eq!(tx.reference.as_deref(), Some("INV-100"));
        assert_eq!(tx.note, None);
        assert_eq!(
            tx.settled_at().unwrap(),
            Utc.with_ymd_and_hms(2020, 2, 25, 8, 1, 48).unwrap()
                + chrono::Duration::milliseconds(727)
        );
    }

    #[test]
    fn test_side_defaults_to_credit() {
        let json = r#"{"id": "x", "transaction_id": "t", "operation_type": "income", "local_amount": 1}"#;
        let tx: Transaction = serde_json::from_str(json).unwrap();
        assert_eq!(tx.side, Side::Credit);
        assert!(matches!(tx.settled_at(), Err(Error::MissingField(_))));
    }

    #[test]
    fn test_unknown_operation_kind() {
        assert_eq!(
            "swift_income".parse::<OperationKind>().unwrap(),
            OperationKind::Other("swift_income".into())
        );
    }

    #[test]
    fn test_filter_query_pairs() {
        let filter = TransactionFilter {
            settled_at_from: Some(Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap()),
            settled_at_to: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            status: vec!["completed".into(), "pending".into()],
            ..Default::default()
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("settled_at_from".to_string(), "2023-12-01T00:00:00.000Z".to_string()),
                ("settled_at_to".to_string(), "2024-01-01T00:00:00.000Z".to_string()),
                ("status[]".to_string(), "completed".to_string()),
                ("status[]".to_string(), "pending".to_string()),
            ]
        );
    }
}
