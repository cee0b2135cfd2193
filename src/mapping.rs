//! Mapping of raw API transactions into the records each output format needs.

use crate::error::Result;
use crate::types::{OperationKind, Transaction};
use crate::xlsx_format::Column;
use crate::Format;
use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::warn;

/// OFX transaction type (`TRNTYPE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Fee,
    DirectDebit,
    Debit,
    Transfer,
    Credit,
    /// Operation kinds without a dedicated OFX code.
    Other,
}

impl TransactionKind {
    pub fn ofx_code(&self) -> &'static str {
        match self {
            TransactionKind::Fee => "FEE",
            TransactionKind::DirectDebit => "DIRECTDEBIT",
            TransactionKind::Debit => "DEBIT",
            TransactionKind::Transfer => "XFER",
            TransactionKind::Credit => "CREDIT",
            TransactionKind::Other => "OTHER",
        }
    }
}

impl From<&OperationKind> for TransactionKind {
    fn from(kind: &OperationKind) -> Self {
        match kind {
            OperationKind::QontoFee => TransactionKind::Fee,
            OperationKind::DirectDebit => TransactionKind::DirectDebit,
            OperationKind::Card => TransactionKind::Debit,
            OperationKind::Transfer => TransactionKind::Transfer,
            OperationKind::Income => TransactionKind::Credit,
            OperationKind::Other(_) => TransactionKind::Other,
        }
    }
}

/// A transaction ready for an OFX statement.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTransaction {
    pub kind: TransactionKind,
    pub posted: DateTime<Utc>,
    /// Negative for debits.
    pub amount: Decimal,
    pub id: String,
    pub name: String,
    pub memo: Option<String>,
}

/// One spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(Decimal),
    Date(NaiveDateTime),
    Blank,
}

/// The result of mapping a transaction for a given format.
#[derive(Debug, Clone, PartialEq)]
pub enum MappedTransaction {
    Statement(NormalizedTransaction),
    Row(Vec<CellValue>),
}

/// Map `tx` into the record `format` is built from.
pub fn map_transaction(tx: &Transaction, format: Format) -> Result<MappedTransaction> {
    match format {
        Format::Ofx => normalize(tx).map(MappedTransaction::Statement),
        Format::Xlsx => spreadsheet_row(tx).map(MappedTransaction::Row),
    }
}

/// OFX view of a transaction.
pub fn normalize(tx: &Transaction) -> Result<NormalizedTransaction> {
    let operation = tx.kind();
    if let OperationKind::Other(ref raw) = operation {
        warn!(
            "Transaction {} has operation type {raw:?} with no OFX equivalent, exported as OTHER",
            tx.transaction_id
        );
    }

    Ok(NormalizedTransaction {
        kind: TransactionKind::from(&operation),
        posted: tx.settled_at()?,
        amount: tx.signed_local_amount(),
        id: tx.transaction_id.clone(),
        name: tx.label.clone(),
        memo: memo(tx),
    })
}

/// The reference when there is one, otherwise the note.
fn memo(tx: &Transaction) -> Option<String> {
    non_empty(&tx.reference).or_else(|| non_empty(&tx.note))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

/// Spreadsheet view of a transaction, one cell per [`Column::ALL`] entry.
pub fn spreadsheet_row(tx: &Transaction) -> Result<Vec<CellValue>> {
    Column::ALL.iter().map(|column| cell(tx, *column)).collect()
}

fn cell(tx: &Transaction, column: Column) -> Result<CellValue> {
    let text = |s: &str| {
        if s.is_empty() {
            CellValue::Blank
        } else {
            CellValue::Text(s.to_string())
        }
    };
    let optional_text = |s: &Option<String>| s.as_deref().map_or(CellValue::Blank, text);

    Ok(match column {
        Column::TransactionId => text(&tx.transaction_id),
        Column::SettledAt => match tx.settled_at {
            Some(_) => CellValue::Date(tx.settled_at()?.naive_utc()),
            None => CellValue::Blank,
        },
        Column::EmittedAt => tx
            .emitted_at()?
            .map_or(CellValue::Blank, |dt| CellValue::Date(dt.naive_utc())),
        Column::Label => text(&tx.label),
        Column::OperationType => text(&tx.operation_type),
        Column::Side => text(tx.side.as_str()),
        Column::Amount => CellValue::Number(tx.amount),
        Column::Currency => text(&tx.currency),
        Column::LocalAmount => CellValue::Number(tx.local_amount),
        Column::LocalCurrency => text(&tx.local_currency),
        Column::VatAmount => tx.vat_amount.map_or(CellValue::Blank, CellValue::Number),
        Column::Status => optional_text(&tx.status),
        Column::Reference => optional_text(&tx.reference),
        Column::Note => optional_text(&tx.note),
        Column::Category => optional_text(&tx.category),
        Column::Attachments => CellValue::Number(Decimal::from(tx.attachment_ids.len())),
    })
}

/// Render an amount with exactly two decimals.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}
