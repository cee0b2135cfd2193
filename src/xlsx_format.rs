//! XLSX transaction export.
//!
//! One worksheet, a header row with the capitalized column names, then one
//! row per transaction in [`Column::ALL`] order.

use crate::error::{Error, Result};
use crate::mapping::{self, CellValue, MappedTransaction};
use crate::types::Transaction;
use crate::Format;
use rust_decimal::prelude::ToPrimitive;
use rust_xlsxwriter::{Format as CellFormat, Workbook, Worksheet};
use std::io::Write;
use std::path::Path;

/// Number format applied to date cells.
pub const DATE_FORMAT: &str = "yyyy-mm-dd";

/// Spreadsheet columns, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    TransactionId,
    SettledAt,
    EmittedAt,
    Label,
    OperationType,
    Side,
    Amount,
    Currency,
    LocalAmount,
    LocalCurrency,
    VatAmount,
    Status,
    Reference,
    Note,
    Category,
    Attachments,
}

impl Column {
    pub const ALL: [Column; 16] = [
        Column::TransactionId,
        Column::SettledAt,
        Column::EmittedAt,
        Column::Label,
        Column::OperationType,
        Column::Side,
        Column::Amount,
        Column::Currency,
        Column::LocalAmount,
        Column::LocalCurrency,
        Column::VatAmount,
        Column::Status,
        Column::Reference,
        Column::Note,
        Column::Category,
        Column::Attachments,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Column::TransactionId => "transaction id",
            Column::SettledAt => "settled at",
            Column::EmittedAt => "emitted at",
            Column::Label => "label",
            Column::OperationType => "operation type",
            Column::Side => "side",
            Column::Amount => "amount",
            Column::Currency => "currency",
            Column::LocalAmount => "local amount",
            Column::LocalCurrency => "local currency",
            Column::VatAmount => "vat amount",
            Column::Status => "status",
            Column::Reference => "reference",
            Column::Note => "note",
            Column::Category => "category",
            Column::Attachments => "attachments",
        }
    }

    /// Header cell text: first letter upper-case, the rest lower-case.
    pub fn header(&self) -> String {
        let mut chars = self.name().chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => String::new(),
        }
    }
}

/// A worksheet receiving transactions as they are fetched.
pub struct XlsxStatement {
    worksheet: Worksheet,
    date_format: CellFormat,
    next_row: u32,
}

impl XlsxStatement {
    /// Create the worksheet and write the header row.
    pub fn new() -> Result<Self> {
        let mut worksheet = Worksheet::new();
        for (col, column) in Column::ALL.iter().enumerate() {
            worksheet.write_string(0, col as u16, column.header())?;
        }
        Ok(Self {
            worksheet,
            date_format: CellFormat::new().set_num_format(DATE_FORMAT),
            next_row: 1,
        })
    }

    /// Map `transaction` and write it as the next row.
    pub fn add_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        match mapping::map_transaction(transaction, Format::Xlsx)? {
            MappedTransaction::Row(cells) => self.write_row(&cells),
            MappedTransaction::Statement(_) => Ok(()),
        }
    }

    /// Write the next row, cells in [`Column::ALL`] order.
    pub fn write_row(&mut self, cells: &[CellValue]) -> Result<()> {
        let row = self.next_row;
        for (col, cell) in cells.iter().enumerate() {
            let col = col as u16;
            match cell {
                CellValue::Text(text) => {
                    self.worksheet.write_string(row, col, text)?;
                }
                CellValue::Number(amount) => {
                    let value = amount
                        .to_f64()
                        .ok_or_else(|| Error::InvalidAmount(amount.to_string()))?;
                    self.worksheet.write_number(row, col, value)?;
                }
                CellValue::Date(datetime) => {
                    self.worksheet
                        .write_datetime_with_format(row, col, datetime, &self.date_format)?;
                }
                CellValue::Blank => {}
            }
        }
        self.next_row += 1;
        Ok(())
    }

    /// Number of transaction rows written so far.
    pub fn len(&self) -> usize {
        (self.next_row - 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Save the workbook to `path`.
    pub fn save(self, path: &Path) -> Result<()> {
        self.into_workbook().save(path)?;
        Ok(())
    }

    /// Write the workbook to any destination implementing `Write`.
    pub fn write_to<W: Write>(self, writer: &mut W) -> Result<()> {
        let bytes = self.into_workbook().save_to_buffer()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    fn into_workbook(self) -> Workbook {
        let mut workbook = Workbook::new();
        workbook.push_worksheet(self.worksheet);
        workbook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::transaction_json;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_headers_are_capitalized() {
        let headers: Vec<String> = Column::ALL.iter().map(Column::header).collect();
        assert_eq!(headers[0], "Transaction id");
        assert_eq!(headers[1], "Settled at");
        assert_eq!(headers[15], "Attachments");
    }

    #[test]
    fn test_write_workbook() {
        let mut statement = XlsxStatement::new().unwrap();
        assert!(statement.is_empty());

        for (id, side) in [("t-1", "debit"), ("t-2", "credit")] {
            let tx: Transaction =
                serde_json::from_value(transaction_json(id, "card", side, 12.5, "2024-01-10T12:00:00.000Z")).unwrap();
            statement.add_transaction(&tx).unwrap();
        }
        assert_eq!(statement.len(), 2);

        let mut buffer = Vec::new();
        statement.write_to(&mut buffer).unwrap();
        // xlsx files are zip containers
        assert_eq!(&buffer[..2], b"PK");
    }

    #[test]
    fn test_save_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.xlsx");

        XlsxStatement::new().unwrap().save(&path).unwrap();

        assert!(path.metadata().unwrap().len() > 0);
    }
}
