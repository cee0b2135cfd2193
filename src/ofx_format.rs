//! OFX 2.2 statement builder.
//!
//! OFX 2.x is an XML document preceded by an `<?OFX ...?>` processing
//! instruction. A statement is built incrementally: transactions are added
//! as they are fetched and the transaction list bounds follow them. The whole
//! document is serialized once at the end.

use crate::error::{Error, Result};
use crate::iban::Iban;
use crate::mapping::{self, format_amount, MappedTransaction, NormalizedTransaction};
use crate::types::{Account, Transaction};
use crate::Format;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::{Reader, Writer};
use rust_decimal::Decimal;
use serde::Serialize;
use std::io::Write;

/// XML declaration and OFX processing instruction, one per line.
pub const OFX_HEADER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n",
    "<?OFX OFXHEADER=\"200\" VERSION=\"220\" SECURITY=\"NONE\" OLDFILEUID=\"NONE\" NEWFILEUID=\"NONE\"?>\n",
);

/// Placeholder transaction UID of the statement response.
const TRNUID: &str = "0";

const LANGUAGE: &str = "ENG";
const ACCOUNT_TYPE: &str = "CHECKING";
const ORGANIZATION: &str = "QONTO";

// Field lengths from the OFX 2.2 specification.
const NAME_MAX_LEN: usize = 32;
const MEMO_MAX_LEN: usize = 255;

/// A bank statement being assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct OfxStatement {
    iban: Iban,
    currency: String,
    balance: Decimal,
    balance_as_of: DateTime<Utc>,
    transactions: Vec<NormalizedTransaction>,
    date_start: Option<DateTime<Utc>>,
    date_end: Option<DateTime<Utc>>,
}

impl OfxStatement {
    /// Create an empty statement for the account identified by `iban`.
    pub fn new(iban: Iban, currency: impl Into<String>, balance: Decimal, balance_as_of: DateTime<Utc>) -> Self {
        Self {
            iban,
            currency: currency.into(),
            balance,
            balance_as_of,
            transactions: Vec::new(),
            date_start: None,
            date_end: None,
        }
    }

    /// Create an empty statement carrying the currency and ledger balance of
    /// `account`.
    pub fn for_account(iban: &Iban, account: &Account) -> Result<Self> {
        Ok(Self::new(
            iban.clone(),
            account.currency.clone(),
            account.balance,
            account.balance_as_of()?,
        ))
    }

    /// Map and append a raw API transaction.
    pub fn add_transaction(&mut self, transaction: &Transaction) -> Result<()> {
        if let MappedTransaction::Statement(normalized) = mapping::map_transaction(transaction, Format::Ofx)? {
            self.push(normalized);
        }
        Ok(())
    }

    /// Append an already mapped transaction and widen the date range to
    /// include it.
    pub fn push(&mut self, transaction: NormalizedTransaction) {
        let posted = transaction.posted;
        self.date_start = Some(self.date_start.map_or(posted, |start| start.min(posted)));
        self.date_end = Some(self.date_end.map_or(posted, |end| end.max(posted)));
        self.transactions.push(transaction);
    }

    /// Earliest and latest posted timestamps added so far.
    pub fn date_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.date_start.zip(self.date_end)
    }

    /// Transactions in the order they were added.
    pub fn transactions(&self) -> &[NormalizedTransaction] {
        &self.transactions
    }

    /// Serialize the statement with the current time as server time.
    pub fn to_ofx_string(&self, pretty: bool) -> Result<String> {
        self.render(pretty, Utc::now())
    }

    /// Write the serialized statement to any destination implementing `Write`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chrono::Utc;
    /// use qonto_export::iban::Iban;
    /// use qonto_export::ofx_format::OfxStatement;
    /// use rust_decimal::Decimal;
    ///
    /// let iban = Iban::parse("FR7630006000011234567890189")?;
    /// let statement = OfxStatement::new(iban, "EUR", Decimal::new(10000, 2), Utc::now());
    /// let mut file = std::fs::File::create("statement.ofx")?;
    /// statement.write_to(&mut file, true)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<()> {
        writer.write_all(self.to_ofx_string(pretty)?.as_bytes())?;
        Ok(())
    }

    fn render(&self, pretty: bool, server_time: DateTime<Utc>) -> Result<String> {
        let body = quick_xml::se::to_string(&self.to_document(server_time))
            .map_err(|e| Error::XmlError(e.to_string()))?;

        if pretty {
            Ok(format!("{OFX_HEADER}{}\n", reindent(&body)?))
        } else {
            Ok(format!("{OFX_HEADER}{body}"))
        }
    }

    fn to_document(&self, server_time: DateTime<Utc>) -> OfxXml {
        let ok = || StatusXml {
            code: 0,
            severity: "INFO",
        };

        let banktranlist = self.date_range().map(|(start, end)| BankTransactionListXml {
            dtstart: format_ofx_datetime(&start),
            dtend: format_ofx_datetime(&end),
            stmttrn: self
                .transactions
                .iter()
                .map(|tx| TransactionXml {
                    trntype: tx.kind.ofx_code().to_string(),
                    dtposted: format_ofx_datetime(&tx.posted),
                    trnamt: format_amount(tx.amount),
                    fitid: tx.id.clone(),
                    name: truncate(&tx.name, NAME_MAX_LEN),
                    memo: tx.memo.as_deref().map(|m| truncate(m, MEMO_MAX_LEN)),
                })
                .collect(),
        });

        OfxXml {
            signonmsgsrsv1: SignOnMessagesXml {
                sonrs: SignOnResponseXml {
                    status: ok(),
                    dtserver: format_ofx_datetime(&server_time),
                    language: LANGUAGE.to_string(),
                    fi: FinancialInstitutionXml {
                        org: ORGANIZATION.to_string(),
                    },
                },
            },
            bankmsgsrsv1: BankMessagesXml {
                stmttrnrs: StatementTransactionResponseXml {
                    trnuid: TRNUID.to_string(),
                    status: ok(),
                    stmtrs: StatementResponseXml {
                        curdef: self.currency.clone(),
                        bankacctfrom: BankAccountFromXml {
                            bankid: self.iban.bank_code().to_string(),
                            branchid: non_empty(self.iban.branch_code()),
                            acctid: self.iban.account_code().to_string(),
                            accttype: ACCOUNT_TYPE.to_string(),
                            acctkey: non_empty(self.iban.national_check()),
                        },
                        banktranlist,
                        ledgerbal: LedgerBalanceXml {
                            balamt: format_amount(self.balance),
                            dtasof: format_ofx_datetime(&self.balance_as_of),
                        },
                    },
                },
            },
        }
    }
}

/// Re-read a compact XML body and write it back with two-space indentation.
fn reindent(body: &str) -> Result<String> {
    let mut reader = Reader::from_str(body);
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            // only inter-element whitespace, element text is kept verbatim
            Event::Text(text) if text.iter().all(u8::is_ascii_whitespace) => {}
            event => writer.write_event(event)?,
        }
    }

    String::from_utf8(writer.into_inner()).map_err(|e| Error::XmlError(e.to_string()))
}

/// OFX datetime: `YYYYMMDDHHMMSS.XXX[+0:UTC]`.
pub fn format_ofx_datetime(value: &DateTime<Utc>) -> String {
    value.format("%Y%m%d%H%M%S%.3f[+0:UTC]").to_string()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn truncate(value: &str, max_chars: usize) -> String {
    let truncated: String = value.chars().take(max_chars).collect();
    truncated.trim_end().to_string()
}

// XML structure definitions, element order as required by OFX 2.2
#[derive(Debug, Serialize)]
#[serde(rename = "OFX", rename_all = "UPPERCASE")]
struct OfxXml {
    signonmsgsrsv1: SignOnMessagesXml,
    bankmsgsrsv1: BankMessagesXml,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct SignOnMessagesXml {
    sonrs: SignOnResponseXml,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct SignOnResponseXml {
    status: StatusXml,
    dtserver: String,
    language: String,
    fi: FinancialInstitutionXml,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct StatusXml {
    code: u32,
    severity: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct FinancialInstitutionXml {
    org: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct BankMessagesXml {
    stmttrnrs: StatementTransactionResponseXml,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct StatementTransactionResponseXml {
    trnuid: String,
    status: StatusXml,
    stmtrs: StatementResponseXml,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct StatementResponseXml {
    curdef: String,
    bankacctfrom: BankAccountFromXml,
    #[serde(skip_serializing_if = "Option::is_none")]
    banktranlist: Option<BankTransactionListXml>,
    ledgerbal: LedgerBalanceXml,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct BankAccountFromXml {
    bankid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    branchid: Option<String>,
    acctid: String,
    accttype: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    acctkey: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct BankTransactionListXml {
    dtstart: String,
    dtend: String,
    stmttrn: Vec<TransactionXml>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct TransactionXml {
    trntype: String,
    dtposted: String,
    trnamt: String,
    fitid: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    memo: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "UPPERCASE")]
struct LedgerBalanceXml {
    balamt: String,
    dtasof: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::TransactionKind;
    use crate::test_support::{transaction_json, TEST_IBAN};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
    }

    fn statement() -> OfxStatement {
        OfxStatement::new(Iban::parse(TEST_IBAN).unwrap(), "EUR", Decimal::new(100, 0), at(31, 23))
    }

    fn normalized(id: &str, posted: DateTime<Utc>) -> NormalizedTransaction {
        NormalizedTransaction {
            kind: TransactionKind::Debit,
            posted,
            amount: Decimal::new(-1, 0),
            id: id.to_string(),
            name: "name".to_string(),
            memo: None,
        }
    }

    #[test]
    fn test_date_range_tracks_min_and_max() {
        let mut stmt = statement();
        assert_eq!(stmt.date_range(), None);

        stmt.push(normalized("a", at(10, 12)));
        assert_eq!(stmt.date_range(), Some((at(10, 12), at(10, 12))));

        stmt.push(normalized("b", at(5, 8)));
        assert_eq!(stmt.date_range(), Some((at(5, 8), at(10, 12))));

        stmt.push(normalized("c", at(20, 1)));
        assert_eq!(stmt.date_range(), Some((at(5, 8), at(20, 1))));

        stmt.push(normalized("d", at(7, 0)));
        assert_eq!(stmt.date_range(), Some((at(5, 8), at(20, 1))));

        let ids: Vec<&str> = stmt.transactions().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_format_ofx_datetime() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 9, 5, 3).unwrap() + chrono::Duration::milliseconds(42);
        assert_eq!(format_ofx_datetime(&dt), "20240115090503.042[+0:UTC]");
    }

    #[test]
    fn test_full_document() {
        let mut stmt = statement();
        let card: Transaction =
            serde_json::from_value(transaction_json("t-card", "card", "debit", 10.0, "2024-01-10T12:00:00.000Z"))
                .unwrap();
        let mut income: Transaction =
            serde_json::from_value(transaction_json("t-income", "income", "credit", 20.0, "2024-01-03T08:30:00.000Z"))
                .unwrap();
        income.note = Some("Invoice <42 & co".into());
        stmt.add_transaction(&card).unwrap();
        stmt.add_transaction(&income).unwrap();

        let ofx = stmt.render(false, at(31, 23)).unwrap();

        assert!(ofx.starts_with(OFX_HEADER));
        let body = &ofx[OFX_HEADER.len()..];
        assert_eq!(
            body,
            concat!(
                "<OFX><SIGNONMSGSRSV1><SONRS><STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY></STATUS>",
                "<DTSERVER>20240131230000.000[+0:UTC]</DTSERVER><LANGUAGE>ENG</LANGUAGE><FI><ORG>QONTO</ORG></FI></SONRS></SIGNONMSGSRSV1>",
                "<BANKMSGSRSV1><STMTTRNRS><TRNUID>0</TRNUID><STATUS><CODE>0</CODE><SEVERITY>INFO</SEVERITY></STATUS>",
                "<STMTRS><CURDEF>EUR</CURDEF>",
                "<BANKACCTFROM><BANKID>30006</BANKID><BRANCHID>00001</BRANCHID><ACCTID>12345678901</ACCTID><ACCTTYPE>CHECKING</ACCTTYPE><ACCTKEY>89</ACCTKEY></BANKACCTFROM>",
                "<BANKTRANLIST><DTSTART>20240103083000.000[+0:UTC]</DTSTART><DTEND>20240110120000.000[+0:UTC]</DTEND>",
                "<STMTTRN><TRNTYPE>DEBIT</TRNTYPE><DTPOSTED>20240110120000.000[+0:UTC]</DTPOSTED><TRNAMT>-10.00</TRNAMT><FITID>t-card</FITID><NAME>Label t-card</NAME></STMTTRN>",
                "<STMTTRN><TRNTYPE>CREDIT</TRNTYPE><DTPOSTED>20240103083000.000[+0:UTC]</DTPOSTED><TRNAMT>20.00</TRNAMT><FITID>t-income</FITID><NAME>Label t-income</NAME><MEMO>Invoice &lt;42 &amp; co</MEMO></STMTTRN>",
                "</BANKTRANLIST>",
                "<LEDGERBAL><BALAMT>100.00</BALAMT><DTASOF>20240131230000.000[+0:UTC]</DTASOF></LEDGERBAL>",
                "</STMTRS></STMTTRNRS></BANKMSGSRSV1></OFX>",
            )
        );
    }

    #[test]
    fn test_empty_statement_has_no_transaction_list() {
        let ofx = statement().render(false, at(31, 23)).unwrap();
        assert!(!ofx.contains("<BANKTRANLIST>"));
        assert!(ofx.contains("<LEDGERBAL><BALAMT>100.00</BALAMT>"));
    }

    #[test]
    fn test_pretty_output() {
        let mut stmt = statement();
        stmt.push(normalized("a", at(10, 12)));

        let ofx = stmt.render(true, at(31, 23)).unwrap();
        let lines: Vec<&str> = ofx.lines().collect();

        assert_eq!(lines[0], "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>");
        assert!(lines[1].starts_with("<?OFX OFXHEADER=\"200\" VERSION=\"220\""));
        assert_eq!(lines[2], "<OFX>");
        assert_eq!(lines[3], "  <SIGNONMSGSRSV1>");
        assert!(lines.contains(&"            <TRNAMT>-1.00</TRNAMT>"));
        assert_eq!(*lines.last().unwrap(), "</OFX>");

        let compact = stmt.render(false, at(31, 23)).unwrap();
        let squeeze = |s: &str| s.lines().map(str::trim).collect::<String>();
        assert_eq!(squeeze(&ofx), squeeze(&compact));
    }

    #[test]
    fn test_pretty_output_keeps_text_whitespace() {
        let mut stmt = statement();
        let mut tx = normalized("a", at(10, 12));
        tx.memo = Some("  two  spaces".to_string());
        stmt.push(tx);

        let compact = stmt.render(false, at(31, 23)).unwrap();
        assert!(compact.contains("<MEMO>  two  spaces</MEMO>"));

        let pretty = stmt.render(true, at(31, 23)).unwrap();
        assert!(pretty.lines().any(|l| l == "            <MEMO>  two  spaces</MEMO>"));
    }

    #[test]
    fn test_long_name_is_truncated() {
        let mut stmt = statement();
        let mut tx = normalized("a", at(10, 12));
        tx.name = "A very long merchant label that does not fit".to_string();
        stmt.push(tx);

        let ofx = stmt.render(false, at(31, 23)).unwrap();
        assert!(ofx.contains("<NAME>A very long merchant label that</NAME>"));
    }
}
