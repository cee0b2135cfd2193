//! Export runs: fetch transactions, build the document, download attachments
//! and package the output directory.
//!
//! A failure part way leaves whatever was already written on disk. Nothing
//! is retried and nothing is cleaned up.

use crate::client::{QontoClient, Transport};
use crate::error::{Error, Result};
use crate::ofx_format::OfxStatement;
use crate::types::{Attachment, Transaction, TransactionFilter};
use crate::xlsx_format::XlsxStatement;
use crate::Format;
use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// First day of the previous calendar month and first day of the month
/// containing `today`.
pub fn last_full_month(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    // day 1 exists in every month
    let start = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today);
    let end = today.with_day(1).unwrap_or(today);
    (start, end)
}

/// Settlement-date window requested on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    /// `--start-date`/`--end-date`, or the previous full month when
    /// `last_month` is set. `today` is the local date.
    pub fn resolve(start: Option<NaiveDate>, end: Option<NaiveDate>, last_month: bool, today: NaiveDate) -> Self {
        if last_month {
            let (start, end) = last_full_month(today);
            Self {
                start: Some(start),
                end: Some(end),
            }
        } else {
            Self { start, end }
        }
    }

    /// API filter with both bounds at UTC midnight.
    pub fn to_filter(&self) -> TransactionFilter {
        TransactionFilter {
            settled_at_from: self.start.map(utc_midnight),
            settled_at_to: self.end.map(utc_midnight),
            ..Default::default()
        }
    }
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Directory name used when none is given: `YYYY-MM-DD_HH-MM-SS_<api id>_qonto`.
pub fn default_dir_name(now: NaiveDateTime, api_id: &str) -> String {
    format!("{}_{api_id}_qonto", now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Where an export goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPlan {
    /// Directory holding the document and attachments.
    pub dir: Option<PathBuf>,
    /// Document path.
    pub file: PathBuf,
}

impl OutputPlan {
    /// Combine `--dir` and `--out`.
    ///
    /// `needs_dir` forces a directory (attachments or zip requested); when
    /// no `dir` was given one named `generated_dir` is used. Without a
    /// directory and without `out` there is nothing to write to and `None`
    /// is returned.
    pub fn resolve(
        dir: Option<PathBuf>,
        out: Option<PathBuf>,
        needs_dir: bool,
        generated_dir: &str,
        format: Format,
    ) -> Option<Self> {
        let dir = dir.or_else(|| needs_dir.then(|| PathBuf::from(generated_dir)));
        match (dir, out) {
            (Some(dir), out) => {
                let name = out.unwrap_or_else(|| {
                    let base = dir
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "qonto".to_string());
                    PathBuf::from(format!("{base}.{}", format.extension()))
                });
                Some(Self {
                    file: dir.join(name),
                    dir: Some(dir),
                })
            }
            (None, Some(out)) => Some(Self { dir: None, file: out }),
            (None, None) => None,
        }
    }

    /// Create the output directory if there is one.
    pub fn prepare(&self) -> Result<()> {
        if let Some(ref dir) = self.dir {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// How downloaded attachments are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentNaming {
    /// `attachment-<n>-id-<short id>-<name>`, `n` counted over the whole run.
    RunSequence,
    /// `<transaction id>-attachment-<n>-<name>`, `n` counted per transaction.
    PerTransaction,
}

impl AttachmentNaming {
    pub fn for_format(format: Format) -> Self {
        match format {
            Format::Ofx => AttachmentNaming::RunSequence,
            Format::Xlsx => AttachmentNaming::PerTransaction,
        }
    }

    /// File name for the `n`-th attachment (1-based).
    pub fn file_name(&self, n: usize, transaction: &Transaction, attachment: &Attachment) -> String {
        let original = sanitize(&attachment.file_name);
        match self {
            AttachmentNaming::RunSequence => {
                let short_id: String = attachment.id.chars().take(8).collect();
                format!("attachment-{n}-id-{short_id}-{original}")
            }
            AttachmentNaming::PerTransaction => {
                format!("{}-attachment-{n}-{original}", transaction.transaction_id)
            }
        }
    }
}

fn sanitize(file_name: &str) -> String {
    file_name.replace(['/', '\\'], "_")
}

/// Options shared by both export formats.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub filter: TransactionFilter,
    pub attachments: bool,
    pub zip: bool,
    pub output: Option<OutputPlan>,
}

/// Downloads attachments into the output directory as transactions go by.
struct AttachmentSink<'a> {
    dir: &'a Path,
    naming: AttachmentNaming,
    downloaded: usize,
}

impl<'a> AttachmentSink<'a> {
    fn new(dir: &'a Path, naming: AttachmentNaming) -> Self {
        Self {
            dir,
            naming,
            downloaded: 0,
        }
    }

    fn fetch<T: Transport>(&mut self, client: &QontoClient<T>, transaction: &Transaction) -> Result<()> {
        let mut per_transaction = 0;
        for attachment in client.attachments(&transaction.id)? {
            let attachment = attachment?;
            self.downloaded += 1;
            per_transaction += 1;
            let n = match self.naming {
                AttachmentNaming::RunSequence => self.downloaded,
                AttachmentNaming::PerTransaction => per_transaction,
            };

            let path = self.dir.join(self.naming.file_name(n, transaction, &attachment));
            let mut file = BufWriter::new(File::create(&path)?);
            let bytes = client.download(&attachment, &mut file)?;
            file.flush()?;
            debug!("Wrote {} ({bytes} bytes)", path.display());
        }
        Ok(())
    }
}

/// Export as OFX. Without an output plan the document goes to `stdout`.
pub fn export_ofx<T: Transport, W: Write>(
    client: &QontoClient<T>,
    options: &ExportOptions,
    pretty: bool,
    stdout: &mut W,
) -> Result<()> {
    let account = client.account()?;
    let mut statement = OfxStatement::for_account(client.config().iban(), account)?;

    if let Some(ref plan) = options.output {
        plan.prepare()?;
    }
    let mut sink = attachment_sink(options, AttachmentNaming::for_format(Format::Ofx))?;

    for transaction in client.transactions(&options.filter)? {
        let transaction = transaction?;
        statement.add_transaction(&transaction)?;
        if let Some(ref mut sink) = sink {
            sink.fetch(client, &transaction)?;
        }
    }
    info!("Exported {} transactions", statement.transactions().len());

    match options.output {
        Some(ref plan) => {
            let mut file = BufWriter::new(File::create(&plan.file)?);
            statement.write_to(&mut file, pretty)?;
            file.flush()?;
            info!("Wrote {}", plan.file.display());
        }
        None => statement.write_to(stdout, pretty)?,
    }

    finish(options)
}

/// Export as XLSX. Requires an output plan.
pub fn export_xlsx<T: Transport>(client: &QontoClient<T>, options: &ExportOptions) -> Result<()> {
    let plan = options.output.as_ref().ok_or(Error::MissingOutput)?;
    plan.prepare()?;

    let mut statement = XlsxStatement::new()?;
    let mut sink = attachment_sink(options, AttachmentNaming::for_format(Format::Xlsx))?;

    for transaction in client.transactions(&options.filter)? {
        let transaction = transaction?;
        statement.add_transaction(&transaction)?;
        if let Some(ref mut sink) = sink {
            sink.fetch(client, &transaction)?;
        }
    }
    info!("Exported {} transactions", statement.len());

    statement.save(&plan.file)?;
    info!("Wrote {}", plan.file.display());

    finish(options)
}

fn attachment_sink(options: &ExportOptions, naming: AttachmentNaming) -> Result<Option<AttachmentSink<'_>>> {
    if !options.attachments {
        return Ok(None);
    }
    let dir = options
        .output
        .as_ref()
        .and_then(|plan| plan.dir.as_deref())
        .ok_or(Error::MissingOutput)?;
    Ok(Some(AttachmentSink::new(dir, naming)))
}

fn finish(options: &ExportOptions) -> Result<()> {
    if !options.zip {
        return Ok(());
    }
    let dir = options
        .output
        .as_ref()
        .and_then(|plan| plan.dir.as_deref())
        .ok_or(Error::MissingOutput)?;
    let archive = zip_dir(dir)?;
    info!("Archived to {}", archive.display());
    Ok(())
}

/// Archive `dir` into `<dir>.zip` next to it and remove `dir`. Entries are
/// stored under the directory's own name.
pub fn zip_dir(dir: &Path) -> Result<PathBuf> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::Io(io::Error::new(io::ErrorKind::InvalidInput, "cannot zip a root directory")))?;
    let archive_path = dir.with_file_name(format!("{name}.zip"));

    let mut zip = ZipWriter::new(File::create(&archive_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    add_dir(&mut zip, dir, &name, options)?;
    zip.finish()?;

    fs::remove_dir_all(dir)?;
    Ok(archive_path)
}

fn add_dir<W: Write + io::Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    prefix: &str,
    options: SimpleFileOptions,
) -> Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let entry_name = format!("{prefix}/{}", entry.file_name().to_string_lossy());
        if entry.file_type()?.is_dir() {
            add_dir(zip, &path, &entry_name, options)?;
        } else {
            zip.start_file(entry_name, options)?;
            io::copy(&mut File::open(&path)?, zip)?;
        }
    }
    Ok(())
}

/// Local wall-clock time, for the generated directory name and `--last-month`.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}
