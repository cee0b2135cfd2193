//! Command-line arguments shared by the export binaries.

use crate::config::{Config, DEFAULT_API_ROOT};
use crate::error::Result;
use crate::export::{default_dir_name, local_now, DateWindow, ExportOptions, OutputPlan};
use crate::Format;
use chrono::NaiveDate;
use clap::Args;
use std::path::PathBuf;
use tracing::trace;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// API credentials and account selection.
#[derive(Debug, Clone, Args)]
pub struct CredentialArgs {
    /// Organization identifier (the login of the API key)
    #[arg(long = "api-id", env = "ID")]
    pub api_id: String,

    /// IBAN of the account to export
    #[arg(long, env = "IBAN")]
    pub iban: String,

    /// Secret API key
    #[arg(long = "api-key", env = "KEY", hide_env_values = true)]
    pub api_key: String,

    /// Root URL of the Qonto API
    #[arg(long = "api-root", env = "QONTO_API_ROOT", default_value = DEFAULT_API_ROOT)]
    pub api_root: String,
}

impl CredentialArgs {
    pub fn to_config(&self) -> Result<Config> {
        Ok(Config::new(&self.api_id, &self.api_key, &self.iban)?.with_api_root(&self.api_root))
    }
}

/// What to export and where to put it.
#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    /// Download transaction attachments into the output directory
    #[arg(long)]
    pub attachments: bool,

    /// Output directory (created if missing)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Output file name, relative to --dir when both are given
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Only transactions settled on or after this date (YYYY-MM-DD)
    #[arg(long = "start-date")]
    pub start_date: Option<NaiveDate>,

    /// Only transactions settled before this date (YYYY-MM-DD)
    #[arg(long = "end-date")]
    pub end_date: Option<NaiveDate>,

    /// Export the previous calendar month, overriding --start-date and --end-date
    #[arg(long = "last-month")]
    pub last_month: bool,

    /// Zip the output directory and remove it
    #[arg(long)]
    pub zip: bool,

    /// Only transactions with this status (repeatable)
    #[arg(long)]
    pub status: Vec<String>,

    /// Log level used when RUST_LOG is not set
    #[arg(long = "log-level", default_value_t = LevelFilter::INFO)]
    pub log_level: LevelFilter,
}

impl ExportArgs {
    /// Resolve dates and output locations. `api_id` names the generated
    /// directory when one is needed.
    pub fn to_options(&self, format: Format, api_id: &str) -> ExportOptions {
        let now = local_now();
        let window = DateWindow::resolve(self.start_date, self.end_date, self.last_month, now.date());
        let mut filter = window.to_filter();
        filter.status = self.status.clone();

        let output = OutputPlan::resolve(
            self.dir.clone(),
            self.out.clone(),
            self.attachments || self.zip,
            &default_dir_name(now, api_id),
            format,
        );

        let options = ExportOptions {
            filter,
            attachments: self.attachments,
            zip: self.zip,
            output,
        };
        trace!("Resolved export options: {options:?}");
        options
    }
}

/// Filter directives for the log subscriber. `rust_log` (the value of
/// `RUST_LOG`, read by the caller) wins when set, otherwise `level` applies to
/// this library and to `bin_name`.
pub fn log_directives(rust_log: Option<&str>, level: LevelFilter, bin_name: &str) -> String {
    match rust_log {
        Some(directives) => directives.to_string(),
        None => format!("{}={},{}={}", env!("CARGO_CRATE_NAME"), level, bin_name, level),
    }
}

/// Install the stderr subscriber with the directives from [`log_directives`].
pub fn init_logger(rust_log: Option<&str>, level: LevelFilter, bin_name: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_directives(rust_log, level, bin_name)))
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TEST_IBAN;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Parser)]
    struct TestCli {
        #[command(flatten)]
        credentials: CredentialArgs,
        #[command(flatten)]
        export: ExportArgs,
    }

    fn parse(extra: &[&str]) -> TestCli {
        let mut args = vec![
            "qonto_test",
            "--api-id",
            "acme-1234",
            "--api-key",
            "secret",
            "--iban",
            TEST_IBAN,
            "--api-root",
            "http://qonto.test",
        ];
        args.extend_from_slice(extra);
        TestCli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_export_args() {
        let cli = parse(&[
            "--start-date",
            "2024-01-01",
            "--status",
            "completed",
            "--status",
            "pending",
            "--out",
            "jan.ofx",
            "--log-level",
            "debug",
        ]);

        assert_eq!(cli.export.start_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(cli.export.end_date, None);
        assert_eq!(cli.export.log_level, LevelFilter::DEBUG);

        let options = cli.export.to_options(Format::Ofx, "acme-1234");
        assert_eq!(options.filter.status, vec!["completed", "pending"]);
        assert!(options.filter.settled_at_from.is_some());
        assert_eq!(
            options.output,
            Some(OutputPlan {
                dir: None,
                file: PathBuf::from("jan.ofx"),
            })
        );
    }

    #[test]
    fn test_attachments_generate_a_directory() {
        let cli = parse(&["--attachments"]);
        let options = cli.export.to_options(Format::Xlsx, "acme-1234");

        let dir = options.output.and_then(|plan| plan.dir).unwrap();
        assert!(dir.to_string_lossy().ends_with("_acme-1234_qonto"));
    }

    #[test]
    fn test_credentials_build_config() {
        let cli = parse(&[]);
        let config = cli.credentials.to_config().unwrap();
        assert_eq!(config.api_id(), "acme-1234");
        assert_eq!(config.api_root(), "http://qonto.test");
        assert_eq!(config.authorization(), "acme-1234:secret");
    }

    #[test]
    fn test_invalid_iban_is_rejected() {
        let mut cli = parse(&[]);
        cli.credentials.iban = "FR0000".into();
        assert!(cli.credentials.to_config().is_err());
    }

    #[test]
    fn test_log_directives() {
        assert_eq!(
            log_directives(None, LevelFilter::DEBUG, "qonto_ofx"),
            "qonto_export=debug,qonto_ofx=debug"
        );
        assert_eq!(
            log_directives(Some("reqwest=trace"), LevelFilter::DEBUG, "qonto_ofx"),
            "reqwest=trace"
        );
    }
}
