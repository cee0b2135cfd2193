//! Qonto XLSX export - writes an account's transactions to a spreadsheet.

use clap::Parser;
use qonto_export::cli::{init_logger, CredentialArgs, ExportArgs};
use qonto_export::export::export_xlsx;
use qonto_export::{Error, Format, QontoClient, Result};
use tracing::error;

#[derive(Parser)]
#[command(name = "qonto_xlsx")]
#[command(about = "Export Qonto transactions to an XLSX workbook", long_about = None)]
struct Cli {
    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(flatten)]
    export: ExportArgs,
}

fn main() {
    let cli = Cli::parse();
    let rust_log = std::env::var("RUST_LOG").ok();
    init_logger(rust_log.as_deref(), cli.export.log_level, env!("CARGO_CRATE_NAME"));

    match run(&cli) {
        Ok(()) => {}
        Err(Error::MissingOutput) => {
            eprintln!("{}", Error::MissingOutput);
            std::process::exit(2);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.credentials.to_config()?;
    let options = cli.export.to_options(Format::Xlsx, config.api_id());
    if options.output.is_none() {
        return Err(Error::MissingOutput);
    }

    let client = QontoClient::new(config)?;
    export_xlsx(&client, &options)
}
