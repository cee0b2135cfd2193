//! Qonto OFX export - writes an account's transactions as an OFX 2.2 statement.

use clap::Parser;
use qonto_export::cli::{init_logger, CredentialArgs, ExportArgs};
use qonto_export::export::export_ofx;
use qonto_export::{Format, QontoClient, Result};
use std::io;
use tracing::error;

#[derive(Parser)]
#[command(name = "qonto_ofx")]
#[command(about = "Export Qonto transactions as an OFX statement", long_about = None)]
struct Cli {
    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(flatten)]
    export: ExportArgs,

    /// Indent the XML output
    #[arg(long)]
    pretty: bool,
}

fn main() {
    let cli = Cli::parse();
    let rust_log = std::env::var("RUST_LOG").ok();
    init_logger(rust_log.as_deref(), cli.export.log_level, env!("CARGO_CRATE_NAME"));

    if let Err(e) = run(&cli) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.credentials.to_config()?;
    let options = cli.export.to_options(Format::Ofx, config.api_id());
    let client = QontoClient::new(config)?;

    let mut stdout = io::stdout().lock();
    export_ofx(&client, &options, cli.pretty, &mut stdout)
}
