use clap::Parser;
use order_reconcile::{CancelToken, ComparisonRequest, Config, DocumentSource, Engine};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "order-reconcile",
    version,
    about = "Compare a Work Order PDF against its Purchase Order"
)]
struct Cli {
    /// Work Order PDF.
    work_order: PathBuf,

    /// Candidate Purchase Order PDFs; the one matching the WO PO number is used.
    #[arg(required = true)]
    purchase_orders: Vec<PathBuf>,

    /// Price-ticket workbook (xlsx/xls/ods), repeatable.
    #[arg(long = "sheet")]
    sheets: Vec<PathBuf>,

    /// TOML file overriding matching and spreadsheet settings.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // init tracing
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_level(true)
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let request = ComparisonRequest {
        work_order: DocumentSource::Path(cli.work_order),
        purchase_orders: cli.purchase_orders.into_iter().map(DocumentSource::Path).collect(),
        spreadsheets: cli.sheets.into_iter().map(DocumentSource::Path).collect(),
    };

    let cancel = CancelToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let engine = Engine::new(config);
    match engine.run(request, &cancel).await {
        Ok(result) => {
            info!(verdict = ?result.verdict.verdict, "Done");
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Comparison failed");
            Err(e.into())
        }
    }
}
