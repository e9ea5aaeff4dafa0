//! finro CLI
//!
//! Commands:
//! - `serve`: run the HTTP upload service
//! - `process`: normalize a holdings export and print the JSON response
//! - `symbols`: split the equities column into a Symbol,Company CSV

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use finro::config::AppConfig;
use finro::ingest::{process_csv, ProcessResponse};
use finro::report::{encode_base64, render_pdf};
use finro::server::{router, AppState};
use finro::symbols::{extract_symbols, write_symbols_csv};

#[derive(Parser)]
#[command(name = "finro", about = "Broker holdings CSV normalizer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service.
    Serve {
        /// Port to listen on. Overrides API_PORT.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Normalize a holdings export and print the JSON response.
    Process {
        /// Broker CSV export.
        file: PathBuf,

        /// Also write the PDF summary to this path.
        #[arg(long)]
        report: Option<PathBuf>,

        /// Embed the PDF summary as base64 in the JSON output.
        #[arg(long, default_value_t = false)]
        embed_report: bool,
    },
    /// Split "AAPL logo Apple Inc." labels into a Symbol,Company CSV.
    Symbols {
        /// Broker CSV export.
        file: PathBuf,

        /// Output path.
        #[arg(long, default_value = "Transformed.csv")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env().add_directive("finro=info".parse()?))
        .init();

    dotenv::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => run_serve(port).await,
        Commands::Process {
            file,
            report,
            embed_report,
        } => run_process(file, report, embed_report),
        Commands::Symbols { file, out } => run_symbols(file, out),
    }
}

async fn run_serve(port: Option<u16>) -> Result<()> {
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(port) = port {
        config.port = port;
    }
    let addr = config.bind_addr()?;
    if config.broker.is_none() {
        info!("BROKER_BASE_URL not set; broker proxy routes disabled");
    }

    let app = router(AppState::new(config)?);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "server is running");
    axum::serve(listener, app).await?;
    Ok(())
}

fn run_process(file: PathBuf, report: Option<PathBuf>, embed_report: bool) -> Result<()> {
    let bytes = fs::read(&file).with_context(|| format!("failed to read {}", file.display()))?;
    let records = process_csv(Some(bytes.as_slice()))?;
    let mut response = ProcessResponse::new(records);

    if report.is_some() || embed_report {
        let pdf = render_pdf(&response.data, chrono::Local::now().date_naive())?;
        if let Some(path) = &report {
            fs::write(path, &pdf).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        if embed_report {
            response.report = Some(encode_base64(&pdf));
        }
    }

    serde_json::to_writer_pretty(io::stdout().lock(), &response)?;
    println!();
    Ok(())
}

fn run_symbols(file: PathBuf, out: PathBuf) -> Result<()> {
    let input = File::open(&file).with_context(|| format!("failed to open {}", file.display()))?;
    let entries = extract_symbols(input)?;

    let output = File::create(&out).with_context(|| format!("failed to create {}", out.display()))?;
    write_symbols_csv(&entries, BufWriter::new(output))?;
    info!(rows = entries.len(), path = %out.display(), "symbols exported");
    Ok(())
}
