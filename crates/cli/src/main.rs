// Hisab CLI - seller ledger operations, headless

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use hisab_core::{Upload, UploadStatus};
use hisab_pipeline::{IngestReport, Pipeline, PipelineConfig, PipelineError, REPORT_NAMES};
use hisab_store::Store;

use exit_codes::{
    pipeline_exit_code, EXIT_INGEST_FAILED, EXIT_SUCCESS, EXIT_USAGE, EXIT_WATCH_TIMEOUT,
};

const WATCH_POLL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "hisab")]
#[command(about = "Per-seller order and settlement ledger")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "HISAB_DB", default_value = "hisab.db")]
    db: PathBuf,

    /// TOML config file (pipeline and [recon] settings)
    #[arg(long, global = true, env = "HISAB_CONFIG")]
    config: Option<PathBuf>,

    /// Seller whose ledger the command touches
    #[arg(long, global = true, env = "HISAB_SELLER", default_value = "default")]
    seller: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a source file into the ledger
    #[command(after_help = "\
Examples:
  hisab ingest orders march-orders.csv
  hisab ingest payments settlements.zip --json
  hisab ingest products catalog.csv --seller store-7")]
    Ingest {
        #[command(subcommand)]
        command: IngestCommands,
    },

    /// List uploads, newest first
    Uploads {
        /// Most recent N uploads
        #[arg(long, default_value_t = 20)]
        limit: u32,

        /// Machine-readable output
        #[arg(long)]
        json: bool,
    },

    /// Watch an upload until it reaches a terminal status
    Watch {
        upload_id: String,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 600)]
        timeout: u64,

        #[arg(long)]
        json: bool,
    },

    /// Re-run reconciliation against current rows
    Recon {
        #[arg(long)]
        json: bool,
    },

    /// Print one dashboard report as JSON
    #[command(after_help = "\
Examples:
  hisab report live_metrics
  hisab report settlement_breakdown --compact | jq '.[] | select(.estimated)'")]
    Report {
        /// One of: live_metrics, orders_overview, revenue_trend,
        /// status_distribution, settlement_breakdown, top_products,
        /// top_returns
        name: String,

        /// Single-line output instead of pretty-printed
        #[arg(long)]
        compact: bool,
    },

    /// Clear the calculation cache and rebuild live metrics
    Recalc,

    /// Show this month's upload quota usage
    Usage {
        #[arg(long)]
        json: bool,
    },

    /// Product catalog maintenance
    Products {
        #[command(subcommand)]
        command: ProductCommands,
    },
}

#[derive(Subcommand)]
enum IngestCommands {
    /// Order manifest CSV
    Orders {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Settlement archive (zip of spreadsheets)
    Payments {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Product catalog CSV
    Products {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ProductCommands {
    /// Set cost fields for one sku and reflow profit figures
    SetCost {
        sku: String,

        /// Purchase cost per unit
        #[arg(long)]
        cost: f64,

        /// Packaging cost per unit
        #[arg(long, default_value_t = 0.0)]
        packaging: f64,

        /// GST percent; omit to keep the stored value
        #[arg(long)]
        gst: Option<f64>,
    },
    /// List the catalog
    List {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let ctx = match build_ctx(&cli.db, cli.config.as_deref(), cli.seller.clone()) {
        Ok(ctx) => ctx,
        Err(e) => return fail(e),
    };

    let result = match cli.command {
        Commands::Ingest { command } => match command {
            IngestCommands::Orders { file, json } => cmd_ingest(&ctx, Source::Orders, &file, json),
            IngestCommands::Payments { file, json } => {
                cmd_ingest(&ctx, Source::Payments, &file, json)
            }
            IngestCommands::Products { file, json } => {
                cmd_ingest(&ctx, Source::Products, &file, json)
            }
        },
        Commands::Uploads { limit, json } => cmd_uploads(&ctx, limit, json),
        Commands::Watch {
            upload_id,
            timeout,
            json,
        } => cmd_watch(&ctx, &upload_id, timeout, json),
        Commands::Recon { json } => cmd_recon(&ctx, json),
        Commands::Report { name, compact } => cmd_report(&ctx, &name, compact),
        Commands::Recalc => cmd_recalc(&ctx),
        Commands::Usage { json } => cmd_usage(&ctx, json),
        Commands::Products { command } => match command {
            ProductCommands::SetCost {
                sku,
                cost,
                packaging,
                gst,
            } => cmd_set_cost(&ctx, &sku, cost, packaging, gst),
            ProductCommands::List { json } => cmd_list_products(&ctx, json),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => fail(e),
    }
}

fn fail(err: CliError) -> ExitCode {
    if !err.message.is_empty() {
        eprintln!("error: {}", err.message);
    }
    if let Some(hint) = err.hint {
        eprintln!("hint:  {hint}");
    }
    ExitCode::from(err.code)
}

/// Default to warnings only so stdout stays parseable; RUST_LOG overrides.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

struct Ctx {
    pipeline: Pipeline,
    seller: String,
}

fn build_ctx(db: &Path, config: Option<&Path>, seller: String) -> Result<Ctx, CliError> {
    let config = match config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| CliError::usage(format!("cannot read {}: {e}", path.display())))?;
            PipelineConfig::from_toml(&text).map_err(CliError::pipeline)?
        }
        None => PipelineConfig::default(),
    };
    let store = Store::open(db).map_err(|e| {
        CliError::store(format!("cannot open database {}: {e}", db.display()))
    })?;
    Ok(Ctx {
        pipeline: Pipeline::new(Arc::new(store), config),
        seller,
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum Source {
    Orders,
    Payments,
    Products,
}

fn cmd_ingest(ctx: &Ctx, source: Source, file: &Path, json: bool) -> Result<(), CliError> {
    let bytes = std::fs::read(file)
        .map_err(|e| CliError::usage(format!("cannot read {}: {e}", file.display())))?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let report = match source {
        Source::Orders => ctx
            .pipeline
            .ingest_orders_file(&ctx.seller, &filename, &bytes),
        Source::Payments => ctx
            .pipeline
            .ingest_payments_archive(&ctx.seller, &filename, &bytes),
        Source::Products => ctx
            .pipeline
            .ingest_products_file(&ctx.seller, &filename, &bytes),
    }
    .map_err(CliError::pipeline)?;

    print_ingest_report(&report, json)
}

fn print_ingest_report(report: &IngestReport, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", to_pretty(report)?);
    } else {
        println!(
            "upload {}  {}  {} records",
            report.upload_id,
            report.status.as_str(),
            report.records_processed
        );
        for err in &report.errors {
            println!("  ! {err}");
        }
    }
    if report.status == UploadStatus::Failed {
        // Outcome already printed; the exit code carries the verdict.
        return Err(CliError::silent(EXIT_INGEST_FAILED));
    }
    Ok(())
}

fn cmd_uploads(ctx: &Ctx, limit: u32, json: bool) -> Result<(), CliError> {
    let uploads = ctx
        .pipeline
        .store()
        .list_uploads(&ctx.seller, limit)
        .map_err(|e| CliError::store(e.to_string()))?;
    if json {
        println!("{}", to_pretty(&uploads)?);
        return Ok(());
    }
    for u in &uploads {
        let marker = if u.is_current_version { "*" } else { " " };
        println!(
            "{marker} {}  {:12} {:10} {:>6} records  {}",
            u.id,
            u.file_type.as_str(),
            u.status.as_str(),
            u.records_processed,
            u.filename
        );
    }
    Ok(())
}

fn cmd_watch(ctx: &Ctx, upload_id: &str, timeout: u64, json: bool) -> Result<(), CliError> {
    let deadline = Instant::now() + Duration::from_secs(timeout);
    loop {
        let upload = ctx
            .pipeline
            .store()
            .get_upload(upload_id)
            .map_err(|e| CliError::store(e.to_string()))?;
        if upload.status.is_terminal() {
            return print_upload_outcome(&upload, json);
        }
        if Instant::now() >= deadline {
            return Err(CliError {
                code: EXIT_WATCH_TIMEOUT,
                message: format!("upload {upload_id} still processing after {timeout}s"),
                hint: None,
            });
        }
        thread::sleep(WATCH_POLL);
    }
}

fn print_upload_outcome(upload: &Upload, json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", to_pretty(upload)?);
    } else {
        println!(
            "upload {}  {}  {} records",
            upload.id,
            upload.status.as_str(),
            upload.records_processed
        );
        for err in &upload.errors {
            println!("  ! {err}");
        }
    }
    if upload.status == UploadStatus::Failed {
        return Err(CliError::silent(EXIT_INGEST_FAILED));
    }
    Ok(())
}

fn cmd_recon(ctx: &Ctx, json: bool) -> Result<(), CliError> {
    let summary = ctx
        .pipeline
        .run_reconciliation(&ctx.seller)
        .map_err(CliError::pipeline)?;
    if json {
        println!("{}", to_pretty(&summary)?);
    } else {
        println!(
            "processed {}: {} reconciled, {} mismatched, {} unreconciled ({} without catalog row)",
            summary.processed,
            summary.reconciled,
            summary.mismatched,
            summary.unreconciled,
            summary.skipped_no_product
        );
    }
    Ok(())
}

fn cmd_report(ctx: &Ctx, name: &str, compact: bool) -> Result<(), CliError> {
    let value = ctx
        .pipeline
        .dashboard_report(name, &ctx.seller)
        .map_err(CliError::pipeline)?;
    if compact {
        println!("{value}");
    } else {
        println!("{}", to_pretty(&value)?);
    }
    Ok(())
}

fn cmd_recalc(ctx: &Ctx) -> Result<(), CliError> {
    ctx.pipeline
        .recalculate_all(&ctx.seller, None)
        .map_err(CliError::pipeline)?;
    println!("calculation cache cleared, live metrics rebuilt");
    Ok(())
}

fn cmd_usage(ctx: &Ctx, json: bool) -> Result<(), CliError> {
    let limit = ctx.pipeline.config().monthly_upload_limit;
    let usage = ctx.pipeline.usage(&ctx.seller).map_err(CliError::pipeline)?;
    let (used, year, month) = match &usage {
        Some(u) => (u.uploads_used, u.period_year, u.period_month),
        None => (0, 0, 0),
    };
    if json {
        let value = serde_json::json!({
            "sellerId": ctx.seller,
            "uploadsUsed": used,
            "limit": limit,
            "periodYear": year,
            "periodMonth": month,
        });
        println!("{}", to_pretty(&value)?);
    } else if usage.is_some() {
        println!("{used}/{limit} uploads used in {year}-{month:02}");
    } else {
        println!("0/{limit} uploads used this month");
    }
    Ok(())
}

fn cmd_set_cost(
    ctx: &Ctx,
    sku: &str,
    cost: f64,
    packaging: f64,
    gst: Option<f64>,
) -> Result<(), CliError> {
    let summary = ctx
        .pipeline
        .set_product_costs(&ctx.seller, sku, cost, packaging, gst)
        .map_err(CliError::pipeline)?;
    println!(
        "{sku}: cost {cost:.2}, packaging {packaging:.2} ({} orders reclassified)",
        summary.processed
    );
    Ok(())
}

fn cmd_list_products(ctx: &Ctx, json: bool) -> Result<(), CliError> {
    let products = ctx
        .pipeline
        .store()
        .list_products(&ctx.seller)
        .map_err(|e| CliError::store(e.to_string()))?;
    if json {
        println!("{}", to_pretty(&products)?);
        return Ok(());
    }
    for p in &products {
        println!(
            "{:<20} cost {:>8.2}  packaging {:>6.2}  gst {:>4.1}%  orders {:>4}  {}",
            p.sku, p.cost_price, p.packaging_cost, p.gst_percent, p.total_orders, p.title
        );
    }
    Ok(())
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value).map_err(|e| CliError {
        code: exit_codes::EXIT_ERROR,
        message: format!("cannot serialize output: {e}"),
        hint: None,
    })
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct CliError {
    code: u8,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn usage(msg: impl Into<String>) -> Self {
        Self {
            code: EXIT_USAGE,
            message: msg.into(),
            hint: None,
        }
    }

    fn store(msg: impl Into<String>) -> Self {
        Self {
            code: exit_codes::EXIT_STORE,
            message: msg.into(),
            hint: None,
        }
    }

    /// Exit code only; the command already printed its outcome.
    fn silent(code: u8) -> Self {
        Self {
            code,
            message: String::new(),
            hint: None,
        }
    }

    /// Map a pipeline error to its registry code, with a hint where one
    /// helps.
    fn pipeline(err: PipelineError) -> Self {
        let code = pipeline_exit_code(&err);
        let hint = match &err {
            PipelineError::QuotaExceeded { .. } => Some(
                "wait for the monthly reset or raise monthly_upload_limit in config".to_string(),
            ),
            PipelineError::UnknownReport(_) => {
                Some(format!("known reports: {}", REPORT_NAMES.join(", ")))
            }
            _ => None,
        };
        Self {
            code,
            message: err.to_string(),
            hint,
        }
    }
}
