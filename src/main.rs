use anyhow::Result;
use clap::Parser;
use fry6_tables::{config::ConfigArgs, pipeline::run_pipeline};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Validate and combine per-filing FR Y-6 securities and insiders CSVs.
#[derive(Parser)]
#[command(name = "fry6_tables", version)]
struct Cli {
    #[command(flatten)]
    args: ConfigArgs,
}

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) resolve config ───────────────────────────────────────────
    let cli = Cli::parse();
    let config = cli.args.resolve()?;
    info!(
        securities = %config.securities_root.display(),
        insiders = %config.insiders_root.display(),
        output = %config.output_dir.display(),
        "configured"
    );

    // ─── 3) run ──────────────────────────────────────────────────────
    let summary = match run_pipeline(&config) {
        Ok(summary) => summary,
        Err(e) => {
            error!("run failed: {:#}", e);
            return Err(e);
        }
    };

    for doc in &summary.documents {
        info!(
            doc_type = %doc.doc_type,
            ok = doc.files_ok,
            bad = doc.files_bad,
            unreadable = doc.files_unreadable,
            dropped = doc.files_dropped.len(),
            rows = doc.rows,
            "summary"
        );
    }
    Ok(())
}
