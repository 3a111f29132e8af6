use anyhow::Result;
use clap::Parser;
use fry6_tables::{
    config::ConfigArgs,
    pipeline::{log_path, run_validation},
    process::CsvReader,
    schema::DocumentType,
    validate::ABSENT_MARKER,
};
use std::process::ExitCode;
use tracing_subscriber::{fmt, EnvFilter};

/// Check per-filing CSV headers and write the column-issue logs without aggregating.
#[derive(Parser)]
#[command(name = "check_columns")]
struct Cli {
    #[command(flatten)]
    args: ConfigArgs,
}

fn main() -> Result<ExitCode> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let config = Cli::parse().args.resolve()?;
    let groups = config.groups.keys()?;
    let report = run_validation(&config, &CsvReader::default(), &groups)?;

    let mut failures = 0;
    for doc_type in DocumentType::ALL {
        let log = report.get(doc_type);
        let bad = log.bad_files();
        println!(
            "{}: {} files, {} with issues → {}",
            doc_type,
            log.len(),
            bad.len(),
            log_path(&config.output_dir, doc_type).display()
        );
        for file in &bad {
            println!(
                "  {}/{}  {}  missing=[{}] duplicate=[{}]",
                file.source_year,
                file.source_file,
                file.status,
                file.missing_cols.as_deref().unwrap_or(ABSENT_MARKER),
                file.duplicate_cols.as_deref().unwrap_or(ABSENT_MARKER),
            );
        }
        failures += bad.len();
    }

    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
