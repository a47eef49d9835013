use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};

mod llm;
mod metrics;
mod models;
mod parse;
mod pipeline;
mod prompts;
mod report;
mod store;

use store::Store;

#[derive(Parser)]
#[command(name = "tutor-quality-scoring")]
#[command(about = "Tutor performance metrics, risk scoring, and coaching insights", long_about = None)]
struct Cli {
    /// Directory holding tutors.json, sessions.json, and insights.json
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a small fixed data set for local runs
    Seed,
    /// Import session records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Recompute every tutor's derived metrics from the session records
    UpdateMetrics,
    /// Classify risk across the full tutor population
    Score {
        /// Milliseconds to wait after each text-generation call
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Generate system insights and per-tutor coaching recommendations
    Analyze {
        /// Milliseconds to wait after each text-generation call
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let store = store::JsonStore::new(&cli.data_dir);

    match cli.command {
        Commands::Seed => {
            let (tutor_count, session_count) = store::seed(&store)?;
            println!("Seeded {tutor_count} tutors and {session_count} sessions.");
        }
        Commands::Import { csv } => {
            let inserted = store::import_sessions_csv(&store, &csv)?;
            println!("Inserted {inserted} sessions from {}.", csv.display());
        }
        Commands::UpdateMetrics => {
            let mut tutors = store.load_tutors()?;
            let sessions = store.load_sessions()?;
            metrics::enrich_tutors(&mut tutors, &sessions, Utc::now());
            store.save_tutors(&tutors)?;
            println!(
                "Updated metrics for {} tutors from {} sessions.",
                tutors.len(),
                sessions.len()
            );
        }
        Commands::Score { interval_ms } => {
            let generator = llm::OpenAiClient::from_env()
                .context("risk scoring requires the text-generation service")?;
            let limiter = pipeline::RateLimiter::new(Duration::from_millis(interval_ms));
            let summary = pipeline::run_risk_scoring(&store, &generator, &limiter).await?;

            println!(
                "Risk scoring complete: {} classified, {} skipped.",
                summary.processed, summary.skipped
            );
            println!("- high: {}", summary.high);
            println!("- medium: {}", summary.medium);
            println!("- low: {}", summary.low);
        }
        Commands::Analyze { interval_ms } => {
            let generator = llm::OpenAiClient::from_env()
                .context("pattern analysis requires the text-generation service")?;
            let limiter = pipeline::RateLimiter::new(Duration::from_millis(interval_ms));
            let summary = pipeline::run_pattern_analysis(&store, &generator, &limiter).await?;

            println!("Pattern analysis complete.");
            println!("- at-risk tutors analyzed: {}", summary.tutors_analyzed);
            println!(
                "- recommendation sets generated: {}",
                summary.recommendations_generated
            );
            println!("- skipped: {}", summary.skipped);
        }
        Commands::Report { out } => {
            let tutors = store.load_tutors()?;
            let sessions = store.load_sessions()?;
            let insights = store.load_insights()?;
            let rendered = report::build_report(&tutors, &sessions, insights.as_ref(), Utc::now());
            std::fs::write(&out, rendered)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
