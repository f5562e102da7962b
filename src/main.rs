use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Args, Parser, Subcommand};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

mod branches;
mod cache;
mod db;
mod error;
mod models;
mod report;
mod risk;
mod source;
mod stats;
mod trend;

use branches::{BranchDirectory, Selection};
use cache::DailyCache;
use models::CaseRecord;
use report::AnalysisReport;

#[derive(Parser)]
#[command(name = "district-risk-monitor")]
#[command(about = "Scores district case trends for the districts our branches operate in", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Import district case rows from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score risk for the selected branches' districts
    Score {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Write the full analysis as JSON
    Report {
        #[command(flatten)]
        scope: Scope,
        #[arg(long, default_value = "report.json")]
        out: PathBuf,
    },
}

#[derive(Args)]
#[command(group(
    ArgGroup::new("source")
        .args(["cases", "from_db"])
        .required(true)
        .multiple(false)
))]
struct Scope {
    /// Branch directory CSV (Branch,District[,State])
    #[arg(long)]
    branches: PathBuf,
    /// District case CSV
    #[arg(long)]
    cases: Option<PathBuf>,
    /// Read case rows from Postgres instead of a CSV file
    #[arg(long)]
    from_db: bool,
    #[arg(long)]
    state: Option<String>,
    /// Branch to include; repeat for several. All branches when omitted.
    #[arg(long = "branch")]
    branch: Vec<String>,
    #[arg(long, default_value_t = risk::DEFAULT_LOOKBACK)]
    lookback: usize,
    /// Additional rolling window to compute alongside 7/14/21/28 days
    #[arg(long = "extra-window")]
    extra_windows: Vec<usize>,
    /// Directory for the once-a-day case data cache
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let written = db::import_csv(&pool, &csv).await?;
            println!("Imported {written} case rows from {}.", csv.display());
        }
        Commands::Score { scope, limit } => {
            let (directory, report) = analyze(&scope).await?;

            if report.assessments.is_empty() {
                println!("No branch districts have case data for this selection.");
                return Ok(());
            }

            let totals = report.totals;
            println!(
                "{} branches across {} districts: {} confirmed, {} recovered, {} deceased, {} tested",
                report.branches.len(),
                report.districts.len(),
                totals.confirmed,
                totals.recovered,
                totals.deceased,
                totals.tested
            );
            for summary in &report.label_mix {
                println!(
                    "  {}: {} districts, {} branches",
                    summary.label, summary.districts, summary.branches
                );
            }

            println!("Districts by risk:");
            for entry in report.assessments.iter().take(limit) {
                let assessment = &entry.assessment;
                let inputs = assessment.rounded;
                println!(
                    "- {} (as of {}) {} score {}/8: new {} avg7 {} avg14 {} avg21 {} avg28 {}",
                    entry.district,
                    entry.as_of,
                    assessment.label,
                    assessment.score,
                    show(inputs.last_day),
                    show(inputs.avg7),
                    show(inputs.avg14),
                    show(inputs.avg21),
                    show(inputs.avg28)
                );
                println!(
                    "    short term {}, medium term {}, long term {}, new cases {}",
                    assessment.sub_labels.short_term,
                    assessment.sub_labels.medium_term,
                    assessment.sub_labels.long_term,
                    assessment.sub_labels.new_case
                );
                let names: Vec<&str> = directory
                    .branches_in(&entry.district)
                    .into_iter()
                    .filter(|branch| report.branches.contains(branch))
                    .map(|branch| branch.branch.as_str())
                    .collect();
                println!("    branches: {}", names.join(", "));
            }
        }
        Commands::Report { scope, out } => {
            let (_, report) = analyze(&scope).await?;
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set for database-backed commands")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn analyze(scope: &Scope) -> anyhow::Result<(BranchDirectory, AnalysisReport)> {
    let directory = source::read_branches(&scope.branches)?;
    if directory.is_empty() {
        anyhow::bail!("branch directory {} has no entries", scope.branches.display());
    }

    let cases = load_cases(scope, &directory.districts()).await?;
    let selection = Selection {
        state: scope.state.clone(),
        branches: scope.branch.clone(),
    };
    let resolved = selection.resolve(&directory, cases)?;
    info!(
        branches = resolved.branches.len(),
        districts = resolved.districts.len(),
        "resolved selection"
    );

    let mut windows = trend::DEFAULT_WINDOWS.to_vec();
    windows.extend(&scope.extra_windows);
    let report = report::build_report(scope.state.as_deref(), &resolved, &windows, scope.lookback)?;

    Ok((directory, report))
}

async fn load_cases(
    scope: &Scope,
    districts: &BTreeSet<String>,
) -> anyhow::Result<Vec<CaseRecord>> {
    if scope.from_db {
        let pool = connect().await?;
        return db::fetch_cases(&pool, districts).await;
    }

    let path = scope
        .cases
        .as_ref()
        .context("either --cases or --from-db is required")?;

    let Some(dir) = &scope.cache_dir else {
        return source::read_cases(path, districts);
    };

    let cache = DailyCache::new(dir)?;
    let today = Utc::now().date_naive();
    let evicted = cache.evict_stale(today)?;
    if evicted > 0 {
        debug!(evicted, "evicted stale cache entries");
    }

    cache.get_or_insert_with("load_cases", &(path, districts), today, || {
        source::read_cases(path, districts)
    })
}

fn show(value: Option<i64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}
