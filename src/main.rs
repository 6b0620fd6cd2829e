use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::Level;

use outcome_attainment::components::CoComponentMap;
use outcome_attainment::config::EngineConfig;
use outcome_attainment::db::{self, PgAttainmentStore};
use outcome_attainment::ingest::BulkImportReport;
use outcome_attainment::models::{ExamType, SubjectId};
use outcome_attainment::{pipeline, report, sheet, telemetry};

#[derive(Parser)]
#[command(name = "outcome-attainment")]
#[command(about = "CO, PO and PSO attainment for accreditation reporting", long_about = None)]
struct Cli {
    /// TOML file overriding component pass thresholds
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a demo subject
    Seed,
    /// Import course outcomes (subject_id, position, co_no, description, knowledge_level)
    ImportOutcomes {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import student self-rating surveys (student_id, subject_id, co1..co5)
    ImportFeedback {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import the CO-PO correlation matrix (subject_id, course_outcome, po1..po12, pso1, pso2)
    ImportMatrix {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Score an exam sheet into per-CO levels
    Assess {
        #[arg(long)]
        subject: String,
        #[arg(long, value_parser = parse_exam)]
        exam: ExamType,
        #[arg(long)]
        sheet: PathBuf,
        /// `CO=Q1` (question + surprise test + assignment) or `CO=Q1+saqs` (explicit)
        #[arg(long = "map", required = true)]
        mappings: Vec<String>,
    },
    /// Compute direct, indirect, overall and PO/PSO attainment
    Compute {
        #[arg(long = "subject", required = true)]
        subjects: Vec<String>,
        /// Save the computed records
        #[arg(long)]
        persist: bool,
    },
    /// Write a markdown attainment summary
    Report {
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "attainment.md")]
        out: PathBuf,
    },
}

fn parse_exam(raw: &str) -> Result<ExamType, String> {
    match raw.parse()? {
        ExamType::Computed => Err("COMPUTED is not an exam".to_string()),
        exam => Ok(exam),
    }
}

fn parse_mappings(mappings: &[String]) -> anyhow::Result<CoComponentMap> {
    let mut map = CoComponentMap::new();
    for mapping in mappings {
        let (co_no, components) = mapping
            .split_once('=')
            .with_context(|| format!("mapping `{mapping}` must look like CO=Q1"))?;
        let components: Vec<&str> = components.split('+').map(str::trim).collect();
        if co_no.trim().is_empty() || components.iter().any(|c| c.is_empty()) {
            bail!("mapping `{mapping}` has an empty CO or component");
        }
        match components.as_slice() {
            [question] => map.insert_standard(co_no.trim(), question),
            explicit => map.insert(
                co_no.trim(),
                explicit.iter().map(|c| c.to_string()).collect(),
            ),
        }
    }
    Ok(map)
}

fn finish_import(what: &str, csv: &Path, imported: &BulkImportReport) -> anyhow::Result<()> {
    print!("{}", report::build_import_summary(what, imported));
    if !imported.is_complete() {
        let rejected = imported.outcomes.len() - imported.success_count();
        bail!("{rejected} row(s) of {} were not imported", csv.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs, Level::INFO);

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;
    let store = PgAttainmentStore::new(pool.clone());

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&store).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportOutcomes { csv } => {
            let imported = db::import_outcomes_csv(&pool, &csv).await?;
            finish_import("course outcomes", &csv, &imported)?;
        }
        Commands::ImportFeedback { csv } => {
            let imported = db::import_feedback_csv(&pool, &csv).await?;
            finish_import("feedback responses", &csv, &imported)?;
        }
        Commands::ImportMatrix { csv } => {
            let imported = db::import_matrix_csv(&pool, &csv).await?;
            finish_import("matrix rows", &csv, &imported)?;
        }
        Commands::Assess {
            subject,
            exam,
            sheet: sheet_path,
            mappings,
        } => {
            let map = parse_mappings(&mappings)?;
            let exam_sheet = sheet::read_sheet_path(&sheet_path, SubjectId(subject), exam)?;
            for (name, stat) in exam_sheet.statistics(&config) {
                println!(
                    "- {}: attempted {}, secured {}, {}% (level {})",
                    name, stat.attempted, stat.secured, stat.percentage, stat.level
                );
            }
            let (record, ack) = pipeline::record_exam(&store, &exam_sheet, &map, &config).await?;
            println!("{} levels ({:?}):", record.key(), ack);
            for entry in record.attainment_data.iter() {
                println!("- {}: {}", entry.co_no, entry.attainment_level);
            }
        }
        Commands::Compute { subjects, persist } => {
            let subjects: Vec<SubjectId> = subjects.into_iter().map(SubjectId).collect();
            let mut failed = 0usize;

            for (subject, result) in pipeline::compute_subjects(&store, &subjects).await {
                let mut computed = match result {
                    Ok(computed) => computed,
                    Err(err) => {
                        failed += 1;
                        eprintln!("{subject}: {err}");
                        continue;
                    }
                };

                let saved = if persist {
                    Some(pipeline::persist(&store, &mut computed).await)
                } else {
                    None
                };
                print!("{}", report::build_report(&computed, saved.as_ref()));
                if saved.is_some_and(|s| !s.is_complete()) {
                    failed += 1;
                }
            }

            if failed > 0 {
                bail!("{failed} subject(s) did not complete");
            }
        }
        Commands::Report { subject, out } => {
            let computed = pipeline::compute_subject(&store, &SubjectId(subject)).await?;
            let summary = report::build_report(&computed, None);
            std::fs::write(&out, summary)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
