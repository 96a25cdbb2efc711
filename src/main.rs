use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use steward_cli::config::EngineConfig;
use steward_cli::evolution::{run_evolution, EvolutionOptions};
use steward_cli::report::{self, HistoryRecord, ReportStore};
use steward_cli::run_audit;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "steward",
    about = "Automated governance and remediation for project trees",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the tree and report on it without changing anything
    Audit(AuditArgs),
    /// Run the multi-cycle improvement loop
    Evolve(EvolveArgs),
}

#[derive(Args, Debug)]
struct AuditArgs {
    /// Project root to audit (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct EvolveArgs {
    /// Project root to evolve (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Improvement cycles to run, bounded by governance.max_cycles
    #[arg(long, default_value_t = 3)]
    cycles: usize,

    /// Plan and report without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Revert a cycle's changes when its validation fails
    #[arg(long)]
    strict: bool,

    /// Seed the confidence strategy for reproducible exploration
    #[arg(long)]
    seed: Option<u64>,

    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Audit(args) => audit_command(args).await,
        Commands::Evolve(args) => evolve_command(args).await,
    }
}

async fn audit_command(args: AuditArgs) -> Result<()> {
    let config = EngineConfig::load(&args.path);
    let diagnostic = run_audit(&args.path, config).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&diagnostic)?);
    } else {
        report::print_diagnostic(&diagnostic);
    }

    let store = ReportStore::new(&args.path);
    match store.save_diagnostic(&diagnostic) {
        Ok(path) => {
            if !args.json {
                println!();
                println!("Report: {}", path.display());
            }
        }
        Err(err) => eprintln!("  Warning: could not persist report: {err:#}"),
    }
    let record = HistoryRecord {
        run_id: Uuid::new_v4(),
        at: Utc::now(),
        kind: "audit".to_string(),
        status: diagnostic.status,
        quality_score: diagnostic.quality_score,
        total_issues: diagnostic.total_issues,
        applied: 0,
        cycles: 0,
    };
    if let Err(err) = store.append_history(&record) {
        eprintln!("  Warning: could not append history: {err:#}");
    }
    if !args.json {
        report::print_history_trend(&store);
    }

    Ok(())
}

async fn evolve_command(args: EvolveArgs) -> Result<()> {
    let config = EngineConfig::load(&args.path);
    let options = EvolutionOptions {
        cycles: args.cycles,
        dry_run: args.dry_run,
        strict: args.strict || config.governance.strict_validation,
        seed: args.seed,
    };
    let evolution = run_evolution(&args.path, config, options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&evolution)?);
    } else {
        report::print_evolution(&evolution);
    }

    // A dry run promises to write nothing, reports included.
    if !args.dry_run {
        let store = ReportStore::new(&args.path);
        match store.save_evolution(&evolution) {
            Ok(path) => {
                if !args.json {
                    println!();
                    println!("Report: {}", path.display());
                }
            }
            Err(err) => eprintln!("  Warning: could not persist report: {err:#}"),
        }
        let record = HistoryRecord {
            run_id: Uuid::new_v4(),
            at: Utc::now(),
            kind: "evolve".to_string(),
            status: evolution.status,
            quality_score: evolution.final_quality,
            total_issues: evolution.final_state.total_issues(),
            applied: evolution.total_applied,
            cycles: evolution.cycles_run,
        };
        if let Err(err) = store.append_history(&record) {
            eprintln!("  Warning: could not append history: {err:#}");
        }
        if !args.json {
            report::print_history_trend(&store);
        }
    }

    Ok(())
}
