use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use lead_assign::allocator::{self, RunParams, RunReport};
use lead_assign::capacity;
use lead_assign::config::{self, LeadAssignConfig};
use lead_assign::dedup::DedupParams;
use lead_assign::lock;
use lead_assign::log::parse_log_level;
use lead_assign::pool::{self, PoolFile};
use lead_assign::store::MemStore;
use lead_assign::trigger;
use lead_assign::{log_info, log_warn};

/// Poll cadence for the shutdown flag while watch mode sleeps.
const SHUTDOWN_POLL_MS: u64 = 200;

#[derive(Parser)]
#[command(name = "lead-assign", about = "Batch lead-assignment allocator")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Path to config file (defaults to {root}/lead-assign.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log verbosity level (error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and an empty lead pool
    Init,
    /// Run one assignment pass over the pending pool
    Run {
        /// Restrict the run to specific team ids (repeatable)
        #[arg(long, action = clap::ArgAction::Append)]
        team: Vec<u32>,
        /// Days of the period this run covers (defaults from config)
        #[arg(long)]
        work_days: Option<u32>,
        /// Max leads per internal batch (defaults from config)
        #[arg(long)]
        bundle: Option<u32>,
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run assignment on the configured cadence until interrupted
    Watch,
    /// Show pool and capacity status
    Status,
    /// Show when the next automatic run would fire
    NextRun,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match parse_log_level(&cli.log_level) {
        Ok(level) => lead_assign::log::set_log_level(level),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    let root = &cli.root;

    let result = match cli.command {
        Commands::Init => handle_init(root),
        Commands::Run {
            team,
            work_days,
            bundle,
            json,
        } => handle_run(root, cli.config.as_deref(), team, work_days, bundle, json),
        Commands::Watch => handle_watch(root, cli.config.as_deref()).await,
        Commands::Status => handle_status(root, cli.config.as_deref()),
        Commands::NextRun => handle_next_run(root, cli.config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

// --- Shutdown handling ---

/// Global shutdown flag shared with signal handlers.
fn shutdown_flag() -> &'static Arc<AtomicBool> {
    static FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();
    FLAG.get_or_init(|| Arc::new(AtomicBool::new(false)))
}

fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Install signal handlers for SIGTERM and SIGINT that set the shutdown flag.
fn install_signal_handlers() -> Result<(), String> {
    let flag = Arc::clone(shutdown_flag());
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag))
        .map_err(|e| format!("Failed to register SIGTERM handler: {}", e))?;
    signal_hook::flag::register(signal_hook::consts::SIGINT, flag)
        .map_err(|e| format!("Failed to register SIGINT handler: {}", e))?;
    Ok(())
}

// --- Handlers ---

fn load_config(root: &Path, config_path: Option<&Path>) -> Result<LeadAssignConfig, String> {
    match config_path {
        Some(p) => config::load_config_file(p),
        None => config::load_config(root),
    }
}

fn pool_path(root: &Path, config: &LeadAssignConfig) -> PathBuf {
    root.join(&config.project.pool_path)
}

fn runtime_dir(root: &Path) -> PathBuf {
    root.join(".lead-assign")
}

fn handle_init(root: &Path) -> Result<(), String> {
    let config_path = root.join("lead-assign.toml");
    if config_path.exists() {
        return Err(format!("{} already exists", config_path.display()));
    }

    let default_config = "\
[project]
pool_path = \"LEADS.yaml\"

[assignment]
bundle_size = 5
work_days = 2
period_days = 30
dedup_window_days = 30
same_company_only = false
auto = false
interval_number = 1
interval_unit = \"days\"
";
    std::fs::write(&config_path, default_config)
        .map_err(|e| format!("Failed to write {}: {}", config_path.display(), e))?;

    let config = LeadAssignConfig::default();
    let path = pool_path(root, &config);
    if !path.exists() {
        pool::save(&path, &PoolFile::new(vec![], vec![]))?;
    }

    log_info!("Initialized {} and {}", config_path.display(), path.display());
    Ok(())
}

fn run_once(
    root: &Path,
    config: &LeadAssignConfig,
    team_ids: Option<Vec<u32>>,
    work_days: Option<u32>,
    bundle: Option<u32>,
) -> Result<RunReport, String> {
    let _guard = lock::try_acquire(&runtime_dir(root))?;

    let path = pool_path(root, config);
    let mut pool_file = pool::load(&path)?;

    let params = RunParams {
        team_ids,
        work_days: work_days.unwrap_or(config.assignment.work_days),
        period_days: config.assignment.period_days,
        bundle_size: bundle.unwrap_or(config.assignment.bundle_size),
        dedup: DedupParams {
            window_days: config.assignment.dedup_window_days,
            same_company_only: config.assignment.same_company_only,
        },
    };

    let store = MemStore::new(pool_file.leads.clone(), &pool_file.teams);
    let report = allocator::run(&store, &pool_file.teams, &params)?;

    let (leads, counts) = store.into_state()?;
    pool_file.leads = leads;
    pool_file.apply_counts(&counts);
    pool::save(&path, &pool_file)?;

    Ok(report)
}

fn print_report(report: &RunReport, json: bool) -> Result<(), String> {
    if json {
        let rendered = serde_json::to_string_pretty(report)
            .map_err(|e| format!("Failed to render report: {}", e))?;
        println!("{}", rendered);
        return Ok(());
    }

    println!("Assigned: {}", report.assigned_count);
    for (member_id, count) in &report.per_member {
        println!("  member {}: {}", member_id, count);
    }
    if report.duplicates_merged > 0 {
        println!("Duplicates merged: {}", report.duplicates_merged);
    }
    println!("Pending remaining: {}", report.unassigned_remaining);
    for err in &report.errors {
        println!("Team {} ({}) skipped: {}", err.team_id, err.team_name, err.detail);
    }
    Ok(())
}

fn handle_run(
    root: &Path,
    config_path: Option<&Path>,
    team: Vec<u32>,
    work_days: Option<u32>,
    bundle: Option<u32>,
    json: bool,
) -> Result<(), String> {
    let config = load_config(root, config_path)?;
    let team_ids = if team.is_empty() { None } else { Some(team) };
    let report = run_once(root, &config, team_ids, work_days, bundle)?;
    print_report(&report, json)
}

async fn handle_watch(root: &Path, config_path: Option<&Path>) -> Result<(), String> {
    let config = load_config(root, config_path)?;
    if !config.assignment.auto {
        return Err(
            "Auto-assignment is disabled (set assignment.auto = true to use watch)".to_string(),
        );
    }

    install_signal_handlers()?;

    let token = CancellationToken::new();
    let watcher_token = token.clone();
    tokio::spawn(async move {
        while !is_shutdown_requested() {
            tokio::time::sleep(Duration::from_millis(SHUTDOWN_POLL_MS)).await;
        }
        watcher_token.cancel();
    });

    let mut schedule = trigger::TriggerSchedule::new(
        config.assignment.interval_number,
        config.assignment.interval_unit,
    )
    .with_next_call(config.assignment.next_run);

    let mut next = schedule.upcoming(Utc::now());

    loop {
        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        log_info!(
            "Next assignment run at {} ({}s from now)",
            next.format("%Y-%m-%d %H:%M:%S UTC"),
            wait.as_secs()
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = token.cancelled() => {
                log_info!("Shutdown requested, stopping watch");
                return Ok(());
            }
        }

        match run_once(root, &config, None, None, None) {
            Ok(report) => {
                log_info!(
                    "Run complete: {} assigned, {} pending remain",
                    report.assigned_count,
                    report.unassigned_remaining
                );
            }
            // A held lock means another run is in flight; skip this tick
            Err(e) => log_warn!("Run skipped: {}", e),
        }

        if token.is_cancelled() {
            return Ok(());
        }

        // Anchor the cadence on the tick that just fired, not on the wall
        // clock, so run duration cannot drift the schedule
        next = schedule.advance(next);
    }
}

fn handle_status(root: &Path, config_path: Option<&Path>) -> Result<(), String> {
    let config = load_config(root, config_path)?;
    let pool_file = pool::load(&pool_path(root, &config))?;

    let pending = pool_file.leads.iter().filter(|l| l.is_pending()).count();
    let assigned = pool_file
        .leads
        .iter()
        .filter(|l| l.member_id.is_some())
        .count();
    let inactive = pool_file.leads.iter().filter(|l| !l.active).count();

    println!(
        "Leads: {} pending, {} assigned, {} inactive",
        pending, assigned, inactive
    );

    let work_days = config.assignment.work_days;
    let period_days = config.assignment.period_days;
    for team in &pool_file.teams {
        if !team.active {
            continue;
        }
        let team_rem = capacity::team_remaining(team, work_days, period_days);
        println!(
            "Team {} ({}): quota remaining {} over {} work day(s)",
            team.name, team.id, team_rem, work_days
        );
        for member in team.active_members() {
            println!(
                "  {} ({}): {}/{} this period, {} remaining this run",
                member.name,
                member.id,
                member.lead_month_count,
                member.assignment_max,
                capacity::remaining(member, work_days, period_days)
            );
        }
    }

    Ok(())
}

fn handle_next_run(root: &Path, config_path: Option<&Path>) -> Result<(), String> {
    let config = load_config(root, config_path)?;
    let schedule = trigger::TriggerSchedule::new(
        config.assignment.interval_number,
        config.assignment.interval_unit,
    )
    .with_next_call(config.assignment.next_run);
    let next = schedule.upcoming(Utc::now());

    if config.assignment.auto {
        println!("Next run: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
    } else {
        println!(
            "Auto-assignment disabled; would next run at {}",
            next.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
