//! Operator CLI over the attendance service.
//!
//! Storage is selected from the environment the same way every session
//! does it; see `StorageConfig::from_env`.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use log::info;
use morning_winner_core::{
    default_log_level, init_logging, migrate_local_to_hosted, open_store, parse_attendance_date,
    AttendanceService, AttendanceStatus, AttendanceStore, LocalStore, ServiceError,
    StorageConfig,
};

/// Morning attendance and late-penalty tracker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace|debug|info|warn|error)
    #[arg(long, env = "MORNING_WINNER_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Absolute directory for rolling log files; logging is off when unset
    #[arg(long, env = "MORNING_WINNER_LOG_DIR", global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List members in roster order
    Members,
    /// Show per-member counts and penalties
    Summary {
        /// Also show each member's status on this day (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Record one member's status for a day
    Record {
        member_id: String,
        /// present | late | absent | holiday
        status: String,
        /// Defaults to today in local time
        #[arg(long)]
        date: Option<String>,
    },
    /// Rename a member
    Rename { id: String, name: String },
    /// Append a member
    AddMember { name: String },
    /// Copy the local store into the configured hosted store
    Migrate,
    /// Print core linkage and the selected backend
    Ping,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(log_dir) = args.log_dir.as_deref() {
        let level = args.log_level.as_deref().unwrap_or(default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    let config = StorageConfig::from_env().context("invalid storage configuration")?;

    match args.command {
        Command::Ping => {
            println!("morning_winner_core ping={}", morning_winner_core::ping());
            println!(
                "morning_winner_core version={}",
                morning_winner_core::core_version()
            );
            println!(
                "backend={}",
                if config.is_hosted() { "hosted" } else { "local" }
            );
            Ok(())
        }
        Command::Migrate => migrate(&config),
        command => run_session(&config, command),
    }
}

fn run_session(config: &StorageConfig, command: Command) -> Result<()> {
    let store = open_store(config).context("failed to open store")?;
    info!(
        "event=cli_start module=cli status=ok backend={}",
        store.backend().as_str()
    );
    let mut service = AttendanceService::new(store);
    service.initialize();
    if let Some(message) = service.last_error() {
        bail!("{message}");
    }

    match command {
        Command::Members => {
            for member in service.members() {
                println!("{}\t{}", member.id, member.name);
            }
        }
        Command::Summary { date } => {
            let date = date.as_deref().map(parse_attendance_date).transpose()?;
            print_summary(&service, date);
        }
        Command::Record {
            member_id,
            status,
            date,
        } => {
            let date = date.unwrap_or_else(today);
            let record = service
                .record_attendance(&member_id, &date, &status)
                .map_err(describe)?;
            println!("{}\t{}\t{}", record.member_id, record.date, record.status);
        }
        Command::Rename { id, name } => {
            let member = service.rename_member(&id, &name).map_err(describe)?;
            println!("{}\t{}", member.id, member.name);
        }
        Command::AddMember { name } => {
            let member = service.add_member(&name).map_err(describe)?;
            println!("{}\t{}", member.id, member.name);
        }
        Command::Migrate | Command::Ping => unreachable!("handled before opening a session"),
    }
    Ok(())
}

fn print_summary<S: AttendanceStore>(service: &AttendanceService<S>, date: Option<NaiveDate>) {
    for summary in service.summaries() {
        let mut line = format!(
            "{}\tpresent={}\tlate={}\tholiday={}\tpenalty={}",
            summary.member.name,
            summary.present_count,
            summary.late_count,
            summary.holiday_count,
            summary.total_penalty
        );
        if let Some(date) = date {
            let status = service
                .status_for(&summary.member.id, date)
                .map(AttendanceStatus::as_str)
                .unwrap_or("-");
            line.push_str(&format!("\t{date}={status}"));
        }
        println!("{line}");
    }
}

fn migrate(config: &StorageConfig) -> Result<()> {
    if !config.is_hosted() {
        bail!("hosted storage is not configured; set SUPABASE_URL and SUPABASE_ANON_KEY");
    }
    let source = LocalStore::open(&config.local_db_path).with_context(|| {
        format!(
            "failed to open local store at {}",
            config.local_db_path.display()
        )
    })?;
    let target = open_store(config).context("failed to open hosted store")?;

    let report = migrate_local_to_hosted(&source, &target).context("migration stopped")?;
    println!(
        "members_created={} records_migrated={} records_skipped={}",
        report.members_created, report.records_migrated, report.records_skipped
    );
    Ok(())
}

fn describe(err: ServiceError) -> anyhow::Error {
    anyhow!("{}: {err}", err.user_message())
}

fn today() -> String {
    Local::now().date_naive().format("%Y-%m-%d").to_string()
}
