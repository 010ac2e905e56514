//! Briefdaemon - Scheduled Earnings Brief Pipeline
//!
//! CLI entry point for managing the daemon and the recurring schedule.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;

use briefdaemon::cli::{Cli, Command, OutputFormat, ScheduleCommand};
use briefdaemon::config::Config;
use briefdaemon::daemon::DaemonManager;
use briefdaemon::pipeline::PipelineRunner;
use briefdaemon::providers::{
    Analyzer, AnthropicAnalyzer, Dispatcher, EmailDispatcher, OpenAiAnalyzer, TranscriptClient, TranscriptSource,
    VideoListing, YoutubeListing,
};
use briefdaemon::scheduler::SchedulerLoop;
use briefdaemon::store::{
    ActivityLog, IntervalUnit, LogLevel, ScheduleConfig, ScheduleMode, ScheduleRequest, ScheduleStore,
};
use docstore::DocStore;

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("briefdaemon")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Setup tracing subscriber - write to log file, not stdout/stderr
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let log_file = fs::File::create(log_dir.join("briefdaemon.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!(
        "Briefdaemon loaded config: primary={}/{}, fallback={}/{}",
        config.primary.provider, config.primary.model, config.fallback.provider, config.fallback.model
    );

    match cli.command {
        Some(Command::Start { foreground }) => cmd_start(&config, foreground).await,
        Some(Command::Stop) => cmd_stop().await,
        Some(Command::Status { format }) => cmd_status(&config, format).await,
        Some(Command::Run { recipient }) => cmd_run(&config, &recipient).await,
        Some(Command::Schedule { command }) => match command {
            ScheduleCommand::Show { format } => cmd_schedule_show(&config, format),
            ScheduleCommand::Set {
                recipient,
                mode,
                every,
                unit,
                at,
            } => cmd_schedule_set(&config, &recipient, &mode, every, &unit, &at),
            ScheduleCommand::Cancel => cmd_schedule_cancel(&config),
        },
        Some(Command::Log { lines, clear }) => cmd_log(&config, lines, clear),
        Some(Command::RunDaemon) => cmd_run_daemon(&config).await,
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Open the document store and resolve the two persisted documents
fn open_stores(config: &Config) -> Result<(ScheduleStore, ActivityLog)> {
    let store_path = PathBuf::from(&config.storage.store_dir);
    if !store_path.exists() {
        fs::create_dir_all(&store_path).context("Failed to create store directory")?;
    }

    let store = Arc::new(DocStore::open(&store_path).context("Failed to open document store")?);
    let schedule = ScheduleStore::open(store.clone(), &config.scheduler.schedule_doc)?;
    let log = ActivityLog::open(store, &config.scheduler.log_doc)?;
    Ok((schedule, log))
}

/// Build the pipeline from configured providers
///
/// The fallback analyzer is optional: a missing fallback API key degrades to
/// primary-only analysis instead of refusing to start.
fn build_runner(config: &Config, log: ActivityLog) -> Result<Arc<PipelineRunner>> {
    let listing: Arc<dyn VideoListing> =
        Arc::new(YoutubeListing::from_config(&config.listing).context("Failed to create video listing client")?);
    let transcripts: Arc<dyn TranscriptSource> =
        Arc::new(TranscriptClient::from_config(&config.transcript).context("Failed to create transcript client")?);

    let primary: Arc<dyn Analyzer> = match config.primary.provider.as_str() {
        "openai" => Arc::new(OpenAiAnalyzer::from_config(&config.primary).context("Failed to create primary analyzer")?),
        _ => Arc::new(AnthropicAnalyzer::from_config(&config.primary).context("Failed to create primary analyzer")?),
    };

    let fallback: Option<Arc<dyn Analyzer>> = match config.fallback.provider.as_str() {
        "anthropic" => AnthropicAnalyzer::from_config(&config.fallback)
            .map(|a| Arc::new(a) as Arc<dyn Analyzer>)
            .ok(),
        _ => OpenAiAnalyzer::from_config(&config.fallback)
            .map(|a| Arc::new(a) as Arc<dyn Analyzer>)
            .ok(),
    };
    if fallback.is_none() {
        tracing::warn!("Fallback analyzer unavailable, continuing with primary only");
    }

    let dispatcher: Arc<dyn Dispatcher> =
        Arc::new(EmailDispatcher::from_config(&config.smtp).context("Failed to create email dispatcher")?);

    Ok(Arc::new(PipelineRunner::new(
        &config.pipeline,
        listing,
        transcripts,
        primary,
        fallback,
        dispatcher,
        log,
    )))
}

/// Start the daemon
async fn cmd_start(config: &Config, foreground: bool) -> Result<()> {
    let daemon = DaemonManager::new();

    if let Some(pid) = daemon.running_pid() {
        println!("Briefdaemon is already running (PID: {})", pid);
        return Ok(());
    }

    if foreground {
        println!("Starting Briefdaemon in foreground mode...");
        run_daemon(config).await
    } else {
        let pid = daemon.start()?;
        println!("Briefdaemon started (PID: {})", pid);
        Ok(())
    }
}

/// Stop the daemon
async fn cmd_stop() -> Result<()> {
    let daemon = DaemonManager::new();

    let Some(pid) = daemon.running_pid() else {
        println!("Briefdaemon is not running");
        return Ok(());
    };

    daemon.stop()?;
    println!("Briefdaemon stopped (was PID: {})", pid);
    Ok(())
}

/// Show daemon status and the active schedule
async fn cmd_status(config: &Config, format: OutputFormat) -> Result<()> {
    let daemon = DaemonManager::new();
    let status = daemon.status();
    let (schedule, _) = open_stores(config)?;
    let cfg = schedule.load();

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "running": status.running,
                "pid": status.pid,
                "pid_file": status.pid_file.to_string_lossy(),
                "schedule": cfg,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            println!("Briefdaemon Status");
            println!("------------------");
            if status.running {
                println!("Status: {}", "running".green());
                println!("PID: {}", status.pid.unwrap_or_default());
            } else {
                println!("Status: {}", "stopped".red());
            }
            println!("PID file: {}", status.pid_file.display());
            println!();
            print_schedule(&cfg);
        }
    }

    Ok(())
}

fn print_schedule(cfg: &ScheduleConfig) {
    println!("Schedule");
    println!("--------");
    if cfg.active {
        println!("Active: {}", "yes".green());
    } else {
        println!("Active: no");
    }
    match cfg.mode {
        ScheduleMode::Interval => {
            let unit = match cfg.interval_unit {
                IntervalUnit::Minute => "minute(s)",
                IntervalUnit::Hour => "hour(s)",
            };
            println!("Mode: every {} {}", cfg.interval_value, unit);
        }
        ScheduleMode::Daily => println!("Mode: daily at {} UTC", cfg.daily_time),
    }
    if !cfg.recipient.is_empty() {
        println!("Recipient: {}", cfg.recipient);
    }
    println!("Completed runs: {}", cfg.run_count);
    if let Some(last) = cfg.last_run {
        println!("Last run: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(next) = cfg.next_run {
        println!("Next run: {}", next.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}

/// Run one pipeline cycle immediately, outside the schedule
async fn cmd_run(config: &Config, recipient: &str) -> Result<()> {
    config.validate()?;

    let (_, log) = open_stores(config)?;
    let runner = build_runner(config, log)?;

    let one_off = ScheduleConfig {
        recipient: recipient.to_string(),
        ..Default::default()
    };

    println!("Running one pipeline cycle (recipient: {})...", recipient);
    let summary = runner.run(&one_off).await?;

    println!();
    println!("Discovered: {}", summary.discovered);
    println!("Matched:    {}", summary.matched);
    println!("Transcribed: {}", summary.transcribed);
    println!("Analyzed:   {}", summary.analyzed);
    println!("Sent:       {}", summary.sent);
    Ok(())
}

/// Show the persisted schedule
fn cmd_schedule_show(config: &Config, format: OutputFormat) -> Result<()> {
    let (schedule, _) = open_stores(config)?;
    let cfg = schedule.load();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&cfg)?),
        OutputFormat::Text => print_schedule(&cfg),
    }
    Ok(())
}

/// Replace the schedule with a new recurring one
fn cmd_schedule_set(config: &Config, recipient: &str, mode: &str, every: u32, unit: &str, at: &str) -> Result<()> {
    let mode = match mode.to_lowercase().as_str() {
        "interval" => ScheduleMode::Interval,
        "daily" => ScheduleMode::Daily,
        other => return Err(eyre::eyre!("Unknown mode: {}. Use: interval or daily", other)),
    };
    let unit = match unit.to_lowercase().as_str() {
        "minute" | "minutes" | "min" => IntervalUnit::Minute,
        "hour" | "hours" | "hr" => IntervalUnit::Hour,
        other => return Err(eyre::eyre!("Unknown unit: {}. Use: minute or hour", other)),
    };

    let (schedule, log) = open_stores(config)?;
    let cfg = schedule.replace(ScheduleRequest {
        mode,
        interval_value: every,
        interval_unit: unit,
        daily_time: at.to_string(),
        recipient: recipient.to_string(),
    })?;

    log.append(LogLevel::Info, format!("Schedule replaced (recipient: {})", cfg.recipient));
    println!("Schedule set.");
    print_schedule(&cfg);
    Ok(())
}

/// Deactivate the schedule
fn cmd_schedule_cancel(config: &Config) -> Result<()> {
    let (schedule, log) = open_stores(config)?;
    let cfg = schedule.cancel();
    log.append(LogLevel::Info, "Schedule cancelled");
    if cfg.recipient.is_empty() {
        println!("Schedule cancelled (none was set).");
    } else {
        println!("Schedule cancelled.");
    }
    Ok(())
}

/// Show or clear the activity log
fn cmd_log(config: &Config, lines: usize, clear: bool) -> Result<()> {
    let (_, log) = open_stores(config)?;

    if clear {
        log.clear();
        println!("Activity log cleared.");
        return Ok(());
    }

    let entries = log.read(lines);
    if entries.is_empty() {
        println!("Activity log is empty.");
        return Ok(());
    }

    for entry in entries {
        let level = match entry.level {
            LogLevel::Info => "info".normal(),
            LogLevel::Ok => "ok  ".green(),
            LogLevel::Err => "err ".red(),
            LogLevel::Ai => "ai  ".blue(),
        };
        println!("{} [{}] {}", entry.time.format("%Y-%m-%d %H:%M:%S"), level, entry.message);
    }
    Ok(())
}

/// Run as the daemon process (internal command)
async fn cmd_run_daemon(config: &Config) -> Result<()> {
    let daemon = DaemonManager::new();
    daemon.register_self()?;

    run_daemon(config).await
}

/// Run the daemon main loop
async fn run_daemon(config: &Config) -> Result<()> {
    info!("Daemon starting...");

    // Fail fast on missing API keys before any task spawns
    config.validate()?;
    info!("Startup validation passed");

    let (schedule, log) = open_stores(config)?;
    info!("Document store opened");

    let runner = build_runner(config, log.clone())?;
    info!("Pipeline runner initialized");

    let scheduler = SchedulerLoop::new(
        schedule,
        log,
        runner,
        Duration::from_secs(config.scheduler.tick_secs),
    );

    // Shutdown channel for the scheduler loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    let scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));
    info!("Scheduler loop started");

    info!("Daemon running. Press Ctrl+C to stop.");

    // Set up signal handlers
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("SIGINT received");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received");
            }
        }
        let _ = shutdown_tx.send(()).await;
    }

    #[cfg(not(unix))]
    {
        // On non-Unix, just wait for Ctrl+C
        tokio::signal::ctrl_c().await?;
        let _ = shutdown_tx.send(()).await;
    }

    info!("Daemon shutting down...");

    // An in-flight pipeline run completes before the loop observes shutdown
    let _ = scheduler_handle.await;

    Ok(())
}
