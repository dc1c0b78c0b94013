use clap::Parser;
use std::sync::Arc;
use tableau::adapters::{LogOutbound, PostgresStore};
use tableau::cli::{self, Cli, Commands, ConsoleLine};
use tableau::config::{AppConfig, LoggingConfig};
use tableau::coordinator::{desk_channel, Desk, DeskHandle, Runtime};
use tableau::error::{Result, TableauError};
use tableau::persistence::{JsonFileStore, ScheduleStore};
use std::io::BufRead;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Stdin channel id used for dedupe keys when no stat channel is configured
const CONSOLE_CHANNEL: i64 = 0;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Parse { text }) => {
            init_logging_simple();
            cli::show_parse(text);
        }
        Some(Commands::Timetable { seed }) => {
            init_logging_simple();
            let config = load_config(&cli.config)?;
            cli::show_timetable(&config, *seed)?;
        }
        Some(Commands::Run) | None => {
            let config = load_config(&cli.config)?;
            init_logging(&config.logging);
            run_desk(config).await?;
        }
    }

    Ok(())
}

fn load_config(path: &str) -> Result<AppConfig> {
    let config = AppConfig::load_file(path)?;
    config
        .validate()
        .map_err(|errors| TableauError::InvalidConfig(errors.join("; ")))?;
    Ok(config)
}

fn init_logging(logging: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tableau=debug,sqlx=warn", logging.level))
    });

    // File logging only when TABLEAU_LOG_DIR is set.
    //
    // `tracing_appender::rolling::daily` panics if it can't create the initial
    // log file, so writability is checked first.
    let file_layer = std::env::var("TABLEAU_LOG_DIR").ok().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                log_dir, e
            );
            return None;
        }
        let test_path = std::path::Path::new(&log_dir).join(".tableau_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);
                let file_appender = tracing_appender::rolling::daily(&log_dir, "tableau.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Lives for the whole process
                Box::leak(Box::new(guard));
                eprintln!("Logging to: {}/tableau.log", log_dir);

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    });

    let (json_layer, text_layer) = if logging.json {
        (Some(tracing_subscriber::fmt::layer().json().with_target(true)), None)
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .init();
}

fn init_logging_simple() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}

async fn open_store(config: &AppConfig) -> Result<Arc<dyn ScheduleStore>> {
    match &config.persistence.database_url {
        Some(url) => {
            info!("storing timetables in PostgreSQL");
            Ok(Arc::new(PostgresStore::new(url, 5).await?))
        }
        None => {
            let path = &config.persistence.schedule_path;
            info!(path = %path.display(), "storing timetables in a JSON file");
            Ok(Arc::new(JsonFileStore::new(path.clone())))
        }
    }
}

async fn run_desk(config: AppConfig) -> Result<()> {
    let store = open_store(&config).await?;
    let desk = Desk::new(&config, chrono::Local::now().naive_local());
    let runtime = Runtime::new(desk, Arc::new(LogOutbound::new()), store, &config);

    if runtime.restore().await {
        info!("resumed today's stored timetable");
    }

    let (handle, inbox) = desk_channel(256);
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let desk = runtime.desk();
    let channel = config.channels.stat_channel.unwrap_or(CONSOLE_CHANNEL);

    // Stdin is read on a detached OS thread, outside the runtime
    let rt = tokio::runtime::Handle::current();
    std::thread::spawn(move || rt.block_on(read_console(handle, channel)));

    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("received Ctrl-C, shutting down");
            let _ = ctrl_c_tx.send(());
        }
    });

    info!("reading feed events from stdin (/status, /reset, /reset all)");
    runtime.run(inbox, shutdown_rx).await;

    let status = desk.lock().await.status(chrono::Local::now().naive_local());
    cli::show_status(&status);
    Ok(())
}

/// Feed collaborator backed by stdin; closing stdin closes the feed
async fn read_console(handle: DeskHandle, channel: i64) {
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };

        let outcome = match ConsoleLine::parse(&line) {
            ConsoleLine::Blank => Ok(()),
            ConsoleLine::Event(text) => handle.submit(channel, text).await,
            ConsoleLine::Reset(scope) => handle.reset(scope).await,
            ConsoleLine::Status => handle.status().await.map(|s| cli::show_status(&s)),
        };
        if let Err(e) = outcome {
            warn!(error = %e, "desk is no longer accepting input");
            break;
        }
    }
}
