// dReminder - terminal reminders with due-time notifications
// Entry point and application setup

use anyhow::Context;
use clap::Parser;
use dreminder::app::{App, AppOptions};
use dreminder::clock::SystemClock;
use dreminder::config::{DATA_DIR_NAME, DEFAULT_LOG_FILTER, VERBOSE_LOG_FILTER};
use dreminder::services::{
    ConnectionProvider, DueCheckMode, NotifierKind, Permission, SettingsService,
};
use dreminder::ui::Screen;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "dReminder: set a reminder, get notified when it is due",
    long_about = None
)]
struct Cli {
    /// Directory holding the database and settings.
    #[arg(long, env = "DREMINDER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Seconds between creating a reminder and its due time.
    #[arg(long)]
    offset_secs: Option<u64>,

    /// How deadlines are matched: exact-second or window.
    #[arg(long)]
    due_check: Option<DueCheckMode>,

    /// Notification backend: terminal or log.
    #[arg(long)]
    notifier: Option<NotifierKind>,

    /// Answer to the notification permission request: granted, denied or default.
    #[arg(long)]
    permission: Option<Permission>,

    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::info!("Starting dReminder {}", env!("CARGO_PKG_VERSION"));

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .context("Could not determine the platform data directory; pass --data-dir")?
            .join(DATA_DIR_NAME),
    };
    tokio::fs::create_dir_all(&data_dir)
        .await
        .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
    tracing::info!("Data directory: {:?}", data_dir);

    let mut settings = SettingsService::new(data_dir.clone())
        .load()
        .await
        .context("Failed to load settings")?;
    if let Some(offset) = cli.offset_secs {
        settings.reminder_offset_secs = offset;
    }
    if let Some(mode) = cli.due_check {
        settings.due_check = mode;
    }
    if let Some(kind) = cli.notifier {
        settings.notifier = kind;
    }
    if let Some(permission) = cli.permission {
        settings.notification_permission = permission;
    }
    settings.validate()?;

    let notifier = settings.notifier.build(settings.notification_permission);
    let app = App::new(
        AppOptions::from(&settings),
        Arc::new(SystemClock),
        notifier,
        Screen::stdout(),
    );

    let connection = ConnectionProvider::connect(data_dir);
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    app.run(connection, stdin).await?;

    Ok(())
}
