//! CLI entry point for earnmeter.
//!
//! Reads ride notifications, rates them against the driver's thresholds,
//! keeps a local ride history synced with the backend, and reports daily
//! earnings.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use earnmeter::classifier::classify_detailed;
use earnmeter::config::AppConfig;
use earnmeter::infra::backend::Remote;
use earnmeter::model::{
    NotificationEvent, RideAction, SettingsPatch, UserSettings, default_supported_apps,
};
use earnmeter::output::{append_records, print_json, print_pretty};
use earnmeter::overlay::LogOverlay;
use earnmeter::parser::parse_notification;
use earnmeter::pipeline::RideProcessor;
use earnmeter::service::NotificationService;
use earnmeter::services::{RideRepository, SettingsRepository};
use earnmeter::snapshot::SnapshotRefresher;
use earnmeter::stats::{daily_analytics, today_stats};
use earnmeter::store::{RideCache, RideStore, SettingsCache, SettingsStore, StoreLock};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "earnmeter")]
#[command(about = "Rate ride-hailing offers from driver app notifications", long_about = None)]
struct Cli {
    /// Signed-in user (overrides EARNMETER_USER_ID)
    #[arg(long, global = true)]
    user: Option<String>,

    /// Directory for local caches (overrides EARNMETER_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and classify notification text without storing anything.
    /// Uses the signed-in user's thresholds when a user is set.
    Parse {
        #[arg(value_name = "TEXT")]
        text: String,

        /// App label recorded as the ride source
        #[arg(short, long, default_value = "Uber Driver")]
        app: String,
    },
    /// Run one notification through the full pipeline
    Rate {
        /// Package name of the posting app, e.g. com.ubercab.driver
        #[arg(short, long)]
        package: String,

        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Process notification events read as JSON lines from stdin
    Listen,
    /// Push rides that have not reached the backend yet
    Sync,
    /// Show recent rides
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        #[arg(short, long, default_value_t = 0)]
        offset: usize,

        /// Also append the rides to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Record what happened to a ride
    SetAction {
        ride_id: String,

        /// accepted, rejected, missed or expired
        action: RideAction,
    },
    /// Earnings and ride breakdown for a day
    Stats {
        /// Day to report (YYYY-MM-DD), defaults to today
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// List the driver apps being watched
    ListApps,
    /// Delete the local ride cache (backend copies are kept)
    ClearLocal,
    /// Show or change the user's thresholds and overlay preferences
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the settings in effect
    Show,
    /// Change one or more values
    Set(SettingsPatch),
    /// Look up the admin-suggested thresholds for a city
    Suggest(SuggestArgs),
}

#[derive(Args)]
struct SuggestArgs {
    #[arg(long)]
    city: String,

    /// Save the suggestion as the user's thresholds (always on with auto-suggest)
    #[arg(long)]
    apply: bool,
}

type Rides = RideStore<Arc<Remote>>;
type Settings = SettingsStore<Arc<Remote>>;

struct App {
    config: AppConfig,
    rides: Arc<Rides>,
    settings: Arc<Settings>,
    _lock: StoreLock,
}

impl App {
    fn open(config: AppConfig) -> Result<Self> {
        let lock = StoreLock::acquire(config.lock_path())?;
        let remote = Arc::new(Remote::from_config(&config)?);
        if !remote.is_online() {
            warn!("No backend configured, running offline");
        }

        let rides = RideStore::new(RideCache::open(config.rides_path())?, remote.clone());
        let settings = SettingsStore::new(SettingsCache::open(config.settings_path())?, remote);

        Ok(Self {
            config,
            rides: Arc::new(rides),
            settings: Arc::new(settings),
            _lock: lock,
        })
    }

    fn user_id(&self) -> Result<&str> {
        self.config
            .user_id
            .as_deref()
            .context("no user set; pass --user or set EARNMETER_USER_ID")
    }

    fn service(
        &self,
    ) -> (
        SnapshotRefresher<Arc<Settings>>,
        NotificationService<Arc<Rides>, LogOverlay>,
    ) {
        let refresher = SnapshotRefresher::new(self.settings.clone(), self.config.user_id.clone());
        let processor = Arc::new(RideProcessor::new(self.rides.clone(), LogOverlay));
        let service = NotificationService::new(processor, refresher.subscribe());
        (refresher, service)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/earnmeter.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("earnmeter.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(user) = cli.user {
        config.user_id = Some(user);
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Parsing without a user needs no stores.
    if let Commands::Parse { text, app } = &cli.command
        && config.user_id.is_none()
    {
        return print_parsed(text, app, &UserSettings::default());
    }

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create {}", config.data_dir.display()))?;
    let app = App::open(config)?;

    match cli.command {
        Commands::Parse { text, app: source } => {
            let settings = app.settings.effective_settings(app.user_id()?).await;
            print_parsed(&text, &source, &settings)?;
        }
        Commands::Rate { package, text } => {
            let (refresher, service) = app.service();
            refresher.refresh().await;

            let event = NotificationEvent::new(&package, &text);
            let admitted = match service.admit(&event) {
                Ok(admitted) => admitted,
                Err(reason) => bail!("notification skipped: {reason}"),
            };
            let processed = service
                .processor()
                .process(
                    &admitted.user_id,
                    &admitted.text,
                    &admitted.app,
                    &admitted.settings,
                )
                .await?;
            print_json(&processed)?;
        }
        Commands::Listen => listen(&app).await?,
        Commands::Sync => {
            let synced = app.rides.sync_pending().await?;
            let remaining = app.rides.pending_sync_count().await;
            print_json(&json!({ "synced": synced, "pending": remaining }))?;
        }
        Commands::History {
            limit,
            offset,
            export,
        } => {
            let rides = app.rides.get_rides(app.user_id()?, limit, offset).await?;
            if let Some(path) = export {
                append_records(&path, &rides)?;
                info!(path = %path.display(), rides = rides.len(), "Rides exported");
            }
            print_json(&rides)?;
        }
        Commands::SetAction { ride_id, action } => {
            app.rides.update_action(&ride_id, action).await?;
            info!(ride_id = %ride_id, %action, "Ride action recorded");
        }
        Commands::Stats { date } => {
            let user_id = app.user_id()?;
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let rides = app.rides.local_rides(user_id).await;

            let analytics = daily_analytics(user_id, date, &rides);
            print_pretty(&analytics);
            print_json(&json!({
                "today": today_stats(&rides, date),
                "analytics": analytics,
            }))?;
        }
        Commands::ListApps => {
            let apps = match app.settings.get_supported_apps().await {
                Ok(apps) if !apps.is_empty() => apps,
                Ok(_) => default_supported_apps(),
                Err(e) => {
                    warn!(error = %e, "Supported apps unavailable, showing defaults");
                    default_supported_apps()
                }
            };
            print_json(&apps)?;
        }
        Commands::ClearLocal => {
            let removed = app.rides.clear_local().await?;
            print_json(&json!({ "removed": removed }))?;
        }
        Commands::Settings { command } => settings(&app, command).await?,
    }

    Ok(())
}

fn print_parsed(text: &str, source_app: &str, settings: &UserSettings) -> Result<()> {
    let signals = parse_notification(text, source_app);
    let details = classify_detailed(
        signals.earnings_per_km,
        signals.earnings_per_hour,
        signals.rider_rating,
        &settings.thresholds(),
    );
    print_json(&json!({ "signals": signals, "classification": details }))
}

/// A backend failure while saving only logs a warning; the change is kept
/// locally and the command still succeeds.
async fn settings(app: &App, command: SettingsCommand) -> Result<()> {
    let user_id = app.user_id()?;

    match command {
        SettingsCommand::Show => {
            print_json(&app.settings.effective_settings(user_id).await)?;
        }
        SettingsCommand::Set(patch) => {
            if patch.is_empty() {
                bail!("nothing to change; see `earnmeter settings set --help`");
            }
            let mut settings = app.settings.effective_settings(user_id).await;
            patch.apply(&mut settings);

            let synced = app.settings.update_settings(&settings).await?;
            info!(user_id, synced, "Settings saved");
            print_json(&json!({ "settings": settings, "synced": synced }))?;
        }
        SettingsCommand::Suggest(args) => {
            let suggestion = app
                .settings
                .suggest(user_id, &args.city, args.apply)
                .await?;
            if suggestion.ranges.is_none() {
                warn!(city = %args.city, "No suggestions available for this city yet");
            }
            print_json(&suggestion)?;
        }
    }

    Ok(())
}

/// Reads one JSON [`NotificationEvent`] per stdin line and processes each in
/// the background. The snapshot is refreshed on the configured interval.
/// End of input waits for in-flight rides; Ctrl+C cancels them.
#[tracing::instrument(skip_all, fields(user_id = ?app.config.user_id))]
async fn listen(app: &App) -> Result<()> {
    if app.config.user_id.is_none() {
        warn!("No user set, every notification will be skipped");
    }
    let (refresher, service) = app.service();
    refresher.refresh().await;

    let mut ticker = tokio::time::interval(app.config.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Listening for notifications on stdin. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => match serde_json::from_str::<NotificationEvent>(&line) {
                    Ok(event) => {
                        // Skips are logged by the service.
                        let _ = service.dispatch(event);
                    }
                    Err(e) => warn!(error = %e, "Ignoring malformed event line"),
                },
                None => {
                    info!("Input closed, waiting for in-flight rides");
                    service.drain().await;
                    break;
                }
            },
            _ = ticker.tick() => {
                refresher.refresh().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    service.shutdown().await;

    let pending = app.rides.pending_sync_count().await;
    if pending > 0 {
        info!(pending, "Rides waiting for backend sync");
    }
    Ok(())
}
