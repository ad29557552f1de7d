//! studio-control command-line entry point.
//!
//! Drives either side of a channel backed by a shared JSON store file:
//!
//! ```text
//! studio-control show | hide | toggle     controller: emit a command
//! studio-control query                    print the last published state
//! studio-control publish <true|false>     presenter: publish visibility
//! studio-control watch                    presenter: poll, apply, publish
//! studio-control init-config              write a default settings file
//! ```
//!
//! # Settings resolution
//!
//! Built-in defaults, then the TOML settings file, then environment
//! variables and command-line flags (clap merges those two, flags win).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use studio_control::infrastructure::storage::config::{self, AppConfig};
use studio_control::infrastructure::storage::json_file::DEFAULT_STORE_FILE;
use studio_control::{Action, ChannelOptions, JsonFileStorage, StorageAdapter, StudioControl};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Show, hide or toggle an overlay owned by another process.
#[derive(Debug, Parser)]
#[command(
    name = "studio-control",
    about = "Polling signaling channel between an overlay controller and its presenter",
    version
)]
struct Cli {
    /// Settings file.  Defaults to `config.toml` in the platform config dir.
    #[arg(long, global = true, env = "STUDIO_CONTROL_CONFIG")]
    config: Option<PathBuf>,

    /// JSON store file shared by controller and presenter.
    #[arg(long, global = true, env = "STUDIO_CONTROL_STORE")]
    store: Option<PathBuf>,

    #[arg(long, global = true, env = "STUDIO_CONTROL_COMMAND_KEY")]
    command_key: Option<String>,

    #[arg(long, global = true, env = "STUDIO_CONTROL_ACK_KEY")]
    ack_key: Option<String>,

    #[arg(long, global = true, env = "STUDIO_CONTROL_STATE_KEY")]
    state_key: Option<String>,

    /// Poll interval in milliseconds (presenter only).
    #[arg(long, global = true, env = "STUDIO_CONTROL_INTERVAL_MS")]
    interval_ms: Option<u64>,

    /// Free-form tag recorded on emitted commands and published states.
    #[arg(long, global = true, env = "STUDIO_CONTROL_SOURCE")]
    source: Option<String>,

    /// Poll without acknowledgements or clearing.
    #[arg(long, global = true)]
    minimal: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Ask the presenter to show the overlay.
    Show,
    /// Ask the presenter to hide the overlay.
    Hide,
    /// Ask the presenter to flip the overlay.
    Toggle,
    /// Publish visibility as the presenter would.
    Publish {
        #[arg(action = ArgAction::Set)]
        open: bool,
    },
    /// Print the last published visibility: open, closed or unknown.
    Query,
    /// Act as a presenter: apply commands and publish the resulting state.
    Watch {
        /// Visibility to assume when nothing has been published yet.
        #[arg(long, default_value_t = false, action = ArgAction::Set)]
        initially_open: bool,
    },
    /// Write the default settings file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => config::config_file_path().context("locating the settings file"),
        }
    }

    /// Layers command-line and environment overrides on top of `settings`.
    fn channel_options(&self, settings: &AppConfig) -> ChannelOptions {
        let mut channel = settings.channel.clone();
        if let Some(key) = &self.command_key {
            channel.command_key = key.clone();
        }
        if let Some(key) = &self.ack_key {
            channel.ack_key = key.clone();
        }
        if let Some(key) = &self.state_key {
            channel.state_key = key.clone();
        }
        if let Some(ms) = self.interval_ms {
            channel.interval_ms = ms;
        }
        if self.source.is_some() {
            channel.source = self.source.clone();
        }
        if self.minimal {
            channel.durable = false;
        }
        channel.to_options()
    }

    /// `--store`, then `[storage] path`, then the default store file in the
    /// directory holding the settings file.
    fn store_path(&self, settings: &AppConfig, config_path: &Path) -> anyhow::Result<PathBuf> {
        if let Some(path) = self.store.as_ref().or(settings.storage.path.as_ref()) {
            return Ok(path.clone());
        }
        match config_path.parent() {
            Some(dir) => Ok(dir.join(DEFAULT_STORE_FILE)),
            None => JsonFileStorage::default_path().context("locating the default store file"),
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config_path()?;
    let settings = config::load_config_from(&config_path)
        .with_context(|| format!("loading settings from {}", config_path.display()))?;

    // `RUST_LOG` wins over the settings file.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level)),
        )
        .init();

    if let CliCommand::InitConfig { force } = cli.command {
        return init_config(&config_path, force);
    }

    let options = cli.channel_options(&settings);
    let store_path = cli.store_path(&settings, &config_path)?;
    info!(store = %store_path.display(), durable = options.is_durable(), "opening channel");

    let storage: Arc<dyn StorageAdapter> = Arc::new(JsonFileStorage::new(store_path));
    let channel = StudioControl::new(storage, options).context("invalid channel settings")?;

    match cli.command {
        CliCommand::Show => println!("{}", channel.show().await.id),
        CliCommand::Hide => println!("{}", channel.hide().await.id),
        CliCommand::Toggle => println!("{}", channel.toggle().await.id),
        CliCommand::Publish { open } => {
            channel.publish_state(open).await;
        }
        CliCommand::Query => {
            let label = match channel.is_shown().await {
                Some(true) => "open",
                Some(false) => "closed",
                None => "unknown",
            };
            println!("{label}");
        }
        CliCommand::Watch { initially_open } => watch(channel, initially_open).await?,
        // Handled before the channel is opened.
        CliCommand::InitConfig { .. } => {}
    }

    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    config::save_config_to(&AppConfig::default(), path)
        .with_context(|| format!("writing {}", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

/// Runs a presenter until Ctrl+C.
///
/// The poller's handler only forwards actions; applying them and publishing
/// the new visibility happens here, on the async side.
async fn watch(channel: StudioControl, initially_open: bool) -> anyhow::Result<()> {
    // Publishing here would backdate any command queued while no presenter
    // was running, and reconciliation would then skip it.
    let open = channel.is_shown().await.unwrap_or(initially_open);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let handle = channel.start_polling(move |action, _command| {
        if tx.send(action).is_err() {
            warn!(%action, "presenter loop gone; dropping command");
        }
    });
    info!(open, "presenter ready.  Press Ctrl-C to exit.");

    let mut presenter = Presenter::new(&channel, open);
    loop {
        tokio::select! {
            Some(action) = rx.recv() => presenter.apply(action).await,
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for Ctrl-C")?;
                info!("shutdown signal received");
                break;
            }
        }
    }

    // A tick in flight may still deliver (and ack) a command; wait for it.
    if tokio::time::timeout(SHUTDOWN_GRACE, handle.shutdown())
        .await
        .is_err()
    {
        warn!("poller did not shut down within {SHUTDOWN_GRACE:?}");
    }
    // Everything delivered so far has been acked, so it must be applied.
    while let Ok(action) = rx.try_recv() {
        presenter.apply(action).await;
    }
    Ok(())
}

/// How long `watch` waits for an in-flight tick on exit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The presenter's own visibility, as driven by `watch`.
struct Presenter<'a> {
    channel: &'a StudioControl,
    open: bool,
}

impl<'a> Presenter<'a> {
    fn new(channel: &'a StudioControl, open: bool) -> Self {
        Self { channel, open }
    }

    /// Applies a delivered action and publishes the resulting visibility.
    async fn apply(&mut self, action: Action) {
        self.open = action.apply(self.open);
        self.channel.publish_state(self.open).await;
        println!("{action} -> {}", if self.open { "open" } else { "closed" });
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["studio-control", "toggle"]);
        assert!(matches!(cli.command, CliCommand::Toggle));

        let cli = Cli::parse_from(["studio-control", "publish", "false"]);
        assert!(matches!(cli.command, CliCommand::Publish { open: false }));
    }

    #[test]
    fn test_defaults_come_from_settings_file() {
        // Arrange
        let cli = Cli::parse_from(["studio-control", "query"]);
        let mut settings = AppConfig::default();
        settings.channel.command_key = "from-file:command".to_string();
        settings.channel.interval_ms = 750;

        // Act
        let options = cli.channel_options(&settings);

        // Assert
        assert_eq!(options.command_key, "from-file:command");
        assert_eq!(options.interval, Duration::from_millis(750));
        assert!(options.is_durable());
    }

    #[test]
    fn test_flags_override_settings_file() {
        // Arrange
        let cli = Cli::parse_from([
            "studio-control",
            "watch",
            "--command-key",
            "flag:command",
            "--interval-ms",
            "50",
            "--source",
            "cli",
            "--minimal",
        ]);
        let settings = AppConfig::default();

        // Act
        let options = cli.channel_options(&settings);

        // Assert
        assert_eq!(options.command_key, "flag:command");
        assert_eq!(options.interval, Duration::from_millis(50));
        assert_eq!(options.source.as_deref(), Some("cli"));
        assert_eq!(options.ack_key, None);
    }

    #[test]
    fn test_store_flag_beats_settings_path() {
        let cli = Cli::parse_from(["studio-control", "show", "--store", "/tmp/flag.json"]);
        let mut settings = AppConfig::default();
        settings.storage.path = Some(PathBuf::from("/tmp/file.json"));

        let path = cli.store_path(&settings, Path::new("/etc/sc/config.toml")).unwrap();

        assert_eq!(path, PathBuf::from("/tmp/flag.json"));
    }

    #[test]
    fn test_settings_path_used_without_flag() {
        let cli = Cli::parse_from(["studio-control", "show"]);
        let mut settings = AppConfig::default();
        settings.storage.path = Some(PathBuf::from("/tmp/file.json"));

        let path = cli.store_path(&settings, Path::new("/etc/sc/config.toml")).unwrap();

        assert_eq!(path, PathBuf::from("/tmp/file.json"));
    }

    #[test]
    fn test_store_defaults_next_to_explicit_config_file() {
        // Arrange
        let cli = Cli::parse_from(["studio-control", "show", "--config", "/srv/studio/config.toml"]);
        let settings = AppConfig::default();

        // Act
        let path = cli.store_path(&settings, &cli.config_path().unwrap()).unwrap();

        // Assert
        assert_eq!(path, Path::new("/srv/studio").join(DEFAULT_STORE_FILE));
    }

    #[tokio::test]
    async fn test_presenter_applies_and_publishes_each_action() {
        // Arrange
        let channel = StudioControl::new(
            Arc::new(studio_control::MemoryStorage::new()),
            ChannelOptions::with_prefix("cli-presenter"),
        )
        .unwrap();
        let mut presenter = Presenter::new(&channel, false);

        // Act / Assert
        presenter.apply(Action::Toggle).await;
        assert_eq!(channel.is_shown().await, Some(true));

        presenter.apply(Action::Hide).await;
        assert_eq!(channel.is_shown().await, Some(false));
    }
}
