//! Careerlink CLI - sign in to the careerlink platform from a terminal
//!
//! A thin consumer of the session manager: every command hydrates the session
//! from the credential file, runs one session operation and prints the result.

use anyhow::{bail, Context};
use careerlink_auth::{ApiClientConfig, HttpAuthority};
use careerlink_core::{
    init_logging, CareerlinkConfig, Preferences, RegisterRequest, Role, UserPatch,
};
use careerlink_session::{
    ChannelNavigator, ChannelNotifier, FileCredentialStore, Notification, SessionManager,
    SessionOptions, SessionSnapshot, Severity,
};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "careerlink")]
#[command(about = "Manage your careerlink session from the command line")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },

    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,

        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        /// student or recruiter
        #[arg(long, default_value = "student")]
        role: Role,
    },

    /// Sign out and forget stored credentials
    Logout,

    /// Show the current session
    Whoami {
        /// Print the session as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update the locally cached profile
    Profile {
        #[arg(long)]
        first_name: Option<String>,

        #[arg(long)]
        last_name: Option<String>,

        /// Extra profile field (key=value), e.g. --set bio="Rust intern"
        #[arg(long = "set", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },

    /// Toggle notification categories on the locally cached profile
    Preferences {
        #[arg(long, value_name = "CATEGORY")]
        enable: Vec<String>,

        #[arg(long, value_name = "CATEGORY")]
        disable: Vec<String>,
    },

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

/// Session manager plus the receiving ends of its sinks
struct Terminal {
    session: SessionManager,
    notifications: UnboundedReceiver<Notification>,
    navigations: UnboundedReceiver<String>,
}

impl Terminal {
    fn new(config: &CareerlinkConfig) -> anyhow::Result<Self> {
        let authority = HttpAuthority::new(ApiClientConfig::from(&config.api))
            .context("Failed to create authority client")?;
        let store = FileCredentialStore::new(config.storage.credentials_path());
        let (notifier, notifications) = ChannelNotifier::new();
        let (navigator, navigations) = ChannelNavigator::new();

        let session = SessionManager::new(
            Arc::new(authority),
            Arc::new(store),
            Arc::new(notifier),
            Arc::new(navigator),
            SessionOptions::from(config),
        );

        Ok(Self {
            session,
            notifications,
            navigations,
        })
    }

    /// Validate the configuration, build the session and hydrate it
    async fn connect(config: &CareerlinkConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let terminal = Self::new(config)?;
        let restored = terminal.session.initialize().await;
        debug!(phase = %restored.phase, "Session hydrated");
        Ok(terminal)
    }

    /// Print every notification emitted so far
    fn flush_notifications(&mut self) {
        while let Ok(notification) = self.notifications.try_recv() {
            let marker = match notification.severity {
                Severity::Success => "✅",
                Severity::Error => "❌",
                Severity::Info => "ℹ️ ",
            };
            println!(
                "{} {}: {}",
                marker, notification.title, notification.description
            );
        }
    }

    /// Wait briefly for a delayed navigation intent and print it
    async fn flush_navigation(&mut self) {
        let wait = self.session.options().navigation_delay + Duration::from_millis(250);
        match tokio::time::timeout(wait, self.navigations.recv()).await {
            Ok(Some(path)) => println!("➡️  next: {}", path),
            _ => debug!("No navigation intent"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = CareerlinkConfig::load(config_path.as_deref())?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting careerlink CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Config {
            show,
            init,
            validate,
        } => {
            handle_config(&config, config_path.as_deref(), show, init, validate)?;
        }
        Commands::Login { email, password } => {
            let mut terminal = Terminal::connect(&config).await?;
            let session = terminal.session.login(&email, &password).await;
            finish_sign_in(&mut terminal, session).await?;
        }
        Commands::Register {
            email,
            password,
            first_name,
            last_name,
            role,
        } => {
            let mut terminal = Terminal::connect(&config).await?;
            let session = terminal
                .session
                .register(RegisterRequest {
                    email,
                    password,
                    first_name,
                    last_name,
                    role,
                })
                .await;
            finish_sign_in(&mut terminal, session).await?;
        }
        Commands::Logout => {
            let mut terminal = Terminal::connect(&config).await?;
            if terminal.session.snapshot().user.is_none() {
                println!("Not signed in");
                return Ok(());
            }
            terminal.session.logout();
            terminal.flush_notifications();
            terminal.flush_navigation().await;
        }
        Commands::Whoami { json } => {
            let terminal = Terminal::connect(&config).await?;
            print_session(&terminal.session.snapshot(), json)?;
        }
        Commands::Profile {
            first_name,
            last_name,
            fields,
        } => {
            let patch = build_profile_patch(first_name, last_name, &fields)?;
            let terminal = Terminal::connect(&config).await?;
            match terminal.session.update_user(patch) {
                Some(user) => {
                    println!("✅ Profile updated for {}", user.display_name());
                    print_session(&terminal.session.snapshot(), false)?;
                }
                None => bail!("Not signed in. Run 'careerlink login' first."),
            }
        }
        Commands::Preferences { enable, disable } => {
            let terminal = Terminal::connect(&config).await?;
            let Some(user) = terminal.session.snapshot().user else {
                bail!("Not signed in. Run 'careerlink login' first.");
            };
            let mut preferences = user.preferences.unwrap_or_default();
            for category in &enable {
                preferences.set(category, true)?;
            }
            for category in &disable {
                preferences.set(category, false)?;
            }
            terminal.session.update_user(UserPatch {
                preferences: Some(preferences.clone()),
                ..Default::default()
            });
            print_preferences(&preferences);
        }
    }

    Ok(())
}

async fn finish_sign_in(terminal: &mut Terminal, session: SessionSnapshot) -> anyhow::Result<()> {
    terminal.flush_notifications();
    if let Some(error) = session.error {
        bail!(error);
    }
    terminal.flush_navigation().await;
    Ok(())
}

fn print_session(session: &SessionSnapshot, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
        return Ok(());
    }

    match &session.user {
        Some(user) => {
            println!("👤 {} <{}>", user.display_name(), user.email);
            println!("   id:    {}", user.id);
            println!("   role:  {}", user.role);
            println!("   state: {}", session.phase);
            for (key, value) in &user.extra {
                println!("   {}: {}", key, value);
            }
            if let Some(preferences) = &user.preferences {
                print_preferences(preferences);
            }
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

fn print_preferences(preferences: &Preferences) {
    let enabled = preferences.enabled_categories();
    if enabled.is_empty() {
        println!("🔕 All notifications disabled");
    } else {
        println!("🔔 Notifications: {}", enabled.join(", "));
    }
}

/// Turn profile flags into a patch; values that parse as JSON keep their type
fn build_profile_patch(
    first_name: Option<String>,
    last_name: Option<String>,
    fields: &[String],
) -> anyhow::Result<UserPatch> {
    let mut map = Map::new();

    for field in fields {
        let Some((key, value)) = field.split_once('=') else {
            bail!("Invalid field '{}'. Use key=value format", field);
        };
        let key = key.trim();
        if key == "id" {
            bail!("The account id cannot be changed");
        }
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        map.insert(key.to_string(), value);
    }

    if let Some(first_name) = first_name {
        map.insert("firstName".to_string(), Value::String(first_name));
    }
    if let Some(last_name) = last_name {
        map.insert("lastName".to_string(), Value::String(last_name));
    }

    if map.is_empty() {
        bail!("Nothing to update. Pass --first-name, --last-name or --set key=value");
    }

    serde_json::from_value(Value::Object(map)).context("Invalid profile field")
}

fn handle_config(
    config: &CareerlinkConfig,
    path: Option<&Path>,
    show: bool,
    init: bool,
    validate: bool,
) -> anyhow::Result<()> {
    if init {
        let target = default_config_path()?;
        if target.exists() {
            bail!("Configuration already exists at {:?}", target);
        }
        CareerlinkConfig::default().save_to_file(&target)?;
        println!("✅ Configuration initialized at: {:?}", target);
    }

    if show {
        match path {
            Some(path) => println!("📋 Current configuration ({:?}):", path),
            None => println!("📋 Current configuration (defaults):"),
        }
        println!("{}", config.to_toml()?);
    }

    if validate {
        match config.validate() {
            Ok(()) => println!("✅ Configuration is valid"),
            Err(e) => {
                println!("❌ Configuration validation failed: {}", e);
                return Err(e.into());
            }
        }
    }

    Ok(())
}

/// Get the default configuration file path
fn default_config_path() -> anyhow::Result<PathBuf> {
    let base = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .context("Could not determine a configuration directory")?;
    Ok(base.join("careerlink").join("config.toml"))
}

/// Explicit path, or the first existing default location
fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let default_paths = [
        dirs::config_dir().map(|d| d.join("careerlink").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".careerlink").join("config.toml")),
        Some(PathBuf::from("careerlink.toml")),
    ];

    default_paths.into_iter().flatten().find(|path| path.exists())
}
