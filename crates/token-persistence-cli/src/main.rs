//! token-persistence CLI
//!
//! Operator tool for inspecting and exercising the token cache persistence
//! that an application would get from `create_persistence`. Configuration
//! comes from a JSON file, command-line flags, or both (flags win).

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

use token_persistence::{
    create_persistence, CachePersistence, DataProtectionScope, Persistence,
    PersistenceConfiguration,
};

/// Secure token cache persistence - inspect, verify and edit the cache
#[derive(Parser, Debug)]
#[command(name = "token-persistence")]
#[command(version)]
#[command(about = "Inspect and exercise secure token cache persistence")]
struct Args {
    /// JSON configuration file
    #[arg(long, env = "TOKEN_PERSISTENCE_CONFIG")]
    config: Option<PathBuf>,

    /// Cache file location (defaults to the user data directory)
    #[arg(long)]
    cache_path: Option<PathBuf>,

    /// Keyring service name
    #[arg(long)]
    service: Option<String>,

    /// Keyring account name
    #[arg(long)]
    account: Option<String>,

    /// Data protection scope (Windows)
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,

    /// Fall back to a plaintext file if the Linux secret service is unusable
    #[arg(long)]
    plaintext_fallback: bool,

    /// Include paths and account names in log output
    #[arg(long)]
    log_pii: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select and verify the persistence backend
    Verify,
    /// Store a value in the cache
    Save {
        /// Value to store
        value: Option<String>,
        /// Read the value from stdin
        #[arg(long, conflicts_with = "value")]
        stdin: bool,
    },
    /// Print the cached value
    Load,
    /// Delete the cached value
    Delete,
    /// Show the selected backend and staleness
    Status {
        /// Last sync time (RFC 3339) to check for staleness against
        #[arg(long)]
        since: Option<DateTime<Utc>>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScopeArg {
    CurrentUser,
    LocalMachine,
}

impl From<ScopeArg> for DataProtectionScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::CurrentUser => DataProtectionScope::CurrentUser,
            ScopeArg::LocalMachine => DataProtectionScope::LocalMachine,
        }
    }
}

impl Args {
    /// Merge the configuration file with command-line overrides
    fn configuration(&self) -> anyhow::Result<PersistenceConfiguration> {
        let mut config = match &self.config {
            Some(path) => PersistenceConfiguration::from_file(path)?,
            None => PersistenceConfiguration::new(),
        };

        if let Some(path) = &self.cache_path {
            config.cache_path = Some(path.clone());
        }
        if config.cache_path().is_none() {
            config.cache_path = Some(PersistenceConfiguration::default_cache_path()?);
        }
        if let Some(service) = &self.service {
            config.service_name = Some(service.clone());
        }
        if let Some(account) = &self.account {
            config.account_name = Some(account.clone());
        }
        if let Some(scope) = self.scope {
            config.data_protection_scope = Some(scope.into());
        }
        if self.plaintext_fallback {
            config.use_plaintext_file_on_linux = true;
        }
        if self.log_pii {
            config.logger_options.pii_logging_enabled = true;
        }

        Ok(config)
    }
}

fn describe(persistence: &Persistence) -> String {
    let protection = if persistence.is_protected() {
        "protected"
    } else {
        "UNPROTECTED"
    };
    format!(
        "{} ({}) at {}",
        persistence.backend_name(),
        protection,
        persistence.storage_identity().display()
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so `load` output stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let config = args.configuration()?;
    let persistence = create_persistence(&config)
        .await
        .context("Failed to create persistence")?;

    match args.command {
        Command::Verify => {
            println!("Verified {}", describe(&persistence));
        }
        Command::Save { value, stdin } => {
            let contents = match (value, stdin) {
                (Some(value), false) => value,
                (None, true) => {
                    let mut buffer = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buffer)
                        .context("Failed to read stdin")?;
                    buffer
                }
                _ => bail!("Provide a value or --stdin"),
            };
            persistence.save(&contents).await?;
            info!("Saved {} bytes", contents.len());
        }
        Command::Load => match persistence.load().await? {
            Some(contents) => print!("{}", contents),
            None => bail!("Nothing stored at {}", persistence.storage_identity().display()),
        },
        Command::Delete => {
            if persistence.delete().await? {
                println!("Deleted");
            } else {
                println!("Nothing to delete");
            }
        }
        Command::Status { since } => {
            println!("{}", describe(&persistence));
            if let Some(since) = since {
                let stale = persistence.reload_necessary(since).await?;
                println!("Reload necessary since {}: {}", since.to_rfc3339(), stale);
            }
        }
    }

    Ok(())
}
