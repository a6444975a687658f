//! DevJourney CLI - sign in to the DevJourney blog platform and call its API.
//!
//! Every command goes through the core session gateway, so an expired
//! access token is refreshed transparently from the stored refresh cookie.

mod commands;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use devjourney_core::{
    ApiClient, Config, CredentialStore, FileStore, Navigator, Session, SessionGateway,
};

/// Set to log to a daily-rotated file in the cache directory instead of stderr
const ENV_LOG_FILE: &str = "DEVJOURNEY_LOG_FILE";

const LOG_FILE_PREFIX: &str = "devjourney.log";

#[derive(Parser)]
#[command(name = "devjourney", version, about = "DevJourney blog platform client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Sign out; local credentials are removed even if the server is unreachable
    Logout,
    /// Show the signed-in user as the server currently sees them
    Whoami {
        /// Fail unless the user is an admin
        #[arg(long)]
        require_admin: bool,
    },
    /// Update the signed-in user's profile
    Profile {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// Prompt for a new password
        #[arg(long)]
        password: bool,
    },
    /// Mint a new access token from the refresh cookie
    Refresh,
    /// Send an API request, e.g. `request GET /blogs`
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
    },
}

/// Terminal stand-in for the login redirect
#[derive(Default)]
struct CliNavigator {
    session_ended: AtomicBool,
}

impl CliNavigator {
    fn session_ended(&self) -> bool {
        self.session_ended.load(Ordering::SeqCst)
    }
}

impl Navigator for CliNavigator {
    fn redirect(&self, location: &str) {
        self.session_ended.store(true, Ordering::SeqCst);
        info!(location, "Session ended");
        eprintln!("Your session has ended. Run `devjourney login` to sign in again.");
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(config: &Config) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    if std::env::var_os(ENV_LOG_FILE).is_some() {
        let appender = tracing_appender::rolling::daily(config.cache_dir()?, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(writer).with_ansi(false))
            .with(filter)
            .init();
        return Ok(Some(guard));
    }

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
    Ok(None)
}

struct Runtime {
    gateway: SessionGateway,
    store: Arc<FileStore>,
    navigator: Arc<CliNavigator>,
}

fn build_gateway(config: &Config) -> Result<Runtime> {
    let client = ApiClient::from_config(config)?;
    match CredentialStore::get(&config.api_host()) {
        Ok(Some(cookies)) => client.restore_cookies(&cookies),
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Could not read stored refresh cookie"),
    }

    let store = Arc::new(FileStore::open(&config.cache_dir()?)?);
    let session = Session::new(store.clone());
    let navigator = Arc::new(CliNavigator::default());
    let gateway = SessionGateway::new(client, session, navigator.clone());
    Ok(Runtime {
        gateway,
        store,
        navigator,
    })
}

/// What to do with the keychain copy of the refresh cookie after a command
#[derive(Debug, PartialEq, Eq)]
enum CookieAction {
    Store(String),
    Delete,
    Keep,
}

/// The stored cookie goes away only when the session ended: an explicit
/// logout, or a failed refresh that sent us to login. A run that simply
/// had no access token keeps whatever is stored.
fn cookie_action(session_ended: bool, cookies: Option<String>) -> CookieAction {
    if session_ended {
        return CookieAction::Delete;
    }
    match cookies {
        Some(cookies) => CookieAction::Store(cookies),
        None => CookieAction::Keep,
    }
}

/// Park the refresh cookie in the keychain for the next run
fn persist_cookies(config: &Config, gateway: &SessionGateway, session_ended: bool) {
    let host = config.api_host();
    let result = match cookie_action(session_ended, gateway.client().export_cookies()) {
        CookieAction::Store(cookies) => CredentialStore::store(&host, &cookies),
        CookieAction::Delete => CredentialStore::delete(&host),
        CookieAction::Keep => return,
    };
    if let Err(e) = result {
        warn!(error = %e, "Could not update stored refresh cookie");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    let _log_guard = init_tracing(&config)?;
    info!(api = %config.api_base_url, "DevJourney CLI starting");

    let runtime = build_gateway(&config)?;
    let result = commands::run(cli.command, &runtime.gateway, &runtime.store, &mut config).await;

    // Logout always ends in a redirect, so the navigator covers it too
    persist_cookies(&config, &runtime.gateway, runtime.navigator.session_ended());

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_kept_when_run_had_no_token() {
        assert_eq!(cookie_action(false, None), CookieAction::Keep);
        assert_eq!(
            cookie_action(false, Some("refreshToken=abc".to_string())),
            CookieAction::Store("refreshToken=abc".to_string())
        );
    }

    #[test]
    fn test_cookie_deleted_when_session_ended() {
        assert_eq!(cookie_action(true, None), CookieAction::Delete);
        assert_eq!(
            cookie_action(true, Some("refreshToken=abc".to_string())),
            CookieAction::Delete
        );
    }

    #[test]
    fn test_navigator_records_session_end() {
        let navigator = CliNavigator::default();
        assert!(!navigator.session_ended());
        navigator.redirect(devjourney_core::LOGIN_PATH);
        assert!(navigator.session_ended());
    }
}
