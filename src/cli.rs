//! CLI argument parsing and startup helpers for the demo server.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, warn};

use crate::app::{DemoUser, UserTable};
use crate::config::{AuthConfig, TokenLocation};

const MIN_SECRET_LENGTH: usize = 32;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "tokenwarden", about = "JWT access and refresh token demo server")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TOKENWARDEN_PORT", default_value = "7291")]
    pub port: u16,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,

    /// JSON file with auth options, flags below override it
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Ordered token locations, e.g. "headers,cookies"
    #[arg(long, value_delimiter = ',')]
    pub locations: Vec<TokenLocation>,

    /// Signing algorithm, e.g. HS256 or RS256
    #[arg(long)]
    pub algorithm: Option<String>,

    /// Path to file containing the HMAC secret. Prefer the JWT_SECRET_KEY env var instead
    #[arg(long)]
    pub secret_file: Option<PathBuf>,

    /// PEM private key for asymmetric algorithms
    #[arg(long)]
    pub private_key_file: Option<PathBuf>,

    /// PEM public key for asymmetric algorithms
    #[arg(long)]
    pub public_key_file: Option<PathBuf>,

    /// Send cookies without the Secure flag (plain HTTP development)
    #[arg(long)]
    pub insecure_cookies: bool,

    /// Demo account as USERNAME:PASSWORD, repeatable
    #[arg(short, long = "user", value_parser = parse_user)]
    pub users: Vec<DemoUser>,
}

fn parse_user(s: &str) -> Result<DemoUser, String> {
    match s.split_once(':') {
        Some((username, password)) if !username.is_empty() && !password.is_empty() => {
            Ok(DemoUser::new(username, password))
        }
        _ => Err(format!("expected USERNAME:PASSWORD, got '{s}'")),
    }
}

/// Initialize logging based on the specified format.
pub fn init_logging(format: &LogFormat) {
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt::init(),
        LogFormat::Json => tracing_subscriber::fmt().json().init(),
        LogFormat::Compact => tracing_subscriber::fmt().compact().init(),
    }
}

fn read_file(path: &PathBuf, what: &str) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read {what}");
            None
        }
    }
}

/// Load the HMAC secret from the environment or a file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_secret(secret_file: Option<&PathBuf>) -> Option<String> {
    let secret = if let Ok(secret) = std::env::var("JWT_SECRET_KEY") {
        // SAFETY: called during single-threaded startup, nothing else reads
        // this variable.
        unsafe { std::env::remove_var("JWT_SECRET_KEY") };
        secret
    } else if let Some(path) = secret_file {
        read_file(path, "secret file")?.trim().to_string()
    } else {
        error!("A secret is required. Set JWT_SECRET_KEY (recommended) or use --secret-file");
        return None;
    };

    if secret.len() < MIN_SECRET_LENGTH {
        error!("Secret is shorter than {MIN_SECRET_LENGTH} characters. Use a longer secret");
        return None;
    }

    Some(secret)
}

/// Build the auth configuration from the optional JSON file and flags.
/// Returns None and logs an error if anything is invalid.
pub fn load_auth_config(args: &Args) -> Option<AuthConfig> {
    let mut config = match &args.config {
        Some(path) => match serde_json::from_str::<AuthConfig>(&read_file(path, "config file")?) {
            Ok(config) => config,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Invalid config file");
                return None;
            }
        },
        None => AuthConfig::default(),
    };

    if !args.locations.is_empty() {
        config.token_location = args.locations.clone();
    }
    if let Some(algorithm) = &args.algorithm {
        config.algorithm = algorithm.clone();
    }
    if args.insecure_cookies {
        config.cookie_secure = false;
    }

    let symmetric = match config.is_algorithm_symmetric() {
        Ok(symmetric) => symmetric,
        Err(e) => {
            error!(error = %e, "Invalid algorithm");
            return None;
        }
    };
    if symmetric {
        if config.secret_key.is_none() {
            config.secret_key = Some(load_secret(args.secret_file.as_ref())?);
        }
    } else {
        if let Some(path) = &args.private_key_file {
            config.private_key = Some(read_file(path, "private key")?);
        }
        if let Some(path) = &args.public_key_file {
            config.public_key = Some(read_file(path, "public key")?);
        }
        if config.private_key.is_none() || config.public_key.is_none() {
            error!(
                algorithm = %config.algorithm,
                "Asymmetric algorithms need --private-key-file and --public-key-file"
            );
            return None;
        }
    }

    Some(config)
}

/// Demo accounts from the command line.
pub fn load_users(args: &Args) -> UserTable {
    let users: UserTable = args.users.iter().cloned().collect();
    if users.is_empty() {
        warn!("No --user given, every login will fail");
    }
    users
}
