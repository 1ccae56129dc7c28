use anyhow::{Context, Result};
use clap::Parser;
use std::env;

const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    /// Prefix of the URLs returned for uploaded files.
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    /// Storage provider setting to write at startup, if any.
    pub oss_setting: Option<String>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Media upload service")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_UPLOAD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_UPLOAD_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory the local backend writes objects to (overrides MEDIA_UPLOAD_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides MEDIA_UPLOAD_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Public URL prefix for stored files (overrides MEDIA_UPLOAD_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Maximum upload request size in bytes (overrides MEDIA_UPLOAD_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Storage provider setting value to store at startup (overrides MEDIA_UPLOAD_OSS_SETTING)
    #[arg(long)]
    pub oss_setting: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::from_args(Args::parse())
    }

    fn from_args(args: Args) -> Result<(Self, bool)> {
        let env_host = env::var("MEDIA_UPLOAD_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("MEDIA_UPLOAD_PORT", 3000u16)?;
        let env_storage =
            env::var("MEDIA_UPLOAD_STORAGE_DIR").unwrap_or_else(|_| "./data/uploads".into());
        let env_db = env::var("MEDIA_UPLOAD_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/media_upload.db".into());
        let env_max = parse_env("MEDIA_UPLOAD_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        let host = args.host.unwrap_or(env_host);
        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or_else(|| env::var("MEDIA_UPLOAD_PUBLIC_BASE_URL").ok())
            .unwrap_or_else(|| format!("http://localhost:{}/files", port));

        let cfg = Self {
            host,
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max),
            oss_setting: args
                .oss_setting
                .or_else(|| env::var("MEDIA_UPLOAD_OSS_SETTING").ok()),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
