//! Server configuration loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Postgres connection string. Env: `DATABASE_URL` (required).
    pub database_url: String,

    /// Socket address for the HTTP server. Env: `BIND_ADDR`, default `0.0.0.0:3000`.
    pub bind_addr: SocketAddr,

    /// Public base URL, used for the Steam OpenID redirect.
    /// Env: `PUBLIC_URL`, default `http://localhost:3000`.
    pub public_url: String,

    /// Steam Web API key for profile lookups after login. Env: `STEAM_API_KEY`.
    pub steam_api_key: Option<String>,

    /// Demo storage settings. `None` when demo storage is disabled entirely,
    /// in which case uploads are rejected and bulk deletes never enqueue
    /// object removals.
    pub demos: Option<DemoConfig>,
}

#[derive(Debug, Clone)]
pub struct DemoConfig {
    /// Object key prefix for stored demos. Env: `DEMO_PATHWAY`, default `demos`.
    pub pathway: String,

    /// Pacing delay between received body chunks. Env: `DEMO_UPLOAD_DELAY_MS`,
    /// default 1ms.
    pub upload_delay: Duration,

    /// Ceiling on the accumulated demo size in bytes. Uploads past this are
    /// cancelled. Env: `DEMO_MAX_UPLOAD_SIZE`, default 100MB.
    pub max_upload_size: u64,

    pub backend: DemoBackend,
}

#[derive(Debug, Clone)]
pub enum DemoBackend {
    /// S3-compatible bucket. Credentials come from the usual AWS env vars.
    /// Env: `DEMO_BUCKET`, `DEMO_REGION` (default `us-east-1`),
    /// `DEMO_ENDPOINT` (optional, forces a custom region).
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
    },
    /// Local folder, intended for development. Env: `DEMO_FOLDER`.
    File { folder: PathBuf },
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("'DATABASE_URL' must be set");

        let bind_addr = match std::env::var("BIND_ADDR") {
            Ok(raw) => match raw.parse::<SocketAddr>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    tracing::warn!(value = %raw, "Invalid BIND_ADDR, using default");
                    default_bind_addr()
                }
            },
            Err(_) => default_bind_addr(),
        };

        let public_url = std::env::var("PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let steam_api_key = std::env::var("STEAM_API_KEY").ok().filter(|k| !k.is_empty());

        Self {
            database_url,
            bind_addr,
            public_url,
            steam_api_key,
            demos: DemoConfig::from_env(),
        }
    }
}

impl DemoConfig {
    fn from_env() -> Option<Self> {
        let backend = match std::env::var("DEMO_STORAGE").as_deref() {
            Ok("s3") => DemoBackend::S3 {
                bucket: std::env::var("DEMO_BUCKET").expect("'DEMO_BUCKET' must be set"),
                region: std::env::var("DEMO_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                endpoint: std::env::var("DEMO_ENDPOINT").ok(),
            },
            Ok("file") => DemoBackend::File {
                folder: std::env::var("DEMO_FOLDER")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("demos/")),
            },
            Ok(other) => {
                tracing::warn!(value = %other, "Unknown DEMO_STORAGE, demo storage disabled");
                return None;
            }
            Err(_) => return None,
        };

        Some(Self {
            pathway: std::env::var("DEMO_PATHWAY").unwrap_or_else(|_| "demos".to_string()),
            upload_delay: Duration::from_millis(env_u64("DEMO_UPLOAD_DELAY_MS", 1)),
            max_upload_size: env_u64("DEMO_MAX_UPLOAD_SIZE", 100_000_000),
            backend,
        })
    }
}

fn default_bind_addr() -> SocketAddr {
    ([0, 0, 0, 0], 3000).into()
}

fn env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(raw) => match raw.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!(variable = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}
