use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fjall::Keyspace;
use secrecy::SecretString;
use serde::Deserialize;

use crate::http::auth::Verifier;
use crate::json_ld::ContextResolver;
use crate::service::DocumentService;
use crate::store::DocumentRepo;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct Config {
    pub(crate) data_dir: PathBuf,
    pub(crate) server: ServerConfig,
    pub(crate) gc: GcConfig,
    pub(crate) json_ld: JsonLdConfig,
    pub(crate) auth: AuthConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct ServerConfig {
    pub(crate) http_port: u16,
    pub(crate) base_url: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct GcConfig {
    /// Seconds between sweeps; zero or negative disables collection.
    pub(crate) interval_secs: i64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct JsonLdConfig {
    /// Bound on each remote context fetch, in seconds.
    pub(crate) fetch_timeout_secs: u64,
    /// How long a fetched context body stays fresh, in seconds.
    pub(crate) context_cache_secs: u64,
}

#[derive(Clone, Default, Debug, Deserialize)]
#[serde(default)]
pub(crate) struct AuthConfig {
    /// Identity provider endpoint; presence enables token verification.
    pub(crate) verify_url: Option<String>,
    pub(crate) credential: Option<SecretString>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
            server: ServerConfig::default(),
            gc: GcConfig::default(),
            json_ld: JsonLdConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8710,
            base_url: "http://localhost:8710".to_owned(),
        }
    }
}

impl Default for GcConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

impl Default for JsonLdConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: 7,
            context_cache_secs: 300,
        }
    }
}

impl Config {
    pub(crate) fn load(path: Option<&Path>) -> Result<Config> {
        let Some(path) = path else {
            return Ok(Config::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("unable to parse config file {}", path.display()))
    }
}

/// Everything the running process shares: parsed configuration, the opened
/// keyspace, and the service wired on top of it.
#[derive(Clone)]
pub(crate) struct RuntimeConfig {
    pub(crate) init: Config,
    pub(crate) keyspace: Keyspace,
    pub(crate) repo: DocumentRepo,
    pub(crate) service: DocumentService,
    pub(crate) verifier: Verifier,
}

impl RuntimeConfig {
    pub(crate) fn new(init: Config, keyspace: Keyspace) -> Result<RuntimeConfig> {
        let repo = DocumentRepo::new(keyspace.clone())?;
        let resolver = ContextResolver::new(
            Duration::from_secs(init.json_ld.fetch_timeout_secs),
            Duration::from_secs(init.json_ld.context_cache_secs),
        );
        let service = DocumentService::new(repo.clone(), resolver);
        let verifier = Verifier::from_config(&init.auth);
        Ok(RuntimeConfig {
            init,
            keyspace,
            repo,
            service,
            verifier,
        })
    }
}
