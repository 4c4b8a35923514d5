//! Layered configuration for fixity.
//!
//! Values are merged from, in increasing priority:
//! 1. built-in defaults (in-memory cache, 24 hour TTL),
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension). When
//!    no file is named explicitly, `config.toml` in the platform config
//!    directory is used if it exists,
//! 3. environment variables prefixed with `FIXITY_`, nested keys separated by
//!    a double underscore (`FIXITY_CACHE__BACKEND=sqlite`).
//!
//! ```toml
//! ttl_hours = 24
//!
//! [cache]
//! backend = "sqlite"
//! path = "/var/lib/fixity"
//! name = "fixity.db"
//! ```

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use fixity_cache::{BackendConfig, StoreHandle, Ttl};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const ENV_PREFIX: &str = "FIXITY_";
const DEFAULT_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Hours a freshly computed digest is trusted for.
    pub ttl_hours: u32,
    pub cache: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ttl_hours: Ttl::DEFAULT_HOURS,
            cache: BackendConfig::default(),
        }
    }
}

impl Config {
    /// The merged providers, before extraction.
    ///
    /// Exposed so callers can layer their own providers on top (e.g. CLI flags).
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file.map(Path::to_path_buf).or_else(default_file) {
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => figment.merge(Toml::file(file)),
            };
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate the configuration.
    ///
    /// A file that is named explicitly must exist.
    #[instrument(skip_all, fields(file = ?file))]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        if let Some(file) = file
            && !file.is_file()
        {
            exn::bail!(ErrorKind::Invalid(format!("config file not found: {}", file.display())));
        }
        let config: Self = Self::figment(file).extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(?config, "Loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl_hours == 0 {
            exn::bail!(ErrorKind::Invalid("ttl_hours must be greater than zero".to_string()));
        }
        match &self.cache {
            BackendConfig::Memory => {},
            BackendConfig::Sqlite(sqlite) => {
                if sqlite.name.is_empty() {
                    exn::bail!(ErrorKind::Invalid("cache.name must not be empty".to_string()));
                }
            },
            BackendConfig::Postgres(postgres) => {
                for (field, value) in [("host", &postgres.host), ("dbname", &postgres.dbname), ("user", &postgres.user)] {
                    if value.is_empty() {
                        exn::bail!(ErrorKind::Invalid(format!("cache.{field} must not be empty")));
                    }
                }
            },
        }
        Ok(())
    }

    pub fn ttl(&self) -> Ttl {
        Ttl::hours(self.ttl_hours)
    }

    /// Construct the configured cache backend.
    pub async fn connect(&self) -> Result<StoreHandle> {
        fixity_cache::connect(&self.cache, self.ttl()).await.or_raise(|| ErrorKind::Cache)
    }
}

/// `config.toml` in the platform config directory, if there is one.
fn default_file() -> Option<PathBuf> {
    ProjectDirs::from("", "", "fixity")
        .map(|dirs| dirs.config_dir().join(DEFAULT_FILE_NAME))
        .filter(|path| path.is_file())
}
