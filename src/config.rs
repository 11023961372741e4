//! Query configuration.
//!
//! Values come from, in order of precedence: command line flags (which fall
//! back to `PKGQUERY_*` environment variables), the global
//! `<config_dir>/pkgquery/config.json`, and built-in defaults.

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::repository::RemoteRepositoryConfig;
use crate::runtime::Runtime;
use crate::version::Stability;

pub const DEFAULT_REPOSITORY_URL: &str = "https://repo.packagist.org";
pub const CONFIG_DIR_NAME: &str = "pkgquery";
pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Default, Deserialize)]
struct GlobalConfig {
    #[serde(default, rename = "default-repositories")]
    default_repositories: Option<Vec<RemoteRepositoryConfig>>,
    #[serde(default, rename = "minimum-stability")]
    minimum_stability: Option<Stability>,
}

/// Values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project_dir: Option<PathBuf>,
    pub root_dir: Option<PathBuf>,
    pub repo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the project's `composer.json`.
    pub project_dir: PathBuf,
    /// Directory of the parent installation, used by root-manifest queries.
    pub root_dir: PathBuf,
    /// Remote repositories used when the manifest does not disable them.
    pub default_repositories: Vec<RemoteRepositoryConfig>,
    pub minimum_stability: Stability,
}

impl Config {
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, overrides: ConfigOverrides) -> Result<Self> {
        let cwd = runtime.current_dir()?;
        let global = Self::load_global(runtime)?;

        let project_dir = absolute(&cwd, overrides.project_dir.unwrap_or_else(|| cwd.clone()));
        let root_dir = overrides
            .root_dir
            .map(|dir| absolute(&cwd, dir))
            .unwrap_or_else(|| project_dir.clone());

        let default_repositories = match (overrides.repo_url, global.default_repositories) {
            (Some(url), _) => vec![RemoteRepositoryConfig::new(&url).lazy_listing(true)],
            (None, Some(repositories)) => repositories,
            (None, None) => Self::builtin_repositories(),
        };

        let config = Self {
            project_dir,
            root_dir,
            default_repositories,
            minimum_stability: global.minimum_stability.unwrap_or_default(),
        };
        debug!("Using configuration {:?}", config);
        Ok(config)
    }

    pub fn builtin_repositories() -> Vec<RemoteRepositoryConfig> {
        vec![RemoteRepositoryConfig::new(DEFAULT_REPOSITORY_URL).lazy_listing(true)]
    }

    fn load_global<R: Runtime + ?Sized>(runtime: &R) -> Result<GlobalConfig> {
        let Some(path) = runtime
            .config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE))
        else {
            return Ok(GlobalConfig::default());
        };
        if !runtime.exists(&path) {
            return Ok(GlobalConfig::default());
        }

        debug!("Reading global configuration from {:?}", path);
        let content = runtime.read_to_string(&path)?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse global configuration {:?}", path))
    }
}

fn absolute(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
