use anyhow::{Context, Result};
use log::{debug, info};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{Repository, RepositoryKind};
use crate::package::{PackageData, PackageRecord, into_records};
use crate::runtime::Runtime;

/// Both layouts of `installed.json`.
#[derive(Deserialize)]
#[serde(untagged)]
enum InstalledFile {
    Wrapped { packages: Vec<PackageData> },
    List(Vec<PackageData>),
}

/// Packages installed into the project's vendor directory.
#[derive(Debug, Clone)]
pub struct InstalledRepository {
    path: PathBuf,
    packages: Vec<Arc<PackageRecord>>,
}

impl InstalledRepository {
    /// Load `installed.json`. A missing file is an empty repository.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Self> {
        if !runtime.exists(path) {
            debug!("No installed packages file at {:?}", path);
            return Ok(Self {
                path: path.to_path_buf(),
                packages: Vec::new(),
            });
        }

        let content = runtime.read_to_string(path)?;
        let file: InstalledFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse installed packages from {:?}", path))?;
        let entries = match file {
            InstalledFile::Wrapped { packages } => packages,
            InstalledFile::List(packages) => packages,
        };

        let packages = into_records(entries, &path.display().to_string());
        info!("Loaded {} installed package(s) from {:?}", packages.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            packages,
        })
    }
}

impl Repository for InstalledRepository {
    fn kind(&self) -> RepositoryKind {
        RepositoryKind::Installed
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn packages(&self) -> Vec<Arc<PackageRecord>> {
        self.packages.clone()
    }
}
