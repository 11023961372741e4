//! The "show package" query.
//!
//! [`ShowPackage`] picks the repositories of a [`Scope`], materializes them
//! (reading local files and fetching remote indexes) and then answers either
//! a targeted lookup or a full listing with [`find_package`] or
//! [`list_packages`].

mod resolve;

use anyhow::{Result, bail};
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::Config;
use crate::http::MetadataFetcher;
use crate::manifest::{RepositorySource, RootManifest};
use crate::package::{PackageRecord, into_records};
use crate::policy::DefaultPolicy;
use crate::repository::{
    ArrayRepository, ComposerRepository, CompositeRepository, InstalledRepository,
    PlatformRepository, Repository, RepositoryKind,
};
use crate::runtime::Runtime;
use crate::version::VersionConstraint;

pub use resolve::{build_pool, find_package, list_packages};

/// Which repositories a query looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scope {
    /// The project's own package.
    SelfPackage,
    Platform,
    Installed,
    Available,
    /// Installed and platform packages, then every remote repository.
    #[default]
    Default,
}

impl FromStr for Scope {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "self" => Ok(Scope::SelfPackage),
            "platform" => Ok(Scope::Platform),
            "installed" => Ok(Scope::Installed),
            "available" => Ok(Scope::Available),
            "default" | "" => Ok(Scope::Default),
            _ => bail!(
                "Unknown scope: {}. Expected self, platform, installed, available or default.",
                s
            ),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::SelfPackage => "self",
            Scope::Platform => "platform",
            Scope::Installed => "installed",
            Scope::Available => "available",
            Scope::Default => "default",
        };
        write!(f, "{}", s)
    }
}

/// One package of a query result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryEntry {
    /// `None` for names listed without metadata.
    pub package: Option<Arc<PackageRecord>>,
    /// Pretty version to normalized version.
    pub versions: BTreeMap<String, String>,
}

impl QueryEntry {
    pub(crate) fn single(package: Arc<PackageRecord>) -> Self {
        let versions = BTreeMap::from([(
            package.pretty_version().to_string(),
            package.normalized_version().to_string(),
        )]);
        Self {
            package: Some(package),
            versions,
        }
    }

    pub(crate) fn name_only() -> Self {
        Self {
            package: None,
            versions: BTreeMap::new(),
        }
    }
}

/// Canonical package name to entry.
pub type QueryResult = BTreeMap<String, QueryEntry>;

/// Repositories of one scope: where the installed check looks, and the
/// full ordered set the pool is built from.
struct ScopeRepositories {
    primary: Arc<dyn Repository>,
    all: Vec<Arc<dyn Repository>>,
}

impl ScopeRepositories {
    fn single(repository: Arc<dyn Repository>) -> Self {
        Self {
            primary: Arc::clone(&repository),
            all: vec![repository],
        }
    }
}

/// Show action - finds one package or lists a scope.
pub struct ShowPackage<'a, R: Runtime + ?Sized, F: MetadataFetcher + ?Sized> {
    runtime: &'a R,
    fetcher: &'a F,
    config: &'a Config,
    policy: DefaultPolicy,
}

impl<'a, R: Runtime + ?Sized, F: MetadataFetcher + ?Sized> ShowPackage<'a, R, F> {
    pub fn new(runtime: &'a R, fetcher: &'a F, config: &'a Config) -> Self {
        Self {
            runtime,
            fetcher,
            config,
            policy: DefaultPolicy::default(),
        }
    }

    /// Rank more stable releases first when choosing a version.
    pub fn prefer_stable(mut self, enabled: bool) -> Self {
        self.policy.prefer_stable = enabled;
        self
    }

    /// Choose the lowest matching version instead of the highest.
    pub fn prefer_lowest(mut self, enabled: bool) -> Self {
        self.policy.prefer_lowest = enabled;
        self
    }

    /// Run the query.
    ///
    /// With a `name`, returns at most one entry; an empty `version` counts
    /// as no version. Without a name, lists the whole scope. When
    /// `use_root_manifest` is set, the manifest is read from the configured
    /// root directory instead of the project directory.
    #[tracing::instrument(skip(self))]
    pub async fn execute(
        &self,
        scope: Scope,
        name: Option<&str>,
        version: Option<&str>,
        use_root_manifest: bool,
    ) -> Result<QueryResult> {
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let version = version.map(str::trim).filter(|v| !v.is_empty());
        let constraint = version.map(VersionConstraint::parse).transpose()?;

        let dir = if use_root_manifest {
            &self.config.root_dir
        } else {
            &self.config.project_dir
        };
        let manifest = match RootManifest::find(self.runtime, dir)? {
            Some(manifest) => manifest,
            None => {
                debug!("No manifest in {:?}, using defaults", dir);
                RootManifest::empty(dir)
            }
        };

        info!("Querying {} scope", scope);
        let repositories = self.repositories(scope, &manifest, name).await?;

        match name {
            Some(name) => {
                let minimum_stability = manifest
                    .minimum_stability
                    .unwrap_or(self.config.minimum_stability);
                let pool = build_pool(&repositories.all, minimum_stability);
                debug!("Pool holds {} package(s)", pool.len());
                find_package(
                    repositories.primary.as_ref(),
                    &pool,
                    name,
                    constraint.as_ref(),
                    &self.policy,
                )
            }
            None => Ok(list_packages(scope, &repositories.all)),
        }
    }

    async fn repositories(
        &self,
        scope: Scope,
        manifest: &RootManifest,
        name: Option<&str>,
    ) -> Result<ScopeRepositories> {
        let platform = || -> Arc<dyn Repository> {
            Arc::new(PlatformRepository::detect(manifest.platform_overrides()))
        };

        let repositories = match scope {
            Scope::SelfPackage => {
                ScopeRepositories::single(Arc::new(ArrayRepository::root(manifest.root_package()?)))
            }
            Scope::Platform => ScopeRepositories::single(platform()),
            Scope::Installed => ScopeRepositories::single(self.installed(manifest)?),
            Scope::Available => ScopeRepositories {
                primary: platform(),
                all: self.remotes(manifest, name, false).await?,
            },
            Scope::Default => {
                let local: Arc<dyn Repository> = Arc::new(CompositeRepository::new(vec![
                    self.installed(manifest)?,
                    platform(),
                ]));
                let mut all = vec![Arc::clone(&local)];
                all.extend(self.remotes(manifest, name, true).await?);
                ScopeRepositories {
                    primary: local,
                    all,
                }
            }
        };
        Ok(repositories)
    }

    fn installed(&self, manifest: &RootManifest) -> Result<Arc<dyn Repository>> {
        let repository = InstalledRepository::load(self.runtime, &manifest.installed_path())?;
        Ok(Arc::new(repository))
    }

    /// Materialize the configured remote repositories in declaration order.
    ///
    /// A targeted query loads only `name`'s metadata. A listing loads every
    /// lazily available package unless the repository may list names only
    /// and `full_listing` is off.
    async fn remotes(
        &self,
        manifest: &RootManifest,
        name: Option<&str>,
        full_listing: bool,
    ) -> Result<Vec<Arc<dyn Repository>>> {
        let mut repositories: Vec<Arc<dyn Repository>> = Vec::new();

        for source in manifest.repository_sources(&self.config.default_repositories) {
            match source {
                RepositorySource::Inline(entries) => {
                    let packages = into_records(entries, "package repository");
                    repositories.push(Arc::new(ArrayRepository::new(
                        RepositoryKind::Remote,
                        "package repository",
                        packages,
                    )));
                }
                RepositorySource::Composer(config) => {
                    let mut repository = ComposerRepository::fetch(self.fetcher, config).await?;
                    match name {
                        Some(name) => {
                            repository.load_package(self.fetcher, name).await?;
                        }
                        None if full_listing || !repository.config().lazy_listing => {
                            repository.load_all(self.fetcher).await?;
                        }
                        None => {}
                    }
                    repositories.push(Arc::new(repository));
                }
            }
        }

        Ok(repositories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockMetadataFetcher;
    use crate::repository::RemoteRepositoryConfig;
    use crate::runtime::MockRuntime;
    use crate::test_utils::{configure_mock_runtime_basics, test_project_dir};
    use crate::version::{ConstraintError, Stability};
    use mockall::predicate::eq;
    use serde_json::json;
    use std::path::PathBuf;

    const REPO: &str = "https://repo.example.org";

    fn config() -> Config {
        Config {
            project_dir: test_project_dir(),
            root_dir: PathBuf::from("/srv/root"),
            default_repositories: vec![RemoteRepositoryConfig::new(REPO).lazy_listing(true)],
            minimum_stability: Stability::Dev,
        }
    }

    fn manifest_path() -> PathBuf {
        test_project_dir().join("composer.json")
    }

    fn installed_path() -> PathBuf {
        test_project_dir()
            .join("vendor")
            .join("composer")
            .join("installed.json")
    }

    /// Project with a manifest and `acme/widget` 1.5 installed.
    fn project_runtime(manifest: &'static str) -> MockRuntime {
        let mut runtime = MockRuntime::new();
        configure_mock_runtime_basics(&mut runtime);
        runtime
            .expect_exists()
            .with(eq(manifest_path()))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(manifest_path()))
            .returning(move |_| Ok(manifest.to_string()));
        runtime
            .expect_exists()
            .with(eq(installed_path()))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(installed_path()))
            .returning(|_| {
                Ok(r#"[{"name": "acme/widget", "version": "1.5.0", "version_normalized": "1.5.0.0"}]"#
                    .to_string())
            });
        runtime
    }

    /// Remote repository with `acme/widget` 1.0, 2.0 and a replacer.
    fn remote_fetcher() -> MockMetadataFetcher {
        let mut fetcher = MockMetadataFetcher::new();
        fetcher
            .expect_fetch_json()
            .with(eq("https://repo.example.org/packages.json"))
            .returning(|_| {
                Ok(Some(json!({
                    "metadata-url": "/p2/%package%.json",
                    "available-packages": ["acme/widget", "acme/gadget"]
                })))
            });
        fetcher
            .expect_fetch_json()
            .with(eq("https://repo.example.org/p2/acme/widget.json"))
            .returning(|_| {
                Ok(Some(json!({
                    "packages": {"acme/widget": [
                        {"name": "acme/widget", "version": "2.0.0", "version_normalized": "2.0.0.0"},
                        {"name": "acme/widget", "version": "1.0.0", "version_normalized": "1.0.0.0"}
                    ]}
                })))
            });
        fetcher
            .expect_fetch_json()
            .with(eq("https://repo.example.org/p2/acme/gadget.json"))
            .returning(|_| {
                Ok(Some(json!({
                    "packages": {"acme/gadget": [
                        {"name": "acme/gadget", "version": "3.0.0", "replace": {"acme/widget": "*"}}
                    ]}
                })))
            });
        fetcher
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("self".parse::<Scope>().unwrap(), Scope::SelfPackage);
        assert_eq!("Platform".parse::<Scope>().unwrap(), Scope::Platform);
        assert_eq!("installed".parse::<Scope>().unwrap(), Scope::Installed);
        assert_eq!("available".parse::<Scope>().unwrap(), Scope::Available);
        assert_eq!("".parse::<Scope>().unwrap(), Scope::Default);
        assert!("everything".parse::<Scope>().is_err());
        assert_eq!(Scope::SelfPackage.to_string(), "self");
    }

    #[tokio::test]
    async fn test_default_scope_prefers_installed() {
        let runtime = project_runtime(r#"{"name": "acme/app"}"#);
        let fetcher = remote_fetcher();
        let config = config();

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Default, Some("acme/widget"), None, false)
            .await
            .unwrap();

        let entry = &result["acme/widget"];
        assert_eq!(entry.package.as_ref().unwrap().pretty_version(), "1.5.0");
        assert_eq!(
            entry.versions.keys().collect::<Vec<_>>(),
            vec!["1.0.0", "1.5.0", "2.0.0"]
        );
    }

    #[tokio::test]
    async fn test_default_scope_with_constraint() {
        let runtime = project_runtime(r#"{"name": "acme/app"}"#);
        let fetcher = remote_fetcher();
        let config = config();

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Default, Some("acme/widget"), Some("^1.0"), false)
            .await
            .unwrap();

        let entry = &result["acme/widget"];
        assert_eq!(entry.package.as_ref().unwrap().pretty_version(), "1.5.0");
        assert_eq!(entry.versions.keys().collect::<Vec<_>>(), vec!["1.0.0", "1.5.0"]);

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .prefer_lowest(true)
            .execute(Scope::Default, Some("acme/widget"), Some("^1.0"), false)
            .await
            .unwrap();
        assert_eq!(
            result["acme/widget"].package.as_ref().unwrap().pretty_version(),
            "1.0.0"
        );
    }

    #[tokio::test]
    async fn test_invalid_constraint_fails_before_any_io() {
        let runtime = MockRuntime::new();
        let fetcher = MockMetadataFetcher::new();
        let config = config();

        let err = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Default, Some("acme/widget"), Some("???"), false)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<ConstraintError>(),
            Some(ConstraintError::InvalidConstraintExpression { .. })
        ));
    }

    #[tokio::test]
    async fn test_self_scope() {
        let runtime = project_runtime(r#"{"name": "Acme/App", "version": "3.2.1"}"#);
        let fetcher = MockMetadataFetcher::new();
        let config = config();
        let show = ShowPackage::new(&runtime, &fetcher, &config);

        let listed = show.execute(Scope::SelfPackage, None, None, false).await.unwrap();
        assert_eq!(listed.keys().collect::<Vec<_>>(), vec!["acme/app"]);

        let found = show
            .execute(Scope::SelfPackage, Some("acme/app"), None, false)
            .await
            .unwrap();
        assert_eq!(
            found["acme/app"].package.as_ref().unwrap().normalized_version(),
            "3.2.1.0"
        );

        let missing = show
            .execute(Scope::SelfPackage, Some("acme/widget"), None, false)
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_root_manifest_is_read_from_root_dir() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(PathBuf::from("/srv/root/composer.json")))
            .returning(|_| true);
        runtime
            .expect_read_to_string()
            .with(eq(PathBuf::from("/srv/root/composer.json")))
            .returning(|_| Ok(r#"{"name": "acme/site"}"#.to_string()));
        let fetcher = MockMetadataFetcher::new();
        let config = config();

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::SelfPackage, None, None, true)
            .await
            .unwrap();
        assert!(result.contains_key("acme/site"));
    }

    #[tokio::test]
    async fn test_installed_scope_listing() {
        let runtime = project_runtime("{}");
        let fetcher = MockMetadataFetcher::new();
        let config = config();

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Installed, None, None, false)
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result["acme/widget"].versions["1.5.0"], "1.5.0.0");
    }

    #[tokio::test]
    async fn test_platform_scope() {
        let runtime = project_runtime(r#"{"config": {"platform": {"php": "8.2.1"}}}"#);
        let fetcher = MockMetadataFetcher::new();
        let config = config();

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Platform, Some("php"), None, false)
            .await
            .unwrap();
        assert_eq!(result["php"].package.as_ref().unwrap().pretty_version(), "8.2.1");
    }

    #[tokio::test]
    async fn test_available_listing_uses_names_for_lazy_repositories() {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_exists()
            .with(eq(manifest_path()))
            .returning(|_| false);
        let mut fetcher = MockMetadataFetcher::new();
        fetcher
            .expect_fetch_json()
            .with(eq("https://repo.example.org/packages.json"))
            .times(1)
            .returning(|_| {
                Ok(Some(json!({
                    "metadata-url": "/p2/%package%.json",
                    "available-packages": ["acme/widget", "acme/gadget"]
                })))
            });
        let config = config();

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Available, None, None, false)
            .await
            .unwrap();

        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["acme/gadget", "acme/widget"]);
        assert!(result.values().all(|entry| entry.package.is_none()));
    }

    #[tokio::test]
    async fn test_default_listing_loads_full_metadata() {
        let runtime = project_runtime("{}");
        let fetcher = remote_fetcher();
        let config = config();

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Default, None, None, false)
            .await
            .unwrap();

        assert_eq!(
            result["acme/widget"].package.as_ref().unwrap().pretty_version(),
            "2.0.0"
        );
        assert_eq!(
            result["acme/gadget"].package.as_ref().unwrap().pretty_version(),
            "3.0.0"
        );
        assert!(result.contains_key(crate::repository::ENGINE_PACKAGE));
    }

    #[tokio::test]
    async fn test_available_scope_with_inline_repository() {
        let runtime = project_runtime(
            r#"{"repositories": [
                {"packagist.org": false},
                {"type": "package", "package": [
                    {"name": "acme/inline", "version": "1.0.0"},
                    {"name": "acme/inline", "version": "1.1.0"}
                ]}
            ]}"#,
        );
        let fetcher = MockMetadataFetcher::new();
        let config = config();

        let result = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Available, Some("acme/inline"), Some(""), false)
            .await
            .unwrap();

        assert_eq!(
            result["acme/inline"].package.as_ref().unwrap().pretty_version(),
            "1.1.0"
        );
    }

    #[tokio::test]
    async fn test_remote_failure_propagates() {
        let runtime = project_runtime("{}");
        let mut fetcher = MockMetadataFetcher::new();
        fetcher
            .expect_fetch_json()
            .returning(|_| Err(anyhow::anyhow!("connection refused")));
        let config = config();

        let err = ShowPackage::new(&runtime, &fetcher, &config)
            .execute(Scope::Default, Some("acme/widget"), None, false)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }
}
