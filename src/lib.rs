pub mod commands;
pub mod config;
pub mod http;
pub mod manifest;
pub mod package;
pub mod policy;
pub mod pool;
pub mod query;
pub mod repository;
pub mod runtime;
pub mod version;

/// Test utilities for cross-platform path handling.
#[cfg(test)]
pub mod test_utils {
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;
    use std::path::PathBuf;

    /// Returns the test project directory based on the platform.
    /// - Unix: `/home/user/project`
    /// - Windows: `C:\Users\user\project`
    pub fn test_project_dir() -> PathBuf {
        #[cfg(not(windows))]
        {
            PathBuf::from("/home/user/project")
        }
        #[cfg(windows)]
        {
            PathBuf::from(r"C:\Users\user\project")
        }
    }

    /// Returns the test configuration directory based on the platform.
    /// - Unix: `/home/user/.config`
    /// - Windows: `C:\Users\user\AppData\Roaming`
    pub fn test_config_dir() -> PathBuf {
        #[cfg(not(windows))]
        {
            PathBuf::from("/home/user/.config")
        }
        #[cfg(windows)]
        {
            PathBuf::from(r"C:\Users\user\AppData\Roaming")
        }
    }

    /// Configure a mock runtime with common defaults for tests.
    /// - current_dir set to [`test_project_dir`]
    /// - config dir set to [`test_config_dir`]
    /// - PKGQUERY_TOKEN absent
    pub fn configure_mock_runtime_basics(runtime: &mut MockRuntime) {
        runtime
            .expect_current_dir()
            .returning(|| Ok(test_project_dir()));

        runtime
            .expect_config_dir()
            .returning(|| Some(test_config_dir()));

        runtime
            .expect_env_var()
            .with(eq("PKGQUERY_TOKEN"))
            .returning(|_| Err(std::env::VarError::NotPresent));
    }
}
