use anyhow::Result;
use clap::Parser;
use pkgquery::commands::{OutputFormat, ShowOptions, show};
use pkgquery::config::ConfigOverrides;
use pkgquery::query::Scope;
use std::path::PathBuf;

/// pkgquery - Composer package query tool
///
/// Look up one package across the project's repositories, or list every
/// package of a repository scope.
///
/// If the PKGQUERY_TOKEN environment variable is set, it is sent as a bearer
/// token to remote repositories.
///
/// Examples:
///   pkgquery show monolog/monolog           # Best match, installed version first
///   pkgquery show monolog/monolog '^2.0'    # Best match within a constraint
///   pkgquery show --scope installed         # List installed packages
#[derive(Parser, Debug)]
#[command(author, version = env!("PKGQUERY_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory holding composer.json (also via PKGQUERY_PROJECT_DIR)
    #[arg(
        long = "working-dir",
        short = 'd',
        env = "PKGQUERY_PROJECT_DIR",
        value_name = "PATH",
        global = true
    )]
    pub project_dir: Option<PathBuf>,

    /// Root installation directory used with --root (also via PKGQUERY_ROOT_DIR)
    #[arg(
        long = "root-dir",
        env = "PKGQUERY_ROOT_DIR",
        value_name = "PATH",
        global = true
    )]
    pub root_dir: Option<PathBuf>,

    /// Repository replacing the default ones (also via PKGQUERY_REPO_URL)
    #[arg(
        long = "repo-url",
        env = "PKGQUERY_REPO_URL",
        value_name = "URL",
        global = true
    )]
    pub repo_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Show a package, or list the packages of a scope
    Show(ShowArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Package name; lists the whole scope when omitted
    #[arg(value_name = "NAME")]
    pub name: Option<String>,

    /// Version constraint, e.g. "^2.0" or ">=1.0 <1.5"
    #[arg(value_name = "VERSION")]
    pub version: Option<String>,

    /// Repositories to look at: self, platform, installed, available or default
    #[arg(long, default_value = "default")]
    pub scope: Scope,

    /// Read composer.json from the root installation directory
    #[arg(long)]
    pub root: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Rank stable releases above newer unstable ones
    #[arg(long)]
    pub prefer_stable: bool,

    /// Choose the lowest matching version
    #[arg(long)]
    pub prefer_lowest: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = pkgquery::runtime::RealRuntime;

    let overrides = ConfigOverrides {
        project_dir: cli.project_dir,
        root_dir: cli.root_dir,
        repo_url: cli.repo_url,
    };

    match cli.command {
        Commands::Show(args) => {
            let options = ShowOptions {
                scope: args.scope,
                name: args.name,
                version: args.version,
                use_root_manifest: args.root,
                prefer_stable: args.prefer_stable,
                prefer_lowest: args.prefer_lowest,
                format: if args.json {
                    OutputFormat::Json
                } else {
                    OutputFormat::Text
                },
            };
            show(runtime, options, overrides).await?
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_show_parsing() {
        let cli = Cli::try_parse_from(["pkgquery", "show", "acme/widget", "^2.0"]).unwrap();
        let Commands::Show(args) = cli.command;
        assert_eq!(args.name.as_deref(), Some("acme/widget"));
        assert_eq!(args.version.as_deref(), Some("^2.0"));
        assert_eq!(args.scope, Scope::Default);
        assert!(!args.root);
        assert!(!args.json);
    }

    #[test]
    fn test_cli_show_listing() {
        let cli = Cli::try_parse_from(["pkgquery", "show", "--scope", "installed"]).unwrap();
        let Commands::Show(args) = cli.command;
        assert_eq!(args.name, None);
        assert_eq!(args.scope, Scope::Installed);
    }

    #[test]
    fn test_cli_show_flags() {
        let cli = Cli::try_parse_from([
            "pkgquery",
            "show",
            "acme/widget",
            "--root",
            "--json",
            "--prefer-stable",
            "--prefer-lowest",
        ])
        .unwrap();
        let Commands::Show(args) = cli.command;
        assert!(args.root);
        assert!(args.json);
        assert!(args.prefer_stable);
        assert!(args.prefer_lowest);
    }

    #[test]
    fn test_cli_global_dirs() {
        let cli = Cli::try_parse_from([
            "pkgquery",
            "-d",
            "/srv/app",
            "show",
            "--root-dir",
            "/srv",
            "--repo-url",
            "http://localhost:8080",
        ])
        .unwrap();
        assert_eq!(cli.project_dir, Some(PathBuf::from("/srv/app")));
        assert_eq!(cli.root_dir, Some(PathBuf::from("/srv")));
        assert_eq!(cli.repo_url.as_deref(), Some("http://localhost:8080"));
    }

    #[test]
    fn test_cli_invalid_scope_fails() {
        let result = Cli::try_parse_from(["pkgquery", "show", "--scope", "everything"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_no_subcommand_fails() {
        let result = Cli::try_parse_from(["pkgquery", "acme/widget"]);
        assert!(result.is_err());
    }
}
