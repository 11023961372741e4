use anyhow::{Result, bail};
use log::debug;

use crate::config::{Config, ConfigOverrides};
use crate::http::{HttpClient, build_client};
use crate::query::{QueryEntry, QueryResult, Scope, ShowPackage};
use crate::runtime::Runtime;
use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Arguments of `pkgquery show`.
#[derive(Debug, Clone, Default)]
pub struct ShowOptions {
    pub scope: Scope,
    pub name: Option<String>,
    pub version: Option<String>,
    pub use_root_manifest: bool,
    pub prefer_stable: bool,
    pub prefer_lowest: bool,
    pub format: OutputFormat,
}

/// Show one package, or list a scope, on stdout.
#[tracing::instrument(skip(runtime, overrides))]
pub async fn show<R: Runtime>(
    runtime: R,
    options: ShowOptions,
    overrides: ConfigOverrides,
) -> Result<()> {
    let config = Config::load(&runtime, overrides)?;
    let fetcher = HttpClient::new(build_client(&runtime)?);

    let result = ShowPackage::new(&runtime, &fetcher, &config)
        .prefer_stable(options.prefer_stable)
        .prefer_lowest(options.prefer_lowest)
        .execute(
            options.scope,
            options.name.as_deref(),
            options.version.as_deref(),
            options.use_root_manifest,
        )
        .await?;
    debug!("Query returned {} entries", result.len());

    if result.is_empty() {
        if let Some(name) = options.name.as_deref() {
            match options.version.as_deref().filter(|v| !v.trim().is_empty()) {
                Some(version) => bail!("Package {} not found in version {}", name, version),
                None => bail!("Package {} not found", name),
            }
        }
    }

    match options.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print!("{}", render_text(&result, options.name.is_some())),
    }
    Ok(())
}

/// Human readable rendering.
///
/// A targeted query prints the details of its package with every known
/// version, the chosen one marked with `*`. A listing prints one line per
/// package.
pub fn render_text(result: &QueryResult, targeted: bool) -> String {
    let mut out = String::new();

    if targeted {
        for (name, entry) in result {
            render_details(&mut out, name, entry);
        }
        return out;
    }

    let width = result.keys().map(|name| name.len()).max().unwrap_or(0);
    for (name, entry) in result {
        match &entry.package {
            Some(package) => {
                let line = format!(
                    "{:width$} {} {}",
                    name,
                    package.pretty_version(),
                    package.description().unwrap_or_default(),
                    width = width
                );
                out.push_str(line.trim_end());
            }
            None => out.push_str(name),
        }
        out.push('\n');
    }
    out
}

fn render_details(out: &mut String, name: &str, entry: &QueryEntry) {
    out.push_str(&format!("name     : {}\n", name));
    let Some(package) = &entry.package else {
        return;
    };
    if let Some(description) = package.description() {
        out.push_str(&format!("descrip. : {}\n", description));
    }
    if let Some(package_type) = package.package_type() {
        out.push_str(&format!("type     : {}\n", package_type));
    }

    let mut versions: Vec<(&String, Option<Version>)> = entry
        .versions
        .iter()
        .map(|(pretty, normalized)| (pretty, Version::parse(normalized).ok()))
        .collect();
    versions.sort_by(|a, b| b.1.cmp(&a.1));
    let versions: Vec<String> = versions
        .into_iter()
        .map(|(pretty, _)| {
            if pretty == package.pretty_version() {
                format!("* {}", pretty)
            } else {
                pretty.clone()
            }
        })
        .collect();
    out.push_str(&format!("versions : {}\n", versions.join(", ")));

    for link in package.links() {
        out.push_str(&format!(
            "{:<9}: {} {}\n",
            format!("{:?}", link.kind).to_lowercase(),
            link.target,
            link.constraint
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageRecord;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn entry(package: PackageRecord, versions: &[(&str, &str)]) -> QueryEntry {
        QueryEntry {
            package: Some(Arc::new(package)),
            versions: versions
                .iter()
                .map(|(p, n)| (p.to_string(), n.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_render_details() {
        let package = PackageRecord::new("acme/widget", "1.5.0")
            .unwrap()
            .with_description("Widgets")
            .with_type("library")
            .with_replace("acme/old-widget", "self.version");
        let mut result = QueryResult::new();
        result.insert(
            "acme/widget".into(),
            entry(
                package,
                &[("1.0.0", "1.0.0.0"), ("1.5.0", "1.5.0.0"), ("2.0.0", "2.0.0.0")],
            ),
        );

        assert_eq!(
            render_text(&result, true),
            "name     : acme/widget\n\
             descrip. : Widgets\n\
             type     : library\n\
             versions : 2.0.0, * 1.5.0, 1.0.0\n\
             replace  : acme/old-widget self.version\n"
        );
    }

    #[test]
    fn test_render_listing() {
        let mut result = QueryResult::new();
        result.insert(
            "acme/widget".into(),
            entry(
                PackageRecord::new("acme/widget", "2.0.0")
                    .unwrap()
                    .with_description("Widgets"),
                &[("2.0.0", "2.0.0.0")],
            ),
        );
        result.insert(
            "psr/log".into(),
            entry(PackageRecord::new("psr/log", "3.0.0").unwrap(), &[("3.0.0", "3.0.0.0")]),
        );
        result.insert(
            "zz/lazy".into(),
            QueryEntry {
                package: None,
                versions: BTreeMap::new(),
            },
        );

        assert_eq!(
            render_text(&result, false),
            "acme/widget 2.0.0 Widgets\npsr/log     3.0.0\nzz/lazy\n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render_text(&QueryResult::new(), false), "");
        assert_eq!(render_text(&QueryResult::new(), true), "");
    }
}
