use anyhow::{Context, Result};
use clap::Args;
use console::style;
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use courier_resolver::{
    ArrayRepository, CallerInfo, InstalledUnit, Operation, PackageData, Requirements, ResolverConfig, Resolver,
    Transaction,
};

#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Site manifest (JSON) describing the catalog, installed units and registrations
    pub manifest: PathBuf,

    /// Prefer lowest versions of dependencies
    #[arg(long)]
    pub prefer_lowest: bool,

    /// Merge development requirements of every caller
    #[arg(long)]
    pub include_dev: bool,

    /// Upper bound on solver steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Minimum stability of catalog packages
    #[arg(long)]
    pub minimum_stability: Option<String>,
}

/// Everything a host knows about a site, in one document
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SiteManifest {
    /// Catalog of packages that may be installed
    pub packages: Vec<PackageData>,

    /// Units already present, keyed by directory name
    pub installed: IndexMap<String, InstalledUnit>,

    /// Vendor prefix for installed units; falls back to the configured default vendor
    pub vendor: Option<String>,

    /// Platform versions, applied over the configured ones
    pub platform: IndexMap<String, String>,

    pub registrations: Vec<RegistrationEntry>,
}

/// One caller and the requirements it registers
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RegistrationEntry {
    #[serde(flatten)]
    pub caller: CallerInfo,

    #[serde(default = "no_requirements")]
    pub requires: Requirements,

    #[serde(default)]
    pub require_dev: Option<Requirements>,
}

fn no_requirements() -> Requirements {
    Requirements::Basic(Vec::new())
}

impl SiteManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

pub fn execute(args: ResolveArgs, mut config: ResolverConfig) -> Result<i32> {
    let manifest = SiteManifest::load(&args.manifest)?;

    if args.prefer_lowest {
        config.prefer_lowest = true;
    }
    if args.include_dev {
        config.include_dev = true;
    }
    if let Some(max_steps) = args.max_steps {
        config.max_steps = max_steps;
    }
    if let Some(stability) = args.minimum_stability {
        config.minimum_stability = stability;
    }

    let resolver = build_resolver(manifest, config)?;

    log::info!("Resolving requirements of {} caller(s)", resolver.callers().count());

    match resolver.resolve() {
        Ok(transaction) => {
            print_transaction(&transaction);
            Ok(0)
        }
        Err(failure) => {
            for message in failure.remaining_messages() {
                eprintln!("{}", message);
            }
            eprintln!("{} {}", style("Error:").red().bold(), failure.first_message());
            Ok(1)
        }
    }
}

/// Build a resolver for the site and register every caller.
///
/// A rejected registration is reported and skipped; the other callers still resolve.
pub fn build_resolver(manifest: SiteManifest, mut config: ResolverConfig) -> Result<Resolver> {
    config.platform.extend(manifest.platform);

    let vendor = manifest.vendor.or_else(|| config.default_vendor.clone());

    let catalog = ArrayRepository::from_entries("catalog", manifest.packages).context("Invalid package catalog")?;

    let mut resolver = Resolver::new(config)?
        .with_repository(Arc::new(catalog))
        .with_installed_units(vendor.as_deref(), manifest.installed)?;

    for entry in manifest.registrations {
        if let Err(e) = resolver.register(&entry.caller, entry.requires) {
            eprintln!(
                "{} {} requirements ignored: {}",
                style("Warning:").yellow().bold(),
                entry.caller.id,
                e
            );
            continue;
        }

        if let Some(dev) = entry.require_dev {
            if let Err(e) = resolver.register_dev(&entry.caller, dev) {
                eprintln!(
                    "{} {} dev requirements ignored: {}",
                    style("Warning:").yellow().bold(),
                    entry.caller.id,
                    e
                );
            }
        }
    }

    Ok(resolver)
}

fn print_transaction(transaction: &Transaction) {
    if transaction.is_empty() {
        println!("{}", style("Nothing to install, update or remove").green());
        return;
    }

    println!("{} {}", style("Operations:").bold(), transaction.summary());
    for op in transaction.operations() {
        println!("  - {}", format_operation(op));
    }
}

fn format_operation(op: &Operation) -> String {
    match op {
        Operation::Install(package) => format!(
            "Installing {} ({})",
            style(package.pretty_name()).green(),
            style(package.pretty_version()).yellow()
        ),
        Operation::Update { from, to } => format!(
            "Updating {} ({} => {})",
            style(to.pretty_name()).green(),
            style(from.pretty_version()).yellow(),
            style(to.pretty_version()).yellow()
        ),
        Operation::Remove(package) => format!(
            "Removing {} ({})",
            style(package.pretty_name()).red(),
            style(package.pretty_version()).yellow()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_resolver::FailureKind;
    use tempfile::TempDir;

    const SITE: &str = r#"{
        "vendor": "wpackagist-plugin",
        "packages": [
            {"name": "wpackagist-plugin/akismet", "version": "4.0"},
            {"name": "wpackagist-plugin/akismet", "version": "5.2"},
            {"name": "wpackagist-plugin/jetpack", "version": "5.0", "require": {"wpackagist-plugin/akismet": ">=5.0"}}
        ],
        "installed": {
            "hello-dolly": {"Name": "Hello Dolly", "Version": "1.7.2"}
        },
        "registrations": [
            {"id": "shop", "version": "1.0", "requires": ["jetpack"]},
            {"id": "broken", "requires": ["akismet~>1.0"]}
        ]
    }"#;

    fn config() -> ResolverConfig {
        ResolverConfig {
            default_vendor: Some("wpackagist-plugin".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_load_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.json");
        std::fs::write(&path, SITE).unwrap();

        let manifest = SiteManifest::load(&path).unwrap();
        assert_eq!(manifest.packages.len(), 3);
        assert_eq!(manifest.registrations.len(), 2);
        assert_eq!(manifest.registrations[0].caller.id, "shop");
        assert_eq!(manifest.registrations[0].caller.version.as_deref(), Some("1.0"));
        assert_eq!(
            manifest.registrations[0].requires,
            Requirements::Basic(vec!["jetpack".to_string()])
        );
        assert!(manifest.installed.contains_key("hello-dolly"));
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = TempDir::new().unwrap();
        assert!(SiteManifest::load(&dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn test_invalid_registration_is_skipped() {
        let manifest: SiteManifest = serde_json::from_str(SITE).unwrap();
        let resolver = build_resolver(manifest, config()).unwrap();

        let callers: Vec<&str> = resolver.callers().map(|c| c.id.as_str()).collect();
        assert_eq!(callers, vec!["shop"]);
    }

    #[test]
    fn test_resolve_site() {
        let manifest: SiteManifest = serde_json::from_str(SITE).unwrap();
        let resolver = build_resolver(manifest, config()).unwrap();

        let transaction = resolver.resolve().unwrap();
        let lines: Vec<String> = transaction.operations().iter().map(|op| op.to_string()).collect();
        assert_eq!(
            lines,
            vec![
                "Installing wpackagist-plugin/akismet (5.2)",
                "Installing wpackagist-plugin/jetpack (5.0)",
            ]
        );
    }

    #[test]
    fn test_resolve_site_conflict() {
        let site = r#"{
            "packages": [{"name": "wpackagist-plugin/akismet", "version": "4.0"}],
            "registrations": [{"id": "shop", "requires": [{"name": "akismet", "constraint": "^5.0"}]}]
        }"#;
        let manifest: SiteManifest = serde_json::from_str(site).unwrap();
        let resolver = build_resolver(manifest, config()).unwrap();

        let failure = resolver.resolve().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Conflict);
        assert!(!failure.first_message().is_empty());
    }

    #[test]
    fn test_manifest_platform_overrides_config() {
        let site = r#"{
            "platform": {"php": "7.4.0"},
            "packages": [{"name": "wpackagist-plugin/modern", "version": "1.0", "require": {"php": ">=8.0"}}],
            "registrations": [{"id": "shop", "requires": ["modern"]}]
        }"#;
        let mut config = config();
        config.platform.insert("php".to_string(), "8.2.0".to_string());

        let manifest: SiteManifest = serde_json::from_str(site).unwrap();
        let resolver = build_resolver(manifest, config).unwrap();
        assert!(resolver.resolve().is_err());
    }
}
