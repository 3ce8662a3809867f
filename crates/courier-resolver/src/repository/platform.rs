use indexmap::IndexMap;
use std::sync::Arc;

use courier_semver::Stability;

use super::traits::Repository;
use crate::error::Result;
use crate::package::{Package, PLATFORM_TYPE};

/// Version reported for the interpreter and bundled extensions
pub const DEFAULT_PLATFORM_VERSION: &str = "8.3.0";

const BUILTIN: &[(&str, &str)] = &[
    ("php", "The PHP interpreter"),
    ("php-64bit", "The PHP interpreter, 64bit"),
    ("ext-ctype", "The ctype PHP extension"),
    ("ext-curl", "The curl PHP extension"),
    ("ext-dom", "The dom PHP extension"),
    ("ext-json", "The json PHP extension"),
    ("ext-mbstring", "The mbstring PHP extension"),
    ("ext-openssl", "The openssl PHP extension"),
    ("ext-pcre", "The pcre PHP extension"),
    ("ext-xml", "The xml PHP extension"),
    ("lib-pcre", "The pcre library"),
];

/// Whether `name` denotes a platform package (`php`, `php-*`, `ext-*`, `lib-*`)
pub fn is_platform_name(name: &str) -> bool {
    let name = name.to_lowercase();
    if name.contains('/') {
        return false;
    }
    name == "php" || name.starts_with("php-") || name.starts_with("ext-") || name.starts_with("lib-")
}

/// Synthetic packages describing the runtime the host provides
#[derive(Debug)]
pub struct PlatformRepository {
    packages: Vec<Arc<Package>>,
}

impl PlatformRepository {
    /// The built-in platform list at its default versions
    pub fn new() -> Self {
        let packages = BUILTIN
            .iter()
            .filter_map(|(name, description)| {
                platform_package(name, DEFAULT_PLATFORM_VERSION, Some(description)).ok()
            })
            .map(Arc::new)
            .collect();

        Self { packages }
    }

    /// The built-in list with versions overridden; `false` removes a package
    /// and unknown names are added as extra platform packages.
    pub fn with_overrides(overrides: &IndexMap<String, String>) -> Result<Self> {
        let mut packages: IndexMap<String, Package> = IndexMap::new();

        for (name, description) in BUILTIN {
            packages.insert(
                name.to_string(),
                platform_package(name, DEFAULT_PLATFORM_VERSION, Some(description))?,
            );
        }

        for (name, version) in overrides {
            let name = name.to_lowercase();
            let version = version.trim();
            if version == "false" || version.is_empty() {
                log::debug!("Platform package {} disabled", name);
                packages.shift_remove(&name);
                continue;
            }

            let description = packages
                .get(&name)
                .and_then(|p| p.description())
                .map(str::to_string);
            let package = platform_package(&name, version, description.as_deref())?;
            packages.insert(name, package);
        }

        Ok(Self {
            packages: packages.into_values().map(Arc::new).collect(),
        })
    }
}

fn platform_package(name: &str, version: &str, description: Option<&str>) -> Result<Package> {
    let mut package = Package::new(name, version)?
        .with_type(PLATFORM_TYPE)
        .with_stability(Stability::Stable);
    if let Some(description) = description {
        package = package.with_description(description);
    }
    Ok(package)
}

impl Default for PlatformRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for PlatformRepository {
    fn name(&self) -> &str {
        "platform"
    }

    fn packages(&self) -> Vec<Arc<Package>> {
        self.packages.clone()
    }

    fn count(&self) -> usize {
        self.packages.len()
    }

    fn is_installed(&self) -> bool {
        true
    }
}
