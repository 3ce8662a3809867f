//! Conversions from raw catalog and host records into Package values.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use courier_semver::Stability;

use super::Package;
use crate::error::{ResolverError, Result};

/// Package type given to units discovered on the host
pub const HOST_UNIT_TYPE: &str = "host-unit";

/// Version assumed for host units that do not declare one
pub const SYNTHETIC_VERSION: &str = "0.0-dev";

/// License field, either a single SPDX string or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum License {
    Single(String),
    Multiple(Vec<String>),
}

impl License {
    fn into_vec(self) -> Vec<String> {
        match self {
            License::Single(license) => vec![license],
            License::Multiple(licenses) => licenses,
        }
    }
}

/// A raw catalog entry as found in a repository document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageData {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub require: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub require_dev: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub conflict: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub provide: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub replace: IndexMap<String, String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PackageData {
    /// Validate the entry and build a Package from it
    pub fn into_package(self) -> Result<Package> {
        let name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                return Err(ResolverError::InvalidRepositoryEntry(
                    "package entry is missing a name".to_string(),
                ))
            }
        };

        let version = match self.version.as_deref().map(str::trim) {
            Some(version) if !version.is_empty() => version.to_string(),
            _ => {
                return Err(ResolverError::InvalidRepositoryEntry(format!(
                    "package \"{}\" is missing a version",
                    name
                )))
            }
        };

        let mut package = Package::new(&name, &version).map_err(|e| {
            ResolverError::InvalidRepositoryEntry(format!("package \"{}\": {}", name, e))
        })?;

        for (target, constraint) in &self.require {
            package = package.with_require(target, constraint)?;
        }
        for (target, constraint) in &self.require_dev {
            package = package.with_dev_require(target, constraint)?;
        }
        for (target, constraint) in &self.conflict {
            package = package.with_conflict(target, constraint)?;
        }
        for (target, constraint) in &self.provide {
            package = package.with_provide(target, constraint)?;
        }
        for (target, constraint) in &self.replace {
            package = package.with_replace(target, constraint)?;
        }

        if let Some(package_type) = self.package_type {
            package = package.with_type(package_type);
        }
        if let Some(license) = self.license {
            package = package.with_license(license.into_vec());
        }
        if let Some(description) = self.description {
            package = package.with_description(description);
        }

        Ok(package)
    }
}

/// A unit the host environment reports as installed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledUnit {
    #[serde(default, alias = "Name")]
    pub name: Option<String>,

    #[serde(default, alias = "Version")]
    pub version: Option<String>,

    #[serde(default, alias = "Description")]
    pub description: Option<String>,
}

impl InstalledUnit {
    /// Adapt the unit registered under `id` into a Package.
    ///
    /// The package name is `id` under `vendor` when one is given. Units that
    /// declare no usable version get the synthetic `0.0-dev` version but are
    /// still reported as stable, since the host considers them released.
    pub fn into_package(self, id: &str, vendor: Option<&str>) -> Result<Package> {
        let name = qualify(id, vendor);

        let declared = self
            .version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let mut package = match declared.map(|v| Package::new(&name, v)) {
            Some(Ok(package)) => package,
            Some(Err(e)) => {
                log::debug!("{}: {}, using {}", name, e, SYNTHETIC_VERSION);
                Package::new(&name, SYNTHETIC_VERSION)?
            }
            None => Package::new(&name, SYNTHETIC_VERSION)?,
        };

        package = package
            .with_type(HOST_UNIT_TYPE)
            .with_stability(Stability::Stable);

        if let Some(pretty_name) = self.name.filter(|n| !n.trim().is_empty()) {
            package = package.with_pretty_name(pretty_name);
        }
        if let Some(description) = self.description {
            package = package.with_description(description);
        }

        Ok(package)
    }
}

/// Prefix `name` with `vendor/` unless it already carries a vendor
pub(crate) fn qualify(name: &str, vendor: Option<&str>) -> String {
    match vendor {
        Some(vendor) if !vendor.is_empty() && !name.contains('/') => format!("{}/{}", vendor, name),
        _ => name.to_string(),
    }
}
