//! Resolver configuration

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use courier_semver::{Stability, VersionParser};

use crate::error::{ResolverError, Result};

/// Default solver step budget
pub const DEFAULT_MAX_STEPS: usize = 100_000;

/// Settings that shape how requirements are resolved.
///
/// Every field has a default, so an empty document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResolverConfig {
    /// Lowest stability a catalog package may have to be considered
    pub minimum_stability: String,

    /// Per-package stability overrides (name -> stability)
    pub stability_flags: IndexMap<String, String>,

    /// Prefer stable releases over more recent unstable ones
    pub prefer_stable: bool,

    /// Prefer the lowest matching versions
    pub prefer_lowest: bool,

    /// Merge development requirements of registered callers
    pub include_dev: bool,

    /// Upper bound on solver decisions and conflict analyses
    pub max_steps: usize,

    /// Vendor prefix applied to requirement names without one
    pub default_vendor: Option<String>,

    /// Platform package versions (name -> version, "false" disables)
    pub platform: IndexMap<String, String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            minimum_stability: "stable".to_string(),
            stability_flags: IndexMap::new(),
            prefer_stable: true,
            prefer_lowest: false,
            include_dev: false,
            max_steps: DEFAULT_MAX_STEPS,
            default_vendor: None,
            platform: IndexMap::new(),
        }
    }
}

impl ResolverConfig {
    /// Parse a JSON configuration document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: ResolverConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that every stability name is known
    pub fn validate(&self) -> Result<()> {
        self.minimum_stability()?;
        self.stability_flags()?;
        if self.max_steps == 0 {
            return Err(ResolverError::Config("max-steps must be greater than zero".to_string()));
        }
        Ok(())
    }

    pub fn minimum_stability(&self) -> Result<Stability> {
        parse_stability(&self.minimum_stability)
    }

    pub fn stability_flags(&self) -> Result<IndexMap<String, Stability>> {
        self.stability_flags
            .iter()
            .map(|(name, stability)| Ok((name.to_lowercase(), parse_stability(stability)?)))
            .collect()
    }

    /// Apply `COURIER_*` environment variables on top of the loaded values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(stability) = lookup("COURIER_MINIMUM_STABILITY") {
            parse_stability(&stability)?;
            log::debug!("minimum-stability overridden from environment: {}", stability);
            self.minimum_stability = stability;
        }

        if let Some(value) = lookup("COURIER_PREFER_STABLE") {
            self.prefer_stable = parse_bool("COURIER_PREFER_STABLE", &value)?;
        }

        if let Some(value) = lookup("COURIER_PREFER_LOWEST") {
            self.prefer_lowest = parse_bool("COURIER_PREFER_LOWEST", &value)?;
        }

        if let Some(value) = lookup("COURIER_INCLUDE_DEV") {
            self.include_dev = parse_bool("COURIER_INCLUDE_DEV", &value)?;
        }

        if let Some(value) = lookup("COURIER_MAX_STEPS") {
            self.max_steps = value
                .trim()
                .parse()
                .map_err(|_| ResolverError::Config(format!("COURIER_MAX_STEPS must be a number, got \"{}\"", value)))?;
        }

        if let Some(vendor) = lookup("COURIER_DEFAULT_VENDOR") {
            self.default_vendor = if vendor.is_empty() { None } else { Some(vendor) };
        }

        self.validate()
    }
}

fn parse_stability(value: &str) -> Result<Stability> {
    VersionParser::normalize_stability(value)
        .map_err(|_| ResolverError::Config(format!("unknown stability \"{}\"", value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ResolverError::Config(format!("{} must be a boolean, got \"{}\"", key, value))),
    }
}
