use indexmap::IndexMap;
use std::sync::Arc;

use courier_semver::Constraint;

use crate::error::{ResolverError, Result};
use crate::package::Package;

/// A constraint on a package name, kept with its original text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    pub constraint: Constraint,
    pub pretty_constraint: String,
}

/// A request specifies what needs to be resolved.
///
/// Jobs are keyed by lowercase package name, at most one per kind; insertion
/// order is kept because it drives the order in which the solver branches.
#[derive(Debug, Clone, Default)]
pub struct Request {
    install: IndexMap<String, Job>,
    remove: IndexMap<String, Job>,
    fixed: IndexMap<String, Arc<Package>>,
    update: Vec<String>,
    update_all: bool,
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require one version of `name` matching `constraint`.
    ///
    /// Requiring a name twice keeps both constraints: the job then asks for a
    /// version matching all of them.
    pub fn install(&mut self, name: &str, constraint: &str) -> Result<&mut Self> {
        let parsed = Constraint::parse(constraint).map_err(|e| ResolverError::constraint(constraint, e))?;
        Ok(self.install_constraint(name, parsed, constraint.trim()))
    }

    /// Same as [`Request::install`] with an already parsed constraint
    pub fn install_constraint(&mut self, name: &str, constraint: Constraint, pretty: &str) -> &mut Self {
        let name = name.to_lowercase();
        match self.install.get_mut(&name) {
            Some(job) => {
                let previous = std::mem::replace(&mut job.constraint, Constraint::Wildcard);
                job.constraint = Constraint::all(vec![previous, constraint]);
                job.pretty_constraint = format!("{}, {}", job.pretty_constraint, pretty);
            }
            None => {
                self.install.insert(
                    name.clone(),
                    Job {
                        name,
                        constraint,
                        pretty_constraint: pretty.to_string(),
                    },
                );
            }
        }
        self
    }

    /// Mark every installed version of `name` matching `constraint` for removal
    pub fn remove(&mut self, name: &str, constraint: &str) -> Result<&mut Self> {
        let parsed = Constraint::parse(constraint).map_err(|e| ResolverError::constraint(constraint, e))?;
        Ok(self.remove_constraint(name, parsed, constraint.trim()))
    }

    /// Same as [`Request::remove`] with an already parsed constraint
    pub fn remove_constraint(&mut self, name: &str, constraint: Constraint, pretty: &str) -> &mut Self {
        let name = name.to_lowercase();
        self.remove.insert(
            name.clone(),
            Job {
                name,
                constraint,
                pretty_constraint: pretty.to_string(),
            },
        );
        self
    }

    /// Pin a package at exactly its current version
    pub fn fix(&mut self, package: Arc<Package>) -> &mut Self {
        self.fixed.insert(package.name().to_string(), package);
        self
    }

    /// Allow the installed version of `name` to change
    pub fn update(&mut self, name: &str) -> &mut Self {
        let name = name.to_lowercase();
        if !self.update.contains(&name) {
            self.update.push(name);
        }
        self
    }

    /// Allow every installed version to change
    pub fn update_all(&mut self) -> &mut Self {
        self.update_all = true;
        self
    }

    pub fn install_jobs(&self) -> impl Iterator<Item = &Job> {
        self.install.values()
    }

    pub fn remove_jobs(&self) -> impl Iterator<Item = &Job> {
        self.remove.values()
    }

    pub fn fixed_packages(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.fixed.values()
    }

    pub fn update_names(&self) -> &[String] {
        &self.update
    }

    pub fn is_update_all(&self) -> bool {
        self.update_all
    }

    /// Whether the installed version of `name` may be replaced
    pub fn is_update(&self, name: &str) -> bool {
        self.update_all || self.update.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn is_fixed(&self, name: &str) -> bool {
        self.fixed.contains_key(&name.to_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.install.is_empty() && self.remove.is_empty() && self.fixed.is_empty()
    }
}
