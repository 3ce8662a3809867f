use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::error::{ResolverError, Result};
use crate::package::Package;

/// Ordered operations turning the present package set into a solver result
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    operations: Vec<Operation>,
}

/// A single operation in a transaction
#[derive(Debug, Clone)]
pub enum Operation {
    /// Install a new package
    Install(Arc<Package>),
    /// Update a package from one version to another
    Update {
        from: Arc<Package>,
        to: Arc<Package>,
    },
    /// Remove a package
    Remove(Arc<Package>),
}

impl Operation {
    /// The package this operation leaves installed, or removes
    pub fn package(&self) -> &Arc<Package> {
        match self {
            Operation::Install(package) | Operation::Remove(package) => package,
            Operation::Update { to, .. } => to,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Install(_) => "install",
            Operation::Update { .. } => "update",
            Operation::Remove(_) => "remove",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Install(package) => write!(f, "Installing {} ({})", package.pretty_name(), package.pretty_version()),
            Operation::Update { from, to } => write!(
                f,
                "Updating {} ({} => {})",
                to.pretty_name(),
                from.pretty_version(),
                to.pretty_version()
            ),
            Operation::Remove(package) => write!(f, "Removing {} ({})", package.pretty_name(), package.pretty_version()),
        }
    }
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `present` against `result` by package name.
    ///
    /// Removals come first, each before the packages it requires; installs
    /// and updates follow with dependencies before their dependents. Platform
    /// packages are never part of a transaction.
    pub fn from_packages(present: Vec<Arc<Package>>, result: Vec<Arc<Package>>) -> Result<Self> {
        let present: HashMap<String, Arc<Package>> = present
            .into_iter()
            .filter(|p| !p.is_platform())
            .map(|p| (p.name().to_string(), p))
            .collect();

        let mut removals: Vec<Arc<Package>> = Vec::new();
        let mut changes: Vec<Operation> = Vec::new();
        let mut kept: Vec<&str> = Vec::new();

        for package in result.iter().filter(|p| !p.is_platform()) {
            match present.get(package.name()) {
                Some(existing) => {
                    kept.push(existing.name());
                    if existing.version().normalized() != package.version().normalized() {
                        changes.push(Operation::Update {
                            from: existing.clone(),
                            to: package.clone(),
                        });
                    }
                }
                None => changes.push(Operation::Install(package.clone())),
            }
        }

        for (name, package) in &present {
            if !kept.contains(&name.as_str()) {
                removals.push(package.clone());
            }
        }

        let mut operations = Vec::with_capacity(removals.len() + changes.len());

        let removal_refs: Vec<&Arc<Package>> = removals.iter().collect();
        for idx in topological_order(&removal_refs, false)? {
            operations.push(Operation::Remove(removals[idx].clone()));
        }

        let change_refs: Vec<&Arc<Package>> = changes.iter().map(Operation::package).collect();
        let order = topological_order(&change_refs, true)?;
        let mut changes: Vec<Option<Operation>> = changes.into_iter().map(Some).collect();
        for idx in order {
            if let Some(op) = changes[idx].take() {
                operations.push(op);
            }
        }

        Ok(Self { operations })
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn into_operations(self) -> Vec<Operation> {
        self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Get only new installs (not updates)
    pub fn installs(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Install(package) => Some(package),
            _ => None,
        })
    }

    pub fn updates(&self) -> impl Iterator<Item = (&Arc<Package>, &Arc<Package>)> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Update { from, to } => Some((from, to)),
            _ => None,
        })
    }

    pub fn removals(&self) -> impl Iterator<Item = &Arc<Package>> {
        self.operations.iter().filter_map(|op| match op {
            Operation::Remove(package) => Some(package),
            _ => None,
        })
    }

    pub fn summary(&self) -> TransactionSummary {
        let mut summary = TransactionSummary::default();

        for op in &self.operations {
            match op {
                Operation::Install(_) => summary.installs += 1,
                Operation::Update { .. } => summary.updates += 1,
                Operation::Remove(_) => summary.removals += 1,
            }
        }

        summary
    }
}

/// Summary of a transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionSummary {
    pub installs: usize,
    pub updates: usize,
    pub removals: usize,
}

impl fmt::Display for TransactionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if self.installs > 0 {
            parts.push(format!("{} install(s)", self.installs));
        }
        if self.updates > 0 {
            parts.push(format!("{} update(s)", self.updates));
        }
        if self.removals > 0 {
            parts.push(format!("{} removal(s)", self.removals));
        }

        if parts.is_empty() {
            write!(f, "Nothing to do")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Order packages along their requirement links with Kahn's algorithm.
///
/// With `dependencies_first`, a required package comes before the package
/// requiring it; otherwise after it. Ties are broken by package name. A
/// requirement is matched against every name a package answers to, and a
/// package requiring itself is ignored.
fn topological_order(packages: &[&Arc<Package>], dependencies_first: bool) -> Result<Vec<usize>> {
    let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, package) in packages.iter().enumerate() {
        for name in package.names() {
            by_name.entry(name).or_default().push(idx);
        }
    }

    let mut in_degree = vec![0usize; packages.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); packages.len()];

    for (idx, package) in packages.iter().enumerate() {
        for link in package.requires().values() {
            let Some(targets) = by_name.get(link.target.as_str()) else {
                continue;
            };
            for &dep in targets {
                if dep == idx {
                    continue;
                }
                let (before, after) = if dependencies_first { (dep, idx) } else { (idx, dep) };
                if !successors[before].contains(&after) {
                    successors[before].push(after);
                    in_degree[after] += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<(&str, usize)> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(idx, _)| (packages[idx].name(), idx))
        .collect();

    let mut order = Vec::with_capacity(packages.len());
    while let Some(next) = ready.pop_first() {
        let idx = next.1;
        order.push(idx);

        for &succ in &successors[idx] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.insert((packages[succ].name(), succ));
            }
        }
    }

    if order.len() != packages.len() {
        let mut cycle: Vec<String> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, degree)| **degree > 0)
            .map(|(idx, _)| packages[idx].name().to_string())
            .collect();
        cycle.sort();
        return Err(ResolverError::DependencyCycle(cycle));
    }

    Ok(order)
}
