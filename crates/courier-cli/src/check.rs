use anyhow::{Context, Result};
use clap::Args;
use console::style;

use courier_semver::{Constraint, Version};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Version constraint (e.g. "^1.2 || >=2.0,<2.5")
    pub constraint: String,

    /// Versions to test against the constraint
    #[arg(required = true)]
    pub versions: Vec<String>,
}

/// Print which versions satisfy the constraint; exits 1 when none does
pub fn execute(args: CheckArgs) -> Result<i32> {
    let constraint = Constraint::parse(&args.constraint)
        .with_context(|| format!("Invalid constraint \"{}\"", args.constraint))?;

    log::debug!("Parsed {} as {}", args.constraint, constraint);

    let results = evaluate(&constraint, &args.versions)?;
    let mut any_match = false;

    for (version, matches) in &results {
        if *matches {
            any_match = true;
            println!("{} {}", style("✓").green(), version);
        } else {
            println!("{} {}", style("✗").red(), style(version).dim());
        }
    }

    Ok(if any_match { 0 } else { 1 })
}

fn evaluate<'a>(constraint: &Constraint, versions: &'a [String]) -> Result<Vec<(&'a str, bool)>> {
    versions
        .iter()
        .map(|v| {
            let version = Version::parse(v).with_context(|| format!("Invalid version \"{}\"", v))?;
            Ok((v.as_str(), constraint.matches(&version)))
        })
        .collect()
}
