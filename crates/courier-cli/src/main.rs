mod check;
mod config;
mod resolve;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

use config::CourierConfig;

#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(about = "Resolve plugin requirements against a site", version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve every registration of a site manifest and print the operations
    Resolve(resolve::ResolveArgs),

    /// Check versions against a constraint
    Check(check::CheckArgs),
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn run() -> Result<i32> {
    let args = Args::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Resolve(resolve_args) => {
            // courier.toml first, then COURIER_* variables, then flags
            let mut config = CourierConfig::load_from_cwd()?.unwrap_or_default().resolver;
            config.apply_env_overrides()?;
            resolve::execute(resolve_args, config)
        }
        Commands::Check(check_args) => check::execute(check_args),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            eprintln!("Error: {}", e);
            for cause in e.chain().skip(1) {
                eprintln!("  Caused by: {}", cause);
            }
            ExitCode::FAILURE
        }
    }
}
