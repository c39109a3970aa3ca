use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod output;

use commands::fixtures::FixturesArgs;
use commands::run::RunArgs;
use output::Output;

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One line per run, with failures indented below
    #[default]
    Human,
    /// One table row per (driver, fixture) run
    Table,
    /// Machine-readable report
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Runs the conformance suite against the in-memory driver.
    /// Capabilities can be disabled and faults injected to see how the suite
    /// reports a non-conforming driver.
    Run(RunArgs),
    /// Lists the fixtures in a catalog file
    Fixtures(FixturesArgs),
}

#[derive(Parser)]
#[clap(version, author, about)]
pub struct Cli {
    /// Output format
    #[clap(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Only print failures and the summary
    #[clap(long, short, global = true)]
    pub quiet: bool,

    #[clap(subcommand)]
    pub command: Command,
}

fn try_main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.quiet);

    match cli.command {
        Command::Run(args) => commands::run::run(&output, &args)?,
        Command::Fixtures(args) => commands::fixtures::run(&output, &args)?,
    }
    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("{e:?}");
        ::std::process::exit(1)
    }
}
