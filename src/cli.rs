//! Command line front end.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use crate::allocator::TableAllocator;
use crate::config::Settings;
use crate::error::SearchError;
use crate::plan::PlanFactory;
use crate::report;
use crate::search::{search, SearchParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AllocatorChoice {
    Random,
    LeastGuests,
    LookAhead,
}

impl From<AllocatorChoice> for TableAllocator {
    fn from(choice: AllocatorChoice) -> Self {
        match choice {
            AllocatorChoice::Random => TableAllocator::Random,
            AllocatorChoice::LeastGuests => TableAllocator::LeastGuestsRandom,
            AllocatorChoice::LookAhead => TableAllocator::LookAhead,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "table-planner", version, about = "Plan who sits where across several sessions")]
pub struct Cli {
    /// Number of tables
    #[arg(short = 't', long, default_value_t = 4)]
    pub tables: usize,

    /// Number of sessions
    #[arg(short = 's', long, default_value_t = 4)]
    pub sessions: usize,

    /// Number of people (minus hosts). Ignored if a list of names is provided
    #[arg(short = 'g', long, default_value_t = 16)]
    pub guests: usize,

    /// File with one name per line; the first names are used for the tables
    #[arg(short = 'i', long)]
    pub input: Option<PathBuf>,

    /// Write the winning plan to this CSV file
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Number of plans to generate
    #[arg(long, default_value_t = 10_000)]
    pub iterations: usize,

    /// Number of worker threads
    #[arg(long, default_value_t = 8)]
    pub threads: usize,

    /// Base seed for reproducible plans
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the table allocation strategy
    #[arg(long, value_enum)]
    pub allocator: Option<AllocatorChoice>,

    /// Log debug output to stderr
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl Cli {
    pub fn settings(&self) -> Settings {
        Settings {
            tables: self.tables,
            sessions: self.sessions,
            guests: self.guests,
            input: self.input.clone(),
            iterations: self.iterations,
            threads: self.threads,
            seed: self.seed,
            allocator: self.allocator.map(TableAllocator::from),
        }
    }
}

pub fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.settings().validate()?;
    let factory = Arc::new(PlanFactory::from_config(&config));
    println!(
        "guests={}, tables={}, sessions={}, iterations={}",
        factory.no_of_guests(),
        factory.no_of_tables(),
        factory.sessions(),
        config.iterations
    );

    let outcome = match search(factory, SearchParams::from(&config)) {
        Ok(outcome) => outcome,
        Err(SearchError::NoSuitableResult { processed }) => {
            info!(processed, "search produced no plan");
            println!("No suitable result found!");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    println!(
        "Result in: {:.3}s (results processed: {})",
        outcome.elapsed.as_secs_f64(),
        outcome.processed
    );
    print!("{}", report::render(&outcome.plan));

    if let Some(path) = &cli.output {
        report::export_csv(&outcome.plan, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "plan exported");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_options() {
        let cli = Cli::try_parse_from([
            "table-planner", "-t", "3", "-s", "3", "-g", "9", "--iterations", "500", "--threads", "2",
            "--allocator", "least-guests",
        ])
        .unwrap();
        let settings = cli.settings();
        assert_eq!(settings.tables, 3);
        assert_eq!(settings.guests, 9);
        assert_eq!(settings.iterations, 500);
        assert_eq!(settings.allocator, Some(TableAllocator::LeastGuestsRandom));
    }

    #[test]
    fn defaults_match_settings_defaults() {
        let cli = Cli::try_parse_from(["table-planner"]).unwrap();
        assert_eq!(cli.settings(), Settings::default());
    }
}
