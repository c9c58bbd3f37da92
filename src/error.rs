use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::Violation;
use crate::model::entity::{Id, Index, Round};
use crate::usher::UsherState;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SeatingError {
    #[error("no candidate table left for guest {guest} in round {round}")]
    NoCandidateTable { guest: Id, round: Round },
    #[error("guest {guest} is already seated at table {table} in round {round}")]
    AlreadySeated { guest: Id, table: Id, round: Round },
    #[error("unknown guest index {0}")]
    UnknownGuest(Index),
    #[error("cannot seat a round while the usher is {0:?}")]
    RoundOrder(UsherState),
    #[error("a plan needs at least one table")]
    NoTables,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{}", join_violations(.0))]
    Violations(Vec<Violation>),
    #[error("failed to read names from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no suitable result found after {processed} processed results")]
    NoSuitableResult { processed: usize },
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed seating export at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}
