//! Run settings and their validation.
//!
//! [`Settings`] holds the raw values a caller asked for. [`Settings::validate`]
//! checks every bound at once and either reports all violations together or
//! produces a [`PlannerConfig`] the rest of the crate can rely on.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::allocator::TableAllocator;
use crate::error::ConfigError;
use crate::model::entity::{Id, Round};

pub const TABLES: RangeInclusive<usize> = 3..=5;
pub const SESSIONS: RangeInclusive<Round> = 2..=5;
pub const MAX_NAMES: usize = 50;
pub const ITERATIONS: RangeInclusive<usize> = 100..=1_000_000;
pub const THREADS: RangeInclusive<usize> = 2..=16;
/// Names files above this size are rejected unread.
pub const FILE_SIZE_LIMIT: u64 = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    TableCount(usize),
    SessionCount(Round),
    GuestCount { guests: usize, tables: usize },
    NamesFile(PathBuf),
    NameCount { names: usize, tables: usize },
    DuplicateName(Id),
    InvalidName(Id),
    IterationCount(usize),
    ThreadCount(usize),
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::TableCount(n) => write!(
                f,
                "between {} and {} tables are supported (got {n})",
                TABLES.start(),
                TABLES.end()
            ),
            Violation::SessionCount(n) => write!(
                f,
                "between {} and {} sessions are supported (got {n})",
                SESSIONS.start(),
                SESSIONS.end()
            ),
            Violation::GuestCount { guests, tables } => write!(
                f,
                "between {} and {MAX_NAMES} guests are supported for {tables} tables (got {guests})",
                tables * 2
            ),
            Violation::NamesFile(path) => write!(
                f,
                "input file {} must exist, be readable, hold one name per line and be at most {FILE_SIZE_LIMIT} bytes",
                path.display()
            ),
            Violation::NameCount { names, tables } => write!(
                f,
                "names for at least 1 host and 1 guest per table are required and no more than {MAX_NAMES} names \
                 (got {names} for {tables} tables)"
            ),
            Violation::DuplicateName(name) => write!(f, "name {name:?} appears more than once"),
            Violation::InvalidName(name) => write!(f, "name {name:?} must not contain a comma"),
            Violation::IterationCount(n) => write!(
                f,
                "iterations between {} and {} are expected (got {n})",
                ITERATIONS.start(),
                ITERATIONS.end()
            ),
            Violation::ThreadCount(n) => write!(
                f,
                "between {} and {} threads are supported (got {n})",
                THREADS.start(),
                THREADS.end()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tables: usize,
    pub sessions: Round,
    /// Ignored when `input` is given.
    pub guests: usize,
    /// Newline separated names; the first `tables` names name the tables.
    pub input: Option<PathBuf>,
    pub iterations: usize,
    pub threads: usize,
    pub seed: Option<u64>,
    pub allocator: Option<TableAllocator>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            tables: 4,
            sessions: 4,
            guests: 16,
            input: None,
            iterations: 10_000,
            threads: 8,
            seed: None,
            allocator: None,
        }
    }
}

/// Validated settings with table and guest names resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub table_names: Vec<Id>,
    pub guest_names: Vec<Id>,
    pub sessions: Round,
    pub iterations: usize,
    pub threads: usize,
    pub seed: Option<u64>,
    pub allocator: Option<TableAllocator>,
}

impl Settings {
    pub fn validate(&self) -> Result<PlannerConfig, ConfigError> {
        let mut violations = Vec::new();
        if !TABLES.contains(&self.tables) {
            violations.push(Violation::TableCount(self.tables));
        }
        if !SESSIONS.contains(&self.sessions) {
            violations.push(Violation::SessionCount(self.sessions));
        }
        let names = match &self.input {
            Some(path) => match read_acceptable_names(path) {
                Some(names) => {
                    violations.extend(self.name_violations(&names));
                    Some(names)
                }
                None => {
                    violations.push(Violation::NamesFile(path.clone()));
                    None
                }
            },
            None => {
                if !(self.tables * 2..=MAX_NAMES).contains(&self.guests) {
                    violations.push(Violation::GuestCount { guests: self.guests, tables: self.tables });
                }
                None
            }
        };
        if !ITERATIONS.contains(&self.iterations) {
            violations.push(Violation::IterationCount(self.iterations));
        }
        if !THREADS.contains(&self.threads) {
            violations.push(Violation::ThreadCount(self.threads));
        }
        if !violations.is_empty() {
            return Err(ConfigError::Violations(violations));
        }

        let (table_names, guest_names) = match names {
            Some(mut names) => {
                let guests = names.split_off(self.tables);
                (names, guests)
            }
            None => (numbered(self.tables), numbered(self.guests)),
        };
        Ok(PlannerConfig {
            table_names,
            guest_names,
            sessions: self.sessions,
            iterations: self.iterations,
            threads: self.threads,
            seed: self.seed,
            allocator: self.allocator,
        })
    }

    /// Names end up as CSV fields, so a comma in one would break the export.
    fn name_violations(&self, names: &[Id]) -> Vec<Violation> {
        let mut violations = Vec::new();
        if !(self.tables * 2..=MAX_NAMES).contains(&names.len()) {
            violations.push(Violation::NameCount { names: names.len(), tables: self.tables });
        }
        let mut seen = HashSet::new();
        for name in names {
            if name.contains(',') {
                violations.push(Violation::InvalidName(name.clone()));
            }
            if !seen.insert(name.as_str()) {
                violations.push(Violation::DuplicateName(name.clone()));
            }
        }
        violations
    }
}

fn read_acceptable_names(path: &Path) -> Option<Vec<Id>> {
    if !is_acceptable_names_file(path) {
        return None;
    }
    match read_names(path) {
        Ok(names) => Some(names),
        Err(err) => {
            warn!(error = %err, "names file could not be read");
            None
        }
    }
}

fn is_acceptable_names_file(path: &Path) -> bool {
    fs::metadata(path).map_or(false, |meta| meta.is_file() && meta.len() <= FILE_SIZE_LIMIT)
}

/// Reads one name per line, trimming whitespace and skipping blank lines.
pub fn read_names(path: &Path) -> Result<Vec<Id>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn numbered(n: usize) -> Vec<Id> {
    (1..=n).map(|i| i.to_string()).collect()
}
