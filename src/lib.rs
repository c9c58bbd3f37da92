//! Randomised search for multi-session seating plans.
//!
//! Guests are reseated at a fixed set of tables once per session. Many
//! independent plans are generated in parallel and the one with the lowest
//! rating wins: few repeat encounters, even diversity, balanced tables and no
//! pairs moving on together.

pub mod allocator;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod plan;
pub mod report;
pub mod search;
pub mod usher;

pub use allocator::TableAllocator;
pub use config::{PlannerConfig, Settings};
pub use error::{ConfigError, ReportError, SearchError, SeatingError};
pub use plan::{PlanFactory, TablePlan};
pub use search::{search, SearchOutcome, SearchParams};
