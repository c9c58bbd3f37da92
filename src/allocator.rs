use std::fmt;

use itertools::Itertools;
use rand::prelude::SliceRandom;
use rand::Rng;

use crate::error::SeatingError;
use crate::model::condition::Score;
use crate::model::entity::{Guest, Index, Round, Table};

/// Policy for picking the next table of a guest.
///
/// All variants skip tables the guest already sat at. Once a guest has been at
/// every table they may repeat one, but never the table of the previous round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableAllocator {
    /// Any table not sat at yet.
    Random,
    /// Emptiest table in the current round, ties broken at random.
    LeastGuestsRandom,
    /// Table where the guest would score best with the current occupants.
    /// Only reliable up to the ideal seating threshold, beyond that it starves
    /// a few guests.
    LookAhead,
}

impl TableAllocator {
    pub fn next_table<R: Rng + ?Sized>(
        &self,
        guest: &Guest,
        tables: &[Table],
        round: Round,
        rng: &mut R,
    ) -> Result<Index, SeatingError> {
        let candidates = candidate_tables(guest, tables);
        let pool = match self {
            TableAllocator::Random => candidates,
            TableAllocator::LeastGuestsRandom => candidates
                .into_iter()
                .min_set_by_key(|table| tables[*table].occupancy(round)),
            TableAllocator::LookAhead => candidates
                .into_iter()
                .map(|table| (guest.score_among(tables[table].guests_in_round(round)), table))
                .min_set_by(|a: &(Score, Index), b| a.0.total_cmp(&b.0))
                .into_iter()
                .map(|(_, table)| table)
                .collect(),
        };
        pool.choose(rng).copied().ok_or_else(|| SeatingError::NoCandidateTable {
            guest: guest.id.clone(),
            round,
        })
    }
}

impl fmt::Display for TableAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TableAllocator::Random => "random",
            TableAllocator::LeastGuestsRandom => "least-guests",
            TableAllocator::LookAhead => "look-ahead",
        };
        f.write_str(name)
    }
}

fn candidate_tables(guest: &Guest, tables: &[Table]) -> Vec<Index> {
    let unvisited = (0..tables.len()).filter(|table| !guest.has_sat_at(*table)).collect_vec();
    if !unvisited.is_empty() {
        return unvisited;
    }
    let last = guest.last_table();
    (0..tables.len()).filter(|table| Some(*table) != last).collect()
}
