use rand::rngs::SmallRng;
use tracing::trace;

use crate::allocator::TableAllocator;
use crate::error::SeatingError;
use crate::model::entity::{Guest, Round, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsherState {
    NotStarted,
    Seated(Round),
    Complete,
}

/// Seats every guest once per round until all sessions are done.
#[derive(Debug, Clone)]
pub struct Usher {
    sessions: Round,
    allocator: TableAllocator,
    rng: SmallRng,
    state: UsherState,
}

impl Usher {
    pub fn new(sessions: Round, allocator: TableAllocator, rng: SmallRng) -> Usher {
        Usher { sessions, allocator, rng, state: UsherState::NotStarted }
    }

    pub fn state(&self) -> UsherState {
        self.state
    }

    pub fn allocator(&self) -> TableAllocator {
        self.allocator
    }

    /// Last round seated so far, 0 before the first one.
    pub fn round(&self) -> Round {
        match self.state {
            UsherState::NotStarted => 0,
            UsherState::Seated(round) => round,
            UsherState::Complete => self.sessions,
        }
    }

    /// Round robin: guest `i` goes to table `i % tables`.
    pub fn first_round(&mut self, guests: &mut [Guest], tables: &mut [Table]) -> Result<Round, SeatingError> {
        if self.state != UsherState::NotStarted {
            return Err(SeatingError::RoundOrder(self.state));
        }
        if tables.is_empty() {
            return Err(SeatingError::NoTables);
        }
        let round = 1;
        let table_count = tables.len();
        for guest in 0..guests.len() {
            tables[guest % table_count].seat(guests, guest, round)?;
        }
        self.finish_round(round);
        Ok(round)
    }

    /// Seats guests in list order, so earlier guests get first pick of the tables.
    pub fn next_round(&mut self, guests: &mut [Guest], tables: &mut [Table]) -> Result<Round, SeatingError> {
        let round = match self.state {
            UsherState::Seated(previous) => previous + 1,
            state => return Err(SeatingError::RoundOrder(state)),
        };
        for guest in 0..guests.len() {
            let table = self.allocator.next_table(&guests[guest], tables, round, &mut self.rng)?;
            trace!(guest = %guests[guest].id, table = %tables[table].id, round, "seated");
            tables[table].seat(guests, guest, round)?;
        }
        self.finish_round(round);
        Ok(round)
    }

    pub fn run(&mut self, guests: &mut [Guest], tables: &mut [Table]) -> Result<(), SeatingError> {
        self.first_round(guests, tables)?;
        while self.state != UsherState::Complete {
            self.next_round(guests, tables)?;
        }
        Ok(())
    }

    fn finish_round(&mut self, round: Round) {
        self.state = if round >= self.sessions {
            UsherState::Complete
        } else {
            UsherState::Seated(round)
        };
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;

    fn setup(guests: usize, tables: usize) -> (Vec<Guest>, Vec<Table>) {
        (
            (0..guests).map(|i| Guest::new(i, i.to_string())).collect(),
            (0..tables).map(|i| Table::new(i, i.to_string())).collect(),
        )
    }

    fn usher(sessions: Round) -> Usher {
        Usher::new(sessions, TableAllocator::LeastGuestsRandom, SmallRng::seed_from_u64(11))
    }

    #[test]
    fn first_round_is_round_robin() {
        let (mut guests, mut tables) = setup(7, 3);
        let mut usher = usher(3);
        assert_eq!(usher.first_round(&mut guests, &mut tables), Ok(1));
        assert_eq!(usher.state(), UsherState::Seated(1));
        for guest in &guests {
            assert_eq!(guest.tables(), &[guest.index % 3]);
        }
        assert_eq!(tables[0].guests_in_round(1), &[0, 3, 6]);
    }

    #[test]
    fn next_round_requires_first_round() {
        let (mut guests, mut tables) = setup(6, 3);
        let mut usher = usher(2);
        assert_eq!(
            usher.next_round(&mut guests, &mut tables),
            Err(SeatingError::RoundOrder(UsherState::NotStarted))
        );
    }

    #[test]
    fn run_seats_every_guest_each_session_then_stops() {
        let (mut guests, mut tables) = setup(8, 4);
        let mut usher = usher(3);
        usher.run(&mut guests, &mut tables).unwrap();
        assert_eq!(usher.state(), UsherState::Complete);
        assert_eq!(usher.round(), 3);
        assert!(guests.iter().all(|guest| guest.tables().len() == 3));
        assert_eq!(
            usher.next_round(&mut guests, &mut tables),
            Err(SeatingError::RoundOrder(UsherState::Complete))
        );
        assert_eq!(
            usher.first_round(&mut guests, &mut tables),
            Err(SeatingError::RoundOrder(UsherState::Complete))
        );
    }

    #[test]
    fn more_sessions_than_tables_still_completes() {
        let (mut guests, mut tables) = setup(6, 3);
        let mut usher = usher(5);
        usher.run(&mut guests, &mut tables).unwrap();
        for guest in &guests {
            assert_eq!(guest.tables().len(), 5);
            assert!(guest.tables().windows(2).all(|pair| pair[0] != pair[1]));
        }
    }

    #[test]
    fn no_tables_is_an_error() {
        let (mut guests, mut tables) = setup(2, 0);
        assert_eq!(usher(2).first_round(&mut guests, &mut tables), Err(SeatingError::NoTables));
    }
}
