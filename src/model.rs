pub mod entity {
    use std::cell::Cell;
    use std::collections::BTreeMap;

    use itertools::Itertools;

    use super::condition::{Score, BASE_GUEST_RATING};
    use crate::error::SeatingError;

    pub type Id = String;
    pub type Index = usize;
    pub type Round = usize;

    /// One person to be seated, together with everyone they met so far.
    #[derive(Debug, Clone)]
    pub struct Guest {
        pub index: Index,
        pub id: Id,
        met: BTreeMap<Index, Vec<Round>>,
        tables: Vec<Index>,
        score: Cell<Option<Score>>,
    }

    impl Guest {
        pub fn new(index: Index, id: impl Into<Id>) -> Guest {
            Guest {
                index,
                id: id.into(),
                met: BTreeMap::new(),
                tables: Vec::new(),
                score: Cell::new(None),
            }
        }

        fn greet(&mut self, other: Index, round: Round) {
            debug_assert_ne!(self.index, other);
            self.score.set(None);
            self.met.entry(other).or_default().push(round);
        }

        pub(crate) fn seat_at(&mut self, table: Index) {
            self.tables.push(table);
        }

        /// Tables sat at so far, position 0 being round 1.
        pub fn tables(&self) -> &[Index] {
            &self.tables
        }

        pub fn has_sat_at(&self, table: Index) -> bool {
            self.tables.contains(&table)
        }

        pub fn last_table(&self) -> Option<Index> {
            self.tables.last().copied()
        }

        pub fn meetings_with(&self, other: Index) -> usize {
            self.met.get(&other).map_or(0, Vec::len)
        }

        /// Other guests met, in guest list order, with the rounds of each meeting.
        pub fn meetings(&self) -> impl Iterator<Item = (Index, &[Round])> + '_ {
            self.met.iter().map(|(other, rounds)| (*other, rounds.as_slice()))
        }

        pub fn diversity(&self) -> usize {
            self.met.len()
        }

        /// Number of times this guest sat with the same person in two consecutive rounds.
        pub fn follow_ups(&self) -> usize {
            self.met
                .values()
                .filter(|rounds| rounds.len() > 1)
                .map(|rounds| {
                    rounds
                        .iter()
                        .tuple_windows()
                        .filter(|(first, second)| **first + 1 == **second)
                        .count()
                })
                .sum()
        }

        /// Average meeting rating. A guest that met nobody rates as infinitely bad.
        pub fn score(&self) -> Score {
            if let Some(score) = self.score.get() {
                return score;
            }
            let score = match self.diversity() {
                0 => Score::INFINITY,
                diversity => self.meeting_rating(self.met.keys().copied()) / diversity as Score,
            };
            self.score.set(Some(score));
            score
        }

        /// Score this guest would get if only `others` counted, used to look ahead
        /// before seating.
        pub fn score_among(&self, others: &[Index]) -> Score {
            self.meeting_rating(others.iter().copied()) / self.diversity().max(1) as Score
        }

        fn meeting_rating(&self, others: impl Iterator<Item = Index>) -> Score {
            others
                .map(|other| BASE_GUEST_RATING.powi(self.meetings_with(other) as i32))
                .sum()
        }

        pub fn others_summary(&self, guests: &[Guest]) -> String {
            self.meetings()
                .map(|(other, rounds)| {
                    let id = guests.get(other).map_or("?", |guest| guest.id.as_str());
                    format!("{:>2} {:?}", id, rounds)
                })
                .join(", ")
        }

        pub fn stats(&self) -> String {
            format!(
                "followUps={}, diversity={}, score={:.2}",
                self.follow_ups(),
                self.diversity(),
                self.score()
            )
        }
    }

    /// Records that `a` and `b` sat together in `round`, on both guests.
    pub fn record_meeting(guests: &mut [Guest], a: Index, b: Index, round: Round) -> Result<(), SeatingError> {
        if a == b {
            return Err(SeatingError::UnknownGuest(a));
        }
        guests.get_mut(a).ok_or(SeatingError::UnknownGuest(a))?.greet(b, round);
        guests.get_mut(b).ok_or(SeatingError::UnknownGuest(b))?.greet(a, round);
        Ok(())
    }

    #[derive(Debug, Clone)]
    pub struct Table {
        pub index: Index,
        pub id: Id,
        rounds: BTreeMap<Round, Vec<Index>>,
    }

    impl Table {
        pub fn new(index: Index, id: impl Into<Id>) -> Table {
            Table { index, id: id.into(), rounds: BTreeMap::new() }
        }

        /// Seats `guest` for `round`, greeting everyone already at the table.
        pub fn seat(&mut self, guests: &mut [Guest], guest: Index, round: Round) -> Result<(), SeatingError> {
            let new_guest = guests.get(guest).ok_or(SeatingError::UnknownGuest(guest))?;
            let seated = self.rounds.entry(round).or_default();
            if seated.contains(&guest) {
                return Err(SeatingError::AlreadySeated {
                    guest: new_guest.id.clone(),
                    table: self.id.clone(),
                    round,
                });
            }
            for already_seated in seated.iter() {
                record_meeting(guests, *already_seated, guest, round)?;
            }
            seated.push(guest);
            guests[guest].seat_at(self.index);
            Ok(())
        }

        pub fn guests_in_round(&self, round: Round) -> &[Index] {
            self.rounds.get(&round).map(Vec::as_slice).unwrap_or(&[])
        }

        pub fn occupancy(&self, round: Round) -> usize {
            self.guests_in_round(round).len()
        }

        pub fn total_guests_served(&self) -> usize {
            self.rounds.values().map(Vec::len).sum()
        }
    }
}

pub mod condition {
    use std::fmt;

    pub type Score = f64;

    /// Rating of a single meeting; meeting the same guest `n` times rates `BASE_GUEST_RATING^n`.
    pub const BASE_GUEST_RATING: Score = 2.0;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Parameter {
        Score,
        Diversity,
        FollowUps,
    }

    impl fmt::Display for Parameter {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let name = match self {
                Parameter::Score => "SCORE",
                Parameter::Diversity => "DIVERSITY",
                Parameter::FollowUps => "FOLLOW_UPS",
            };
            f.write_str(name)
        }
    }

    /// Summary of one sample. The median is the upper median; an empty sample is all zeros.
    #[derive(Debug, Clone, PartialEq)]
    pub struct ParameterStats {
        pub parameter: Parameter,
        pub min: Score,
        pub max: Score,
        pub avg: Score,
        pub med: Score,
    }

    impl ParameterStats {
        pub fn empty(parameter: Parameter) -> ParameterStats {
            ParameterStats { parameter, min: 0.0, max: 0.0, avg: 0.0, med: 0.0 }
        }

        pub fn calculate(parameter: Parameter, values: &[Score]) -> ParameterStats {
            if values.is_empty() {
                return ParameterStats::empty(parameter);
            }
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            ParameterStats {
                parameter,
                min: sorted[0],
                max: sorted[sorted.len() - 1],
                avg: values.iter().sum::<Score>() / values.len() as Score,
                med: sorted[sorted.len() / 2],
            }
        }
    }

    impl fmt::Display for ParameterStats {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "{}: min = {:.2}, max = {:.2}, avg = {:.2}, med = {:.2}",
                self.parameter, self.min, self.max, self.avg, self.med
            )
        }
    }
}
