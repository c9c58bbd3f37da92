use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::allocator::TableAllocator;
use crate::config::PlannerConfig;
use crate::error::SeatingError;
use crate::model::condition::{Parameter, ParameterStats, Score, BASE_GUEST_RATING};
use crate::model::entity::{Guest, Id, Round, Table};
use crate::usher::{Usher, UsherState};

#[derive(Debug, Clone, PartialEq)]
pub struct PlanStats {
    pub guest_scores: ParameterStats,
    pub diversities: ParameterStats,
    pub follow_ups: ParameterStats,
}

impl Default for PlanStats {
    fn default() -> Self {
        PlanStats {
            guest_scores: ParameterStats::empty(Parameter::Score),
            diversities: ParameterStats::empty(Parameter::Diversity),
            follow_ups: ParameterStats::empty(Parameter::FollowUps),
        }
    }
}

impl PlanStats {
    fn calculate(guests: &[Guest]) -> PlanStats {
        PlanStats {
            guest_scores: ParameterStats::calculate(Parameter::Score, &sample(guests, Guest::score)),
            diversities: ParameterStats::calculate(Parameter::Diversity, &sample(guests, |g| g.diversity() as Score)),
            follow_ups: ParameterStats::calculate(Parameter::FollowUps, &sample(guests, |g| g.follow_ups() as Score)),
        }
    }
}

fn sample(guests: &[Guest], f: impl Fn(&Guest) -> Score) -> Vec<Score> {
    guests.iter().map(f).collect()
}

/// One candidate seating of all guests over all sessions.
///
/// Every plan owns its guests and tables outright, so plans can be generated
/// on separate threads without sharing anything.
#[derive(Debug, Clone)]
pub struct TablePlan {
    guests: Vec<Guest>,
    tables: Vec<Table>,
    sessions: Round,
    usher: Usher,
    stats: PlanStats,
}

impl TablePlan {
    pub fn new(guests: Vec<Guest>, tables: Vec<Table>, sessions: Round, usher: Usher) -> TablePlan {
        TablePlan { guests, tables, sessions, usher, stats: PlanStats::default() }
    }

    pub fn run(&mut self) -> Result<(), SeatingError> {
        self.usher.run(&mut self.guests, &mut self.tables)?;
        self.stats = PlanStats::calculate(&self.guests);
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.usher.state() == UsherState::Complete
    }

    pub fn guests(&self) -> &[Guest] {
        &self.guests
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn sessions(&self) -> Round {
        self.sessions
    }

    pub fn allocator(&self) -> TableAllocator {
        self.usher.allocator()
    }

    pub fn stats(&self) -> &PlanStats {
        &self.stats
    }

    /// 1 when every table served the same number of guests per round.
    pub fn table_score(&self) -> Score {
        let per_table = self.guests.len() as Score / self.tables.len() as Score;
        1.0 + self
            .tables
            .iter()
            .map(|table| (table.total_guests_served() as Score / self.sessions as Score - per_table).abs())
            .sum::<Score>()
    }

    /// 1 when no two guests follow each other to the next table.
    pub fn follow_ups_score(&self) -> Score {
        let follow_ups = &self.stats.follow_ups;
        (follow_ups.max + (follow_ups.med - follow_ups.avg)).max(1.0)
    }

    /// 1 when every guest met the same number of other guests.
    pub fn diversity_score(&self) -> Score {
        1.0 + (self.stats.diversities.max - self.stats.diversities.min)
    }

    pub fn average_guest_score(&self) -> Score {
        self.stats.guest_scores.avg
    }

    /// Composite badness, lower is better.
    pub fn rating(&self) -> Score {
        self.follow_ups_score() * self.diversity_score() * self.average_guest_score() * self.table_score()
    }
}

/// Builds fresh, independent plans for one configuration.
#[derive(Debug, Clone)]
pub struct PlanFactory {
    sessions: Round,
    table_names: Vec<Id>,
    guest_names: Vec<Id>,
    allocator: TableAllocator,
}

impl PlanFactory {
    /// Without an explicit allocator, look-ahead is used up to the ideal seating
    /// threshold and least-guests above it.
    pub fn new(
        sessions: Round,
        table_names: Vec<Id>,
        guest_names: Vec<Id>,
        allocator: Option<TableAllocator>,
    ) -> PlanFactory {
        let mut factory = PlanFactory {
            sessions,
            table_names,
            guest_names,
            allocator: TableAllocator::LookAhead,
        };
        factory.allocator = allocator.unwrap_or(if factory.no_of_guests() <= factory.ideal_seating_threshold() {
            TableAllocator::LookAhead
        } else {
            TableAllocator::LeastGuestsRandom
        });
        factory
    }

    pub fn from_config(config: &PlannerConfig) -> PlanFactory {
        PlanFactory::new(
            config.sessions,
            config.table_names.clone(),
            config.guest_names.clone(),
            config.allocator,
        )
    }

    pub fn no_of_tables(&self) -> usize {
        self.table_names.len()
    }

    pub fn no_of_guests(&self) -> usize {
        self.guest_names.len()
    }

    pub fn sessions(&self) -> Round {
        self.sessions
    }

    pub fn allocator(&self) -> TableAllocator {
        self.allocator
    }

    /// Largest guest count at which nobody has to meet anyone twice.
    pub fn ideal_seating_threshold(&self) -> usize {
        self.no_of_tables() * self.sessions.saturating_sub(1)
    }

    /// Rating a plan reaches when it cannot be improved; used to stop searching early.
    pub fn perfect_rating(&self) -> Score {
        if self.no_of_guests() == self.ideal_seating_threshold() {
            BASE_GUEST_RATING
        } else {
            // table score cannot reach 1 when tables see uneven numbers of guests
            BASE_GUEST_RATING * 2.0
        }
    }

    pub fn new_plan(&self) -> TablePlan {
        self.plan_with_rng(SmallRng::from_entropy())
    }

    pub fn new_seeded_plan(&self, seed: u64) -> TablePlan {
        self.plan_with_rng(SmallRng::seed_from_u64(seed))
    }

    fn plan_with_rng(&self, rng: SmallRng) -> TablePlan {
        let guests = self.guest_names.iter().enumerate().map(|(i, name)| Guest::new(i, name.as_str())).collect();
        let tables = self.table_names.iter().enumerate().map(|(i, name)| Table::new(i, name.as_str())).collect();
        TablePlan::new(guests, tables, self.sessions, Usher::new(self.sessions, self.allocator, rng))
    }
}
