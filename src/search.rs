//! Parallel search for the best seating plan.
//!
//! A dispatcher job submits independent generation jobs to a fixed worker
//! pool. Each job builds a plan, runs it and sends the result down a channel.
//! The collector on the caller's thread reads results in completion order,
//! stops at the first perfect plan and otherwise keeps the best one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, trace, warn};

use crate::config::PlannerConfig;
use crate::error::{SearchError, SeatingError};
use crate::model::condition::Score;
use crate::plan::{PlanFactory, TablePlan};

/// What the collector needs to know about a finished plan.
pub trait Candidate {
    fn rating(&self) -> Score;
    fn max_follow_ups(&self) -> Score;
    fn table_score(&self) -> Score;
}

impl Candidate for TablePlan {
    fn rating(&self) -> Score {
        TablePlan::rating(self)
    }

    fn max_follow_ups(&self) -> Score {
        self.stats().follow_ups.max
    }

    fn table_score(&self) -> Score {
        TablePlan::table_score(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    pub perfect_rating: Score,
    pub max_follow_ups: usize,
    /// Table score is only trusted when tables and sessions line up.
    pub ignore_table_score: bool,
}

impl SearchCriteria {
    pub fn new(guests: usize, tables: usize, sessions: usize, perfect_rating: Score) -> SearchCriteria {
        SearchCriteria {
            perfect_rating,
            max_follow_ups: max_follow_ups(guests, tables),
            ignore_table_score: tables > sessions,
        }
    }

    pub fn for_factory(factory: &PlanFactory) -> SearchCriteria {
        SearchCriteria::new(
            factory.no_of_guests(),
            factory.no_of_tables(),
            factory.sessions(),
            factory.perfect_rating(),
        )
    }

    pub fn is_perfect(&self, candidate: &impl Candidate) -> bool {
        candidate.rating() == self.perfect_rating
    }

    pub fn accepts(&self, candidate: &impl Candidate) -> bool {
        candidate.max_follow_ups() <= self.max_follow_ups as Score
            && (self.ignore_table_score || candidate.table_score() == 1.0)
    }
}

/// Follow ups tolerated per guest: `ceil(log_tables(guests))`, computed as the
/// smallest power of `tables` reaching `guests`.
///
/// Some configurations force a pair to move on together; the cap spreads that
/// burden instead of letting the same two keep following each other.
pub fn max_follow_ups(guests: usize, tables: usize) -> usize {
    if tables < 2 {
        return guests;
    }
    std::iter::successors(Some(1usize), |reach| reach.checked_mul(tables))
        .take_while(|reach| *reach < guests)
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub iterations: usize,
    pub threads: usize,
    /// Job `i` is seeded with `seed + i` when set.
    pub seed: Option<u64>,
}

impl From<&PlannerConfig> for SearchParams {
    fn from(config: &PlannerConfig) -> Self {
        SearchParams { iterations: config.iterations, threads: config.threads, seed: config.seed }
    }
}

/// Shared state of one search.
///
/// The collector sets `solution_found`, the dispatcher reads it before every
/// submission. `terminated` makes still queued jobs return without work.
#[derive(Debug, Default)]
pub struct SearchContext {
    solution_found: Arc<AtomicBool>,
    terminated: Arc<AtomicBool>,
    processed: usize,
}

impl SearchContext {
    pub fn new() -> SearchContext {
        SearchContext::default()
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn solution_found(&self) -> bool {
        self.solution_found.load(Ordering::Acquire)
    }

    fn terminate(&self) {
        self.terminated.store(true, Ordering::Release);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection<P> {
    pub plan: P,
    pub perfect: bool,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub plan: TablePlan,
    pub perfect: bool,
    pub processed: usize,
    pub elapsed: Duration,
}

pub type TaskResult<P> = Result<P, SeatingError>;

/// Searches `params.iterations` random plans on `params.threads` workers.
pub fn search(factory: Arc<PlanFactory>, params: SearchParams) -> Result<SearchOutcome, SearchError> {
    let pool = build_pool(params.threads)?;
    let criteria = SearchCriteria::for_factory(&factory);
    info!(
        guests = factory.no_of_guests(),
        tables = factory.no_of_tables(),
        sessions = factory.sessions(),
        iterations = params.iterations,
        allocator = %factory.allocator(),
        perfect_rating = criteria.perfect_rating,
        "search started"
    );

    let start = Instant::now();
    let mut context = SearchContext::new();
    let (sender, receiver) = mpsc::channel();
    dispatch(Arc::clone(&pool), move |seed| generate(&factory, seed), params, &context, sender);
    let selection = collect(&receiver, &criteria, params.iterations, &mut context);
    context.terminate();
    drop(pool);

    let elapsed = start.elapsed();
    let selection = selection?;
    info!(
        processed = context.processed(),
        rating = selection.plan.rating(),
        perfect = selection.perfect,
        elapsed_ms = elapsed.as_millis() as u64,
        "search finished"
    );
    Ok(SearchOutcome {
        plan: selection.plan,
        perfect: selection.perfect,
        processed: context.processed(),
        elapsed,
    })
}

/// A panicking job is logged and dropped; its sender goes with it.
fn build_pool(threads: usize) -> Result<Arc<ThreadPool>, SearchError> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("planner-{i}"))
        .panic_handler(|_| warn!("plan generation panicked"))
        .build()?;
    Ok(Arc::new(pool))
}

fn dispatch<P, F>(
    pool: Arc<ThreadPool>,
    generate: F,
    params: SearchParams,
    context: &SearchContext,
    sender: Sender<TaskResult<P>>,
) where
    P: Send + 'static,
    F: Fn(Option<u64>) -> TaskResult<P> + Send + Sync + 'static,
{
    let solution_found = Arc::clone(&context.solution_found);
    let terminated = Arc::clone(&context.terminated);
    let generate = Arc::new(generate);
    let jobs = Arc::clone(&pool);
    pool.spawn(move || {
        for i in 0..params.iterations {
            if solution_found.load(Ordering::Acquire) {
                debug!(submitted = i, "solution found, dispatcher stopping");
                break;
            }
            let generate = Arc::clone(&generate);
            let terminated = Arc::clone(&terminated);
            let sender = sender.clone();
            let seed = params.seed.map(|seed| seed.wrapping_add(i as u64));
            jobs.spawn(move || {
                if terminated.load(Ordering::Acquire) {
                    return;
                }
                // the collector may already be gone
                let _ = sender.send(generate(seed));
            });
        }
    });
}

fn generate(factory: &PlanFactory, seed: Option<u64>) -> TaskResult<TablePlan> {
    let mut plan = match seed {
        Some(seed) => factory.new_seeded_plan(seed),
        None => factory.new_plan(),
    };
    plan.run()?;
    Ok(plan)
}

/// Consumes up to `iterations` results.
///
/// Returns the first perfect candidate straight away. Otherwise the lowest
/// rated accepted candidate wins, falling back to the lowest rated of all.
/// Failed jobs count as processed. When every sender is gone the collector
/// stops early instead of waiting for results that will never come.
pub fn collect<P: Candidate>(
    receiver: &Receiver<TaskResult<P>>,
    criteria: &SearchCriteria,
    iterations: usize,
    context: &mut SearchContext,
) -> Result<Selection<P>, SearchError> {
    let mut best_accepted: Option<P> = None;
    let mut best: Option<P> = None;

    while context.processed < iterations {
        let Ok(result) = receiver.recv() else {
            warn!(processed = context.processed, "all generators gone before the iteration budget was used");
            break;
        };
        context.processed += 1;
        let candidate = match result {
            Ok(candidate) => candidate,
            Err(err) => {
                warn!(error = %err, "plan generation failed");
                continue;
            }
        };
        trace!(rating = candidate.rating(), "plan received");

        if criteria.is_perfect(&candidate) {
            context.solution_found.store(true, Ordering::Release);
            debug!(processed = context.processed, "perfect plan found");
            return Ok(Selection { plan: candidate, perfect: true });
        }
        // `best` only keeps rejected plans, it is used when nothing was accepted
        let pool = if criteria.accepts(&candidate) { &mut best_accepted } else { &mut best };
        if is_better(&candidate, pool.as_ref()) {
            *pool = Some(candidate);
        }
    }

    match (best_accepted, best) {
        (Some(plan), _) => Ok(Selection { plan, perfect: false }),
        (None, Some(plan)) => {
            warn!(processed = context.processed, "no plan passed the filter, using the best overall");
            Ok(Selection { plan, perfect: false })
        }
        (None, None) => Err(SearchError::NoSuitableResult { processed: context.processed }),
    }
}

fn is_better<P: Candidate>(candidate: &P, current: Option<&P>) -> bool {
    current.map_or(true, |current| candidate.rating() < current.rating())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Fake {
        name: &'static str,
        rating: Score,
        follow_ups: Score,
        table_score: Score,
    }

    impl Candidate for Fake {
        fn rating(&self) -> Score {
            self.rating
        }
        fn max_follow_ups(&self) -> Score {
            self.follow_ups
        }
        fn table_score(&self) -> Score {
            self.table_score
        }
    }

    fn fake(name: &'static str, rating: Score, follow_ups: Score, table_score: Score) -> Fake {
        Fake { name, rating, follow_ups, table_score }
    }

    fn criteria(ignore_table_score: bool) -> SearchCriteria {
        SearchCriteria { perfect_rating: 2.0, max_follow_ups: 2, ignore_table_score }
    }

    fn run(results: Vec<TaskResult<Fake>>, iterations: usize, criteria: &SearchCriteria) -> (Result<Selection<Fake>, SearchError>, SearchContext) {
        let (sender, receiver) = mpsc::channel();
        for result in results {
            sender.send(result).unwrap();
        }
        drop(sender);
        let mut context = SearchContext::new();
        let selection = collect(&receiver, criteria, iterations, &mut context);
        (selection, context)
    }

    #[test]
    fn max_follow_ups_rounds_up() {
        assert_eq!(max_follow_ups(16, 4), 2);
        assert_eq!(max_follow_ups(17, 4), 3);
        assert_eq!(max_follow_ups(8, 4), 2);
        assert_eq!(max_follow_ups(9, 3), 2);
        assert_eq!(max_follow_ups(50, 3), 4);
    }

    #[test]
    fn ignores_table_score_when_more_tables_than_sessions() {
        assert!(SearchCriteria::new(16, 5, 4, 4.0).ignore_table_score);
        assert!(!SearchCriteria::new(16, 4, 4, 4.0).ignore_table_score);
        assert!(!SearchCriteria::new(16, 3, 4, 4.0).ignore_table_score);
    }

    #[test]
    fn ideal_candidate_passes_filter_either_way() {
        let ideal = fake("ideal", 3.0, 0.0, 1.0);
        assert!(criteria(false).accepts(&ideal));
        assert!(criteria(true).accepts(&ideal));
        let uneven = fake("uneven", 3.0, 0.0, 1.5);
        assert!(!criteria(false).accepts(&uneven));
        assert!(criteria(true).accepts(&uneven));
        assert!(!criteria(true).accepts(&fake("stuck", 3.0, 3.0, 1.0)));
    }

    #[test]
    fn perfect_candidate_stops_collection() {
        let results = vec![
            Ok(fake("a", 5.0, 0.0, 1.0)),
            Ok(fake("perfect", 2.0, 0.0, 1.0)),
            Ok(fake("b", 1.0, 0.0, 1.0)),
        ];
        let (selection, context) = run(results, 10, &criteria(false));
        let selection = selection.unwrap();
        assert_eq!(selection.plan.name, "perfect");
        assert!(selection.perfect);
        assert_eq!(context.processed(), 2);
        assert!(context.solution_found());
    }

    #[test]
    fn best_accepted_beats_better_rejected() {
        let results = vec![
            Ok(fake("rejected", 2.5, 5.0, 1.0)),
            Ok(fake("accepted-worse", 6.0, 1.0, 1.0)),
            Ok(fake("accepted", 4.0, 1.0, 1.0)),
        ];
        let (selection, context) = run(results, 3, &criteria(false));
        let selection = selection.unwrap();
        assert_eq!(selection.plan.name, "accepted");
        assert!(!selection.perfect);
        assert!(!context.solution_found());
    }

    #[test]
    fn falls_back_to_best_overall() {
        let results = vec![
            Ok(fake("a", 7.0, 5.0, 1.0)),
            Ok(fake("b", 3.0, 5.0, 1.0)),
            Ok(fake("c", 4.0, 0.0, 2.0)),
        ];
        let (selection, _) = run(results, 3, &criteria(false));
        assert_eq!(selection.unwrap().plan.name, "b");
    }

    #[test]
    fn respects_iteration_budget() {
        let results = vec![Ok(fake("a", 7.0, 0.0, 1.0)), Ok(fake("b", 3.0, 0.0, 1.0))];
        let (selection, context) = run(results, 1, &criteria(false));
        assert_eq!(selection.unwrap().plan.name, "a");
        assert_eq!(context.processed(), 1);
    }

    #[test]
    fn failed_jobs_do_not_block_the_collector() {
        let failure = SeatingError::NoCandidateTable { guest: "1".to_string(), round: 2 };
        let results = vec![Err(failure.clone()), Ok(fake("a", 7.0, 0.0, 1.0)), Err(failure)];
        let (selection, context) = run(results, 10, &criteria(false));
        assert_eq!(selection.unwrap().plan.name, "a");
        assert_eq!(context.processed(), 3);
    }

    #[test]
    fn nothing_usable_is_reported() {
        let failure = SeatingError::NoTables;
        let (selection, _) = run(vec![Err(failure)], 5, &criteria(false));
        assert!(matches!(selection, Err(SearchError::NoSuitableResult { processed: 1 })));
    }

    fn params(iterations: usize) -> SearchParams {
        SearchParams { iterations, threads: 2, seed: Some(0) }
    }

    fn counting_generator(calls: &Arc<AtomicUsize>) -> impl Fn(Option<u64>) -> TaskResult<Fake> + Send + Sync + 'static {
        let calls = Arc::clone(calls);
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(fake("generated", 5.0, 0.0, 1.0))
        }
    }

    #[test]
    fn dispatcher_submits_nothing_once_a_solution_is_found() {
        let pool = build_pool(2).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let context = SearchContext::new();
        context.solution_found.store(true, Ordering::Release);
        let (sender, receiver) = mpsc::channel();

        dispatch(Arc::clone(&pool), counting_generator(&calls), params(50), &context, sender);

        assert!(receiver.recv_timeout(Duration::from_secs(10)).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn terminated_search_runs_no_jobs() {
        let pool = build_pool(2).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let context = SearchContext::new();
        context.terminate();
        let (sender, receiver) = mpsc::channel();

        dispatch(Arc::clone(&pool), counting_generator(&calls), params(50), &context, sender);

        assert_eq!(receiver.iter().count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dispatched_jobs_fill_the_iteration_budget() {
        let pool = build_pool(2).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut context = SearchContext::new();
        let (sender, receiver) = mpsc::channel();

        dispatch(Arc::clone(&pool), counting_generator(&calls), params(20), &context, sender);
        let selection = collect(&receiver, &criteria(false), 20, &mut context).unwrap();

        assert_eq!(selection.plan.name, "generated");
        assert_eq!(context.processed(), 20);
    }

    #[test]
    fn panicking_job_does_not_stop_the_search() {
        let pool = build_pool(2).unwrap();
        let mut context = SearchContext::new();
        let (sender, receiver) = mpsc::channel();
        let generator = |seed: Option<u64>| -> TaskResult<Fake> {
            if seed == Some(2) {
                panic!("generator failed");
            }
            Ok(fake("survivor", 5.0, 0.0, 1.0))
        };

        dispatch(Arc::clone(&pool), generator, params(6), &context, sender);
        let selection = collect(&receiver, &criteria(false), 6, &mut context).unwrap();

        assert_eq!(selection.plan.name, "survivor");
        assert_eq!(context.processed(), 5);
    }
}
