//! Built-in dispatching rules.
//!
//! # Categories
//!
//! - **Time-based**: SPT, LPT
//! - **Job progress**: MWKR, LWKR, MOR, FIFO
//! - **Due-date**: EDD
//! - **Other**: RANDOM, custom score closures
//!
//! # Score Convention
//! All rules return lower scores for higher priority operations.
//!
//! # References
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{DispatchingRule, RuleEngine, RuleScore, SchedulingContext};
use crate::error::{JobShopError, Result};
use crate::models::Operation;
use crate::validation::ValidationErrorKind;

// ======================== Time-based rules ========================

/// Shortest Processing Time.
///
/// Prioritizes operations with shorter duration.
///
/// # Reference
/// Smith (1956), optimal for minimizing mean flow time on single machine.
#[derive(Debug, Clone, Copy)]
pub struct Spt;

impl DispatchingRule for Spt {
    fn name(&self) -> &'static str {
        "SPT"
    }

    fn evaluate(&self, operation: &Operation, _context: &SchedulingContext) -> RuleScore {
        operation.duration as f64
    }

    fn description(&self) -> &'static str {
        "Shortest Processing Time"
    }
}

/// Longest Processing Time.
///
/// Prioritizes operations with longer duration.
#[derive(Debug, Clone, Copy)]
pub struct Lpt;

impl DispatchingRule for Lpt {
    fn name(&self) -> &'static str {
        "LPT"
    }

    fn evaluate(&self, operation: &Operation, _context: &SchedulingContext) -> RuleScore {
        -(operation.duration as f64)
    }

    fn description(&self) -> &'static str {
        "Longest Processing Time"
    }
}

// ======================== Job progress rules ========================

fn remaining_work(operation: &Operation, context: &SchedulingContext) -> u64 {
    context
        .remaining_work
        .get(operation.job_id)
        .copied()
        .unwrap_or(operation.duration)
}

/// Most Work Remaining.
///
/// Prioritizes jobs with the most uncompleted work (ongoing operations
/// included). Falls back to the operation's duration when the context
/// has no entry for its job.
#[derive(Debug, Clone, Copy)]
pub struct Mwkr;

impl DispatchingRule for Mwkr {
    fn name(&self) -> &'static str {
        "MWKR"
    }

    fn evaluate(&self, operation: &Operation, context: &SchedulingContext) -> RuleScore {
        -(remaining_work(operation, context) as f64)
    }

    fn description(&self) -> &'static str {
        "Most Work Remaining"
    }
}

/// Least Work Remaining.
///
/// Prioritizes jobs closest to completion.
#[derive(Debug, Clone, Copy)]
pub struct Lwkr;

impl DispatchingRule for Lwkr {
    fn name(&self) -> &'static str {
        "LWKR"
    }

    fn evaluate(&self, operation: &Operation, context: &SchedulingContext) -> RuleScore {
        remaining_work(operation, context) as f64
    }

    fn description(&self) -> &'static str {
        "Least Work Remaining"
    }
}

/// Most Operations Remaining.
#[derive(Debug, Clone, Copy)]
pub struct Mor;

impl DispatchingRule for Mor {
    fn name(&self) -> &'static str {
        "MOR"
    }

    fn evaluate(&self, operation: &Operation, context: &SchedulingContext) -> RuleScore {
        let remaining = context
            .remaining_operations
            .get(operation.job_id)
            .copied()
            .unwrap_or(1);
        -(remaining as f64)
    }

    fn description(&self) -> &'static str {
        "Most Operations Remaining"
    }
}

/// First In First Out by position in job.
///
/// Operations earlier in their job go first.
#[derive(Debug, Clone, Copy)]
pub struct Fifo;

impl DispatchingRule for Fifo {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn evaluate(&self, operation: &Operation, _context: &SchedulingContext) -> RuleScore {
        operation.position_in_job as f64
    }

    fn description(&self) -> &'static str {
        "First In First Out"
    }
}

// ======================== Due-date rules ========================

/// Earliest Due Date.
///
/// Uses the operation's due date, then its deadline. Operations without
/// either go last.
///
/// # Reference
/// Jackson (1955), optimal for minimizing maximum lateness on single machine.
#[derive(Debug, Clone, Copy)]
pub struct Edd;

impl DispatchingRule for Edd {
    fn name(&self) -> &'static str {
        "EDD"
    }

    fn evaluate(&self, operation: &Operation, _context: &SchedulingContext) -> RuleScore {
        operation
            .due_date
            .or(operation.deadline)
            .map_or(f64::MAX, |due| due as f64)
    }

    fn description(&self) -> &'static str {
        "Earliest Due Date"
    }
}

// ======================== Other rules ========================

/// Uniformly random priority.
///
/// Each evaluation draws a fresh score, so the engine's pick among the
/// candidates is uniform. Seed it for reproducible runs.
#[derive(Debug)]
pub struct RandomRule {
    rng: Mutex<StdRng>,
}

impl RandomRule {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng: Mutex::new(rng) }
    }
}

impl DispatchingRule for RandomRule {
    fn name(&self) -> &'static str {
        "RANDOM"
    }

    fn evaluate(&self, _operation: &Operation, _context: &SchedulingContext) -> RuleScore {
        match self.rng.lock() {
            Ok(mut rng) => rng.random::<f64>(),
            Err(poisoned) => poisoned.into_inner().random::<f64>(),
        }
    }

    fn description(&self) -> &'static str {
        "Random"
    }
}

type ScoreFn = dyn Fn(&Operation, &SchedulingContext) -> RuleScore + Send + Sync;

/// A rule backed by a closure.
///
/// Stack several of them in a [`RuleEngine`] to get score-based
/// selection with ordered tie-breakers.
pub struct ScoreRule {
    name: &'static str,
    score: Box<ScoreFn>,
}

impl ScoreRule {
    pub fn new<F>(name: &'static str, score: F) -> Self
    where
        F: Fn(&Operation, &SchedulingContext) -> RuleScore + Send + Sync + 'static,
    {
        Self {
            name,
            score: Box::new(score),
        }
    }
}

impl fmt::Debug for ScoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScoreRule").field("name", &self.name).finish()
    }
}

impl DispatchingRule for ScoreRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn evaluate(&self, operation: &Operation, context: &SchedulingContext) -> RuleScore {
        (self.score)(operation, context)
    }
}

// ======================== Named rules ========================

/// Built-in rules selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchingRuleType {
    ShortestProcessingTime,
    FirstComeFirstServed,
    MostWorkRemaining,
    MostOperationsRemaining,
    LargestProcessingTime,
    Random,
}

impl DispatchingRuleType {
    pub const ALL: [Self; 6] = [
        Self::ShortestProcessingTime,
        Self::FirstComeFirstServed,
        Self::MostWorkRemaining,
        Self::MostOperationsRemaining,
        Self::LargestProcessingTime,
        Self::Random,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::ShortestProcessingTime => "shortest_processing_time",
            Self::FirstComeFirstServed => "first_come_first_served",
            Self::MostWorkRemaining => "most_work_remaining",
            Self::MostOperationsRemaining => "most_operations_remaining",
            Self::LargestProcessingTime => "largest_processing_time",
            Self::Random => "random",
        }
    }

    /// A single-rule engine for this name; `seed` only matters for `Random`.
    pub fn build(self, seed: Option<u64>) -> RuleEngine {
        let engine = RuleEngine::new();
        match self {
            Self::ShortestProcessingTime => engine.with_rule(Spt),
            Self::FirstComeFirstServed => engine.with_rule(Fifo),
            Self::MostWorkRemaining => engine.with_rule(Mwkr),
            Self::MostOperationsRemaining => engine.with_rule(Mor),
            Self::LargestProcessingTime => engine.with_rule(Lpt),
            Self::Random => engine.with_rule(RandomRule::new(seed)),
        }
    }
}

impl fmt::Display for DispatchingRuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DispatchingRuleType {
    type Err = JobShopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                JobShopError::validation(
                    ValidationErrorKind::UnknownName,
                    format!(
                        "Dispatching rule '{s}' not recognized. Available rules: {}.",
                        Self::ALL.map(Self::name).join(", ")
                    ),
                )
            })
    }
}
