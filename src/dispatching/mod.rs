//! Incremental dispatching: the [`Dispatcher`] and its decision points.
//!
//! The dispatcher owns a [`Schedule`](crate::models::Schedule) and grows
//! it one operation at a time. Heuristics plug in at four places:
//!
//! | Decision point | Type | Module |
//! |----------------|------|--------|
//! | which ready operations to consider | [`ReadyOperationFilter`] | [`filters`] |
//! | when an operation starts | [`StartTimeCalculator`] | [`start_time`] |
//! | which operation goes next | [`DispatchingRule`] via [`RuleEngine`] | [`rules`] |
//! | which machine it runs on | [`MachineChooser`] | [`machine_chooser`] |
//!
//! # Usage
//!
//! ```
//! use jobshop_dispatch::dispatching::{rules, Dispatcher, RuleEngine};
//! use jobshop_dispatch::models::{JobShopInstance, Operation};
//!
//! let instance = JobShopInstance::new(
//!     vec![vec![Operation::single(0, 3)], vec![Operation::single(0, 1)]],
//!     "two jobs",
//! )
//! .unwrap();
//! let mut dispatcher = Dispatcher::new(instance);
//! let engine = RuleEngine::new().with_rule(rules::Spt);
//!
//! let next = engine.select(&dispatcher).unwrap().clone();
//! dispatcher.dispatch_on_only_machine(&next).unwrap();
//! assert_eq!(next.duration, 1);
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 4
//! - Haupt (1989), "A Survey of Priority Rule-Based Scheduling"

mod context;
mod dispatcher;
mod engine;
pub mod filters;
pub mod machine_chooser;
pub mod observer;
pub mod rules;
pub mod start_time;

pub use context::SchedulingContext;
pub use dispatcher::{Dispatcher, DispatcherState};
pub use engine::{EvaluationMode, RuleEngine, TieBreaker};
pub use filters::{ReadyOperationFilter, ReadyOperationFilterType};
pub use machine_chooser::{MachineChooser, MachineChooserType};
pub use observer::{
    DispatcherObserver, HistoryObserver, ObserverId, ObserverKind, OptimalOperationsObserver,
    UnscheduledOperationsObserver,
};
pub use rules::DispatchingRuleType;
pub use start_time::StartTimeCalculator;

use crate::models::Operation;
use std::fmt::Debug;

/// Score returned by a dispatching rule.
///
/// Lower scores = higher priority (dispatched first).
pub type RuleScore = f64;

/// A dispatching rule that evaluates operation priority.
///
/// # Score Convention
/// **Lower score = higher priority.** Rules should return smaller values
/// for operations that should be dispatched first.
///
/// # Reference
/// Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching
pub trait DispatchingRule: Send + Sync + Debug {
    /// Rule name (e.g., "SPT", "MWKR").
    fn name(&self) -> &'static str;

    /// Evaluates the priority of an operation given the current context.
    ///
    /// Returns a score where lower = higher priority.
    fn evaluate(&self, operation: &Operation, context: &SchedulingContext) -> RuleScore;

    /// Rule description.
    fn description(&self) -> &'static str {
        self.name()
    }
}
