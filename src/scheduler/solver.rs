//! Dispatching-rule solver.
//!
//! # Algorithm
//!
//! Until the schedule is complete:
//! 1. The rule engine picks one of the dispatcher's available operations.
//! 2. The machine chooser picks one of its candidate machines.
//! 3. The dispatcher schedules it at the earliest allowed start.
//!
//! # Complexity
//! O(n * (j + f)) where n = operations, j = jobs (candidates per step) and
//! f = the cost of the ready-operation filter.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dispatching::filters::ready_operation_filter_factory;
use crate::dispatching::{
    Dispatcher, DispatchingRuleType, MachineChooser, MachineChooserType, ReadyOperationFilter,
    ReadyOperationFilterType, RuleEngine,
};
use crate::error::Result;
use crate::models::{JobShopInstance, Schedule};

/// Named configuration of a [`DispatchingRuleSolver`].
///
/// ```
/// use jobshop_dispatch::scheduler::SolverConfig;
///
/// let config: SolverConfig = serde_json::from_str(
///     r#"{"dispatching_rule": "shortest_processing_time", "seed": 3}"#,
/// ).unwrap();
/// assert_eq!(config.machine_chooser.name(), "first");
/// assert_eq!(config.ready_operation_filters.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub dispatching_rule: DispatchingRuleType,
    pub machine_chooser: MachineChooserType,
    /// Applied left to right; empty means no filtering.
    pub ready_operation_filters: Vec<ReadyOperationFilterType>,
    /// Seeds every random rule and chooser.
    pub seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            dispatching_rule: DispatchingRuleType::MostWorkRemaining,
            machine_chooser: MachineChooserType::First,
            ready_operation_filters: vec![ReadyOperationFilterType::DominatedOperations],
            seed: None,
        }
    }
}

/// Greedy constructive solver driven by a rule engine.
///
/// # Example
///
/// ```
/// use jobshop_dispatch::models::{JobShopInstance, Operation};
/// use jobshop_dispatch::scheduler::DispatchingRuleSolver;
///
/// let instance = JobShopInstance::new(
///     vec![
///         vec![Operation::single(0, 2), Operation::single(1, 1)],
///         vec![Operation::single(1, 3), Operation::single(0, 2)],
///     ],
///     "2x2",
/// ).unwrap();
///
/// let schedule = DispatchingRuleSolver::new().solve(instance).unwrap();
/// assert!(schedule.is_complete());
/// ```
pub struct DispatchingRuleSolver {
    rule_engine: RuleEngine,
    machine_chooser: Box<dyn MachineChooser>,
    ready_operation_filter: Option<ReadyOperationFilter>,
}

impl DispatchingRuleSolver {
    /// Most work remaining, first machine, dominated-operation filter.
    pub fn new() -> Self {
        Self::from_config(&SolverConfig::default())
    }

    pub fn from_config(config: &SolverConfig) -> Self {
        Self {
            rule_engine: config.dispatching_rule.build(config.seed),
            machine_chooser: config.machine_chooser.build(config.seed),
            ready_operation_filter: ready_operation_filter_factory(&config.ready_operation_filters),
        }
    }

    /// Replaces the rule engine.
    pub fn with_rule_engine(mut self, engine: RuleEngine) -> Self {
        self.rule_engine = engine;
        self
    }

    /// Replaces the machine chooser.
    pub fn with_machine_chooser<C: MachineChooser + 'static>(mut self, chooser: C) -> Self {
        self.machine_chooser = Box::new(chooser);
        self
    }

    /// Replaces the filter used by [`solve`](Self::solve); `None` disables
    /// filtering.
    pub fn with_ready_operation_filter(mut self, filter: Option<ReadyOperationFilter>) -> Self {
        self.ready_operation_filter = filter;
        self
    }

    pub fn rule_engine(&self) -> &RuleEngine {
        &self.rule_engine
    }

    /// Solves `instance` on a fresh dispatcher carrying this solver's filter.
    pub fn solve(&self, instance: impl Into<Arc<JobShopInstance>>) -> Result<Schedule> {
        let mut dispatcher = Dispatcher::new(instance);
        if let Some(filter) = &self.ready_operation_filter {
            dispatcher = dispatcher.with_ready_operation_filter(Arc::clone(filter));
        }
        self.solve_with(&mut dispatcher)?;
        Ok(dispatcher.into_schedule())
    }

    /// Completes the dispatcher's schedule from its current state, using
    /// the dispatcher's own filter and start-time calculator.
    ///
    /// # Errors
    /// `EmptyCandidates` if the filter leaves nothing to dispatch before
    /// the schedule is complete, plus any dispatch error.
    pub fn solve_with(&self, dispatcher: &mut Dispatcher) -> Result<()> {
        debug!(
            instance = dispatcher.instance().name(),
            rules = ?self.rule_engine.rule_names(),
            chooser = self.machine_chooser.name(),
            "solving"
        );
        while !dispatcher.schedule().is_complete() {
            self.step(dispatcher)?;
        }
        debug!(
            instance = dispatcher.instance().name(),
            makespan = dispatcher.schedule().makespan(),
            "solved"
        );
        Ok(())
    }

    /// Dispatches one operation.
    pub fn step(&self, dispatcher: &mut Dispatcher) -> Result<()> {
        let operation = self.rule_engine.select(dispatcher)?.clone();
        let machine_id = self.machine_chooser.choose(dispatcher, &operation)?;
        dispatcher.dispatch(&operation, machine_id)
    }
}

impl Default for DispatchingRuleSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchingRuleSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchingRuleSolver")
            .field("rule_engine", &self.rule_engine)
            .field("machine_chooser", &self.machine_chooser.name())
            .field("has_filter", &self.ready_operation_filter.is_some())
            .finish()
    }
}
