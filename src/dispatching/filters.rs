//! Ready-operation filters.
//!
//! A filter prunes the ready operations a [`Dispatcher`] offers before a
//! rule picks one. Filters run inside the dispatcher's cached
//! `available_operations` query, so they must be pure functions of the
//! dispatcher state and must not call `available_operations` or
//! `current_time` themselves.
//!
//! # Built-ins
//!
//! | Filter | Keeps |
//! |--------|-------|
//! | `dominated_operations` | operations not finished-before-start by another on a shared machine |
//! | `non_immediate_machines` | operations on a machine where something can start now |
//! | `non_idle_machines` | operations with at least one candidate machine idle now |
//! | `non_immediate_operations` | operations that can start now |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Dispatcher;
use crate::error::{JobShopError, Result};
use crate::models::Operation;
use crate::validation::ValidationErrorKind;

/// Prunes ready operations; see the module docs for the purity contract.
pub type ReadyOperationFilter = Arc<
    dyn for<'a> Fn(&'a Dispatcher, Vec<&'a Operation>) -> Vec<&'a Operation> + Send + Sync,
>;

/// Wraps a closure as a [`ReadyOperationFilter`].
pub fn ready_operation_filter<F>(filter: F) -> ReadyOperationFilter
where
    F: for<'a> Fn(&'a Dispatcher, Vec<&'a Operation>) -> Vec<&'a Operation> + Send + Sync + 'static,
{
    Arc::new(filter)
}

/// Drops operations dominated on every candidate machine.
///
/// On a machine, the operation that can finish first dominates every
/// operation that could only start at or after that finish. The first
/// zero-duration operation found is returned alone.
pub fn filter_dominated_operations<'a>(
    dispatcher: &'a Dispatcher,
    operations: Vec<&'a Operation>,
) -> Vec<&'a Operation> {
    let mut min_end_times = vec![u64::MAX; dispatcher.instance().num_machines()];
    for operation in &operations {
        for &machine_id in &operation.machines {
            let end = dispatcher.start_time(operation, machine_id) + operation.duration;
            min_end_times[machine_id] = min_end_times[machine_id].min(end);
        }
    }

    let mut non_dominated = Vec::with_capacity(operations.len());
    for operation in operations {
        if operation.duration == 0 {
            return vec![operation];
        }
        let dominated_everywhere = operation
            .machines
            .iter()
            .all(|&m| dispatcher.start_time(operation, m) >= min_end_times[m]);
        if !dominated_everywhere {
            non_dominated.push(operation);
        }
    }
    non_dominated
}

/// Keeps operations with a candidate machine on which some ready
/// operation can start at the minimum start time.
pub fn filter_non_immediate_machines<'a>(
    dispatcher: &'a Dispatcher,
    operations: Vec<&'a Operation>,
) -> Vec<&'a Operation> {
    let current_time = dispatcher.min_start_time(&operations);
    let mut immediate = vec![false; dispatcher.instance().num_machines()];
    for operation in &operations {
        for &machine_id in &operation.machines {
            if dispatcher.start_time(operation, machine_id) == current_time {
                immediate[machine_id] = true;
            }
        }
    }
    operations
        .into_iter()
        .filter(|op| op.machines.iter().any(|&m| immediate[m]))
        .collect()
}

/// Keeps operations with at least one candidate machine that is free at
/// the minimum start time.
pub fn filter_non_idle_machines<'a>(
    dispatcher: &'a Dispatcher,
    operations: Vec<&'a Operation>,
) -> Vec<&'a Operation> {
    let current_time = dispatcher.min_start_time(&operations);
    let machine_free = dispatcher.machine_next_available_time();
    operations
        .into_iter()
        .filter(|op| op.machines.iter().any(|&m| machine_free[m] <= current_time))
        .collect()
}

/// Keeps operations that can start at the minimum start time on some
/// candidate machine.
pub fn filter_non_immediate_operations<'a>(
    dispatcher: &'a Dispatcher,
    operations: Vec<&'a Operation>,
) -> Vec<&'a Operation> {
    let current_time = dispatcher.min_start_time(&operations);
    operations
        .into_iter()
        .filter(|op| {
            op.machines
                .iter()
                .any(|&m| dispatcher.start_time(op, m) == current_time)
        })
        .collect()
}

/// Chains filters left to right; each sees the previous one's output.
pub fn compose_filters(filters: Vec<ReadyOperationFilter>) -> ReadyOperationFilter {
    ready_operation_filter(move |dispatcher, operations| {
        filters
            .iter()
            .fold(operations, |remaining, filter| filter(dispatcher, remaining))
    })
}

/// Serialisable names of the built-in filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyOperationFilterType {
    DominatedOperations,
    NonImmediateMachines,
    NonIdleMachines,
    NonImmediateOperations,
}

impl ReadyOperationFilterType {
    pub const ALL: [Self; 4] = [
        Self::DominatedOperations,
        Self::NonImmediateMachines,
        Self::NonIdleMachines,
        Self::NonImmediateOperations,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::DominatedOperations => "dominated_operations",
            Self::NonImmediateMachines => "non_immediate_machines",
            Self::NonIdleMachines => "non_idle_machines",
            Self::NonImmediateOperations => "non_immediate_operations",
        }
    }

    /// The filter function for this name.
    pub fn build(self) -> ReadyOperationFilter {
        match self {
            Self::DominatedOperations => Arc::new(filter_dominated_operations),
            Self::NonImmediateMachines => Arc::new(filter_non_immediate_machines),
            Self::NonIdleMachines => Arc::new(filter_non_idle_machines),
            Self::NonImmediateOperations => Arc::new(filter_non_immediate_operations),
        }
    }
}

impl fmt::Display for ReadyOperationFilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReadyOperationFilterType {
    type Err = JobShopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                JobShopError::validation(
                    ValidationErrorKind::UnknownName,
                    format!(
                        "Unsupported ready operation filter '{s}'. Supported values are {}.",
                        Self::ALL.map(Self::name).join(", ")
                    ),
                )
            })
    }
}

/// Builds the composition of the named filters, or `None` for an empty list.
pub fn ready_operation_filter_factory(
    filters: &[ReadyOperationFilterType],
) -> Option<ReadyOperationFilter> {
    match filters {
        [] => None,
        [single] => Some(single.build()),
        many => Some(compose_filters(many.iter().map(|f| f.build()).collect())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatching::start_time::arrival_calculator;
    use crate::models::JobShopInstance;

    fn ids(operations: &[&Operation]) -> Vec<usize> {
        operations.iter().map(|op| op.operation_id).collect()
    }

    /// j0 = [(m0, 1), (m1, 1), (m2, 7)], j1 = [(m1, 5), ...], j2 = [(m2, 1), ...]
    fn example_instance() -> Arc<JobShopInstance> {
        let jobs = vec![
            vec![Operation::single(0, 1), Operation::single(1, 1), Operation::single(2, 7)],
            vec![Operation::single(1, 5), Operation::single(2, 1), Operation::single(0, 1)],
            vec![Operation::single(2, 1), Operation::single(0, 3), Operation::single(1, 2)],
        ];
        Arc::new(JobShopInstance::new(jobs, "example").unwrap())
    }

    #[test]
    fn test_dominated_operations() {
        let instance = example_instance();
        let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
        dispatcher.dispatch(&instance.jobs()[0][0], 0).unwrap();
        // ready: j0op1 (m1, start 1, end 2), j1op0 (m1, start 0, end 5), j2op0 (m2)
        // j0op1 finishes at 2, j1op0 could start at 0 -> neither dominates.
        let kept = filter_dominated_operations(&dispatcher, dispatcher.raw_ready_operations());
        assert_eq!(ids(&kept), vec![1, 3, 6]);

        dispatcher.dispatch(&instance.jobs()[2][0], 2).unwrap();
        dispatcher.dispatch(&instance.jobs()[1][0], 1).unwrap();
        // ready: j0op1 (m1 start 5), j1op1 (m2 start 5, end 6), j2op1 (m0 start 1)
        let kept = filter_dominated_operations(&dispatcher, dispatcher.raw_ready_operations());
        assert_eq!(ids(&kept), vec![1, 4, 7]);
    }

    #[test]
    fn test_dominated_drops_late_starter() {
        let jobs = vec![
            vec![Operation::single(0, 2)],
            vec![Operation::single(1, 4), Operation::single(0, 3)],
        ];
        let instance = Arc::new(JobShopInstance::new(jobs, "dom").unwrap());
        let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
        dispatcher.dispatch(&instance.jobs()[1][0], 1).unwrap();
        // j0op0 on m0 ends at 2; j1op1 can only start on m0 at 4 -> dominated
        let kept = filter_dominated_operations(&dispatcher, dispatcher.raw_ready_operations());
        assert_eq!(ids(&kept), vec![0]);
    }

    #[test]
    fn test_dominated_zero_duration_short_circuit() {
        let jobs = vec![
            vec![Operation::single(0, 3)],
            vec![Operation::single(1, 0)],
            vec![Operation::single(0, 0)],
        ];
        let instance = Arc::new(JobShopInstance::new(jobs, "zero").unwrap());
        let dispatcher = Dispatcher::new(Arc::clone(&instance));
        let kept = filter_dominated_operations(&dispatcher, dispatcher.raw_ready_operations());
        assert_eq!(ids(&kept), vec![1]);
    }

    #[test]
    fn test_non_immediate_machines() {
        let instance = example_instance();
        let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
        dispatcher.dispatch(&instance.jobs()[0][0], 0).unwrap();
        dispatcher.dispatch(&instance.jobs()[1][0], 1).unwrap();
        // ready: j0op1 (m1 at 5), j1op1 (m2 at 5), j2op0 (m2 at 0)
        // only m2 has an operation starting at 0
        let kept = filter_non_immediate_machines(&dispatcher, dispatcher.raw_ready_operations());
        assert_eq!(ids(&kept), vec![4, 6]);
    }

    #[test]
    fn test_non_idle_machines() {
        let instance = example_instance();
        let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
        dispatcher.dispatch(&instance.jobs()[0][0], 0).unwrap();
        dispatcher.dispatch(&instance.jobs()[1][0], 1).unwrap();
        // current time 0: m1 busy until 5, m2 idle
        let kept = filter_non_idle_machines(&dispatcher, dispatcher.raw_ready_operations());
        assert_eq!(ids(&kept), vec![4, 6]);
    }

    #[test]
    fn test_non_immediate_operations() {
        let instance = example_instance();
        let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
        dispatcher.dispatch(&instance.jobs()[0][0], 0).unwrap();
        dispatcher.dispatch(&instance.jobs()[1][0], 1).unwrap();
        let kept = filter_non_immediate_operations(&dispatcher, dispatcher.raw_ready_operations());
        assert_eq!(ids(&kept), vec![6]);
    }

    #[test]
    fn test_non_immediate_operations_with_release_dates() {
        let jobs = vec![
            vec![Operation::single(0, 2).with_release_date(10)],
            vec![Operation::single(1, 2).with_release_date(12)],
        ];
        let instance = Arc::new(JobShopInstance::new(jobs, "released").unwrap());
        let dispatcher = Dispatcher::new(Arc::clone(&instance))
            .with_start_time_calculator(arrival_calculator(None))
            .with_ready_operation_filter(ReadyOperationFilterType::NonImmediateOperations.build());

        assert_eq!(dispatcher.current_time(), 10);
        assert_eq!(ids(&dispatcher.available_operations()), vec![0]);
    }

    #[test]
    fn test_compose_left_to_right() {
        let instance = example_instance();
        let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
        dispatcher.dispatch(&instance.jobs()[0][0], 0).unwrap();
        dispatcher.dispatch(&instance.jobs()[1][0], 1).unwrap();

        let keep_first = ready_operation_filter(|_, ops| ops.into_iter().take(1).collect());
        let composed = compose_filters(vec![
            ReadyOperationFilterType::NonImmediateOperations.build(),
            keep_first.clone(),
        ]);
        assert_eq!(ids(&composed(&dispatcher, dispatcher.raw_ready_operations())), vec![6]);

        let reversed = compose_filters(vec![
            keep_first,
            ReadyOperationFilterType::NonImmediateOperations.build(),
        ]);
        // j0op1 alone starts at 5, which is the minimum of what is left
        assert_eq!(ids(&reversed(&dispatcher, dispatcher.raw_ready_operations())), vec![1]);
    }

    #[test]
    fn test_filter_type_names() {
        for kind in ReadyOperationFilterType::ALL {
            assert_eq!(kind.name().parse::<ReadyOperationFilterType>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
        let err = "pruned".parse::<ReadyOperationFilterType>().unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::UnknownName));
    }

    #[test]
    fn test_factory() {
        assert!(ready_operation_filter_factory(&[]).is_none());
        let instance = example_instance();
        let dispatcher = Dispatcher::new(Arc::clone(&instance));
        let filter = ready_operation_filter_factory(&[
            ReadyOperationFilterType::DominatedOperations,
            ReadyOperationFilterType::NonImmediateOperations,
        ])
        .unwrap();
        assert_eq!(ids(&filter(&dispatcher, dispatcher.raw_ready_operations())), vec![0, 3, 6]);
    }
}
