//! Observer protocol for dispatchers.
//!
//! Feature trackers, graph updaters, reward functions and history
//! recorders all follow dispatcher progress through one capability:
//! [`DispatcherObserver`]. Observers are notified synchronously, in
//! subscription order, after every dispatch and reset.
//!
//! While an observer is being notified the dispatcher's observer list is
//! detached, so observers cannot reach each other through the dispatcher.

use std::any::Any;
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use super::Dispatcher;
use crate::error::{JobShopError, Result};
use crate::models::{Operation, Schedule, ScheduledOperation};
use crate::validation::ValidationErrorKind;

/// Handle of a subscribed observer. Never reused within a dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

/// Receives dispatcher notifications.
pub trait DispatcherObserver: Send + 'static {
    /// Stable capability tag, used by
    /// [`Dispatcher::create_or_get_observer`].
    fn tag(&self) -> &'static str;

    /// Called after `scheduled_operation` has been added to the schedule.
    fn update(&mut self, dispatcher: &Dispatcher, scheduled_operation: &ScheduledOperation);

    /// Called after the dispatcher has been reset.
    fn reset(&mut self, dispatcher: &Dispatcher);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An observer type with a statically known tag.
pub trait ObserverKind: DispatcherObserver + Sized {
    /// Tag returned by [`DispatcherObserver::tag`].
    const TAG: &'static str;
}

/// Records every scheduled operation in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct HistoryObserver {
    history: Vec<ScheduledOperation>,
}

impl HistoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduled operations, oldest first.
    pub fn history(&self) -> &[ScheduledOperation] {
        &self.history
    }
}

impl ObserverKind for HistoryObserver {
    const TAG: &'static str = "history";
}

impl DispatcherObserver for HistoryObserver {
    fn tag(&self) -> &'static str {
        Self::TAG
    }

    fn update(&mut self, _dispatcher: &Dispatcher, scheduled_operation: &ScheduledOperation) {
        self.history.push(scheduled_operation.clone());
    }

    fn reset(&mut self, _dispatcher: &Dispatcher) {
        self.history.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Keeps, per job, a queue of operations not yet dispatched.
#[derive(Debug, Clone)]
pub struct UnscheduledOperationsObserver {
    queues: Vec<VecDeque<Operation>>,
}

impl UnscheduledOperationsObserver {
    /// Creates the observer from the dispatcher's current state.
    pub fn new(dispatcher: &Dispatcher) -> Self {
        let mut observer = Self { queues: Vec::new() };
        observer.rebuild(dispatcher);
        observer
    }

    /// Pending operations of one job, next first.
    pub fn job_queue(&self, job_id: usize) -> Option<&VecDeque<Operation>> {
        self.queues.get(job_id)
    }

    /// All pending operations, job by job.
    pub fn unscheduled_operations(&self) -> impl Iterator<Item = &Operation> {
        self.queues.iter().flatten()
    }

    pub fn num_unscheduled_operations(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    fn rebuild(&mut self, dispatcher: &Dispatcher) {
        self.queues = dispatcher
            .instance()
            .jobs()
            .iter()
            .zip(dispatcher.job_next_operation_index())
            .map(|(job, &next)| job[next..].iter().cloned().collect())
            .collect();
    }
}

impl ObserverKind for UnscheduledOperationsObserver {
    const TAG: &'static str = "unscheduled_operations";
}

impl DispatcherObserver for UnscheduledOperationsObserver {
    fn tag(&self) -> &'static str {
        Self::TAG
    }

    fn update(&mut self, _dispatcher: &Dispatcher, scheduled_operation: &ScheduledOperation) {
        if let Some(queue) = self.queues.get_mut(scheduled_operation.job_id()) {
            queue.pop_front();
        }
    }

    fn reset(&mut self, dispatcher: &Dispatcher) {
        self.rebuild(dispatcher);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Marks the available operations that agree with a complete reference
/// schedule.
///
/// An available operation is optimal while it is the next entry of its
/// reference machine sequence. Once the dispatcher deviates on a machine,
/// that machine's later reference entries stop matching.
#[derive(Debug, Clone)]
pub struct OptimalOperationsObserver {
    reference: Schedule,
    /// Per machine, how many operations have been dispatched on it.
    machine_next: Vec<usize>,
    optimal_available: BTreeSet<usize>,
}

impl OptimalOperationsObserver {
    /// Creates the observer from the dispatcher's current state.
    ///
    /// # Errors
    /// `InvalidShape` if `reference` is incomplete and `InstanceMismatch`
    /// if it solves a different instance than `dispatcher`.
    pub fn new(dispatcher: &Dispatcher, reference: Schedule) -> Result<Self> {
        if !reference.is_complete() {
            return Err(JobShopError::validation(
                ValidationErrorKind::InvalidShape,
                format!(
                    "Reference schedule must be complete: {} of {} operations scheduled",
                    reference.num_scheduled_operations(),
                    reference.instance().num_operations()
                ),
            ));
        }
        let same = Arc::ptr_eq(reference.instance(), dispatcher.instance())
            || reference.instance().as_ref() == dispatcher.instance().as_ref();
        if !same {
            return Err(JobShopError::validation(
                ValidationErrorKind::InstanceMismatch,
                format!(
                    "Reference schedule instance '{}' does not match dispatcher instance '{}'",
                    reference.instance().name(),
                    dispatcher.instance().name()
                ),
            ));
        }

        let mut observer = Self {
            machine_next: vec![0; reference.schedule().len()],
            reference,
            optimal_available: BTreeSet::new(),
        };
        observer.refresh(dispatcher);
        Ok(observer)
    }

    pub fn reference_schedule(&self) -> &Schedule {
        &self.reference
    }

    /// Ids of the optimal available operations, ascending.
    pub fn optimal_operations(&self) -> impl Iterator<Item = usize> + '_ {
        self.optimal_available.iter().copied()
    }

    pub fn is_optimal(&self, operation_id: usize) -> bool {
        self.optimal_available.contains(&operation_id)
    }

    fn refresh(&mut self, dispatcher: &Dispatcher) {
        let reference = &self.reference;
        let machine_next = &self.machine_next;
        self.optimal_available = dispatcher
            .available_operations()
            .into_iter()
            .filter(|operation| {
                let Some(placed) = reference.scheduled_operation(operation.operation_id) else {
                    return false;
                };
                let machine_id = placed.machine_id();
                reference.schedule()[machine_id]
                    .get(machine_next[machine_id])
                    .is_some_and(|next| next.operation_id() == operation.operation_id)
            })
            .map(|operation| operation.operation_id)
            .collect();
    }
}

impl ObserverKind for OptimalOperationsObserver {
    const TAG: &'static str = "optimal_operations";
}

impl DispatcherObserver for OptimalOperationsObserver {
    fn tag(&self) -> &'static str {
        Self::TAG
    }

    fn update(&mut self, dispatcher: &Dispatcher, scheduled_operation: &ScheduledOperation) {
        if let Some(next) = self.machine_next.get_mut(scheduled_operation.machine_id()) {
            *next += 1;
        }
        self.refresh(dispatcher);
    }

    fn reset(&mut self, dispatcher: &Dispatcher) {
        self.machine_next.fill(0);
        self.refresh(dispatcher);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
