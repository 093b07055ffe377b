//! The incremental dispatch engine.
//!
//! A [`Dispatcher`] owns one [`Schedule`] plus per-job and per-machine
//! availability state. Callers (rules, solvers, RL environments) ask it
//! which operations are ready, pick one and a machine, and call
//! [`Dispatcher::dispatch`]. Every mutation clears the query cache in full
//! and notifies subscribed observers in subscription order.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::filters::ReadyOperationFilter;
use super::observer::{DispatcherObserver, ObserverId, ObserverKind};
use super::start_time::{no_setup_time_calculator, StartTimeCalculator};
use crate::error::{JobShopError, Result};
use crate::models::{JobShopInstance, Operation, Schedule, ScheduledOperation};
use crate::validation::ValidationErrorKind;

/// Lifecycle of a dispatcher and its schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    /// Nothing dispatched yet.
    Empty,
    /// Some, but not all, operations dispatched.
    InProgress,
    /// Every operation dispatched; only `reset` leaves this state.
    Complete,
}

/// Memoised queries. All entries are dropped together on any mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Query {
    RawReadyOperations,
    AvailableOperations,
    CurrentTime,
    UnscheduledOperations,
    ScheduledOperations,
    AvailableMachines,
    AvailableJobs,
    OngoingOperations,
    CompletedOperations,
    UncompletedOperations,
}

#[derive(Debug, Clone)]
enum Cached {
    Ids(Vec<usize>),
    Time(u64),
}

struct Subscription {
    id: ObserverId,
    observer: Box<dyn DispatcherObserver>,
}

/// Drives the construction of a schedule one operation at a time.
///
/// # Example
/// ```
/// use jobshop_dispatch::dispatching::Dispatcher;
/// use jobshop_dispatch::models::{JobShopInstance, Operation};
///
/// let instance = JobShopInstance::new(
///     vec![vec![Operation::single(0, 3), Operation::single(1, 2)]],
///     "single-job",
/// ).unwrap();
/// let mut dispatcher = Dispatcher::new(instance);
///
/// loop {
///     let Some(operation) = dispatcher.available_operations().first().map(|op| (*op).clone()) else {
///         break;
///     };
///     dispatcher.dispatch(&operation, operation.machines[0]).unwrap();
/// }
/// assert_eq!(dispatcher.schedule().makespan(), 5);
/// ```
pub struct Dispatcher {
    instance: Arc<JobShopInstance>,
    schedule: Schedule,
    ready_operation_filter: Option<ReadyOperationFilter>,
    start_time_calculator: Option<StartTimeCalculator>,
    machine_next_available_time: Vec<u64>,
    job_next_operation_index: Vec<usize>,
    job_next_available_time: Vec<u64>,
    observers: Vec<Subscription>,
    next_observer_id: u64,
    cache: RefCell<HashMap<Query, Cached>>,
}

impl Dispatcher {
    /// Creates a dispatcher with no filter and the default start-time rule.
    pub fn new(instance: impl Into<Arc<JobShopInstance>>) -> Self {
        let instance = instance.into();
        Self {
            schedule: Schedule::new(Arc::clone(&instance)),
            machine_next_available_time: vec![0; instance.num_machines()],
            job_next_operation_index: vec![0; instance.num_jobs()],
            job_next_available_time: vec![0; instance.num_jobs()],
            instance,
            ready_operation_filter: None,
            start_time_calculator: None,
            observers: Vec::new(),
            next_observer_id: 0,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Sets the filter applied to ready operations.
    pub fn with_ready_operation_filter(mut self, filter: ReadyOperationFilter) -> Self {
        self.ready_operation_filter = Some(filter);
        self.cache.get_mut().clear();
        self
    }

    /// Sets the start-time calculator.
    pub fn with_start_time_calculator(mut self, calculator: StartTimeCalculator) -> Self {
        self.start_time_calculator = Some(calculator);
        self.cache.get_mut().clear();
        self
    }

    pub fn instance(&self) -> &Arc<JobShopInstance> {
        &self.instance
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Consumes the dispatcher, returning its schedule.
    pub fn into_schedule(self) -> Schedule {
        self.schedule
    }

    /// Time at which each machine becomes free.
    pub fn machine_next_available_time(&self) -> &[u64] {
        &self.machine_next_available_time
    }

    /// Position of the next unscheduled operation of each job.
    pub fn job_next_operation_index(&self) -> &[usize] {
        &self.job_next_operation_index
    }

    /// Time at which each job's last scheduled operation ends.
    pub fn job_next_available_time(&self) -> &[u64] {
        &self.job_next_available_time
    }

    pub fn state(&self) -> DispatcherState {
        match (self.schedule.is_empty(), self.schedule.is_complete()) {
            (true, _) => DispatcherState::Empty,
            (false, true) => DispatcherState::Complete,
            (false, false) => DispatcherState::InProgress,
        }
    }

    // ======================== Observers ========================

    /// Subscribes an observer; it is notified after every later dispatch
    /// and reset, after all observers subscribed before it.
    pub fn subscribe<O: DispatcherObserver>(&mut self, observer: O) -> ObserverId {
        self.subscribe_boxed(Box::new(observer))
    }

    /// Subscribes a boxed observer.
    pub fn subscribe_boxed(&mut self, observer: Box<dyn DispatcherObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        debug!(observer = observer.tag(), ?id, "observer subscribed");
        self.observers.push(Subscription { id, observer });
        id
    }

    /// Removes an observer, returning it.
    pub fn unsubscribe(&mut self, id: ObserverId) -> Option<Box<dyn DispatcherObserver>> {
        let index = self.observers.iter().position(|s| s.id == id)?;
        Some(self.observers.remove(index).observer)
    }

    /// Ids of subscribed observers, in notification order.
    pub fn observer_ids(&self) -> Vec<ObserverId> {
        self.observers.iter().map(|s| s.id).collect()
    }

    /// Typed access to a subscribed observer.
    pub fn observer<O: DispatcherObserver>(&self, id: ObserverId) -> Option<&O> {
        self.observers
            .iter()
            .find(|s| s.id == id)?
            .observer
            .as_any()
            .downcast_ref::<O>()
    }

    /// Typed mutable access to a subscribed observer.
    pub fn observer_mut<O: DispatcherObserver>(&mut self, id: ObserverId) -> Option<&mut O> {
        self.observers
            .iter_mut()
            .find(|s| s.id == id)?
            .observer
            .as_any_mut()
            .downcast_mut::<O>()
    }

    /// Returns the first subscribed observer of kind `O` accepted by
    /// `predicate`, or builds one with `build`, subscribes it and returns
    /// its id. Lets independent consumers share one tracker.
    pub fn create_or_get_observer<O: ObserverKind>(
        &mut self,
        predicate: impl Fn(&O) -> bool,
        build: impl FnOnce(&Dispatcher) -> O,
    ) -> ObserverId {
        match self.find_observer(predicate) {
            Some(id) => id,
            None => {
                let observer = build(self);
                self.subscribe(observer)
            }
        }
    }

    /// Like [`create_or_get_observer`](Self::create_or_get_observer), for
    /// observers whose construction can fail. Nothing is subscribed on error.
    pub fn try_create_or_get_observer<O: ObserverKind>(
        &mut self,
        predicate: impl Fn(&O) -> bool,
        build: impl FnOnce(&Dispatcher) -> Result<O>,
    ) -> Result<ObserverId> {
        match self.find_observer(predicate) {
            Some(id) => Ok(id),
            None => {
                let observer = build(self)?;
                Ok(self.subscribe(observer))
            }
        }
    }

    fn find_observer<O: ObserverKind>(&self, predicate: impl Fn(&O) -> bool) -> Option<ObserverId> {
        self.observers
            .iter()
            .filter(|s| s.observer.tag() == O::TAG)
            .find(|s| {
                s.observer
                    .as_any()
                    .downcast_ref::<O>()
                    .is_some_and(|observer| predicate(observer))
            })
            .map(|s| s.id)
    }

    // ======================== Mutation ========================

    /// Returns every piece of state, including the schedule, to its
    /// initial value and resets observers. Subscriptions are kept.
    pub fn reset(&mut self) {
        self.schedule.reset();
        self.machine_next_available_time.fill(0);
        self.job_next_operation_index.fill(0);
        self.job_next_available_time.fill(0);
        self.cache.get_mut().clear();

        let mut observers = std::mem::take(&mut self.observers);
        for subscription in &mut observers {
            subscription.observer.reset(self);
        }
        self.observers = observers;
        debug!(instance = self.instance.name(), "dispatcher reset");
    }

    /// Schedules `operation` on `machine_id` at the earliest start the
    /// start-time calculator allows.
    ///
    /// # Errors
    /// - `UnknownOperation` if the operation is not part of the instance
    /// - `OperationNotReady` if it is not its job's next operation
    /// - `InvalidMachine` if `machine_id` is not one of its candidates
    /// - `MachineOverlap` if the calculator returns a start before the
    ///   machine is free
    ///
    /// On error the dispatcher is unchanged.
    pub fn dispatch(&mut self, operation: &Operation, machine_id: usize) -> Result<()> {
        if self.instance.operation(operation.operation_id) != Some(operation) {
            return Err(JobShopError::validation(
                ValidationErrorKind::UnknownOperation,
                format!(
                    "Operation {} does not belong to instance '{}'",
                    operation.operation_id,
                    self.instance.name()
                ),
            ));
        }
        if !self.is_operation_ready(operation) {
            warn!(
                operation = operation.operation_id,
                job = operation.job_id,
                "dispatch of operation that is not ready"
            );
            return Err(JobShopError::validation(
                ValidationErrorKind::OperationNotReady,
                format!(
                    "Operation {} is not ready to be scheduled: job {} is at position {}, \
                     operation is at position {}.",
                    operation.operation_id,
                    operation.job_id,
                    self.job_next_operation_index[operation.job_id],
                    operation.position_in_job
                ),
            ));
        }
        if !operation.can_run_on(machine_id) || machine_id >= self.instance.num_machines() {
            return Err(JobShopError::validation(
                ValidationErrorKind::InvalidMachine,
                format!(
                    "Operation {} cannot be scheduled on machine {machine_id}. \
                     Valid machines are {:?}.",
                    operation.operation_id, operation.machines
                ),
            ));
        }

        let start_time = self.start_time(operation, machine_id);
        let scheduled_operation = ScheduledOperation::new(operation.clone(), start_time, machine_id)?;
        self.schedule.add(scheduled_operation.clone())?;

        let end_time = scheduled_operation.end_time();
        let job_id = scheduled_operation.job_id();
        self.machine_next_available_time[machine_id] = end_time;
        self.job_next_operation_index[job_id] += 1;
        self.job_next_available_time[job_id] = end_time;
        self.cache.get_mut().clear();

        debug!(
            operation = operation.operation_id,
            job = job_id,
            machine = machine_id,
            start = start_time,
            end = end_time,
            "dispatched"
        );

        let mut observers = std::mem::take(&mut self.observers);
        for subscription in &mut observers {
            subscription.observer.update(self, &scheduled_operation);
        }
        self.observers = observers;
        Ok(())
    }

    /// Dispatches an operation on its only candidate machine.
    ///
    /// # Errors
    /// `UninitializedAttribute` for operations with several candidates,
    /// plus every error of [`dispatch`](Self::dispatch).
    pub fn dispatch_on_only_machine(&mut self, operation: &Operation) -> Result<()> {
        let machine_id = operation.machine_id()?;
        self.dispatch(operation, machine_id)
    }

    // ======================== Queries ========================

    /// Whether `operation` is the next unscheduled operation of its job.
    pub fn is_operation_ready(&self, operation: &Operation) -> bool {
        self.job_next_operation_index
            .get(operation.job_id)
            .is_some_and(|&next| next == operation.position_in_job)
    }

    /// Start time of `operation` on `machine_id` under the configured
    /// calculator.
    pub fn start_time(&self, operation: &Operation, machine_id: usize) -> u64 {
        match &self.start_time_calculator {
            Some(calculator) => calculator(self, operation, machine_id),
            None => no_setup_time_calculator(self, operation, machine_id),
        }
    }

    /// Minimum start time over `operations` and all their candidate
    /// machines; the makespan if `operations` is empty.
    pub fn min_start_time(&self, operations: &[&Operation]) -> u64 {
        operations
            .iter()
            .flat_map(|op| op.machines.iter().map(move |&m| self.start_time(op, m)))
            .min()
            .unwrap_or_else(|| self.schedule.makespan())
    }

    /// Earliest start of `operation` over every candidate machine,
    /// ignoring any configured start-time calculator. Assumes the
    /// operation is ready.
    pub fn earliest_start_time(&self, operation: &Operation) -> u64 {
        let machine_time = operation
            .machines
            .iter()
            .filter_map(|&m| self.machine_next_available_time.get(m).copied())
            .min()
            .unwrap_or(0);
        let job_time = self
            .job_next_available_time
            .get(operation.job_id)
            .copied()
            .unwrap_or(0);
        machine_time.max(job_time)
    }

    /// The current time: the minimum start time of the available
    /// operations, or the makespan once none are left.
    pub fn current_time(&self) -> u64 {
        self.cached_time(Query::CurrentTime, |d| {
            d.min_start_time(&d.available_operations())
        })
    }

    /// Each job's next unscheduled operation, before filtering.
    pub fn raw_ready_operations(&self) -> Vec<&Operation> {
        let ids = self.cached_ids(Query::RawReadyOperations, |d| {
            d.job_next_operation_index
                .iter()
                .enumerate()
                .filter_map(|(job_id, &position)| d.instance.job(job_id)?.get(position))
                .map(|op| op.operation_id)
                .collect()
        });
        self.operations_by_id(&ids)
    }

    /// Ready operations after the configured filter.
    pub fn available_operations(&self) -> Vec<&Operation> {
        let ids = self.cached_ids(Query::AvailableOperations, |d| {
            let ready = d.raw_ready_operations();
            let available = match &d.ready_operation_filter {
                Some(filter) => filter(d, ready),
                None => ready,
            };
            available.iter().map(|op| op.operation_id).collect()
        });
        self.operations_by_id(&ids)
    }

    /// Operations not yet dispatched, job by job.
    pub fn unscheduled_operations(&self) -> Vec<&Operation> {
        let ids = self.cached_ids(Query::UnscheduledOperations, |d| {
            d.split_jobs(|job, next| &job[next..])
        });
        self.operations_by_id(&ids)
    }

    /// Operations already dispatched, job by job.
    pub fn scheduled_operations(&self) -> Vec<&Operation> {
        let ids = self.cached_ids(Query::ScheduledOperations, |d| {
            d.split_jobs(|job, next| &job[..next])
        });
        self.operations_by_id(&ids)
    }

    /// Machines that can process at least one available operation, ascending.
    pub fn available_machines(&self) -> Vec<usize> {
        self.cached_ids(Query::AvailableMachines, |d| {
            d.available_operations()
                .iter()
                .flat_map(|op| op.machines.iter().copied())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
    }

    /// Jobs with at least one available operation, ascending.
    pub fn available_jobs(&self) -> Vec<usize> {
        self.cached_ids(Query::AvailableJobs, |d| {
            d.available_operations()
                .iter()
                .map(|op| op.job_id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        })
    }

    /// Scheduled operations still running at the current time.
    ///
    /// Each machine's sequence is scanned from the end while operations
    /// end after the current time.
    pub fn ongoing_operations(&self) -> Vec<&ScheduledOperation> {
        let ids = self.cached_ids(Query::OngoingOperations, |d| {
            let current_time = d.current_time();
            let mut ids = Vec::new();
            for sequence in d.schedule.schedule() {
                for scheduled_operation in sequence.iter().rev() {
                    if scheduled_operation.end_time() <= current_time {
                        break;
                    }
                    ids.push(scheduled_operation.operation_id());
                }
            }
            ids
        });
        ids.iter()
            .filter_map(|&id| self.schedule.scheduled_operation(id))
            .collect()
    }

    /// Scheduled operations that have finished by the current time.
    pub fn completed_operations(&self) -> Vec<&Operation> {
        let ids = self.cached_ids(Query::CompletedOperations, |d| {
            let ongoing: HashSet<usize> = d
                .ongoing_operations()
                .iter()
                .map(|s| s.operation_id())
                .collect();
            d.scheduled_operations()
                .iter()
                .map(|op| op.operation_id)
                .filter(|id| !ongoing.contains(id))
                .collect()
        });
        self.operations_by_id(&ids)
    }

    /// Unscheduled operations followed by ongoing ones.
    pub fn uncompleted_operations(&self) -> Vec<&Operation> {
        let ids = self.cached_ids(Query::UncompletedOperations, |d| {
            d.unscheduled_operations()
                .iter()
                .map(|op| op.operation_id)
                .chain(d.ongoing_operations().iter().map(|s| s.operation_id()))
                .collect()
        });
        self.operations_by_id(&ids)
    }

    /// Time left until `scheduled_operation` ends, counted from the later of
    /// its start and the current time.
    pub fn remaining_duration(&self, scheduled_operation: &ScheduledOperation) -> u64 {
        let from = scheduled_operation.start_time.max(self.current_time());
        scheduled_operation.end_time().saturating_sub(from)
    }

    pub fn is_scheduled(&self, operation: &Operation) -> bool {
        self.job_next_operation_index
            .get(operation.job_id)
            .is_some_and(|&next| operation.position_in_job < next)
    }

    /// Whether `scheduled_operation` is running at the current time.
    pub fn is_ongoing(&self, scheduled_operation: &ScheduledOperation) -> bool {
        let current_time = self.current_time();
        scheduled_operation.start_time <= current_time && current_time < scheduled_operation.end_time()
    }

    /// The next unscheduled operation of `job_id`.
    ///
    /// # Errors
    /// `UnknownJob` for an invalid id, `NoOperationsLeft` once the job is
    /// fully scheduled.
    pub fn next_operation(&self, job_id: usize) -> Result<&Operation> {
        let job = self.instance.job(job_id).ok_or_else(|| {
            JobShopError::validation(
                ValidationErrorKind::UnknownJob,
                format!("Job {job_id} does not exist"),
            )
        })?;
        job.get(self.job_next_operation_index[job_id]).ok_or_else(|| {
            JobShopError::validation(
                ValidationErrorKind::NoOperationsLeft,
                format!("No more operations left for job {job_id} to schedule."),
            )
        })
    }

    // ======================== Cache ========================

    fn cached_ids(&self, query: Query, compute: impl FnOnce(&Self) -> Vec<usize>) -> Vec<usize> {
        if let Some(Cached::Ids(ids)) = self.cache.borrow().get(&query) {
            return ids.clone();
        }
        let ids = compute(self);
        trace!(?query, len = ids.len(), "query computed");
        self.cache.borrow_mut().insert(query, Cached::Ids(ids.clone()));
        ids
    }

    fn cached_time(&self, query: Query, compute: impl FnOnce(&Self) -> u64) -> u64 {
        if let Some(Cached::Time(time)) = self.cache.borrow().get(&query) {
            return *time;
        }
        let time = compute(self);
        trace!(?query, time, "query computed");
        self.cache.borrow_mut().insert(query, Cached::Time(time));
        time
    }

    fn operations_by_id(&self, ids: &[usize]) -> Vec<&Operation> {
        ids.iter()
            .filter_map(|&id| self.instance.operation(id))
            .collect()
    }

    fn split_jobs(&self, part: impl Fn(&[Operation], usize) -> &[Operation]) -> Vec<usize> {
        self.instance
            .jobs()
            .iter()
            .zip(&self.job_next_operation_index)
            .flat_map(|(job, &next)| part(job, next).iter().map(|op| op.operation_id))
            .collect()
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("instance", &self.instance.name())
            .field("scheduled", &self.schedule.num_scheduled_operations())
            .field("machine_next_available_time", &self.machine_next_available_time)
            .field("job_next_operation_index", &self.job_next_operation_index)
            .field("job_next_available_time", &self.job_next_available_time)
            .field(
                "observers",
                &self.observers.iter().map(|s| s.observer.tag()).collect::<Vec<_>>(),
            )
            .field("has_filter", &self.ready_operation_filter.is_some())
            .field("has_start_time_calculator", &self.start_time_calculator.is_some())
            .finish()
    }
}
