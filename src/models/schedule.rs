//! Schedule (solution) model.
//!
//! A schedule holds, per machine, the operations assigned to it in
//! insertion order. Two invariants are enforced on every insertion and can
//! be checked in bulk:
//! - an entry stored under machine slot `m` runs on machine `m`;
//! - on each machine, every operation starts no earlier than the previous
//!   one ends.
//!
//! Job precedence is not checked here. The [`Dispatcher`] only offers
//! ready operations, and it is the only component that appends.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 7.1: Disjunctive Programming and Critical Paths

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{InstanceData, JobShopInstance, Metadata, Operation, ScheduledOperation};
use crate::dispatching::Dispatcher;
use crate::error::{JobShopError, Result};
use crate::validation::{validate_job_sequences, validate_operation_sequences, ValidationErrorKind};

/// A (possibly partial) solution to a job-shop instance.
#[derive(Debug, Clone)]
pub struct Schedule {
    instance: Arc<JobShopInstance>,
    schedule: Vec<Vec<ScheduledOperation>>,
    /// Free-form solver information (runtime, solver name, ...).
    pub metadata: Metadata,
    num_scheduled: usize,
    /// (machine, index) of the operation with the latest end time.
    latest: Option<(usize, usize)>,
    /// operation id → (machine, index)
    positions: Vec<Option<(usize, usize)>>,
}

impl Schedule {
    /// Creates an empty schedule for `instance`.
    pub fn new(instance: impl Into<Arc<JobShopInstance>>) -> Self {
        let instance = instance.into();
        let num_machines = instance.num_machines();
        let num_operations = instance.num_operations();
        Self {
            instance,
            schedule: vec![Vec::new(); num_machines],
            metadata: Metadata::new(),
            num_scheduled: 0,
            latest: None,
            positions: vec![None; num_operations],
        }
    }

    /// Creates a schedule from pre-built machine sequences.
    ///
    /// # Errors
    /// `InvalidShape` if there is not one sequence per machine, any error
    /// from [`check_schedule`](Self::check_schedule), or `UnknownOperation`
    /// if an entry does not belong to the instance.
    pub fn from_scheduled_operations(
        instance: impl Into<Arc<JobShopInstance>>,
        schedule: Vec<Vec<ScheduledOperation>>,
    ) -> Result<Self> {
        let mut result = Self::new(instance);
        if schedule.len() != result.schedule.len() {
            return Err(JobShopError::validation(
                ValidationErrorKind::InvalidShape,
                format!(
                    "Expected {} machine sequences, got {}",
                    result.schedule.len(),
                    schedule.len()
                ),
            ));
        }
        Self::check_schedule(&schedule)?;
        for scheduled_operation in schedule.into_iter().flatten() {
            result.add(scheduled_operation)?;
        }
        Ok(result)
    }

    /// Validates both schedule invariants over full machine sequences.
    ///
    /// Fails on the first violation, reporting the `[machine][index]`
    /// location and the conflicting times.
    pub fn check_schedule(schedule: &[Vec<ScheduledOperation>]) -> Result<()> {
        for (machine_id, sequence) in schedule.iter().enumerate() {
            for (i, scheduled_operation) in sequence.iter().enumerate() {
                if scheduled_operation.machine_id() != machine_id {
                    return Err(JobShopError::validation(
                        ValidationErrorKind::MachineMismatch,
                        format!(
                            "The machine id of the scheduled operation ({}) does not match \
                             the machine id of the machine schedule ({machine_id}). \
                             Index of the operation: [{machine_id}][{i}].",
                            scheduled_operation.machine_id()
                        ),
                    ));
                }
                if i == 0 {
                    continue;
                }
                let previous = &sequence[i - 1];
                if previous.end_time() > scheduled_operation.start_time {
                    return Err(JobShopError::validation(
                        ValidationErrorKind::MachineOverlap,
                        format!(
                            "Invalid schedule. The start time of the new operation is before \
                             the end time of the last operation on the same machine. \
                             End time of last operation: {}. Start time of new operation: {}. \
                             At index [{machine_id}][{i}].",
                            previous.end_time(),
                            scheduled_operation.start_time
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Replays per-machine job sequences into the active schedule they imply.
    ///
    /// `job_sequences[m]` lists job ids in the order machine `m` processes
    /// them. Each pass dispatches, for every machine, the head of its queue
    /// if that job's next operation is ready and can run on the machine. A
    /// pass without progress means the sequences are infeasible.
    ///
    /// When `dispatcher` is given it is reset and reused (its observers are
    /// notified of every dispatch); otherwise a fresh one is created.
    ///
    /// Job ids do not say which candidate machine a flexible operation ran
    /// on; [`from_operation_sequences`](Self::from_operation_sequences) does.
    ///
    /// # Errors
    /// `InvalidShape`/`UnknownJob` for malformed sequences,
    /// `InstanceMismatch` if `dispatcher` was built for another instance and
    /// `InfeasibleJobSequences` when replay stalls.
    pub fn from_job_sequences(
        instance: impl Into<Arc<JobShopInstance>>,
        job_sequences: &[Vec<usize>],
        dispatcher: Option<&mut Dispatcher>,
    ) -> Result<Self> {
        let instance = instance.into();
        validate_job_sequences(job_sequences, instance.num_machines(), instance.num_jobs())?;

        Self::replay(instance, job_sequences, dispatcher, |dispatcher, job_id| {
            match dispatcher.next_operation(job_id) {
                Ok(operation) => Ok(Some(operation.clone())),
                Err(e) if e.validation_kind() == Some(ValidationErrorKind::NoOperationsLeft) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    /// Replays per-machine operation-id sequences.
    ///
    /// Same as [`from_job_sequences`](Self::from_job_sequences), but
    /// `operation_sequences[m]` names the operations themselves, so the
    /// machine each flexible operation ran on is preserved.
    ///
    /// # Errors
    /// `InvalidShape`, `UnknownOperation` or `InvalidMachine` for malformed
    /// sequences, otherwise as [`from_job_sequences`](Self::from_job_sequences).
    pub fn from_operation_sequences(
        instance: impl Into<Arc<JobShopInstance>>,
        operation_sequences: &[Vec<usize>],
        dispatcher: Option<&mut Dispatcher>,
    ) -> Result<Self> {
        let instance = instance.into();
        validate_operation_sequences(operation_sequences, &instance)?;

        let lookup = Arc::clone(&instance);
        Self::replay(instance, operation_sequences, dispatcher, move |dispatcher, operation_id| {
            Ok(lookup
                .operation(operation_id)
                .filter(|operation| dispatcher.is_operation_ready(operation))
                .cloned())
        })
    }

    /// Pass-based replay shared by the sequence constructors. `next`
    /// resolves a queue entry to the operation to dispatch, or `None` while
    /// it is not ready.
    fn replay<F>(
        instance: Arc<JobShopInstance>,
        sequences: &[Vec<usize>],
        dispatcher: Option<&mut Dispatcher>,
        next: F,
    ) -> Result<Self>
    where
        F: Fn(&Dispatcher, usize) -> Result<Option<Operation>>,
    {
        let mut owned;
        let dispatcher = match dispatcher {
            Some(dispatcher) => {
                let same = Arc::ptr_eq(dispatcher.instance(), &instance)
                    || dispatcher.instance().as_ref() == instance.as_ref();
                if !same {
                    return Err(JobShopError::validation(
                        ValidationErrorKind::InstanceMismatch,
                        format!(
                            "The dispatcher was built for instance '{}', not '{}'",
                            dispatcher.instance().name(),
                            instance.name()
                        ),
                    ));
                }
                dispatcher
            }
            None => {
                owned = Dispatcher::new(Arc::clone(&instance));
                &mut owned
            }
        };
        dispatcher.reset();
        debug!(
            instance = instance.name(),
            machines = sequences.len(),
            "replaying machine sequences"
        );

        let mut heads = vec![0usize; sequences.len()];
        while !dispatcher.schedule().is_complete() {
            let mut progressed = false;
            for (machine_id, sequence) in sequences.iter().enumerate() {
                let Some(&entry) = sequence.get(heads[machine_id]) else {
                    continue;
                };
                let Some(operation) = next(&*dispatcher, entry)? else {
                    continue;
                };
                if !operation.can_run_on(machine_id) {
                    continue;
                }
                dispatcher.dispatch(&operation, machine_id)?;
                heads[machine_id] += 1;
                progressed = true;
            }
            if !progressed {
                warn!(
                    scheduled = dispatcher.schedule().num_scheduled_operations(),
                    total = instance.num_operations(),
                    "machine sequence replay stalled"
                );
                return Err(JobShopError::validation(
                    ValidationErrorKind::InfeasibleJobSequences,
                    format!(
                        "Invalid job sequences. No valid operation to schedule \
                         after {} of {} operations.",
                        dispatcher.schedule().num_scheduled_operations(),
                        instance.num_operations()
                    ),
                ));
            }
        }

        debug!(makespan = dispatcher.schedule().makespan(), "machine sequences replayed");
        Ok(dispatcher.schedule().clone())
    }

    /// Rebuilds a schedule from its plain-data form.
    ///
    /// Operation sequences are replayed when present; older data carrying
    /// only job sequences falls back to [`from_job_sequences`](Self::from_job_sequences).
    pub fn from_data(data: &ScheduleData) -> Result<Self> {
        let instance = JobShopInstance::from_data(&data.instance)?;
        let mut schedule = match &data.operation_sequences {
            Some(sequences) => Self::from_operation_sequences(instance, sequences, None)?,
            None => Self::from_job_sequences(instance, &data.job_sequences, None)?,
        };
        schedule.metadata = data.metadata.clone();
        Ok(schedule)
    }

    /// Returns the plain-data form: instance, machine sequences and metadata.
    pub fn to_data(&self) -> ScheduleData {
        ScheduleData {
            instance: self.instance.to_data(),
            job_sequences: self.job_sequences(),
            operation_sequences: Some(self.operation_sequences()),
            metadata: self.metadata.clone(),
        }
    }

    /// Attaches metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Appends a scheduled operation to its machine's sequence.
    ///
    /// The first operation on a machine is always accepted. Later ones must
    /// not start before the previous operation on that machine ends. Job
    /// precedence is not checked. On failure nothing is modified.
    pub fn add(&mut self, scheduled_operation: ScheduledOperation) -> Result<()> {
        let machine_id = scheduled_operation.machine_id();
        let operation_id = scheduled_operation.operation_id();
        let Some(sequence) = self.schedule.get(machine_id) else {
            return Err(JobShopError::validation(
                ValidationErrorKind::InvalidMachine,
                format!(
                    "Machine {machine_id} is out of range; the instance has {} machines",
                    self.schedule.len()
                ),
            ));
        };
        if self.instance.operation(operation_id) != Some(&scheduled_operation.operation) {
            return Err(JobShopError::validation(
                ValidationErrorKind::UnknownOperation,
                format!("Operation {operation_id} does not belong to this instance"),
            ));
        }
        if let Some(last) = sequence.last() {
            if last.end_time() > scheduled_operation.start_time {
                return Err(JobShopError::validation(
                    ValidationErrorKind::MachineOverlap,
                    format!(
                        "Operation cannot be scheduled before the last operation on machine \
                         {machine_id}: end time of last operation ({}) > start time of new \
                         operation ({}).",
                        last.end_time(),
                        scheduled_operation.start_time
                    ),
                ));
            }
        }

        let end_time = scheduled_operation.end_time();
        let index = sequence.len();
        self.schedule[machine_id].push(scheduled_operation);
        self.positions[operation_id] = Some((machine_id, index));
        self.num_scheduled += 1;
        if self
            .latest_operation()
            .map_or(true, |latest| end_time > latest.end_time())
        {
            self.latest = Some((machine_id, index));
        }
        Ok(())
    }

    /// Clears every machine sequence and the derived caches.
    pub fn reset(&mut self) {
        for sequence in &mut self.schedule {
            sequence.clear();
        }
        self.positions.fill(None);
        self.num_scheduled = 0;
        self.latest = None;
    }

    /// The instance this schedule solves.
    pub fn instance(&self) -> &Arc<JobShopInstance> {
        &self.instance
    }

    /// Per-machine operation sequences.
    pub fn schedule(&self) -> &[Vec<ScheduledOperation>] {
        &self.schedule
    }

    pub fn num_scheduled_operations(&self) -> usize {
        self.num_scheduled
    }

    pub fn is_empty(&self) -> bool {
        self.num_scheduled == 0
    }

    /// Whether every operation of the instance has been scheduled.
    pub fn is_complete(&self) -> bool {
        self.num_scheduled == self.instance.num_operations()
    }

    /// End time of the last-finishing operation, or 0 when empty.
    pub fn makespan(&self) -> u64 {
        self.latest_operation().map_or(0, ScheduledOperation::end_time)
    }

    /// The operation with the latest end time.
    pub fn latest_operation(&self) -> Option<&ScheduledOperation> {
        self.latest.map(|(m, i)| &self.schedule[m][i])
    }

    /// Looks up the scheduled placement of an operation.
    pub fn scheduled_operation(&self, operation_id: usize) -> Option<&ScheduledOperation> {
        let (m, i) = (*self.positions.get(operation_id)?)?;
        Some(&self.schedule[m][i])
    }

    /// Job ids in processing order, per machine.
    pub fn job_sequences(&self) -> Vec<Vec<usize>> {
        self.schedule
            .iter()
            .map(|sequence| sequence.iter().map(ScheduledOperation::job_id).collect())
            .collect()
    }

    /// Operation ids in processing order, per machine.
    pub fn operation_sequences(&self) -> Vec<Vec<usize>> {
        self.schedule
            .iter()
            .map(|sequence| sequence.iter().map(ScheduledOperation::operation_id).collect())
            .collect()
    }

    /// Extracts the critical path, in chronological order.
    ///
    /// Walks back from the latest-ending operation. At each step the walk
    /// moves to whichever predecessor (same job or same machine) ends later,
    /// preferring the job predecessor on ties, and stops when neither exists.
    /// The last element's end time equals the makespan.
    pub fn critical_path(&self) -> Vec<&ScheduledOperation> {
        let Some(mut current) = self.latest else {
            return Vec::new();
        };
        let mut visited = vec![false; self.positions.len()];
        let mut path = Vec::new();

        loop {
            let (machine_id, index) = current;
            let scheduled_operation = &self.schedule[machine_id][index];
            if std::mem::replace(&mut visited[scheduled_operation.operation_id()], true) {
                break;
            }
            path.push(scheduled_operation);

            let job_predecessor = scheduled_operation
                .position_in_job()
                .checked_sub(1)
                .and_then(|position| self.instance.job(scheduled_operation.job_id())?.get(position))
                .and_then(|operation| self.positions[operation.operation_id]);
            let machine_predecessor = index.checked_sub(1).map(|i| (machine_id, i));

            current = match (job_predecessor, machine_predecessor) {
                (Some(job), Some(machine)) => {
                    if self.end_time_at(machine) > self.end_time_at(job) {
                        machine
                    } else {
                        job
                    }
                }
                (Some(job), None) => job,
                (None, Some(machine)) => machine,
                (None, None) => break,
            };
        }

        path.reverse();
        path
    }

    fn end_time_at(&self, (machine_id, index): (usize, usize)) -> u64 {
        self.schedule[machine_id][index].end_time()
    }
}

/// Schedules compare by their machine sequences; metadata is ignored.
impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.schedule == other.schedule
    }
}

/// Plain-data form of a schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleData {
    pub instance: InstanceData,
    pub job_sequences: Vec<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_sequences: Option<Vec<Vec<usize>>>,
    #[serde(default)]
    pub metadata: Metadata,
}
