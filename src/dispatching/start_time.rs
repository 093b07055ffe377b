//! Start-time calculators.
//!
//! A calculator decides when an operation would start on a given machine.
//! The dispatcher uses it for `dispatch`, `current_time` and every filter,
//! so one calculator switches the whole engine to a different timing model
//! (setup times, breakdowns, release dates).
//!
//! Every built-in starts from [`no_setup_time_calculator`] and only ever
//! delays, so machine sequences stay valid.

use std::collections::HashMap;
use std::sync::Arc;

use super::Dispatcher;
use crate::error::Result;
use crate::models::{Calendar, Operation};

/// Computes the start time of an operation on a machine.
pub type StartTimeCalculator = Arc<dyn Fn(&Dispatcher, &Operation, usize) -> u64 + Send + Sync>;

/// Wraps a closure as a [`StartTimeCalculator`].
pub fn start_time_calculator<F>(calculator: F) -> StartTimeCalculator
where
    F: Fn(&Dispatcher, &Operation, usize) -> u64 + Send + Sync + 'static,
{
    Arc::new(calculator)
}

/// The later of the machine's and the job's next available time.
pub fn no_setup_time_calculator(dispatcher: &Dispatcher, operation: &Operation, machine_id: usize) -> u64 {
    let machine_time = dispatcher
        .machine_next_available_time()
        .get(machine_id)
        .copied()
        .unwrap_or(0);
    let job_time = dispatcher
        .job_next_available_time()
        .get(operation.job_id)
        .copied()
        .unwrap_or(0);
    machine_time.max(job_time)
}

fn last_operation_on(dispatcher: &Dispatcher, machine_id: usize) -> Option<&Operation> {
    dispatcher
        .schedule()
        .schedule()
        .get(machine_id)?
        .last()
        .map(|scheduled| &scheduled.operation)
}

/// Sequence-dependent setup: `setup_times[prev][next]` is added when the
/// operation with id `prev` was the last one on the machine. Missing
/// entries mean no setup.
pub fn matrix_setup_time_calculator(setup_times: Vec<Vec<u64>>) -> StartTimeCalculator {
    start_time_calculator(move |dispatcher, operation, machine_id| {
        let start = no_setup_time_calculator(dispatcher, operation, machine_id);
        let setup = last_operation_on(dispatcher, machine_id)
            .and_then(|last| setup_times.get(last.operation_id)?.get(operation.operation_id))
            .copied()
            .unwrap_or(0);
        start + setup
    })
}

/// Fixed setup per machine, `default` for machines not listed.
pub fn machine_setup_time_calculator(setup_times: HashMap<usize, u64>, default: u64) -> StartTimeCalculator {
    start_time_calculator(move |dispatcher, operation, machine_id| {
        let setup = setup_times.get(&machine_id).copied().unwrap_or(default);
        no_setup_time_calculator(dispatcher, operation, machine_id) + setup
    })
}

/// Setup depending on the job of the previous operation on the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobSetupTimes {
    /// Previous operation belongs to the same job.
    pub same_job: u64,
    /// Previous operation belongs to another job.
    pub different_job: u64,
    /// Machine has not processed anything yet.
    pub initial: u64,
}

impl Default for JobSetupTimes {
    fn default() -> Self {
        Self {
            same_job: 0,
            different_job: 4,
            initial: 0,
        }
    }
}

/// Job-identity setup: see [`JobSetupTimes`].
pub fn job_setup_time_calculator(setup: JobSetupTimes) -> StartTimeCalculator {
    start_time_calculator(move |dispatcher, operation, machine_id| {
        let setup_time = match last_operation_on(dispatcher, machine_id) {
            None => setup.initial,
            Some(last) if last.job_id == operation.job_id => setup.same_job,
            Some(_) => setup.different_job,
        };
        no_setup_time_calculator(dispatcher, operation, machine_id) + setup_time
    })
}

/// Machine breakdowns: the start is pushed past every blocked period that
/// would interrupt the operation, repeatedly, until none does.
///
/// # Errors
/// `InvalidShape` if any calendar holds a window that ends before it starts.
pub fn breakdown_calculator(calendars: HashMap<usize, Calendar>) -> Result<StartTimeCalculator> {
    calendars.values().try_for_each(Calendar::validate)?;
    Ok(start_time_calculator(move |dispatcher, operation, machine_id| {
        let start = no_setup_time_calculator(dispatcher, operation, machine_id);
        match calendars.get(&machine_id) {
            Some(calendar) => calendar.earliest_uninterrupted_start(start, operation.duration),
            None => start,
        }
    }))
}

/// Arrival (release) lower bound.
///
/// With a matrix, `arrival_times[job][position]` bounds the start. Without
/// one, an `arrival_times_matrix` entry in the instance metadata is used
/// if present, and the operation's own release date otherwise.
pub fn arrival_calculator(arrival_times: Option<Vec<Vec<u64>>>) -> StartTimeCalculator {
    start_time_calculator(move |dispatcher, operation, machine_id| {
        let start = no_setup_time_calculator(dispatcher, operation, machine_id);
        let arrival = match &arrival_times {
            Some(matrix) => matrix
                .get(operation.job_id)
                .and_then(|row| row.get(operation.position_in_job))
                .copied(),
            None => dispatcher
                .instance()
                .metadata()
                .get("arrival_times_matrix")
                .and_then(|matrix| matrix.get(operation.job_id)?.get(operation.position_in_job)?.as_u64()),
        };
        start.max(arrival.unwrap_or(operation.release_date))
    })
}
