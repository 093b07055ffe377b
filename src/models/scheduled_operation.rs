//! An operation bound to a machine and a start time.

use serde::Serialize;

use super::Operation;
use crate::error::{JobShopError, Result};
use crate::validation::ValidationErrorKind;

/// An [`Operation`] placed on one of its candidate machines at a start time.
///
/// The machine is validated at construction; `end_time` is derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledOperation {
    /// The scheduled operation.
    pub operation: Operation,
    /// Start time.
    pub start_time: u64,
    machine_id: usize,
}

impl ScheduledOperation {
    /// Binds `operation` to `machine_id` at `start_time`.
    ///
    /// # Errors
    /// `InvalidMachine` if `machine_id` is not a candidate of the operation.
    pub fn new(operation: Operation, start_time: u64, machine_id: usize) -> Result<Self> {
        if !operation.can_run_on(machine_id) {
            return Err(JobShopError::validation(
                ValidationErrorKind::InvalidMachine,
                format!(
                    "Operation {} cannot be scheduled on machine {machine_id}. Valid machines are {:?}.",
                    operation.operation_id, operation.machines
                ),
            ));
        }
        Ok(Self {
            operation,
            start_time,
            machine_id,
        })
    }

    /// Machine the operation runs on.
    #[inline]
    pub fn machine_id(&self) -> usize {
        self.machine_id
    }

    #[inline]
    pub fn end_time(&self) -> u64 {
        self.start_time + self.operation.duration
    }

    #[inline]
    pub fn job_id(&self) -> usize {
        self.operation.job_id
    }

    #[inline]
    pub fn position_in_job(&self) -> usize {
        self.operation.position_in_job
    }

    #[inline]
    pub fn operation_id(&self) -> usize {
        self.operation.operation_id
    }
}
