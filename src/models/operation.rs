//! Operation model.
//!
//! An operation is the smallest schedulable unit of work. It belongs to a
//! job, may run on any machine of its candidate set, and has a fixed
//! duration. Operations of a job are processed in order.
//!
//! Job id, position and operation id are assigned once, when the
//! operation becomes part of a [`JobShopInstance`](super::JobShopInstance).

use serde::{Deserialize, Serialize};

use crate::error::{JobShopError, Result};

/// An operation to be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    /// Candidate machine ids. Never empty in a valid instance.
    pub machines: Vec<usize>,
    /// Processing time.
    pub duration: u64,
    /// Earliest time the operation may start.
    #[serde(default)]
    pub release_date: u64,
    /// Hard latest completion time, if any.
    #[serde(default)]
    pub deadline: Option<u64>,
    /// Soft target completion time, if any.
    #[serde(default)]
    pub due_date: Option<u64>,
    /// Owning job.
    #[serde(default)]
    pub job_id: usize,
    /// Position within the job (0-indexed).
    #[serde(default)]
    pub position_in_job: usize,
    /// Instance-wide unique identifier.
    #[serde(default)]
    pub operation_id: usize,
}

impl Operation {
    /// Creates an operation with a candidate-machine set and a duration.
    pub fn new(machines: Vec<usize>, duration: u64) -> Self {
        Self {
            machines,
            duration,
            release_date: 0,
            deadline: None,
            due_date: None,
            job_id: 0,
            position_in_job: 0,
            operation_id: 0,
        }
    }

    /// Creates an operation that can only run on `machine`.
    pub fn single(machine: usize, duration: u64) -> Self {
        Self::new(vec![machine], duration)
    }

    /// Sets the release date.
    pub fn with_release_date(mut self, release_date: u64) -> Self {
        self.release_date = release_date;
        self
    }

    /// Sets the deadline.
    pub fn with_deadline(mut self, deadline: u64) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the due date.
    pub fn with_due_date(mut self, due_date: u64) -> Self {
        self.due_date = Some(due_date);
        self
    }

    /// The single machine this operation runs on.
    ///
    /// # Errors
    /// `UninitializedAttribute` if the operation has several candidates,
    /// since the machine is only known once it has been dispatched.
    pub fn machine_id(&self) -> Result<usize> {
        match self.machines.as_slice() {
            [machine] => Ok(*machine),
            other => Err(JobShopError::UninitializedAttribute {
                attribute: "machine_id",
                reason: format!(
                    "operation {} has {} candidate machines",
                    self.operation_id,
                    other.len()
                ),
            }),
        }
    }

    /// Whether the operation has more than one candidate machine.
    #[inline]
    pub fn is_flexible(&self) -> bool {
        self.machines.len() > 1
    }

    /// Whether `machine_id` is one of the candidate machines.
    #[inline]
    pub fn can_run_on(&self, machine_id: usize) -> bool {
        self.machines.contains(&machine_id)
    }

    pub(crate) fn assign_ids(&mut self, job_id: usize, position_in_job: usize, operation_id: usize) {
        self.job_id = job_id;
        self.position_in_job = position_in_job;
        self.operation_id = operation_id;
    }
}
