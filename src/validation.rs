//! Input validation for job-shop problems.
//!
//! Checks structural integrity of jobs and raw solutions before they
//! reach the dispatcher. Detects:
//! - Operations without candidate machines
//! - Duplicate machines in a candidate set
//! - Empty jobs
//! - Mismatched matrix shapes
//! - Job-sequence solutions that reference unknown jobs or machines
//! - Operation-sequence solutions that place an operation on a machine it
//!   cannot run on

use crate::models::{JobShopInstance, Operation};

/// Exclusive upper bound on machine ids accepted in an instance.
pub const MAX_MACHINES: usize = 1 << 16;

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A machine id is not a candidate of the operation, or is out of range.
    InvalidMachine,
    /// The operation is not the next unscheduled operation of its job.
    OperationNotReady,
    /// A new operation would start before the previous one on the same machine ends.
    MachineOverlap,
    /// An operation is stored under a machine slot other than its own.
    MachineMismatch,
    /// Job-sequence replay stalled before the schedule was complete.
    InfeasibleJobSequences,
    /// A job has no operations left to schedule.
    NoOperationsLeft,
    /// An operation has no candidate machines.
    EmptyMachineSet,
    /// An operation lists the same machine twice.
    DuplicateMachine,
    /// A job has no operations.
    EmptyJob,
    /// A selection was requested from an empty candidate list.
    EmptyCandidates,
    /// A rule, chooser or filter name is not recognised.
    UnknownName,
    /// Matrix or sequence dimensions do not match the instance.
    InvalidShape,
    /// A job id is out of range.
    UnknownJob,
    /// An operation id does not belong to the instance.
    UnknownOperation,
    /// A dispatcher or schedule belongs to a different instance.
    InstanceMismatch,
}

impl ValidationError {
    /// Creates a new validation error.
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates the jobs of a job-shop instance.
///
/// Checks:
/// 1. Every job has at least one operation
/// 2. Every operation has at least one candidate machine
/// 3. No candidate set lists the same machine twice
/// 4. Every machine id is below [`MAX_MACHINES`]
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_jobs(jobs: &[Vec<Operation>]) -> ValidationResult {
    let mut errors = Vec::new();

    for (job_id, job) in jobs.iter().enumerate() {
        if job.is_empty() {
            errors.push(ValidationError::new(
                ValidationErrorKind::EmptyJob,
                format!("Job {job_id} has no operations"),
            ));
        }

        for (position, operation) in job.iter().enumerate() {
            if operation.machines.is_empty() {
                errors.push(ValidationError::new(
                    ValidationErrorKind::EmptyMachineSet,
                    format!("Operation {position} of job {job_id} has no candidate machines"),
                ));
            }

            if let Some(&machine) = operation.machines.iter().find(|&&m| m >= MAX_MACHINES) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidMachine,
                    format!(
                        "Operation {position} of job {job_id} uses machine {machine}; \
                         ids must be below {MAX_MACHINES}"
                    ),
                ));
            }

            let mut seen = operation.machines.clone();
            seen.sort_unstable();
            if let Some(pair) = seen.windows(2).find(|w| w[0] == w[1]) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::DuplicateMachine,
                    format!(
                        "Operation {position} of job {job_id} lists machine {} more than once",
                        pair[0]
                    ),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates that two job-shaped matrices have identical row lengths.
pub fn validate_matrix_shapes<A, B>(
    left_name: &str,
    left: &[Vec<A>],
    right_name: &str,
    right: &[Vec<B>],
) -> Result<(), ValidationError> {
    if left.len() != right.len() {
        return Err(ValidationError::new(
            ValidationErrorKind::InvalidShape,
            format!(
                "{left_name} has {} jobs but {right_name} has {}",
                left.len(),
                right.len()
            ),
        ));
    }
    for (job_id, (l, r)) in left.iter().zip(right).enumerate() {
        if l.len() != r.len() {
            return Err(ValidationError::new(
                ValidationErrorKind::InvalidShape,
                format!(
                    "job {job_id}: {left_name} has {} operations but {right_name} has {}",
                    l.len(),
                    r.len()
                ),
            ));
        }
    }
    Ok(())
}

/// Validates the shape of a per-machine job-sequence solution.
///
/// Checks that there is one sequence per machine and that every entry
/// names an existing job.
pub fn validate_job_sequences(
    job_sequences: &[Vec<usize>],
    num_machines: usize,
    num_jobs: usize,
) -> ValidationResult {
    let mut errors = Vec::new();

    if job_sequences.len() != num_machines {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidShape,
            format!(
                "Expected {num_machines} machine sequences, got {}",
                job_sequences.len()
            ),
        ));
    }

    for (machine_id, sequence) in job_sequences.iter().enumerate() {
        for &job_id in sequence {
            if job_id >= num_jobs {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownJob,
                    format!("Machine {machine_id} sequence references unknown job {job_id}"),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a per-machine operation-id solution against an instance.
///
/// Checks that there is one sequence per machine, that every id names an
/// operation of the instance, that the machine is one of its candidates
/// and that no operation appears twice.
pub fn validate_operation_sequences(
    operation_sequences: &[Vec<usize>],
    instance: &JobShopInstance,
) -> ValidationResult {
    let mut errors = Vec::new();

    if operation_sequences.len() != instance.num_machines() {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidShape,
            format!(
                "Expected {} machine sequences, got {}",
                instance.num_machines(),
                operation_sequences.len()
            ),
        ));
    }

    let mut seen = vec![false; instance.num_operations()];
    for (machine_id, sequence) in operation_sequences.iter().enumerate() {
        for &operation_id in sequence {
            let Some(operation) = instance.operation(operation_id) else {
                errors.push(ValidationError::new(
                    ValidationErrorKind::UnknownOperation,
                    format!("Machine {machine_id} sequence references unknown operation {operation_id}"),
                ));
                continue;
            };
            if !operation.can_run_on(machine_id) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidMachine,
                    format!("Operation {operation_id} cannot run on machine {machine_id}"),
                ));
            }
            if std::mem::replace(&mut seen[operation_id], true) {
                errors.push(ValidationError::new(
                    ValidationErrorKind::InvalidShape,
                    format!("Operation {operation_id} appears more than once"),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
