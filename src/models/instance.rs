//! Job-shop instance model.
//!
//! A [`JobShopInstance`] is an ordered list of jobs, each an ordered list of
//! [`Operation`]s. Construction validates the jobs, assigns job ids,
//! positions and operation ids, and caches derived aggregates. The instance
//! is immutable afterwards and is shared read-only (via `Arc`) by every
//! schedule and dispatcher built from it.
//!
//! # Reference
//! Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 7

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Operation;
use crate::error::{JobShopError, Result};
use crate::validation::{validate_jobs, validate_matrix_shapes, ValidationErrorKind};

/// Free-form metadata attached to instances and schedules.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// An immutable job-shop problem instance.
#[derive(Debug, Clone)]
pub struct JobShopInstance {
    jobs: Vec<Vec<Operation>>,
    name: String,
    metadata: Metadata,
    /// operation id → (job id, position in job)
    locations: Vec<(usize, usize)>,
    num_machines: usize,
    is_flexible: bool,
    job_durations: Vec<u64>,
    machine_loads: Vec<u64>,
}

impl JobShopInstance {
    /// Creates an instance from jobs, assigning ids in job-major order.
    ///
    /// # Errors
    /// A validation error listing every structural problem found
    /// (empty jobs, empty or duplicated candidate sets).
    pub fn new(jobs: Vec<Vec<Operation>>, name: impl Into<String>) -> Result<Self> {
        validate_jobs(&jobs)?;

        let mut jobs = jobs;
        let mut locations = Vec::new();
        for (job_id, job) in jobs.iter_mut().enumerate() {
            for (position, operation) in job.iter_mut().enumerate() {
                operation.assign_ids(job_id, position, locations.len());
                locations.push((job_id, position));
            }
        }

        let num_machines = match jobs.iter().flatten().flat_map(|op| op.machines.iter().copied()).max() {
            None => 0,
            Some(max) => max.checked_add(1).ok_or_else(|| {
                JobShopError::validation(
                    ValidationErrorKind::InvalidMachine,
                    format!("Machine id {max} is out of range"),
                )
            })?,
        };
        let is_flexible = jobs.iter().flatten().any(Operation::is_flexible);
        let job_durations = jobs
            .iter()
            .map(|job| job.iter().map(|op| op.duration).sum())
            .collect();
        let mut machine_loads = vec![0; num_machines];
        for operation in jobs.iter().flatten() {
            for &machine in &operation.machines {
                machine_loads[machine] += operation.duration;
            }
        }

        Ok(Self {
            jobs,
            name: name.into(),
            metadata: Metadata::new(),
            locations,
            num_machines,
            is_flexible,
            job_durations,
            machine_loads,
        })
    }

    /// Attaches metadata.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Creates an instance from duration and machine matrices.
    ///
    /// Row `j` of each matrix describes job `j`; release dates default to 0.
    pub fn from_matrices(
        duration_matrix: &[Vec<u64>],
        machines_matrix: &[Vec<Vec<usize>>],
        release_dates_matrix: Option<&[Vec<u64>]>,
        name: impl Into<String>,
    ) -> Result<Self> {
        validate_matrix_shapes("duration_matrix", duration_matrix, "machines_matrix", machines_matrix)?;
        if let Some(release_dates) = release_dates_matrix {
            validate_matrix_shapes(
                "duration_matrix",
                duration_matrix,
                "release_dates_matrix",
                release_dates,
            )?;
        }

        let jobs = duration_matrix
            .iter()
            .zip(machines_matrix)
            .enumerate()
            .map(|(job_id, (durations, machines))| {
                durations
                    .iter()
                    .zip(machines)
                    .enumerate()
                    .map(|(position, (&duration, machines))| {
                        let release = release_dates_matrix.map_or(0, |r| r[job_id][position]);
                        Operation::new(machines.clone(), duration).with_release_date(release)
                    })
                    .collect()
            })
            .collect();

        Self::new(jobs, name)
    }

    /// Parses an instance in Taillard's text format.
    ///
    /// Lines starting with `#` and blank lines are ignored. The first
    /// remaining line is the `num_jobs num_machines` header; each following
    /// line lists `machine duration` pairs for one job.
    ///
    /// # Errors
    /// `InvalidShape` for a missing or malformed header, a non-numeric
    /// value, an odd row or a job count that differs from the header;
    /// `InvalidMachine` for a machine id not below the header's count.
    pub fn from_taillard_str(text: &str, name: impl Into<String>) -> Result<Self> {
        let mut rows = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'));

        let header = rows.next().ok_or_else(|| {
            JobShopError::validation(ValidationErrorKind::InvalidShape, "missing header line")
        })?;
        let header = parse_row(header, "header")?;
        let &[num_jobs, num_machines, ..] = header.as_slice() else {
            return Err(JobShopError::validation(
                ValidationErrorKind::InvalidShape,
                format!("header: expected `num_jobs num_machines`, got {} values", header.len()),
            ));
        };

        let mut jobs = Vec::new();
        for (job_id, row) in rows.enumerate() {
            let values = parse_row(row, &format!("job {job_id}"))?;
            if values.len() % 2 != 0 {
                return Err(JobShopError::validation(
                    ValidationErrorKind::InvalidShape,
                    format!("job {job_id}: expected machine/duration pairs, got {} values", values.len()),
                ));
            }
            let job = values
                .chunks_exact(2)
                .map(|pair| -> Result<Operation> {
                    let machine = usize::try_from(pair[0])
                        .ok()
                        .filter(|_| pair[0] < num_machines)
                        .ok_or_else(|| {
                            JobShopError::validation(
                                ValidationErrorKind::InvalidMachine,
                                format!(
                                    "job {job_id}: machine {} is out of range; the header declares \
                                     {num_machines} machines",
                                    pair[0]
                                ),
                            )
                        })?;
                    Ok(Operation::single(machine, pair[1]))
                })
                .collect::<Result<Vec<_>>>()?;
            jobs.push(job);
        }

        if jobs.len() as u64 != num_jobs {
            return Err(JobShopError::validation(
                ValidationErrorKind::InvalidShape,
                format!("header declares {num_jobs} jobs, found {}", jobs.len()),
            ));
        }

        Self::new(jobs, name)
    }

    /// Rebuilds an instance from its plain-data form.
    pub fn from_data(data: &InstanceData) -> Result<Self> {
        let machines = data.machines_matrix.to_flexible();
        let instance = Self::from_matrices(
            &data.duration_matrix,
            &machines,
            data.release_dates_matrix.as_deref(),
            data.name.clone(),
        )?;
        let mut jobs = instance.jobs;
        for (job_id, job) in jobs.iter_mut().enumerate() {
            for (position, operation) in job.iter_mut().enumerate() {
                operation.deadline = data
                    .deadlines_matrix
                    .as_ref()
                    .and_then(|m| m.get(job_id)?.get(position).copied().flatten());
                operation.due_date = data
                    .due_dates_matrix
                    .as_ref()
                    .and_then(|m| m.get(job_id)?.get(position).copied().flatten());
            }
        }
        Ok(Self::new(jobs, data.name.clone())?.with_metadata(data.metadata.clone()))
    }

    /// Returns the plain-data form of this instance.
    pub fn to_data(&self) -> InstanceData {
        InstanceData {
            name: self.name.clone(),
            duration_matrix: self.duration_matrix(),
            machines_matrix: self.machines_matrix(),
            release_dates_matrix: self.has_release_dates().then(|| self.release_dates_matrix()),
            deadlines_matrix: self
                .has_deadlines()
                .then(|| self.map_operations(|op| op.deadline)),
            due_dates_matrix: self
                .has_due_dates()
                .then(|| self.map_operations(|op| op.due_date)),
            metadata: self.metadata.clone(),
        }
    }

    /// Instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instance metadata.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Jobs in id order.
    pub fn jobs(&self) -> &[Vec<Operation>] {
        &self.jobs
    }

    /// Operations of one job.
    pub fn job(&self, job_id: usize) -> Option<&[Operation]> {
        self.jobs.get(job_id).map(Vec::as_slice)
    }

    /// Looks up an operation by its id.
    pub fn operation(&self, operation_id: usize) -> Option<&Operation> {
        let &(job_id, position) = self.locations.get(operation_id)?;
        Some(&self.jobs[job_id][position])
    }

    /// All operations in id order.
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.jobs.iter().flatten()
    }

    pub fn num_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Highest machine id referenced plus one.
    pub fn num_machines(&self) -> usize {
        self.num_machines
    }

    pub fn num_operations(&self) -> usize {
        self.locations.len()
    }

    /// Whether any operation has more than one candidate machine.
    pub fn is_flexible(&self) -> bool {
        self.is_flexible
    }

    pub fn has_release_dates(&self) -> bool {
        self.operations().any(|op| op.release_date > 0)
    }

    pub fn has_deadlines(&self) -> bool {
        self.operations().any(|op| op.deadline.is_some())
    }

    pub fn has_due_dates(&self) -> bool {
        self.operations().any(|op| op.due_date.is_some())
    }

    /// Sum of operation durations per job.
    pub fn job_durations(&self) -> &[u64] {
        &self.job_durations
    }

    /// Sum of durations of the operations each machine can process.
    ///
    /// Flexible operations count towards every candidate machine.
    pub fn machine_loads(&self) -> &[u64] {
        &self.machine_loads
    }

    pub fn total_duration(&self) -> u64 {
        self.job_durations.iter().sum()
    }

    pub fn max_duration(&self) -> u64 {
        self.operations().map(|op| op.duration).max().unwrap_or(0)
    }

    /// Operations that can run on each machine, in id order.
    pub fn operations_by_machine(&self) -> Vec<Vec<&Operation>> {
        let mut by_machine = vec![Vec::new(); self.num_machines];
        for operation in self.operations() {
            for &machine in &operation.machines {
                by_machine[machine].push(operation);
            }
        }
        by_machine
    }

    pub fn duration_matrix(&self) -> Vec<Vec<u64>> {
        self.map_operations(|op| op.duration)
    }

    pub fn release_dates_matrix(&self) -> Vec<Vec<u64>> {
        self.map_operations(|op| op.release_date)
    }

    /// Candidate machines per operation; collapsed to single ids when the
    /// instance is not flexible.
    pub fn machines_matrix(&self) -> MachinesMatrix {
        if self.is_flexible {
            MachinesMatrix::Flexible(self.map_operations(|op| op.machines.clone()))
        } else {
            MachinesMatrix::Single(self.map_operations(|op| op.machines[0]))
        }
    }

    fn map_operations<T>(&self, f: impl Fn(&Operation) -> T) -> Vec<Vec<T>> {
        self.jobs
            .iter()
            .map(|job| job.iter().map(&f).collect())
            .collect()
    }
}

fn parse_row(row: &str, label: &str) -> Result<Vec<u64>> {
    row.split_whitespace()
        .map(|token| {
            token.parse::<u64>().map_err(|e| {
                JobShopError::validation(
                    ValidationErrorKind::InvalidShape,
                    format!("{label}: invalid value '{token}': {e}"),
                )
            })
        })
        .collect()
}

impl PartialEq for JobShopInstance {
    fn eq(&self, other: &Self) -> bool {
        self.jobs == other.jobs
    }
}

/// Machine assignment matrix, in the single or flexible shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MachinesMatrix {
    /// One machine per operation.
    Single(Vec<Vec<usize>>),
    /// A candidate set per operation.
    Flexible(Vec<Vec<Vec<usize>>>),
}

impl MachinesMatrix {
    /// Converts to the flexible shape.
    pub fn to_flexible(&self) -> Vec<Vec<Vec<usize>>> {
        match self {
            Self::Single(rows) => rows
                .iter()
                .map(|row| row.iter().map(|&m| vec![m]).collect())
                .collect(),
            Self::Flexible(rows) => rows.clone(),
        }
    }
}

/// Plain-data form of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceData {
    pub name: String,
    pub duration_matrix: Vec<Vec<u64>>,
    pub machines_matrix: MachinesMatrix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_dates_matrix: Option<Vec<Vec<u64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadlines_matrix: Option<Vec<Vec<Option<u64>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_dates_matrix: Option<Vec<Vec<Option<u64>>>>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::MAX_MACHINES;

    fn example_jobs() -> Vec<Vec<Operation>> {
        vec![
            vec![Operation::single(0, 1), Operation::single(1, 1), Operation::single(2, 7)],
            vec![Operation::single(1, 5), Operation::single(2, 1), Operation::single(0, 1)],
            vec![Operation::single(2, 1), Operation::single(0, 3), Operation::single(1, 2)],
        ]
    }

    #[test]
    fn test_ids_assigned() {
        let instance = JobShopInstance::new(example_jobs(), "example").unwrap();
        for (id, op) in instance.operations().enumerate() {
            assert_eq!(op.operation_id, id);
            assert_eq!(instance.operation(id), Some(op));
        }
        let op = &instance.jobs()[1][2];
        assert_eq!((op.job_id, op.position_in_job, op.operation_id), (1, 2, 5));
        assert!(instance.operation(9).is_none());
    }

    #[test]
    fn test_derived_attributes() {
        let instance = JobShopInstance::new(example_jobs(), "example").unwrap();
        assert_eq!(instance.num_jobs(), 3);
        assert_eq!(instance.num_machines(), 3);
        assert_eq!(instance.num_operations(), 9);
        assert!(!instance.is_flexible());
        assert_eq!(instance.job_durations(), &[9, 7, 6]);
        assert_eq!(instance.machine_loads(), &[5, 8, 9]);
        assert_eq!(instance.total_duration(), 22);
        assert_eq!(instance.max_duration(), 7);
        assert!(!instance.has_release_dates());
    }

    #[test]
    fn test_flexible_loads() {
        let jobs = vec![vec![Operation::new(vec![0, 1], 4)], vec![Operation::single(1, 2)]];
        let instance = JobShopInstance::new(jobs, "flex").unwrap();
        assert!(instance.is_flexible());
        assert_eq!(instance.machine_loads(), &[4, 6]);
        assert_eq!(instance.operations_by_machine()[1].len(), 2);
    }

    #[test]
    fn test_invalid_jobs_rejected() {
        let err = JobShopInstance::new(vec![vec![Operation::new(vec![], 1)]], "bad").unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::EmptyMachineSet));
    }

    #[test]
    fn test_from_matrices() {
        let durations = vec![vec![3, 2], vec![4]];
        let machines = vec![vec![vec![0], vec![1]], vec![vec![1, 0]]];
        let releases = vec![vec![0, 0], vec![5]];
        let instance =
            JobShopInstance::from_matrices(&durations, &machines, Some(releases.as_slice()), "m").unwrap();
        assert_eq!(instance.duration_matrix(), durations);
        assert_eq!(instance.release_dates_matrix(), releases);
        assert!(instance.is_flexible());
        assert_eq!(instance.machines_matrix(), MachinesMatrix::Flexible(machines));
    }

    #[test]
    fn test_from_matrices_shape_mismatch() {
        let err = JobShopInstance::from_matrices(&[vec![1, 2]], &[vec![vec![0]]], None, "m")
            .unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidShape));
    }

    #[test]
    fn test_from_taillard_str() {
        let text = "# ft03\n3 3\n0 1 1 1 2 7\n1 5 2 1 0 1\n2 1 0 3 1 2\n";
        let instance = JobShopInstance::from_taillard_str(text, "ft03").unwrap();
        assert_eq!(instance, JobShopInstance::new(example_jobs(), "other").unwrap());
        assert_eq!(instance.name(), "ft03");
    }

    #[test]
    fn test_from_taillard_odd_row() {
        let err = JobShopInstance::from_taillard_str("1 2\n0 1 1\n", "bad").unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidShape));
    }

    #[test]
    fn test_from_taillard_machine_out_of_range() {
        let err = JobShopInstance::from_taillard_str("1 1\n18446744073709551615 3\n", "huge").unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidMachine));

        let err = JobShopInstance::from_taillard_str("1 2\n0 1 2 1\n", "bad").unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidMachine));
        assert!(err.to_string().contains("declares 2 machines"));
    }

    #[test]
    fn test_from_taillard_header_mismatch() {
        let err = JobShopInstance::from_taillard_str("2 2\n0 1 1 1\n", "short").unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidShape));

        let err = JobShopInstance::from_taillard_str("# nothing\n", "empty").unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidShape));
    }

    #[test]
    fn test_machine_id_limit() {
        let err = JobShopInstance::new(vec![vec![Operation::single(usize::MAX, 1)]], "max").unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidMachine));

        let err = JobShopInstance::from_matrices(&[vec![1]], &[vec![vec![MAX_MACHINES]]], None, "big")
            .unwrap_err();
        assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InvalidMachine));

        let largest = JobShopInstance::new(vec![vec![Operation::single(MAX_MACHINES - 1, 1)]], "edge").unwrap();
        assert_eq!(largest.num_machines(), MAX_MACHINES);
    }

    #[test]
    fn test_data_round_trip() {
        let mut jobs = example_jobs();
        jobs[0][0] = Operation::single(0, 1).with_release_date(2).with_due_date(10);
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), serde_json::json!("unit"));
        let instance = JobShopInstance::new(jobs, "dated").unwrap().with_metadata(metadata);

        let data = instance.to_data();
        assert!(data.release_dates_matrix.is_some());
        assert!(data.deadlines_matrix.is_none());

        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains(r#""machines_matrix":[[0,1,2]"#));
        let parsed: InstanceData = serde_json::from_str(&json).unwrap();
        let rebuilt = JobShopInstance::from_data(&parsed).unwrap();
        assert_eq!(rebuilt, instance);
        assert_eq!(rebuilt.metadata()["source"], "unit");
        assert_eq!(rebuilt.jobs()[0][0].due_date, Some(10));
    }
}
