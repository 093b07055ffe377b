//! Scheduling context for dispatching rule evaluation.

use super::Dispatcher;

/// Snapshot of dispatcher state passed to dispatching rules.
///
/// Rules score operations against this snapshot instead of querying the
/// dispatcher per operation, so per-job aggregates are computed once per
/// decision.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulingContext {
    /// Current decision time of the dispatcher.
    pub current_time: u64,
    /// Remaining processing work per job (uncompleted operations).
    pub remaining_work: Vec<u64>,
    /// Remaining number of uncompleted operations per job.
    pub remaining_operations: Vec<usize>,
    /// Average duration over all operations of the instance.
    pub average_processing_time: Option<f64>,
}

impl SchedulingContext {
    /// Creates a context at the given time.
    pub fn at_time(current_time: u64) -> Self {
        Self {
            current_time,
            ..Default::default()
        }
    }

    /// Captures the dispatcher's current state.
    pub fn from_dispatcher(dispatcher: &Dispatcher) -> Self {
        let instance = dispatcher.instance();
        let mut remaining_work = vec![0; instance.num_jobs()];
        let mut remaining_operations = vec![0; instance.num_jobs()];
        for operation in dispatcher.uncompleted_operations() {
            remaining_work[operation.job_id] += operation.duration;
            remaining_operations[operation.job_id] += 1;
        }
        let average_processing_time = (instance.num_operations() > 0)
            .then(|| instance.total_duration() as f64 / instance.num_operations() as f64);

        Self {
            current_time: dispatcher.current_time(),
            remaining_work,
            remaining_operations,
            average_processing_time,
        }
    }

    /// Sets remaining work for a job.
    pub fn with_remaining_work(mut self, job_id: usize, work: u64) -> Self {
        if self.remaining_work.len() <= job_id {
            self.remaining_work.resize(job_id + 1, 0);
        }
        self.remaining_work[job_id] = work;
        self
    }

    /// Sets the number of remaining operations for a job.
    pub fn with_remaining_operations(mut self, job_id: usize, count: usize) -> Self {
        if self.remaining_operations.len() <= job_id {
            self.remaining_operations.resize(job_id + 1, 0);
        }
        self.remaining_operations[job_id] = count;
        self
    }

    /// Sets the average processing time.
    pub fn with_average_processing_time(mut self, average: f64) -> Self {
        self.average_processing_time = Some(average);
        self
    }
}
