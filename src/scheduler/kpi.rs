//! Schedule quality metrics (KPIs).
//!
//! Computes standard scheduling performance indicators from a schedule
//! and the instance it belongs to.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan (C_max) | Latest completion time |
//! | Idle time | Per machine, makespan minus busy time |
//! | Utilization | Per machine, busy time / makespan |
//! | Job completion | End of each job's last scheduled operation |
//! | Mean flow time | Mean of completion minus first release, over finished jobs |
//! | Total Tardiness | Sum of max(0, end - due date) over operations |
//! | On-Time Rate | Fraction of operations with a due date meeting it |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use serde::Serialize;

use crate::models::Schedule;

/// Schedule performance indicators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleKpi {
    /// Makespan: latest completion time.
    pub makespan: u64,
    /// Sum of machine idle time within `[0, makespan)`.
    pub total_idle_time: u64,
    /// Mean idle time per machine.
    pub avg_idle_time: f64,
    /// Per-machine busy fraction (0.0..1.0), indexed by machine id.
    pub utilization_by_machine: Vec<f64>,
    /// Mean machine utilization.
    pub avg_utilization: f64,
    /// Per-job completion time; `None` until the job's last operation is
    /// scheduled.
    pub completion_times: Vec<Option<u64>>,
    /// Mean flow time over finished jobs.
    pub mean_flow_time: f64,
    /// Sum of tardiness against operation due dates.
    pub total_tardiness: u64,
    /// Largest single operation tardiness.
    pub max_tardiness: u64,
    /// Fraction of operations with a due date finishing by it.
    pub on_time_rate: f64,
}

impl ScheduleKpi {
    /// Computes KPIs; partial schedules are measured as they stand.
    pub fn calculate(schedule: &Schedule) -> Self {
        let instance = schedule.instance();
        let makespan = schedule.makespan();

        let busy: Vec<u64> = schedule
            .schedule()
            .iter()
            .map(|sequence| sequence.iter().map(|s| s.operation.duration).sum())
            .collect();
        let idle: Vec<u64> = busy.iter().map(|&b| makespan.saturating_sub(b)).collect();
        let total_idle_time: u64 = idle.iter().sum();
        let utilization_by_machine: Vec<f64> = busy
            .iter()
            .map(|&b| if makespan == 0 { 0.0 } else { b as f64 / makespan as f64 })
            .collect();
        let num_machines = busy.len();

        let completion_times: Vec<Option<u64>> = instance
            .jobs()
            .iter()
            .map(|job| {
                let last = job.last()?;
                schedule
                    .scheduled_operation(last.operation_id)
                    .map(|scheduled| scheduled.end_time())
            })
            .collect();

        let flow_times: Vec<u64> = instance
            .jobs()
            .iter()
            .zip(&completion_times)
            .filter_map(|(job, completion)| {
                let release = job.first().map_or(0, |op| op.release_date);
                completion.map(|c| c.saturating_sub(release))
            })
            .collect();

        let mut total_tardiness = 0;
        let mut max_tardiness = 0;
        let mut with_due_date = 0usize;
        let mut on_time = 0usize;
        for sequence in schedule.schedule() {
            for scheduled in sequence {
                let Some(due) = scheduled.operation.due_date else {
                    continue;
                };
                with_due_date += 1;
                let tardiness = scheduled.end_time().saturating_sub(due);
                if tardiness == 0 {
                    on_time += 1;
                }
                total_tardiness += tardiness;
                max_tardiness = max_tardiness.max(tardiness);
            }
        }

        Self {
            makespan,
            total_idle_time,
            avg_idle_time: mean(total_idle_time as f64, num_machines),
            avg_utilization: mean(utilization_by_machine.iter().sum(), num_machines),
            utilization_by_machine,
            completion_times,
            mean_flow_time: mean(flow_times.iter().sum::<u64>() as f64, flow_times.len()),
            total_tardiness,
            max_tardiness,
            on_time_rate: if with_due_date == 0 {
                1.0
            } else {
                on_time as f64 / with_due_date as f64
            },
        }
    }

    /// Whether the schedule meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_tardiness: u64, min_utilization: f64) -> bool {
        self.max_tardiness <= max_tardiness && self.avg_utilization >= min_utilization
    }
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{JobShopInstance, Operation};

    fn three_by_three(due_dates: bool) -> Arc<JobShopInstance> {
        let last = |machine, duration, due| {
            let op = Operation::single(machine, duration);
            if due_dates {
                op.with_due_date(due)
            } else {
                op
            }
        };
        let jobs = vec![
            vec![Operation::single(0, 1), Operation::single(1, 1), last(2, 7, 10)],
            vec![Operation::single(1, 5), Operation::single(2, 1), last(0, 1, 8)],
            vec![Operation::single(2, 1), Operation::single(0, 3), last(1, 2, 9)],
        ];
        Arc::new(JobShopInstance::new(jobs, "3x3").unwrap())
    }

    fn optimal(instance: Arc<JobShopInstance>) -> Schedule {
        Schedule::from_job_sequences(instance, &[vec![0, 2, 1], vec![0, 1, 2], vec![2, 0, 1]], None).unwrap()
    }

    #[test]
    fn test_kpi_basic() {
        let kpi = ScheduleKpi::calculate(&optimal(three_by_three(false)));
        assert_eq!(kpi.makespan, 11);
        // busy 5, 8, 9
        assert_eq!(kpi.total_idle_time, 11);
        assert!((kpi.avg_idle_time - 11.0 / 3.0).abs() < 1e-10);
        assert!((kpi.utilization_by_machine[0] - 5.0 / 11.0).abs() < 1e-10);
        assert!((kpi.avg_utilization - 2.0 / 3.0).abs() < 1e-10);
        assert_eq!(kpi.completion_times, vec![Some(9), Some(11), Some(9)]);
        assert!((kpi.mean_flow_time - 29.0 / 3.0).abs() < 1e-10);
        assert_eq!(kpi.total_tardiness, 0);
        assert!((kpi.on_time_rate - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_kpi_tardiness() {
        let kpi = ScheduleKpi::calculate(&optimal(three_by_three(true)));
        // job 1 ends at 11 (due 8), job 2 at 9 (due 9), job 0 at 9 (due 10)
        assert_eq!(kpi.total_tardiness, 3);
        assert_eq!(kpi.max_tardiness, 3);
        assert!((kpi.on_time_rate - 2.0 / 3.0).abs() < 1e-10);
        assert!(kpi.meets_thresholds(3, 0.5));
        assert!(!kpi.meets_thresholds(2, 0.5));
    }

    #[test]
    fn test_kpi_empty_and_partial() {
        let instance = three_by_three(false);
        let empty = ScheduleKpi::calculate(&Schedule::new(Arc::clone(&instance)));
        assert_eq!(empty.makespan, 0);
        assert_eq!(empty.avg_utilization, 0.0);
        assert_eq!(empty.completion_times, vec![None, None, None]);
        assert_eq!(empty.mean_flow_time, 0.0);

        let mut partial = Schedule::new(Arc::clone(&instance));
        let op = instance.jobs()[0][0].clone();
        partial
            .add(crate::models::ScheduledOperation::new(op, 0, 0).unwrap())
            .unwrap();
        let kpi = ScheduleKpi::calculate(&partial);
        assert_eq!(kpi.makespan, 1);
        assert_eq!(kpi.utilization_by_machine, vec![1.0, 0.0, 0.0]);
        assert_eq!(kpi.total_idle_time, 2);
    }
}
