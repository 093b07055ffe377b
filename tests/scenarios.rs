mod common;

use std::sync::Arc;

use common::{classic_instance, init_tracing};
use jobshop_dispatch::dispatching::{Dispatcher, DispatcherObserver, HistoryObserver, ObserverKind};
use jobshop_dispatch::models::{JobShopInstance, Schedule, ScheduleData, ScheduledOperation};
use jobshop_dispatch::scheduler::{DispatchingRuleSolver, ScheduleKpi, SolverConfig};
use jobshop_dispatch::validation::ValidationErrorKind;

#[test]
fn manual_dispatch_reaches_optimum() {
    init_tracing();
    let instance = classic_instance();
    let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
    let jobs = instance.jobs();

    dispatcher.dispatch(&jobs[0][0], 0).unwrap();
    dispatcher.dispatch(&jobs[0][1], 1).unwrap();
    assert!(dispatcher.dispatch(&jobs[2][2], 1).is_err());
    dispatcher.dispatch(&jobs[2][0], 2).unwrap();
    dispatcher.dispatch(&jobs[2][1], 0).unwrap();
    dispatcher.dispatch(&jobs[1][0], 1).unwrap();
    dispatcher.dispatch(&jobs[0][2], 2).unwrap();
    dispatcher.dispatch(&jobs[2][2], 1).unwrap();
    dispatcher.dispatch(&jobs[1][1], 2).unwrap();
    dispatcher.dispatch(&jobs[1][2], 0).unwrap();

    assert_eq!(dispatcher.schedule().makespan(), 11);
    assert_eq!(dispatcher.job_next_available_time(), &[9, 11, 9]);
    assert_eq!(dispatcher.machine_next_available_time(), &[11, 9, 10]);
    assert_eq!(dispatcher.job_next_operation_index(), &[3, 3, 3]);
}

#[test]
fn most_work_remaining_with_dominance_filter() {
    init_tracing();
    let schedule = DispatchingRuleSolver::new().solve(classic_instance()).unwrap();
    assert_eq!(schedule.makespan(), 11);
    assert_eq!(schedule.job_sequences(), vec![vec![0, 2, 1], vec![0, 1, 2], vec![2, 0, 1]]);
}

#[test]
fn most_work_remaining_without_filter() {
    init_tracing();
    let config = SolverConfig {
        ready_operation_filters: Vec::new(),
        ..SolverConfig::default()
    };
    let schedule = DispatchingRuleSolver::from_config(&config)
        .solve(classic_instance())
        .unwrap();
    assert!(schedule.is_complete());
    // without pruning, job 0 (9 units of work) runs through; its 7-unit
    // operation holds machine 2 over [2, 9) and job 2's head waits until 9
    assert_eq!(schedule.makespan(), 15);
}

#[test]
fn non_ready_dispatch_is_rejected() {
    let instance = classic_instance();
    let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
    dispatcher.dispatch(&instance.jobs()[0][0], 0).unwrap();

    let err = dispatcher.dispatch(&instance.jobs()[1][1], 2).unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.validation_kind(), Some(ValidationErrorKind::OperationNotReady));
    assert_eq!(dispatcher.schedule().num_scheduled_operations(), 1);
}

#[test]
fn stalled_job_sequences_are_rejected() {
    let instance = classic_instance();
    // every machine's head job has its next operation elsewhere
    let sequences = vec![vec![1, 0, 2], vec![2, 0, 1], vec![0, 1, 2]];
    let err = Schedule::from_job_sequences(Arc::clone(&instance), &sequences, None).unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationErrorKind::InfeasibleJobSequences));

    let err = Schedule::from_job_sequences(instance, &[vec![0], vec![4], vec![]], None).unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationErrorKind::UnknownJob));
}

#[test]
fn overlapping_append_is_rejected() {
    let instance = classic_instance();
    let mut schedule = Schedule::new(Arc::clone(&instance));
    let first = ScheduledOperation::new(instance.jobs()[0][0].clone(), 0, 0).unwrap();
    schedule.add(first).unwrap();

    // job 2's second operation runs on machine 0; 0 < end of the first (1)
    let overlapping = ScheduledOperation::new(instance.jobs()[2][1].clone(), 0, 0).unwrap();
    let err = schedule.add(overlapping).unwrap_err();
    assert_eq!(err.validation_kind(), Some(ValidationErrorKind::MachineOverlap));
    assert_eq!(schedule.num_scheduled_operations(), 1);
    assert_eq!(schedule.makespan(), 1);
}

#[test]
fn replay_reuses_dispatcher_and_observers() {
    let instance = classic_instance();
    let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
    let history = dispatcher.create_or_get_observer(|_: &HistoryObserver| true, |_| HistoryObserver::new());

    let sequences = vec![vec![0, 2, 1], vec![0, 1, 2], vec![2, 0, 1]];
    let schedule = Schedule::from_job_sequences(Arc::clone(&instance), &sequences, Some(&mut dispatcher)).unwrap();
    assert_eq!(schedule.makespan(), 11);

    let recorded = dispatcher.observer::<HistoryObserver>(history).unwrap();
    assert_eq!(recorded.history().len(), 9);
    assert_eq!(recorded.tag(), HistoryObserver::TAG);
    assert_eq!(
        dispatcher.create_or_get_observer(|_: &HistoryObserver| true, |_| HistoryObserver::new()),
        history
    );
}

#[test]
fn schedule_json_round_trip() {
    let schedule = DispatchingRuleSolver::new().solve(classic_instance()).unwrap();
    let json = serde_json::to_string(&schedule.to_data()).unwrap();
    let data: ScheduleData = serde_json::from_str(&json).unwrap();
    let restored = Schedule::from_data(&data).unwrap();

    assert_eq!(restored, schedule);
    assert_eq!(restored.instance().as_ref(), schedule.instance().as_ref());
    assert_eq!(restored.makespan(), 11);
}

#[test]
fn taillard_text_solves() {
    let text = "# 3 jobs, 3 machines\n\
                3 3\n\
                0 1 1 1 2 7\n\
                1 5 2 1 0 1\n\
                2 1 0 3 1 2\n";
    let instance = JobShopInstance::from_taillard_str(text, "ta-mini").unwrap();
    assert_eq!(instance, *classic_instance());

    let schedule = DispatchingRuleSolver::new().solve(instance).unwrap();
    let kpi = ScheduleKpi::calculate(&schedule);
    assert_eq!(kpi.makespan, 11);
    assert_eq!(kpi.completion_times, vec![Some(9), Some(11), Some(9)]);
}
