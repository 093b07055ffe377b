mod common;

use std::sync::Arc;

use common::{classic_instance, init_tracing, random_instance};
use jobshop_dispatch::dispatching::{
    DispatchingRuleType, Dispatcher, HistoryObserver, MachineChooserType, ReadyOperationFilterType,
};
use jobshop_dispatch::models::{JobShopInstance, Schedule};
use jobshop_dispatch::scheduler::{DispatchingRuleSolver, SolverConfig};

fn instances() -> Vec<Arc<JobShopInstance>> {
    let mut instances = vec![classic_instance()];
    for seed in 0..4 {
        instances.push(random_instance(seed, 5, 4, false));
        instances.push(random_instance(100 + seed, 4, 3, true));
    }
    instances
}

fn filter_sets() -> Vec<Vec<ReadyOperationFilterType>> {
    let mut sets = vec![Vec::new(), ReadyOperationFilterType::ALL.to_vec()];
    sets.extend(ReadyOperationFilterType::ALL.iter().map(|&f| vec![f]));
    sets
}

fn assert_machine_invariants(schedule: &Schedule) {
    Schedule::check_schedule(schedule.schedule()).unwrap();
    for (machine_id, sequence) in schedule.schedule().iter().enumerate() {
        for pair in sequence.windows(2) {
            assert!(pair[1].start_time >= pair[0].end_time());
        }
        assert!(sequence.iter().all(|s| s.machine_id() == machine_id));
    }
}

#[test]
fn every_configuration_completes() {
    init_tracing();
    for instance in instances() {
        for rule in DispatchingRuleType::ALL {
            for chooser in MachineChooserType::ALL {
                for filters in filter_sets() {
                    let config = SolverConfig {
                        dispatching_rule: rule,
                        machine_chooser: chooser,
                        ready_operation_filters: filters.clone(),
                        seed: Some(5),
                    };
                    let schedule = DispatchingRuleSolver::from_config(&config)
                        .solve(Arc::clone(&instance))
                        .unwrap();
                    assert!(schedule.is_complete(), "{config:?} on {}", instance.name());
                    assert_eq!(schedule.num_scheduled_operations(), instance.num_operations());
                    assert_machine_invariants(&schedule);
                }
            }
        }
    }
}

#[test]
fn seeded_solvers_are_deterministic() {
    for instance in instances() {
        let config = SolverConfig {
            dispatching_rule: DispatchingRuleType::Random,
            machine_chooser: MachineChooserType::Random,
            ready_operation_filters: Vec::new(),
            seed: Some(2024),
        };
        let a = DispatchingRuleSolver::from_config(&config).solve(Arc::clone(&instance)).unwrap();
        let b = DispatchingRuleSolver::from_config(&config).solve(Arc::clone(&instance)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.makespan(), b.makespan());
    }
}

#[test]
fn reset_then_replay_matches_fresh_run() {
    for instance in instances() {
        let solver = DispatchingRuleSolver::new();
        let mut dispatcher = Dispatcher::new(Arc::clone(&instance));
        let history = dispatcher.subscribe(HistoryObserver::new());
        solver.solve_with(&mut dispatcher).unwrap();
        let first_run = dispatcher.schedule().clone();
        let order: Vec<(usize, usize)> = dispatcher
            .observer::<HistoryObserver>(history)
            .unwrap()
            .history()
            .iter()
            .map(|s| (s.operation_id(), s.machine_id()))
            .collect();

        dispatcher.reset();
        assert!(dispatcher.observer::<HistoryObserver>(history).unwrap().history().is_empty());
        for &(operation_id, machine_id) in &order {
            let operation = instance.operation(operation_id).unwrap();
            dispatcher.dispatch(operation, machine_id).unwrap();
        }
        assert_eq!(*dispatcher.schedule(), first_run);

        let mut fresh = Dispatcher::new(Arc::clone(&instance));
        for &(operation_id, machine_id) in &order {
            fresh.dispatch(instance.operation(operation_id).unwrap(), machine_id).unwrap();
        }
        assert_eq!(*fresh.schedule(), first_run);
    }
}

#[test]
fn critical_path_is_a_connected_chain() {
    for instance in instances() {
        let schedule = DispatchingRuleSolver::new().solve(Arc::clone(&instance)).unwrap();
        let path = schedule.critical_path();

        let last = path.last().unwrap();
        assert_eq!(last.end_time(), schedule.makespan());
        for pair in path.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            assert!(a.job_id() == b.job_id() || a.machine_id() == b.machine_id());
            assert!(a.end_time() <= b.start_time);
        }
    }
}

#[test]
fn schedules_round_trip_through_machine_sequences() {
    for instance in instances() {
        let schedule = DispatchingRuleSolver::new().solve(Arc::clone(&instance)).unwrap();
        let replayed =
            Schedule::from_operation_sequences(Arc::clone(&instance), &schedule.operation_sequences(), None).unwrap();
        assert_eq!(replayed, schedule);

        let restored = Schedule::from_data(&schedule.to_data()).unwrap();
        assert_eq!(restored, schedule);

        // job ids identify the operation only when each has one machine
        if !instance.is_flexible() {
            let replayed =
                Schedule::from_job_sequences(Arc::clone(&instance), &schedule.job_sequences(), None).unwrap();
            assert_eq!(replayed, schedule);
        }
    }
}
