#![allow(dead_code)]

use std::sync::Arc;

use jobshop_dispatch::models::{JobShopInstance, Operation};
use rand::rngs::StdRng;
use rand::seq::{index, SliceRandom};
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

/// Routes library events to the test harness; `RUST_LOG=debug` shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// job0 = [(m0,1),(m1,1),(m2,7)], job1 = [(m1,5),(m2,1),(m0,1)],
/// job2 = [(m2,1),(m0,3),(m1,2)]
pub fn classic_instance() -> Arc<JobShopInstance> {
    let jobs = vec![
        vec![Operation::single(0, 1), Operation::single(1, 1), Operation::single(2, 7)],
        vec![Operation::single(1, 5), Operation::single(2, 1), Operation::single(0, 1)],
        vec![Operation::single(2, 1), Operation::single(0, 3), Operation::single(1, 2)],
    ];
    Arc::new(JobShopInstance::new(jobs, "classic").unwrap())
}

/// Random instance where every job visits every machine once; with
/// `flexible`, each operation gets one or two candidate machines instead.
pub fn random_instance(seed: u64, num_jobs: usize, num_machines: usize, flexible: bool) -> Arc<JobShopInstance> {
    let mut rng = StdRng::seed_from_u64(seed);
    let jobs = (0..num_jobs)
        .map(|_| {
            let mut route: Vec<usize> = (0..num_machines).collect();
            route.shuffle(&mut rng);
            route
                .into_iter()
                .map(|machine| {
                    let duration = rng.random_range(1..=9);
                    if flexible {
                        let count = rng.random_range(1..=2.min(num_machines));
                        let machines = index::sample(&mut rng, num_machines, count).into_vec();
                        Operation::new(machines, duration)
                    } else {
                        Operation::single(machine, duration)
                    }
                })
                .collect()
        })
        .collect();
    Arc::new(JobShopInstance::new(jobs, format!("random-{seed}")).unwrap())
}
