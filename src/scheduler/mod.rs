//! Dispatching-rule solver and KPI evaluation.
//!
//! # Algorithm
//!
//! `DispatchingRuleSolver` repeatedly asks a rule engine for the next
//! available operation and a machine chooser for its machine, until the
//! schedule is complete. It is not optimal, but provides fast baseline
//! solutions.
//!
//! # KPI
//!
//! `ScheduleKpi` computes standard scheduling metrics: makespan, idle
//! time, utilization, completion and flow time, and tardiness.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Baker & Trietsch (2019), "Principles of Sequencing and Scheduling"

mod kpi;
mod solver;

pub use kpi::ScheduleKpi;
pub use solver::{DispatchingRuleSolver, SolverConfig};
