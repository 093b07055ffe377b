//! Incremental job-shop scheduling engine.
//!
//! Builds schedules one operation at a time through a [`Dispatcher`]
//! that enforces job precedence and machine exclusivity, so every
//! heuristic (dispatching rules, search, learning agents) shares one
//! validated construction path.
//!
//! # Modules
//!
//! - **`models`**: Problem and solution types: `Operation`,
//!   `JobShopInstance`, `ScheduledOperation`, `Schedule`, `Calendar`
//! - **`dispatching`**: The `Dispatcher`, its observers, and the
//!   decision-point library (filters, start-time calculators, rules,
//!   machine choosers)
//! - **`scheduler`**: `DispatchingRuleSolver` and `ScheduleKpi`
//! - **`validation`**: Input integrity checks (candidate sets, matrix
//!   shapes, job sequences)
//!
//! # Example
//!
//! ```
//! use jobshop_dispatch::models::JobShopInstance;
//! use jobshop_dispatch::scheduler::{DispatchingRuleSolver, ScheduleKpi};
//!
//! let instance = JobShopInstance::from_matrices(
//!     &[vec![1, 1, 7], vec![5, 1, 1], vec![1, 3, 2]],
//!     &[vec![vec![0], vec![1], vec![2]], vec![vec![1], vec![2], vec![0]], vec![vec![2], vec![0], vec![1]]],
//!     None,
//!     "classic",
//! ).unwrap();
//!
//! let schedule = DispatchingRuleSolver::new().solve(instance).unwrap();
//! assert_eq!(schedule.makespan(), 11);
//! assert_eq!(ScheduleKpi::calculate(&schedule).makespan, 11);
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Brucker (2007), "Scheduling Algorithms"
//! - Blazewicz et al. (2019), "Handbook on Scheduling"
//!
//! [`Dispatcher`]: dispatching::Dispatcher

pub mod dispatching;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod validation;

pub use error::{JobShopError, Result};
