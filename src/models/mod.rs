//! Job-shop domain models.
//!
//! Provides the problem and solution types shared by the dispatcher,
//! the decision-point functions and external solvers.
//!
//! | Type | Role |
//! |------|------|
//! | `Operation` | Unit of work with candidate machines and a duration |
//! | `JobShopInstance` | Immutable jobs of operations (the problem) |
//! | `ScheduledOperation` | Operation bound to a machine and start time |
//! | `Schedule` | Per-machine sequences of scheduled operations (the solution) |
//! | `Calendar` | Machine breakdown windows |

mod calendar;
mod instance;
mod operation;
mod schedule;
mod scheduled_operation;

pub use calendar::{Calendar, TimeWindow};
pub use instance::{InstanceData, JobShopInstance, MachinesMatrix, Metadata};
pub use operation::Operation;
pub use schedule::{Schedule, ScheduleData};
pub use scheduled_operation::ScheduledOperation;
