//! Machine choosers.
//!
//! Once a rule has picked an operation, a chooser decides which of its
//! candidate machines it runs on. Only flexible operations give it a real
//! choice.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::Dispatcher;
use crate::error::{JobShopError, Result};
use crate::models::Operation;
use crate::validation::ValidationErrorKind;

/// Picks the machine an operation is dispatched to.
pub trait MachineChooser: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// One of `operation.machines`.
    fn choose(&self, dispatcher: &Dispatcher, operation: &Operation) -> Result<usize>;
}

fn no_candidates(operation: &Operation) -> JobShopError {
    JobShopError::validation(
        ValidationErrorKind::EmptyMachineSet,
        format!("operation {} has no candidate machines", operation.operation_id),
    )
}

/// The first candidate machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstMachine;

impl MachineChooser for FirstMachine {
    fn name(&self) -> &'static str {
        "first"
    }

    fn choose(&self, _dispatcher: &Dispatcher, operation: &Operation) -> Result<usize> {
        operation
            .machines
            .first()
            .copied()
            .ok_or_else(|| no_candidates(operation))
    }
}

/// A uniformly random candidate machine.
#[derive(Debug)]
pub struct RandomMachine {
    rng: Mutex<StdRng>,
}

impl RandomMachine {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng: Mutex::new(rng) }
    }
}

impl MachineChooser for RandomMachine {
    fn name(&self) -> &'static str {
        "random"
    }

    fn choose(&self, _dispatcher: &Dispatcher, operation: &Operation) -> Result<usize> {
        let mut rng = match self.rng.lock() {
            Ok(rng) => rng,
            Err(poisoned) => poisoned.into_inner(),
        };
        operation
            .machines
            .choose(&mut *rng)
            .copied()
            .ok_or_else(|| no_candidates(operation))
    }
}

/// Built-in choosers selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineChooserType {
    #[default]
    First,
    Random,
}

impl MachineChooserType {
    pub const ALL: [Self; 2] = [Self::First, Self::Random];

    pub fn name(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Random => "random",
        }
    }

    /// The chooser for this name; `seed` only matters for `Random`.
    pub fn build(self, seed: Option<u64>) -> Box<dyn MachineChooser> {
        match self {
            Self::First => Box::new(FirstMachine),
            Self::Random => Box::new(RandomMachine::new(seed)),
        }
    }
}

impl fmt::Display for MachineChooserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MachineChooserType {
    type Err = JobShopError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                JobShopError::validation(
                    ValidationErrorKind::UnknownName,
                    format!(
                        "Machine chooser '{s}' not recognized. Available choosers: {}.",
                        Self::ALL.map(Self::name).join(", ")
                    ),
                )
            })
    }
}
