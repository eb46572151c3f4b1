//! Battle simulation modules

pub mod arena;
pub mod engine;
pub mod scenario;
pub mod side;
pub mod snapshot;

pub use arena::{AdminCommand, Arena, ArenaError, ArenaHandle, OperatorHandle, ViewerRole};
pub use scenario::{Scenario, ScenarioError};
pub use side::{Pair, Side};
