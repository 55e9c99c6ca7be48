//! Scenario-side support: per-scenario state, bounded waits, object
//! registry and fixture lifetimes.

pub mod fixture;
pub mod registry;
pub mod state;
pub mod wait;

pub use fixture::{Fixture, Scenario};
pub use registry::ObjectRegistry;
pub use state::{Entries, ScenarioState};
pub use wait::wait_for;
