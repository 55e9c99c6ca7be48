//! Stagehand
//!
//! Test-automation plumbing for UI acceptance tests that drive a mobile app
//! from outside its process: disposable HTTP servers whose routes change per
//! scenario, discovery of the address a device can call back on, and a
//! backdoor command protocol for reading and changing app state directly.

pub mod app;
pub mod backdoor;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fixtures;
pub mod scenario;
pub mod server;

pub use error::{Result, StagehandError};
