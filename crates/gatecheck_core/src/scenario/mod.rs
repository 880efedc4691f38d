//! Claims-driven access scenarios.
//!
//! A [`Scenario`] connects as one identity and runs an ordered list of steps,
//! each with the outcome it must have (allowed, denied, not found, ...). A
//! [`Suite`] runs scenarios in order against one engine instance, carrying
//! the ids of apps created by earlier scenarios to later ones.

mod builder;
pub mod fixtures;
mod report;
mod runner;
mod steps;

pub use builder::{Scenario, ScenarioSpec, Suite};
pub use report::{Mismatch, ScenarioResult, SuiteReport};
pub use runner::{ScenarioRunner, SuiteContext};
pub use steps::{Expectation, Outcome, Step, StepSpec};
