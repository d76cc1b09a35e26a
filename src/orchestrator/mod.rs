//! Application-level orchestration.
//!
//! This module owns the wizard state machine and the scan lifecycle. UI/CLI
//! layers send `UiCommand`s and render the `WizardEvent` stream; they never
//! mutate wizard state directly.

mod controller;

pub use controller::{run_controller, UiCommand};
