//! Session controller
//!
//! Orchestrates one logical viewing session: starts negotiations, wires the
//! connection monitor, restarts on degradation or configuration change and
//! publishes a single coarse [`ViewerState`].

pub mod session_controller;
pub mod state;

pub use session_controller::{ControllerDeps, ControllerHandle, SessionController};
pub use state::{ControllerState, LoadingState, ViewerState};
