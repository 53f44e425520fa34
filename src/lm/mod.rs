//! Levenberg-Marquardt algorithm implementation.
//!
//! This module provides a bounded Levenberg-Marquardt optimizer for nonlinear
//! least-squares problems: Marquardt (diagonal) damping, a bounded inner loop
//! of damping retries per iteration, hard clamping into parameter bounds and
//! cooperative cancellation through a [`CancelToken`].

pub mod algorithm;
pub mod config;
pub mod convergence;
pub mod solver;
pub mod step;

// Re-export key types
pub use algorithm::{CancelToken, LevenbergMarquardt, LmIteration, LmResult};
pub use config::LmConfig;
pub use convergence::{ConvergenceCriteria, StopReason};
pub use solver::solve;
pub use step::{LmStep, StepResult};
