//! # welltest-fit
//!
//! `welltest-fit` is a pressure-transient (well-test) model fitting engine
//! built around a bounded Levenberg-Marquardt optimizer.
//!
//! The library provides:
//! - A closed family of analytical well-test models (wellbore storage and skin
//!   with homogeneous, double-porosity and radial-composite reservoirs,
//!   uniform-flux and bilinear-flow fractures)
//! - The Bourdet log-time pressure derivative with a smoothing pass
//! - Weighted pressure + derivative least-squares fitting with bounds,
//!   cancellation and per-iteration progress events
//! - A background fit controller delivering ordered events to callbacks
//! - Sensitivity sweeps over one model parameter
//! - Standard errors of fitted parameters
//!
//! ## Basic Usage
//!
//! ```
//! use welltest_fit::derivative::bourdet_derivative;
//! use welltest_fit::models::{evaluate, ModelId};
//! use welltest_fit::parameters::ParameterSet;
//!
//! let params = ParameterSet::from_model(ModelId::DualPorosity);
//! let time: Vec<f64> = (0..40).map(|i| 1e-3 * 10f64.powf(i as f64 / 8.0)).collect();
//! let curve = evaluate(ModelId::DualPorosity, &params.values(), &time).unwrap();
//!
//! // derivative of the model curve, the way observed data is differentiated
//! let derivative = bourdet_derivative(&time, &curve.pressure, 0.1);
//! assert_eq!(derivative.len(), time.len());
//! ```

// Public modules
pub mod error;

// Parameter system
pub mod parameters;

// Models, data and derivative
pub mod data;
pub mod derivative;
pub mod models;

// Optimization
pub mod lm;
pub mod problem;
pub mod utils;

// Fitting on top of the optimizer
pub mod controller;
pub mod fitting;
pub mod sensitivity;
pub mod uncertainty;

// Re-exports for convenience
pub use controller::{FitController, FitEvent, FitHandle, RunId};
pub use data::ObservedDataset;
pub use derivative::{bourdet_derivative, smooth, DerivativeOptions};
pub use error::{Result, WellTestError};
pub use fitting::{fit_blocking, fit_model, FitRequest, FitResult, IterationEvent, ResidualScale};
pub use lm::{CancelToken, LevenbergMarquardt, LmConfig, StopReason};
pub use models::{evaluate, ModelCurve, ModelId, ModelRegistry};
pub use parameters::{Bounds, FitParameter, ParameterSet};
pub use problem::Problem;
pub use sensitivity::{generate, parse_values, SensitivityCurve, SensitivitySweep};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
