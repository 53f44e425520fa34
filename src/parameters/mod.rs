//! # Parameter System
//!
//! Named well-test parameters with physical bounds and fit flags.
//!
//! - [`FitParameter`]: one parameter with a value, bounds and a `vary` flag
//! - [`ParameterSet`]: an ordered collection that converts between named values
//!   (for the model evaluator) and dense fitted vectors (for the optimizer)
//! - [`Bounds`]: min/max limits; the optimizer hard-clamps into them
//!
//! ## Example Usage
//!
//! ```rust
//! use welltest_fit::models::ModelId;
//! use welltest_fit::parameters::ParameterSet;
//!
//! let mut params = ParameterSet::from_model(ModelId::HomogeneousRadial);
//! params.set_value("k", 25.0).unwrap();
//! params.set_vary("C", false).unwrap();
//!
//! assert_eq!(params.values()["k"], 25.0);
//! assert!(!params.fitted_names().contains(&"C".to_string()));
//! ```

pub mod bounds;
pub mod parameter;
pub mod parameters;

// Re-export key types
pub use bounds::{Bounds, BoundsError};
pub use parameter::{FitParameter, ParameterError};
pub use parameters::ParameterSet;
