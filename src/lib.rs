//! GenSVM: a Generalized Multiclass Support Vector Machine trainer and
//! grid-search driver.
//!
//! The core is a simplex reformulation of the multiclass hinge loss,
//! optimized per configuration by an iterative majorization solver
//! ([`solver`]), wrapped in a warm-started grid search over
//! (regularization, loss, kernel) configurations ([`grid`]) evaluated by
//! cross-validation ([`cv`]). [`kernel`] and [`simplex`] build the
//! precomputable geometry the solver needs; [`predict`] maps a fitted
//! model back onto class labels.

pub mod cv;
pub mod data;
pub mod error;
pub mod grid;
pub mod io;
pub mod kernel;
pub mod linalg;
pub mod model;
pub mod predict;
pub mod rng;
pub mod simplex;
pub mod solver;

pub use data::Dataset;
pub use error::{GenSvmError, Result};
pub use kernel::KernelKind;
pub use model::{Hyperparams, Model, WeightScheme};
pub use rng::GenSvmRng;
