//! Alchemy Factory Production Calculator
//!
//! Resolves the machines, heat, nutrients and byproducts needed to sustain
//! a target output rate, including chains that feed on their own output.

pub mod calculator;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod rates;
pub mod sample;
pub mod selector;
pub mod summary;

pub use calculator::{Calculator, Computation, Convergence};
pub use error::CalcError;
pub use models::{CalcRequest, Catalog, Preferences};
