pub mod error;
pub mod sensitivity;
pub mod time_value;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "capital_budgeting")]
pub mod capital_budgeting;

#[cfg(feature = "lending")]
pub mod lending;

#[cfg(feature = "derivatives")]
pub mod derivatives;

#[cfg(feature = "fixed_income")]
pub mod fixed_income;

#[cfg(feature = "ratios")]
pub mod ratios;

#[cfg(feature = "engine")]
pub mod engine;

pub use error::FincashError;
pub use types::*;

/// Standard result type for all fincash operations
pub type FincashResult<T> = Result<T, FincashError>;
