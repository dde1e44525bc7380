//! # Crypto Math
//!
//! Numeric building blocks used by the crypto price analysis crates.
//! Everything here works on plain `f64` slices and knows nothing about dates
//! or symbols.
//!
//! - [`returns`]: day-over-day percentage and log returns
//! - [`rolling`]: trailing-window mean and standard deviation
//! - [`stats`]: descriptive statistics, histograms and correlation
//! - [`scaling`]: min-max scaling to a fixed range
//! - [`linalg`]: dense (optionally ridge-penalised) least squares
//! - [`optimize`]: derivative-free Nelder-Mead minimisation

use thiserror::Error;

pub mod linalg;
pub mod optimize;
pub mod returns;
pub mod rolling;
pub mod scaling;
pub mod stats;

/// Errors that can occur in numeric calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numeric operations
pub type Result<T> = std::result::Result<T, MathError>;
