//! # Crypto Dash
//!
//! Command line front end over [`crypto_forecast`]. Each dashboard view of the
//! analysis becomes a sub-command: `overview`, `kpis`, `eda`, `fit`,
//! `forecast` and `evaluate`.
//!
//! [`dashboard::Dashboard`] computes the reports and [`render`] writes them
//! as aligned text tables, JSON or CSV.

pub mod dashboard;
pub mod render;

use crypto_forecast::{ForecastError, ModelKind};
use std::fmt;
use std::str::FromStr;

pub use dashboard::{Dashboard, EdaReport, Overview};

/// Output encoding of every sub-command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

/// One model or all four
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelSelection {
    #[default]
    All,
    One(ModelKind),
}

impl ModelSelection {
    /// Selected models in reporting order
    pub fn models(&self) -> Vec<ModelKind> {
        match self {
            ModelSelection::All => ModelKind::ALL.to_vec(),
            ModelSelection::One(kind) => vec![*kind],
        }
    }
}

impl FromStr for ModelSelection {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(ModelSelection::All);
        }
        s.parse().map(ModelSelection::One)
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSelection::All => write!(f, "all"),
            ModelSelection::One(kind) => write!(f, "{}", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use rstest::rstest;

    #[rstest]
    #[case("all", 4)]
    #[case("ALL", 4)]
    #[case("prophet", 1)]
    #[case(" sarima ", 1)]
    fn test_model_selection_count(#[case] input: &str, #[case] expected: usize) {
        assert_eq!(input.parse::<ModelSelection>().unwrap().models().len(), expected);
    }

    #[test]
    fn test_model_selection() {
        assert_eq!(
            "prophet".parse::<ModelSelection>().unwrap().models(),
            vec![ModelKind::Prophet]
        );
        assert_eq!(ModelSelection::One(ModelKind::Lstm).to_string(), "LSTM");
        assert!("holt".parse::<ModelSelection>().is_err());
    }
}
