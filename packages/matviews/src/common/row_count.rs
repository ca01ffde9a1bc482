//! How a view's size is reported after an operation.

use serde::{Deserialize, Serialize};

/// Row-count reporting strategy.
///
/// `Estimated` reads `reltuples` from the catalog (O(1), may be stale),
/// `Exact` issues `SELECT COUNT(*)` (O(n)), `None` skips counting.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowCountStrategy {
    #[default]
    Estimated,
    Exact,
    None,
}

impl std::fmt::Display for RowCountStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowCountStrategy::Estimated => write!(f, "estimated"),
            RowCountStrategy::Exact => write!(f, "exact"),
            RowCountStrategy::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for RowCountStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "estimated" => Ok(RowCountStrategy::Estimated),
            "exact" => Ok(RowCountStrategy::Exact),
            "none" => Ok(RowCountStrategy::None),
            _ => Err(anyhow::anyhow!("Invalid row count strategy: {}", s)),
        }
    }
}
