//! Preprocessing operation names and their fixed execution order

use serde::{Deserialize, Serialize};

use crate::error::{PrepError, Result};

/// A requested preprocessing operation.
///
/// Variants are declared in execution order; `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Operation {
    Zv,
    Nzv,
    Corr,
    KnnImpute,
    BagImpute,
    MedianImpute,
    BoxCox,
    YeoJohnson,
    ExpoTrans,
    Center,
    Scale,
    Range,
    Pca,
    Ica,
    SpatialSign,
}

impl Operation {
    pub const ALL: [Operation; 15] = [
        Operation::Zv,
        Operation::Nzv,
        Operation::Corr,
        Operation::KnnImpute,
        Operation::BagImpute,
        Operation::MedianImpute,
        Operation::BoxCox,
        Operation::YeoJohnson,
        Operation::ExpoTrans,
        Operation::Center,
        Operation::Scale,
        Operation::Range,
        Operation::Pca,
        Operation::Ica,
        Operation::SpatialSign,
    ];

    /// Canonical operation name
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Zv => "zv",
            Operation::Nzv => "nzv",
            Operation::Corr => "corr",
            Operation::KnnImpute => "knnImpute",
            Operation::BagImpute => "bagImpute",
            Operation::MedianImpute => "medianImpute",
            Operation::BoxCox => "BoxCox",
            Operation::YeoJohnson => "YeoJohnson",
            Operation::ExpoTrans => "expoTrans",
            Operation::Center => "center",
            Operation::Scale => "scale",
            Operation::Range => "range",
            Operation::Pca => "pca",
            Operation::Ica => "ica",
            Operation::SpatialSign => "spatialSign",
        }
    }

    /// Filters remove columns instead of transforming them
    pub fn is_filter(&self) -> bool {
        matches!(self, Operation::Zv | Operation::Nzv | Operation::Corr)
    }

    pub fn is_imputation(&self) -> bool {
        matches!(
            self,
            Operation::KnnImpute | Operation::BagImpute | Operation::MedianImpute
        )
    }

    pub fn is_power_transform(&self) -> bool {
        matches!(
            self,
            Operation::BoxCox | Operation::YeoJohnson | Operation::ExpoTrans
        )
    }

    /// Operations that need centered and scaled input
    pub fn requires_standardization(&self) -> bool {
        matches!(self, Operation::Pca | Operation::Ica | Operation::KnnImpute)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Operation {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        Operation::ALL
            .iter()
            .find(|op| op.name() == trimmed || op.name().eq_ignore_ascii_case(trimmed))
            .copied()
            .ok_or_else(|| PrepError::InvalidOperation(trimmed.to_string()))
    }
}

/// Parse a comma-separated operation list such as `"center,scale,pca"`.
pub fn parse_operations(list: &str) -> Result<Vec<Operation>> {
    list.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}
