use std::fmt;
use std::str::FromStr;

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn check_same_length(x1: &ArrayView1<'_, f64>, x2: &ArrayView1<'_, f64>) -> Result<()> {
    if x1.len() != x2.len() {
        return Err(Error::ShapeMismatch {
            expected: vec![x1.len()],
            actual: vec![x2.len()],
        });
    }
    Ok(())
}

/// Euclidean distance between two vectors, `sqrt(sum((x1 - x2)^2))`
pub fn euclidean_distance(x1: ArrayView1<'_, f64>, x2: ArrayView1<'_, f64>) -> Result<f64> {
    check_same_length(&x1, &x2)?;
    let diff = &x1 - &x2;
    Ok(diff.dot(&diff).sqrt())
}

/// Normalized scalar product distance, `1 - cos(x1, x2)`.
///
/// Lower means more similar: parallel vectors give 0, orthogonal ones 1 and
/// opposite ones 2. Fails when either vector has a zero norm.
pub fn normalized_scalar_product(x1: ArrayView1<'_, f64>, x2: ArrayView1<'_, f64>) -> Result<f64> {
    check_same_length(&x1, &x2)?;
    let norms = x1.dot(&x1) * x2.dot(&x2);
    if norms == 0.0 {
        return Err(Error::InvalidInput(
            "normalized scalar product is undefined for zero-norm vectors".to_string(),
        ));
    }
    Ok(1.0 - x1.dot(&x2) / norms.sqrt())
}

/// Chi-square distance between two histograms.
///
/// Sums `(h1[i] - h2[i])^2 / (h1[i] + h2[i])` over the bins where the two
/// histograms differ. Equal bins, including empty ones, contribute nothing.
pub fn chi_square(h1: ArrayView1<'_, f64>, h2: ArrayView1<'_, f64>) -> Result<f64> {
    check_same_length(&h1, &h2)?;
    let mut d = 0.0;
    for (i, (&a, &b)) in h1.iter().zip(h2.iter()).enumerate() {
        if a == b {
            continue;
        }
        let sum = a + b;
        if sum == 0.0 {
            return Err(Error::InvalidInput(format!(
                "chi-square bin {} has a zero sum ({} + {})",
                i, a, b
            )));
        }
        d += (a - b) * (a - b) / sum;
    }
    Ok(d)
}

/// Selects one of the distance functions by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// [`euclidean_distance`]
    Euclidean,
    /// [`normalized_scalar_product`]
    #[serde(alias = "cosine")]
    NormalizedScalarProduct,
    /// [`chi_square`]
    ChiSquare,
}

impl DistanceMetric {
    /// Every available metric.
    pub const ALL: [DistanceMetric; 3] = [
        DistanceMetric::Euclidean,
        DistanceMetric::NormalizedScalarProduct,
        DistanceMetric::ChiSquare,
    ];

    /// Computes the distance between `x1` and `x2`
    pub fn compute(self, x1: ArrayView1<'_, f64>, x2: ArrayView1<'_, f64>) -> Result<f64> {
        match self {
            Self::Euclidean => euclidean_distance(x1, x2),
            Self::NormalizedScalarProduct => normalized_scalar_product(x1, x2),
            Self::ChiSquare => chi_square(x1, x2),
        }
    }

    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::NormalizedScalarProduct => "normalized_scalar_product",
            Self::ChiSquare => "chi_square",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(Self::Euclidean),
            "normalized_scalar_product" | "cosine" => Ok(Self::NormalizedScalarProduct),
            "chi_square" | "chi2" => Ok(Self::ChiSquare),
            other => Err(Error::InvalidInput(format!("unknown distance metric '{}'", other))),
        }
    }
}
