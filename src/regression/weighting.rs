use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RegressionError;

/// Function applied to `x` or `y` before taking its reciprocal as the
/// point weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightTransform {
    Sqrt,
    Identity,
    Square,
}

impl WeightTransform {
    pub fn apply(self, v: f64) -> f64 {
        match self {
            WeightTransform::Sqrt => v.sqrt(),
            WeightTransform::Identity => v,
            WeightTransform::Square => v * v,
        }
    }
}

/// Which variable the weight is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightingFamily {
    Unweighted,
    /// `w = 1 / f(x)`, x = nominal concentration.
    X(WeightTransform),
    /// `w = 1 / f(y)`, y = instrument response.
    Y(WeightTransform),
}

/// Least-squares weighting applied to the calibration standards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightingFactor {
    #[default]
    Unweighted,
    OneOverSqrtX,
    OneOverX,
    OneOverXSquared,
    OneOverSqrtY,
    OneOverY,
    OneOverYSquared,
}

impl WeightingFactor {
    pub const ALL: [WeightingFactor; 7] = [
        WeightingFactor::Unweighted,
        WeightingFactor::OneOverSqrtX,
        WeightingFactor::OneOverX,
        WeightingFactor::OneOverXSquared,
        WeightingFactor::OneOverSqrtY,
        WeightingFactor::OneOverY,
        WeightingFactor::OneOverYSquared,
    ];

    pub fn family(self) -> WeightingFamily {
        use WeightTransform::*;
        match self {
            WeightingFactor::Unweighted => WeightingFamily::Unweighted,
            WeightingFactor::OneOverSqrtX => WeightingFamily::X(Sqrt),
            WeightingFactor::OneOverX => WeightingFamily::X(Identity),
            WeightingFactor::OneOverXSquared => WeightingFamily::X(Square),
            WeightingFactor::OneOverSqrtY => WeightingFamily::Y(Sqrt),
            WeightingFactor::OneOverY => WeightingFamily::Y(Identity),
            WeightingFactor::OneOverYSquared => WeightingFamily::Y(Square),
        }
    }

    /// Weight of a standard at concentration `x` with response `y`.
    pub fn weight(self, x: f64, y: f64) -> f64 {
        match self.family() {
            WeightingFamily::Unweighted => 1.0,
            WeightingFamily::X(f) => 1.0 / f.apply(x),
            WeightingFamily::Y(f) => 1.0 / f.apply(y),
        }
    }

    /// Label as written by the acquisition software.
    pub fn label(self) -> &'static str {
        match self {
            WeightingFactor::Unweighted => "None",
            WeightingFactor::OneOverSqrtX => "1 / sqrt(x)",
            WeightingFactor::OneOverX => "1 / x",
            WeightingFactor::OneOverXSquared => "1 / (x * x)",
            WeightingFactor::OneOverSqrtY => "1 / sqrt(y)",
            WeightingFactor::OneOverY => "1 / y",
            WeightingFactor::OneOverYSquared => "1 / (y * y)",
        }
    }

    /// Recognise a weighting label. Whitespace is ignored, so `1/x` and
    /// `1 / x` are the same factor; `x^2` and `x²` alias `(x * x)`.
    pub fn from_label(label: &str) -> Option<Self> {
        let compact: String = label.chars().filter(|c| !c.is_whitespace()).collect();
        let factor = match compact.as_str() {
            "None" | "none" | "Unweighted" | "unweighted" => WeightingFactor::Unweighted,
            "1/sqrt(x)" => WeightingFactor::OneOverSqrtX,
            "1/x" => WeightingFactor::OneOverX,
            "1/(x*x)" | "1/x^2" | "1/x²" => WeightingFactor::OneOverXSquared,
            "1/sqrt(y)" => WeightingFactor::OneOverSqrtY,
            "1/y" => WeightingFactor::OneOverY,
            "1/(y*y)" | "1/y^2" | "1/y²" => WeightingFactor::OneOverYSquared,
            _ => return None,
        };
        Some(factor)
    }
}

impl fmt::Display for WeightingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WeightingFactor {
    type Err = RegressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WeightingFactor::from_label(s).ok_or_else(|| {
            RegressionError::InvalidConfiguration(format!("unsupported weighting factor '{s}'"))
        })
    }
}
