use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::point::{RegressionData, RegressionPoint, SampleKind};
use super::weighting::WeightingFactor;
use crate::error::RegressionError;

/// Calibration model. Only `Linear` is fitted; `Quadratic` is read from
/// exports but rejected by [`Regression::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionType {
    #[default]
    Linear,
    Quadratic,
}

impl RegressionType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Linear" => Some(RegressionType::Linear),
            "Quadratic" => Some(RegressionType::Quadratic),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// LineFit
// ---------------------------------------------------------------------------

/// `response = gradient * concentration + y_intercept`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub gradient: f64,
    pub y_intercept: f64,
}

impl LineFit {
    pub fn concentration_for(&self, response: f64) -> f64 {
        (response - self.y_intercept) / self.gradient
    }

    pub fn response_for(&self, concentration: f64) -> f64 {
        self.gradient * concentration + self.y_intercept
    }
}

#[derive(Debug, Default)]
struct WeightedSums {
    n: usize,
    w: f64,
    wx: f64,
    wy: f64,
    wxx: f64,
    wxy: f64,
}

impl WeightedSums {
    fn accumulate(pairs: &[(f64, f64)], weighting: WeightingFactor) -> Self {
        pairs.iter().fold(Self::default(), |mut s, &(x, y)| {
            let w = weighting.weight(x, y);
            s.n += 1;
            s.w += w;
            s.wx += w * x;
            s.wy += w * y;
            s.wxx += w * x * x;
            s.wxy += w * x * y;
            s
        })
    }
}

/// `(x, y)` of every point, or `None` if any value is missing.
fn complete_pairs<'a>(points: impl Iterator<Item = &'a RegressionPoint>) -> Option<Vec<(f64, f64)>> {
    points
        .map(|p| Some((p.nominal_concentration?, p.instrument_response?)))
        .collect()
}

/// Weighted least-squares line through `points` (normally the active
/// standards). With unit weights this is ordinary least squares.
///
/// Returns `Ok(None)` when any point lacks a concentration or response:
/// a missing operand makes every sum, and so the fit, unknown.
pub fn fit_line<'a>(
    points: impl Iterator<Item = &'a RegressionPoint>,
    weighting: WeightingFactor,
) -> Result<Option<LineFit>, RegressionError> {
    let Some(pairs) = complete_pairs(points) else {
        return Ok(None);
    };
    let s = WeightedSums::accumulate(&pairs, weighting);

    let gradient = (s.w * s.wxy - s.wx * s.wy) / (s.w * s.wxx - s.wx * s.wx);
    let y_intercept = (s.wy - gradient * s.wx) / s.w;

    if !gradient.is_finite() || !y_intercept.is_finite() {
        return Err(RegressionError::DegenerateFit {
            gradient,
            y_intercept,
            active: s.n,
        });
    }
    Ok(Some(LineFit {
        gradient,
        y_intercept,
    }))
}

// ---------------------------------------------------------------------------
// Regression
// ---------------------------------------------------------------------------

/// A calibration over one run's samples.
///
/// Mutating the data (activating or deactivating a standard, changing the
/// weighting) does not refit; call [`Regression::update`] afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    model: RegressionType,
    data: RegressionData,
    weighting_factor: WeightingFactor,
    fit: Option<LineFit>,
}

impl Regression {
    pub fn new(data: RegressionData, weighting_factor: WeightingFactor) -> Self {
        Self::with_model(RegressionType::Linear, data, weighting_factor)
    }

    pub fn with_model(
        model: RegressionType,
        data: RegressionData,
        weighting_factor: WeightingFactor,
    ) -> Self {
        Self {
            model,
            data,
            weighting_factor,
            fit: None,
        }
    }

    pub fn model(&self) -> RegressionType {
        self.model
    }

    pub fn data(&self) -> &RegressionData {
        &self.data
    }

    pub fn into_data(self) -> RegressionData {
        self.data
    }

    pub fn weighting_factor(&self) -> WeightingFactor {
        self.weighting_factor
    }

    pub fn set_weighting_factor(&mut self, weighting_factor: WeightingFactor) {
        self.weighting_factor = weighting_factor;
    }

    /// `None` until a successful [`update`](Self::update).
    pub fn gradient(&self) -> Option<f64> {
        self.fit.map(|f| f.gradient)
    }

    pub fn y_intercept(&self) -> Option<f64> {
        self.fit.map(|f| f.y_intercept)
    }

    pub fn fit(&self) -> Option<LineFit> {
        self.fit
    }

    /// Include or exclude a point from the fit.
    pub fn set_active(
        &mut self,
        kind: SampleKind,
        index: usize,
        active: bool,
    ) -> Result<(), RegressionError> {
        let point = self
            .data
            .points_mut(kind)
            .get_mut(index)
            .ok_or_else(|| RegressionError::PointNotFound {
                kind: kind.to_string(),
                index,
            })?;
        point.is_active = active;
        Ok(())
    }

    /// Refit from the active standards, then back-calculate every point and
    /// the accuracy of standards and QCs.
    ///
    /// On error nothing is modified: the previous fit and concentrations
    /// stay in place.
    pub fn update(&mut self) -> Result<(), RegressionError> {
        match self.model {
            RegressionType::Linear => {}
            RegressionType::Quadratic => {
                return Err(RegressionError::InvalidConfiguration(
                    "quadratic regression is not supported".to_string(),
                ));
            }
        }

        let fit = match fit_line(self.data.active_standards(), self.weighting_factor) {
            Ok(fit) => fit,
            Err(e) => {
                warn!("Calibration fit rejected: {e}");
                return Err(e);
            }
        };

        match fit {
            Some(f) => info!(
                "Fitted {} active standard(s), weighting {}: gradient {:.6}, intercept {:.6}",
                self.data.active_standards().count(),
                self.weighting_factor,
                f.gradient,
                f.y_intercept
            ),
            None => warn!("Active standard with a missing value; fit is undefined"),
        }

        self.fit = fit;
        for point in self.data.iter_mut() {
            point.apply_fit(fit.as_ref());
        }
        Ok(())
    }

    /// Concentration for an arbitrary response on the current fit.
    pub fn concentration_for(&self, response: f64) -> Option<f64> {
        self.fit.map(|f| f.concentration_for(response))
    }

    pub fn response_for(&self, concentration: f64) -> Option<f64> {
        self.fit.map(|f| f.response_for(concentration))
    }

    /// Weighted coefficient of determination over the active standards.
    pub fn r_squared(&self) -> Option<f64> {
        let fit = self.fit?;
        let pairs = complete_pairs(self.data.active_standards())?;
        let weights: Vec<f64> = pairs
            .iter()
            .map(|&(x, y)| self.weighting_factor.weight(x, y))
            .collect();
        let sum_w: f64 = weights.iter().sum();
        let mean_y = pairs
            .iter()
            .zip(&weights)
            .map(|(&(_, y), w)| w * y)
            .sum::<f64>()
            / sum_w;

        let (ss_res, ss_tot) = pairs.iter().zip(&weights).fold(
            (0.0, 0.0),
            |(res, tot), (&(x, y), w)| {
                let r = y - fit.response_for(x);
                let t = y - mean_y;
                (res + w * r * r, tot + w * t * t)
            },
        );
        let r2 = 1.0 - ss_res / ss_tot;
        r2.is_finite().then_some(r2)
    }

    pub fn summary(&self) -> RegressionSummary {
        RegressionSummary {
            weighting_factor: self.weighting_factor,
            standards: self.data.standards.len(),
            active_standards: self.data.active_standards().count(),
            quality_controls: self.data.quality_controls.len(),
            unknowns: self.data.unknowns.len(),
            gradient: self.gradient(),
            y_intercept: self.y_intercept(),
            r_squared: self.r_squared(),
            standard_mean_abs_accuracy: mean_abs_accuracy(self.data.active_standards()),
            qc_mean_abs_accuracy: mean_abs_accuracy(self.data.quality_controls.iter()),
        }
    }
}

fn mean_abs_accuracy<'a>(points: impl Iterator<Item = &'a RegressionPoint>) -> Option<f64> {
    let values: Vec<f64> = points.filter_map(|p| p.accuracy).map(f64::abs).collect();
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

// ---------------------------------------------------------------------------
// RegressionSummary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionSummary {
    pub weighting_factor: WeightingFactor,
    pub standards: usize,
    pub active_standards: usize,
    pub quality_controls: usize,
    pub unknowns: usize,
    pub gradient: Option<f64>,
    pub y_intercept: Option<f64>,
    pub r_squared: Option<f64>,
    pub standard_mean_abs_accuracy: Option<f64>,
    pub qc_mean_abs_accuracy: Option<f64>,
}

fn opt(v: Option<f64>, precision: usize) -> String {
    v.map_or_else(|| "n/a".to_string(), |v| format!("{v:.precision$}"))
}

impl fmt::Display for RegressionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "weighting:    {}", self.weighting_factor)?;
        writeln!(
            f,
            "samples:      {} standard(s) ({} active), {} QC, {} unknown",
            self.standards, self.active_standards, self.quality_controls, self.unknowns
        )?;
        writeln!(f, "gradient:     {}", opt(self.gradient, 6))?;
        writeln!(f, "y-intercept:  {}", opt(self.y_intercept, 6))?;
        writeln!(f, "r²:           {}", opt(self.r_squared, 6))?;
        writeln!(
            f,
            "mean |acc|:   standards {}, QC {}",
            opt(self.standard_mean_abs_accuracy.map(|a| a * 100.0), 2),
            opt(self.qc_mean_abs_accuracy.map(|a| a * 100.0), 2)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn line(points: &[(f64, f64)]) -> RegressionData {
        let mut data = RegressionData::new();
        for (i, &(x, y)) in points.iter().enumerate() {
            data.push(RegressionPoint::standard(format!("S{i}"), x, y));
        }
        data
    }

    #[test]
    fn exact_line_is_recovered_for_every_weighting() {
        let data = line(&[(1.0, 5.0), (2.0, 8.0), (4.0, 14.0), (8.0, 26.0)]);
        for w in WeightingFactor::ALL {
            let fit = fit_line(data.standards.iter(), w).unwrap().unwrap();
            assert_relative_eq!(fit.gradient, 3.0, epsilon = 1e-9);
            assert_relative_eq!(fit.y_intercept, 2.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn missing_value_makes_fit_undefined() {
        let mut data = line(&[(1.0, 5.0), (2.0, 8.0)]);
        data.standards[1].instrument_response = None;
        assert_eq!(fit_line(data.standards.iter(), WeightingFactor::Unweighted), Ok(None));
    }

    #[test]
    fn single_standard_is_degenerate() {
        let data = line(&[(1.0, 5.0)]);
        let err = fit_line(data.standards.iter(), WeightingFactor::Unweighted).unwrap_err();
        assert!(matches!(err, RegressionError::DegenerateFit { active: 1, .. }));
    }

    #[test]
    fn quadratic_is_rejected() {
        let mut r = Regression::with_model(
            RegressionType::Quadratic,
            line(&[(1.0, 5.0), (2.0, 8.0)]),
            WeightingFactor::Unweighted,
        );
        assert!(matches!(
            r.update(),
            Err(RegressionError::InvalidConfiguration(_))
        ));
        assert_eq!(r.gradient(), None);
    }

    #[test]
    fn set_active_out_of_range() {
        let mut r = Regression::new(line(&[(1.0, 5.0)]), WeightingFactor::Unweighted);
        let err = r.set_active(SampleKind::QualityControl, 0, false).unwrap_err();
        assert_eq!(
            err,
            RegressionError::PointNotFound {
                kind: "qc".into(),
                index: 0
            }
        );
    }

    #[test]
    fn r_squared_of_exact_line_is_one() {
        let mut r = Regression::new(
            line(&[(1.0, 5.0), (2.0, 8.0), (3.0, 11.0)]),
            WeightingFactor::OneOverX,
        );
        r.update().unwrap();
        assert_relative_eq!(r.r_squared().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn summary_reports_percentages() {
        let mut r = Regression::new(
            line(&[(1.0, 5.0), (2.0, 8.0), (3.0, 11.0)]),
            WeightingFactor::Unweighted,
        );
        r.update().unwrap();
        let text = r.summary().to_string();
        assert!(text.contains("3 standard(s) (3 active)"), "{text}");
        assert!(text.contains("gradient:     3.000000"), "{text}");
    }
}
