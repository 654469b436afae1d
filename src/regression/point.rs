use std::fmt;

use serde::{Deserialize, Serialize};

use super::engine::LineFit;
use crate::data::model::SampleType;

/// Role of a sample in the calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleKind {
    Standard,
    QualityControl,
    Unknown,
}

impl SampleKind {
    /// Whether points of this kind carry a true nominal concentration.
    pub fn has_nominal(self) -> bool {
        !matches!(self, SampleKind::Unknown)
    }

    pub fn label(self) -> &'static str {
        match self {
            SampleKind::Standard => "standard",
            SampleKind::QualityControl => "qc",
            SampleKind::Unknown => "unknown",
        }
    }
}

impl From<SampleType> for SampleKind {
    fn from(st: SampleType) -> Self {
        match st {
            SampleType::Standard => SampleKind::Standard,
            SampleType::QualityControl => SampleKind::QualityControl,
            SampleType::Unknown => SampleKind::Unknown,
        }
    }
}

impl fmt::Display for SampleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn active_by_default() -> bool {
    true
}

// ---------------------------------------------------------------------------
// RegressionPoint
// ---------------------------------------------------------------------------

/// One sample as seen by the calibration engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionPoint {
    pub kind: SampleKind,
    pub sample_name: String,
    /// Peak area.
    pub instrument_response: Option<f64>,
    /// Always `None` for unknowns.
    pub nominal_concentration: Option<f64>,
    #[serde(default)]
    pub calculated_concentration: Option<f64>,
    /// Signed fraction, e.g. `-0.05` is 5% low.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Only active standards contribute to the fit.
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

impl RegressionPoint {
    fn new(
        kind: SampleKind,
        sample_name: impl Into<String>,
        nominal_concentration: Option<f64>,
        instrument_response: Option<f64>,
    ) -> Self {
        Self {
            kind,
            sample_name: sample_name.into(),
            instrument_response,
            nominal_concentration,
            calculated_concentration: None,
            accuracy: None,
            is_active: true,
        }
    }

    pub fn standard(name: impl Into<String>, nominal: f64, response: f64) -> Self {
        Self::new(SampleKind::Standard, name, Some(nominal), Some(response))
    }

    pub fn quality_control(name: impl Into<String>, nominal: f64, response: f64) -> Self {
        Self::new(SampleKind::QualityControl, name, Some(nominal), Some(response))
    }

    pub fn unknown(name: impl Into<String>, response: f64) -> Self {
        Self::new(SampleKind::Unknown, name, None, Some(response))
    }

    /// Build a point with optional values, as read from an export row.
    pub fn from_parts(
        kind: SampleKind,
        sample_name: impl Into<String>,
        nominal_concentration: Option<f64>,
        instrument_response: Option<f64>,
    ) -> Self {
        let nominal = nominal_concentration.filter(|_| kind.has_nominal());
        Self::new(kind, sample_name, nominal, instrument_response)
    }

    /// Refresh the back-calculated concentration and accuracy from `fit`.
    pub(crate) fn apply_fit(&mut self, fit: Option<&LineFit>) {
        self.calculated_concentration = fit
            .zip(self.instrument_response)
            .map(|(fit, y)| fit.concentration_for(y));
        self.accuracy = if self.kind.has_nominal() {
            accuracy(self.calculated_concentration, self.nominal_concentration)
        } else {
            None
        };
    }
}

/// `(calculated - nominal) / nominal`; `None` for a zero or missing nominal.
pub fn accuracy(calculated: Option<f64>, nominal: Option<f64>) -> Option<f64> {
    let nominal = nominal.filter(|n| *n != 0.0)?;
    calculated.map(|c| (c - nominal) / nominal)
}

// ---------------------------------------------------------------------------
// RegressionData
// ---------------------------------------------------------------------------

/// Classified samples of one analytical run, in source row order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegressionData {
    pub standards: Vec<RegressionPoint>,
    pub quality_controls: Vec<RegressionPoint>,
    pub unknowns: Vec<RegressionPoint>,
}

impl RegressionData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point to the list matching its kind.
    pub fn push(&mut self, point: RegressionPoint) {
        self.points_mut(point.kind).push(point);
    }

    pub fn points(&self, kind: SampleKind) -> &[RegressionPoint] {
        match kind {
            SampleKind::Standard => &self.standards,
            SampleKind::QualityControl => &self.quality_controls,
            SampleKind::Unknown => &self.unknowns,
        }
    }

    pub fn points_mut(&mut self, kind: SampleKind) -> &mut Vec<RegressionPoint> {
        match kind {
            SampleKind::Standard => &mut self.standards,
            SampleKind::QualityControl => &mut self.quality_controls,
            SampleKind::Unknown => &mut self.unknowns,
        }
    }

    /// Standards, then QCs, then unknowns.
    pub fn iter(&self) -> impl Iterator<Item = &RegressionPoint> {
        self.standards
            .iter()
            .chain(&self.quality_controls)
            .chain(&self.unknowns)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegressionPoint> {
        self.standards
            .iter_mut()
            .chain(self.quality_controls.iter_mut())
            .chain(self.unknowns.iter_mut())
    }

    pub fn active_standards(&self) -> impl Iterator<Item = &RegressionPoint> {
        self.standards.iter().filter(|p| p.is_active)
    }

    pub fn len(&self) -> usize {
        self.standards.len() + self.quality_controls.len() + self.unknowns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accuracy_is_null_for_zero_or_missing_nominal() {
        assert_eq!(accuracy(Some(1.0), Some(0.0)), None);
        assert_eq!(accuracy(Some(1.0), None), None);
        assert_eq!(accuracy(None, Some(2.0)), None);
        assert_eq!(accuracy(Some(1.5), Some(2.0)), Some(-0.25));
    }

    #[test]
    fn unknowns_drop_nominal_concentration() {
        let p = RegressionPoint::from_parts(SampleKind::Unknown, "U1", Some(3.0), Some(10.0));
        assert_eq!(p.nominal_concentration, None);
        assert!(p.is_active);
    }

    #[test]
    fn push_routes_by_kind_and_keeps_order() {
        let mut data = RegressionData::new();
        data.push(RegressionPoint::standard("S1", 0.1, 1.0));
        data.push(RegressionPoint::unknown("U1", 2.0));
        data.push(RegressionPoint::standard("S2", 0.2, 2.0));
        data.push(RegressionPoint::quality_control("Q1", 0.15, 1.5));

        let names: Vec<&str> = data.standards.iter().map(|p| p.sample_name.as_str()).collect();
        assert_eq!(names, ["S1", "S2"]);
        assert_eq!(data.quality_controls.len(), 1);
        assert_eq!(data.unknowns.len(), 1);
        assert_eq!(data.len(), 4);
    }

    #[test]
    fn missing_active_flag_defaults_to_true() {
        let p: RegressionPoint = serde_json::from_str(
            r#"{"kind":"standard","sample_name":"S1","instrument_response":1.0,"nominal_concentration":0.1}"#,
        )
        .unwrap();
        assert!(p.is_active);
        assert_eq!(p.calculated_concentration, None);
    }
}
