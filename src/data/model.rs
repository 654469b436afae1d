use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::regression::{RegressionType, WeightingFactor};

// ---------------------------------------------------------------------------
// FieldValue – a single typed cell of a data row
// ---------------------------------------------------------------------------

/// A typed cell from the results table. Sentinel strings (`N/A`,
/// `No Peak`, ...) become `Null` or `Float(0.0)` depending on the column.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDateTime),
    Null,
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => write!(f, "{s}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(v) => write!(f, "{v:.4}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
            FieldValue::Null => write!(f, "<null>"),
        }
    }
}

impl FieldValue {
    /// Interpret the value as an `f64` where that makes sense.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }
}

// ---------------------------------------------------------------------------
// Closed vocabularies
// ---------------------------------------------------------------------------

/// The `Sample Type` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleType {
    Standard,
    QualityControl,
    Unknown,
}

impl SampleType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Standard" => Some(SampleType::Standard),
            "Quality Control" | "QC" => Some(SampleType::QualityControl),
            "Unknown" => Some(SampleType::Unknown),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            SampleType::Standard => "Standard",
            SampleType::QualityControl => "Quality Control",
            SampleType::Unknown => "Unknown",
        }
    }
}

/// The `Analyte Units` / `IS Units` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConcentrationUnit {
    PicogramPerMl,
    NanogramPerMl,
    MicrogramPerMl,
    MilligramPerMl,
    Nanomolar,
    Micromolar,
}

impl ConcentrationUnit {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "pg/mL" => Some(ConcentrationUnit::PicogramPerMl),
            "ng/mL" => Some(ConcentrationUnit::NanogramPerMl),
            "ug/mL" | "µg/mL" => Some(ConcentrationUnit::MicrogramPerMl),
            "mg/mL" => Some(ConcentrationUnit::MilligramPerMl),
            "nM" => Some(ConcentrationUnit::Nanomolar),
            "uM" | "µM" => Some(ConcentrationUnit::Micromolar),
            _ => None,
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            ConcentrationUnit::PicogramPerMl => "pg/mL",
            ConcentrationUnit::NanogramPerMl => "ng/mL",
            ConcentrationUnit::MicrogramPerMl => "ug/mL",
            ConcentrationUnit::MilligramPerMl => "mg/mL",
            ConcentrationUnit::Nanomolar => "nM",
            ConcentrationUnit::Micromolar => "uM",
        }
    }
}

// ---------------------------------------------------------------------------
// Header section
// ---------------------------------------------------------------------------

/// Precursor/product mass pair identifying an MRM peak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionMrm {
    pub q1: f64,
    pub q3: f64,
}

impl TransitionMrm {
    pub fn new(q1: f64, q3: f64) -> Self {
        Self { q1, q3 }
    }
}

impl fmt::Display for TransitionMrm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}/{:.2}", self.q1, self.q3)
    }
}

/// One analyte (or internal standard) declared in the header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakInfo {
    pub peak_name: String,
    pub is_internal_standard: bool,
    /// Internal standard this analyte is normalised against. `None` for
    /// internal standards themselves.
    pub internal_standard_name: Option<String>,
    pub transition: TransitionMrm,
}

/// Regression parameters as computed by the acquisition software.
/// Informational only; the engine refits from the samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionHeaderInfo {
    pub regression_type: RegressionType,
    pub weighting_factor: WeightingFactor,
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
    pub r_squared: f64,
}

// ---------------------------------------------------------------------------
// ExportRow – one line of the results table
// ---------------------------------------------------------------------------

/// A single sample record. The columns the calibration needs are lifted
/// into typed fields; every column (those included) is kept in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    /// 1-based line number in the source text.
    pub line: usize,
    pub sample_name: String,
    pub sample_id: String,
    pub sample_type: SampleType,
    pub file_name: String,
    pub acquisition_date: Option<NaiveDateTime>,
    pub analyte_peak_name: String,
    pub analyte_units: ConcentrationUnit,
    /// Analyte peak area; `No Peak` reads as 0.
    pub area: f64,
    pub nominal_concentration: Option<f64>,
    /// Column name → typed value for all 80 columns.
    pub fields: BTreeMap<String, FieldValue>,
}

impl ExportRow {
    pub fn field(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }
}

// ---------------------------------------------------------------------------
// ParsedExport – the complete parse result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedExport {
    pub peaks: Vec<PeakInfo>,
    pub header: RegressionHeaderInfo,
    pub rows: Vec<ExportRow>,
}

impl ParsedExport {
    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Analyte peaks (internal standards excluded).
    pub fn analytes(&self) -> impl Iterator<Item = &PeakInfo> {
        self.peaks.iter().filter(|p| !p.is_internal_standard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_type_tokens_round_trip() {
        for st in [
            SampleType::Standard,
            SampleType::QualityControl,
            SampleType::Unknown,
        ] {
            assert_eq!(SampleType::from_token(st.as_token()), Some(st));
        }
        assert_eq!(SampleType::from_token("Blank"), None);
        assert_eq!(SampleType::from_token("standard"), None);
    }

    #[test]
    fn unit_aliases() {
        assert_eq!(
            ConcentrationUnit::from_token("µg/mL"),
            Some(ConcentrationUnit::MicrogramPerMl)
        );
        assert_eq!(ConcentrationUnit::from_token("ng/ml"), None);
    }

    #[test]
    fn field_value_numeric_view() {
        assert_eq!(FieldValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(FieldValue::Text("0.5".into()).as_f64(), None);
        assert!(FieldValue::Null.is_null());
        assert_eq!(FieldValue::Null.to_string(), "<null>");
    }

    #[test]
    fn transition_display() {
        assert_eq!(TransitionMrm::new(289.2, 97.1).to_string(), "289.20/97.10");
    }
}
