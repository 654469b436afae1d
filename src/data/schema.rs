//! The fixed column layout of the results-table export and the rule used
//! to read each column.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use super::model::{ConcentrationUnit, FieldValue, SampleType};
use crate::error::ExportError;
use crate::regression::{RegressionType, WeightingFactor};

// ---------------------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------------------

/// How the text of one cell is turned into a [`FieldValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    Text,
    /// Whole number; sentinels read as null.
    Integer,
    /// Acquisition timestamp; sentinels read as null.
    Date,
    /// Strict float, sentinels rejected.
    Float,
    FloatOrZero,
    FloatOrNull,
    /// `0`/`1`/`True`/`False`.
    Flag,
    SampleType,
    Units,
    RegressionType,
    Weighting,
}

/// Strings the acquisition software writes in place of a number.
pub const SENTINELS: [&str; 5] = ["N/A", "#DIV/0!", "No Peak", "none", ""];

pub fn is_sentinel(raw: &str) -> bool {
    SENTINELS.contains(&raw)
}

const DATE_FORMATS: [&str; 3] = [
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

// Columns the rest of the crate reads by name.
pub const SAMPLE_NAME: &str = "Sample Name";
pub const SAMPLE_ID: &str = "Sample ID";
pub const SAMPLE_TYPE: &str = "Sample Type";
pub const ACQUISITION_DATE: &str = "Acquisition Date";
pub const FILE_NAME: &str = "File Name";
pub const ANALYTE_PEAK_NAME: &str = "Analyte Peak Name";
pub const ANALYTE_UNITS: &str = "Analyte Units";
pub const ANALYTE_PEAK_AREA: &str = "Analyte Peak Area (counts)";
pub const ANALYTE_CONCENTRATION: &str = "Analyte Concentration (ng/mL)";

/// Number of columns in every header and data row.
pub const COLUMN_COUNT: usize = 80;

/// The expected header row, in order.
pub const COLUMNS: [(&str, FieldRule); COLUMN_COUNT] = [
    (SAMPLE_NAME, FieldRule::Text),
    (SAMPLE_ID, FieldRule::Text),
    (SAMPLE_TYPE, FieldRule::SampleType),
    ("Sample Comment", FieldRule::Text),
    ("Set Number", FieldRule::Integer),
    ("Acquisition Method", FieldRule::Text),
    (ACQUISITION_DATE, FieldRule::Date),
    ("Rack Type", FieldRule::Text),
    ("Rack Position", FieldRule::Integer),
    ("Vial Position", FieldRule::Integer),
    ("Plate Type", FieldRule::Text),
    ("Plate Position", FieldRule::Integer),
    (FILE_NAME, FieldRule::Text),
    ("Dilution Factor", FieldRule::Float),
    ("Weight To Volume Ratio", FieldRule::FloatOrZero),
    ("Sample Annotation", FieldRule::Text),
    ("Disposition", FieldRule::Text),
    (ANALYTE_PEAK_NAME, FieldRule::Text),
    (ANALYTE_UNITS, FieldRule::Units),
    (ANALYTE_PEAK_AREA, FieldRule::FloatOrZero),
    ("Analyte Peak Area for DAD (mAU x min)", FieldRule::FloatOrNull),
    ("Analyte Peak Height (cps)", FieldRule::FloatOrZero),
    ("Analyte Peak Height for DAD (mAU)", FieldRule::FloatOrNull),
    (ANALYTE_CONCENTRATION, FieldRule::FloatOrNull),
    ("Analyte Retention Time (min)", FieldRule::FloatOrNull),
    ("Analyte Expected RT (min)", FieldRule::FloatOrNull),
    ("Analyte RT Window (sec)", FieldRule::FloatOrNull),
    ("Analyte Centroid Location (min)", FieldRule::FloatOrNull),
    ("Analyte Start Scan", FieldRule::Integer),
    ("Analyte Start Time (min)", FieldRule::FloatOrNull),
    ("Analyte Stop Scan", FieldRule::Integer),
    ("Analyte Stop Time (min)", FieldRule::FloatOrNull),
    ("Analyte Integration Type", FieldRule::Text),
    ("Analyte Signal To Noise", FieldRule::FloatOrNull),
    ("Analyte Peak Width (min)", FieldRule::FloatOrNull),
    ("Standard Query Status", FieldRule::Text),
    ("Analyte Mass Ranges (Da)", FieldRule::Text),
    ("Analyte Wavelength Ranges (nm)", FieldRule::Text),
    ("Analyte Channel", FieldRule::Text),
    ("Analyte Peak Width at 50% Height (min)", FieldRule::FloatOrNull),
    ("Analyte Slope of Baseline (%/min)", FieldRule::FloatOrNull),
    ("Analyte Processing Alg.", FieldRule::Text),
    ("Analyte Peak Asymmetry", FieldRule::FloatOrNull),
    ("Analyte Integration Quality", FieldRule::FloatOrNull),
    ("IS Peak Name", FieldRule::Text),
    ("IS Units", FieldRule::Units),
    ("IS Peak Area (counts)", FieldRule::FloatOrZero),
    ("IS Peak Area for DAD (mAU x min)", FieldRule::FloatOrNull),
    ("IS Peak Height (cps)", FieldRule::FloatOrZero),
    ("IS Peak Height for DAD (mAU)", FieldRule::FloatOrNull),
    ("IS Concentration (ng/mL)", FieldRule::FloatOrNull),
    ("IS Retention Time (min)", FieldRule::FloatOrNull),
    ("IS Expected RT (min)", FieldRule::FloatOrNull),
    ("IS RT Window (sec)", FieldRule::FloatOrNull),
    ("IS Centroid Location (min)", FieldRule::FloatOrNull),
    ("IS Start Scan", FieldRule::Integer),
    ("IS Start Time (min)", FieldRule::FloatOrNull),
    ("IS Stop Scan", FieldRule::Integer),
    ("IS Stop Time (min)", FieldRule::FloatOrNull),
    ("IS Integration Type", FieldRule::Text),
    ("IS Signal To Noise", FieldRule::FloatOrNull),
    ("IS Peak Width (min)", FieldRule::FloatOrNull),
    ("IS Mass Ranges (Da)", FieldRule::Text),
    ("IS Wavelength Ranges (nm)", FieldRule::Text),
    ("IS Channel", FieldRule::Text),
    ("IS Peak Width at 50% Height (min)", FieldRule::FloatOrNull),
    ("IS Slope of Baseline (%/min)", FieldRule::FloatOrNull),
    ("IS Processing Alg.", FieldRule::Text),
    ("IS Peak Asymmetry", FieldRule::FloatOrNull),
    ("IS Integration Quality", FieldRule::FloatOrNull),
    ("Use Record", FieldRule::Flag),
    ("Record Modified", FieldRule::Flag),
    ("Calculated Concentration (ng/mL)", FieldRule::FloatOrNull),
    ("Relative Retention Time", FieldRule::FloatOrNull),
    ("Accuracy (%)", FieldRule::FloatOrNull),
    ("Response Factor", FieldRule::FloatOrNull),
    ("Area Ratio", FieldRule::FloatOrNull),
    ("Height Ratio", FieldRule::FloatOrNull),
    ("Regression Type", FieldRule::RegressionType),
    ("Weighting Factor", FieldRule::Weighting),
];

/// Ordered column names of the expected header row.
pub fn column_names() -> impl Iterator<Item = &'static str> {
    COLUMNS.iter().map(|(name, _)| *name)
}

// ---------------------------------------------------------------------------
// ColumnIndex – name → position, built from a validated header row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ColumnIndex {
    positions: HashMap<&'static str, usize>,
}

impl ColumnIndex {
    /// Validate a header row against [`COLUMNS`] and index it.
    ///
    /// The header must match the expected list exactly: same length, same
    /// names, same order.
    pub fn from_header(header: &[&str], line: usize) -> Result<Self, ExportError> {
        if header.len() != COLUMN_COUNT {
            return Err(ExportError::format(
                line,
                format!(
                    "column header has {} columns, expected {COLUMN_COUNT}",
                    header.len()
                ),
            ));
        }

        let mut positions = HashMap::with_capacity(COLUMN_COUNT);
        for (i, (found, expected)) in header.iter().zip(column_names()).enumerate() {
            if found.trim() != expected {
                return Err(ExportError::format(
                    line,
                    format!(
                        "column {} of header is '{}', expected '{expected}'",
                        i + 1,
                        found.trim()
                    ),
                ));
            }
            positions.insert(expected, i);
        }
        Ok(Self { positions })
    }

    /// Raw text of `column` in a split data row.
    pub fn cell<'a>(&self, fields: &[&'a str], column: &str) -> Option<&'a str> {
        self.positions
            .get(column)
            .and_then(|&i| fields.get(i))
            .copied()
    }
}

// ---------------------------------------------------------------------------
// Cell parsing
// ---------------------------------------------------------------------------

fn cast_error(line: usize, column: &str, raw: &str, expected: &'static str) -> ExportError {
    ExportError::Cast {
        line,
        column: column.to_string(),
        value: raw.to_string(),
        expected,
    }
}

fn unknown_token(line: usize, column: &str, raw: &str) -> ExportError {
    ExportError::format(line, format!("unrecognised {column} '{raw}'"))
}

pub(crate) fn parse_float(raw: &str, line: usize, column: &str) -> Result<f64, ExportError> {
    raw.parse::<f64>()
        .map_err(|_| cast_error(line, column, raw, "number"))
}

/// Float where a sentinel reads as `None`.
pub(crate) fn parse_nullable_float(
    raw: &str,
    line: usize,
    column: &str,
) -> Result<Option<f64>, ExportError> {
    if is_sentinel(raw) {
        return Ok(None);
    }
    parse_float(raw, line, column).map(Some)
}

fn parse_date(raw: &str, line: usize, column: &str) -> Result<NaiveDateTime, ExportError> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| cast_error(line, column, raw, "date"))
}

/// Parse one cell by its column rule.
pub fn parse_cell(
    rule: FieldRule,
    raw: &str,
    line: usize,
    column: &str,
) -> Result<FieldValue, ExportError> {
    let raw = raw.trim();
    let value = match rule {
        FieldRule::Text => FieldValue::Text(raw.to_string()),
        FieldRule::Integer if is_sentinel(raw) => FieldValue::Null,
        FieldRule::Integer => FieldValue::Integer(
            raw.parse::<i64>()
                .map_err(|_| cast_error(line, column, raw, "integer"))?,
        ),
        FieldRule::Date if is_sentinel(raw) => FieldValue::Null,
        FieldRule::Date => FieldValue::Date(parse_date(raw, line, column)?),
        FieldRule::Float => FieldValue::Float(parse_float(raw, line, column)?),
        FieldRule::FloatOrZero => {
            FieldValue::Float(parse_nullable_float(raw, line, column)?.unwrap_or(0.0))
        }
        FieldRule::FloatOrNull => match parse_nullable_float(raw, line, column)? {
            Some(v) => FieldValue::Float(v),
            None => FieldValue::Null,
        },
        FieldRule::Flag => match raw {
            "1" | "True" | "true" => FieldValue::Bool(true),
            "0" | "False" | "false" => FieldValue::Bool(false),
            _ => return Err(unknown_token(line, column, raw)),
        },
        FieldRule::SampleType => {
            SampleType::from_token(raw).ok_or_else(|| unknown_token(line, column, raw))?;
            FieldValue::Text(raw.to_string())
        }
        FieldRule::Units => {
            ConcentrationUnit::from_token(raw).ok_or_else(|| unknown_token(line, column, raw))?;
            FieldValue::Text(raw.to_string())
        }
        FieldRule::RegressionType => {
            RegressionType::from_token(raw).ok_or_else(|| unknown_token(line, column, raw))?;
            FieldValue::Text(raw.to_string())
        }
        FieldRule::Weighting => {
            WeightingFactor::from_label(raw).ok_or_else(|| unknown_token(line, column, raw))?;
            FieldValue::Text(raw.to_string())
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_has_eighty_unique_columns() {
        let mut names: Vec<&str> = column_names().collect();
        assert_eq!(names.len(), COLUMN_COUNT);
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), COLUMN_COUNT);
    }

    #[test]
    fn sentinels_follow_the_column_rule() {
        assert_eq!(
            parse_cell(FieldRule::FloatOrZero, "No Peak", 1, "a").unwrap(),
            FieldValue::Float(0.0)
        );
        assert_eq!(
            parse_cell(FieldRule::FloatOrNull, "#DIV/0!", 1, "a").unwrap(),
            FieldValue::Null
        );
        assert_eq!(
            parse_cell(FieldRule::FloatOrNull, "none", 1, "a").unwrap(),
            FieldValue::Null
        );
        assert_eq!(
            parse_cell(FieldRule::Integer, "N/A", 1, "a").unwrap(),
            FieldValue::Null
        );
        assert!(matches!(
            parse_cell(FieldRule::Float, "N/A", 7, "Dilution Factor"),
            Err(ExportError::Cast { line: 7, .. })
        ));
    }

    #[test]
    fn dates_accept_both_clock_styles() {
        let am_pm = parse_cell(FieldRule::Date, "3/14/2024 1:05:09 PM", 1, "d").unwrap();
        let iso = parse_cell(FieldRule::Date, "2024-03-14 13:05:09", 1, "d").unwrap();
        assert_eq!(am_pm, iso);
        assert!(parse_cell(FieldRule::Date, "yesterday", 1, "d").is_err());
    }

    #[test]
    fn closed_vocabulary_cites_the_column() {
        let err = parse_cell(FieldRule::SampleType, "Blank", 12, SAMPLE_TYPE).unwrap_err();
        match err {
            ExportError::Format { line, message } => {
                assert_eq!(line, 12);
                assert!(message.contains(SAMPLE_TYPE), "{message}");
            }
            other => panic!("expected format error, got {other:?}"),
        }
        assert!(parse_cell(FieldRule::Units, "ng/mL", 1, ANALYTE_UNITS).is_ok());
        assert!(parse_cell(FieldRule::Flag, "maybe", 1, "Use Record").is_err());
    }

    #[test]
    fn column_index_rejects_reordered_header() {
        let mut header: Vec<&str> = column_names().collect();
        assert!(ColumnIndex::from_header(&header, 1).is_ok());
        header.swap(0, 1);
        assert!(ColumnIndex::from_header(&header, 1).is_err());
        header.swap(0, 1);
        header.pop();
        assert!(ColumnIndex::from_header(&header, 1).is_err());
    }

    #[test]
    fn column_index_looks_up_by_name() {
        let header: Vec<&str> = column_names().collect();
        let index = ColumnIndex::from_header(&header, 1).unwrap();
        let row: Vec<&str> = column_names().collect();
        assert_eq!(index.cell(&row, ANALYTE_PEAK_AREA), Some(ANALYTE_PEAK_AREA));
        assert_eq!(index.cell(&row, "Not A Column"), None);
    }
}
