//! Line-oriented state machine over the results-table export.
//!
//! ```text
//!  Header ──(block starting with 'F')──▶ DataRows
//!    │                                     │
//!    └─ 3-line peak blocks                 ├─ exactly 3 blank lines
//!                                          ├─ 80-column header row
//!                                          └─ one data row per line
//! ```
//!
//! Parsing is all-or-nothing: the first malformed line aborts with an
//! [`ExportError`] and no rows are returned.

use std::collections::BTreeMap;

use log::{debug, info};

use super::model::{
    ConcentrationUnit, ExportRow, FieldValue, ParsedExport, PeakInfo, RegressionHeaderInfo,
    SampleType, TransitionMrm,
};
use super::schema::{self, ColumnIndex, COLUMNS, COLUMN_COUNT};
use crate::error::ExportError;
use crate::regression::{RegressionType, WeightingFactor};

/// Second line of a peak block for peaks that are themselves internal standards.
pub const INTERNAL_STANDARD_PHRASE: &str = "Use as Internal Standard";

/// First character of the regression-info block.
pub const REGRESSION_BLOCK_MARKER: char = 'F';

const PEAK_BLOCK_LINES: usize = 3;
const REGRESSION_BLOCK_LINES: usize = 5;
const BLANKS_BEFORE_COLUMNS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    DataRows,
}

/// Parse the complete text of one export.
pub fn parse(raw: &str) -> Result<ParsedExport, ExportError> {
    let mut parser = ExportParser::new();
    let mut last_line = 0;
    for (i, line) in raw.lines().enumerate() {
        last_line = i + 1;
        parser.feed(last_line, line.trim_end_matches('\r'))?;
    }
    let parsed = parser.finish(last_line)?;
    info!(
        "Parsed export: {} peak(s), {} row(s), declared {:?} / {}",
        parsed.peaks.len(),
        parsed.rows.len(),
        parsed.header.regression_type,
        parsed.header.weighting_factor
    );
    Ok(parsed)
}

struct ExportParser<'a> {
    section: Section,
    /// Lines of the header block being accumulated, with line numbers.
    block: Vec<(usize, &'a str)>,
    peaks: Vec<PeakInfo>,
    header: Option<RegressionHeaderInfo>,
    /// Consecutive blank lines seen since the regression block closed.
    blank_run: usize,
    columns: Option<ColumnIndex>,
    rows: Vec<ExportRow>,
}

impl<'a> ExportParser<'a> {
    fn new() -> Self {
        Self {
            section: Section::Header,
            block: Vec::new(),
            peaks: Vec::new(),
            header: None,
            blank_run: 0,
            columns: None,
            rows: Vec::new(),
        }
    }

    fn feed(&mut self, line_no: usize, line: &'a str) -> Result<(), ExportError> {
        let blank = line.trim().is_empty();
        match self.section {
            Section::Header => {
                if !blank {
                    self.block.push((line_no, line));
                } else if !self.block.is_empty() {
                    self.close_block()?;
                    if self.section == Section::DataRows {
                        // The separator that closed the regression block
                        // counts towards the data-section gap.
                        self.blank_run = 1;
                    }
                }
            }
            Section::DataRows => match &self.columns {
                None if blank => self.blank_run += 1,
                None => {
                    if self.blank_run != BLANKS_BEFORE_COLUMNS {
                        return Err(ExportError::format(
                            line_no,
                            format!(
                                "expected {BLANKS_BEFORE_COLUMNS} blank lines before the column header, found {}",
                                self.blank_run
                            ),
                        ));
                    }
                    let header: Vec<&str> = line.split('\t').collect();
                    self.columns = Some(ColumnIndex::from_header(&header, line_no)?);
                    debug!("Column header validated on line {line_no}");
                }
                // A tab-only line is a row of empty cells, not a separator.
                Some(_) if line.is_empty() => {}
                Some(columns) => {
                    let row = parse_row(columns, line_no, line)?;
                    self.rows.push(row);
                }
            },
        }
        Ok(())
    }

    fn close_block(&mut self) -> Result<(), ExportError> {
        let block = std::mem::take(&mut self.block);
        let starts_regression = block
            .first()
            .is_some_and(|(_, l)| l.starts_with(REGRESSION_BLOCK_MARKER));

        if starts_regression {
            let header = parse_regression_block(&block)?;
            debug!(
                "Regression block: {:?}, weighting {}",
                header.regression_type, header.weighting_factor
            );
            self.header = Some(header);
            self.section = Section::DataRows;
        } else {
            let peak = parse_peak_block(&block)?;
            debug!("Peak block: {} ({})", peak.peak_name, peak.transition);
            self.peaks.push(peak);
        }
        Ok(())
    }

    fn finish(mut self, last_line: usize) -> Result<ParsedExport, ExportError> {
        if self.section == Section::Header && !self.block.is_empty() {
            self.close_block()?;
        }
        let Some(header) = self.header else {
            return Err(ExportError::format(
                last_line,
                "end of input before the regression block",
            ));
        };
        if self.columns.is_none() {
            return Err(ExportError::format(
                last_line,
                "end of input before the column header row",
            ));
        }
        Ok(ParsedExport {
            peaks: self.peaks,
            header,
            rows: self.rows,
        })
    }
}

// ---------------------------------------------------------------------------
// Header blocks
// ---------------------------------------------------------------------------

fn check_block_len(block: &[(usize, &str)], expected: usize, what: &str) -> Result<(), ExportError> {
    if block.len() != expected {
        let line = block.first().map(|(n, _)| *n).unwrap_or(0);
        return Err(ExportError::format(
            line,
            format!("{what} block has {} line(s), expected {expected}", block.len()),
        ));
    }
    Ok(())
}

/// Everything after the first two space-separated tokens.
fn third_token_onward(line: &str) -> Option<&str> {
    line.trim()
        .splitn(3, ' ')
        .nth(2)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_peak_block(block: &[(usize, &str)]) -> Result<PeakInfo, ExportError> {
    check_block_len(block, PEAK_BLOCK_LINES, "peak")?;
    let (name_no, name_line) = block[0];
    let (is_no, is_line) = block[1];
    let (mrm_no, mrm_line) = block[2];

    let peak_name = third_token_onward(name_line)
        .ok_or_else(|| ExportError::format(name_no, "peak block is missing a peak name"))?
        .to_string();

    let (is_internal_standard, internal_standard_name) =
        if is_line.trim() == INTERNAL_STANDARD_PHRASE {
            (true, None)
        } else {
            let name = third_token_onward(is_line).ok_or_else(|| {
                ExportError::format(is_no, "peak block is missing an internal standard name")
            })?;
            let name = (!schema::is_sentinel(name)).then(|| name.to_string());
            (false, name)
        };

    let masses = mrm_line.split_whitespace().nth(2).ok_or_else(|| {
        ExportError::format(mrm_no, "peak block is missing a Q1/Q3 transition")
    })?;
    let (q1, q3) = masses.split_once('/').ok_or_else(|| ExportError::Cast {
        line: mrm_no,
        column: "Q1/Q3 Masses".to_string(),
        value: masses.to_string(),
        expected: "Q1/Q3 pair",
    })?;
    let transition = TransitionMrm::new(
        schema::parse_float(q1, mrm_no, "Q1")?,
        schema::parse_float(q3, mrm_no, "Q3")?,
    );

    Ok(PeakInfo {
        peak_name,
        is_internal_standard,
        internal_standard_name,
        transition,
    })
}

fn parse_regression_block(block: &[(usize, &str)]) -> Result<RegressionHeaderInfo, ExportError> {
    check_block_len(block, REGRESSION_BLOCK_LINES, "regression")?;

    let (fit_no, fit_line) = block[0];
    let tokens: Vec<&str> = fit_line.split('\t').map(str::trim).collect();
    if tokens.len() < 4 {
        return Err(ExportError::format(
            fit_no,
            format!("regression line has {} field(s), expected at least 4", tokens.len()),
        ));
    }
    let regression_type = RegressionType::from_token(tokens[1]).ok_or_else(|| {
        ExportError::format(fit_no, format!("unrecognised regression type '{}'", tokens[1]))
    })?;
    let weighting_factor = WeightingFactor::from_label(tokens[3]).ok_or_else(|| {
        ExportError::format(fit_no, format!("unrecognised weighting factor '{}'", tokens[3]))
    })?;

    let mut coefficients = [None; 4];
    for (slot, (line_no, line)) in coefficients.iter_mut().zip(&block[1..]) {
        let mut fields = line.split('\t').map(str::trim);
        let label = fields.next().unwrap_or_default();
        let value = fields.next().ok_or_else(|| {
            ExportError::format(*line_no, format!("coefficient '{label}' has no value"))
        })?;
        *slot = schema::parse_nullable_float(value, *line_no, label)?;
    }
    let [a, b, c, r_squared] = coefficients;

    Ok(RegressionHeaderInfo {
        regression_type,
        weighting_factor,
        a,
        b,
        c,
        r_squared: r_squared.unwrap_or(0.0),
    })
}

// ---------------------------------------------------------------------------
// Data rows
// ---------------------------------------------------------------------------

fn parse_row(columns: &ColumnIndex, line_no: usize, line: &str) -> Result<ExportRow, ExportError> {
    let cells: Vec<&str> = line.split('\t').collect();
    if cells.len() != COLUMN_COUNT {
        return Err(ExportError::format(
            line_no,
            format!("data row has {} fields, expected {COLUMN_COUNT}", cells.len()),
        ));
    }

    let mut fields = BTreeMap::new();
    for (name, rule) in COLUMNS {
        let raw = columns
            .cell(&cells, name)
            .ok_or_else(|| ExportError::format(line_no, format!("missing column '{name}'")))?;
        fields.insert(name.to_string(), schema::parse_cell(rule, raw, line_no, name)?);
    }

    let text = |name: &str| match fields.get(name) {
        Some(FieldValue::Text(s)) => s.clone(),
        _ => String::new(),
    };
    let number = |name: &str| fields.get(name).and_then(FieldValue::as_f64);

    let sample_type_token = text(schema::SAMPLE_TYPE);
    let sample_type = SampleType::from_token(&sample_type_token).ok_or_else(|| {
        ExportError::format(line_no, format!("unrecognised Sample Type '{sample_type_token}'"))
    })?;
    let units_token = text(schema::ANALYTE_UNITS);
    let analyte_units = ConcentrationUnit::from_token(&units_token).ok_or_else(|| {
        ExportError::format(line_no, format!("unrecognised Analyte Units '{units_token}'"))
    })?;
    let acquisition_date = match fields.get(schema::ACQUISITION_DATE) {
        Some(FieldValue::Date(d)) => Some(*d),
        _ => None,
    };

    Ok(ExportRow {
        line: line_no,
        sample_name: text(schema::SAMPLE_NAME),
        sample_id: text(schema::SAMPLE_ID),
        sample_type,
        file_name: text(schema::FILE_NAME),
        acquisition_date,
        analyte_peak_name: text(schema::ANALYTE_PEAK_NAME),
        analyte_units,
        area: number(schema::ANALYTE_PEAK_AREA).unwrap_or(0.0),
        nominal_concentration: number(schema::ANALYTE_CONCENTRATION),
        fields,
    })
}
