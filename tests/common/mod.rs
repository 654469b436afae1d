//! Builds export text in the fixed results-table layout.

#![allow(dead_code)]

use rusty_quant::data::schema::{self, FieldRule, COLUMNS};

/// Standards of the reference calibration: (nominal, response).
pub const STANDARDS: [(f64, f64); 6] = [
    (0.0, 0.0),
    (0.1, 12.36),
    (0.2, 24.83),
    (0.3, 35.91),
    (0.4, 48.79),
    (0.5, 60.42),
];

fn default_cell(rule: FieldRule) -> &'static str {
    match rule {
        FieldRule::Text => "",
        FieldRule::Integer => "1",
        FieldRule::Date => "3/14/2024 9:41:07 AM",
        FieldRule::Float => "1.00",
        FieldRule::FloatOrZero | FieldRule::FloatOrNull => "N/A",
        FieldRule::Flag => "1",
        FieldRule::SampleType => "Unknown",
        FieldRule::Units => "ng/mL",
        FieldRule::RegressionType => "Linear",
        FieldRule::Weighting => "None",
    }
}

#[derive(Debug, Clone)]
pub struct ExportBuilder {
    peak_blocks: Vec<[String; 3]>,
    fit_line: String,
    coefficients: [String; 4],
    blank_gap: usize,
    header: Vec<String>,
    rows: Vec<String>,
    line_ending: &'static str,
}

impl Default for ExportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportBuilder {
    pub fn new() -> Self {
        Self {
            peak_blocks: vec![
                [
                    "Peak Name: Testosterone".to_string(),
                    "Internal Standard: Testosterone-d3".to_string(),
                    "Q1/Q3 Masses: 289.20/97.10 Da".to_string(),
                ],
                [
                    "Peak Name: Testosterone-d3".to_string(),
                    "Use as Internal Standard".to_string(),
                    "Q1/Q3 Masses: 292.20/97.10 Da".to_string(),
                ],
            ],
            fit_line: "Fit\tLinear\tWeighting\tNone\tIterate\tNo".to_string(),
            coefficients: [
                "a\t120.706".to_string(),
                "b\t0.209".to_string(),
                "c\tN/A".to_string(),
                "r\t0.9994".to_string(),
            ],
            blank_gap: 3,
            header: schema::column_names().map(str::to_string).collect(),
            rows: Vec::new(),
            line_ending: "\n",
        }
    }

    /// The reference standards, one QC and one unknown.
    pub fn reference() -> Self {
        let mut builder = Self::new();
        for (i, (x, y)) in STANDARDS.into_iter().enumerate() {
            builder = builder.standard(&format!("Cal {}", i + 1), x, y);
        }
        builder
            .quality_control("QC Mid", 0.35, 40.0)
            .unknown("Subject 01", 20.0)
    }

    pub fn fit_line(mut self, line: &str) -> Self {
        self.fit_line = line.to_string();
        self
    }

    pub fn weighting(self, label: &str) -> Self {
        let line = format!("Fit\tLinear\tWeighting\t{label}\tIterate\tNo");
        self.fit_line(&line)
    }

    pub fn no_peaks(mut self) -> Self {
        self.peak_blocks.clear();
        self
    }

    pub fn blank_gap(mut self, n: usize) -> Self {
        self.blank_gap = n;
        self
    }

    pub fn header(mut self, header: Vec<String>) -> Self {
        self.header = header;
        self
    }

    pub fn crlf(mut self) -> Self {
        self.line_ending = "\r\n";
        self
    }

    /// A data row from defaults with `overrides` applied by column name.
    pub fn row(mut self, overrides: &[(&str, &str)]) -> Self {
        let cells: Vec<String> = COLUMNS
            .iter()
            .map(|&(name, rule)| {
                overrides
                    .iter()
                    .find(|(col, _)| *col == name)
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| default_cell(rule).to_string())
            })
            .collect();
        self.rows.push(cells.join("\t"));
        self
    }

    /// Append a line verbatim to the data section.
    pub fn raw_row(mut self, line: &str) -> Self {
        self.rows.push(line.to_string());
        self
    }

    pub fn standard(self, name: &str, nominal: f64, area: f64) -> Self {
        self.sample(name, "Standard", &nominal.to_string(), area)
    }

    pub fn quality_control(self, name: &str, nominal: f64, area: f64) -> Self {
        self.sample(name, "Quality Control", &nominal.to_string(), area)
    }

    pub fn unknown(self, name: &str, area: f64) -> Self {
        self.sample(name, "Unknown", "N/A", area)
    }

    fn sample(self, name: &str, sample_type: &str, nominal: &str, area: f64) -> Self {
        let area = area.to_string();
        self.row(&[
            (schema::SAMPLE_NAME, name),
            (schema::SAMPLE_TYPE, sample_type),
            (schema::ANALYTE_PEAK_NAME, "Testosterone"),
            (schema::ANALYTE_CONCENTRATION, nominal),
            (schema::ANALYTE_PEAK_AREA, &area),
        ])
    }

    pub fn build(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for block in &self.peak_blocks {
            lines.extend(block.iter().cloned());
            lines.push(String::new());
        }
        lines.push(self.fit_line.clone());
        lines.extend(self.coefficients.iter().cloned());
        lines.extend(std::iter::repeat(String::new()).take(self.blank_gap));
        lines.push(self.header.join("\t"));
        lines.extend(self.rows.iter().cloned());

        let mut text = lines.join(self.line_ending);
        text.push_str(self.line_ending);
        text
    }
}
