use log::debug;

use super::model::ExportRow;
use crate::regression::{RegressionData, RegressionPoint, SampleKind};

/// Partition rows into standards, QCs and unknowns, keeping source order.
///
/// Only the sample name, nominal concentration and peak area are carried
/// over; unknowns get no nominal concentration.
pub fn classify(rows: &[ExportRow]) -> RegressionData {
    classify_where(rows, |_| true)
}

/// Like [`classify`], restricted to the rows of one analyte peak.
pub fn classify_analyte(rows: &[ExportRow], analyte: &str) -> RegressionData {
    classify_where(rows, |row| row.analyte_peak_name == analyte)
}

fn classify_where(rows: &[ExportRow], keep: impl Fn(&ExportRow) -> bool) -> RegressionData {
    let mut data = RegressionData::new();
    for row in rows.iter().filter(|row| keep(row)) {
        let kind = SampleKind::from(row.sample_type);
        data.push(RegressionPoint::from_parts(
            kind,
            row.sample_name.clone(),
            row.nominal_concentration,
            Some(row.area),
        ));
    }
    debug!(
        "Classified {} standard(s), {} QC, {} unknown",
        data.standards.len(),
        data.quality_controls.len(),
        data.unknowns.len()
    );
    data
}
