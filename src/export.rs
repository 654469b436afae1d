//! Results table output: one row per sample with its back-calculated
//! concentration and accuracy.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::regression::{RegressionData, RegressionPoint};

/// One line of the results table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord<'a> {
    pub sample_name: &'a str,
    pub kind: &'static str,
    pub active: bool,
    pub nominal_concentration: Option<f64>,
    pub instrument_response: Option<f64>,
    pub calculated_concentration: Option<f64>,
    pub accuracy: Option<f64>,
}

impl<'a> From<&'a RegressionPoint> for ResultRecord<'a> {
    fn from(p: &'a RegressionPoint) -> Self {
        Self {
            sample_name: &p.sample_name,
            kind: p.kind.label(),
            active: p.is_active,
            nominal_concentration: p.nominal_concentration,
            instrument_response: p.instrument_response,
            calculated_concentration: p.calculated_concentration,
            accuracy: p.accuracy,
        }
    }
}

pub fn records(data: &RegressionData) -> Vec<ResultRecord<'_>> {
    data.iter().map(ResultRecord::from).collect()
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Write the results table. Dispatch by extension.
///
/// * `.csv`            – comma-separated with a header row
/// * `.parquet` / `.pq` – one record batch
pub fn write_results(path: &Path, data: &RegressionData) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => {
            let file = File::create(path).context("creating CSV file")?;
            write_csv(file, data)
        }
        "parquet" | "pq" => write_parquet(path, data),
        other => bail!("Unsupported results extension: .{other}"),
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

pub fn write_csv<W: Write>(out: W, data: &RegressionData) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records(data) {
        writer.serialize(record).context("writing CSV record")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

fn results_schema() -> Schema {
    Schema::new(vec![
        Field::new("sample_name", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("active", DataType::Boolean, false),
        Field::new("nominal_concentration", DataType::Float64, true),
        Field::new("instrument_response", DataType::Float64, true),
        Field::new("calculated_concentration", DataType::Float64, true),
        Field::new("accuracy", DataType::Float64, true),
    ])
}

pub fn results_batch(data: &RegressionData) -> Result<RecordBatch> {
    let rows = records(data);
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(
            rows.iter().map(|r| r.sample_name).collect::<Vec<_>>(),
        )),
        Arc::new(StringArray::from(rows.iter().map(|r| r.kind).collect::<Vec<_>>())),
        Arc::new(BooleanArray::from(rows.iter().map(|r| r.active).collect::<Vec<_>>())),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.nominal_concentration).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.instrument_response).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.calculated_concentration).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.accuracy).collect::<Vec<_>>(),
        )),
    ];
    RecordBatch::try_new(Arc::new(results_schema()), columns).context("building results batch")
}

fn write_parquet(path: &Path, data: &RegressionData) -> Result<()> {
    let batch = results_batch(data)?;
    let file = File::create(path).context("creating parquet file")?;
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn csv_has_header_and_empty_nulls() {
        let mut data = RegressionData::new();
        data.push(RegressionPoint::standard("Cal 1", 0.1, 12.5));
        data.push(RegressionPoint::unknown("U1", 20.0));

        let mut out = Vec::new();
        write_csv(&mut out, &data).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines,
            [
                "sample_name,kind,active,nominal_concentration,instrument_response,calculated_concentration,accuracy",
                "Cal 1,standard,true,0.1,12.5,,",
                "U1,unknown,true,,20.0,,",
            ]
        );
    }

    #[test]
    fn batch_matches_point_count() {
        let mut data = RegressionData::new();
        data.push(RegressionPoint::standard("Cal 1", 0.1, 12.5));
        data.push(RegressionPoint::quality_control("QC", 0.2, 25.0));
        let batch = results_batch(&data).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.num_columns(), 7);
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = write_results(Path::new("out.xlsx"), &RegressionData::new()).unwrap_err();
        assert!(err.to_string().contains(".xlsx"));
    }
}
