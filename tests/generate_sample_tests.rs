//! The bundled sample generator produces an export the engine can fit.

use std::process::Command;

use approx::assert_relative_eq;
use tempfile::TempDir;

use rusty_quant::data::classify::classify;
use rusty_quant::data::loader::load_export_file;
use rusty_quant::regression::{Regression, WeightingFactor};

#[test]
fn generated_export_parses_and_fits_with_its_declared_weighting() {
    let dir = TempDir::new().unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_generate_sample"))
        .current_dir(dir.path())
        .status()
        .unwrap();
    assert!(status.success());

    let parsed = load_export_file(&dir.path().join("sample_export.txt")).unwrap();
    assert_eq!(parsed.header.weighting_factor, WeightingFactor::OneOverX);
    assert_eq!(parsed.peaks.len(), 2);

    let data = classify(&parsed.rows);
    assert_eq!(data.standards.len(), 6);
    assert_eq!(data.quality_controls.len(), 3);
    assert_eq!(data.unknowns.len(), 5);
    assert!(data
        .standards
        .iter()
        .all(|p| p.nominal_concentration.is_some_and(|x| x > 0.0)));

    let mut regression = Regression::new(data, parsed.header.weighting_factor);
    regression.update().unwrap();

    assert_relative_eq!(regression.gradient().unwrap(), 120.7, epsilon = 2.0);
    assert!(regression.r_squared().unwrap() > 0.99);
    assert!(regression
        .data()
        .iter()
        .all(|p| p.calculated_concentration.is_some()));
    for qc in &regression.data().quality_controls {
        assert!(qc.accuracy.unwrap().abs() < 0.2, "{}", qc.sample_name);
    }
}
