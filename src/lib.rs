//! Calibration-curve quantitation for LC-MS/MS results-table exports.
//!
//! ```no_run
//! use rusty_quant::data::{classify::classify, parser::parse};
//! use rusty_quant::regression::Regression;
//!
//! let text = std::fs::read_to_string("batch.txt")?;
//! let parsed = parse(&text)?;
//! let mut regression = Regression::new(classify(&parsed.rows), parsed.header.weighting_factor);
//! regression.update()?;
//! println!("{}", regression.summary());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod export;
pub mod regression;
pub mod state;
pub mod storage;

pub use error::{ConfigError, ExportError, RegressionError, StorageError};
