/// Calibration engine: weighted linear fit over active standards,
/// back-calculation and accuracy.
///
/// ```text
///   RegressionData ──▶ Regression::update()
///                        │ 1. fit_line(active standards, weighting)
///                        │ 2. calculated concentration, every point
///                        │ 3. accuracy, standards + QCs
///                        ▼
///   RegressionData (calculated_concentration / accuracy filled in)
/// ```

pub mod engine;
pub mod point;
pub mod weighting;

pub use engine::{fit_line, LineFit, Regression, RegressionSummary, RegressionType};
pub use point::{RegressionData, RegressionPoint, SampleKind};
pub use weighting::{WeightTransform, WeightingFactor, WeightingFamily};
