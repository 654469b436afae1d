/// Data layer: export schema, parsing and classification.
///
/// Architecture:
/// ```text
///   results export (.txt)
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  read file → raw text
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  parser   │  header blocks + 80-column rows (schema) → ParsedExport
///   └──────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ classify  │  rows → standards / QCs / unknowns → RegressionData
///   └──────────┘
/// ```

pub mod classify;
pub mod loader;
pub mod model;
pub mod parser;
pub mod schema;
