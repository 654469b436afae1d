use std::path::Path;

use anyhow::{bail, Context, Result};

use super::model::ParsedExport;
use super::parser;
use crate::error::ExportError;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load and parse a results-table export. Dispatch by extension.
///
/// Supported formats:
/// * `.txt` / `.tsv` – tab-delimited text export
pub fn load_export_file(path: &Path) -> Result<ParsedExport> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "txt" | "tsv" => {
            let text = read_export_text(path)
                .with_context(|| format!("reading {}", path.display()))?;
            parser::parse(&text).with_context(|| format!("parsing {}", path.display()))
        }
        other => bail!("Unsupported file extension: .{other}"),
    }
}

/// Full contents of an export file, without a leading byte-order mark.
pub fn read_export_text(path: &Path) -> Result<String, ExportError> {
    let text = std::fs::read_to_string(path)?;
    Ok(match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    })
}
