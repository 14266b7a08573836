//! Delivery manifest loading.
//!
//! A manifest is one sheet of delivery lines. Three configured columns are read
//! per row: job/order id, bundle id and footage. Rows without a job id are left
//! out and reported, never fatal.

use std::path::Path;

use serde::Serialize;

use framecount_takeoff::config::ManifestSource;
use framecount_takeoff::model::{ManifestBatch, ManifestRow};
use framecount_takeoff::FrameError;

/// A manifest row that was left out, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDiagnostic {
    /// 1-based row number in the sheet.
    pub row: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestLoad {
    pub batch: ManifestBatch,
    pub diagnostics: Vec<RowDiagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestFormat {
    Spreadsheet,
    Delimited,
}

impl ManifestFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Spreadsheet),
            "csv" | "tsv" | "txt" => Some(Self::Delimited),
            _ => None,
        }
    }
}

/// Read a manifest file, resolving `source.file` against `base_dir`.
pub fn load_manifest(source: &ManifestSource, base_dir: &Path) -> Result<ManifestLoad, FrameError> {
    let path = base_dir.join(&source.file);
    let rows = read_sheet(&path, source.sheet.as_deref())?;
    rows_to_manifest(source, &rows)
}

/// Raw cell text for every row of the manifest's sheet.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>, FrameError> {
    match ManifestFormat::from_path(path) {
        Some(ManifestFormat::Spreadsheet) => crate::xlsx::read_rows(path, sheet),
        Some(ManifestFormat::Delimited) => crate::csv::read_rows(path),
        None => Err(FrameError::UnsupportedManifest(path.display().to_string())),
    }
}

/// Apply the source's column layout to already-decoded rows.
pub fn rows_to_manifest(source: &ManifestSource, rows: &[Vec<String>]) -> Result<ManifestLoad, FrameError> {
    let job_col = source.job_column.index()?;
    let bundle_col = source.bundle_column.index()?;
    let footage_col = source.footage_column.index()?;

    let cell = |row: &[String], col: usize| -> String {
        row.get(col).map(|s| s.trim().to_string()).unwrap_or_default()
    };

    let mut manifest_rows = Vec::new();
    let mut diagnostics = Vec::new();

    for (idx, row) in rows.iter().enumerate().skip(source.header_rows) {
        let row_number = idx + 1;
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let job_id = cell(row, job_col);
        if job_id.is_empty() {
            diagnostics.push(RowDiagnostic {
                row: row_number,
                reason: "empty job id".into(),
            });
            continue;
        }
        if job_id.contains(['/', '\\']) {
            diagnostics.push(RowDiagnostic {
                row: row_number,
                reason: format!("job id '{job_id}' contains a path separator"),
            });
            continue;
        }

        manifest_rows.push(ManifestRow::new(
            row_number,
            &job_id,
            &cell(row, bundle_col),
            &cell(row, footage_col),
        ));
    }

    Ok(ManifestLoad {
        batch: ManifestBatch {
            name: source.name.clone(),
            rows: manifest_rows,
        },
        diagnostics,
    })
}
