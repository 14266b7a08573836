// Spreadsheet manifest import (xlsx, xlsm, xls, xlsb, ods)
//
// Import only. Every cell is reduced to display text; rows are placed at their
// absolute sheet position so column letters in the config match what a user
// sees in Excel even when the used range does not begin at A1.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use framecount_takeoff::FrameError;

/// Maximum number of rows read from one sheet
const MAX_ROWS: usize = 65536;

/// Maximum columns read per row
const MAX_COLS: usize = 256;

/// Read one sheet (the first unless `sheet` names another) into rows of cell text.
pub fn read_rows(path: &Path, sheet: Option<&str>) -> Result<Vec<Vec<String>>, FrameError> {
    let source = path.display().to_string();
    let fail = |message: String| FrameError::Spreadsheet {
        source: source.clone(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| fail(format!("cannot open: {e}")))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let sheet_name = match sheet {
        Some(name) => sheet_names
            .iter()
            .find(|n| n.as_str() == name)
            .cloned()
            .ok_or_else(|| fail(format!("no sheet named '{name}'")))?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| fail("workbook contains no sheets".into()))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| fail(format!("cannot read sheet '{sheet_name}': {e}")))?;

    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let (start_row, start_col) = (start_row as usize, start_col as usize);

    let mut rows: Vec<Vec<String>> = vec![Vec::new(); start_row.min(MAX_ROWS)];
    for row in range.rows() {
        if rows.len() >= MAX_ROWS {
            break;
        }
        let mut cells = vec![String::new(); start_col.min(MAX_COLS)];
        cells.extend(row.iter().take(MAX_COLS.saturating_sub(start_col)).map(cell_text));
        rows.push(cells);
    }

    Ok(rows)
}

/// Display text for a cell. Integral numbers print without a decimal part so a
/// job number stored as `100.0` matches the `100` directory.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        // Serial number; manifests only carry dates in columns we don't read
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_floats_drop_decimal() {
        assert_eq!(cell_text(&Data::Float(100.0)), "100");
        assert_eq!(cell_text(&Data::Float(120.5)), "120.5");
        assert_eq!(cell_text(&Data::Int(7)), "7");
    }

    #[test]
    fn strings_trimmed_and_empty_is_blank() {
        assert_eq!(cell_text(&Data::String("  J100 ".into())), "J100");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::Bool(true)), "TRUE");
    }
}
