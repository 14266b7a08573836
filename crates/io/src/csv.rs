// Delimited manifest import (csv, tsv, txt)

use std::path::Path;

use framecount_takeoff::FrameError;

/// Read a delimited file into rows of cell text, sniffing the delimiter.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, FrameError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => sniff_delimiter(&content),
    };
    rows_from_str(&content, delimiter).map_err(|message| FrameError::Spreadsheet {
        source: path.display().to_string(),
        message,
    })
}

pub fn rows_from_str(content: &str, delimiter: u8) -> Result<Vec<Vec<String>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.map_err(|e| format!("row {}: {e}", row_idx + 1))?;
        rows.push(record.iter().map(|field| field.trim().to_string()).collect());
    }
    Ok(rows)
}

/// Guess a manifest export's separator from its first ten lines.
///
/// Delivery lists come out of Excel with `,` or `;` depending on locale, and
/// occasionally as tab or pipe text. A candidate must split the first line into
/// at least two fields; the one whose split repeats on the most lines wins.
/// Comma when nothing qualifies.
pub fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = counts.first().copied().unwrap_or(0);
        if target <= 1 {
            continue;
        }

        // lines agreeing with line 1, weighted by field count
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// File contents as text. Bytes that are not UTF-8 are decoded as Windows-1252.
pub fn read_file_as_utf8(path: &Path) -> Result<String, FrameError> {
    let bytes = std::fs::read(path).map_err(|e| FrameError::Io(format!("{}: {e}", path.display())))?;
    // Excel-exported CSVs and older take-off exporters write Windows-1252
    Ok(String::from_utf8(bytes).unwrap_or_else(|e| {
        let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(e.as_bytes());
        decoded.into_owned()
    }))
}
