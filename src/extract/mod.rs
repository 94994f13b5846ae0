//! CSV extraction with encoding and delimiter auto-detection.
//!
//! Extraction is schema-on-read: the CSV header is matched
//! case-insensitively against the dataset's declared columns, a
//! missing expected column is a hard error before any transform runs,
//! and extra columns are dropped. Every cell comes out as a raw
//! string (`Cell::Str`); type coercion is the Transformer's job.

use std::path::Path;

use crate::dataset::DatasetSpec;
use crate::error::{ExtractError, ExtractResult};
use crate::record::{Cell, RecordSet};

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the detected encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> ExtractResult<String> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => Ok(String::from_utf8_lossy(bytes).to_string()),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.to_string())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()),
        other if other.is_empty() => Err(ExtractError::Encoding(
            "could not detect an encoding".to_string(),
        )),
        _ => Ok(String::from_utf8_lossy(bytes).to_string()),
    }
}

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Extract a dataset from a CSV file, auto-detecting encoding and
/// delimiter.
pub fn extract_file<P: AsRef<Path>>(path: P, spec: &DatasetSpec) -> ExtractResult<RecordSet> {
    let bytes = std::fs::read(path.as_ref())?;
    extract_bytes(&bytes, spec)
}

/// Extract a dataset from raw CSV bytes.
pub fn extract_bytes(bytes: &[u8], spec: &DatasetSpec) -> ExtractResult<RecordSet> {
    if bytes.is_empty() {
        return Err(ExtractError::EmptyFile);
    }
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = detect_delimiter(&content);
    extract_str(&content, delimiter, spec)
}

/// Extract a dataset from decoded CSV text with an explicit delimiter.
pub fn extract_str(content: &str, delimiter: char, spec: &DatasetSpec) -> ExtractResult<RecordSet> {
    let mut lines = content.lines();

    let header_line = lines.next().ok_or(ExtractError::EmptyFile)?;
    let headers: Vec<String> = header_line
        .split(delimiter)
        .map(|s| s.trim().trim_matches('"').to_lowercase())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(ExtractError::NoHeaders);
    }

    // Schema-on-read: map each declared column to its header position.
    let mut positions = Vec::with_capacity(spec.columns.len());
    let mut missing = Vec::new();
    for column in &spec.columns {
        match headers.iter().position(|h| h == &column.name) {
            Some(pos) => positions.push(pos),
            None => missing.push(column.name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(ExtractError::MissingColumns {
            dataset: spec.name.clone(),
            columns: missing,
        });
    }

    let mut rows = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }

        let values: Vec<&str> = line.split(delimiter).collect();
        let row: Vec<Cell> = positions
            .iter()
            .map(|&pos| {
                let raw = values
                    .get(pos)
                    .map(|s| s.trim().trim_matches('"'))
                    .unwrap_or("");
                if raw.is_empty() {
                    Cell::Null
                } else {
                    Cell::Str(raw.to_string())
                }
            })
            .collect();
        rows.push(row);
    }

    let columns = spec.columns.iter().map(|c| c.name.clone()).collect();
    Ok(RecordSet::new(columns, rows))
}

/// Write a RecordSet to a CSV file (the staged/transformed output).
pub fn write_csv<P: AsRef<Path>>(path: P, t: &RecordSet) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(t.columns())?;
    for row in t.rows() {
        writer.write_record(row.iter().map(|c| c.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TELCO;

    const TELCO_HEADER: &str = "customerID,gender,tenure,MultipleLines,InternetService,Contract,PaymentMethod,MonthlyCharges,TotalCharges,Churn";

    fn telco_csv(rows: &[&str]) -> String {
        let mut out = String::from(TELCO_HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_extract_simple() {
        let csv = telco_csv(&[
            "0001,Male,5,No,DSL,Month-to-month,Mailed check,29.85,149.25,No",
            "0002,Female,40,Yes,Fiber optic,Two year,Credit card,89.10,3564.00,Yes",
        ]);
        let t = extract_bytes(csv.as_bytes(), &TELCO).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.source_rows(), 2);
        assert_eq!(t.get(0, "tenure"), Some(&Cell::Str("5".into())));
        assert_eq!(t.get(1, "contract"), Some(&Cell::Str("Two year".into())));
    }

    #[test]
    fn test_headers_matched_case_insensitively() {
        let csv = telco_csv(&["1,M,1,No,No,Month-to-month,Check,10,10,No"]);
        let t = extract_bytes(csv.as_bytes(), &TELCO).unwrap();
        assert!(t.has_column("monthlycharges"));
        assert!(t.has_column("customerid"));
    }

    #[test]
    fn test_missing_column_is_hard_error() {
        let csv = "customerID,gender,tenure\n1,M,5";
        let err = extract_bytes(csv.as_bytes(), &TELCO).unwrap_err();
        match err {
            ExtractError::MissingColumns { dataset, columns } => {
                assert_eq!(dataset, "telco");
                assert!(columns.contains(&"contract".to_string()));
                assert!(columns.contains(&"churn".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_values_become_null() {
        let csv = telco_csv(&["1,M,5,No,DSL,One year,Check,29.85,,No"]);
        let t = extract_bytes(csv.as_bytes(), &TELCO).unwrap();
        assert_eq!(t.get(0, "totalcharges"), Some(&Cell::Null));
    }

    #[test]
    fn test_empty_file() {
        assert!(matches!(
            extract_bytes(b"", &TELCO),
            Err(ExtractError::EmptyFile)
        ));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let csv = telco_csv(&[
            "1,M,5,No,DSL,One year,Check,29.85,149.25,No",
            "",
            "2,F,9,No,DSL,One year,Check,29.85,268.65,No",
        ]);
        let t = extract_bytes(csv.as_bytes(), &TELCO).unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert!(decoded.contains("Soci"));
    }

    #[test]
    fn test_write_csv_round_trip() {
        let csv = telco_csv(&["1,M,5,No,DSL,One year,Check,29.85,149.25,No"]);
        let t = extract_bytes(csv.as_bytes(), &TELCO).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("staged.csv");
        write_csv(&path, &t).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("customerid,gender,tenure"));
        assert!(written.contains("29.85"));
    }
}
