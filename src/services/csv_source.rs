//! CSV input

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::CsvError;
use crate::types::rows::RawRow;

/// Read every record of a CSV file. Headers are matched case-insensitively,
/// so they are lower-cased and trimmed here.
pub fn read_path(path: &Path, required: &[&str]) -> Result<Vec<RawRow>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;
    let rows = read_records(reader, required)?;
    info!("Read {} rows from {}", rows.len(), path.display());
    Ok(rows)
}

pub fn read_str(content: &str, required: &[&str]) -> Result<Vec<RawRow>, CsvError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    read_records(reader, required)
}

fn read_records<R: std::io::Read>(
    mut reader: csv::Reader<R>,
    required: &[&str],
) -> Result<Vec<RawRow>, CsvError> {
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
        .collect();

    let missing: Vec<String> = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h == *col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(CsvError::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let fields: HashMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        // line in the file; the csv reader skips blank lines silently
        let row_number = record.position().map_or(idx + 2, |p| p.line() as usize);
        rows.push(RawRow::new(row_number, fields));
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_normalized_and_rows_numbered_from_two() {
        let csv = "\u{feff}Ticket Customer , TECH\nAcme Corp,Dana\n,\nGlobex,Sam\n";
        let rows = read_str(csv, &["ticket customer", "tech"]).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].row_number, 2);
        assert_eq!(rows[0].get("ticket customer"), Some("Acme Corp"));
        // blank records are dropped but numbering follows the file
        assert_eq!(rows[1].row_number, 4);
        assert_eq!(rows[1].get("tech"), Some("Sam"));
    }

    #[test]
    fn missing_required_header_rejects_the_file() {
        let required = ["ticket customer", "tech", "ticket status"];
        let err = read_str("ticket customer,tech\nAcme,Dana\n", &required).unwrap_err();
        assert!(matches!(
            err,
            CsvError::MissingColumns(ref cols) if cols == &vec!["ticket status".to_string()]
        ));
    }

    #[test]
    fn short_records_leave_trailing_columns_absent() {
        let rows = read_str("a,b,c\n1,2\n", &[]).unwrap();
        assert_eq!(rows[0].get("b"), Some("2"));
        assert_eq!(rows[0].raw("c"), None);
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.csv");
        std::fs::write(&path, "ticket number,ticket comment\n1042,Hello\n").unwrap();

        let rows = read_path(&path, &["ticket number"]).unwrap();
        assert_eq!(rows[0].get("ticket comment"), Some("Hello"));
        assert!(read_path(&dir.path().join("nope.csv"), &[]).is_err());
    }
}
