//! CSV row source for catalog exports.
//!
//! Thin I/O wrapper: tokenizes the export into [`RowRecord`]s using a
//! configurable header-name → field table. Any tokenization failure here is
//! fatal and aborts the run before the store is touched.

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::ColumnsConfig;
use crate::models::RowRecord;

/// Resolved column index per semantic field. Only the business identifier
/// column is mandatory; every other field defaults to empty when its column
/// is missing from this export revision.
#[derive(Debug)]
struct HeaderMap {
    business_id: usize,
    title: Option<usize>,
    description: Option<usize>,
    value: Option<usize>,
    categories: Option<usize>,
    notes: Option<usize>,
    expiration: Option<usize>,
}

impl HeaderMap {
    fn resolve(headers: &[String], columns: &ColumnsConfig) -> Result<Self> {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.trim().to_lowercase())
            .collect();
        let find = |candidates: &[String]| -> Option<usize> {
            candidates.iter().find_map(|candidate| {
                let candidate = candidate.trim().to_lowercase();
                normalized.iter().position(|h| *h == candidate)
            })
        };

        let Some(business_id) = find(&columns.business_id) else {
            bail!(
                "No business identifier column found. Looked for: {}",
                columns.business_id.join(", ")
            );
        };

        Ok(Self {
            business_id,
            title: find(&columns.title),
            description: find(&columns.description),
            value: find(&columns.value),
            categories: find(&columns.categories),
            notes: find(&columns.notes),
            expiration: find(&columns.expiration),
        })
    }
}

/// Read and tokenize a catalog export file.
pub fn read_rows(path: &Path, columns: &ColumnsConfig) -> Result<Vec<RowRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open catalog export: {}", path.display()))?;
    parse_rows(file, columns)
        .with_context(|| format!("Failed to parse catalog export: {}", path.display()))
}

/// Tokenize CSV from any reader. Fully blank rows are dropped; ragged rows
/// are tolerated, with missing cells defaulting to empty.
pub fn parse_rows<R: Read>(reader: R, columns: &ColumnsConfig) -> Result<Vec<RowRecord>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let map = HeaderMap::resolve(&headers, columns)?;

    let mut rows = Vec::new();
    let mut line = 0usize;
    for result in csv_reader.records() {
        let record = result.context("Failed to tokenize row")?;
        let cells: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        line += 1;

        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| cells.get(i)).cloned().unwrap_or_default()
        };

        rows.push(RowRecord {
            line,
            business_id_raw: cell(Some(map.business_id)),
            title: cell(map.title),
            description: cell(map.description),
            value_raw: cell(map.value),
            categories: split_categories(&cell(map.categories)),
            notes: cell(map.notes),
            expiration: cell(map.expiration),
            raw_text: cells.join("\t"),
        });
    }

    Ok(rows)
}

/// Split a category cell on commas and semicolons, dropping empties.
fn split_categories(cell: &str) -> Vec<String> {
    cell.split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> ColumnsConfig {
        ColumnsConfig::default()
    }

    #[test]
    fn test_parse_basic_export() {
        let csv = "Item #,Title,Description,Value\n139,Spa Day,Relax.,$250\n";
        let rows = parse_rows(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].business_id_raw, "139");
        assert_eq!(rows[0].title, "Spa Day");
        assert_eq!(rows[0].value_raw, "$250");
        assert_eq!(rows[0].line, 1);
    }

    #[test]
    fn test_headers_matched_case_insensitively_and_trimmed() {
        let csv = "  ITEM NUMBER , TITLE \n7,Golf\n";
        let rows = parse_rows(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(rows[0].business_id_raw, "7");
        assert_eq!(rows[0].title, "Golf");
    }

    #[test]
    fn test_missing_business_id_column_is_fatal() {
        let csv = "Title,Value\nGolf,$100\n";
        assert!(parse_rows(csv.as_bytes(), &columns()).is_err());
    }

    #[test]
    fn test_missing_optional_columns_default_empty() {
        let csv = "Item #\n12\n";
        let rows = parse_rows(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(rows[0].title, "");
        assert_eq!(rows[0].value_raw, "");
        assert!(rows[0].categories.is_empty());
    }

    #[test]
    fn test_blank_rows_dropped() {
        let csv = "Item #,Title\n1,A\n,\n2,B\n";
        let rows = parse_rows(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].line, 2);
    }

    #[test]
    fn test_raw_text_joins_cells() {
        let csv = "Item #,Title,Value\n139,Spa Day,$250\n";
        let rows = parse_rows(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(rows[0].raw_text, "139\tSpa Day\t$250");
    }

    #[test]
    fn test_categories_split() {
        let csv = "Item #,Categories\n1,\"Dining, Travel; Family\"\n";
        let rows = parse_rows(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(rows[0].categories, vec!["Dining", "Travel", "Family"]);
    }
}
