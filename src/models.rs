//! Core data types used throughout Bidsheet.
//!
//! These types represent the catalog rows, items, and line items that flow
//! through the import and content-preparation pipeline.

use sha2::{Digest, Sha256};

/// A validated row from the catalog export, built from header-mapped cells.
///
/// All fields default to the empty string when the corresponding column is
/// absent from the export; `raw_text` preserves the original cells for
/// auditing and change detection.
#[derive(Debug, Clone)]
pub struct RowRecord {
    /// 1-based data row number in the source file (header excluded).
    pub line: usize,
    pub business_id_raw: String,
    pub title: String,
    pub description: String,
    pub value_raw: String,
    pub categories: Vec<String>,
    pub notes: String,
    pub expiration: String,
    /// Original cells joined with tabs; the input to [`content_hash`].
    pub raw_text: String,
}

/// Attributes for a line item about to be inserted or updated.
///
/// Built from a [`RowRecord`] with documented defaults, then passed through
/// enrichment, normalization, and markup formatting before persistence.
#[derive(Debug, Clone)]
pub struct LineItemDraft {
    pub title: String,
    pub description: String,
    pub value: i64,
    pub categories: Vec<String>,
    pub notes: String,
    pub expiration: String,
    pub content_hash: String,
    pub raw_text: String,
}

impl LineItemDraft {
    /// Build a draft from a row. Negative or unparsable monetary values
    /// coerce to 0 and never error.
    pub fn from_row(row: &RowRecord) -> Self {
        Self {
            title: row.title.clone(),
            description: row.description.clone(),
            value: parse_value(&row.value_raw),
            categories: row.categories.clone(),
            notes: row.notes.clone(),
            expiration: row.expiration.clone(),
            content_hash: content_hash(&row.raw_text),
            raw_text: row.raw_text.clone(),
        }
    }
}

/// An auction package stored in SQLite, identified by its catalog number.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Item {
    pub id: String,
    pub business_id: i64,
    #[allow(dead_code)]
    pub created_at: i64,
    #[allow(dead_code)]
    pub updated_at: i64,
}

/// One offering within an [`Item`], uniquely positioned within it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LineItem {
    #[allow(dead_code)]
    pub id: String,
    #[allow(dead_code)]
    pub item_id: String,
    pub position: i64,
    pub title: String,
    pub description: String,
    pub value: i64,
    pub categories: String,
    pub notes: String,
    pub expiration: String,
    #[allow(dead_code)]
    pub content_hash: String,
    #[allow(dead_code)]
    pub raw_text: String,
    #[allow(dead_code)]
    pub created_at: i64,
    #[allow(dead_code)]
    pub updated_at: i64,
}

impl LineItem {
    /// Category tags, decoded from their stored JSON form.
    pub fn category_list(&self) -> Vec<String> {
        serde_json::from_str(&self.categories).unwrap_or_default()
    }
}

/// Aggregate counts returned by a reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub rows_examined: usize,
    pub new_items: u64,
    pub new_line_items: u64,
    pub updated: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub deleted_items: u64,
    pub skipped_rows: Vec<SkippedRow>,
}

/// A row excluded from processing, with a user-visible reason.
#[derive(Debug, Clone)]
pub struct SkippedRow {
    pub line: usize,
    pub business_id: String,
    pub reason: String,
}

/// SHA-256 of raw text, lowercase hex.
///
/// This is the sole signal used to decide whether a row's enrichment and
/// normalization must be redone: identical raw text always yields an
/// identical hash.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse a monetary value like `"$1,250"` into whole currency units.
///
/// Negative, blank, and unparsable input all coerce to 0.
pub fn parse_value(raw: &str) -> i64 {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return 0;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.round() as i64,
        _ => 0,
    }
}

/// Filename-safe slug for one output document per line item.
///
/// Lowercases, keeps ASCII alphanumerics, and joins everything else into
/// single dashes.
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_dash = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "item".to_string()
    } else {
        out
    }
}
