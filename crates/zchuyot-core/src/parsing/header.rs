use std::collections::HashSet;
use std::ops::Range;

use crate::config::ExtractionConfig;
use crate::layout::LogicalRow;
use crate::model::{ColumnDef, ColumnKey, ColumnSchema, SemanticType};
use crate::parsing::values::{collapse_whitespace, looks_numeric};
use crate::vocab::CompiledVocabulary;

/// Header rows need at least this many chunks; single-chunk lines are
/// titles or captions.
const MIN_HEADER_CHUNKS: usize = 2;

/// A header band and the schema built from it.
#[derive(Debug, Clone)]
pub struct HeaderCandidate {
    /// Row indices of the band on its page.
    pub rows: Range<usize>,
    pub labels: Vec<String>,
    pub schema: ColumnSchema,
}

impl HeaderCandidate {
    pub fn is_accepted(&self, config: &ExtractionConfig) -> bool {
        self.schema.canonical_count() >= config.min_header_matches
    }
}

/// Whether a row carries data: enough of its non-empty cells are numeric.
pub fn is_data_row(row: &LogicalRow, config: &ExtractionConfig) -> bool {
    if row.is_fragmentary(config.min_columns) {
        return false;
    }
    let texts: Vec<&str> = row
        .cells
        .iter()
        .map(|c| c.text.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if texts.is_empty() {
        return false;
    }
    let numeric = texts.iter().filter(|t| looks_numeric(t, config)).count();
    numeric as f32 >= texts.len() as f32 * config.numeric_row_ratio
}

/// Rows forming the header band directly above `data_row`.
///
/// Walks upward over non-data rows, at most `max_header_rows` of them.
/// At least one row of the band must be a full table row.
pub fn find_header_band(
    rows: &[LogicalRow],
    data_row: usize,
    config: &ExtractionConfig,
) -> Option<Range<usize>> {
    let data_row = data_row.min(rows.len());
    let mut start = data_row;
    while start > 0 && data_row - start < config.max_header_rows {
        let row = &rows[start - 1];
        if row.chunk_count < MIN_HEADER_CHUNKS || is_data_row(row, config) {
            break;
        }
        start -= 1;
    }

    let band = start..data_row;
    let has_full_row = rows[band.clone()]
        .iter()
        .any(|r| !r.is_fragmentary(config.min_columns));
    (has_full_row && !band.is_empty()).then_some(band)
}

/// Merge a stacked header band into one label per column.
///
/// Each column collects, top to bottom, the text of every cell covering it.
/// A spanning parent cell therefore prefixes each of its child columns.
pub fn merge_header_band(band: &[LogicalRow], column_count: usize) -> Vec<String> {
    (0..column_count)
        .map(|col| {
            let mut parts: Vec<String> = Vec::new();
            for row in band {
                for cell in row.cells.iter().filter(|c| c.covers(col)) {
                    let text = collapse_whitespace(&cell.text);
                    if !text.is_empty() && !parts.contains(&text) {
                        parts.push(text);
                    }
                }
            }
            parts.join(" ")
        })
        .collect()
}

/// Map merged labels onto canonical fields; the rest become dynamic keys.
///
/// Dynamic keys use the label verbatim, `column_{n}` for a blank label, and
/// a numeric suffix when a name is already taken.
pub fn build_schema(labels: &[String], vocab: &CompiledVocabulary) -> ColumnSchema {
    let mut used = HashSet::new();
    let mut names: HashSet<String> = HashSet::new();
    let mut columns = Vec::with_capacity(labels.len());

    for (i, label) in labels.iter().enumerate() {
        if let Some((field, variants)) = vocab.match_label(label, &used) {
            used.insert(field);
            names.insert(field.as_str().to_string());
            columns.push(ColumnDef {
                key: ColumnKey::Canonical(field),
                semantic_type: field.semantic_type(),
                label: label.clone(),
                variants,
            });
            continue;
        }

        let base = if label.trim().is_empty() {
            format!("column_{}", i + 1)
        } else {
            label.trim().to_string()
        };
        let mut name = base.clone();
        let mut k = 2;
        while names.contains(&name) {
            name = format!("{base}_{k}");
            k += 1;
        }
        names.insert(name.clone());
        log::debug!("unmapped header '{label}' kept as '{name}'");
        columns.push(ColumnDef {
            key: ColumnKey::Dynamic(name),
            semantic_type: SemanticType::Text,
            label: label.clone(),
            variants: Vec::new(),
        });
    }

    ColumnSchema::new(columns)
}

/// Find, merge and map the header band above `data_row`.
pub fn detect_header(
    rows: &[LogicalRow],
    data_row: usize,
    column_count: usize,
    vocab: &CompiledVocabulary,
    config: &ExtractionConfig,
) -> Option<HeaderCandidate> {
    let band = find_header_band(rows, data_row, config)?;
    let labels = merge_header_band(&rows[band.clone()], column_count);
    let schema = build_schema(&labels, vocab);
    Some(HeaderCandidate {
        rows: band,
        labels,
        schema,
    })
}
