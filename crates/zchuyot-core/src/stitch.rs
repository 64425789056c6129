//! Page-boundary continuation of an open table instance.

use crate::config::ExtractionConfig;
use crate::layout::LogicalRow;
use crate::model::ColumnSchema;
use crate::parsing::values::looks_numeric;

/// What the first data rows of a new page mean for the open table.
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// Same structure; rows append with the running row index.
    Continues,
    /// A header band was detected; a new instance starts.
    NewTable,
    /// Neither holds with confidence. The open instance must end as partial.
    Ambiguous(String),
}

/// Decide whether a page continues the open table.
pub fn decide(
    schema: &ColumnSchema,
    page_columns: usize,
    first_row: Option<&LogicalRow>,
    header_detected: bool,
    config: &ExtractionConfig,
) -> Continuation {
    if header_detected {
        return Continuation::NewTable;
    }

    if page_columns != schema.len() {
        return Continuation::Ambiguous(format!(
            "page has {} column(s), open table has {}",
            page_columns,
            schema.len()
        ));
    }

    let Some(row) = first_row else {
        return Continuation::Ambiguous("no data rows to compare".into());
    };

    let agreement = type_agreement(schema, row, config);
    if agreement >= config.continuation_agreement {
        Continuation::Continues
    } else {
        Continuation::Ambiguous(format!(
            "only {:.0}% of cells fit the open table's column types",
            agreement * 100.0
        ))
    }
}

/// Fraction of a row's non-empty cells whose text fits its column's type.
/// Text columns accept anything; numeric columns need a number or placeholder.
pub fn type_agreement(schema: &ColumnSchema, row: &LogicalRow, config: &ExtractionConfig) -> f32 {
    let texts = row.column_texts(schema.len());
    let mut total = 0usize;
    let mut fitting = 0usize;

    for (column, text) in schema.columns().iter().zip(&texts) {
        if text.trim().is_empty() {
            continue;
        }
        total += 1;
        if !column.semantic_type.is_numeric() || looks_numeric(text, config) {
            fitting += 1;
        }
    }

    if total == 0 {
        1.0
    } else {
        fitting as f32 / total as f32
    }
}
