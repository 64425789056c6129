use chrono::{DateTime, Utc};

use crate::config::ExtractionConfig;
use crate::model::{BuildingRightsRecord, ColumnKey, ColumnSchema, PlanStatus};
use crate::parsing::values::{collapse_whitespace, parse_cell, CellError};

/// Suffix of the `extra_data` key holding the raw text of a cell that
/// failed its column's type.
pub const INVALID_SUFFIX: &str = "__invalid";

/// Identity of the record being assembled.
#[derive(Debug, Clone, Copy)]
pub struct RowContext<'a> {
    pub plan_number: &'a str,
    pub plan_status: PlanStatus,
    pub row_index: usize,
    pub extracted_at: DateTime<Utc>,
}

/// A cell that could not be read as its column's type.
#[derive(Debug, Clone, PartialEq)]
pub struct CellIssue {
    pub column: usize,
    pub key: String,
    pub raw: String,
    pub error: CellError,
}

#[derive(Debug, Clone)]
pub struct AssembledRow {
    pub record: BuildingRightsRecord,
    pub issues: Vec<CellIssue>,
}

/// Whether every cell of a row is empty.
pub fn is_blank_row(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}

/// Build one record from a data row's cells, in schema column order.
///
/// Dynamic columns always land in `extra_data`, even when empty. A canonical
/// cell that fails to parse leaves its field null and keeps the raw text
/// under `{key}__invalid`.
pub fn assemble_row(
    ctx: &RowContext<'_>,
    schema: &ColumnSchema,
    cells: &[String],
    config: &ExtractionConfig,
) -> AssembledRow {
    let mut record =
        BuildingRightsRecord::new(ctx.plan_number, ctx.plan_status, ctx.row_index, ctx.extracted_at);
    let mut issues = Vec::new();

    for (i, column) in schema.columns().iter().enumerate() {
        let raw = cells.get(i).map(String::as_str).unwrap_or("");
        match &column.key {
            ColumnKey::Dynamic(name) => {
                record
                    .extra_data
                    .insert(name.clone(), collapse_whitespace(raw));
            }
            ColumnKey::Canonical(field) => match parse_cell(raw, column.semantic_type, config) {
                Ok(Some(value)) => {
                    record.set(*field, value);
                }
                Ok(None) => {}
                Err(error) => {
                    let raw = collapse_whitespace(raw);
                    record
                        .extra_data
                        .insert(format!("{field}{INVALID_SUFFIX}"), raw.clone());
                    issues.push(CellIssue {
                        column: i,
                        key: field.as_str().to_string(),
                        raw,
                        error,
                    });
                }
            },
        }
    }

    AssembledRow { record, issues }
}
