use zchuyot_core::model::{
    BuildingRightsRecord, CanonicalField, ExtractionOutcome, ExtractionState,
};

use crate::commands::batch::{BatchEntry, PlanEntry};

const MAX_CELL: usize = 24;

pub fn format_outcomes(outcomes: &[ExtractionOutcome]) -> String {
    let mut out = String::new();

    for (i, outcome) in outcomes.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let status = outcome
            .plan_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "no table".into());
        out.push_str(&format!("=== {} ({}) ===\n\n", outcome.plan_number, status));
        out.push_str(&format!(
            "  Status: {}  Confidence: {}  Pages: {}\n\n",
            outcome.status,
            outcome.confidence,
            join_pages(&outcome.source_pages)
        ));

        if !outcome.records.is_empty() {
            out.push_str(&format_records(outcome));
            out.push('\n');
        }

        if !outcome.warnings.is_empty() {
            out.push_str("  Warnings:\n");
            for w in &outcome.warnings {
                let row = w.row.map(|r| format!(" row {r}")).unwrap_or_default();
                out.push_str(&format!("    [p{}{}] {}\n", w.page_number, row, w.message));
            }
        }
    }

    out
}

fn format_records(outcome: &ExtractionOutcome) -> String {
    let names: Vec<&str> = outcome.column_map.values().map(String::as_str).collect();
    let rows: Vec<Vec<String>> = outcome
        .records
        .iter()
        .map(|r| names.iter().map(|n| render_cell(r, n)).collect())
        .collect();

    let widths: Vec<usize> = names
        .iter()
        .enumerate()
        .map(|(col, name)| {
            rows.iter()
                .map(|r| r[col].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(1)
                .min(MAX_CELL)
        })
        .collect();

    let mut out = String::new();
    out.push_str(&format!("  {:>3}", "#"));
    for (name, width) in names.iter().zip(&widths) {
        out.push_str(&format!("  {}", pad(name, *width)));
    }
    out.push('\n');
    out.push_str(&format!(
        "  {}\n",
        "-".repeat(3 + widths.iter().map(|w| w + 2).sum::<usize>())
    ));

    for (record, cells) in outcome.records.iter().zip(&rows) {
        out.push_str(&format!("  {:>3}", record.row_index));
        for (cell, width) in cells.iter().zip(&widths) {
            out.push_str(&format!("  {}", pad(cell, *width)));
        }
        out.push('\n');
    }

    out
}

fn render_cell(record: &BuildingRightsRecord, name: &str) -> String {
    let value = match CanonicalField::ALL.iter().find(|f| f.as_str() == name) {
        Some(field) => record.get(*field).map(|v| v.to_string()),
        None => record.extra_data.get(name).cloned(),
    };
    value.unwrap_or_else(|| "-".into())
}

/// Left-align to `width` characters, truncating long cells.
fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('~');
        cut
    } else {
        format!("{}{}", text, " ".repeat(width - len))
    }
}

fn join_pages(pages: &[usize]) -> String {
    if pages.is_empty() {
        return "-".into();
    }
    pages
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_batch(entries: &[BatchEntry]) -> String {
    let width = entries
        .iter()
        .map(|e| e.plan_number.chars().count())
        .max()
        .unwrap_or(10)
        .max(4);

    let mut out = String::new();
    out.push_str(&format!(
        "  {:<width$}  {:<9}  {:<9}  {:<8}  {:>5}\n",
        "Plan", "Table", "Status", "Conf.", "Rows"
    ));

    let mut ok = 0;
    for entry in entries {
        match &entry.result {
            Ok(outcomes) => {
                if outcomes.iter().any(|o| !o.records.is_empty()) {
                    ok += 1;
                }
                for o in outcomes {
                    let table = o
                        .plan_status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".into());
                    out.push_str(&format!(
                        "  {:<width$}  {:<9}  {:<9}  {:<8}  {:>5}\n",
                        entry.plan_number,
                        table,
                        o.status.to_string(),
                        o.confidence.to_string(),
                        o.records.len()
                    ));
                }
            }
            Err(e) => {
                out.push_str(&format!(
                    "  {:<width$}  error: {}\n",
                    entry.plan_number, e
                ));
            }
        }
    }

    out.push_str(&format!(
        "\n{} of {} plan(s) yielded building-rights rows\n",
        ok,
        entries.len()
    ));
    out
}

pub fn format_plans(entries: &[PlanEntry]) -> String {
    let width = entries
        .iter()
        .map(|e| e.summary.plan_number.chars().count())
        .max()
        .unwrap_or(10)
        .max(4);

    let mut out = String::new();
    out.push_str(&format!(
        "  {:<width$}  {:<9}  {:>5}  {}\n",
        "Plan", "State", "Rows", "Error"
    ));
    for entry in entries {
        let summary = &entry.summary;
        out.push_str(&format!(
            "  {:<width$}  {:<9}  {:>5}  {}\n",
            summary.plan_number,
            summary.state.to_string(),
            summary.rows_written,
            summary.error.as_deref().unwrap_or("")
        ));
    }

    let complete = entries
        .iter()
        .filter(|e| e.summary.state == ExtractionState::Complete)
        .count();
    out.push_str(&format!(
        "\n{} of {} plan(s) complete\n",
        complete,
        entries.len()
    ));
    out
}
