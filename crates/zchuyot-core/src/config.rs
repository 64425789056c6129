use crate::error::RightsError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for table reconstruction and cell parsing.
///
/// Geometric values are in PDF points. Every field has a default, so a
/// config file only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Maximum distance between vertical centres of fragments on one row.
    pub row_tolerance: f32,
    /// Fragments closer than this horizontally are one cell chunk.
    pub word_gap: f32,
    /// Fraction of a column's width a chunk must cover to span that column.
    pub span_overlap: f32,
    /// Rows with fewer chunks than this are not table rows.
    pub min_columns: usize,
    /// Maximum number of stacked header rows merged into one label.
    pub max_header_rows: usize,
    /// Canonical matches required before a band is accepted as a header.
    pub min_header_matches: usize,
    /// Fraction of non-empty cells that must be numeric for a data row.
    pub numeric_row_ratio: f32,
    /// Fraction of cells that must fit the schema for a page continuation.
    pub continuation_agreement: f32,
    /// A short row within this many row heights of the previous data row
    /// is a wrapped continuation of that row's cells.
    pub wrap_gap_factor: f32,
    /// Set when the text layer stores Hebrew glyphs in visual order.
    pub visual_order_text: bool,
    /// Cell contents meaning "not applicable"; parsed as null, never zero.
    pub placeholder_tokens: Vec<String>,
    /// Unit suffixes stripped from numeric cells.
    pub unit_markers: Vec<String>,
    /// Stop after this many pages; `null` scans the whole document.
    pub max_pages: Option<usize>,
}

/// Pages scanned unless `max_pages` says otherwise.
pub const DEFAULT_MAX_PAGES: usize = 30;

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            row_tolerance: 3.0,
            word_gap: 4.0,
            span_overlap: 0.5,
            min_columns: 3,
            max_header_rows: 3,
            min_header_matches: 2,
            numeric_row_ratio: 0.5,
            continuation_agreement: 0.8,
            wrap_gap_factor: 1.5,
            visual_order_text: false,
            placeholder_tokens: [
                "-", "–", "—", "---", "*", "n/a", "N/A", "n.a.", "אין", "ל\"ר", "ל״ר", "ל.ר.",
                "לא רלוונטי",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            unit_markers: [
                "מ\"ר", "מ״ר", "מטר", "מ'", "מ׳", "דונם", "m²", "m2", "m", "%",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_pages: Some(DEFAULT_MAX_PAGES),
        }
    }
}

impl ExtractionConfig {
    pub fn is_placeholder(&self, s: &str) -> bool {
        self.placeholder_tokens
            .iter()
            .any(|t| t.eq_ignore_ascii_case(s))
    }
}

/// Load a config from a JSON file.
pub fn load_config(path: &Path) -> Result<ExtractionConfig, RightsError> {
    let content = std::fs::read_to_string(path).map_err(|e| RightsError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let config: ExtractionConfig =
        serde_json::from_str(&content).map_err(|e| RightsError::ConfigLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a config from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<ExtractionConfig, RightsError> {
    let config: ExtractionConfig = serde_json::from_str(json)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &ExtractionConfig) -> Result<(), RightsError> {
    for (name, value) in [
        ("row_tolerance", config.row_tolerance),
        ("word_gap", config.word_gap),
        ("wrap_gap_factor", config.wrap_gap_factor),
    ] {
        if !(value > 0.0) {
            return Err(RightsError::ConfigInvalid(format!(
                "{name} must be positive, got {value}"
            )));
        }
    }

    for (name, value) in [
        ("span_overlap", config.span_overlap),
        ("numeric_row_ratio", config.numeric_row_ratio),
        ("continuation_agreement", config.continuation_agreement),
    ] {
        if !(value > 0.0 && value <= 1.0) {
            return Err(RightsError::ConfigInvalid(format!(
                "{name} must be in (0, 1], got {value}"
            )));
        }
    }

    if config.min_columns < 2 {
        return Err(RightsError::ConfigInvalid(
            "min_columns must be at least 2".into(),
        ));
    }

    if !(1..=5).contains(&config.max_header_rows) {
        return Err(RightsError::ConfigInvalid(format!(
            "max_header_rows must be between 1 and 5, got {}",
            config.max_header_rows
        )));
    }

    if config.placeholder_tokens.is_empty() {
        return Err(RightsError::ConfigInvalid(
            "placeholder_tokens must not be empty".into(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(RightsError::ConfigInvalid(
            "max_pages must be at least 1 when set".into(),
        ));
    }

    Ok(())
}
