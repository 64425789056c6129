pub mod builtin;
pub mod schema;

use crate::error::RightsError;
use crate::model::{CanonicalField, PlanStatus};
use regex::Regex;
use schema::VocabularyDef;
use std::collections::HashSet;
use std::path::Path;

/// Load a vocabulary from a JSON file.
pub fn load_vocabulary(path: &Path) -> Result<VocabularyDef, RightsError> {
    let content = std::fs::read_to_string(path).map_err(|e| RightsError::VocabularyLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_vocabulary(&content, path)
}

/// Parse a vocabulary from a JSON string.
pub fn parse_vocabulary(json: &str, source: &Path) -> Result<VocabularyDef, RightsError> {
    let vocab: VocabularyDef =
        serde_json::from_str(json).map_err(|e| RightsError::VocabularyLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_vocabulary(&vocab)?;
    Ok(vocab)
}

/// Parse a vocabulary from a JSON string (no file path context).
pub fn parse_vocabulary_str(json: &str) -> Result<VocabularyDef, RightsError> {
    let vocab: VocabularyDef = serde_json::from_str(json).map_err(RightsError::Json)?;
    validate_vocabulary(&vocab)?;
    Ok(vocab)
}

/// Validate that a vocabulary is well-formed.
pub fn validate_vocabulary(vocab: &VocabularyDef) -> Result<(), RightsError> {
    if vocab.columns.is_empty() {
        return Err(RightsError::VocabularyInvalid(
            "columns must not be empty".into(),
        ));
    }

    let mut seen = HashSet::new();
    for column in &vocab.columns {
        if !seen.insert(column.field) {
            return Err(RightsError::VocabularyInvalid(format!(
                "field '{}' is listed more than once",
                column.field
            )));
        }
        if column.variants.is_empty() {
            return Err(RightsError::VocabularyInvalid(format!(
                "field '{}' has no variants",
                column.field
            )));
        }
        for variant in &column.variants {
            check_pattern(variant, column.field.as_str())?;
        }
    }

    for pattern in &vocab.section_keywords {
        check_pattern(pattern, "section_keywords")?;
    }

    for status in &vocab.status_keywords {
        if status.patterns.is_empty() {
            return Err(RightsError::VocabularyInvalid(format!(
                "status '{}' has no patterns",
                status.status
            )));
        }
        for pattern in &status.patterns {
            check_pattern(pattern, &status.status.to_string())?;
        }
    }

    Ok(())
}

fn check_pattern(pattern: &str, owner: &str) -> Result<(), RightsError> {
    if pattern.trim().is_empty() {
        return Err(RightsError::VocabularyInvalid(format!(
            "'{owner}' has an empty pattern"
        )));
    }
    Regex::new(pattern).map_err(|e| {
        RightsError::VocabularyInvalid(format!("'{owner}' has invalid pattern '{pattern}': {e}"))
    })?;
    Ok(())
}

/// A vocabulary with its patterns compiled, ready for matching.
#[derive(Debug, Clone)]
pub struct CompiledVocabulary {
    def: VocabularyDef,
    columns: Vec<(CanonicalField, Vec<(String, Regex)>)>,
    statuses: Vec<(PlanStatus, Vec<Regex>)>,
    sections: Vec<Regex>,
}

/// Validate and compile a vocabulary.
pub fn compile(def: VocabularyDef) -> Result<CompiledVocabulary, RightsError> {
    validate_vocabulary(&def)?;

    let mut columns = Vec::with_capacity(def.columns.len());
    for column in &def.columns {
        let mut patterns = Vec::with_capacity(column.variants.len());
        for variant in &column.variants {
            let re = Regex::new(variant)
                .map_err(|e| RightsError::VocabularyInvalid(e.to_string()))?;
            patterns.push((variant.clone(), re));
        }
        columns.push((column.field, patterns));
    }

    let mut statuses = Vec::with_capacity(def.status_keywords.len());
    for status in &def.status_keywords {
        let mut patterns = Vec::with_capacity(status.patterns.len());
        for pattern in &status.patterns {
            patterns.push(
                Regex::new(pattern).map_err(|e| RightsError::VocabularyInvalid(e.to_string()))?,
            );
        }
        statuses.push((status.status, patterns));
    }

    let sections = def
        .section_keywords
        .iter()
        .map(|p| Regex::new(p).map_err(|e| RightsError::VocabularyInvalid(e.to_string())))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledVocabulary {
        def,
        columns,
        statuses,
        sections,
    })
}

impl CompiledVocabulary {
    pub fn definition(&self) -> &VocabularyDef {
        &self.def
    }

    /// Match a merged header label against the vocabulary.
    ///
    /// Fields in `used` are skipped so a schema never maps two columns onto
    /// one field. Returns the field and all variants registered for it.
    pub fn match_label(
        &self,
        label: &str,
        used: &HashSet<CanonicalField>,
    ) -> Option<(CanonicalField, Vec<String>)> {
        let label = normalize_label(label);
        if label.is_empty() {
            return None;
        }

        for (field, patterns) in &self.columns {
            if used.contains(field) {
                continue;
            }
            if let Some((variant, _)) = patterns.iter().find(|(_, re)| re.is_match(&label)) {
                log::debug!("header '{label}' -> {field} (variant '{variant}')");
                let variants = patterns.iter().map(|(v, _)| v.clone()).collect();
                return Some((*field, variants));
            }
        }
        None
    }

    /// Find a plan-status announcement in a line of text.
    pub fn detect_status(&self, text: &str) -> Option<PlanStatus> {
        let text = normalize_label(text);
        self.statuses
            .iter()
            .find(|(_, patterns)| patterns.iter().any(|re| re.is_match(&text)))
            .map(|(status, _)| *status)
    }

    /// Whether tables must follow a section heading to be accepted.
    pub fn has_section_keywords(&self) -> bool {
        !self.sections.is_empty()
    }

    /// Whether a line of text is a building-rights section heading.
    pub fn is_section_heading(&self, text: &str) -> bool {
        let text = normalize_label(text);
        self.sections.iter().any(|re| re.is_match(&text))
    }
}

/// Collapse whitespace runs so patterns see single spaces.
fn normalize_label(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
