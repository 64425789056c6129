use crate::model::{CanonicalField, PlanStatus};
use serde::{Deserialize, Serialize};

/// A controlled vocabulary mapping raw header labels onto canonical fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub version: String,
    /// Checked in order; the first unused field whose variant matches wins.
    pub columns: Vec<ColumnVariantsDef>,
    /// Headings that open the building-rights section. Tables are only
    /// accepted at or after one of them; empty accepts tables anywhere.
    #[serde(default)]
    pub section_keywords: Vec<String>,
    #[serde(default)]
    pub status_keywords: Vec<StatusKeywordsDef>,
}

/// Known header variants of one canonical field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnVariantsDef {
    pub field: CanonicalField,
    /// Regular expressions matched against the merged header label.
    pub variants: Vec<String>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Phrases that announce which plan state the following table describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusKeywordsDef {
    pub status: PlanStatus,
    pub patterns: Vec<String>,
}
