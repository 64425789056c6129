use crate::error::RightsError;
use crate::vocab::schema::VocabularyDef;
use crate::vocab::{compile, CompiledVocabulary};

const MAVAT_JSON: &str = include_str!("../../../../vocab/header-variants.json");

/// Available predefined vocabularies.
pub const PRESETS: &[&str] = &["mavat"];

/// Load a predefined vocabulary by name.
pub fn load_preset(name: &str) -> Result<VocabularyDef, RightsError> {
    match name {
        "mavat" => {
            let vocab: VocabularyDef = serde_json::from_str(MAVAT_JSON)?;
            Ok(vocab)
        }
        _ => Err(RightsError::VocabularyInvalid(format!(
            "unknown preset '{}'. Available: {}",
            name,
            PRESETS.join(", ")
        ))),
    }
}

/// The compiled default vocabulary.
pub fn default_vocabulary() -> Result<CompiledVocabulary, RightsError> {
    compile(load_preset("mavat")?)
}
