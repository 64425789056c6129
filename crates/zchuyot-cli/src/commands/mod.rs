pub mod batch;
pub mod extract;
pub mod vocab;

use std::path::Path;
use zchuyot_core::config::{load_config, ExtractionConfig};
use zchuyot_core::error::RightsError;
use zchuyot_core::vocab::{builtin, compile, load_vocabulary, CompiledVocabulary};

/// Settings and vocabulary from the given files, or the built-in defaults.
pub fn load_settings(
    config: Option<&Path>,
    vocabulary: Option<&Path>,
) -> Result<(ExtractionConfig, CompiledVocabulary), RightsError> {
    let config = match config {
        Some(path) => load_config(path)?,
        None => ExtractionConfig::default(),
    };
    let vocab = match vocabulary {
        Some(path) => compile(load_vocabulary(path)?)?,
        None => builtin::default_vocabulary()?,
    };
    Ok((config, vocab))
}

/// Plan number implied by a PDF's file name.
pub fn plan_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
