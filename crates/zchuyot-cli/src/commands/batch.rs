use rayon::prelude::*;
use std::path::PathBuf;
use zchuyot_core::error::RightsError;
use zchuyot_core::extraction::pdftotext::PdftotextExtractor;
use zchuyot_core::model::{BuildingRightsRecord, ExtractionOutcome, TenderExtraction};
use zchuyot_core::store::{DirectorySource, MemoryStore, RightsStore};

use crate::commands::{load_settings, plan_from_path};
use crate::output;

/// Result of one file in a batch run.
pub struct BatchEntry {
    pub file: PathBuf,
    pub plan_number: String,
    pub result: Result<Vec<ExtractionOutcome>, RightsError>,
}

pub fn run(
    pdf_files: Vec<PathBuf>,
    output_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    vocabulary_file: Option<PathBuf>,
) -> Result<(), RightsError> {
    let (config, vocab) = load_settings(config_file.as_deref(), vocabulary_file.as_deref())?;
    if !PdftotextExtractor::is_available() {
        return Err(RightsError::PdftotextNotFound);
    }
    let extractor = PdftotextExtractor::new();

    // Plans are independent; one failing never affects the others.
    let entries: Vec<BatchEntry> = pdf_files
        .into_par_iter()
        .map(|file| {
            let plan_number = plan_from_path(&file);
            let result = std::fs::read(&file)
                .map_err(RightsError::from)
                .and_then(|bytes| {
                    zchuyot_core::extract_pdf(&bytes, &plan_number, &extractor, &config, &vocab)
                });
            if let Err(ref e) = result {
                log::warn!("{}: {e}", file.display());
            }
            BatchEntry {
                file,
                plan_number,
                result,
            }
        })
        .collect();

    println!("{}", output::table::format_batch(&entries));

    if let Some(path) = output_file {
        let report: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| match &entry.result {
                Ok(outcomes) => serde_json::json!({
                    "file": entry.file.display().to_string(),
                    "plan_number": entry.plan_number,
                    "outcomes": outcomes,
                }),
                Err(e) => serde_json::json!({
                    "file": entry.file.display().to_string(),
                    "plan_number": entry.plan_number,
                    "error": e.to_string(),
                }),
            })
            .collect();
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}

/// Result of one plan fetched from the PDF cache.
pub struct PlanEntry {
    pub summary: TenderExtraction,
    pub rows: Vec<BuildingRightsRecord>,
}

/// Run plans end to end against a directory of cached PDFs.
pub fn run_cached(
    plan_numbers: Vec<String>,
    cache_dir: PathBuf,
    output_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    vocabulary_file: Option<PathBuf>,
) -> Result<(), RightsError> {
    let (config, vocab) = load_settings(config_file.as_deref(), vocabulary_file.as_deref())?;
    if !cache_dir.is_dir() {
        return Err(RightsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a directory", cache_dir.display()),
        )));
    }
    if !PdftotextExtractor::is_available() {
        return Err(RightsError::PdftotextNotFound);
    }
    let extractor = PdftotextExtractor::new();
    let source = DirectorySource::new(cache_dir);

    let entries: Vec<PlanEntry> = plan_numbers
        .into_par_iter()
        .map(|plan_number| {
            let mut store = MemoryStore::new();
            let summary = zchuyot_core::run_plan(
                &plan_number,
                &source,
                &extractor,
                &mut store,
                &config,
                &vocab,
            );
            let rows = store.rows_for_plan(&plan_number).unwrap_or_else(|e| {
                log::warn!("{plan_number}: {e}");
                Vec::new()
            });
            PlanEntry { summary, rows }
        })
        .collect();

    println!("{}", output::table::format_plans(&entries));

    if let Some(path) = output_file {
        let report: Vec<serde_json::Value> = entries
            .iter()
            .map(|entry| {
                serde_json::json!({
                    "summary": entry.summary,
                    "rows": entry.rows,
                })
            })
            .collect();
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        eprintln!("Report written to {}", path.display());
    }

    Ok(())
}
