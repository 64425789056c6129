use std::path::PathBuf;
use zchuyot_core::error::RightsError;
use zchuyot_core::extraction::pdftotext::PdftotextExtractor;

use crate::commands::{load_settings, plan_from_path};
use crate::output;

pub fn run(
    pdf_file: PathBuf,
    plan: Option<String>,
    output_format: &str,
    output_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
    vocabulary_file: Option<PathBuf>,
) -> Result<(), RightsError> {
    let (config, vocab) = load_settings(config_file.as_deref(), vocabulary_file.as_deref())?;
    let plan_number = plan.unwrap_or_else(|| plan_from_path(&pdf_file));

    let pdf_bytes = std::fs::read(&pdf_file)?;
    let extractor = PdftotextExtractor::new();
    let outcomes =
        zchuyot_core::extract_pdf(&pdf_bytes, &plan_number, &extractor, &config, &vocab)?;

    match output_file {
        Some(path) => {
            // Always write JSON when saving to file
            let json = serde_json::to_string_pretty(&outcomes)?;
            std::fs::write(&path, json)?;
            let rows: usize = outcomes.iter().map(|o| o.records.len()).sum();
            eprintln!(
                "Extracted {} table(s), {} row(s), written to {}",
                outcomes.len(),
                rows,
                path.display()
            );
            for o in outcomes.iter().filter(|o| o.needs_review()) {
                eprintln!(
                    "  needs review: {} ({} warning(s))",
                    o.plan_status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "no table".into()),
                    o.warnings.len()
                );
            }
        }
        None => match output_format {
            "json" => output::json::print(&outcomes)?,
            _ => println!("{}", output::table::format_outcomes(&outcomes)),
        },
    }

    Ok(())
}
