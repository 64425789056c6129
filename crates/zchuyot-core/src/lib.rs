pub mod config;
pub mod error;
pub mod extraction;
pub mod layout;
pub mod model;
pub mod orchestrator;
pub mod parsing;
pub mod stitch;
pub mod store;
pub mod vocab;

use config::ExtractionConfig;
use error::RightsError;
use extraction::{PageContent, PdfExtractor};
use model::{
    ExtractionOutcome, ExtractionState, OutcomeStatus, TenderExtraction, WarningKind,
};
use orchestrator::Orchestrator;
use store::{DocumentSource, RightsStore};
use vocab::CompiledVocabulary;

/// Extract building-rights tables from already tokenized pages.
pub fn extract_pages(
    plan_number: &str,
    pages: &[PageContent],
    config: &ExtractionConfig,
    vocab: &CompiledVocabulary,
) -> Vec<ExtractionOutcome> {
    Orchestrator::new(config, vocab).run(plan_number, pages)
}

/// Main API entry point: extract building-rights tables from a PDF.
///
/// A PDF without a text layer is not an error; it yields a single failed
/// outcome with no records.
pub fn extract_pdf(
    pdf_bytes: &[u8],
    plan_number: &str,
    extractor: &dyn PdfExtractor,
    config: &ExtractionConfig,
    vocab: &CompiledVocabulary,
) -> Result<Vec<ExtractionOutcome>, RightsError> {
    let pages = extractor.extract_pages(pdf_bytes)?;
    log::debug!(
        "{plan_number}: {} page(s) via {}",
        pages.len(),
        extractor.backend_name()
    );
    Ok(extract_pages(plan_number, &pages, config, vocab))
}

/// Fetch, extract and persist one plan, recording the outcome as the
/// plan's extraction state. Never retries; any failure marks the plan failed.
pub fn run_plan(
    plan_number: &str,
    source: &dyn DocumentSource,
    extractor: &dyn PdfExtractor,
    store: &mut dyn RightsStore,
    config: &ExtractionConfig,
    vocab: &CompiledVocabulary,
) -> TenderExtraction {
    if let Err(e) = store.set_state(plan_number, ExtractionState::Queued, None) {
        log::warn!("{plan_number}: could not mark queued: {e}");
    }

    let (state, error, rows_written) =
        match fetch_and_store(plan_number, source, extractor, store, config, vocab) {
            Ok(rows) => (ExtractionState::Complete, None, rows),
            Err(e) => {
                log::error!("{plan_number}: {e}");
                (ExtractionState::Failed, Some(e.to_string()), 0)
            }
        };

    if let Err(e) = store.set_state(plan_number, state, error.as_deref()) {
        log::error!("{plan_number}: could not record state {state}: {e}");
    }

    TenderExtraction {
        plan_number: plan_number.to_string(),
        state,
        error,
        rows_written,
    }
}

fn fetch_and_store(
    plan_number: &str,
    source: &dyn DocumentSource,
    extractor: &dyn PdfExtractor,
    store: &mut dyn RightsStore,
    config: &ExtractionConfig,
    vocab: &CompiledVocabulary,
) -> Result<usize, RightsError> {
    let pdf = source.fetch(plan_number)?;
    let outcomes = extract_pdf(&pdf, plan_number, extractor, config, vocab)?;

    let mut written = 0;
    let mut tables = 0;
    for outcome in &outcomes {
        let (OutcomeStatus::Complete | OutcomeStatus::Partial, Some(status)) =
            (outcome.status, outcome.plan_status)
        else {
            continue;
        };
        if outcome
            .warnings
            .iter()
            .any(|w| w.kind == WarningKind::DuplicatePlanStatus)
        {
            log::warn!(
                "{plan_number}: skipping a second {status} table, it needs manual review"
            );
            continue;
        }
        written += store.replace_rows(plan_number, status, &outcome.records)?;
        tables += 1;
    }

    if tables == 0 {
        let detail = outcomes
            .iter()
            .flat_map(|o| o.warnings.iter())
            .map(|w| w.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(RightsError::Extraction(format!(
            "no building-rights table extracted ({detail})"
        )));
    }

    Ok(written)
}
