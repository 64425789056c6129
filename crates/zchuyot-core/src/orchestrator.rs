//! Drives one document through layout, header detection, stitching and
//! row assembly, producing one outcome per table instance.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use crate::config::ExtractionConfig;
use crate::extraction::PageContent;
use crate::layout::{reconstruct_page, LogicalRow, PageLayout};
use crate::model::{
    BuildingRightsRecord, ColumnSchema, Confidence, ExtractionOutcome, ExtractionWarning,
    OutcomeStatus, PlanStatus, WarningKind,
};
use crate::parsing::assemble::is_blank_row;
use crate::parsing::values::looks_numeric;
use crate::parsing::{assemble_row, detect_header, is_data_row, HeaderCandidate, RowContext};
use crate::stitch::{self, Continuation};
use crate::vocab::CompiledVocabulary;

/// Share of flagged rows up to which a partial table still rates medium.
const MEDIUM_CONFIDENCE_FLAGGED: f32 = 0.2;

pub struct Orchestrator<'a> {
    config: &'a ExtractionConfig,
    vocab: &'a CompiledVocabulary,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a ExtractionConfig, vocab: &'a CompiledVocabulary) -> Self {
        Orchestrator { config, vocab }
    }

    /// Extract every building-rights table instance of a document.
    pub fn run(&self, plan_number: &str, pages: &[PageContent]) -> Vec<ExtractionOutcome> {
        self.run_at(plan_number, pages, Utc::now())
    }

    /// Same as [`run`](Self::run) with a fixed extraction timestamp.
    pub fn run_at(
        &self,
        plan_number: &str,
        pages: &[PageContent],
        extracted_at: DateTime<Utc>,
    ) -> Vec<ExtractionOutcome> {
        let mut doc = Document::new(plan_number, extracted_at, self.config, self.vocab);
        let limit = self.config.max_pages.unwrap_or(usize::MAX);

        for page in pages.iter().take(limit) {
            let layout = reconstruct_page(page, self.config);
            self.process_page(&mut doc, &layout);
        }

        if pages.iter().all(|p| !p.has_text()) {
            doc.stray.push(ExtractionWarning {
                page_number: 0,
                row: None,
                kind: WarningKind::EmptyPage,
                message: "document has no text layer".into(),
            });
        }

        doc.finish()
    }

    fn process_page(&self, doc: &mut Document<'_>, layout: &PageLayout) {
        let cfg = self.config;
        let rows = &layout.rows;
        let page = layout.page_number;
        let column_count = layout.column_count();

        let data: Vec<bool> = rows
            .iter()
            .map(|r| column_count > 0 && is_data_row(r, cfg))
            .collect();

        let mut headers: BTreeMap<usize, HeaderCandidate> = BTreeMap::new();
        for i in 0..rows.len() {
            if !data[i] || (i > 0 && data[i - 1]) {
                continue;
            }
            let Some(candidate) = detect_header(rows, i, column_count, self.vocab, cfg) else {
                continue;
            };
            if candidate.is_accepted(cfg) {
                headers.insert(candidate.rows.start, candidate);
            } else {
                log::debug!(
                    "page {page}: band {:?} matched {} known column(s), not a header",
                    candidate.rows,
                    candidate.schema.canonical_count()
                );
                doc.stray.push(ExtractionWarning {
                    page_number: page,
                    row: None,
                    kind: WarningKind::HeaderNotFound,
                    message: format!(
                        "header band matched only {} known column(s)",
                        candidate.schema.canonical_count()
                    ),
                });
            }
        }

        let carried_over = doc.open.is_some();
        let mut decided = false;
        let mut appended = false;
        let mut skipping = false;
        let mut orphans = 0usize;
        // full-width text rows seen before the page's first data row
        let mut held: Vec<&LogicalRow> = Vec::new();
        let mut i = 0;

        while i < rows.len() {
            let row = &rows[i];
            let text = row.text();

            if let Some(status) = self.vocab.detect_status(&text) {
                doc.note_status(status);
            }
            if !doc.in_section && self.vocab.is_section_heading(&text) {
                log::debug!("page {page}: building-rights section starts");
                doc.in_section = true;
                skipping = false;
            }

            if let Some(candidate) = headers.remove(&i) {
                i = candidate.rows.end;
                if !doc.in_section {
                    log::debug!(
                        "page {page}: table at rows {:?} precedes the building-rights section",
                        candidate.rows
                    );
                    doc.stray.push(ExtractionWarning {
                        page_number: page,
                        row: None,
                        kind: WarningKind::HeaderNotFound,
                        message: "table outside the building-rights section ignored".into(),
                    });
                    skipping = true;
                    continue;
                }
                if !decided {
                    self.settle_held(doc, &mut held, column_count, page, false);
                }
                if doc.open.is_some() {
                    log::info!("page {page}: header band found, closing open table");
                }
                decided = true;
                appended = true;
                skipping = false;
                doc.close_open();
                doc.open_table(candidate, page);
                continue;
            }

            if skipping {
                i += 1;
                continue;
            }

            if row.is_fragmentary(cfg.min_columns) {
                if let Some(open) = doc.open.as_mut() {
                    if open.try_wrap(row, cfg) {
                        appended = true;
                    }
                }
                i += 1;
                continue;
            }

            if !data[i] {
                if !decided {
                    held.push(row);
                } else if let Some(open) = doc.open.as_mut() {
                    open.push_row(row, &doc.ctx);
                    appended = true;
                } else if carried_over {
                    // text rows of an abandoned continuation
                    orphans += 1;
                }
                i += 1;
                continue;
            }

            if !decided {
                decided = true;
                let verdict = doc
                    .open
                    .as_ref()
                    .map(|open| stitch::decide(&open.schema, column_count, Some(row), false, cfg));
                match verdict {
                    Some(Continuation::Ambiguous(reason)) => {
                        log::warn!("page {page}: ambiguous continuation: {reason}");
                        doc.abandon_open(page, reason);
                    }
                    Some(_) => log::info!("page {page}: table continues from previous page"),
                    None => {}
                }
                match doc.open.as_mut() {
                    Some(open) => {
                        for text_row in held.drain(..) {
                            open.push_row(text_row, &doc.ctx);
                        }
                    }
                    None if carried_over => orphans += held.drain(..).count(),
                    None => held.clear(),
                }
            }

            match doc.open.as_mut() {
                Some(open) => {
                    open.push_row(row, &doc.ctx);
                    appended = true;
                }
                None => orphans += 1,
            }
            i += 1;
        }

        if !decided && !held.is_empty() {
            let count = held.len();
            let lost = self.settle_held(doc, &mut held, column_count, page, true);
            orphans += lost;
            appended |= lost < count;
        }

        if orphans > 0 {
            doc.report_orphans(page, orphans);
        }

        if carried_over && !appended && doc.open.is_some() {
            log::debug!("page {page}: no table rows, closing open table");
            doc.close_open();
        }
    }

    /// Resolve text rows held at the top of a page that reached its end, or
    /// its first header, without a data row.
    ///
    /// The rows join the open table when the first of them fits its
    /// structure. Otherwise, with `abandon` set, the open table ends as
    /// partial and the rows count as orphans; above a header they are left
    /// as page text. Returns the number of orphaned rows.
    fn settle_held(
        &self,
        doc: &mut Document<'_>,
        held: &mut Vec<&LogicalRow>,
        column_count: usize,
        page: usize,
        abandon: bool,
    ) -> usize {
        let (Some(&first), Some(open)) = (held.first(), doc.open.as_ref()) else {
            held.clear();
            return 0;
        };
        match stitch::decide(&open.schema, column_count, Some(first), false, self.config) {
            Continuation::Ambiguous(reason) if abandon => {
                log::warn!("page {page}: ambiguous continuation: {reason}");
                doc.abandon_open(page, reason);
                held.drain(..).count()
            }
            Continuation::Ambiguous(reason) => {
                log::debug!("page {page}: text rows above the header stay outside the table: {reason}");
                held.clear();
                0
            }
            _ => {
                log::info!("page {page}: table continues from previous page");
                if let Some(open) = doc.open.as_mut() {
                    for row in held.drain(..) {
                        open.push_row(row, &doc.ctx);
                    }
                }
                0
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Per-document state
// ---------------------------------------------------------------------------

/// Values shared by every record of a document.
struct DocContext<'c> {
    plan_number: String,
    extracted_at: DateTime<Utc>,
    config: &'c ExtractionConfig,
}

struct Document<'c> {
    ctx: DocContext<'c>,
    open: Option<TableInstance>,
    finished: Vec<ExtractionOutcome>,
    /// Most recent status keyword anywhere in the document.
    last_status: Option<PlanStatus>,
    /// Status keyword seen since the last table instance opened.
    pending_status: Option<PlanStatus>,
    seen_statuses: HashSet<PlanStatus>,
    /// The last finished instance ended on an ambiguous continuation.
    last_abandoned: bool,
    /// A building-rights section heading has been seen. Tables are only
    /// accepted from here on.
    in_section: bool,
    /// Warnings not tied to any table instance.
    stray: Vec<ExtractionWarning>,
}

impl<'c> Document<'c> {
    fn new(
        plan_number: &str,
        extracted_at: DateTime<Utc>,
        config: &'c ExtractionConfig,
        vocab: &CompiledVocabulary,
    ) -> Self {
        Document {
            ctx: DocContext {
                plan_number: plan_number.to_string(),
                extracted_at,
                config,
            },
            open: None,
            finished: Vec::new(),
            last_status: None,
            pending_status: None,
            seen_statuses: HashSet::new(),
            last_abandoned: false,
            in_section: !vocab.has_section_keywords(),
            stray: Vec::new(),
        }
    }

    fn note_status(&mut self, status: PlanStatus) {
        self.last_status = Some(status);
        self.pending_status = Some(status);
    }

    fn open_table(&mut self, candidate: HeaderCandidate, page: usize) {
        let mut warnings = Vec::new();
        let plan_status = match self.pending_status.take().or(self.last_status) {
            Some(status) => status,
            None => {
                warnings.push(ExtractionWarning {
                    page_number: page,
                    row: None,
                    kind: WarningKind::MissingPlanStatus,
                    message: "no plan-status keyword before the table, assuming proposed".into(),
                });
                PlanStatus::Proposed
            }
        };

        if !self.seen_statuses.insert(plan_status) {
            warnings.push(ExtractionWarning {
                page_number: page,
                row: None,
                kind: WarningKind::DuplicatePlanStatus,
                message: format!(
                    "a second '{plan_status}' table in the same document; row indices restart at 0"
                ),
            });
        }

        log::info!(
            "page {page}: {plan_status} table with {} column(s), {} canonical",
            candidate.schema.len(),
            candidate.schema.canonical_count()
        );

        self.open = Some(TableInstance {
            schema: candidate.schema,
            labels: candidate.labels,
            plan_status,
            records: Vec::new(),
            warnings,
            source_pages: vec![page],
            flagged_rows: 0,
            pending: None,
        });
    }

    fn close_open(&mut self) {
        if let Some(open) = self.open.take() {
            self.finished.push(open.into_outcome(&self.ctx));
            self.last_abandoned = false;
        }
    }

    /// End the open instance on an ambiguous page boundary.
    fn abandon_open(&mut self, page: usize, reason: String) {
        if let Some(mut open) = self.open.take() {
            open.warnings.push(ExtractionWarning {
                page_number: page,
                row: None,
                kind: WarningKind::AmbiguousContinuation,
                message: reason,
            });
            self.finished.push(open.into_outcome(&self.ctx));
            self.last_abandoned = true;
        }
    }

    fn report_orphans(&mut self, page: usize, count: usize) {
        log::warn!("page {page}: {count} row(s) without a table header");
        let warning = ExtractionWarning {
            page_number: page,
            row: None,
            kind: WarningKind::OrphanRows,
            message: format!("{count} row(s) without a table header were not extracted"),
        };
        match self.finished.last_mut() {
            Some(outcome) if self.last_abandoned => outcome.warnings.push(warning),
            _ => self.stray.push(warning),
        }
    }

    fn finish(mut self) -> Vec<ExtractionOutcome> {
        self.close_open();
        if self.finished.is_empty() {
            let mut warnings = self.stray;
            warnings.push(ExtractionWarning {
                page_number: 0,
                row: None,
                kind: WarningKind::HeaderNotFound,
                message: "no building-rights table found".into(),
            });
            log::warn!("{}: no building-rights table found", self.ctx.plan_number);
            return vec![ExtractionOutcome::failed(&self.ctx.plan_number, warnings)];
        }
        self.finished
    }
}

// ---------------------------------------------------------------------------
// Table instance
// ---------------------------------------------------------------------------

/// A data row held back until the next row arrives, so wrapped lines can
/// still be merged into its cells.
struct PendingRow {
    cells: Vec<String>,
    page_number: usize,
    y: f32,
    height: f32,
    covered_columns: usize,
    mismatched: bool,
    low_confidence: bool,
}

struct TableInstance {
    schema: ColumnSchema,
    labels: Vec<String>,
    plan_status: PlanStatus,
    records: Vec<BuildingRightsRecord>,
    warnings: Vec<ExtractionWarning>,
    source_pages: Vec<usize>,
    flagged_rows: usize,
    pending: Option<PendingRow>,
}

impl TableInstance {
    fn push_row(&mut self, row: &LogicalRow, ctx: &DocContext<'_>) {
        self.flush(ctx);
        if self.source_pages.last() != Some(&row.page_number) {
            self.source_pages.push(row.page_number);
        }
        self.pending = Some(PendingRow {
            cells: row.column_texts(self.schema.len()),
            page_number: row.page_number,
            y: row.y,
            height: row.height,
            covered_columns: row.covered_columns,
            mismatched: row.mismatched,
            low_confidence: row.low_confidence,
        });
    }

    /// Merge a short row into the pending row when it sits directly below
    /// it and carries no numbers of its own.
    fn try_wrap(&mut self, row: &LogicalRow, config: &ExtractionConfig) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        if pending.page_number != row.page_number
            || row.y - pending.y > config.wrap_gap_factor * pending.height.max(1.0)
            || row.cells.iter().any(|c| looks_numeric(&c.text, config))
        {
            return false;
        }

        for cell in &row.cells {
            if let Some(slot) = pending.cells.get_mut(cell.col) {
                if !slot.is_empty() {
                    slot.push(' ');
                }
                slot.push_str(&cell.text);
            }
        }
        pending.y = row.y;
        true
    }

    fn flush(&mut self, ctx: &DocContext<'_>) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if is_blank_row(&pending.cells) {
            return;
        }

        let row_index = self.records.len();
        let assembled = assemble_row(
            &RowContext {
                plan_number: &ctx.plan_number,
                plan_status: self.plan_status,
                row_index,
                extracted_at: ctx.extracted_at,
            },
            &self.schema,
            &pending.cells,
            ctx.config,
        );

        let mut flagged = false;
        if pending.mismatched {
            flagged = true;
            self.warnings.push(ExtractionWarning {
                page_number: pending.page_number,
                row: Some(row_index),
                kind: WarningKind::CellCountMismatch,
                message: format!(
                    "row covers {} of {} columns",
                    pending.covered_columns,
                    self.schema.len()
                ),
            });
        }
        if pending.low_confidence {
            flagged = true;
            self.warnings.push(ExtractionWarning {
                page_number: pending.page_number,
                row: Some(row_index),
                kind: WarningKind::LowConfidenceDirection,
                message: "reading order of mixed-script text is uncertain".into(),
            });
        }
        for issue in &assembled.issues {
            flagged = true;
            self.warnings.push(ExtractionWarning {
                page_number: pending.page_number,
                row: Some(row_index),
                kind: WarningKind::CellParse,
                message: format!("{}: {}", issue.key, issue.error),
            });
        }
        if flagged {
            self.flagged_rows += 1;
        }

        self.records.push(assembled.record);
    }

    fn into_outcome(mut self, ctx: &DocContext<'_>) -> ExtractionOutcome {
        self.flush(ctx);

        let status = if self.warnings.is_empty() {
            OutcomeStatus::Complete
        } else {
            OutcomeStatus::Partial
        };
        let flagged_share = self.flagged_rows as f32 / self.records.len().max(1) as f32;
        let confidence = match status {
            OutcomeStatus::Complete => Confidence::High,
            _ if flagged_share <= MEDIUM_CONFIDENCE_FLAGGED => Confidence::Medium,
            _ => Confidence::Low,
        };

        log::info!(
            "{} ({}): {} row(s) from page(s) {:?}, {status}",
            ctx.plan_number,
            self.plan_status,
            self.records.len(),
            self.source_pages
        );

        let column_map = self
            .schema
            .columns()
            .iter()
            .enumerate()
            .map(|(i, c)| (i, c.key.name().to_string()))
            .collect();

        ExtractionOutcome {
            plan_number: ctx.plan_number.clone(),
            plan_status: Some(self.plan_status),
            status,
            confidence,
            records: self.records,
            warnings: self.warnings,
            source_pages: self.source_pages,
            raw_headers: self.labels,
            column_map,
        }
    }
}
