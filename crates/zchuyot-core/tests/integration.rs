//! Integration tests for the extract_pdf() / run_plan() pipeline.
//!
//! Uses a MockExtractor that returns pre-built PageContent without
//! invoking pdftotext, so these tests run without poppler-utils.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use zchuyot_core::config::ExtractionConfig;
use zchuyot_core::error::RightsError;
use zchuyot_core::extraction::{BBox, PageContent, PdfExtractor, RawFragment};
use zchuyot_core::model::{
    Confidence, ExtractionOutcome, ExtractionState, OutcomeStatus, PlanStatus, WarningKind,
};
use zchuyot_core::orchestrator::Orchestrator;
use zchuyot_core::store::{DocumentSource, MemoryStore, RightsStore};
use zchuyot_core::vocab::builtin::default_vocabulary;
use zchuyot_core::{extract_pages, extract_pdf, run_plan};

struct MockExtractor {
    pages: Vec<PageContent>,
}

impl PdfExtractor for MockExtractor {
    fn extract_pages(&self, _pdf_bytes: &[u8]) -> Result<Vec<PageContent>, RightsError> {
        Ok(self.pages.clone())
    }

    fn backend_name(&self) -> &str {
        "mock"
    }
}

enum MockSource {
    Pdf,
    Timeout,
}

impl DocumentSource for MockSource {
    fn fetch(&self, plan_number: &str) -> Result<Vec<u8>, RightsError> {
        match self {
            MockSource::Pdf => Ok(b"%PDF-1.4".to_vec()),
            MockSource::Timeout => Err(RightsError::SourceTimeout {
                plan_number: plan_number.to_string(),
            }),
        }
    }
}

const PLAN: &str = "101-0909267";

/// Column x-ranges in points, rightmost (column 0) first.
const COLS: [(f32, f32); 8] = [
    (520.0, 580.0),
    (460.0, 510.0),
    (400.0, 450.0),
    (340.0, 390.0),
    (280.0, 330.0),
    (220.0, 270.0),
    (160.0, 210.0),
    (100.0, 150.0),
];

const ROWS: [[&str; 8]; 5] = [
    ["מגורים א'", "1", "1,200", "500", "60", "24", "4", "ללא"],
    ["מגורים ב'", "2", "850", "-", "55", "0", "3", "ראה נספח"],
    ["מסחר", "3", "19,183", "אין", "45", "-", "2", "חזית מסחרית"],
    ["ציבורי", "4", "2,400", "1,000", "50", "-", "3", "מבני ציבור"],
    ["דרך", "5", "730", "-", "-", "-", "-", "קיימת"],
];

fn frag(text: &str, x_min: f32, x_max: f32, y: f32) -> RawFragment {
    RawFragment {
        text: text.to_string(),
        bbox: BBox {
            x_min,
            y_min: y,
            x_max,
            y_max: y + 10.0,
        },
        page_index: 0,
        font_size: Some(10.0),
    }
}

fn cell(text: &str, col: usize, y: f32) -> RawFragment {
    frag(text, COLS[col].0 + 2.0, COLS[col].1 - 2.0, y)
}

fn data_row(values: &[&str; 8], y: f32) -> Vec<RawFragment> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| !v.is_empty())
        .map(|(col, v)| cell(v, col, y))
        .collect()
}

fn title(text: &str, y: f32) -> Vec<RawFragment> {
    vec![frag(text, 200.0, 560.0, y)]
}

/// Two-row header: "גודל מגרש" spans columns 2-3 over "מוחלט" / "מזערי".
fn header_band(y: f32) -> Vec<RawFragment> {
    vec![
        cell("יעוד", 0, y),
        cell("תאי שטח", 1, y),
        frag("גודל מגרש", COLS[3].0 + 5.0, COLS[2].1 - 5.0, y),
        cell("תכסית", 4, y),
        cell("מספר יח\"ד", 5, y),
        cell("מספר קומות", 6, y),
        cell("הערות", 7, y),
        cell("מוחלט", 2, y + 15.0),
        cell("מזערי", 3, y + 15.0),
        cell("מעל הכניסה הקובעת", 6, y + 15.0),
    ]
}

/// Title, header band and the given data rows, 20pt apart.
fn table(status_title: Option<&str>, rows: &[[&str; 8]], top: f32) -> Vec<RawFragment> {
    let mut fragments = Vec::new();
    if let Some(t) = status_title {
        fragments.extend(title(t, top));
    }
    fragments.extend(header_band(top + 30.0));
    for (i, row) in rows.iter().enumerate() {
        fragments.extend(data_row(row, top + 70.0 + 20.0 * i as f32));
    }
    fragments
}

fn page(number: usize, fragments: Vec<RawFragment>) -> PageContent {
    PageContent {
        page_number: number,
        width: 595.0,
        height: 842.0,
        fragments,
    }
}

fn extract(pages: Vec<PageContent>) -> Vec<ExtractionOutcome> {
    let cfg = ExtractionConfig::default();
    let vocab = default_vocabulary().unwrap();
    extract_pdf(&[], PLAN, &MockExtractor { pages }, &cfg, &vocab).unwrap()
}

const PROPOSED_TITLE: &str = "טבלת זכויות והוראות בנייה - מצב מוצע";
const APPROVED_TITLE: &str = "טבלת זכויות והוראות בנייה - מצב מאושר";

// ---------------------------------------------------------------------------
// Test 1: One page, two-row header, three data rows
// ---------------------------------------------------------------------------
#[test]
fn clean_single_page_table_is_complete() {
    let outcomes = extract(vec![page(1, table(Some(PROPOSED_TITLE), &ROWS[..3], 60.0))]);

    assert_eq!(outcomes.len(), 1);
    let o = &outcomes[0];
    assert_eq!(o.status, OutcomeStatus::Complete, "{:?}", o.warnings);
    assert_eq!(o.confidence, Confidence::High);
    assert_eq!(o.plan_status, Some(PlanStatus::Proposed));
    assert!(!o.needs_review());
    assert_eq!(
        o.records.iter().map(|r| r.row_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert_eq!(o.source_pages, vec![1]);
    assert_eq!(o.raw_headers[2], "גודל מגרש מוחלט");
    assert_eq!(o.raw_headers[6], "מספר קומות מעל הכניסה הקובעת");

    let first = &o.records[0];
    assert_eq!(first.plan_number, PLAN);
    assert_eq!(first.designation.as_deref(), Some("מגורים א'"));
    assert_eq!(first.area_condition.as_deref(), Some("1"));
    assert_eq!(first.plot_size_absolute, Some(dec!(1200)));
    assert_eq!(first.plot_size_minimum, Some(dec!(500)));
    assert_eq!(first.coverage_pct, Some(dec!(60)));
    assert_eq!(first.housing_units, Some(24));
    assert_eq!(first.floors_above, Some(4));

    assert_eq!(o.records[2].plot_size_absolute, Some(dec!(19183)));
}

// ---------------------------------------------------------------------------
// Test 2: No text layer
// ---------------------------------------------------------------------------
#[test]
fn document_without_text_layer_fails() {
    let outcomes = extract(vec![page(1, vec![]), page(2, vec![])]);

    assert_eq!(outcomes.len(), 1);
    let o = &outcomes[0];
    assert_eq!(o.status, OutcomeStatus::Failed);
    assert_eq!(o.plan_status, None);
    assert!(o.records.is_empty());
    assert!(o.warnings.iter().any(|w| w.kind == WarningKind::EmptyPage));
}

// ---------------------------------------------------------------------------
// Test 3: Table continues across a page break without a repeated header
// ---------------------------------------------------------------------------
#[test]
fn continuation_carries_row_index() {
    let first = page(1, table(Some(PROPOSED_TITLE), &ROWS, 60.0));
    let second = page(
        2,
        ROWS[..3]
            .iter()
            .enumerate()
            .flat_map(|(i, row)| data_row(row, 60.0 + 20.0 * i as f32))
            .collect(),
    );
    let outcomes = extract(vec![first, second]);

    assert_eq!(outcomes.len(), 1);
    let o = &outcomes[0];
    assert_eq!(o.status, OutcomeStatus::Complete, "{:?}", o.warnings);
    assert_eq!(
        o.records.iter().map(|r| r.row_index).collect::<Vec<_>>(),
        (0..8).collect::<Vec<_>>()
    );
    assert_eq!(o.source_pages, vec![1, 2]);
    assert_eq!(o.records[5].designation.as_deref(), Some("מגורים א'"));
}

// ---------------------------------------------------------------------------
// Test 4: A second header band starts a new instance and re-reads the status
// ---------------------------------------------------------------------------
#[test]
fn header_redetection_resets_row_index() {
    let mut fragments = table(Some(PROPOSED_TITLE), &ROWS[..2], 60.0);
    fragments.extend(table(Some(APPROVED_TITLE), &ROWS[2..4], 200.0));
    let outcomes = extract(vec![page(1, fragments)]);

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].plan_status, Some(PlanStatus::Proposed));
    assert_eq!(outcomes[1].plan_status, Some(PlanStatus::Approved));
    for o in &outcomes {
        assert_eq!(o.status, OutcomeStatus::Complete, "{:?}", o.warnings);
        assert_eq!(
            o.records.iter().map(|r| r.row_index).collect::<Vec<_>>(),
            vec![0, 1]
        );
    }
    assert_eq!(outcomes[1].records[0].designation.as_deref(), Some("מסחר"));
}

// ---------------------------------------------------------------------------
// Test 5: Same status twice is kept but flagged
// ---------------------------------------------------------------------------
#[test]
fn repeated_status_is_flagged_for_review() {
    let mut fragments = table(Some(PROPOSED_TITLE), &ROWS[..2], 60.0);
    fragments.extend(table(None, &ROWS[2..4], 200.0));
    let outcomes = extract(vec![page(1, fragments)]);

    assert_eq!(outcomes.len(), 2);
    let second = &outcomes[1];
    assert_eq!(second.plan_status, Some(PlanStatus::Proposed));
    assert_eq!(second.status, OutcomeStatus::Partial);
    assert!(second
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::DuplicatePlanStatus));
    assert_eq!(second.records[0].row_index, 0);
}

// ---------------------------------------------------------------------------
// Test 6: Natural keys are unique across all outcomes of a document
// ---------------------------------------------------------------------------
#[test]
fn natural_keys_are_unique() {
    let mut fragments = table(Some(PROPOSED_TITLE), &ROWS, 60.0);
    fragments.extend(table(Some(APPROVED_TITLE), &ROWS[..3], 260.0));
    let outcomes = extract(vec![page(1, fragments)]);

    let keys: Vec<_> = outcomes
        .iter()
        .flat_map(|o| o.records.iter().map(|r| r.key()))
        .collect();
    let unique: HashSet<_> = keys.iter().collect();
    assert_eq!(keys.len(), 8);
    assert_eq!(unique.len(), keys.len());
}

// ---------------------------------------------------------------------------
// Test 7: Mixed-script cell reads in logical order
// ---------------------------------------------------------------------------
#[test]
fn rtl_cell_with_number_reads_logically() {
    let mut fragments = table(Some(PROPOSED_TITLE), &ROWS[1..3], 60.0);
    let mut first = ROWS[0];
    first[7] = "";
    fragments.extend(data_row(&first, 170.0));
    fragments.push(frag("15", 102.0, 110.0, 170.0));
    fragments.push(frag("קומות", 113.0, 130.0, 170.0));
    fragments.push(frag("מספר", 133.0, 148.0, 170.0));

    let outcomes = extract(vec![page(1, fragments)]);
    let record = &outcomes[0].records[2];
    assert_eq!(
        record.extra_data.get("הערות").map(String::as_str),
        Some("מספר קומות 15")
    );
}

// ---------------------------------------------------------------------------
// Test 8: Placeholders are null, a literal zero stays zero
// ---------------------------------------------------------------------------
#[test]
fn placeholder_is_null_and_zero_is_zero() {
    let outcomes = extract(vec![page(1, table(Some(PROPOSED_TITLE), &ROWS[..3], 60.0))]);
    let second = &outcomes[0].records[1];
    assert_eq!(second.plot_size_minimum, None);
    assert_eq!(second.housing_units, Some(0));

    let third = &outcomes[0].records[2];
    assert_eq!(third.plot_size_minimum, None);
    assert_eq!(third.housing_units, None);
}

// ---------------------------------------------------------------------------
// Test 9: Unmapped columns are carried into extra_data for every row
// ---------------------------------------------------------------------------
#[test]
fn unmapped_column_is_kept_in_extra_data() {
    let outcomes = extract(vec![page(1, table(Some(PROPOSED_TITLE), &ROWS, 60.0))]);
    let o = &outcomes[0];

    assert_eq!(o.column_map.get(&7).map(String::as_str), Some("הערות"));
    for (record, row) in o.records.iter().zip(ROWS.iter()) {
        assert_eq!(
            record.extra_data.get("הערות").map(String::as_str),
            Some(row[7])
        );
    }
}

// ---------------------------------------------------------------------------
// Test 10: A row with a missing cell is emitted but flags the table
// ---------------------------------------------------------------------------
#[test]
fn missing_cell_marks_table_partial() {
    let mut rows = ROWS;
    rows[4][7] = "";
    let outcomes = extract(vec![page(1, table(Some(PROPOSED_TITLE), &rows, 60.0))]);
    let o = &outcomes[0];

    assert_eq!(o.status, OutcomeStatus::Partial);
    assert_eq!(o.confidence, Confidence::Medium);
    assert_eq!(o.records.len(), 5);
    let warning = o
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::CellCountMismatch)
        .unwrap();
    assert_eq!(warning.row, Some(4));
    assert_eq!(
        o.records[4].extra_data.get("הערות").map(String::as_str),
        Some("")
    );
}

// ---------------------------------------------------------------------------
// Test 11: Re-running is idempotent apart from the timestamp
// ---------------------------------------------------------------------------
#[test]
fn extraction_is_idempotent() {
    let cfg = ExtractionConfig::default();
    let vocab = default_vocabulary().unwrap();
    let pages = vec![page(1, table(Some(PROPOSED_TITLE), &ROWS, 60.0))];
    let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

    let orchestrator = Orchestrator::new(&cfg, &vocab);
    let a = serde_json::to_value(orchestrator.run_at(PLAN, &pages, at)).unwrap();
    let b = serde_json::to_value(orchestrator.run_at(PLAN, &pages, at)).unwrap();
    assert_eq!(a, b);

    let first = extract_pages(PLAN, &pages, &cfg, &vocab);
    let second = extract_pages(PLAN, &pages, &cfg, &vocab);
    for (x, y) in first[0].records.iter().zip(&second[0].records) {
        let mut y = y.clone();
        y.extracted_at = x.extracted_at;
        assert_eq!(x, &y);
    }
}

// ---------------------------------------------------------------------------
// Test 12: run_plan writes rows and records state
// ---------------------------------------------------------------------------
#[test]
fn run_plan_stores_rows() {
    let cfg = ExtractionConfig::default();
    let vocab = default_vocabulary().unwrap();
    let extractor = MockExtractor {
        pages: vec![page(1, table(Some(APPROVED_TITLE), &ROWS[..3], 60.0))],
    };
    let mut store = MemoryStore::new();

    let result = run_plan(PLAN, &MockSource::Pdf, &extractor, &mut store, &cfg, &vocab);
    assert_eq!(result.state, ExtractionState::Complete);
    assert_eq!(result.rows_written, 3);
    assert!(result.error.is_none());

    assert_eq!(store.state(PLAN).unwrap(), ExtractionState::Complete);
    let rows = store.rows_for_plan(PLAN).unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.plan_status == PlanStatus::Approved));

    // a second run replaces rather than duplicates
    run_plan(PLAN, &MockSource::Pdf, &extractor, &mut store, &cfg, &vocab);
    assert_eq!(store.rows_for_plan(PLAN).unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Test 13: Source timeout marks the plan failed without retrying
// ---------------------------------------------------------------------------
#[test]
fn run_plan_timeout_is_failed() {
    let cfg = ExtractionConfig::default();
    let vocab = default_vocabulary().unwrap();
    let extractor = MockExtractor { pages: vec![] };
    let mut store = MemoryStore::new();

    let result = run_plan(PLAN, &MockSource::Timeout, &extractor, &mut store, &cfg, &vocab);
    assert_eq!(result.state, ExtractionState::Failed);
    assert!(result.error.unwrap().contains("timed out"));
    assert_eq!(store.state(PLAN).unwrap(), ExtractionState::Failed);
    assert!(store.is_empty());
}

// ---------------------------------------------------------------------------
// Test 14: A document without any table marks the plan failed
// ---------------------------------------------------------------------------
#[test]
fn run_plan_without_table_is_failed() {
    let cfg = ExtractionConfig::default();
    let vocab = default_vocabulary().unwrap();
    let extractor = MockExtractor {
        pages: vec![page(1, title("הוראות התכנית", 60.0))],
    };
    let mut store = MemoryStore::new();

    let result = run_plan(PLAN, &MockSource::Pdf, &extractor, &mut store, &cfg, &vocab);
    assert_eq!(result.state, ExtractionState::Failed);
    assert_eq!(result.rows_written, 0);
    assert!(store.error(PLAN).is_some());
}

// ---------------------------------------------------------------------------
// Test 15: An unparseable canonical cell keeps its row and flags the table
// ---------------------------------------------------------------------------
#[test]
fn unparseable_cell_is_kept_as_invalid() {
    let mut rows = [ROWS[0], ROWS[1], ROWS[2]];
    rows[0][4] = "שישים";
    let outcomes = extract(vec![page(1, table(Some(PROPOSED_TITLE), &rows, 60.0))]);
    let o = &outcomes[0];

    assert_eq!(o.status, OutcomeStatus::Partial);
    assert_eq!(o.records.len(), 3);
    let first = &o.records[0];
    assert_eq!(first.coverage_pct, None);
    assert_eq!(
        first.extra_data.get("coverage_pct__invalid").map(String::as_str),
        Some("שישים")
    );
    assert_eq!(first.housing_units, Some(24));
    assert_eq!(o.records[1].coverage_pct, Some(dec!(55)));

    let warning = o
        .warnings
        .iter()
        .find(|w| w.kind == WarningKind::CellParse)
        .unwrap();
    assert_eq!(warning.row, Some(0));
    assert_eq!(warning.page_number, 1);
    assert!(warning.message.starts_with("coverage_pct"));
}

// ---------------------------------------------------------------------------
// Test 16: A three-row stacked header merges into one label per column
// ---------------------------------------------------------------------------
#[test]
fn three_level_header_merges_top_down() {
    let top = 60.0;
    let mut fragments = title(PROPOSED_TITLE, top);
    fragments.extend([
        cell("יעוד", 0, top + 30.0),
        cell("תאי שטח", 1, top + 30.0),
        frag("שטחי בנייה (מ\"ר)", COLS[5].0 + 5.0, COLS[2].1 - 5.0, top + 30.0),
        cell("תכסית", 6, top + 30.0),
        cell("הערות", 7, top + 30.0),
        frag("מעל הכניסה הקובעת", COLS[3].0 + 5.0, COLS[2].1 - 5.0, top + 45.0),
        frag("מתחת לכניסה הקובעת", COLS[5].0 + 5.0, COLS[4].1 - 5.0, top + 45.0),
        cell("עיקרי", 2, top + 60.0),
        cell("שרות", 3, top + 60.0),
        cell("עיקרי", 4, top + 60.0),
        cell("שרות", 5, top + 60.0),
    ]);
    let values = [
        ["מגורים א'", "1", "400", "120", "80", "40", "50", "ללא"],
        ["מסחר", "2", "650", "90", "-", "-", "45", "חזית"],
        ["ציבורי", "3", "300", "60", "100", "20", "40", "ללא"],
    ];
    for (i, row) in values.iter().enumerate() {
        fragments.extend(data_row(row, top + 90.0 + 20.0 * i as f32));
    }
    let outcomes = extract(vec![page(1, fragments)]);

    assert_eq!(outcomes.len(), 1);
    let o = &outcomes[0];
    assert_eq!(o.status, OutcomeStatus::Complete, "{:?}", o.warnings);
    assert_eq!(o.raw_headers[2], "שטחי בנייה (מ\"ר) מעל הכניסה הקובעת עיקרי");
    assert_eq!(o.raw_headers[5], "שטחי בנייה (מ\"ר) מתחת לכניסה הקובעת שרות");
    assert_eq!(
        (2..6)
            .map(|i| o.column_map[&i].as_str())
            .collect::<Vec<_>>(),
        vec![
            "building_area_above",
            "building_area_above_service",
            "building_area_below",
            "building_area_below_service",
        ]
    );
    assert_eq!(o.records[0].building_area_above, Some(dec!(400)));
    assert_eq!(o.records[0].building_area_below_service, Some(dec!(40)));
    assert_eq!(o.records[1].building_area_below, None);
}

// ---------------------------------------------------------------------------
// Test 17: A value reaching into its neighbour stays in its own column
// ---------------------------------------------------------------------------
#[test]
fn straddling_value_keeps_column_grid() {
    let mut fragments = table(Some(PROPOSED_TITLE), &ROWS[..3], 60.0);
    let y = 190.0;
    let mut row = ROWS[3];
    row[1] = "";
    row[2] = "";
    fragments.extend(data_row(&row, y));
    // right-aligned "4" and a wide "12,500" that runs under it
    fragments.push(frag("4", COLS[1].1 - 12.0, COLS[1].1 - 2.0, y));
    fragments.push(frag("12,500", COLS[2].0 + 4.0, COLS[1].0 + 28.0, y));
    let outcomes = extract(vec![page(1, fragments)]);

    let o = &outcomes[0];
    assert_eq!(o.column_map.len(), 8);
    assert_eq!(o.status, OutcomeStatus::Complete, "{:?}", o.warnings);
    let straddling = &o.records[3];
    assert_eq!(straddling.area_condition.as_deref(), Some("4"));
    assert_eq!(straddling.plot_size_absolute, Some(dec!(12500)));
    assert_eq!(straddling.plot_size_minimum, Some(dec!(1000)));
    assert_eq!(
        straddling.extra_data.get("הערות").map(String::as_str),
        Some("מבני ציבור")
    );
}

// ---------------------------------------------------------------------------
// Test 18: A text row at the top of a continuation page joins the table
// ---------------------------------------------------------------------------
#[test]
fn leading_text_row_on_continuation_page_is_kept() {
    let first = page(1, table(Some(PROPOSED_TITLE), &ROWS[..2], 60.0));
    let text_row = [
        "שטח ציבורי פתוח",
        "ראה",
        "נספח",
        "בינוי",
        "לפי",
        "תכנית",
        "בינוי",
        "גינה ציבורית",
    ];
    let mut fragments = data_row(&text_row, 60.0);
    fragments.extend(data_row(&ROWS[2], 80.0));
    fragments.extend(data_row(&ROWS[3], 100.0));
    let outcomes = extract(vec![first, page(2, fragments)]);

    assert_eq!(outcomes.len(), 1);
    let o = &outcomes[0];
    assert_eq!(o.records.len(), 5);
    assert_eq!(o.source_pages, vec![1, 2]);
    assert_eq!(
        o.records.iter().map(|r| r.row_index).collect::<Vec<_>>(),
        (0..5).collect::<Vec<_>>()
    );
    assert_eq!(o.records[2].designation.as_deref(), Some("שטח ציבורי פתוח"));
    assert_eq!(o.records[3].designation.as_deref(), Some("מסחר"));
    assert_eq!(o.status, OutcomeStatus::Partial);
    assert!(o
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::CellParse && w.row == Some(2)));
    assert!(!o.warnings.iter().any(|w| w.kind == WarningKind::OrphanRows));
}
