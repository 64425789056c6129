use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Whether a building-rights table describes the proposed or approved plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Proposed,
    Approved,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanStatus::Proposed => write!(f, "proposed"),
            PlanStatus::Approved => write!(f, "approved"),
        }
    }
}

/// Declared type of a column's cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Number,
    Percent,
    Integer,
    Text,
}

impl SemanticType {
    pub fn is_numeric(self) -> bool {
        !matches!(self, SemanticType::Text)
    }
}

/// Fields of [`BuildingRightsRecord`] that a header can map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Designation,
    UseType,
    AreaCondition,
    PlotSizeAbsolute,
    PlotSizeMinimum,
    BuildingAreaAbove,
    BuildingAreaAboveService,
    BuildingAreaBelow,
    BuildingAreaBelowService,
    BuildingAreaTotal,
    CoveragePct,
    HousingUnits,
    BuildingHeight,
    FloorsAbove,
    FloorsBelow,
    SetbackRear,
    SetbackFront,
    SetbackSide,
    BalconyArea,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 19] = [
        CanonicalField::Designation,
        CanonicalField::UseType,
        CanonicalField::AreaCondition,
        CanonicalField::PlotSizeAbsolute,
        CanonicalField::PlotSizeMinimum,
        CanonicalField::BuildingAreaAbove,
        CanonicalField::BuildingAreaAboveService,
        CanonicalField::BuildingAreaBelow,
        CanonicalField::BuildingAreaBelowService,
        CanonicalField::BuildingAreaTotal,
        CanonicalField::CoveragePct,
        CanonicalField::HousingUnits,
        CanonicalField::BuildingHeight,
        CanonicalField::FloorsAbove,
        CanonicalField::FloorsBelow,
        CanonicalField::SetbackRear,
        CanonicalField::SetbackFront,
        CanonicalField::SetbackSide,
        CanonicalField::BalconyArea,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CanonicalField::Designation => "designation",
            CanonicalField::UseType => "use_type",
            CanonicalField::AreaCondition => "area_condition",
            CanonicalField::PlotSizeAbsolute => "plot_size_absolute",
            CanonicalField::PlotSizeMinimum => "plot_size_minimum",
            CanonicalField::BuildingAreaAbove => "building_area_above",
            CanonicalField::BuildingAreaAboveService => "building_area_above_service",
            CanonicalField::BuildingAreaBelow => "building_area_below",
            CanonicalField::BuildingAreaBelowService => "building_area_below_service",
            CanonicalField::BuildingAreaTotal => "building_area_total",
            CanonicalField::CoveragePct => "coverage_pct",
            CanonicalField::HousingUnits => "housing_units",
            CanonicalField::BuildingHeight => "building_height",
            CanonicalField::FloorsAbove => "floors_above",
            CanonicalField::FloorsBelow => "floors_below",
            CanonicalField::SetbackRear => "setback_rear",
            CanonicalField::SetbackFront => "setback_front",
            CanonicalField::SetbackSide => "setback_side",
            CanonicalField::BalconyArea => "balcony_area",
        }
    }

    pub fn semantic_type(self) -> SemanticType {
        match self {
            CanonicalField::Designation
            | CanonicalField::UseType
            | CanonicalField::AreaCondition => SemanticType::Text,
            CanonicalField::CoveragePct => SemanticType::Percent,
            CanonicalField::HousingUnits
            | CanonicalField::FloorsAbove
            | CanonicalField::FloorsBelow => SemanticType::Integer,
            _ => SemanticType::Number,
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one column in a [`ColumnSchema`].
///
/// Headers that match the vocabulary become `Canonical`; anything else is
/// kept verbatim as a `Dynamic` key and routed into `extra_data`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKey {
    Canonical(CanonicalField),
    Dynamic(String),
}

impl ColumnKey {
    pub fn name(&self) -> &str {
        match self {
            ColumnKey::Canonical(field) => field.as_str(),
            ColumnKey::Dynamic(label) => label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub key: ColumnKey,
    pub semantic_type: SemanticType,
    /// Merged header label as read from the header band.
    pub label: String,
    /// Vocabulary variants that map onto this key (empty for dynamic keys).
    pub variants: Vec<String>,
}

/// Ordered column identities of one table instance. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    columns: Vec<ColumnDef>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        ColumnSchema { columns }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Ordered key names, used to compare table structures across pages.
    pub fn signature(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.key.name().to_string()).collect()
    }

    pub fn canonical_count(&self) -> usize {
        self.columns
            .iter()
            .filter(|c| matches!(c.key, ColumnKey::Canonical(_)))
            .count()
    }
}

/// A typed cell value produced by the cell normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellValue {
    Number(Decimal),
    Integer(i64),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(v) => write!(f, "{v}"),
            CellValue::Integer(v) => write!(f, "{v}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

/// One building-rights row of a plan's table, the unit handed to storage.
///
/// `(plan_number, plan_status, row_index)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingRightsRecord {
    pub plan_number: String,
    pub plan_status: PlanStatus,
    pub row_index: usize,
    pub designation: Option<String>,
    pub use_type: Option<String>,
    pub area_condition: Option<String>,
    pub plot_size_absolute: Option<Decimal>,
    pub plot_size_minimum: Option<Decimal>,
    pub building_area_above: Option<Decimal>,
    pub building_area_above_service: Option<Decimal>,
    pub building_area_below: Option<Decimal>,
    pub building_area_below_service: Option<Decimal>,
    pub building_area_total: Option<Decimal>,
    pub coverage_pct: Option<Decimal>,
    pub housing_units: Option<i64>,
    pub building_height: Option<Decimal>,
    pub floors_above: Option<i64>,
    pub floors_below: Option<i64>,
    pub setback_rear: Option<Decimal>,
    pub setback_front: Option<Decimal>,
    pub setback_side: Option<Decimal>,
    pub balcony_area: Option<Decimal>,
    /// Unmapped columns (raw header label -> raw cell text) and
    /// error-tagged raw values of cells that failed their type.
    pub extra_data: BTreeMap<String, String>,
    pub extracted_at: DateTime<Utc>,
}

impl BuildingRightsRecord {
    pub fn new(
        plan_number: &str,
        plan_status: PlanStatus,
        row_index: usize,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        BuildingRightsRecord {
            plan_number: plan_number.to_string(),
            plan_status,
            row_index,
            designation: None,
            use_type: None,
            area_condition: None,
            plot_size_absolute: None,
            plot_size_minimum: None,
            building_area_above: None,
            building_area_above_service: None,
            building_area_below: None,
            building_area_below_service: None,
            building_area_total: None,
            coverage_pct: None,
            housing_units: None,
            building_height: None,
            floors_above: None,
            floors_below: None,
            setback_rear: None,
            setback_front: None,
            setback_side: None,
            balcony_area: None,
            extra_data: BTreeMap::new(),
            extracted_at,
        }
    }

    pub fn key(&self) -> (&str, PlanStatus, usize) {
        (&self.plan_number, self.plan_status, self.row_index)
    }

    /// Store a typed value into the field it belongs to.
    ///
    /// Returns false when the value's type does not fit the field, in which
    /// case the record is left untouched.
    pub fn set(&mut self, field: CanonicalField, value: CellValue) -> bool {
        match (field.semantic_type(), value) {
            (SemanticType::Text, CellValue::Text(s)) => {
                *self.text_slot(field) = Some(s);
                true
            }
            (SemanticType::Integer, CellValue::Integer(n)) => {
                *self.integer_slot(field) = Some(n);
                true
            }
            (SemanticType::Number | SemanticType::Percent, CellValue::Number(d)) => {
                *self.decimal_slot(field) = Some(d);
                true
            }
            _ => false,
        }
    }

    /// Current value of a field, for display.
    pub fn get(&self, field: CanonicalField) -> Option<CellValue> {
        match field.semantic_type() {
            SemanticType::Text => self.text_ref(field).clone().map(CellValue::Text),
            SemanticType::Integer => self.integer_ref(field).map(CellValue::Integer),
            SemanticType::Number | SemanticType::Percent => {
                self.decimal_ref(field).map(CellValue::Number)
            }
        }
    }

    fn text_slot(&mut self, field: CanonicalField) -> &mut Option<String> {
        match field {
            CanonicalField::UseType => &mut self.use_type,
            CanonicalField::AreaCondition => &mut self.area_condition,
            _ => &mut self.designation,
        }
    }

    fn text_ref(&self, field: CanonicalField) -> &Option<String> {
        match field {
            CanonicalField::UseType => &self.use_type,
            CanonicalField::AreaCondition => &self.area_condition,
            _ => &self.designation,
        }
    }

    fn integer_slot(&mut self, field: CanonicalField) -> &mut Option<i64> {
        match field {
            CanonicalField::FloorsAbove => &mut self.floors_above,
            CanonicalField::FloorsBelow => &mut self.floors_below,
            _ => &mut self.housing_units,
        }
    }

    fn integer_ref(&self, field: CanonicalField) -> Option<i64> {
        match field {
            CanonicalField::FloorsAbove => self.floors_above,
            CanonicalField::FloorsBelow => self.floors_below,
            _ => self.housing_units,
        }
    }

    fn decimal_slot(&mut self, field: CanonicalField) -> &mut Option<Decimal> {
        match field {
            CanonicalField::PlotSizeMinimum => &mut self.plot_size_minimum,
            CanonicalField::BuildingAreaAbove => &mut self.building_area_above,
            CanonicalField::BuildingAreaAboveService => &mut self.building_area_above_service,
            CanonicalField::BuildingAreaBelow => &mut self.building_area_below,
            CanonicalField::BuildingAreaBelowService => &mut self.building_area_below_service,
            CanonicalField::BuildingAreaTotal => &mut self.building_area_total,
            CanonicalField::CoveragePct => &mut self.coverage_pct,
            CanonicalField::BuildingHeight => &mut self.building_height,
            CanonicalField::SetbackRear => &mut self.setback_rear,
            CanonicalField::SetbackFront => &mut self.setback_front,
            CanonicalField::SetbackSide => &mut self.setback_side,
            CanonicalField::BalconyArea => &mut self.balcony_area,
            _ => &mut self.plot_size_absolute,
        }
    }

    fn decimal_ref(&self, field: CanonicalField) -> Option<Decimal> {
        match field {
            CanonicalField::PlotSizeMinimum => self.plot_size_minimum,
            CanonicalField::BuildingAreaAbove => self.building_area_above,
            CanonicalField::BuildingAreaAboveService => self.building_area_above_service,
            CanonicalField::BuildingAreaBelow => self.building_area_below,
            CanonicalField::BuildingAreaBelowService => self.building_area_below_service,
            CanonicalField::BuildingAreaTotal => self.building_area_total,
            CanonicalField::CoveragePct => self.coverage_pct,
            CanonicalField::BuildingHeight => self.building_height,
            CanonicalField::SetbackRear => self.setback_rear,
            CanonicalField::SetbackFront => self.setback_front,
            CanonicalField::SetbackSide => self.setback_side,
            CanonicalField::BalconyArea => self.balcony_area,
            _ => self.plot_size_absolute,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Complete,
    Partial,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Complete => write!(f, "complete"),
            OutcomeStatus::Partial => write!(f, "partial"),
            OutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    CellCountMismatch,
    LowConfidenceDirection,
    HeaderNotFound,
    AmbiguousContinuation,
    OrphanRows,
    CellParse,
    DuplicatePlanStatus,
    MissingPlanStatus,
    EmptyPage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionWarning {
    pub page_number: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    pub kind: WarningKind,
    pub message: String,
}

/// Result for one (plan_number, plan_status) table instance of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub plan_number: String,
    /// None only for a failed outcome where no table was found at all.
    pub plan_status: Option<PlanStatus>,
    pub status: OutcomeStatus,
    pub confidence: Confidence,
    pub records: Vec<BuildingRightsRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ExtractionWarning>,
    /// Pages (1-based) this table instance drew rows from.
    pub source_pages: Vec<usize>,
    /// Merged header labels in column order.
    pub raw_headers: Vec<String>,
    /// Column index -> key name.
    pub column_map: BTreeMap<usize, String>,
}

impl ExtractionOutcome {
    pub fn failed(plan_number: &str, warnings: Vec<ExtractionWarning>) -> Self {
        ExtractionOutcome {
            plan_number: plan_number.to_string(),
            plan_status: None,
            status: OutcomeStatus::Failed,
            confidence: Confidence::Low,
            records: Vec::new(),
            warnings,
            source_pages: Vec::new(),
            raw_headers: Vec::new(),
            column_map: BTreeMap::new(),
        }
    }

    /// Whether a human should look at this table before it is trusted.
    pub fn needs_review(&self) -> bool {
        self.status != OutcomeStatus::Complete || self.confidence != Confidence::High
    }
}

/// Extraction state of a tender-adjacent entity, as shown on the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionState {
    #[default]
    None,
    BrochureExtracted,
    Queued,
    Complete,
    Failed,
}

impl fmt::Display for ExtractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionState::None => write!(f, "none"),
            ExtractionState::BrochureExtracted => write!(f, "brochure_extracted"),
            ExtractionState::Queued => write!(f, "queued"),
            ExtractionState::Complete => write!(f, "complete"),
            ExtractionState::Failed => write!(f, "failed"),
        }
    }
}

/// Summary of one end-to-end attempt for a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenderExtraction {
    pub plan_number: String,
    pub state: ExtractionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rows_written: usize,
}
