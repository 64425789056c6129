//! Persistence and document-retrieval seams used by [`run_plan`](crate::run_plan).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::RightsError;
use crate::model::{BuildingRightsRecord, ExtractionState, PlanStatus};

/// Storage for extracted rows and per-plan extraction state.
pub trait RightsStore {
    /// Replace the full row set of one (plan, status) in a single batch.
    /// Writing the same rows twice leaves the store unchanged.
    fn replace_rows(
        &mut self,
        plan_number: &str,
        plan_status: PlanStatus,
        rows: &[BuildingRightsRecord],
    ) -> Result<usize, RightsError>;

    /// All rows of a plan across both statuses, in natural-key order.
    fn rows_for_plan(&self, plan_number: &str) -> Result<Vec<BuildingRightsRecord>, RightsError>;

    fn set_state(
        &mut self,
        plan_number: &str,
        state: ExtractionState,
        error: Option<&str>,
    ) -> Result<(), RightsError>;

    fn state(&self, plan_number: &str) -> Result<ExtractionState, RightsError>;
}

/// Fetches the statutory-plan PDF for a plan number.
pub trait DocumentSource: Send + Sync {
    fn fetch(&self, plan_number: &str) -> Result<Vec<u8>, RightsError>;
}

type RowKey = (String, PlanStatus, usize);

/// In-memory [`RightsStore`], keyed by the natural key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: BTreeMap<RowKey, BuildingRightsRecord>,
    states: HashMap<String, (ExtractionState, Option<String>)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Error detail recorded with the last state change, if any.
    pub fn error(&self, plan_number: &str) -> Option<&str> {
        self.states
            .get(plan_number)
            .and_then(|(_, error)| error.as_deref())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn plan_range(
        plan_number: &str,
        statuses: (PlanStatus, PlanStatus),
    ) -> std::ops::RangeInclusive<RowKey> {
        (plan_number.to_string(), statuses.0, 0)..=(plan_number.to_string(), statuses.1, usize::MAX)
    }
}

impl RightsStore for MemoryStore {
    fn replace_rows(
        &mut self,
        plan_number: &str,
        plan_status: PlanStatus,
        rows: &[BuildingRightsRecord],
    ) -> Result<usize, RightsError> {
        if let Some(stray) = rows
            .iter()
            .find(|r| r.plan_number != plan_number || r.plan_status != plan_status)
        {
            return Err(RightsError::Store(format!(
                "row {} belongs to {} ({}), not {} ({})",
                stray.row_index, stray.plan_number, stray.plan_status, plan_number, plan_status
            )));
        }

        let stale: Vec<RowKey> = self
            .rows
            .range(Self::plan_range(plan_number, (plan_status, plan_status)))
            .map(|(k, _)| k.clone())
            .collect();
        for key in stale {
            self.rows.remove(&key);
        }

        for row in rows {
            self.rows.insert(
                (row.plan_number.clone(), row.plan_status, row.row_index),
                row.clone(),
            );
        }
        Ok(rows.len())
    }

    fn rows_for_plan(&self, plan_number: &str) -> Result<Vec<BuildingRightsRecord>, RightsError> {
        Ok(self
            .rows
            .range(Self::plan_range(
                plan_number,
                (PlanStatus::Proposed, PlanStatus::Approved),
            ))
            .map(|(_, r)| r.clone())
            .collect())
    }

    fn set_state(
        &mut self,
        plan_number: &str,
        state: ExtractionState,
        error: Option<&str>,
    ) -> Result<(), RightsError> {
        self.states.insert(
            plan_number.to_string(),
            (state, error.map(str::to_string)),
        );
        Ok(())
    }

    fn state(&self, plan_number: &str) -> Result<ExtractionState, RightsError> {
        Ok(self
            .states
            .get(plan_number)
            .map(|(state, _)| *state)
            .unwrap_or_default())
    }
}

/// Reads `<dir>/<plan number>.pdf` from a local download cache.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySource { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache path of a plan's PDF.
    pub fn path_for(&self, plan_number: &str) -> PathBuf {
        self.dir.join(format!("{}.pdf", safe_file_name(plan_number)))
    }
}

impl DocumentSource for DirectorySource {
    fn fetch(&self, plan_number: &str) -> Result<Vec<u8>, RightsError> {
        let path = self.path_for(plan_number);
        std::fs::read(&path).map_err(|e| RightsError::Source {
            plan_number: plan_number.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

/// Plan numbers contain path separators; they become underscores on disk.
pub fn safe_file_name(plan_number: &str) -> String {
    plan_number.replace(['/', '\\'], "_")
}
