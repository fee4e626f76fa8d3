use async_trait::async_trait;
use core_types::{AnalysisUnitRecord, RawEventRow, TimeRange};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("Raw dataset unreachable: {0}")]
    Unavailable(String),

    #[error("Raw dataset schema mismatch: {0}")]
    Schema(String),
}

/// The raw dataset collaborator: a queryable store of per-unit timestamped
/// events.
///
/// The core issues time-bounded, unit-scoped queries against this boundary
/// and aggregates whatever comes back. The dataset is read-only and shared;
/// implementations must be safe to query concurrently from several window
/// computations.
#[async_trait]
pub trait RawDataset: Send + Sync {
    /// All enrollment records for the experiment.
    async fn fetch_enrollments(
        &self,
        experiment_id: &str,
    ) -> Result<Vec<AnalysisUnitRecord>, DatasetError>;

    /// Event rows for the given units whose timestamps fall inside `range`.
    async fn fetch_events(
        &self,
        experiment_id: &str,
        range: &TimeRange,
        unit_ids: &[String],
    ) -> Result<Vec<RawEventRow>, DatasetError>;
}

/// An in-memory dataset, loadable from a JSON file.
///
/// Backs the CLI and the test suites; a production deployment would put a
/// real query engine behind the `RawDataset` trait instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemoryDataset {
    #[serde(default)]
    enrollments: Vec<AnalysisUnitRecord>,
    #[serde(default)]
    events: Vec<RawEventRow>,
}

impl MemoryDataset {
    pub fn new(enrollments: Vec<AnalysisUnitRecord>, events: Vec<RawEventRow>) -> Self {
        Self { enrollments, events }
    }

    /// Loads a dataset from a JSON file of the shape
    /// `{ "enrollments": [...], "events": [...] }`.
    pub fn from_json_file(path: &Path) -> Result<Self, DatasetError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DatasetError::Unavailable(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| DatasetError::Schema(format!("{}: {e}", path.display())))
    }
}

#[async_trait]
impl RawDataset for MemoryDataset {
    async fn fetch_enrollments(
        &self,
        _experiment_id: &str,
    ) -> Result<Vec<AnalysisUnitRecord>, DatasetError> {
        Ok(self.enrollments.clone())
    }

    async fn fetch_events(
        &self,
        _experiment_id: &str,
        range: &TimeRange,
        unit_ids: &[String],
    ) -> Result<Vec<RawEventRow>, DatasetError> {
        let rows = self
            .events
            .iter()
            .filter(|e| range.contains(e.timestamp))
            .filter(|e| unit_ids.iter().any(|id| *id == e.unit_id))
            .cloned()
            .collect();
        Ok(rows)
    }
}
