use crate::enums::{MetricValue, WindowKind};
use crate::error::CoreError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An experiment as handed to us by the config collaborator.
///
/// Read-only to the core: once an analysis run begins this struct is never
/// mutated. Branch order is meaningful and preserved in all outputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique experiment identifier (slug).
    pub id: String,
    /// First day of enrollment.
    pub start_date: NaiveDate,
    /// Last day of the experiment, if it has been decided.
    pub end_date: Option<NaiveDate>,
    /// Ordered list of branch names. Must be unique and contain at least two.
    pub branches: Vec<String>,
    /// The branch comparisons are made against. Optional; without it only
    /// per-branch estimates are produced.
    #[serde(default)]
    pub control_branch: Option<String>,
    /// Length of the enrollment period in days.
    pub enrollment_days: u32,
    /// Names of the metrics to compute, resolved against the registry.
    pub metrics: Vec<String>,
}

impl Experiment {
    /// Checks the structural invariants of the experiment definition.
    ///
    /// Failures here are precondition failures: no analysis run is attempted
    /// for an experiment that does not validate.
    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |msg: String| CoreError::InvalidExperiment(self.id.clone(), msg);

        if self.branches.len() < 2 {
            return Err(invalid(format!(
                "an experiment needs at least two branches, found {}",
                self.branches.len()
            )));
        }

        let unique: HashSet<&str> = self.branches.iter().map(String::as_str).collect();
        if unique.len() != self.branches.len() {
            return Err(invalid("branch names must be unique".to_string()));
        }

        if let Some(control) = &self.control_branch {
            if !self.branches.iter().any(|b| b == control) {
                return Err(invalid(format!(
                    "control branch '{control}' is not one of the experiment's branches"
                )));
            }
        }

        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(invalid(format!(
                    "end date {end} precedes start date {}",
                    self.start_date
                )));
            }
        }

        if self.enrollment_days == 0 {
            return Err(invalid("enrollment period must cover at least one day".to_string()));
        }

        if self.metrics.is_empty() {
            return Err(invalid("no metrics configured".to_string()));
        }

        Ok(())
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.branches.iter().any(|b| b == name)
    }
}

/// One analysis window: a window kind plus a 1-based period index.
///
/// The overall window uses offset 0 and carries a `final` flag set once the
/// experiment has ended and a run has completed after the end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub kind: WindowKind,
    pub offset: u32,
    #[serde(default)]
    pub is_final: bool,
}

impl AnalysisWindow {
    /// A daily, weekly or growth window for the given 1-based period index.
    pub fn periodic(kind: WindowKind, offset: u32) -> Result<Self, CoreError> {
        if kind == WindowKind::Overall {
            return Err(CoreError::InvalidWindow(
                "the overall window has no period index; use AnalysisWindow::overall".to_string(),
            ));
        }
        if offset == 0 {
            return Err(CoreError::InvalidWindow(format!(
                "{} windows are indexed from 1",
                kind.label()
            )));
        }
        Ok(Self { kind, offset, is_final: false })
    }

    /// The overall window, covering enrollment up to the as-of date.
    pub fn overall(is_final: bool) -> Self {
        Self { kind: WindowKind::Overall, offset: 0, is_final }
    }

    /// Label used in result tables and export names, e.g. `day_3`.
    pub fn label(&self) -> String {
        format!("{}_{}", self.kind.label(), self.offset)
    }

    /// First day covered by this window, relative to a unit's enrollment.
    pub fn start_day(&self) -> Option<u32> {
        self.kind.period_days().map(|len| (self.offset - 1) * len)
    }

    /// First day past this window, relative to a unit's enrollment.
    pub fn end_day(&self) -> Option<u32> {
        self.kind.period_days().map(|len| self.offset * len)
    }
}

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }
}

/// One enrolled analysis unit. Branch assignment is immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisUnitRecord {
    pub unit_id: String,
    pub branch: String,
    pub enrolled_at: DateTime<Utc>,
}

/// One raw event row as returned by the dataset collaborator.
///
/// The optional payload value feeds sum/mean aggregations; events without a
/// payload still count for presence and count aggregations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEventRow {
    pub unit_id: String,
    pub branch: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub value: Option<f64>,
}

/// One row of the per-unit metric table for a single window.
///
/// Always recomputed wholesale for a given (experiment, window), never
/// patched incrementally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub unit_id: String,
    pub branch: String,
    pub metric: String,
    pub value: MetricValue,
}

/// Midnight UTC at the start of the given date.
pub fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    // and_hms_opt(0, 0, 0) cannot fail for valid dates.
    date.and_hms_opt(0, 0, 0).unwrap().and_utc()
}
