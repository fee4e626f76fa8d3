use core_types::AnalysisWindow;
use serde::{Deserialize, Serialize};

/// Whether a result carries a numeric estimate or was suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    Computed,
    /// The branch had fewer qualifying units than the metric's threshold.
    /// Suppressed rows never carry a numeric interval; an interval built
    /// from too few samples would be worse than none.
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonKind {
    /// Absolute difference of the branch statistic against the control.
    Difference,
    /// Relative uplift `(treatment - control) / control`.
    RelativeUplift,
}

/// Identifies a branch-pair comparison on a result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub kind: ComparisonKind,
    /// The designated control branch the comparison is made against.
    pub to_branch: String,
}

/// One row of the terminal statistics table.
///
/// Immutable once emitted; a fresh run for the same (experiment, window)
/// fully supersedes the prior result set. Schema changes must be additive
/// only, downstream dashboards depend on these field names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalResult {
    pub metric: String,
    /// The statistic estimated, e.g. `conversion_rate`, `mean`, `count`.
    pub statistic: String,
    pub branch: String,
    pub window: AnalysisWindow,
    #[serde(default)]
    pub comparison: Option<Comparison>,
    pub status: ResultStatus,
    pub point: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    /// The confidence level of the interval, when one is present.
    pub ci_width: Option<f64>,
    /// Number of qualifying units behind this row.
    pub sample_size: usize,
}

impl StatisticalResult {
    /// A per-branch sample-size row. Emitted for every branch, including
    /// branches with no qualifying units at all.
    pub fn count(metric: &str, branch: &str, window: &AnalysisWindow, n: usize) -> Self {
        Self {
            metric: metric.to_string(),
            statistic: "count".to_string(),
            branch: branch.to_string(),
            window: *window,
            comparison: None,
            status: ResultStatus::Computed,
            point: Some(n as f64),
            lower: None,
            upper: None,
            ci_width: None,
            sample_size: n,
        }
    }

    /// A suppressed row: insufficient data, no numeric estimate.
    pub fn suppressed(
        metric: &str,
        statistic: &str,
        branch: &str,
        window: &AnalysisWindow,
        comparison: Option<Comparison>,
        n: usize,
    ) -> Self {
        Self {
            metric: metric.to_string(),
            statistic: statistic.to_string(),
            branch: branch.to_string(),
            window: *window,
            comparison,
            status: ResultStatus::Suppressed,
            point: None,
            lower: None,
            upper: None,
            ci_width: None,
            sample_size: n,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.status == ResultStatus::Suppressed
    }
}
