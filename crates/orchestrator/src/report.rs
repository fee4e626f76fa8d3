use chrono::NaiveDate;
use core_types::AnalysisWindow;
use serde::Serialize;
use stats::StatisticalResult;
use uuid::Uuid;

/// Lifecycle of an analysis run, logged as the run advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    WindowsResolved,
    Computing,
    Assembled,
    Exported,
}

/// Aggregate status across every due window of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    /// Some windows failed; the successful ones were still exported and the
    /// failed ones are simply due again on the next run.
    PartialFailure,
    Failed,
}

impl RunStatus {
    /// Skipped windows (run cancelled before they started) count toward
    /// neither side.
    pub fn aggregate(outcomes: &[WindowOutcome]) -> Self {
        let failed = outcomes.iter().filter(|o| o.is_failed()).count();
        let succeeded = outcomes
            .iter()
            .filter(|o| matches!(o, WindowOutcome::Succeeded { .. }))
            .count();

        if failed == 0 {
            RunStatus::Succeeded
        } else if succeeded > 0 {
            RunStatus::PartialFailure
        } else {
            RunStatus::Failed
        }
    }
}

/// What failed inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    DataSource,
    Statistics,
    Export,
}

/// The terminal fate of one due window within a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum WindowOutcome {
    /// The window's full result table; already handed to the exporter.
    Succeeded {
        window: AnalysisWindow,
        results: Vec<StatisticalResult>,
    },
    Failed {
        window: AnalysisWindow,
        kind: FailureKind,
        reason: String,
    },
    /// The run was cancelled before this window started.
    Skipped { window: AnalysisWindow },
}

impl WindowOutcome {
    pub fn window(&self) -> &AnalysisWindow {
        match self {
            WindowOutcome::Succeeded { window, .. }
            | WindowOutcome::Failed { window, .. }
            | WindowOutcome::Skipped { window } => window,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, WindowOutcome::Failed { .. })
    }
}

/// The versioned result set of one orchestrated run.
///
/// Owned by the orchestrator for the duration of the run and handed over
/// whole at the end; window results inside it have already been exported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub experiment_id: String,
    pub as_of: NaiveDate,
    pub status: RunStatus,
    /// True when the run was cancelled between window boundaries; any
    /// windows not yet started are reported as skipped.
    pub cancelled: bool,
    pub outcomes: Vec<WindowOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::WindowKind;

    fn window(offset: u32) -> AnalysisWindow {
        AnalysisWindow::periodic(WindowKind::Daily, offset).unwrap()
    }

    fn succeeded(offset: u32) -> WindowOutcome {
        WindowOutcome::Succeeded { window: window(offset), results: Vec::new() }
    }

    fn failed(offset: u32) -> WindowOutcome {
        WindowOutcome::Failed {
            window: window(offset),
            kind: FailureKind::DataSource,
            reason: "connection refused".to_string(),
        }
    }

    #[test]
    fn aggregate_status_covers_all_three_cases() {
        assert_eq!(RunStatus::aggregate(&[succeeded(1), succeeded(2)]), RunStatus::Succeeded);
        assert_eq!(
            RunStatus::aggregate(&[succeeded(1), failed(2)]),
            RunStatus::PartialFailure
        );
        assert_eq!(RunStatus::aggregate(&[failed(1), failed(2)]), RunStatus::Failed);
        assert_eq!(RunStatus::aggregate(&[]), RunStatus::Succeeded);
    }

    #[test]
    fn skipped_windows_do_not_fail_a_run() {
        let outcomes = vec![succeeded(1), WindowOutcome::Skipped { window: window(2) }];
        assert_eq!(RunStatus::aggregate(&outcomes), RunStatus::Succeeded);
    }
}
