use chrono::NaiveDate;
use configuration::AnalysisSettings;
use core_types::{AnalysisUnitRecord, AnalysisWindow, Experiment};
use engine::dataset::RawDataset;
use engine::MetricsEngine;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use registry::{MetricDefinition, MetricRegistry};
use stats::TreatmentEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub mod error;
pub mod export;
pub mod report;

// Re-export the core types to provide a clean public API.
pub use error::OrchestratorError;
pub use export::{ExportError, JsonFileExporter, MemoryExporter, ResultExporter};
pub use report::{FailureKind, RunReport, RunState, RunStatus, WindowOutcome};

/// Cooperative cancellation for a running analysis.
///
/// Cancellation takes effect between window boundaries: windows already in
/// flight run to completion (their results are all-or-nothing), windows not
/// yet started are skipped.
#[derive(Debug, Clone)]
pub struct CancellationHandle(Arc<AtomicBool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// The master engine for orchestrating analysis runs.
///
/// Composes the window policy, the metric computation engine and the
/// statistical treatment engine for one experiment at a time, tracking
/// per-window failures and emitting a versioned result set. Windows are
/// processed independently: one window failing never aborts its siblings.
pub struct Orchestrator {
    settings: AnalysisSettings,
    dataset: Arc<dyn RawDataset>,
    exporter: Arc<dyn ResultExporter>,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        settings: AnalysisSettings,
        dataset: Arc<dyn RawDataset>,
        exporter: Arc<dyn ResultExporter>,
    ) -> Self {
        Self {
            settings,
            dataset,
            exporter,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancellation_handle(&self) -> CancellationHandle {
        CancellationHandle(self.cancel.clone())
    }

    /// The single entry point for the scheduling collaborator.
    ///
    /// Resolves the due windows, processes them concurrently up to the
    /// configured cap, exports each successful window's table, and reports
    /// the aggregate outcome. Precondition failures (invalid experiment,
    /// unknown metrics, bad treatment configuration) return an error before
    /// any window work starts; everything later is captured per window.
    pub async fn run(
        &self,
        experiment: &Experiment,
        registry: &MetricRegistry,
        as_of: NaiveDate,
    ) -> Result<RunReport, OrchestratorError> {
        let run_id = Uuid::new_v4();
        tracing::info!(
            %run_id,
            experiment = %experiment.id,
            %as_of,
            state = ?RunState::Pending,
            "Analysis run invoked"
        );

        experiment.validate()?;
        let metric_defs: Vec<MetricDefinition> = registry
            .resolve(&experiment.metrics)?
            .into_iter()
            .cloned()
            .collect();
        let treatment = TreatmentEngine::new(self.settings.statistics.clone())?;
        let metrics_engine = MetricsEngine::new(self.settings.run.clone());

        let due = windows::due_windows(experiment, as_of);
        tracing::info!(
            windows = due.len(),
            state = ?RunState::WindowsResolved,
            "Resolved due windows"
        );

        if due.is_empty() {
            tracing::info!(experiment = %experiment.id, "No windows due yet; nothing to compute");
            return Ok(RunReport {
                run_id,
                experiment_id: experiment.id.clone(),
                as_of,
                status: RunStatus::Succeeded,
                cancelled: self.cancel.load(Ordering::Relaxed),
                outcomes: Vec::new(),
            });
        }

        // One enrollment fetch per run; every window joins against it, so a
        // failure here fails them all.
        let units = match tokio::time::timeout(
            self.settings.run.query_timeout(),
            self.dataset.fetch_enrollments(&experiment.id),
        )
        .await
        {
            Ok(Ok(units)) => units,
            Ok(Err(e)) => {
                return Ok(self.all_windows_failed(run_id, experiment, as_of, due, e.to_string()))
            }
            Err(_) => {
                return Ok(self.all_windows_failed(
                    run_id,
                    experiment,
                    as_of,
                    due,
                    format!(
                        "enrollments query timed out after {}s",
                        self.settings.run.query_timeout_secs
                    ),
                ))
            }
        };

        let progress = ProgressBar::new(due.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .map_err(|e| OrchestratorError::Progress(e.to_string()))?
                .progress_chars("=>-"),
        );

        let concurrency = self.settings.run.max_concurrent_windows.max(1);
        let mut outcomes: Vec<WindowOutcome> = stream::iter(due)
            .map(|window| {
                let progress = progress.clone();
                let units = &units;
                let metric_defs = &metric_defs;
                let metrics_engine = &metrics_engine;
                let treatment = &treatment;
                async move {
                    // Cooperative cancellation checkpoint: windows that have
                    // not started yet are skipped, in-flight ones finish.
                    let outcome = if self.cancel.load(Ordering::Relaxed) {
                        WindowOutcome::Skipped { window }
                    } else {
                        self.process_window(
                            run_id,
                            experiment,
                            &window,
                            units,
                            metric_defs,
                            metrics_engine,
                            treatment,
                            as_of,
                        )
                        .await
                    };
                    progress.inc(1);
                    outcome
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        progress.finish_with_message("All windows processed.");

        // Completion order is nondeterministic; report in window order.
        outcomes.sort_by_key(|o| {
            let w = o.window();
            (w.kind, w.offset)
        });
        tracing::debug!(%run_id, state = ?RunState::Assembled, "Run report assembled");

        let status = RunStatus::aggregate(&outcomes);
        let cancelled = self.cancel.load(Ordering::Relaxed);
        tracing::info!(
            %run_id,
            ?status,
            cancelled,
            state = ?RunState::Exported,
            "Analysis run complete"
        );

        Ok(RunReport {
            run_id,
            experiment_id: experiment.id.clone(),
            as_of,
            status,
            cancelled,
            outcomes,
        })
    }

    /// Runs one window end to end: compute, treat, export.
    ///
    /// Every failure mode is captured into the window's outcome; nothing
    /// escapes to abort sibling windows.
    #[allow(clippy::too_many_arguments)]
    async fn process_window(
        &self,
        run_id: Uuid,
        experiment: &Experiment,
        window: &AnalysisWindow,
        units: &[AnalysisUnitRecord],
        metric_defs: &[MetricDefinition],
        metrics_engine: &MetricsEngine,
        treatment: &TreatmentEngine,
        as_of: NaiveDate,
    ) -> WindowOutcome {
        tracing::info!(
            window = %window.label(),
            state = ?RunState::Computing,
            "Computing window"
        );

        let rows = match metrics_engine
            .compute_window(
                experiment,
                window,
                units,
                self.dataset.as_ref(),
                metric_defs,
                as_of,
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(window = %window.label(), error = %e, "Window computation failed");
                return WindowOutcome::Failed {
                    window: *window,
                    kind: FailureKind::DataSource,
                    reason: e.to_string(),
                };
            }
        };

        // Resampling is CPU-bound; run the window's metrics on the rayon
        // pool without tying up the async workers.
        let treated = {
            let experiment = experiment.clone();
            let window = *window;
            let metric_defs = metric_defs.to_vec();
            let treatment = treatment.clone();
            tokio::task::spawn_blocking(move || {
                metric_defs
                    .par_iter()
                    .map(|def| treatment.apply(&experiment, &window, &rows, def))
                    .collect::<Result<Vec<_>, _>>()
            })
            .await
        };

        let results: Vec<stats::StatisticalResult> = match treated {
            Ok(Ok(per_metric)) => per_metric.into_iter().flatten().collect(),
            Ok(Err(e)) => {
                tracing::error!(window = %window.label(), error = %e, "Statistical treatment failed");
                return WindowOutcome::Failed {
                    window: *window,
                    kind: FailureKind::Statistics,
                    reason: e.to_string(),
                };
            }
            Err(e) => {
                tracing::error!(window = %window.label(), error = %e, "Treatment task aborted");
                return WindowOutcome::Failed {
                    window: *window,
                    kind: FailureKind::Statistics,
                    reason: e.to_string(),
                };
            }
        };

        match self
            .exporter
            .export_window(run_id, &experiment.id, window, &results)
            .await
        {
            Ok(()) => WindowOutcome::Succeeded { window: *window, results },
            Err(e) => {
                tracing::error!(window = %window.label(), error = %e, "Window export failed");
                WindowOutcome::Failed {
                    window: *window,
                    kind: FailureKind::Export,
                    reason: e.to_string(),
                }
            }
        }
    }

    fn all_windows_failed(
        &self,
        run_id: Uuid,
        experiment: &Experiment,
        as_of: NaiveDate,
        due: Vec<AnalysisWindow>,
        reason: String,
    ) -> RunReport {
        tracing::error!(
            experiment = %experiment.id,
            %reason,
            "Enrollment fetch failed; every due window fails"
        );
        let outcomes = due
            .into_iter()
            .map(|window| WindowOutcome::Failed {
                window,
                kind: FailureKind::DataSource,
                reason: reason.clone(),
            })
            .collect();

        RunReport {
            run_id,
            experiment_id: experiment.id.clone(),
            as_of,
            status: RunStatus::Failed,
            cancelled: self.cancel.load(Ordering::Relaxed),
            outcomes,
        }
    }
}
