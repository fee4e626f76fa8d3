use crate::dataset::{DatasetError, RawDataset};
use crate::error::EngineError;
use chrono::{Duration, NaiveDate};
use configuration::RunSettings;
use core_types::{
    midnight_utc, AnalysisUnitRecord, AnalysisWindow, Experiment, MetricRow, MetricValue,
    RawEventRow, TimeRange,
};
use registry::{AggregationRule, MetricDefinition, MissingPolicy};
use std::collections::{HashMap, HashSet};
use windows::event_range_for_unit;

pub mod dataset;
pub mod error;

// Re-export the core types to provide a clean public API.
pub use dataset::MemoryDataset;

/// The metric computation engine.
///
/// For one experiment and one window it joins enrollment records with raw
/// usage data restricted to the window's per-unit time bounds, producing one
/// row per (unit, metric). Output is deterministic given identical inputs;
/// re-running with unchanged data yields an identical row sequence.
#[derive(Debug)]
pub struct MetricsEngine {
    config: RunSettings,
}

impl MetricsEngine {
    pub fn new(config: RunSettings) -> Self {
        Self { config }
    }

    /// Computes the per-unit metric table for one window.
    ///
    /// Units enrolled too late to complete the window are excluded entirely;
    /// eligible units without qualifying events appear with an explicit zero
    /// or no-data marker per the metric's missing policy. Any dataset or
    /// schema failure fails the whole window.
    pub async fn compute_window(
        &self,
        experiment: &Experiment,
        window: &AnalysisWindow,
        units: &[AnalysisUnitRecord],
        dataset: &dyn RawDataset,
        metrics: &[MetricDefinition],
        as_of: NaiveDate,
    ) -> Result<Vec<MetricRow>, EngineError> {
        // 1. Validate the enrollment records against the experiment.
        let mut seen_units: HashSet<&str> = HashSet::with_capacity(units.len());
        for unit in units {
            if !experiment.has_branch(&unit.branch) {
                return Err(DatasetError::Schema(format!(
                    "unit '{}' is enrolled in unknown branch '{}'",
                    unit.unit_id, unit.branch
                ))
                .into());
            }
            if !seen_units.insert(unit.unit_id.as_str()) {
                return Err(DatasetError::Schema(format!(
                    "duplicate enrollment record for unit '{}'",
                    unit.unit_id
                ))
                .into());
            }
        }

        // 2. Restrict to the enrollment cohort, then resolve per-unit time
        //    bounds; units too late to complete the window drop out here.
        let enrollment_period = TimeRange::new(
            midnight_utc(experiment.start_date),
            midnight_utc(experiment.start_date)
                + Duration::days(i64::from(experiment.enrollment_days)),
        );
        let mut eligible: Vec<(&AnalysisUnitRecord, TimeRange)> = units
            .iter()
            .filter(|u| {
                let in_period = enrollment_period.contains(u.enrolled_at);
                if !in_period {
                    tracing::debug!(
                        unit = %u.unit_id,
                        enrolled_at = %u.enrolled_at,
                        "Unit enrolled outside the enrollment period; excluded"
                    );
                }
                in_period
            })
            .filter_map(|u| event_range_for_unit(window, u.enrolled_at, as_of).map(|r| (u, r)))
            .collect();
        eligible.sort_by(|a, b| a.0.unit_id.cmp(&b.0.unit_id));

        if eligible.is_empty() {
            tracing::debug!(
                experiment = %experiment.id,
                window = %window.label(),
                "No eligible units; empty metric table"
            );
            return Ok(Vec::new());
        }

        // 3. One time-bounded, unit-scoped query covering every eligible unit.
        let query_range = TimeRange::new(
            eligible.iter().map(|(_, r)| r.start).min().unwrap_or_default(),
            eligible.iter().map(|(_, r)| r.end).max().unwrap_or_default(),
        );
        let unit_ids: Vec<String> = eligible.iter().map(|(u, _)| u.unit_id.clone()).collect();

        tracing::info!(
            experiment = %experiment.id,
            window = %window.label(),
            units = unit_ids.len(),
            "Executing events query"
        );

        let events = tokio::time::timeout(
            self.config.query_timeout(),
            dataset.fetch_events(&experiment.id, &query_range, &unit_ids),
        )
        .await
        .map_err(|_| {
            DatasetError::Unavailable(format!(
                "events query timed out after {}s",
                self.config.query_timeout_secs
            ))
        })??;

        // 4. Validate the returned rows and bucket them per unit.
        let branch_of: HashMap<&str, &str> = units
            .iter()
            .map(|u| (u.unit_id.as_str(), u.branch.as_str()))
            .collect();

        let mut per_unit: HashMap<&str, Vec<&RawEventRow>> = HashMap::new();
        for event in &events {
            if event.value.is_some_and(|v| !v.is_finite()) {
                return Err(DatasetError::Schema(format!(
                    "non-finite payload value for unit '{}' at {}",
                    event.unit_id, event.timestamp
                ))
                .into());
            }
            match branch_of.get(event.unit_id.as_str()) {
                Some(branch) if *branch != event.branch => {
                    return Err(DatasetError::Schema(format!(
                        "event branch '{}' disagrees with enrollment branch '{}' for unit '{}'",
                        event.branch, branch, event.unit_id
                    ))
                    .into());
                }
                Some(_) => per_unit.entry(event.unit_id.as_str()).or_default().push(event),
                // Events for units outside the enrollment cohort are not an
                // error; the query range may overlap other activity.
                None => {}
            }
        }

        // 5. Aggregate each metric independently, per unit, in definition
        //    order. Units stay sorted by id, so the row sequence is stable.
        let mut rows = Vec::with_capacity(metrics.len() * eligible.len());
        for def in metrics {
            for (unit, range) in &eligible {
                let unit_events: Vec<&RawEventRow> = per_unit
                    .get(unit.unit_id.as_str())
                    .map(|evs| {
                        evs.iter()
                            .filter(|e| range.contains(e.timestamp))
                            .copied()
                            .collect()
                    })
                    .unwrap_or_default();

                rows.push(MetricRow {
                    unit_id: unit.unit_id.clone(),
                    branch: unit.branch.clone(),
                    metric: def.name.clone(),
                    value: aggregate(def, &unit_events),
                });
            }
        }

        tracing::debug!(
            experiment = %experiment.id,
            window = %window.label(),
            rows = rows.len(),
            "Metric table computed"
        );

        Ok(rows)
    }
}

/// Applies one metric's aggregation rule to a unit's in-window events.
fn aggregate(def: &MetricDefinition, events: &[&RawEventRow]) -> MetricValue {
    let missing = || match def.missing_policy() {
        MissingPolicy::Zero => MetricValue::Value(0.0),
        MissingPolicy::NoData => MetricValue::NoData,
    };

    match def.aggregation {
        AggregationRule::AnyEvent => {
            if events.is_empty() {
                missing()
            } else {
                MetricValue::Value(1.0)
            }
        }
        AggregationRule::CountEvents => {
            if events.is_empty() {
                missing()
            } else {
                MetricValue::Value(events.len() as f64)
            }
        }
        AggregationRule::SumValue | AggregationRule::MeanValue => {
            // Only events carrying a payload qualify for value aggregations.
            let values: Vec<f64> = events.iter().filter_map(|e| e.value).collect();
            if values.is_empty() {
                return missing();
            }
            let sum: f64 = values.iter().sum();
            match def.aggregation {
                AggregationRule::SumValue => MetricValue::Value(sum),
                _ => MetricValue::Value(sum / values.len() as f64),
            }
        }
    }
}
