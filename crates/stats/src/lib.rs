use configuration::StatisticsSettings;
use core_types::{AnalysisWindow, Experiment, MetricRow};
use registry::{MetricDefinition, StatisticalType};
use std::collections::HashMap;

pub mod bootstrap;
pub mod error;
pub mod result;
pub mod seed;

// Re-export the core types to provide a clean public API.
pub use bootstrap::{Bootstrap, Interval};
pub use error::StatsError;
pub use result::{Comparison, ComparisonKind, ResultStatus, StatisticalResult};
pub use seed::derive_seed;

/// The statistical treatment engine.
///
/// Consumes one metric's per-unit table and produces per-branch estimates
/// plus branch-vs-control comparisons, all via the seeded percentile
/// bootstrap. Stateless apart from its configuration; safe to share across
/// concurrently processed windows.
#[derive(Debug, Clone)]
pub struct TreatmentEngine {
    config: StatisticsSettings,
    bootstrap: Bootstrap,
}

impl TreatmentEngine {
    pub fn new(config: StatisticsSettings) -> Result<Self, StatsError> {
        if config.resamples == 0 {
            return Err(StatsError::InvalidConfig(
                "resample count must be positive".to_string(),
            ));
        }
        if !(config.confidence_level > 0.0 && config.confidence_level < 1.0) {
            return Err(StatsError::InvalidConfig(format!(
                "confidence level must lie strictly between 0 and 1, got {}",
                config.confidence_level
            )));
        }
        let bootstrap = Bootstrap::new(config.resamples, config.confidence_level);
        Ok(Self { config, bootstrap })
    }

    /// Applies the metric's treatment to its per-unit rows for one window.
    ///
    /// Emits, in branch order: a sample-size row per branch (zero rows
    /// included, so every branch is accounted for), a per-branch estimate
    /// (or a suppressed row below the metric's threshold), then the
    /// comparisons against the designated control. Without a control only
    /// the per-branch rows are produced.
    pub fn apply(
        &self,
        experiment: &Experiment,
        window: &AnalysisWindow,
        rows: &[MetricRow],
        def: &MetricDefinition,
    ) -> Result<Vec<StatisticalResult>, StatsError> {
        let statistic = estimate_statistic(def.statistical_type);
        let window_label = window.label();

        // 1. Materialize per-branch samples; no-data rows drop out here.
        let mut samples: HashMap<&str, Vec<f64>> = HashMap::new();
        for row in rows {
            if row.metric != def.name {
                continue;
            }
            if let Some(value) = row.value.as_f64() {
                samples.entry(row.branch.as_str()).or_default().push(value);
            }
        }

        let threshold = def.effective_min_sample_size();
        let empty: Vec<f64> = Vec::new();
        let mut results = Vec::new();

        // 2. Per-branch sample sizes and point estimates, in branch order.
        for branch in &experiment.branches {
            let values = samples.get(branch.as_str()).unwrap_or(&empty);
            results.push(StatisticalResult::count(&def.name, branch, window, values.len()));

            if qualifying_count(def.statistical_type, values) < threshold {
                tracing::debug!(
                    metric = %def.name,
                    %branch,
                    window = %window_label,
                    threshold,
                    "Suppressing branch estimate: insufficient data"
                );
                results.push(StatisticalResult::suppressed(
                    &def.name,
                    statistic,
                    branch,
                    window,
                    None,
                    values.len(),
                ));
                continue;
            }

            let seed = derive_seed(
                self.config.base_seed,
                &[&experiment.id, &window_label, &def.name, branch],
            );
            self.ensure_finite(values, experiment, &window_label, def, branch, seed)?;

            let interval = self.bootstrap.mean_interval(values, seed);
            results.push(self.computed_row(def, statistic, branch, window, None, interval, values.len()));
        }

        // 3. Branch-pair comparisons against the designated control. These
        //    always run after the per-branch estimates above.
        let Some(control) = experiment.control_branch.as_deref() else {
            return Ok(results);
        };
        let control_values = samples.get(control).unwrap_or(&empty);
        let control_qualifies = qualifying_count(def.statistical_type, control_values) >= threshold;

        for branch in &experiment.branches {
            if branch == control {
                continue;
            }
            let values = samples.get(branch.as_str()).unwrap_or(&empty);

            if !control_qualifies || qualifying_count(def.statistical_type, values) < threshold {
                results.push(StatisticalResult::suppressed(
                    &def.name,
                    statistic,
                    branch,
                    window,
                    Some(Comparison {
                        kind: ComparisonKind::Difference,
                        to_branch: control.to_string(),
                    }),
                    values.len(),
                ));
                continue;
            }

            let seed = derive_seed(
                self.config.base_seed,
                &[&experiment.id, &window_label, &def.name, branch, control, "comparison"],
            );
            let (diff, uplift) = self.bootstrap.comparison_intervals(values, control_values, seed);

            results.push(self.computed_row(
                def,
                statistic,
                branch,
                window,
                Some(Comparison {
                    kind: ComparisonKind::Difference,
                    to_branch: control.to_string(),
                }),
                diff,
                values.len(),
            ));
            if let Some(uplift) = uplift {
                results.push(self.computed_row(
                    def,
                    statistic,
                    branch,
                    window,
                    Some(Comparison {
                        kind: ComparisonKind::RelativeUplift,
                        to_branch: control.to_string(),
                    }),
                    uplift,
                    values.len(),
                ));
            }
        }

        Ok(results)
    }

    fn computed_row(
        &self,
        def: &MetricDefinition,
        statistic: &str,
        branch: &str,
        window: &AnalysisWindow,
        comparison: Option<Comparison>,
        interval: Interval,
        n: usize,
    ) -> StatisticalResult {
        StatisticalResult {
            metric: def.name.clone(),
            statistic: statistic.to_string(),
            branch: branch.to_string(),
            window: *window,
            comparison,
            status: ResultStatus::Computed,
            point: Some(interval.point),
            lower: Some(interval.lower),
            upper: Some(interval.upper),
            ci_width: Some(self.config.confidence_level),
            sample_size: n,
        }
    }

    fn ensure_finite(
        &self,
        values: &[f64],
        experiment: &Experiment,
        window_label: &str,
        def: &MetricDefinition,
        branch: &str,
        seed: u64,
    ) -> Result<(), StatsError> {
        if values.iter().all(|v| v.is_finite()) {
            Ok(())
        } else {
            Err(StatsError::NonFiniteInput {
                experiment: experiment.id.clone(),
                window: window_label.to_string(),
                metric: def.name.clone(),
                branch: branch.to_string(),
                seed,
            })
        }
    }
}

/// The statistic label for a metric's per-branch estimate.
fn estimate_statistic(statistical_type: StatisticalType) -> &'static str {
    match statistical_type {
        StatisticalType::Binary => "conversion_rate",
        StatisticalType::Continuous | StatisticalType::Count => "mean",
    }
}

/// How many units actually carry signal for the suppression check.
///
/// For binary metrics that is the converting units, for count metrics the
/// units with at least one event; ten enrolled units with three conversions
/// against a threshold of five is still insufficient data.
fn qualifying_count(statistical_type: StatisticalType, values: &[f64]) -> usize {
    match statistical_type {
        StatisticalType::Binary => values.iter().filter(|v| **v == 1.0).count(),
        StatisticalType::Count => values.iter().filter(|v| **v > 0.0).count(),
        StatisticalType::Continuous => values.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use core_types::{MetricValue, WindowKind};
    use registry::AggregationRule;

    fn experiment(control: Option<&str>) -> Experiment {
        Experiment {
            id: "exp-1".to_string(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
            branches: vec!["control".to_string(), "treatment".to_string()],
            control_branch: control.map(str::to_string),
            enrollment_days: 7,
            metrics: vec!["activated".to_string()],
        }
    }

    fn binary_def(threshold: Option<usize>) -> MetricDefinition {
        MetricDefinition {
            name: "activated".to_string(),
            aggregation: AggregationRule::AnyEvent,
            statistical_type: StatisticalType::Binary,
            min_sample_size: threshold,
            missing: None,
        }
    }

    fn continuous_def() -> MetricDefinition {
        MetricDefinition {
            name: "spend".to_string(),
            aggregation: AggregationRule::SumValue,
            statistical_type: StatisticalType::Continuous,
            min_sample_size: None,
            missing: None,
        }
    }

    fn rows(metric: &str, branch: &str, values: &[f64]) -> Vec<MetricRow> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricRow {
                unit_id: format!("{branch}-{i}"),
                branch: branch.to_string(),
                metric: metric.to_string(),
                value: MetricValue::Value(*v),
            })
            .collect()
    }

    fn engine() -> TreatmentEngine {
        TreatmentEngine::new(StatisticsSettings {
            resamples: 300,
            confidence_level: 0.95,
            base_seed: 7,
        })
        .unwrap()
    }

    fn window() -> AnalysisWindow {
        AnalysisWindow::periodic(WindowKind::Daily, 1).unwrap()
    }

    fn binary_values(converting: usize, total: usize) -> Vec<f64> {
        (0..total).map(|i| if i < converting { 1.0 } else { 0.0 }).collect()
    }

    #[test]
    fn few_converters_suppress_the_branch_and_its_comparison() {
        // Three converting units out of ten against a threshold of five.
        let mut table = rows("activated", "control", &binary_values(3, 10));
        table.extend(rows("activated", "treatment", &binary_values(6, 10)));

        let results = engine()
            .apply(&experiment(Some("control")), &window(), &table, &binary_def(Some(5)))
            .unwrap();

        let control_estimate = results
            .iter()
            .find(|r| r.branch == "control" && r.statistic == "conversion_rate" && r.comparison.is_none())
            .unwrap();
        assert!(control_estimate.is_suppressed());
        assert_eq!(control_estimate.point, None);
        assert_eq!(control_estimate.lower, None);
        assert_eq!(control_estimate.upper, None);
        assert_eq!(control_estimate.sample_size, 10);

        let treatment_estimate = results
            .iter()
            .find(|r| r.branch == "treatment" && r.statistic == "conversion_rate" && r.comparison.is_none())
            .unwrap();
        assert_eq!(treatment_estimate.status, ResultStatus::Computed);
        assert!((treatment_estimate.point.unwrap() - 0.6).abs() < 1e-12);

        // A comparison against a suppressed control is itself suppressed.
        let comparison = results
            .iter()
            .find(|r| r.branch == "treatment" && r.comparison.is_some())
            .unwrap();
        assert!(comparison.is_suppressed());
    }

    #[test]
    fn estimates_bracket_their_point_and_carry_the_confidence_level() {
        let mut table = rows("activated", "control", &binary_values(40, 100));
        table.extend(rows("activated", "treatment", &binary_values(55, 100)));

        let results = engine()
            .apply(&experiment(Some("control")), &window(), &table, &binary_def(Some(5)))
            .unwrap();

        for r in results.iter().filter(|r| r.statistic == "conversion_rate") {
            assert_eq!(r.status, ResultStatus::Computed);
            let (point, lower, upper) = (r.point.unwrap(), r.lower.unwrap(), r.upper.unwrap());
            assert!(lower <= point && point <= upper, "{r:?}");
            assert!(lower < upper, "nonzero variance must widen the interval: {r:?}");
            assert_eq!(r.ci_width, Some(0.95));
        }
    }

    #[test]
    fn reruns_with_the_same_seed_are_bit_identical() {
        let mut table = rows("activated", "control", &binary_values(40, 100));
        table.extend(rows("activated", "treatment", &binary_values(55, 100)));
        let exp = experiment(Some("control"));
        let def = binary_def(None);

        let first = engine().apply(&exp, &window(), &table, &def).unwrap();
        let second = engine().apply(&exp, &window(), &table, &def).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_variance_yields_a_degenerate_interval() {
        let mut table = rows("spend", "control", &[4.0; 12]);
        table.extend(rows("spend", "treatment", &[6.5; 12]));

        let results = engine()
            .apply(&experiment(Some("control")), &window(), &table, &continuous_def())
            .unwrap();

        let control = results
            .iter()
            .find(|r| r.branch == "control" && r.statistic == "mean" && r.comparison.is_none())
            .unwrap();
        assert_eq!(control.point, Some(4.0));
        assert_eq!(control.lower, Some(4.0));
        assert_eq!(control.upper, Some(4.0));

        let diff = results
            .iter()
            .find(|r| {
                r.comparison.as_ref().is_some_and(|c| c.kind == ComparisonKind::Difference)
            })
            .unwrap();
        assert_eq!(diff.point, Some(2.5));
        assert_eq!(diff.lower, Some(2.5));
        assert_eq!(diff.upper, Some(2.5));
    }

    #[test]
    fn without_a_control_no_comparisons_are_emitted() {
        let mut table = rows("activated", "control", &binary_values(40, 100));
        table.extend(rows("activated", "treatment", &binary_values(55, 100)));

        let results = engine()
            .apply(&experiment(None), &window(), &table, &binary_def(None))
            .unwrap();

        assert!(results.iter().all(|r| r.comparison.is_none()));
        // Per-branch rows are still there: a count and an estimate each.
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn comparisons_include_difference_and_uplift() {
        let mut table = rows("activated", "control", &binary_values(40, 100));
        table.extend(rows("activated", "treatment", &binary_values(55, 100)));

        let results = engine()
            .apply(&experiment(Some("control")), &window(), &table, &binary_def(None))
            .unwrap();

        let kinds: Vec<ComparisonKind> = results
            .iter()
            .filter_map(|r| r.comparison.as_ref())
            .map(|c| c.kind)
            .collect();
        assert_eq!(kinds, vec![ComparisonKind::Difference, ComparisonKind::RelativeUplift]);

        let diff = results
            .iter()
            .find(|r| r.comparison.as_ref().is_some_and(|c| c.kind == ComparisonKind::Difference))
            .unwrap();
        assert!((diff.point.unwrap() - 0.15).abs() < 1e-12);
        assert_eq!(diff.comparison.as_ref().unwrap().to_branch, "control");
    }

    #[test]
    fn uplift_is_omitted_when_the_control_never_converts() {
        // All-zero control: the difference is still estimable, a relative
        // uplift against zero is not.
        let mut table = rows("spend", "control", &[0.0; 10]);
        table.extend(rows("spend", "treatment", &[2.0, 3.0, 4.0, 2.5, 3.5, 1.0, 2.0, 5.0, 3.0, 2.0]));

        let results = engine()
            .apply(&experiment(Some("control")), &window(), &table, &continuous_def())
            .unwrap();

        assert!(results
            .iter()
            .any(|r| r.comparison.as_ref().is_some_and(|c| c.kind == ComparisonKind::Difference)));
        assert!(!results
            .iter()
            .any(|r| r.comparison.as_ref().is_some_and(|c| c.kind == ComparisonKind::RelativeUplift)));
    }

    #[test]
    fn every_branch_gets_a_count_row_even_with_no_data() {
        // Only the control produced rows; the treatment branch is absent
        // from the metric table entirely.
        let table = rows("activated", "control", &binary_values(8, 10));

        let results = engine()
            .apply(&experiment(None), &window(), &table, &binary_def(None))
            .unwrap();

        let treatment_count = results
            .iter()
            .find(|r| r.branch == "treatment" && r.statistic == "count")
            .unwrap();
        assert_eq!(treatment_count.point, Some(0.0));
        assert_eq!(treatment_count.sample_size, 0);

        let treatment_estimate = results
            .iter()
            .find(|r| r.branch == "treatment" && r.statistic == "conversion_rate")
            .unwrap();
        assert!(treatment_estimate.is_suppressed());
    }

    #[test]
    fn non_finite_values_fail_with_reproducible_context() {
        let mut table = rows("spend", "control", &[1.0, 2.0, f64::INFINITY]);
        table.extend(rows("spend", "treatment", &[1.0, 2.0, 3.0]));

        let err = engine()
            .apply(&experiment(Some("control")), &window(), &table, &continuous_def())
            .unwrap_err();

        match err {
            StatsError::NonFiniteInput { experiment, window, metric, branch, .. } => {
                assert_eq!(experiment, "exp-1");
                assert_eq!(window, "day_1");
                assert_eq!(metric, "spend");
                assert_eq!(branch, "control");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let zero_resamples = StatisticsSettings { resamples: 0, confidence_level: 0.95, base_seed: 0 };
        assert!(TreatmentEngine::new(zero_resamples).is_err());

        let bad_confidence = StatisticsSettings { resamples: 100, confidence_level: 1.0, base_seed: 0 };
        assert!(TreatmentEngine::new(bad_confidence).is_err());
    }
}
