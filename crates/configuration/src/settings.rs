use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The root configuration structure for an analysis process.
///
/// Every value here is threaded explicitly into the engines; nothing reads
/// ambient global state, which keeps computations deterministic and testable
/// in isolation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default)]
    pub statistics: StatisticsSettings,
    #[serde(default)]
    pub run: RunSettings,
}

/// Parameters of the statistical treatment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatisticsSettings {
    /// Number of bootstrap resamples per estimate.
    pub resamples: usize,
    /// Two-sided confidence level for the empirical intervals.
    pub confidence_level: f64,
    /// Base seed mixed into every derived resampling seed. Changing it
    /// produces a different (but still reproducible) set of draws.
    pub base_seed: u64,
}

impl Default for StatisticsSettings {
    fn default() -> Self {
        Self {
            resamples: 10_000,
            confidence_level: 0.95,
            base_seed: 0,
        }
    }
}

/// Parameters of run execution: concurrency, timeouts and export location.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Maximum number of analysis windows processed concurrently. Bounds
    /// peak memory, since each in-flight window materializes its metric
    /// table and resamples.
    pub max_concurrent_windows: usize,
    /// Timeout for a single raw-dataset query, in seconds. Applied per
    /// query rather than per run so one slow window cannot stall siblings.
    pub query_timeout_secs: u64,
    /// Directory the JSON result tables are written to.
    pub export_dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_concurrent_windows: 4,
            query_timeout_secs: 30,
            export_dir: PathBuf::from("results"),
        }
    }
}

impl RunSettings {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let settings = AnalysisSettings::default();
        assert_eq!(settings.statistics.resamples, 10_000);
        assert!((settings.statistics.confidence_level - 0.95).abs() < f64::EPSILON);
        assert_eq!(settings.run.max_concurrent_windows, 4);
        assert_eq!(settings.run.query_timeout(), Duration::from_secs(30));
    }
}
