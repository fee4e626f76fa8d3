use crate::error::ConfigError;
use core_types::Experiment;
use registry::{MetricDefinition, MetricRegistry};
use serde::Deserialize;
use std::path::Path;

/// An experiment definition file: the experiment itself plus the metric
/// definitions it references.
///
/// This is the boundary to the experiment config collaborator. Failure to
/// load or validate one of these is a precondition failure; no analysis run
/// is attempted.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentFile {
    pub experiment: Experiment,
    pub metrics: Vec<MetricDefinition>,
}

impl ExperimentFile {
    /// Validates the experiment and builds the metric registry, checking
    /// that every metric the experiment names is actually defined.
    pub fn build_registry(&self) -> Result<MetricRegistry, ConfigError> {
        self.experiment.validate()?;
        let registry = MetricRegistry::from_definitions(self.metrics.clone())?;
        registry.resolve(&self.experiment.metrics)?;
        Ok(registry)
    }
}

/// Loads an experiment definition from a TOML file.
pub fn load_experiment(path: &Path) -> Result<ExperimentFile, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path))
        .build()?;

    let file = builder.try_deserialize::<ExperimentFile>()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const EXPERIMENT_TOML: &str = r#"
        [experiment]
        id = "onboarding-v2"
        start_date = "2024-01-01"
        branches = ["control", "treatment"]
        control_branch = "control"
        enrollment_days = 7
        metrics = ["activated", "sessions"]

        [[metrics]]
        name = "activated"
        aggregation = "any_event"
        statistical_type = "binary"
        min_sample_size = 10

        [[metrics]]
        name = "sessions"
        aggregation = "count_events"
        statistical_type = "count"
    "#;

    fn parse(toml: &str) -> ExperimentFile {
        config::Config::builder()
            .add_source(config::File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn experiment_file_parses_and_validates() {
        let file = parse(EXPERIMENT_TOML);
        assert_eq!(file.experiment.id, "onboarding-v2");
        assert_eq!(file.metrics.len(), 2);

        let registry = file.build_registry().unwrap();
        assert_eq!(registry.get("activated").unwrap().min_sample_size, Some(10));
    }

    #[test]
    fn unknown_metric_reference_fails_validation() {
        let mut file = parse(EXPERIMENT_TOML);
        file.experiment.metrics.push("undefined".to_string());
        assert!(file.build_registry().is_err());
    }

    #[test]
    fn invalid_experiment_fails_validation() {
        let mut file = parse(EXPERIMENT_TOML);
        file.experiment.branches.truncate(1);
        assert!(file.build_registry().is_err());
    }
}
