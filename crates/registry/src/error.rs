use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Duplicate metric definition: '{0}'")]
    DuplicateMetric(String),

    #[error("Unknown metric: '{0}'")]
    UnknownMetric(String),

    #[error("Metric '{metric}': aggregation {aggregation} is not compatible with statistical type {statistical_type}")]
    IncompatibleAggregation {
        metric: String,
        aggregation: String,
        statistical_type: String,
    },
}
