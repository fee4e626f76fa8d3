use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Experiment precondition failed: {0}")]
    Experiment(#[from] core_types::CoreError),

    #[error("Metric precondition failed: {0}")]
    Metrics(#[from] registry::error::RegistryError),

    #[error("Treatment configuration invalid: {0}")]
    Treatment(#[from] stats::StatsError),

    #[error("Progress bar template error: {0}")]
    Progress(String),
}
