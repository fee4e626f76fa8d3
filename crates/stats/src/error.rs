use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatsError {
    /// A metric value reached the treatment engine in a non-finite state.
    /// The coordinates and seed are everything needed to reproduce the
    /// failing computation deterministically.
    #[error("Non-finite metric value: experiment '{experiment}', window '{window}', metric '{metric}', branch '{branch}' (seed {seed})")]
    NonFiniteInput {
        experiment: String,
        window: String,
        metric: String,
        branch: String,
        seed: u64,
    },

    #[error("Invalid treatment configuration: {0}")]
    InvalidConfig(String),
}
