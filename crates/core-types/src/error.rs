use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid experiment '{0}': {1}")]
    InvalidExperiment(String, String),

    #[error("Invalid analysis window: {0}")]
    InvalidWindow(String),
}
