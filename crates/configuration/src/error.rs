use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from file: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid experiment definition: {0}")]
    Experiment(#[from] core_types::CoreError),

    #[error("Invalid metric configuration: {0}")]
    Metrics(#[from] registry::error::RegistryError),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}
