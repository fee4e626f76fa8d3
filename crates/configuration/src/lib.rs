use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod experiment;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use experiment::{load_experiment, ExperimentFile};
pub use settings::{AnalysisSettings, RunSettings, StatisticsSettings};

/// Loads the analysis settings from the `config.toml` file.
///
/// This function is the primary entry point for this crate. Every setting
/// has a default, so a missing file yields the default configuration rather
/// than an error.
pub fn load_config() -> Result<AnalysisSettings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config.toml").required(false))
        .build()?;

    let settings = builder.try_deserialize::<AnalysisSettings>()?;
    Ok(settings)
}

/// Loads the analysis settings from an explicit path.
pub fn load_config_from(path: &Path) -> Result<AnalysisSettings, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path))
        .build()?;

    let settings = builder.try_deserialize::<AnalysisSettings>()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let settings: AnalysisSettings = config::Config::builder()
            .add_source(config::File::from_str(
                "[statistics]\nresamples = 500\n",
                FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.statistics.resamples, 500);
        // Untouched sections keep their defaults.
        assert!((settings.statistics.confidence_level - 0.95).abs() < f64::EPSILON);
        assert_eq!(settings.run.max_concurrent_windows, 4);
    }
}
