use crate::dataset::DatasetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// The raw dataset was unreachable or returned malformed rows. This
    /// fails the whole window computation: a partially joined metric table
    /// would silently bias every estimate built on it.
    #[error("Data source failure: {0}")]
    DataSource(#[from] DatasetError),
}
