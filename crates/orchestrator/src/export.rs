use async_trait::async_trait;
use core_types::AnalysisWindow;
use stats::StatisticalResult;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export serialization failure: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The result export collaborator.
///
/// Receives one complete statistics table per (experiment, window). A
/// window's table is only ever handed over whole; consumers never observe a
/// partially written result set.
#[async_trait]
pub trait ResultExporter: Send + Sync {
    async fn export_window(
        &self,
        run_id: Uuid,
        experiment_id: &str,
        window: &AnalysisWindow,
        results: &[StatisticalResult],
    ) -> Result<(), ExportError>;
}

/// Conventional name of a window's statistics table.
pub fn statistics_table_name(experiment_id: &str, window: &AnalysisWindow) -> String {
    format!("statistics_{}_{}", experiment_id, window.label())
}

/// Writes each window's table as a JSON file under a fixed directory.
///
/// The file is written to a temporary sibling first and renamed into place,
/// so re-running a window replaces its prior table atomically.
#[derive(Debug, Clone)]
pub struct JsonFileExporter {
    dir: PathBuf,
}

impl JsonFileExporter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

#[async_trait]
impl ResultExporter for JsonFileExporter {
    async fn export_window(
        &self,
        run_id: Uuid,
        experiment_id: &str,
        window: &AnalysisWindow,
        results: &[StatisticalResult],
    ) -> Result<(), ExportError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let name = statistics_table_name(experiment_id, window);
        let path = self.dir.join(format!("{name}.json"));
        let tmp = self.dir.join(format!("{name}.json.{run_id}.tmp"));

        let payload = serde_json::to_vec_pretty(results)?;
        tokio::fs::write(&tmp, payload).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::info!(table = %name, rows = results.len(), "Exported statistics table");
        Ok(())
    }
}

/// Collects exported tables in memory, keyed by table name.
///
/// Useful for tests and for embedding the orchestrator without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryExporter {
    tables: Mutex<BTreeMap<String, Vec<StatisticalResult>>>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of everything exported so far.
    pub fn tables(&self) -> BTreeMap<String, Vec<StatisticalResult>> {
        self.tables.lock().expect("exporter mutex poisoned").clone()
    }
}

#[async_trait]
impl ResultExporter for MemoryExporter {
    async fn export_window(
        &self,
        _run_id: Uuid,
        experiment_id: &str,
        window: &AnalysisWindow,
        results: &[StatisticalResult],
    ) -> Result<(), ExportError> {
        let name = statistics_table_name(experiment_id, window);
        self.tables
            .lock()
            .expect("exporter mutex poisoned")
            .insert(name, results.to_vec());
        Ok(())
    }
}
