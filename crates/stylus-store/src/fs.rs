//! Filesystem store rooted at a data directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use stylus_core::model::{AnalysisRun, BatchSummary, Document, IndividualReport, StyleGuide};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::StoreError;

/// Corpus access plus durable persistence for every analysis artefact.
///
/// Implementations must make each save atomic: a reader never observes a
/// partially written file.
pub trait DocumentStore: Send + Sync {
    /// Document ids in ascending order. Stable across calls.
    fn list_documents(&self) -> Result<Vec<String>, StoreError>;

    fn read_document(&self, id: &str) -> Result<Document, StoreError>;

    /// The stored report, or `None` if absent or undecodable.
    fn load_report(&self, id: &str) -> Result<Option<IndividualReport>, StoreError>;

    /// Whether a report file exists, regardless of its content.
    fn has_report(&self, id: &str) -> Result<bool, StoreError>;

    fn save_report(&self, report: &IndividualReport) -> Result<(), StoreError>;

    fn save_batch_summary(&self, summary: &BatchSummary) -> Result<(), StoreError>;

    fn load_batch_summary(&self, batch_id: &str) -> Result<Option<BatchSummary>, StoreError>;

    fn save_run_log(&self, run: &AnalysisRun) -> Result<(), StoreError>;

    fn load_run_log(&self) -> Result<Option<AnalysisRun>, StoreError>;

    fn save_style_guide(&self, guide: &StyleGuide) -> Result<(), StoreError>;

    fn load_style_guide(&self) -> Result<Option<StyleGuide>, StoreError>;

    /// A report that may be reused instead of calling the oracle again.
    fn cached_report(&self, id: &str) -> Result<Option<IndividualReport>, StoreError> {
        Ok(self.load_report(id)?.filter(IndividualReport::is_valid))
    }

    /// Every document referenced by a recorded batch must have a report on disk.
    fn verify_run_consistency(&self, run: &AnalysisRun) -> Result<(), StoreError> {
        for batch in &run.batches {
            for id in &batch.document_ids {
                if !self.has_report(id)? {
                    return Err(StoreError::Inconsistent {
                        batch_id: batch.batch_id.clone(),
                        document_id: id.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Directory layout under the data root.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn corpus_dir(&self) -> PathBuf {
        self.root.join("extracted")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join("individual_reports")
    }

    pub fn summaries_dir(&self) -> PathBuf {
        self.root.join("batch_summaries")
    }

    pub fn document_path(&self, id: &str) -> PathBuf {
        self.corpus_dir().join(format!("{id}.txt"))
    }

    pub fn report_path(&self, id: &str) -> PathBuf {
        self.reports_dir().join(format!("{id}.json"))
    }

    pub fn summary_path(&self, batch_id: &str) -> PathBuf {
        self.summaries_dir().join(format!("{batch_id}.json"))
    }

    pub fn run_log_path(&self) -> PathBuf {
        self.root.join("analysis_log.json")
    }

    pub fn style_guide_path(&self) -> PathBuf {
        self.root.join("style_guide.json")
    }
}

/// JSON-on-disk store.
///
/// Writes go to a temp file in the destination directory and are renamed into
/// place, so a crash leaves either the old file or the new one.
pub struct FsStore {
    layout: Layout,
}

impl FsStore {
    /// Open a store at `root`, creating the output directories if needed.
    ///
    /// The corpus directory is not created; a missing one lists as empty.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let layout = Layout::new(root);
        for dir in [layout.reports_dir(), layout.summaries_dir()] {
            fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        info!(root = %layout.root().display(), "opened store");
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }
}

impl DocumentStore for FsStore {
    fn list_documents(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.layout.corpus_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(dir = %dir.display(), "corpus directory missing");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(&dir, e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&dir, e))?.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "txt") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        debug!(count = ids.len(), "listed corpus");
        Ok(ids)
    }

    fn read_document(&self, id: &str) -> Result<Document, StoreError> {
        let path = self.layout.document_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::DocumentNotFound(id.to_string()));
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        Ok(Document::new(id, text))
    }

    fn load_report(&self, id: &str) -> Result<Option<IndividualReport>, StoreError> {
        let path = self.layout.report_path(id);
        match read_json::<IndividualReport>(&path) {
            Ok(report) => Ok(report),
            Err(StoreError::Json { path, source }) => {
                warn!(path = %path.display(), error = %source, "corrupt report treated as absent");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn has_report(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.layout.report_path(id);
        path.try_exists().map_err(|e| StoreError::io(&path, e))
    }

    fn save_report(&self, report: &IndividualReport) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.report_path(&report.document_id), report)
    }

    fn save_batch_summary(&self, summary: &BatchSummary) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.summary_path(&summary.batch_id), summary)
    }

    fn load_batch_summary(&self, batch_id: &str) -> Result<Option<BatchSummary>, StoreError> {
        read_json(&self.layout.summary_path(batch_id))
    }

    fn save_run_log(&self, run: &AnalysisRun) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.run_log_path(), run)
    }

    fn load_run_log(&self) -> Result<Option<AnalysisRun>, StoreError> {
        read_json(&self.layout.run_log_path())
    }

    fn save_style_guide(&self, guide: &StyleGuide) -> Result<(), StoreError> {
        write_json_atomic(&self.layout.style_guide_path(), guide)
    }

    fn load_style_guide(&self) -> Result<Option<StyleGuide>, StoreError> {
        read_json(&self.layout.style_guide_path())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::json(path, e))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreError::Other(format!("no parent directory for {}", path.display())))?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| StoreError::json(path, e))?;
    tmp.write_all(b"\n").map_err(|e| StoreError::io(path, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(path, e))?;
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    debug!(path = %path.display(), "wrote");
    Ok(())
}
