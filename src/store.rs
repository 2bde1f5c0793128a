//! Persisted evaluation runs under `<cache_root>/runs/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::model::{EvaluationReport, RunRecord};
use crate::util::{now_utc_string, read_json, utc_compact_string, write_json_pretty};

pub const RUN_MANIFEST_VERSION: u32 = 1;

pub struct JsonRunStore {
    runs_dir: PathBuf,
}

impl JsonRunStore {
    pub fn new(cache_root: &Path) -> Self {
        Self {
            runs_dir: cache_root.join("runs"),
        }
    }

    pub fn runs_dir(&self) -> &Path {
        &self.runs_dir
    }

    /// Writes the report as `<run_id>.json`; run ids never overwrite an earlier run.
    pub fn save(
        &self,
        report: EvaluationReport,
        total_questions: usize,
    ) -> Result<(RunRecord, PathBuf)> {
        let base_id = format!("eval-{}", utc_compact_string(Utc::now()));
        let mut run_id = base_id.clone();
        let mut attempt = 1;
        while self.record_path(&run_id).exists() {
            attempt += 1;
            run_id = format!("{base_id}-{attempt}");
        }

        let record = RunRecord {
            manifest_version: RUN_MANIFEST_VERSION,
            run_id,
            generated_at: now_utc_string(),
            dataset_id: report.dataset_id.clone(),
            total_questions,
            report,
        };
        let path = self.record_path(&record.run_id);
        write_json_pretty(&path, &record)?;
        info!(run_id = %record.run_id, path = %path.display(), "evaluation run saved");
        Ok((record, path))
    }

    pub fn load(&self, run_id: &str) -> Result<RunRecord> {
        read_json(&self.record_path(run_id))
    }

    /// All readable runs, oldest first. Unreadable files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<RunRecord>> {
        if !self.runs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = fs::read_dir(&self.runs_dir)
            .with_context(|| format!("failed to list {}", self.runs_dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect::<Vec<PathBuf>>();
        paths.sort();

        let mut records = Vec::<RunRecord>::with_capacity(paths.len());
        for path in paths {
            match read_json::<RunRecord>(&path) {
                Ok(record) => records.push(record),
                Err(err) => warn!(
                    path = %path.display(),
                    error = %err,
                    "skipping unreadable run record"
                ),
            }
        }
        records.sort_by(|left, right| {
            left.generated_at
                .cmp(&right.generated_at)
                .then_with(|| left.run_id.cmp(&right.run_id))
        });
        Ok(records)
    }

    fn record_path(&self, run_id: &str) -> PathBuf {
        self.runs_dir.join(format!("{run_id}.json"))
    }
}
