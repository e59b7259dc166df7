//! Response recording and the end-of-session results snapshot.
//!
//! The snapshot is a single JSON document named after the observer,
//! `<observer>-results.json`, holding the session parameters, the condition
//! list, the trial order and every recorded answer. It is written once, to a
//! temporary sibling that is renamed into place.

use crate::config::ExperimentConfig;
use crate::schedule::Trial;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use constim_core::{Answer, Condition};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub trial_index: usize,
    pub repetition: usize,
    pub condition: Condition,
    pub answer: Answer,
    /// Session timer reading when the answer arrived.
    pub timestamp_ns: u64,
}

/// Append-only list of answers, at most one per trial.
#[derive(Debug, Clone, Default)]
pub struct ResponseRecorder {
    records: Vec<ResponseRecord>,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, recording nothing, if `trial` already has an answer.
    pub fn record(&mut self, trial: &Trial, answer: Answer, timestamp_ns: u64) -> bool {
        if self.records.iter().any(|r| r.trial_index == trial.index) {
            return false;
        }
        self.records.push(ResponseRecord {
            trial_index: trial.index,
            repetition: trial.repetition,
            condition: trial.condition,
            answer,
            timestamp_ns,
        });
        true
    }

    pub fn records(&self) -> &[ResponseRecord] {
        &self.records
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionOutcome {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsTable {
    pub extra_info: ExperimentConfig,
    pub conditions: Vec<Condition>,
    /// Condition index of every scheduled trial, in presentation order.
    pub trial_order: Vec<usize>,
    pub records: Vec<ResponseRecord>,
    pub outcome: SessionOutcome,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
}

impl ResultsTable {
    pub fn n_total(&self) -> usize {
        self.trial_order.len()
    }

    /// Recorded (condition, answer) pairs in recording order.
    pub fn answers(&self) -> impl Iterator<Item = (&Condition, Answer)> {
        self.records.iter().map(|r| (&r.condition, r.answer))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("cannot open results file {}", path.display()))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("malformed results file {}", path.display()))
    }
}

/// Destination for the single end-of-session write.
pub trait ResultsStore {
    fn save(&self, table: &ResultsTable) -> Result<PathBuf>;
}

/// Writes `<dir>/<observer>-results.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, observer: &str) -> PathBuf {
        self.dir.join(format!("{}.json", results_name(observer)))
    }
}

impl ResultsStore for JsonFileStore {
    fn save(&self, table: &ResultsTable) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create output dir {}", self.dir.display()))?;

        let path = self.path_for(&table.extra_info.observer_name);
        let tmp = path.with_extension("json.tmp");
        {
            let file = File::create(&tmp)
                .with_context(|| format!("cannot create {}", tmp.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, table).context("serializing results")?;
            writer.flush()?;
        }
        fs::rename(&tmp, &path)
            .with_context(|| format!("cannot move results into {}", path.display()))?;

        info!(
            path = %path.display(),
            records = table.records.len(),
            "results saved"
        );
        Ok(path)
    }
}

/// Store name for an observer: `<observer>-results`.
///
/// Characters outside `[A-Za-z0-9_-]` become `_`; an empty name becomes `anonymous`.
pub fn results_name(observer: &str) -> String {
    let cleaned: String = observer
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if cleaned.is_empty() {
        "anonymous"
    } else {
        cleaned.as_str()
    };
    format!("{stem}-results")
}
