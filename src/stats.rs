//! Per-day statistics records and their JSON store.
//!
//! The file holds a single JSON array of day records, most recent last.
//! Saving on the same calendar day as the last record sums into it; any
//! other day appends a new record. A missing file is an empty history; an
//! unreadable one is a hard error so data is never silently discarded.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::Totals;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("could not access statistics file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("statistics file {path} is corrupt; fix or remove it")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not encode statistics")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecord {
    pub id: String,
    pub total_break_time: u64,
    pub total_work_time: u64,
    pub completed_work_sessions: u32,
}

/// Local-date key in the `YYYY/M/D` form the statistics file uses
/// (no zero-padding).
pub fn date_key(date: NaiveDate) -> String {
    format!("{}/{}/{}", date.year(), date.month(), date.day())
}

/// Fold a run's totals into the record list under the append policy.
pub fn fold_into(records: &mut Vec<DailyRecord>, key: &str, totals: &Totals) {
    match records.last_mut() {
        Some(last) if last.id == key => {
            last.total_work_time += totals.work_secs;
            last.total_break_time += totals.break_secs;
            last.completed_work_sessions += totals.completed_work_sessions;
        }
        _ => records.push(DailyRecord {
            id: key.to_owned(),
            total_break_time: totals.break_secs,
            total_work_time: totals.work_secs,
            completed_work_sessions: totals.completed_work_sessions,
        }),
    }
}

pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the full history. Missing or blank files read as empty.
    pub fn load(&self) -> Result<Vec<DailyRecord>, StatsError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| StatsError::Io {
            path: self.path.clone(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&raw).map_err(|source| StatsError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Merge the totals into today's record and write the history back.
    /// A file that fails to parse is left untouched.
    pub fn record(&self, totals: &Totals) -> Result<(), StatsError> {
        self.record_for(&date_key(Local::now().date_naive()), totals)
    }

    fn record_for(&self, key: &str, totals: &Totals) -> Result<(), StatsError> {
        let mut records = self.load()?;
        fold_into(&mut records, key, totals);

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|source| StatsError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            }
        }
        let body = serde_json::to_string_pretty(&records)?;
        fs::write(&self.path, body).map_err(|source| StatsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
