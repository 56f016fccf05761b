//! Feedback Store
//!
//! Durable, append-only record of rating events plus derived per-backend
//! aggregates. Records are appended to a JSONL log (one human-readable
//! record per line) that survives restarts; aggregates are rebuilt by
//! replaying the log at open and maintained incrementally afterwards.
//!
//! The store is the only owner of feedback state: `record` is the single
//! mutator, and its internal locking is invisible to callers. Ratings are
//! validated at the boundary — an out-of-range rating is rejected before it
//! can touch the log or the aggregates.

use crate::error::EngineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Task text is truncated to this many characters before storage
const TASK_TEXT_LIMIT: usize = 200;

/// One rating event, as appended to the log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// The task the rating refers to, truncated for storage
    pub task_text: String,

    /// The backend being rated
    pub backend: String,

    /// Rating on the 1-5 scale
    pub rating: u8,

    /// Optional free-form comment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    /// When the rating was recorded
    pub timestamp: DateTime<Utc>,
}

/// Derived count/mean summary for one backend
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendAggregate {
    /// The backend the aggregate describes
    pub backend: String,

    /// Number of ratings recorded for this backend
    pub count: u64,

    /// Arithmetic mean of exactly this backend's recorded ratings;
    /// 0.0 when no ratings exist
    pub mean_rating: f64,
}

impl BackendAggregate {
    /// The zero aggregate returned for backends with no recorded ratings
    pub fn zero(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            count: 0,
            mean_rating: 0.0,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    count: u64,
    sum: u64,
}

impl Tally {
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

struct Inner {
    log: File,
    tallies: HashMap<String, Tally>,
    total: u64,
}

/// Append-only feedback store with in-memory aggregates
pub struct FeedbackStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl FeedbackStore {
    /// Open the store at the given log path, creating the file (and parent
    /// directories) if needed and replaying any existing records to rebuild
    /// the aggregates.
    pub fn open(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                EngineError::Storage(format!(
                    "failed to create feedback directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let log = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| {
                EngineError::Storage(format!(
                    "failed to open feedback log {}: {}",
                    path.display(),
                    e
                ))
            })?;

        let mut tallies: HashMap<String, Tally> = HashMap::new();
        let mut total = 0u64;

        for (line_no, line) in BufReader::new(&log).lines().enumerate() {
            let line = line.map_err(|e| {
                EngineError::Storage(format!(
                    "failed to read feedback log {}: {}",
                    path.display(),
                    e
                ))
            })?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<FeedbackRecord>(&line) {
                Ok(record) if (1..=5).contains(&record.rating) => {
                    let tally = tallies.entry(record.backend).or_default();
                    tally.count += 1;
                    tally.sum += u64::from(record.rating);
                    total += 1;
                }
                Ok(record) => {
                    tracing::warn!(
                        "Skipping feedback record with out-of-range rating {} at {}:{}",
                        record.rating,
                        path.display(),
                        line_no + 1
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Skipping malformed feedback record at {}:{}: {}",
                        path.display(),
                        line_no + 1,
                        e
                    );
                }
            }
        }

        tracing::info!(
            "Opened feedback log {} ({} records, {} backends)",
            path.display(),
            total,
            tallies.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(Inner {
                log,
                tallies,
                total,
            }),
        })
    }

    /// Record a rating event.
    ///
    /// Validates `rating` ∈ [1, 5] before touching any state, appends the
    /// record to the durable log, then updates the in-memory aggregate for
    /// that backend. The append and the aggregate update happen under one
    /// lock so concurrent callers never lose a rating.
    pub fn record(
        &self,
        task_text: &str,
        backend: &str,
        rating: i64,
        comment: Option<String>,
    ) -> Result<(), EngineError> {
        if !(1..=5).contains(&rating) {
            return Err(EngineError::Validation(format!(
                "rating must be between 1 and 5, got {}",
                rating
            )));
        }

        let record = FeedbackRecord {
            task_text: task_text.chars().take(TASK_TEXT_LIMIT).collect(),
            backend: backend.to_string(),
            rating: rating as u8,
            comment,
            timestamp: Utc::now(),
        };

        let line = serde_json::to_string(&record)
            .map_err(|e| EngineError::Storage(format!("failed to serialize record: {}", e)))?;

        let mut inner = self.lock()?;

        writeln!(inner.log, "{}", line).map_err(|e| {
            EngineError::Storage(format!(
                "failed to append to feedback log {}: {}",
                self.path.display(),
                e
            ))
        })?;
        inner.log.flush().map_err(|e| {
            EngineError::Storage(format!(
                "failed to flush feedback log {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let tally = inner.tallies.entry(record.backend.clone()).or_default();
        tally.count += 1;
        tally.sum += u64::from(record.rating);
        inner.total += 1;

        tracing::debug!(
            "Recorded rating {} for backend {} ({} total)",
            record.rating,
            record.backend,
            inner.total
        );

        Ok(())
    }

    /// Aggregate for one backend. Unknown backends yield the zero
    /// aggregate, never an error.
    pub fn aggregates_for(&self, backend: &str) -> BackendAggregate {
        let inner = match self.lock() {
            Ok(inner) => inner,
            Err(_) => return BackendAggregate::zero(backend),
        };

        match inner.tallies.get(backend) {
            Some(tally) => BackendAggregate {
                backend: backend.to_string(),
                count: tally.count,
                mean_rating: tally.mean(),
            },
            None => BackendAggregate::zero(backend),
        }
    }

    /// Aggregates for every backend with at least one rating, keyed and
    /// ordered by backend name.
    pub fn summary(&self) -> BTreeMap<String, BackendAggregate> {
        let inner = match self.lock() {
            Ok(inner) => inner,
            Err(_) => return BTreeMap::new(),
        };

        inner
            .tallies
            .iter()
            .map(|(name, tally)| {
                (
                    name.clone(),
                    BackendAggregate {
                        backend: name.clone(),
                        count: tally.count,
                        mean_rating: tally.mean(),
                    },
                )
            })
            .collect()
    }

    /// Total number of recorded rating events
    pub fn total_entries(&self) -> u64 {
        self.lock().map(|inner| inner.total).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, EngineError> {
        self.inner
            .lock()
            .map_err(|_| EngineError::Storage("feedback store lock poisoned".to_string()))
    }
}
