//! Sessions and fetch runs
//!
//! A session owns the memoization cache; every run belongs to exactly
//! one session. Runs execute in a spawned task, one lookup at a time,
//! and publish progress through an atomic counter so status polls
//! never block on the fetch loop. Because a run holds the session
//! cache for its whole batch, runs within one session serialize, which
//! keeps the one-request-per-identifier guarantee intact.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard};
use uuid::Uuid;

use imcite_core::fetch::{fetch_all, FetchCache};
use imcite_core::sources::crossref::CrossrefSource;
use imcite_core::table::ResultTable;

/// A browser session: one cache, any number of runs.
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub cache: RwLock<FetchCache>,
    pub runs: RwLock<HashMap<Uuid, Arc<Run>>>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            cache: RwLock::new(FetchCache::new()),
            runs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// One batch of lookups over a fixed identifier list.
pub struct Run {
    pub id: Uuid,
    pub session_id: Uuid,
    pub identifiers: Vec<String>,
    pub upload_warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    completed: AtomicUsize,
    outcome: RwLock<Option<RunOutcome>>,
}

/// What a finished run leaves behind.
pub struct RunOutcome {
    pub table: ResultTable,
    pub warnings: Vec<String>,
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl Run {
    pub fn new(session_id: Uuid, identifiers: Vec<String>, upload_warnings: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            identifiers,
            upload_warnings,
            started_at: Utc::now(),
            completed: AtomicUsize::new(0),
            outcome: RwLock::new(None),
        }
    }

    pub fn total(&self) -> usize {
        self.identifiers.len()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    pub async fn outcome(&self) -> RwLockReadGuard<'_, Option<RunOutcome>> {
        self.outcome.read().await
    }
}

/// Execute a run to completion and store its outcome.
pub async fn execute_run(source: CrossrefSource, session: Arc<Session>, run: Arc<Run>) {
    tracing::info!("Run {} started with {} identifiers", run.id, run.total());

    let report = {
        let mut cache = session.cache.write().await;
        fetch_all(&source, &mut cache, &run.identifiers, |completed, total| {
            run.completed.store(completed, Ordering::Relaxed);
            tracing::debug!("Run {}: {}/{} lookups done", run.id, completed, total);
        })
        .await
    };

    for warning in &report.warnings {
        tracing::warn!("Run {}: {}", run.id, warning);
    }

    let error = report
        .all_empty()
        .then(|| "No metadata retrieved. Please check the DOIs and try again.".to_string());

    let mut warnings = run.upload_warnings.clone();
    warnings.extend(report.warnings);
    let table = ResultTable::from_records(&report.records);

    *run.outcome.write().await = Some(RunOutcome {
        table,
        warnings,
        error,
        finished_at: Utc::now(),
    });

    tracing::info!("Run {} complete", run.id);
}
