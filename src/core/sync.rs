use crate::core::registry::Domain;
use crate::domain::{ImagingStudy, StudyKey, StudyQuery};
use crate::utils::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncPhase {
    Resolving,
    Deduplicating,
    Transferring,
    Done,
    Failed,
}

/// Progress of a send run. Rendering is up to the sink.
#[derive(Debug, Clone, Serialize)]
pub enum SyncEvent {
    Phase(SyncPhase),
    Resolved {
        candidates: usize,
    },
    Deduplicated {
        duplicates: usize,
        to_send: usize,
    },
    StudyStarted {
        study: ImagingStudy,
        index: usize,
        total: usize,
    },
    StudySent {
        study: ImagingStudy,
    },
    StudyFailed {
        study: ImagingStudy,
        error: String,
    },
    Failed {
        error: String,
    },
    Finished(SendReport),
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

/// Writes every event as a tracing record.
#[derive(Debug, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::Phase(phase) => tracing::debug!("Phase: {:?}", phase),
            SyncEvent::Resolved { candidates } => {
                tracing::info!("🔍 Found {} matching studies", candidates)
            }
            SyncEvent::Deduplicated {
                duplicates,
                to_send,
            } => tracing::info!(
                "📋 {} already at destination, {} to send",
                duplicates,
                to_send
            ),
            SyncEvent::StudyStarted {
                study,
                index,
                total,
            } => tracing::info!("📤 [{}/{}] Sending {}", index + 1, total, study),
            SyncEvent::StudySent { study } => tracing::info!("✅ Sent {}", study),
            SyncEvent::StudyFailed { study, error } => {
                tracing::error!("❌ Failed to send {}: {}", study, error)
            }
            SyncEvent::Failed { error } => tracing::error!("❌ Send aborted: {}", error),
            SyncEvent::Finished(report) => tracing::info!("🏁 {}", report.summary()),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &SyncEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Resolve and deduplicate, but do not transfer anything.
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedTransfer {
    pub study: ImagingStudy,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendReport {
    pub query: String,
    pub destination: String,
    pub dry_run: bool,
    pub candidates: usize,
    pub sent: Vec<ImagingStudy>,
    pub duplicates: Vec<ImagingStudy>,
    pub failed: Vec<FailedTransfer>,
    pub would_send: Vec<ImagingStudy>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SendReport {
    fn new(query: &StudyQuery, destination: &str, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            query: query.to_string(),
            destination: destination.to_string(),
            dry_run,
            candidates: 0,
            sent: Vec::new(),
            duplicates: Vec::new(),
            failed: Vec::new(),
            would_send: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.len()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.dry_run {
            return format!(
                "Dry run '{}' -> '{}': {} matched - would send: {}, duplicate: {}",
                self.query,
                self.destination,
                self.candidates,
                self.would_send.len(),
                self.duplicate_count()
            );
        }
        format!(
            "Processed {} studies '{}' -> '{}' - sent: {}, duplicate: {}, failed: {}",
            self.candidates,
            self.query,
            self.destination,
            self.sent_count(),
            self.duplicate_count(),
            self.failed_count()
        )
    }
}

impl fmt::Display for SendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

/// Copies studies matching a query into a destination place, skipping everything the
/// destination already has. One study at a time; a failed study does not stop the run.
pub struct SyncEngine<'a> {
    domain: &'a Domain,
    events: Arc<dyn EventSink>,
}

impl<'a> SyncEngine<'a> {
    pub fn new(domain: &'a Domain) -> Self {
        Self::with_events(domain, Arc::new(TracingEventSink))
    }

    pub fn with_events(domain: &'a Domain, events: Arc<dyn EventSink>) -> Self {
        Self { domain, events }
    }

    fn emit(&self, event: SyncEvent) {
        self.events.emit(&event);
    }

    fn abort(&self, error: SyncError) -> SyncError {
        self.emit(SyncEvent::Failed {
            error: error.to_string(),
        });
        self.emit(SyncEvent::Phase(SyncPhase::Failed));
        error
    }

    pub async fn send(
        &self,
        query: &StudyQuery,
        destination_key: &str,
        options: SendOptions,
    ) -> Result<SendReport> {
        let mut report = SendReport::new(query, destination_key, options.dry_run);

        self.emit(SyncEvent::Phase(SyncPhase::Resolving));
        let destination = self
            .domain
            .get(destination_key)
            .map_err(|e| self.abort(e))?;
        let candidates = self.domain.resolve(query).await.map_err(|e| self.abort(e))?;
        report.candidates = candidates.len();
        self.emit(SyncEvent::Resolved {
            candidates: candidates.len(),
        });

        self.emit(SyncEvent::Phase(SyncPhase::Deduplicating));
        let mut queued: HashSet<StudyKey> = HashSet::new();
        let mut to_send = Vec::new();
        for study in candidates {
            // the same key from a second source place is already covered by the first
            let present = queued.contains(&study.key)
                || destination
                    .has_study(&study.key)
                    .await
                    .map_err(|e| self.abort(e))?;
            if present {
                report.duplicates.push(study);
            } else {
                queued.insert(study.key.clone());
                to_send.push(study);
            }
        }
        self.emit(SyncEvent::Deduplicated {
            duplicates: report.duplicates.len(),
            to_send: to_send.len(),
        });

        if options.dry_run {
            report.would_send = to_send;
        } else {
            self.emit(SyncEvent::Phase(SyncPhase::Transferring));
            let total = to_send.len();
            for (index, study) in to_send.into_iter().enumerate() {
                self.emit(SyncEvent::StudyStarted {
                    study: study.clone(),
                    index,
                    total,
                });
                match self.transfer(&study, destination_key).await {
                    Ok(()) => {
                        self.emit(SyncEvent::StudySent {
                            study: study.clone(),
                        });
                        report.sent.push(study);
                    }
                    Err(e) => {
                        let error = e.to_string();
                        self.emit(SyncEvent::StudyFailed {
                            study: study.clone(),
                            error: error.clone(),
                        });
                        report.failed.push(FailedTransfer { study, error });
                    }
                }
            }
        }

        report.finished_at = Utc::now();
        self.emit(SyncEvent::Phase(SyncPhase::Done));
        self.emit(SyncEvent::Finished(report.clone()));
        Ok(report)
    }

    async fn transfer(&self, study: &ImagingStudy, destination_key: &str) -> Result<()> {
        let source = self.domain.get(&study.place_key)?;
        let destination = self.domain.get(destination_key)?;
        destination
            .send_study(&study.key, source)
            .await
            .map_err(|e| match e {
                SyncError::Transfer { .. } => e,
                other => SyncError::Transfer {
                    study: study.to_string(),
                    message: other.to_string(),
                },
            })
    }
}
