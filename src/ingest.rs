use crate::collaborators::WordEnricher;
use crate::db::Database;
use crate::error::DrillError;
use serde::Serialize;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum IngestStatus {
    Inserted,
    Exists,
    Failed,
}

/// Outcome of a bulk ingestion, one bucket per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub inserted: Vec<String>,
    pub exists: Vec<String>,
    pub failed: Vec<String>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.inserted.len() + self.exists.len() + self.failed.len()
    }

    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.exists.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    fn record(&mut self, word: String, status: IngestStatus) {
        match status {
            IngestStatus::Inserted => self.inserted.push(word),
            IngestStatus::Exists => self.exists.push(word),
            IngestStatus::Failed => self.failed.push(word),
        }
    }
}

/// Adds raw words to the inventory, enriching each new one first
pub struct Ingestor<'a, E: WordEnricher> {
    db: &'a Database,
    enricher: E,
}

impl<'a, E: WordEnricher> Ingestor<'a, E> {
    pub fn new(db: &'a Database, enricher: E) -> Self {
        Self { db, enricher }
    }

    /// Ingest one word; failures are reported as a status, never raised
    pub fn ingest_word(&self, word: &str, critical: bool) -> IngestStatus {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            warn!("skipping empty word");
            return IngestStatus::Failed;
        }

        match self.db.vocab().get(&word) {
            Ok(Some(_)) => {
                info!(word = %word, "already stored, skipping");
                return IngestStatus::Exists;
            }
            Ok(None) => {}
            Err(e) => {
                error!(word = %word, error = %e, "lookup failed");
                return IngestStatus::Failed;
            }
        }

        let mut record = match self.enricher.enrich(&word) {
            Ok(record) => record,
            Err(e) => {
                error!(word = %word, error = %e, "enrichment failed");
                return IngestStatus::Failed;
            }
        };
        if record.word.trim().is_empty() {
            error!(word = %word, "enrichment returned an empty record");
            return IngestStatus::Failed;
        }
        // keep the key the learner asked for, even if the record names a variant
        record.word = word.clone();

        match self.db.vocab().insert(&record, critical) {
            Ok(_) => IngestStatus::Inserted,
            Err(DrillError::Conflict(_)) => IngestStatus::Exists,
            Err(e) => {
                error!(word = %word, error = %e, "insert failed");
                IngestStatus::Failed
            }
        }
    }

    pub fn ingest_wordlist<I, S>(&self, words: I, critical: bool) -> IngestReport
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = IngestReport::default();
        for word in words {
            let normalized = word.as_ref().trim().to_lowercase();
            let status = self.ingest_word(&normalized, critical);
            report.record(normalized, status);
        }

        info!(
            total = report.total(),
            inserted = report.inserted_count(),
            skipped = report.skipped_count(),
            failed = report.failed_count(),
            "ingestion finished"
        );
        report
    }
}
