//! Persistence boundary for attainment snapshots.
//!
//! The engine reads prerequisite records, correlation matrices and survey
//! responses through [`AttainmentRecordStore`] and writes computed records
//! back through it. Saving is keyed on `(subject, exam type, attainment type)`
//! and overwrites: a key never holds more than one record.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::models::{
    AttainmentKey, AttainmentRecord, CopoMatrixEntry, CourseOutcome, FeedbackResponse, SubjectId,
};

/// Acknowledgement of a save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Ack {
    Inserted,
    Replaced,
}

#[async_trait]
pub trait AttainmentRecordStore: Send + Sync {
    /// Current record under `key`, if one was ever saved.
    async fn load(&self, key: &AttainmentKey) -> StoreResult<Option<AttainmentRecord>>;

    /// Insert or replace the record under its key.
    async fn save(&self, record: &AttainmentRecord) -> StoreResult<Ack>;

    async fn load_copo_matrix(&self, subject: &SubjectId) -> StoreResult<Vec<CopoMatrixEntry>>;

    async fn load_feedback(&self, subject: &SubjectId) -> StoreResult<Vec<FeedbackResponse>>;

    /// The subject's COs in `CO1`..`CO5` order.
    async fn load_course_outcomes(&self, subject: &SubjectId) -> StoreResult<Vec<CourseOutcome>>;
}

/// Lifecycle of one attainment key within a computation.
///
/// There is no way back to `Uncomputed`; recomputing re-enters `Computed` and a
/// later save re-enters `Persisted` by overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttainmentState {
    Uncomputed,
    Computed,
    Persisted,
}

impl AttainmentState {
    /// `Persisted` only from `Computed`; nothing uncomputed can be saved.
    pub fn persisted(self) -> Option<Self> {
        match self {
            AttainmentState::Computed | AttainmentState::Persisted => {
                Some(AttainmentState::Persisted)
            }
            AttainmentState::Uncomputed => None,
        }
    }
}

/// Result of saving one unit of a bulk save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveOutcome {
    pub key: AttainmentKey,
    pub result: Result<Ack, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkSaveReport {
    pub outcomes: Vec<SaveOutcome>,
}

impl BulkSaveReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&AttainmentKey, &str)> {
        self.outcomes.iter().filter_map(|o| match &o.result {
            Ok(_) => None,
            Err(err) => Some((&o.key, err.as_str())),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Save each record independently; a failed unit never stops the rest.
pub async fn save_all<S>(store: &S, records: &[AttainmentRecord]) -> BulkSaveReport
where
    S: AttainmentRecordStore + ?Sized,
{
    let mut report = BulkSaveReport::default();

    for record in records {
        let key = record.key();
        let result = match store.save(record).await {
            Ok(ack) => Ok(ack),
            Err(err) => {
                warn!(key = %key, error = %err, "failed to save attainment record");
                Err(err.to_string())
            }
        };
        report.outcomes.push(SaveOutcome { key, result });
    }

    info!(
        saved = report.success_count(),
        failed = report.outcomes.len() - report.success_count(),
        "bulk save finished"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_never_returns_to_uncomputed() {
        let state = AttainmentState::Uncomputed;
        assert_eq!(state.persisted(), None);

        let persisted = AttainmentState::Computed.persisted().unwrap();
        assert_eq!(persisted, AttainmentState::Persisted);
        assert_eq!(persisted.persisted(), Some(AttainmentState::Persisted));
    }
}
