//! In-memory [`AttainmentRecordStore`], used by tests and dry runs.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    AttainmentKey, AttainmentRecord, CopoMatrixEntry, CourseOutcome, FeedbackResponse, SubjectId,
};
use crate::store::{Ack, AttainmentRecordStore};

#[derive(Debug, Default)]
struct Tables {
    records: HashMap<AttainmentKey, AttainmentRecord>,
    matrices: HashMap<SubjectId, Vec<CopoMatrixEntry>>,
    feedback: HashMap<SubjectId, Vec<FeedbackResponse>>,
    course_outcomes: HashMap<SubjectId, Vec<CourseOutcome>>,
    failing_keys: HashSet<AttainmentKey>,
}

#[derive(Debug, Default)]
pub struct MemoryAttainmentStore {
    tables: Mutex<Tables>,
}

impl MemoryAttainmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn set_copo_matrix(
        &self,
        subject: SubjectId,
        rows: Vec<CopoMatrixEntry>,
    ) -> StoreResult<()> {
        self.tables()?.matrices.insert(subject, rows);
        Ok(())
    }

    pub fn set_feedback(
        &self,
        subject: SubjectId,
        responses: Vec<FeedbackResponse>,
    ) -> StoreResult<()> {
        self.tables()?.feedback.insert(subject, responses);
        Ok(())
    }

    pub fn set_course_outcomes(
        &self,
        subject: SubjectId,
        outcomes: Vec<CourseOutcome>,
    ) -> StoreResult<()> {
        self.tables()?.course_outcomes.insert(subject, outcomes);
        Ok(())
    }

    /// Make every later save under `key` fail with a backend error.
    pub fn fail_saves_for(&self, key: AttainmentKey) -> StoreResult<()> {
        self.tables()?.failing_keys.insert(key);
        Ok(())
    }

    pub fn record_count(&self) -> StoreResult<usize> {
        Ok(self.tables()?.records.len())
    }
}

#[async_trait]
impl AttainmentRecordStore for MemoryAttainmentStore {
    async fn load(&self, key: &AttainmentKey) -> StoreResult<Option<AttainmentRecord>> {
        Ok(self.tables()?.records.get(key).cloned())
    }

    async fn save(&self, record: &AttainmentRecord) -> StoreResult<Ack> {
        let key = record.key();
        let mut tables = self.tables()?;
        if tables.failing_keys.contains(&key) {
            return Err(StoreError::Backend(format!("save rejected for {key}")));
        }
        Ok(match tables.records.insert(key, record.clone()) {
            Some(_) => Ack::Replaced,
            None => Ack::Inserted,
        })
    }

    async fn load_copo_matrix(&self, subject: &SubjectId) -> StoreResult<Vec<CopoMatrixEntry>> {
        Ok(self.tables()?.matrices.get(subject).cloned().unwrap_or_default())
    }

    async fn load_feedback(&self, subject: &SubjectId) -> StoreResult<Vec<FeedbackResponse>> {
        Ok(self.tables()?.feedback.get(subject).cloned().unwrap_or_default())
    }

    async fn load_course_outcomes(&self, subject: &SubjectId) -> StoreResult<Vec<CourseOutcome>> {
        Ok(self
            .tables()?
            .course_outcomes
            .get(subject)
            .cloned()
            .unwrap_or_default())
    }
}
