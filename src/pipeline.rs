//! End-to-end attainment computation for a subject: prerequisite loads,
//! direct, indirect and overall CO attainment, then PO/PSO projection.

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{debug, info, instrument};

use crate::components::{exam_co_levels, CoComponentMap, ExamSheet};
use crate::config::EngineConfig;
use crate::copo::{copo_average, project, ProgramAttainment};
use crate::direct::{direct_record, union_co_numbers};
use crate::error::StoreResult;
use crate::indirect::indirect_record;
use crate::models::{
    Attainment, AttainmentKey, AttainmentRecord, AttainmentType, ExamType, SubjectId,
};
use crate::overall::{average_overall_record, overall_record};
use crate::store::{save_all, Ack, AttainmentRecordStore, AttainmentState, BulkSaveReport};

/// Everything computed for one subject in one run.
#[derive(Debug, Clone)]
pub struct SubjectAttainment {
    pub subject: SubjectId,
    pub co_numbers: Vec<String>,
    pub direct: AttainmentRecord,
    pub indirect: AttainmentRecord,
    pub overall: AttainmentRecord,
    pub average_overall: Attainment,
    pub program: ProgramAttainment,
    pub states: BTreeMap<AttainmentKey, AttainmentState>,
}

impl SubjectAttainment {
    pub fn records(&self) -> [&AttainmentRecord; 3] {
        [&self.direct, &self.indirect, &self.overall]
    }

    pub fn state_of(&self, key: &AttainmentKey) -> AttainmentState {
        self.states
            .get(key)
            .copied()
            .unwrap_or(AttainmentState::Uncomputed)
    }
}

fn exam_key(subject: &SubjectId, exam_type: ExamType) -> AttainmentKey {
    AttainmentKey::new(subject.clone(), exam_type, AttainmentType::Direct)
}

/// Score an exam sheet into per-CO levels and store it as that exam's `direct` record.
pub async fn record_exam<S>(
    store: &S,
    sheet: &ExamSheet,
    map: &CoComponentMap,
    config: &EngineConfig,
) -> StoreResult<(AttainmentRecord, Ack)>
where
    S: AttainmentRecordStore + ?Sized,
{
    let record = exam_co_levels(sheet, map, config);
    let ack = store.save(&record).await?;
    info!(key = %record.key(), cos = record.attainment_data.len(), ?ack, "exam levels stored");
    Ok((record, ack))
}

#[instrument(skip_all, fields(subject = %subject))]
pub async fn compute_subject<S>(store: &S, subject: &SubjectId) -> StoreResult<SubjectAttainment>
where
    S: AttainmentRecordStore + ?Sized,
{
    let cie1_key = exam_key(subject, ExamType::Cie1);
    let cie2_key = exam_key(subject, ExamType::Cie2);
    let see_key = exam_key(subject, ExamType::See);

    let (cie1, cie2, see, outcomes, feedback, matrix) = tokio::join!(
        store.load(&cie1_key),
        store.load(&cie2_key),
        store.load(&see_key),
        store.load_course_outcomes(subject),
        store.load_feedback(subject),
        store.load_copo_matrix(subject),
    );
    let (cie1, cie2, see) = (cie1?, cie2?, see?);
    let (outcomes, feedback, matrix) = (outcomes?, feedback?, matrix?);

    debug!(
        cie1 = cie1.is_some(),
        cie2 = cie2.is_some(),
        see = see.is_some(),
        responses = feedback.len(),
        matrix_rows = matrix.len(),
        "prerequisites loaded"
    );

    let co_numbers: Vec<String> = if outcomes.is_empty() {
        union_co_numbers(&[cie1.as_ref(), cie2.as_ref(), see.as_ref()])
    } else {
        outcomes.into_iter().map(|co| co.co_no).collect()
    };

    let direct = direct_record(subject, &co_numbers, cie1.as_ref(), cie2.as_ref(), see.as_ref());
    let indirect = indirect_record(subject, &feedback, &co_numbers);
    let overall = overall_record(subject, &direct, &indirect);

    let (average_overall, program) = match average_overall_record(&overall) {
        Ok(average) => (Attainment::Value(average), project(&matrix, average)),
        Err(err) => {
            debug!(error = %err, "no computable overall attainment; PO/PSO left uncomputed");
            (
                Attainment::NotComputable,
                ProgramAttainment::not_computable(copo_average(subject, &matrix)),
            )
        }
    };

    let states = [&direct, &indirect, &overall]
        .into_iter()
        .map(|record| (record.key(), AttainmentState::Computed))
        .collect();

    info!(
        cos = co_numbers.len(),
        average_overall = %average_overall,
        "subject attainment computed"
    );

    Ok(SubjectAttainment {
        subject: subject.clone(),
        co_numbers,
        direct,
        indirect,
        overall,
        average_overall,
        program,
        states,
    })
}

/// Compute independent subjects concurrently, one result per subject.
pub async fn compute_subjects<S>(
    store: &S,
    subjects: &[SubjectId],
) -> Vec<(SubjectId, StoreResult<SubjectAttainment>)>
where
    S: AttainmentRecordStore + ?Sized,
{
    let results = join_all(subjects.iter().map(|subject| compute_subject(store, subject))).await;
    subjects.iter().cloned().zip(results).collect()
}

/// Save the computed records of a subject, advancing saved keys to `Persisted`.
pub async fn persist<S>(store: &S, computed: &mut SubjectAttainment) -> BulkSaveReport
where
    S: AttainmentRecordStore + ?Sized,
{
    let records: Vec<AttainmentRecord> = computed.records().into_iter().cloned().collect();
    let report = save_all(store, &records).await;

    for outcome in report.outcomes.iter().filter(|o| o.result.is_ok()) {
        if let Some(state) = computed.states.get_mut(&outcome.key) {
            if let Some(next) = state.persisted() {
                *state = next;
            }
        }
    }
    report
}
