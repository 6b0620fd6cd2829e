//! Contract tests for `AttainmentRecordStore`, run against the in-memory store.

use outcome_attainment::models::{
    Attainment, AttainmentEntry, AttainmentKey, AttainmentRecord, AttainmentType, ExamType,
    SubjectId,
};
use outcome_attainment::store::memory::MemoryAttainmentStore;
use outcome_attainment::store::{save_all, Ack, AttainmentRecordStore};

fn overall(subject: &str, level: f64) -> AttainmentRecord {
    AttainmentRecord::new(
        SubjectId::from(subject),
        ExamType::Computed,
        AttainmentType::ComputedOverall,
        vec![AttainmentEntry::new("C211.1", Attainment::Value(level))],
    )
}

#[tokio::test]
async fn load_missing_key_is_none() {
    let store = MemoryAttainmentStore::new();
    let key = AttainmentKey::new(SubjectId::from("C211"), ExamType::See, AttainmentType::Direct);

    assert!(store.load(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn save_then_load_round_trip() {
    let store = MemoryAttainmentStore::new();
    let record = overall("C211", 2.12);

    assert_eq!(store.save(&record).await.unwrap(), Ack::Inserted);
    assert_eq!(store.load(&record.key()).await.unwrap(), Some(record));
}

#[tokio::test]
async fn second_save_replaces_instead_of_duplicating() {
    let store = MemoryAttainmentStore::new();
    let first = overall("C211", 2.12);
    let second = overall("C211", 1.5);

    store.save(&first).await.unwrap();
    assert_eq!(store.save(&second).await.unwrap(), Ack::Replaced);

    assert_eq!(store.record_count().unwrap(), 1);
    assert_eq!(store.load(&first.key()).await.unwrap(), Some(second));
}

#[tokio::test]
async fn keys_differ_by_exam_and_attainment_type() {
    let store = MemoryAttainmentStore::new();
    let subject = SubjectId::from("C211");
    let entries = vec![AttainmentEntry::new("C211.1", Attainment::Value(2.0))];

    for (exam_type, attainment_type) in [
        (ExamType::Cie1, AttainmentType::Direct),
        (ExamType::Cie2, AttainmentType::Direct),
        (ExamType::Computed, AttainmentType::ComputedDirect),
    ] {
        let record =
            AttainmentRecord::new(subject.clone(), exam_type, attainment_type, entries.clone());
        assert_eq!(store.save(&record).await.unwrap(), Ack::Inserted);
    }

    assert_eq!(store.record_count().unwrap(), 3);
}

#[tokio::test]
async fn bulk_save_collects_failures_and_continues() {
    let store = MemoryAttainmentStore::new();
    let records = vec![overall("C211", 2.0), overall("C212", 1.0), overall("C213", 3.0)];
    store.fail_saves_for(records[1].key()).unwrap();

    let report = save_all(&store, &records).await;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.success_count(), 2);
    assert!(!report.is_complete());
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, &records[1].key());

    assert!(store.load(&records[0].key()).await.unwrap().is_some());
    assert!(store.load(&records[1].key()).await.unwrap().is_none());
    assert!(store.load(&records[2].key()).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_subject_has_empty_inputs() {
    let store = MemoryAttainmentStore::new();
    let subject = SubjectId::from("missing");

    assert!(store.load_copo_matrix(&subject).await.unwrap().is_empty());
    assert!(store.load_feedback(&subject).await.unwrap().is_empty());
    assert!(store.load_course_outcomes(&subject).await.unwrap().is_empty());
}
