use std::fs::File;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Attainment, AttainmentEntry, AttainmentKey, AttainmentRecord, AttainmentType, BloomLevel,
    CopoMatrixEntry, CourseOutcome, ExamType, FeedbackResponse, Subject, SubjectId, PO_COUNT,
    PSO_COUNT,
};
use crate::ingest::{self, BulkImportReport};
use crate::store::{Ack, AttainmentRecordStore};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL-backed attainment store.
#[derive(Debug, Clone)]
pub struct PgAttainmentStore {
    pool: PgPool,
}

impl PgAttainmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn small_to_level(value: i16, column: &str) -> StoreResult<u8> {
    u8::try_from(value).map_err(|_| {
        StoreError::Serialization(format!("column {column} holds out-of-range value {value}"))
    })
}

#[async_trait]
impl AttainmentRecordStore for PgAttainmentStore {
    async fn load(&self, key: &AttainmentKey) -> StoreResult<Option<AttainmentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT attainment_data
            FROM outcome_attainment.attainment_records
            WHERE subject_id = $1 AND exam_type = $2 AND attainment_type = $3
            "#,
        )
        .bind(key.subject.as_str())
        .bind(key.exam_type.as_str())
        .bind(key.attainment_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let Json(attainment_data): Json<Vec<AttainmentEntry>> = row.try_get("attainment_data")?;

        Ok(Some(AttainmentRecord::new(
            key.subject.clone(),
            key.exam_type,
            key.attainment_type,
            attainment_data,
        )))
    }

    async fn save(&self, record: &AttainmentRecord) -> StoreResult<Ack> {
        let inserted: bool = sqlx::query(
            r#"
            INSERT INTO outcome_attainment.attainment_records
            (id, subject_id, exam_type, attainment_type, attainment_data, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (subject_id, exam_type, attainment_type) DO UPDATE
            SET attainment_data = EXCLUDED.attainment_data, updated_at = EXCLUDED.updated_at
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(record.subject.as_str())
        .bind(record.exam_type.as_str())
        .bind(record.attainment_type.as_str())
        .bind(Json(&record.attainment_data))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?
        .try_get("inserted")?;

        debug!(key = %record.key(), inserted, "attainment record saved");
        Ok(if inserted { Ack::Inserted } else { Ack::Replaced })
    }

    async fn load_copo_matrix(&self, subject: &SubjectId) -> StoreResult<Vec<CopoMatrixEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT course_outcome, po1, po2, po3, po4, po5, po6, po7, po8, po9, po10, po11, po12,
                   pso1, pso2
            FROM outcome_attainment.copo_matrix
            WHERE subject_id = $1
            ORDER BY course_outcome
            "#,
        )
        .bind(subject.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let mut po = [0u8; PO_COUNT];
            for (i, cell) in po.iter_mut().enumerate() {
                let column = format!("po{}", i + 1);
                *cell = small_to_level(row.try_get(column.as_str())?, &column)?;
            }
            let mut pso = [0u8; PSO_COUNT];
            for (i, cell) in pso.iter_mut().enumerate() {
                let column = format!("pso{}", i + 1);
                *cell = small_to_level(row.try_get(column.as_str())?, &column)?;
            }
            entries.push(CopoMatrixEntry {
                subject: subject.clone(),
                course_outcome: row.try_get("course_outcome")?,
                po,
                pso,
            });
        }

        Ok(entries)
    }

    async fn load_feedback(&self, subject: &SubjectId) -> StoreResult<Vec<FeedbackResponse>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, co1, co2, co3, co4, co5
            FROM outcome_attainment.feedback_responses
            WHERE subject_id = $1
            ORDER BY student_id
            "#,
        )
        .bind(subject.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut responses = Vec::with_capacity(rows.len());
        for row in rows {
            let mut ratings = [None; 5];
            for (i, rating) in ratings.iter_mut().enumerate() {
                let column = format!("co{}", i + 1);
                let value: Option<i16> = row.try_get(column.as_str())?;
                *rating = value.map(|v| small_to_level(v, &column)).transpose()?;
            }
            responses.push(FeedbackResponse::new(
                row.try_get::<String, _>("student_id")?,
                subject.clone(),
                ratings,
            ));
        }

        Ok(responses)
    }

    async fn load_course_outcomes(&self, subject: &SubjectId) -> StoreResult<Vec<CourseOutcome>> {
        let rows = sqlx::query(
            r#"
            SELECT co_no, description, knowledge_level
            FROM outcome_attainment.course_outcomes
            WHERE subject_id = $1
            ORDER BY position
            "#,
        )
        .bind(subject.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> StoreResult<CourseOutcome> {
                let tag: String = row.try_get("knowledge_level")?;
                Ok(CourseOutcome {
                    co_no: row.try_get("co_no")?,
                    description: row.try_get("description")?,
                    knowledge_level: tag.parse().map_err(StoreError::Serialization)?,
                })
            })
            .collect()
    }
}

pub async fn upsert_course_outcome(
    pool: &PgPool,
    subject: &SubjectId,
    position: i16,
    outcome: &CourseOutcome,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outcome_attainment.course_outcomes
        (id, subject_id, co_no, position, description, knowledge_level)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (subject_id, co_no) DO UPDATE
        SET position = EXCLUDED.position,
            description = EXCLUDED.description,
            knowledge_level = EXCLUDED.knowledge_level
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(subject.as_str())
    .bind(&outcome.co_no)
    .bind(position)
    .bind(&outcome.description)
    .bind(outcome.knowledge_level.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_feedback(pool: &PgPool, response: &FeedbackResponse) -> anyhow::Result<()> {
    let ratings = response.ratings().map(|r| r.map(i16::from));
    sqlx::query(
        r#"
        INSERT INTO outcome_attainment.feedback_responses
        (id, student_id, subject_id, co1, co2, co3, co4, co5)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (student_id, subject_id) DO UPDATE
        SET co1 = EXCLUDED.co1, co2 = EXCLUDED.co2, co3 = EXCLUDED.co3,
            co4 = EXCLUDED.co4, co5 = EXCLUDED.co5
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&response.student_id)
    .bind(response.subject.as_str())
    .bind(ratings[0])
    .bind(ratings[1])
    .bind(ratings[2])
    .bind(ratings[3])
    .bind(ratings[4])
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_matrix_row(pool: &PgPool, entry: &CopoMatrixEntry) -> anyhow::Result<()> {
    let mut query = sqlx::query(
        r#"
        INSERT INTO outcome_attainment.copo_matrix
        (id, subject_id, course_outcome, po1, po2, po3, po4, po5, po6, po7, po8, po9, po10,
         po11, po12, pso1, pso2)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        ON CONFLICT (subject_id, course_outcome) DO UPDATE
        SET po1 = EXCLUDED.po1, po2 = EXCLUDED.po2, po3 = EXCLUDED.po3, po4 = EXCLUDED.po4,
            po5 = EXCLUDED.po5, po6 = EXCLUDED.po6, po7 = EXCLUDED.po7, po8 = EXCLUDED.po8,
            po9 = EXCLUDED.po9, po10 = EXCLUDED.po10, po11 = EXCLUDED.po11,
            po12 = EXCLUDED.po12, pso1 = EXCLUDED.pso1, pso2 = EXCLUDED.pso2
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(entry.subject.as_str())
    .bind(&entry.course_outcome);

    for value in entry.po.iter().chain(entry.pso.iter()) {
        query = query.bind(i16::from(*value));
    }

    query.execute(pool).await?;
    Ok(())
}

pub async fn upsert_subject(pool: &PgPool, subject: &Subject) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outcome_attainment.subjects
        (id, name, branch, year, semester, regulation, course_code)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name, branch = EXCLUDED.branch, year = EXCLUDED.year,
            semester = EXCLUDED.semester, regulation = EXCLUDED.regulation,
            course_code = EXCLUDED.course_code
        "#,
    )
    .bind(subject.id.as_str())
    .bind(&subject.name)
    .bind(&subject.branch)
    .bind(i16::from(subject.year))
    .bind(i16::from(subject.semester))
    .bind(&subject.regulation)
    .bind(&subject.course_code)
    .execute(pool)
    .await?;
    Ok(())
}

/// Load a demo subject with outcomes, matrix, survey responses and exam levels.
pub async fn seed(store: &PgAttainmentStore) -> anyhow::Result<()> {
    let pool = store.pool();
    let demo = Subject {
        id: SubjectId::from("C211"),
        name: "Data Structures".to_string(),
        branch: "CSE".to_string(),
        year: 2,
        semester: 1,
        regulation: "R22".to_string(),
        course_code: "CS211".to_string(),
    };
    upsert_subject(pool, &demo).await?;
    let subject = demo.id;

    let outcomes = [
        ("C211.1", "Explain linear data structures and their operations", "BTL-2"),
        ("C211.2", "Apply stacks and queues to expression evaluation", "BTL-3"),
        ("C211.3", "Analyse tree traversals and search complexity", "BTL-4"),
    ];
    for (position, (co_no, description, tag)) in outcomes.iter().enumerate() {
        let outcome = CourseOutcome {
            co_no: co_no.to_string(),
            description: description.to_string(),
            knowledge_level: tag.parse::<BloomLevel>().map_err(anyhow::Error::msg)?,
        };
        let position = i16::try_from(position + 1).context("too many course outcomes")?;
        upsert_course_outcome(pool, &subject, position, &outcome).await?;
    }

    let matrix = [
        ("C211.1", [3, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 1], [2, 1]),
        ("C211.2", [2, 3, 2, 1, 0, 0, 0, 0, 0, 0, 0, 1], [3, 1]),
        ("C211.3", [2, 2, 3, 2, 1, 0, 0, 0, 0, 0, 0, 2], [3, 2]),
    ];
    for (co_no, po, pso) in matrix {
        upsert_matrix_row(
            pool,
            &CopoMatrixEntry {
                subject: subject.clone(),
                course_outcome: co_no.to_string(),
                po,
                pso,
            },
        )
        .await?;
    }

    let feedback = [
        ("21CS001", [Some(3), Some(2), Some(2), None, None]),
        ("21CS002", [Some(2), Some(2), Some(3), None, None]),
        ("21CS003", [Some(3), Some(1), Some(2), None, None]),
    ];
    for (student, ratings) in feedback {
        upsert_feedback(pool, &FeedbackResponse::new(student, subject.clone(), ratings)).await?;
    }

    let exams = [
        (ExamType::Cie1, [2.3, 1.7, 2.0]),
        (ExamType::Cie2, [2.7, 2.0, 1.3]),
        (ExamType::See, [2.0, 2.3, 1.7]),
    ];
    for (exam_type, levels) in exams {
        let record = AttainmentRecord::new(
            subject.clone(),
            exam_type,
            AttainmentType::Direct,
            outcomes
                .iter()
                .zip(levels)
                .map(|((co_no, _, _), level)| {
                    AttainmentEntry::new(*co_no, Attainment::Value(level))
                })
                .collect(),
        );
        store.save(&record).await?;
    }

    info!(subject = %subject, "seed data inserted");
    Ok(())
}

fn open_csv(csv_path: &Path) -> anyhow::Result<File> {
    File::open(csv_path).with_context(|| format!("failed to open {}", csv_path.display()))
}

pub async fn import_outcomes_csv(
    pool: &PgPool,
    csv_path: &Path,
) -> anyhow::Result<BulkImportReport> {
    let rows = ingest::read_outcomes(open_csv(csv_path)?)?;
    Ok(ingest::import_rows(rows, move |row| async move {
        upsert_course_outcome(pool, &row.subject, row.position, &row.outcome).await
    })
    .await)
}

pub async fn import_feedback_csv(
    pool: &PgPool,
    csv_path: &Path,
) -> anyhow::Result<BulkImportReport> {
    let rows = ingest::read_feedback(open_csv(csv_path)?)?;
    Ok(ingest::import_rows(rows, move |response| async move {
        upsert_feedback(pool, &response).await
    })
    .await)
}

pub async fn import_matrix_csv(
    pool: &PgPool,
    csv_path: &Path,
) -> anyhow::Result<BulkImportReport> {
    let rows = ingest::read_matrix(open_csv(csv_path)?)?;
    Ok(ingest::import_rows(rows, move |entry| async move {
        upsert_matrix_row(pool, &entry).await
    })
    .await)
}
