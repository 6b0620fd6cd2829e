//! CSV parsing and validation for bulk imports of course outcomes, survey
//! responses and the CO-PO matrix.
//!
//! A malformed header rejects the whole file. Past the header every row is
//! its own unit: a bad row becomes a failed [`ImportOutcome`] and the rest
//! are still parsed and written.

use std::future::Future;
use std::io::Read;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{
    CopoMatrixEntry, CourseOutcome, FeedbackResponse, SubjectId, PO_COUNT, PSO_COUNT,
};

/// One data row of an import file, parsed or rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow<T> {
    /// 1-based line in the file, header included.
    pub line: usize,
    pub label: String,
    pub row: Result<T, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub line: usize,
    pub label: String,
    pub result: Result<(), String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkImportReport {
    pub outcomes: Vec<ImportOutcome>,
}

impl BulkImportReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ImportOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Write every parsed row through `write`; rejected rows and failed writes are
/// recorded and never stop the remaining rows.
pub async fn import_rows<T, F, Fut>(rows: Vec<ParsedRow<T>>, mut write: F) -> BulkImportReport
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut report = BulkImportReport::default();

    for ParsedRow { line, label, row } in rows {
        let result = match row {
            Ok(value) => write(value).await.map_err(|err| format!("{err:#}")),
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            warn!(line, label = %label, error = %err, "import row rejected");
        }
        report.outcomes.push(ImportOutcome { line, label, result });
    }

    info!(
        imported = report.success_count(),
        failed = report.outcomes.len() - report.success_count(),
        "bulk import finished"
    );
    report
}

/// A course outcome and its `CO<n>` slot within the subject.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRow {
    pub subject: SubjectId,
    pub position: i16,
    pub outcome: CourseOutcome,
}

#[derive(Deserialize)]
struct OutcomeCsvRow {
    subject_id: String,
    position: i16,
    co_no: String,
    description: String,
    knowledge_level: String,
}

fn outcome_row(row: OutcomeCsvRow) -> Result<OutcomeRow, String> {
    if row.subject_id.trim().is_empty() || row.co_no.trim().is_empty() {
        return Err("missing subject or course outcome".to_string());
    }
    if row.position < 1 {
        return Err(format!("position {} must be 1 or greater", row.position));
    }
    let knowledge_level = row.knowledge_level.parse()?;
    Ok(OutcomeRow {
        subject: SubjectId(row.subject_id.trim().to_string()),
        position: row.position,
        outcome: CourseOutcome {
            co_no: row.co_no.trim().to_string(),
            description: row.description,
            knowledge_level,
        },
    })
}

/// Course outcomes: `subject_id, position, co_no, description, knowledge_level`.
pub fn read_outcomes<R: Read>(reader: R) -> anyhow::Result<Vec<ParsedRow<OutcomeRow>>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    reader.headers().context("course outcome CSV has no header row")?;

    Ok(reader
        .deserialize::<OutcomeCsvRow>()
        .enumerate()
        .map(|(idx, result)| match result {
            Ok(row) => ParsedRow {
                line: idx + 2,
                label: row.co_no.clone(),
                row: outcome_row(row),
            },
            Err(err) => ParsedRow {
                line: idx + 2,
                label: format!("row {}", idx + 2),
                row: Err(err.to_string()),
            },
        })
        .collect())
}

#[derive(Deserialize)]
struct FeedbackCsvRow {
    student_id: String,
    subject_id: String,
    co1: Option<u8>,
    co2: Option<u8>,
    co3: Option<u8>,
    co4: Option<u8>,
    co5: Option<u8>,
}

fn feedback_row(row: FeedbackCsvRow) -> Result<FeedbackResponse, String> {
    if row.student_id.trim().is_empty() || row.subject_id.trim().is_empty() {
        return Err("missing student or subject".to_string());
    }
    let ratings = [row.co1, row.co2, row.co3, row.co4, row.co5];
    if let Some((slot, bad)) = ratings
        .iter()
        .enumerate()
        .find_map(|(slot, r)| r.filter(|&r| r > 3).map(|r| (slot, r)))
    {
        return Err(format!("CO{} self-rating {bad} outside 0..=3", slot + 1));
    }
    Ok(FeedbackResponse::new(
        row.student_id.trim(),
        SubjectId(row.subject_id.trim().to_string()),
        ratings,
    ))
}

/// Survey responses: `student_id, subject_id, co1..co5` (blank = unset).
pub fn read_feedback<R: Read>(reader: R) -> anyhow::Result<Vec<ParsedRow<FeedbackResponse>>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    reader.headers().context("feedback CSV has no header row")?;

    Ok(reader
        .deserialize::<FeedbackCsvRow>()
        .enumerate()
        .map(|(idx, result)| match result {
            Ok(row) => ParsedRow {
                line: idx + 2,
                label: format!("{}/{}", row.subject_id, row.student_id),
                row: feedback_row(row),
            },
            Err(err) => ParsedRow {
                line: idx + 2,
                label: format!("row {}", idx + 2),
                row: Err(err.to_string()),
            },
        })
        .collect())
}

/// Column positions of a CO-PO matrix file.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixColumns {
    subject: usize,
    course_outcome: usize,
    po: [usize; PO_COUNT],
    pso: [usize; PSO_COUNT],
    names: Vec<String>,
}

impl MatrixColumns {
    pub fn from_headers(headers: &csv::StringRecord) -> anyhow::Result<Self> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_string()).collect();
        let find = |name: &str| {
            names
                .iter()
                .position(|h| h == name)
                .with_context(|| format!("matrix CSV is missing column {name}"))
        };

        let mut po = [0; PO_COUNT];
        for (i, slot) in po.iter_mut().enumerate() {
            *slot = find(&format!("po{}", i + 1))?;
        }
        let mut pso = [0; PSO_COUNT];
        for (i, slot) in pso.iter_mut().enumerate() {
            *slot = find(&format!("pso{}", i + 1))?;
        }

        Ok(Self {
            subject: find("subject_id")?,
            course_outcome: find("course_outcome")?,
            po,
            pso,
            names,
        })
    }

    fn cell(&self, record: &csv::StringRecord, idx: usize) -> Result<u8, String> {
        let raw = record.get(idx).unwrap_or("").trim();
        if raw.is_empty() {
            return Ok(0);
        }
        let value: u8 = raw
            .parse()
            .map_err(|_| format!("`{raw}` is not a correlation value"))?;
        if value > 3 {
            return Err(format!(
                "correlation value {value} outside 0..=3 in column {}",
                self.names[idx]
            ));
        }
        Ok(value)
    }
}

/// One matrix row; blank cells mean "no correlation" (0).
pub fn parse_matrix_row(
    record: &csv::StringRecord,
    columns: &MatrixColumns,
) -> Result<CopoMatrixEntry, String> {
    let subject = record.get(columns.subject).unwrap_or("").trim();
    let course_outcome = record.get(columns.course_outcome).unwrap_or("").trim();
    if subject.is_empty() || course_outcome.is_empty() {
        return Err("missing subject or course outcome".to_string());
    }

    let mut po = [0u8; PO_COUNT];
    for (cell, &idx) in po.iter_mut().zip(&columns.po) {
        *cell = columns.cell(record, idx)?;
    }
    let mut pso = [0u8; PSO_COUNT];
    for (cell, &idx) in pso.iter_mut().zip(&columns.pso) {
        *cell = columns.cell(record, idx)?;
    }

    Ok(CopoMatrixEntry {
        subject: SubjectId(subject.to_string()),
        course_outcome: course_outcome.to_string(),
        po,
        pso,
    })
}

/// CO-PO matrix: `subject_id, course_outcome, po1..po12, pso1, pso2`.
pub fn read_matrix<R: Read>(reader: R) -> anyhow::Result<Vec<ParsedRow<CopoMatrixEntry>>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers().context("matrix CSV has no header row")?.clone();
    let columns = MatrixColumns::from_headers(&headers)?;

    Ok(reader
        .records()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2;
            match result {
                Ok(record) => ParsedRow {
                    line,
                    label: record.get(columns.course_outcome).unwrap_or("").trim().to_string(),
                    row: parse_matrix_row(&record, &columns),
                },
                Err(err) => ParsedRow {
                    line,
                    label: format!("row {line}"),
                    row: Err(err.to_string()),
                },
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATRIX_HEADER: &str =
        "subject_id,course_outcome,po1,po2,po3,po4,po5,po6,po7,po8,po9,po10,po11,po12,pso1,pso2";

    #[test]
    fn matrix_blank_cells_are_zero() {
        let raw = format!("{MATRIX_HEADER}\nC211,C211.1,3,2,,,,,,,,,,1,2,\n");
        let rows = read_matrix(raw.as_bytes()).unwrap();

        assert_eq!(rows.len(), 1);
        let entry = rows[0].row.as_ref().unwrap();
        assert_eq!(entry.po, [3, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(entry.pso, [2, 0]);
        assert_eq!(rows[0].label, "C211.1");
    }

    #[test]
    fn matrix_rejects_out_of_range_row_but_keeps_the_rest() {
        let raw = format!(
            "{MATRIX_HEADER}\n\
             C211,C211.1,7,0,0,0,0,0,0,0,0,0,0,0,0,0\n\
             C211,C211.2,1,0,0,0,0,0,0,0,0,0,0,0,0,0\n\
             C212,C212.1,2,0,0,0,0,0,0,0,0,0,0,0,3,0\n"
        );
        let rows = read_matrix(raw.as_bytes()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].line, 2);
        assert_eq!(
            rows[0].row.as_ref().unwrap_err(),
            "correlation value 7 outside 0..=3 in column po1"
        );
        assert_eq!(rows[1].row.as_ref().unwrap().po[0], 1);
        assert_eq!(rows[2].row.as_ref().unwrap().subject, SubjectId::from("C212"));
    }

    #[test]
    fn matrix_row_without_subject_is_rejected() {
        let raw = format!("{MATRIX_HEADER}\n,C211.1,1,0,0,0,0,0,0,0,0,0,0,0,0,0\n");
        let rows = read_matrix(raw.as_bytes()).unwrap();
        assert_eq!(rows[0].row.as_ref().unwrap_err(), "missing subject or course outcome");
    }

    #[test]
    fn matrix_without_pso_columns_rejects_the_file() {
        let raw = "subject_id,course_outcome,po1\nC211,C211.1,1\n";
        let err = read_matrix(raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("missing column po2"));
    }

    #[test]
    fn feedback_rejects_rating_above_three() {
        let raw = "student_id,subject_id,co1,co2,co3,co4,co5\n\
                   S1,C211,3,2,,,\n\
                   S2,C211,1,4,,,\n";
        let rows = read_feedback(raw.as_bytes()).unwrap();

        let first = rows[0].row.as_ref().unwrap();
        assert_eq!(first.ratings(), [Some(3), Some(2), None, None, None]);
        assert_eq!(rows[1].row.as_ref().unwrap_err(), "CO2 self-rating 4 outside 0..=3");
        assert_eq!(rows[1].label, "C211/S2");
    }

    #[test]
    fn outcomes_accept_positions_past_five() {
        let raw = "subject_id,position,co_no,description,knowledge_level\n\
                   C211,6,C211.6,Design balanced trees,BTL-6\n\
                   C211,0,C211.0,Nothing,BTL-1\n\
                   C211,2,C211.2,Stacks,BTL-9\n";
        let rows = read_outcomes(raw.as_bytes()).unwrap();

        let sixth = rows[0].row.as_ref().unwrap();
        assert_eq!(sixth.position, 6);
        assert_eq!(sixth.outcome.knowledge_level.level(), 6);
        assert!(rows[1].row.as_ref().unwrap_err().contains("1 or greater"));
        assert!(rows[2].row.as_ref().unwrap_err().contains("knowledge level"));
    }

    #[test]
    fn undecodable_row_is_its_own_failure() {
        let raw = "subject_id,position,co_no,description,knowledge_level\n\
                   C211,first,C211.1,Lists,BTL-2\n\
                   C211,2,C211.2,Stacks,BTL-3\n";
        let rows = read_outcomes(raw.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "row 2");
        assert!(rows[0].row.is_err());
        assert!(rows[1].row.is_ok());
    }

    #[tokio::test]
    async fn import_continues_past_rejected_and_failed_rows() {
        let raw = format!(
            "{MATRIX_HEADER}\n\
             C211,C211.1,7,0,0,0,0,0,0,0,0,0,0,0,0,0\n\
             C211,C211.2,1,0,0,0,0,0,0,0,0,0,0,0,0,0\n\
             C212,C212.1,2,0,0,0,0,0,0,0,0,0,0,0,3,0\n\
             C212,C212.2,2,0,0,0,0,0,0,0,0,0,0,0,3,0\n"
        );
        let rows = read_matrix(raw.as_bytes()).unwrap();

        let mut written = Vec::new();
        let report = import_rows(rows, |entry: CopoMatrixEntry| {
            let fails = entry.course_outcome == "C212.1";
            written.push(entry.course_outcome);
            async move {
                if fails {
                    anyhow::bail!("connection reset");
                }
                Ok(())
            }
        })
        .await;

        assert_eq!(written, vec!["C211.2", "C212.1", "C212.2"]);
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.success_count(), 2);
        assert!(!report.is_complete());
        let failed: Vec<(usize, &str)> = report
            .failures()
            .map(|o| (o.line, o.label.as_str()))
            .collect();
        assert_eq!(failed, vec![(2, "C211.1"), (4, "C212.1")]);
        assert_eq!(report.outcomes[3].result, Err("connection reset".to_string()));
    }
}
