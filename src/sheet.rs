use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context};
use tracing::warn;

use crate::components::{ComponentKind, ComponentScores, ExamSheet};
use crate::models::{ExamType, SubjectId};

/// Read a score sheet: one row per student, one column per component.
///
/// Columns whose names do not map to a component kind (student id, name,
/// roll number...) are ignored. Blank cells count as unattempted.
pub fn read_sheet<R: Read>(
    reader: R,
    subject: SubjectId,
    exam_type: ExamType,
) -> anyhow::Result<ExamSheet> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = reader.headers().context("score sheet has no header row")?.clone();

    let columns: Vec<(usize, ComponentKind)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, name)| ComponentKind::from_column(name).map(|kind| (idx, kind)))
        .collect();

    if columns.is_empty() {
        bail!("score sheet has no recognisable component columns");
    }

    let mut components: Vec<ComponentScores> = columns
        .iter()
        .map(|&(idx, kind)| ComponentScores {
            name: headers[idx].to_string(),
            kind,
            scores: Vec::new(),
        })
        .collect();

    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("malformed score sheet row {}", line + 2))?;
        for (slot, &(idx, _)) in columns.iter().enumerate() {
            let cell = record.get(idx).unwrap_or("");
            let score = if cell.is_empty() || cell == "-" {
                0.0
            } else {
                cell.parse::<f64>().with_context(|| {
                    format!(
                        "row {}: `{}` is not a number in column {}",
                        line + 2,
                        cell,
                        components[slot].name
                    )
                })?
            };
            if score < 0.0 {
                warn!(
                    row = line + 2,
                    column = %components[slot].name,
                    score,
                    "negative score treated as unattempted"
                );
            }
            components[slot].scores.push(score.max(0.0));
        }
    }

    Ok(ExamSheet {
        subject,
        exam_type,
        components,
    })
}

pub fn read_sheet_path(
    path: &Path,
    subject: SubjectId,
    exam_type: ExamType,
) -> anyhow::Result<ExamSheet> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open score sheet {}", path.display()))?;
    read_sheet(file, subject, exam_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_component_columns_and_skips_identity() {
        let raw = "student_id,name,Q1,saqs,surpriseTestAverage\n\
                   S1,Avery,4,3,6\n\
                   S2,Jules,,2.5,-\n";
        let sheet = read_sheet(raw.as_bytes(), SubjectId::from("C211"), ExamType::Cie2).unwrap();

        assert_eq!(sheet.exam_type, ExamType::Cie2);
        assert_eq!(sheet.components.len(), 3);
        let q1 = sheet.component("Q1").unwrap();
        assert_eq!(q1.kind, ComponentKind::Question);
        assert_eq!(q1.scores, vec![4.0, 0.0]);
        assert_eq!(sheet.component("surpriseTestAverage").unwrap().scores, vec![6.0, 0.0]);
    }

    #[test]
    fn rejects_non_numeric_scores() {
        let raw = "student_id,Q1\nS1,abc\n";
        let err = read_sheet(raw.as_bytes(), SubjectId::from("C211"), ExamType::See).unwrap_err();
        assert!(err.to_string().contains("not a number"));
    }

    #[test]
    fn rejects_sheet_without_components() {
        let raw = "student_id,name\nS1,Avery\n";
        assert!(read_sheet(raw.as_bytes(), SubjectId::from("C211"), ExamType::See).is_err());
    }
}
