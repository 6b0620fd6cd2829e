//! Projection of CO attainment onto program outcomes through the CO-PO
//! correlation matrix.

use serde::Serialize;

use crate::level::{self, round1, round2};
use crate::models::{Attainment, CopoAverage, CopoMatrixEntry, SubjectId, PO_COUNT, PSO_COUNT};

/// Top of both the correlation scale and the attainment scale.
pub const MAX_SCALE: f64 = 3.0;

/// PO/PSO attainment for a subject, with the column means it was derived from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramAttainment {
    pub weighted_avg: Option<CopoAverage>,
    pub po: [Attainment; PO_COUNT],
    pub pso: [Attainment; PSO_COUNT],
}

impl ProgramAttainment {
    /// Every PO and PSO `-`: the subject has no matrix rows.
    pub fn not_computable(weighted_avg: Option<CopoAverage>) -> Self {
        Self {
            weighted_avg,
            po: [Attainment::NotComputable; PO_COUNT],
            pso: [Attainment::NotComputable; PSO_COUNT],
        }
    }

    /// `("PO1", value), ... ("PSO2", value)` in matrix column order.
    pub fn labelled(&self) -> Vec<(String, Attainment)> {
        self.po
            .iter()
            .enumerate()
            .map(|(i, v)| (format!("PO{}", i + 1), *v))
            .chain(
                self.pso
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (format!("PSO{}", i + 1), *v)),
            )
            .collect()
    }
}

fn column_mean(matrix: &[CopoMatrixEntry], cell: impl Fn(&CopoMatrixEntry) -> u8) -> f64 {
    let sum: u32 = matrix
        .iter()
        .map(|entry| u32::from(cell(entry).min(MAX_SCALE as u8)))
        .sum();
    round1(sum as f64 / matrix.len() as f64)
}

/// Column means of the matrix, one decimal; `None` when there are no rows.
pub fn copo_average(subject: &SubjectId, matrix: &[CopoMatrixEntry]) -> Option<CopoAverage> {
    if matrix.is_empty() {
        return None;
    }

    let po_avg = std::array::from_fn(|i| column_mean(matrix, |e| e.po[i]));
    let pso_avg = std::array::from_fn(|i| column_mean(matrix, |e| e.pso[i]));

    Some(CopoAverage {
        subject: subject.clone(),
        po_avg,
        pso_avg,
    })
}

fn projected(weighted: f64, co_attainment_avg: f64) -> Attainment {
    Attainment::Value(round2(weighted * co_attainment_avg / MAX_SCALE))
}

/// Project a subject's mean CO attainment through its correlation matrix.
///
/// A column of zeros projects to `0`; an empty matrix projects to `-` everywhere.
pub fn project(matrix: &[CopoMatrixEntry], co_attainment_avg: f64) -> ProgramAttainment {
    let Some(first) = matrix.first() else {
        return ProgramAttainment::not_computable(None);
    };
    let Some(average) = copo_average(&first.subject, matrix) else {
        return ProgramAttainment::not_computable(None);
    };

    let co_attainment_avg = level::clamp(co_attainment_avg, 0.0, MAX_SCALE);
    ProgramAttainment {
        po: average.po_avg.map(|w| projected(w, co_attainment_avg)),
        pso: average.pso_avg.map(|w| projected(w, co_attainment_avg)),
        weighted_avg: Some(average),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(co: &str, po: [u8; PO_COUNT], pso: [u8; PSO_COUNT]) -> CopoMatrixEntry {
        CopoMatrixEntry {
            subject: SubjectId::from("C211"),
            course_outcome: co.to_string(),
            po,
            pso,
        }
    }

    #[test]
    fn single_co_projects_full_correlation() {
        let mut po = [0; PO_COUNT];
        po[0] = 3;
        let projection = project(&[row("C1", po, [0, 0])], 2.12);

        let weighted = projection.weighted_avg.as_ref().unwrap();
        assert_eq!(weighted.po_avg[0], 3.0);
        assert_eq!(projection.po[0], Attainment::Value(2.12));
    }

    #[test]
    fn zero_column_is_a_computed_zero() {
        let projection = project(
            &[
                row("C1", [3, 2, 1, 0, 0, 0, 0, 0, 0, 0, 0, 1], [2, 0]),
                row("C2", [1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0], [3, 0]),
            ],
            2.4,
        );

        let weighted = projection.weighted_avg.as_ref().unwrap();
        assert_eq!(weighted.po_avg[4], 0.0);
        assert_eq!(projection.po[4], Attainment::Value(0.0));
        assert_eq!(weighted.po_avg[0], 2.0);
        assert_eq!(projection.po[0], Attainment::Value(1.6));
        assert_eq!(weighted.po_avg[11], 0.5);
        assert_eq!(projection.po[11], Attainment::Value(0.4));
        assert_eq!(projection.pso[0], Attainment::Value(2.0));
        assert_eq!(projection.pso[1], Attainment::Value(0.0));
    }

    #[test]
    fn empty_matrix_is_not_computable() {
        let projection = project(&[], 2.5);
        assert!(projection.weighted_avg.is_none());
        assert!(projection.po.iter().all(|v| *v == Attainment::NotComputable));
        assert!(projection.pso.iter().all(|v| *v == Attainment::NotComputable));
    }

    #[test]
    fn out_of_range_cells_are_clamped() {
        let mut po = [0; PO_COUNT];
        po[2] = 9;
        let projection = project(&[row("C1", po, [0, 0])], 7.0);
        assert_eq!(projection.weighted_avg.unwrap().po_avg[2], 3.0);
        assert_eq!(projection.po[2], Attainment::Value(3.0));
    }

    #[test]
    fn averages_round_to_one_decimal() {
        let average = copo_average(
            &SubjectId::from("C211"),
            &[
                row("C1", [3; PO_COUNT], [1, 1]),
                row("C2", [2; PO_COUNT], [1, 2]),
                row("C3", [2; PO_COUNT], [1, 2]),
            ],
        )
        .unwrap();
        assert_eq!(average.po_avg[0], 2.3);
        assert_eq!(average.pso_avg, [1.0, 1.7]);
    }

    #[test]
    fn labels_cover_all_outcomes() {
        let labels = ProgramAttainment::not_computable(None).labelled();
        assert_eq!(labels.len(), PO_COUNT + PSO_COUNT);
        assert_eq!(labels[0].0, "PO1");
        assert_eq!(labels[13].0, "PSO2");
    }
}
