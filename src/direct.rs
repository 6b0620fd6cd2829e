//! Combination of internal (CIE-1, CIE-2) and external (SEE) exam levels into
//! direct CO attainment.

use tracing::debug;

use crate::level::round2;
use crate::models::{
    Attainment, AttainmentEntry, AttainmentRecord, AttainmentType, ExamType, SubjectId,
};

pub const INTERNAL_WEIGHT: f64 = 0.3;
pub const EXTERNAL_WEIGHT: f64 = 0.7;

/// `0.3 * internal + 0.7 * external`, two decimals; `-` if either side is missing.
pub fn combine_direct(ie_level: Option<f64>, ee_level: Option<f64>) -> Attainment {
    match (ie_level, ee_level) {
        (Some(ie), Some(ee)) => {
            Attainment::Value(round2(INTERNAL_WEIGHT * ie + EXTERNAL_WEIGHT * ee))
        }
        _ => Attainment::NotComputable,
    }
}

/// Mean of the CO's internal levels over the exams that assessed it.
///
/// A CO assessed in only one internal exam uses that level alone; the missing
/// exam is not zero-filled.
pub fn internal_level(cie1: Option<Attainment>, cie2: Option<Attainment>) -> Option<f64> {
    let levels: Vec<f64> = [cie1, cie2]
        .into_iter()
        .flatten()
        .filter_map(Attainment::value)
        .collect();

    if levels.is_empty() {
        None
    } else {
        Some(levels.iter().sum::<f64>() / levels.len() as f64)
    }
}

/// CO numbers across the given records, in first-seen order.
pub fn union_co_numbers(records: &[Option<&AttainmentRecord>]) -> Vec<String> {
    let mut co_numbers: Vec<String> = Vec::new();
    for record in records.iter().flatten() {
        for co_no in record.co_numbers() {
            if !co_numbers.iter().any(|known| known == co_no) {
                co_numbers.push(co_no.to_string());
            }
        }
    }
    co_numbers
}

/// Build the `COMPUTED/computedDirect` record for `co_numbers`.
///
/// When `co_numbers` is empty the union of COs found in the exam records is used.
pub fn direct_record(
    subject: &SubjectId,
    co_numbers: &[String],
    cie1: Option<&AttainmentRecord>,
    cie2: Option<&AttainmentRecord>,
    see: Option<&AttainmentRecord>,
) -> AttainmentRecord {
    let co_numbers = if co_numbers.is_empty() {
        union_co_numbers(&[cie1, cie2, see])
    } else {
        co_numbers.to_vec()
    };

    let attainment_data = co_numbers
        .into_iter()
        .map(|co_no| {
            let ie = internal_level(
                cie1.and_then(|r| r.level_of(&co_no)),
                cie2.and_then(|r| r.level_of(&co_no)),
            );
            let ee = see.and_then(|r| r.level_of(&co_no)).and_then(Attainment::value);
            let direct = combine_direct(ie, ee);
            debug!(subject = %subject, co = %co_no, ?ie, ?ee, %direct, "direct attainment");
            AttainmentEntry::new(co_no, direct)
        })
        .collect();

    AttainmentRecord::new(
        subject.clone(),
        ExamType::Computed,
        AttainmentType::ComputedDirect,
        attainment_data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exam(exam_type: ExamType, levels: &[(&str, Attainment)]) -> AttainmentRecord {
        AttainmentRecord::new(
            SubjectId::from("C211"),
            exam_type,
            AttainmentType::Direct,
            levels
                .iter()
                .map(|(co, level)| AttainmentEntry::new(*co, *level))
                .collect(),
        )
    }

    #[test]
    fn weights_internal_and_external() {
        assert_eq!(combine_direct(Some(2.0), Some(3.0)), Attainment::Value(2.7));
        assert_eq!(combine_direct(Some(2.5), Some(2.0)), Attainment::Value(2.15));
    }

    #[test]
    fn missing_side_is_not_computable() {
        assert_eq!(combine_direct(None, Some(3.0)), Attainment::NotComputable);
        assert_eq!(combine_direct(Some(3.0), None), Attainment::NotComputable);
        assert_eq!(combine_direct(None, None), Attainment::NotComputable);
    }

    #[test]
    fn internal_level_uses_only_assessed_exams() {
        assert_eq!(
            internal_level(Some(Attainment::Value(2.0)), Some(Attainment::Value(3.0))),
            Some(2.5)
        );
        assert_eq!(internal_level(None, Some(Attainment::Value(3.0))), Some(3.0));
        assert_eq!(
            internal_level(Some(Attainment::NotComputable), Some(Attainment::Value(1.0))),
            Some(1.0)
        );
        assert_eq!(internal_level(None, None), None);
    }

    #[test]
    fn record_covers_union_and_blocks_only_missing_cos() {
        let cie1 = exam(
            ExamType::Cie1,
            &[("C1", Attainment::Value(2.0)), ("C2", Attainment::Value(1.0))],
        );
        let cie2 = exam(
            ExamType::Cie2,
            &[("C1", Attainment::Value(3.0)), ("C3", Attainment::Value(2.0))],
        );
        let see = exam(
            ExamType::See,
            &[("C1", Attainment::Value(2.0)), ("C3", Attainment::Value(3.0))],
        );

        let subject = SubjectId::from("C211");
        let record = direct_record(&subject, &[], Some(&cie1), Some(&cie2), Some(&see));

        assert_eq!(record.exam_type, ExamType::Computed);
        assert_eq!(record.attainment_type, AttainmentType::ComputedDirect);
        let cos: Vec<&str> = record.co_numbers().collect();
        assert_eq!(cos, vec!["C1", "C2", "C3"]);
        assert_eq!(record.level_of("C1"), Some(Attainment::Value(2.15)));
        // No SEE level for C2: blocked, while C1 and C3 still compute.
        assert_eq!(record.level_of("C2"), Some(Attainment::NotComputable));
        assert_eq!(record.level_of("C3"), Some(Attainment::Value(2.7)));
    }

    #[test]
    fn missing_see_record_blocks_every_co() {
        let cie1 = exam(ExamType::Cie1, &[("C1", Attainment::Value(2.0))]);
        let cos = ["C1".to_string()];
        let record = direct_record(&SubjectId::from("C211"), &cos, Some(&cie1), None, None);
        assert_eq!(record.level_of("C1"), Some(Attainment::NotComputable));
    }
}
