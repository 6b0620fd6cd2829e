use crate::error::EngineError;
use crate::level::round2;
use crate::models::{
    Attainment, AttainmentEntry, AttainmentRecord, AttainmentType, ExamType, SubjectId,
};

pub const DIRECT_WEIGHT: f64 = 0.8;
pub const INDIRECT_WEIGHT: f64 = 0.2;

/// `0.8 * direct + 0.2 * indirect`, two decimals.
pub fn combine_overall(direct: f64, indirect: f64) -> f64 {
    round2(DIRECT_WEIGHT * direct + INDIRECT_WEIGHT * indirect)
}

/// [`combine_overall`] lifted over the `-` sentinel: either side missing blocks the CO.
pub fn combine_overall_attainment(direct: Attainment, indirect: Attainment) -> Attainment {
    match (direct, indirect) {
        (Attainment::Value(d), Attainment::Value(i)) => Attainment::Value(combine_overall(d, i)),
        _ => Attainment::NotComputable,
    }
}

/// Mean overall attainment of a subject, two decimals.
pub fn average_overall(values: &[f64]) -> Result<f64, EngineError> {
    if values.is_empty() {
        return Err(EngineError::EmptyInput("overall attainment"));
    }
    Ok(round2(values.iter().sum::<f64>() / values.len() as f64))
}

/// [`average_overall`] over the computable COs of an overall record.
pub fn average_overall_record(record: &AttainmentRecord) -> Result<f64, EngineError> {
    let values: Vec<f64> = record
        .attainment_data
        .iter()
        .filter_map(|entry| entry.attainment_level.value())
        .collect();
    average_overall(&values)
}

/// Build the `COMPUTED/computedOverall` record in the direct record's CO order.
pub fn overall_record(
    subject: &SubjectId,
    direct: &AttainmentRecord,
    indirect: &AttainmentRecord,
) -> AttainmentRecord {
    let attainment_data = direct
        .attainment_data
        .iter()
        .map(|entry| {
            let indirect_level = indirect
                .level_of(&entry.co_no)
                .unwrap_or(Attainment::NotComputable);
            AttainmentEntry::new(
                entry.co_no.clone(),
                combine_overall_attainment(entry.attainment_level, indirect_level),
            )
        })
        .collect();

    AttainmentRecord::new(
        subject.clone(),
        ExamType::Computed,
        AttainmentType::ComputedOverall,
        attainment_data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_direct_and_indirect() {
        assert_eq!(combine_overall(2.7, 2.3), 2.62);
        assert_eq!(combine_overall(2.15, 2.0), 2.12);
    }

    #[test]
    fn sentinel_blocks_overall() {
        assert_eq!(
            combine_overall_attainment(Attainment::NotComputable, Attainment::Value(2.0)),
            Attainment::NotComputable
        );
        assert_eq!(
            combine_overall_attainment(Attainment::Value(2.0), Attainment::NotComputable),
            Attainment::NotComputable
        );
    }

    #[test]
    fn average_of_empty_list_is_an_error() {
        assert_eq!(
            average_overall(&[]),
            Err(EngineError::EmptyInput("overall attainment"))
        );
        assert_eq!(average_overall(&[2.12, 2.5, 1.0]), Ok(1.87));
    }

    #[test]
    fn record_average_skips_blocked_cos() {
        let subject = SubjectId::from("C211");
        let direct = AttainmentRecord::new(
            subject.clone(),
            ExamType::Computed,
            AttainmentType::ComputedDirect,
            vec![
                AttainmentEntry::new("C1", Attainment::Value(2.15)),
                AttainmentEntry::new("C2", Attainment::NotComputable),
            ],
        );
        let indirect = AttainmentRecord::new(
            subject.clone(),
            ExamType::Computed,
            AttainmentType::ComputedIndirect,
            vec![
                AttainmentEntry::new("C1", Attainment::Value(2.0)),
                AttainmentEntry::new("C2", Attainment::Value(3.0)),
            ],
        );

        let overall = overall_record(&subject, &direct, &indirect);
        assert_eq!(overall.attainment_type, AttainmentType::ComputedOverall);
        assert_eq!(overall.level_of("C1"), Some(Attainment::Value(2.12)));
        assert_eq!(overall.level_of("C2"), Some(Attainment::NotComputable));
        assert_eq!(average_overall_record(&overall), Ok(2.12));
    }
}
