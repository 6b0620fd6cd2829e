//! Indirect CO attainment from student self-rating surveys.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::level::round1;
use crate::models::{
    Attainment, AttainmentEntry, AttainmentRecord, AttainmentType, ExamType, FeedbackResponse,
    SubjectId, FEEDBACK_SLOTS,
};

/// Rating counts for one CO and the resulting attainment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndirectTally {
    pub level1_count: usize,
    pub level2_count: usize,
    pub level3_count: usize,
    pub total: usize,
    pub attainment: Attainment,
}

impl IndirectTally {
    fn empty() -> Self {
        Self {
            level1_count: 0,
            level2_count: 0,
            level3_count: 0,
            total: 0,
            attainment: Attainment::NotComputable,
        }
    }

    fn record(&mut self, rating: u8) {
        match rating {
            1 => self.level1_count += 1,
            2 => self.level2_count += 1,
            3 => self.level3_count += 1,
            _ => return,
        }
        self.total += 1;
    }

    fn finish(&mut self) {
        self.attainment = if self.total == 0 {
            Attainment::NotComputable
        } else {
            let weighted = self.level1_count + 2 * self.level2_count + 3 * self.level3_count;
            Attainment::Value(round1(weighted as f64 / self.total as f64))
        };
    }
}

/// Tally self-ratings per CO.
///
/// `co_numbers[i]` is the canonical identifier of positional slot `CO{i+1}`.
/// Unset and zero ratings are left out of `total`; slots beyond the fifth never
/// receive ratings and stay `-`.
pub fn combine_indirect(
    responses: &[FeedbackResponse],
    co_numbers: &[String],
) -> BTreeMap<String, IndirectTally> {
    let mut tallies: Vec<IndirectTally> = vec![IndirectTally::empty(); co_numbers.len()];

    for response in responses {
        for (slot, rating) in response.ratings().into_iter().enumerate() {
            let Some(rating) = rating else { continue };
            let Some(tally) = tallies.get_mut(slot) else { continue };
            if rating > 3 {
                warn!(
                    student = %response.student_id,
                    slot = slot + 1,
                    rating,
                    "ignoring out-of-range self-rating"
                );
                continue;
            }
            tally.record(rating);
        }
    }

    if co_numbers.len() > FEEDBACK_SLOTS {
        warn!(
            cos = co_numbers.len(),
            slots = FEEDBACK_SLOTS,
            "more COs than feedback slots; extra COs have no indirect data"
        );
    }

    co_numbers
        .iter()
        .cloned()
        .zip(tallies)
        .map(|(co_no, mut tally)| {
            tally.finish();
            (co_no, tally)
        })
        .collect()
}

/// Build the `COMPUTED/computedIndirect` record, keeping `co_numbers` order.
pub fn indirect_record(
    subject: &SubjectId,
    responses: &[FeedbackResponse],
    co_numbers: &[String],
) -> AttainmentRecord {
    let tallies = combine_indirect(responses, co_numbers);
    let attainment_data = co_numbers
        .iter()
        .map(|co_no| {
            let level = tallies
                .get(co_no)
                .map_or(Attainment::NotComputable, |t| t.attainment);
            AttainmentEntry::new(co_no.clone(), level)
        })
        .collect();

    AttainmentRecord::new(
        subject.clone(),
        ExamType::Computed,
        AttainmentType::ComputedIndirect,
        attainment_data,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(student: usize, ratings: [Option<u8>; FEEDBACK_SLOTS]) -> FeedbackResponse {
        FeedbackResponse::new(format!("S{student}"), SubjectId::from("C211"), ratings)
    }

    fn cos(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn weighted_mean_of_ratings() {
        let levels = [1, 1, 2, 2, 2, 3, 3, 3, 3, 3];
        let responses: Vec<FeedbackResponse> = levels
            .iter()
            .enumerate()
            .map(|(i, &l)| response(i, [Some(l), None, None, None, None]))
            .collect();

        let tallies = combine_indirect(&responses, &cos(&["C211.1"]));
        let tally = tallies["C211.1"];
        assert_eq!(tally.level1_count, 2);
        assert_eq!(tally.level2_count, 3);
        assert_eq!(tally.level3_count, 5);
        assert_eq!(tally.total, 10);
        assert_eq!(tally.attainment, Attainment::Value(2.3));
    }

    #[test]
    fn zero_and_unset_ratings_are_excluded() {
        let responses = vec![
            response(1, [Some(3), Some(0), None, None, None]),
            response(2, [Some(0), None, None, None, None]),
            response(3, [Some(1), Some(2), None, None, None]),
        ];
        let tallies = combine_indirect(&responses, &cos(&["C1", "C2", "C3"]));

        assert_eq!(tallies["C1"].total, 2);
        assert_eq!(tallies["C1"].attainment, Attainment::Value(2.0));
        assert_eq!(tallies["C2"].total, 1);
        assert_eq!(tallies["C2"].attainment, Attainment::Value(2.0));
        assert_eq!(tallies["C3"].total, 0);
        assert_eq!(tallies["C3"].attainment, Attainment::NotComputable);
    }

    #[test]
    fn out_of_range_ratings_are_ignored() {
        let responses = vec![response(1, [Some(7), None, None, None, None])];
        let tallies = combine_indirect(&responses, &cos(&["C1"]));
        assert_eq!(tallies["C1"].total, 0);
    }

    #[test]
    fn positional_slots_follow_co_order() {
        let responses = vec![response(1, [Some(1), Some(3), None, None, None])];
        let co_numbers = cos(&["C211.1", "C211.2", "C211.6"]);
        let record = indirect_record(&SubjectId::from("C211"), &responses, &co_numbers);

        assert_eq!(record.attainment_type, AttainmentType::ComputedIndirect);
        assert_eq!(record.level_of("C211.1"), Some(Attainment::Value(1.0)));
        assert_eq!(record.level_of("C211.2"), Some(Attainment::Value(3.0)));
        assert_eq!(record.level_of("C211.6"), Some(Attainment::NotComputable));
    }
}
