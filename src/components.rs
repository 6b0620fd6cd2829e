//! Per-component statistics over a cohort's raw marks, and the per-exam
//! CO levels derived from them.

use tracing::debug;

use crate::config::{ComponentThresholds, EngineConfig};
use crate::level::{self, classify, round1};
use crate::models::{
    Attainment, AttainmentEntry, AttainmentRecord, AttainmentType, ComponentStatistic, ExamType,
    SubjectId,
};

/// Column holding the surprise-test average in a score sheet.
pub const SURPRISE_TEST_COLUMN: &str = "surpriseTestAverage";
/// Column holding the assignment average in a score sheet.
pub const ASSIGNMENT_COLUMN: &str = "assignmentAverage";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Question,
    ShortAnswerSet,
    SurpriseTest,
    Assignment,
    Total,
}

impl ComponentKind {
    /// Infer the component kind from a score-sheet column name.
    pub fn from_column(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        if lower.starts_with("saq") {
            Some(ComponentKind::ShortAnswerSet)
        } else if lower.starts_with("surprisetest") {
            Some(ComponentKind::SurpriseTest)
        } else if lower.starts_with("assignment") {
            Some(ComponentKind::Assignment)
        } else if lower.starts_with("total") {
            Some(ComponentKind::Total)
        } else if lower.len() > 1
            && lower.starts_with('q')
            && lower[1..].chars().all(|c| c.is_ascii_alphanumeric())
            && lower[1..].starts_with(|c: char| c.is_ascii_digit())
        {
            Some(ComponentKind::Question)
        } else {
            None
        }
    }

    pub fn threshold(self, thresholds: &ComponentThresholds) -> f64 {
        match self {
            ComponentKind::Question => thresholds.question,
            ComponentKind::ShortAnswerSet => thresholds.short_answer_set,
            ComponentKind::SurpriseTest => thresholds.surprise_test,
            ComponentKind::Assignment => thresholds.assignment,
            ComponentKind::Total => thresholds.total,
        }
    }
}

/// Attempted/secured counts and level for one component.
///
/// A score counts as secured only when it was also attempted, so
/// `secured <= attempted` holds for any threshold.
pub fn compute(scores: &[f64], threshold: f64) -> ComponentStatistic {
    let attempted = scores.iter().filter(|&&s| s > 0.0).count();
    let secured = scores
        .iter()
        .filter(|&&s| s > 0.0 && s >= threshold)
        .count();

    let percentage = if attempted > 0 {
        level::clamp((100.0 * secured as f64 / attempted as f64).round(), 0.0, 100.0)
    } else {
        0.0
    };

    ComponentStatistic {
        attempted,
        secured,
        percentage,
        level: classify(percentage),
    }
}

/// Mean of the contributing component levels, one decimal.
///
/// Components without data count as level 0; the denominator is always the
/// number of defined components.
pub fn average_level(levels: &[Option<u8>]) -> f64 {
    if levels.is_empty() {
        return 0.0;
    }
    let sum: u32 = levels.iter().map(|l| u32::from(l.unwrap_or(0))).sum();
    round1(sum as f64 / levels.len() as f64)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentScores {
    pub name: String,
    pub kind: ComponentKind,
    pub scores: Vec<f64>,
}

/// Raw marks for one exam of one subject, one column per component.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamSheet {
    pub subject: SubjectId,
    pub exam_type: ExamType,
    pub components: Vec<ComponentScores>,
}

impl ExamSheet {
    pub fn component(&self, name: &str) -> Option<&ComponentScores> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn statistics(&self, config: &EngineConfig) -> Vec<(String, ComponentStatistic)> {
        self.components
            .iter()
            .map(|c| {
                let threshold = c.kind.threshold(&config.thresholds);
                (c.name.clone(), compute(&c.scores, threshold))
            })
            .collect()
    }
}

/// Which sheet components contribute to each CO, in CO order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoComponentMap {
    entries: Vec<(String, Vec<String>)>,
}

impl CoComponentMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// One question per CO, each joined by the surprise test and assignment.
    pub fn standard<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut map = Self::new();
        for (co_no, question) in pairs {
            map.insert_standard(co_no, question);
        }
        map
    }

    pub fn insert_standard(&mut self, co_no: impl Into<String>, question: &str) {
        self.insert(
            co_no,
            vec![
                question.to_string(),
                SURPRISE_TEST_COLUMN.to_string(),
                ASSIGNMENT_COLUMN.to_string(),
            ],
        );
    }

    /// Replace the components of `co_no`, keeping its original position.
    pub fn insert(&mut self, co_no: impl Into<String>, components: Vec<String>) {
        let co_no = co_no.into();
        match self.entries.iter_mut().find(|(co, _)| *co == co_no) {
            Some(entry) => entry.1 = components,
            None => self.entries.push((co_no, components)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(co, components)| (co.as_str(), components.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-CO attainment levels for one exam, as a `direct` record.
pub fn exam_co_levels(
    sheet: &ExamSheet,
    map: &CoComponentMap,
    config: &EngineConfig,
) -> AttainmentRecord {
    let attainment_data = map
        .iter()
        .map(|(co_no, names)| {
            let levels: Vec<Option<u8>> = names
                .iter()
                .map(|name| {
                    sheet.component(name).map(|c| {
                        compute(&c.scores, c.kind.threshold(&config.thresholds)).level
                    })
                })
                .collect();
            let average = average_level(&levels);
            debug!(
                subject = %sheet.subject,
                exam = %sheet.exam_type,
                co = co_no,
                ?levels,
                average,
                "co level"
            );
            AttainmentEntry::new(co_no, Attainment::Value(average))
        })
        .collect();

    AttainmentRecord::new(
        sheet.subject.clone(),
        sheet.exam_type,
        AttainmentType::Direct,
        attainment_data,
    )
}
