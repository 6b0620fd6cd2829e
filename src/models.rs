use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of program outcomes in the correlation matrix.
pub const PO_COUNT: usize = 12;
/// Number of program-specific outcomes in the correlation matrix.
pub const PSO_COUNT: usize = 2;
/// Positional CO slots (`CO1`..`CO5`) carried by a feedback response.
pub const FEEDBACK_SLOTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub String);

impl SubjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(value: &str) -> Self {
        SubjectId(value.to_string())
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub branch: String,
    pub year: u8,
    pub semester: u8,
    pub regulation: String,
    pub course_code: String,
}

/// Bloom's taxonomy tag (`BTL-1`..`BTL-6`) carried by a course outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BloomLevel(u8);

impl BloomLevel {
    pub fn new(level: u8) -> Option<Self> {
        (1..=6).contains(&level).then_some(BloomLevel(level))
    }

    pub fn level(self) -> u8 {
        self.0
    }
}

impl FromStr for BloomLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .strip_prefix("BTL-")
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(BloomLevel::new)
            .ok_or_else(|| format!("invalid knowledge level tag: {s}"))
    }
}

impl TryFrom<String> for BloomLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BloomLevel> for String {
    fn from(value: BloomLevel) -> Self {
        value.to_string()
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BTL-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseOutcome {
    pub co_no: String,
    pub description: String,
    pub knowledge_level: BloomLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExamType {
    #[serde(rename = "CIE-1")]
    Cie1,
    #[serde(rename = "CIE-2")]
    Cie2,
    #[serde(rename = "SEE")]
    See,
    #[serde(rename = "COMPUTED")]
    Computed,
}

impl ExamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ExamType::Cie1 => "CIE-1",
            ExamType::Cie2 => "CIE-2",
            ExamType::See => "SEE",
            ExamType::Computed => "COMPUTED",
        }
    }
}

impl FromStr for ExamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CIE-1" => Ok(ExamType::Cie1),
            "CIE-2" => Ok(ExamType::Cie2),
            "SEE" => Ok(ExamType::See),
            "COMPUTED" => Ok(ExamType::Computed),
            other => Err(format!("unknown exam type: {other}")),
        }
    }
}

impl fmt::Display for ExamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttainmentType {
    Direct,
    ComputedDirect,
    ComputedIndirect,
    ComputedOverall,
}

impl AttainmentType {
    pub fn as_str(self) -> &'static str {
        match self {
            AttainmentType::Direct => "direct",
            AttainmentType::ComputedDirect => "computedDirect",
            AttainmentType::ComputedIndirect => "computedIndirect",
            AttainmentType::ComputedOverall => "computedOverall",
        }
    }
}

impl FromStr for AttainmentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(AttainmentType::Direct),
            "computedDirect" => Ok(AttainmentType::ComputedDirect),
            "computedIndirect" => Ok(AttainmentType::ComputedIndirect),
            "computedOverall" => Ok(AttainmentType::ComputedOverall),
            other => Err(format!("unknown attainment type: {other}")),
        }
    }
}

impl fmt::Display for AttainmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of an attainment snapshot; at most one current record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AttainmentKey {
    pub subject: SubjectId,
    pub exam_type: ExamType,
    pub attainment_type: AttainmentType,
}

impl AttainmentKey {
    pub fn new(subject: SubjectId, exam_type: ExamType, attainment_type: AttainmentType) -> Self {
        Self {
            subject,
            exam_type,
            attainment_type,
        }
    }
}

impl fmt::Display for AttainmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.subject, self.exam_type, self.attainment_type)
    }
}

/// An attainment value, or the `-` sentinel for "not computable".
///
/// The sentinel is never coerced to zero: a missing upstream input keeps
/// propagating as `NotComputable` through every combiner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AttainmentRepr", into = "AttainmentRepr")]
pub enum Attainment {
    Value(f64),
    NotComputable,
}

impl Attainment {
    pub fn value(self) -> Option<f64> {
        match self {
            Attainment::Value(v) => Some(v),
            Attainment::NotComputable => None,
        }
    }

    pub fn is_computable(self) -> bool {
        matches!(self, Attainment::Value(_))
    }
}

impl From<Option<f64>> for Attainment {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Attainment::NotComputable, Attainment::Value)
    }
}

impl fmt::Display for Attainment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attainment::Value(v) => write!(f, "{v}"),
            Attainment::NotComputable => f.write_str("-"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum AttainmentRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<AttainmentRepr> for Attainment {
    type Error = String;

    fn try_from(repr: AttainmentRepr) -> Result<Self, Self::Error> {
        match repr {
            AttainmentRepr::Number(v) if v.is_finite() => Ok(Attainment::Value(v)),
            AttainmentRepr::Number(v) => Err(format!("invalid attainment level: {v}")),
            AttainmentRepr::Text(s) if s == "-" || s.eq_ignore_ascii_case("n/a") => {
                Ok(Attainment::NotComputable)
            }
            AttainmentRepr::Text(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Attainment::Value)
                .ok_or_else(|| format!("invalid attainment level: {s}")),
        }
    }
}

impl From<Attainment> for AttainmentRepr {
    fn from(value: Attainment) -> Self {
        match value {
            Attainment::Value(v) => AttainmentRepr::Number(v),
            Attainment::NotComputable => AttainmentRepr::Text("-".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentEntry {
    pub co_no: String,
    pub attainment_level: Attainment,
}

impl AttainmentEntry {
    pub fn new(co_no: impl Into<String>, attainment_level: Attainment) -> Self {
        Self {
            co_no: co_no.into(),
            attainment_level,
        }
    }
}

/// The durable unit of attainment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttainmentRecord {
    pub subject: SubjectId,
    pub exam_type: ExamType,
    pub attainment_type: AttainmentType,
    pub attainment_data: Vec<AttainmentEntry>,
}

impl AttainmentRecord {
    pub fn new(
        subject: SubjectId,
        exam_type: ExamType,
        attainment_type: AttainmentType,
        attainment_data: Vec<AttainmentEntry>,
    ) -> Self {
        Self {
            subject,
            exam_type,
            attainment_type,
            attainment_data,
        }
    }

    pub fn key(&self) -> AttainmentKey {
        AttainmentKey::new(self.subject.clone(), self.exam_type, self.attainment_type)
    }

    /// Level recorded for `co_no`, if the CO appears in this record at all.
    pub fn level_of(&self, co_no: &str) -> Option<Attainment> {
        self.attainment_data
            .iter()
            .find(|entry| entry.co_no == co_no)
            .map(|entry| entry.attainment_level)
    }

    pub fn co_numbers(&self) -> impl Iterator<Item = &str> {
        self.attainment_data.iter().map(|entry| entry.co_no.as_str())
    }
}

/// One student's self-rating per positional CO slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackResponse {
    #[serde(rename = "studentId")]
    pub student_id: String,
    #[serde(rename = "subjectId")]
    pub subject: SubjectId,
    #[serde(rename = "CO1", default)]
    pub co1: Option<u8>,
    #[serde(rename = "CO2", default)]
    pub co2: Option<u8>,
    #[serde(rename = "CO3", default)]
    pub co3: Option<u8>,
    #[serde(rename = "CO4", default)]
    pub co4: Option<u8>,
    #[serde(rename = "CO5", default)]
    pub co5: Option<u8>,
}

impl FeedbackResponse {
    pub fn new(
        student_id: impl Into<String>,
        subject: SubjectId,
        ratings: [Option<u8>; FEEDBACK_SLOTS],
    ) -> Self {
        let [co1, co2, co3, co4, co5] = ratings;
        Self {
            student_id: student_id.into(),
            subject,
            co1,
            co2,
            co3,
            co4,
            co5,
        }
    }

    pub fn ratings(&self) -> [Option<u8>; FEEDBACK_SLOTS] {
        [self.co1, self.co2, self.co3, self.co4, self.co5]
    }
}

/// One CO's row of the CO→PO/PSO correlation matrix; each cell is 0..=3.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopoMatrixEntry {
    pub subject: SubjectId,
    pub course_outcome: String,
    pub po: [u8; PO_COUNT],
    pub pso: [u8; PSO_COUNT],
}

/// Column means of a subject's correlation matrix, one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopoAverage {
    pub subject: SubjectId,
    pub po_avg: [f64; PO_COUNT],
    pub pso_avg: [f64; PSO_COUNT],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatistic {
    pub attempted: usize,
    pub secured: usize,
    pub percentage: f64,
    pub level: u8,
}
