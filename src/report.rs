use crate::{
    scoring::{Grade, QuestionScore},
    util::display_timestamp,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionResult {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub total_obtained: f64,
    pub total_possible: f64,
    pub percentage: f64,
    pub grade: Grade,
    pub question_scores: Vec<QuestionScore>,
    pub sections: Vec<SectionResult>,
    pub timestamp: String,
    pub consistency: Option<ConsistencyCheck>,
}

impl Report {
    pub fn questions_graded(&self) -> usize {
        self.question_scores.len()
    }
}

/// Sum the extracted scores. With nothing possible the percentage is 0 and
/// the grade is N/A.
pub fn aggregate(
    sections: Vec<SectionResult>,
    scores: Vec<QuestionScore>,
    at: OffsetDateTime,
) -> Report {
    let total_obtained: f64 = scores.iter().map(|s| s.obtained).sum();
    let total_possible: f64 = scores.iter().map(|s| s.possible).sum();
    let (percentage, grade) = if total_possible > 0.0 {
        let p = 100.0 * total_obtained / total_possible;
        (p, Grade::from_percentage(p))
    } else {
        (0.0, Grade::NotApplicable)
    };

    Report {
        total_obtained,
        total_possible,
        percentage,
        grade,
        question_scores: scores,
        sections,
        timestamp: display_timestamp(at),
        consistency: None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsistencyStatus {
    Passed,
    Warning,
}

/// Outcome of grading one section twice. Only question counts are compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsistencyCheck {
    pub section: String,
    pub original_count: usize,
    pub rerun_count: usize,
    pub status: ConsistencyStatus,
}

impl ConsistencyCheck {
    pub fn compare(
        section: &str,
        original: &[QuestionScore],
        rerun: &[QuestionScore],
    ) -> ConsistencyCheck {
        let status = if original.len() == rerun.len() {
            ConsistencyStatus::Passed
        } else {
            ConsistencyStatus::Warning
        };
        ConsistencyCheck {
            section: section.to_string(),
            original_count: original.len(),
            rerun_count: rerun.len(),
            status,
        }
    }

    pub fn summary(&self) -> String {
        match self.status {
            ConsistencyStatus::Passed => format!(
                "PASSED: {} graded {} questions on both runs",
                self.section, self.original_count
            ),
            ConsistencyStatus::Warning => format!(
                "WARNING: {} graded {} questions on the first run and {} on the re-run",
                self.section, self.original_count, self.rerun_count
            ),
        }
    }
}
