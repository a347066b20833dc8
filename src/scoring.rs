use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static QUESTION_SCORE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Question\s+[0-9]+:\s*([0-9]+(?:\.[0-9]+)?)\s*/\s*([0-9]+(?:\.[0-9]+)?)")
        .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionScore {
    pub obtained: f64,
    pub possible: f64,
}

/// Every `Question N: a/b` line in document order.
///
/// Labels are not used: repeated or out-of-order question numbers each count.
pub fn extract_scores(text: &str) -> Vec<QuestionScore> {
    QUESTION_SCORE_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let obtained = caps.get(1)?.as_str().parse().ok()?;
            let possible = caps.get(2)?.as_str().parse().ok()?;
            Some(QuestionScore { obtained, possible })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "B+")]
    BPlus,
    B,
    C,
    D,
    F,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Grade {
    pub fn from_percentage(percentage: f64) -> Grade {
        match percentage {
            p if p >= 90.0 => Grade::APlus,
            p if p >= 80.0 => Grade::A,
            p if p >= 70.0 => Grade::BPlus,
            p if p >= 60.0 => Grade::B,
            p if p >= 50.0 => Grade::C,
            p if p >= 40.0 => Grade::D,
            _ => Grade::F,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
            Grade::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
