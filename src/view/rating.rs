// src/view/rating.rs
use crate::errors::AdlensError;
use crate::models::Evaluation;
use crate::view::persona_score::round_half_up;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rating {
    pub score: i64,
    pub emoji: &'static str,
    pub label: &'static str,
    pub description: &'static str,
}

static RATINGS: [Rating; 6] = [
    Rating {
        score: 0,
        emoji: "😔",
        label: "Not Aligned",
        description: "Complete misalignment with brand guidelines",
    },
    Rating {
        score: 1,
        emoji: "😟",
        label: "Rarely Aligned",
        description: "Slight effort but still far from acceptable",
    },
    Rating {
        score: 2,
        emoji: "😐",
        label: "Somewhat Aligned",
        description: "Partial alignment but needs improvement",
    },
    Rating {
        score: 3,
        emoji: "🙂",
        label: "Mostly Aligned",
        description: "Good adherence with minor deviations",
    },
    Rating {
        score: 4,
        emoji: "😊",
        label: "Aligned",
        description: "Strong adherence to brand guidelines",
    },
    Rating {
        score: 5,
        emoji: "😁",
        label: "Perfectly Aligned",
        description: "Flawless alignment with brand guidelines",
    },
];

/// Looks up the rating for an already-rounded average.
pub fn classify(score: i64) -> Result<&'static Rating, AdlensError> {
    usize::try_from(score)
        .ok()
        .and_then(|index| RATINGS.get(index))
        .ok_or(AdlensError::ScoreOutOfRange(score))
}

/// Rounded mean of the evaluation scores, `None` when there are none.
pub fn brand_average(evaluations: &[Evaluation]) -> Option<i64> {
    if evaluations.is_empty() {
        return None;
    }
    let total: i64 = evaluations.iter().map(|evaluation| evaluation.score).sum();
    Some(round_half_up(total as f64 / evaluations.len() as f64))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Success,
    Normal,
    Exception,
}

impl ProgressStatus {
    pub fn for_score(score: i64) -> Self {
        if score >= 4 {
            ProgressStatus::Success
        } else if score >= 2 {
            ProgressStatus::Normal
        } else {
            ProgressStatus::Exception
        }
    }
}

/// Scores render as a 0-100 progress bar.
pub fn score_percent(score: f64) -> f64 {
    (score * 20.0).clamp(0.0, 100.0)
}
