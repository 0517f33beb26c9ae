// src/view/assembler.rs
//! Builds the results screen view-model from a parsed analysis result.

use crate::errors::AdlensError;
use crate::models::{
    AnalysisResult, Evaluation, PERSONA_METRICS, PersonaCatalogEntry, PersonaReview,
    UploadedImage,
};
use crate::view::persona_match::match_personas;
use crate::view::persona_score::{average_persona_score, metric_value};
use crate::view::rating::{ProgressStatus, Rating, brand_average, classify, score_percent};
use crate::view::ui_state::{ChatPanel, ResultsUiState};
use serde::Serialize;

/// Text longer than this gets a "Show More" toggle.
const EXPANDABLE_TEXT_LEN: usize = 100;

pub static PERSONA_PALETTE: [&str; 8] = [
    "#6523D1", "#8F5AE8", "#6366F1", "#0EA5E9", "#10B981", "#F59E0B", "#EF4444", "#EC4899",
];

#[derive(Debug, Clone, Serialize)]
pub struct ResultsViewModel {
    pub analysis_incomplete: bool,
    pub images: Vec<ImageView>,
    pub matched_personas: Vec<PersonaCatalogEntry>,
    pub chat: Option<ChatPanel>,
    pub preview: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageView {
    pub image_index: usize,
    pub filename: String,
    /// Filled in by the display that owns the image blob.
    pub preview_url: Option<String>,
    pub brand_score: Option<i64>,
    pub rating: Option<Rating>,
    pub evaluations: Vec<EvaluationView>,
    pub worst_evaluation: Option<usize>,
    pub expanded: bool,
    pub personas: Vec<PersonaCircle>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationView {
    pub index: usize,
    pub guideline: String,
    pub feedback: String,
    pub score: i64,
    pub percent: f64,
    pub status: ProgressStatus,
    pub guideline_expandable: bool,
    pub guideline_expanded: bool,
    pub feedback_expandable: bool,
    pub feedback_expanded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonaCircle {
    pub id: String,
    pub name: String,
    pub initials: String,
    pub color: &'static str,
    pub score: Option<i64>,
    pub interaction_id: String,
    pub metrics: Vec<MetricView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricView {
    pub name: String,
    pub value: Option<f64>,
    pub percent: Option<f64>,
}

pub fn assemble(
    result: &AnalysisResult,
    images: &[UploadedImage],
    catalog: &[PersonaCatalogEntry],
    ui: &ResultsUiState,
) -> Result<ResultsViewModel, AdlensError> {
    if result.brand_reviews.len() != images.len() {
        return Err(AdlensError::MalformedResult(format!(
            "{} brand reviews for {} images",
            result.brand_reviews.len(),
            images.len()
        )));
    }

    let mut views = Vec::new();
    for (index, (review, image)) in result.brand_reviews.iter().zip(images).enumerate() {
        let Some(persona_set) = result.persona_set(index) else {
            continue;
        };

        let brand_score = brand_average(&review.evaluations);
        let rating = brand_score.map(classify).transpose()?.copied();

        views.push(ImageView {
            image_index: index,
            filename: image.filename.clone(),
            preview_url: None,
            brand_score,
            rating,
            evaluations: review
                .evaluations
                .iter()
                .enumerate()
                .map(|(eval_index, evaluation)| evaluation_view(index, eval_index, evaluation, ui))
                .collect(),
            worst_evaluation: worst_evaluation(&review.evaluations),
            expanded: ui.is_card_expanded(index),
            personas: persona_set.results.iter().map(persona_circle).collect(),
        });
    }

    Ok(ResultsViewModel {
        analysis_incomplete: views.is_empty(),
        images: views,
        matched_personas: match_personas(catalog, result.persona_reviews.iter().flatten()),
        chat: ui.chat().cloned(),
        preview: ui.preview(),
    })
}

fn evaluation_view(
    image: usize,
    index: usize,
    evaluation: &Evaluation,
    ui: &ResultsUiState,
) -> EvaluationView {
    EvaluationView {
        index,
        guideline: evaluation.guideline.clone(),
        feedback: evaluation.feedback.clone(),
        score: evaluation.score,
        percent: score_percent(evaluation.score as f64),
        status: ProgressStatus::for_score(evaluation.score),
        guideline_expandable: evaluation.guideline.chars().count() > EXPANDABLE_TEXT_LEN,
        guideline_expanded: ui.is_guideline_expanded(image, index),
        feedback_expandable: evaluation.feedback.chars().count() > EXPANDABLE_TEXT_LEN,
        feedback_expanded: ui.is_feedback_expanded(image, index),
    }
}

/// Lowest-scoring evaluation; the first one wins a tie.
fn worst_evaluation(evaluations: &[Evaluation]) -> Option<usize> {
    evaluations
        .iter()
        .enumerate()
        .min_by_key(|(index, evaluation)| (evaluation.score, *index))
        .map(|(index, _)| index)
}

fn persona_circle(review: &PersonaReview) -> PersonaCircle {
    PersonaCircle {
        id: review.persona.clone(),
        name: review.persona.clone(),
        initials: initials(&review.persona),
        color: persona_color(&review.persona),
        score: average_persona_score(&review.result),
        interaction_id: review.interaction_id.clone(),
        metrics: metric_rows(review),
    }
}

/// Known metrics first in their usual order, anything else after.
fn metric_rows(review: &PersonaReview) -> Vec<MetricView> {
    let known = PERSONA_METRICS
        .iter()
        .filter_map(|name| review.result.get_key_value(*name));
    let extra = review
        .result
        .iter()
        .filter(|(name, _)| !PERSONA_METRICS.contains(&name.as_str()));

    known
        .chain(extra)
        .map(|(name, value)| {
            let value = metric_value(value);
            MetricView {
                name: name.clone(),
                value,
                percent: value.map(score_percent),
            }
        })
        .collect()
}

pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Picks a palette colour from the sum of the name's UTF-16 code units.
pub fn persona_color(name: &str) -> &'static str {
    let hash: usize = name.encode_utf16().map(usize::from).sum();
    PERSONA_PALETTE[hash % PERSONA_PALETTE.len()]
}
