// src/payload.rs
//! Turns the batch review JSON into an [`AnalysisResult`], rejecting shapes
//! the results screen cannot render.

use crate::errors::AdlensError;
use crate::models::*;
use serde_json::Value;

pub fn parse_analysis_result(
    data: &Value,
    image_count: usize,
) -> Result<AnalysisResult, AdlensError> {
    let brand_reviews = data["brandReviews"]
        .as_array()
        .ok_or_else(|| malformed("brandReviews is missing or not an array"))?
        .iter()
        .enumerate()
        .map(|(index, review)| parse_brand_review(review, index))
        .collect::<Result<Vec<_>, _>>()?;

    if brand_reviews.len() != image_count {
        return Err(malformed(format!(
            "expected {} brand reviews, got {}",
            image_count,
            brand_reviews.len()
        )));
    }

    let mut persona_reviews = match &data["personaReviews"] {
        Value::Null => Vec::new(),
        Value::Array(sets) => sets
            .iter()
            .enumerate()
            .map(|(index, set)| parse_persona_set(set, index))
            .collect::<Result<Vec<_>, _>>()?,
        _ => return Err(malformed("personaReviews is not an array")),
    };

    if persona_reviews.len() > image_count {
        return Err(malformed(format!(
            "expected at most {} persona review sets, got {}",
            image_count,
            persona_reviews.len()
        )));
    }
    persona_reviews.resize(image_count, None);

    Ok(AnalysisResult {
        brand_reviews,
        persona_reviews,
    })
}

fn parse_brand_review(review: &Value, index: usize) -> Result<BrandReview, AdlensError> {
    // Older backends wrap the evaluations in `respOBJ`.
    let evaluations = review["evaluations"]
        .as_array()
        .or_else(|| review["respOBJ"]["evaluations"].as_array())
        .ok_or_else(|| malformed(format!("brandReviews[{}] has no evaluations", index)))?;

    let evaluations = evaluations
        .iter()
        .enumerate()
        .map(|(eval_index, evaluation)| parse_evaluation(evaluation, index, eval_index))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BrandReview { evaluations })
}

fn parse_evaluation(
    evaluation: &Value,
    review_index: usize,
    eval_index: usize,
) -> Result<Evaluation, AdlensError> {
    let path = format!("brandReviews[{}].evaluations[{}]", review_index, eval_index);

    let score = match &evaluation["score"] {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|value| value.fract() == 0.0)
                    .map(|value| value as i64)
            })
            .ok_or_else(|| malformed(format!("{}.score is not an integer", path)))?,
        _ => return Err(malformed(format!("{}.score is missing", path))),
    };
    if !(0..=5).contains(&score) {
        return Err(AdlensError::ScoreOutOfRange(score));
    }

    Ok(Evaluation {
        guideline: required_str(&evaluation["guideline"], &path, "guideline")?,
        score,
        feedback: evaluation["feedback"].as_str().unwrap_or("").to_string(),
    })
}

fn parse_persona_set(set: &Value, index: usize) -> Result<Option<PersonaReviewSet>, AdlensError> {
    match set {
        Value::Null => Ok(None),
        // Legacy shape: a bare list of reviews with no identified personas.
        Value::Array(results) => Ok(Some(PersonaReviewSet {
            identified_personas: Vec::new(),
            results: parse_persona_reviews(results, index)?,
        })),
        Value::Object(_) => {
            let results = set["results"]
                .as_array()
                .ok_or_else(|| malformed(format!("personaReviews[{}].results is missing", index)))?;

            let identified_personas = match &set["imageIdentifiedPersonasList"] {
                Value::Null => Vec::new(),
                Value::Array(ids) => ids
                    .iter()
                    .filter_map(|id| match id {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                    .collect(),
                _ => {
                    return Err(malformed(format!(
                        "personaReviews[{}].imageIdentifiedPersonasList is not an array",
                        index
                    )));
                }
            };

            Ok(Some(PersonaReviewSet {
                identified_personas,
                results: parse_persona_reviews(results, index)?,
            }))
        }
        _ => Err(malformed(format!("personaReviews[{}] has an unexpected shape", index))),
    }
}

fn parse_persona_reviews(
    reviews: &[Value],
    set_index: usize,
) -> Result<Vec<PersonaReview>, AdlensError> {
    reviews
        .iter()
        .enumerate()
        .map(|(index, review)| {
            let path = format!("personaReviews[{}].results[{}]", set_index, index);
            let result = match &review["result"] {
                Value::Object(map) => map
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
                Value::Null => PersonaResult::new(),
                _ => return Err(malformed(format!("{}.result is not an object", path))),
            };

            Ok(PersonaReview {
                persona: required_str(&review["persona"], &path, "persona")?,
                result,
                interaction_id: required_str(&review["interactionID"], &path, "interactionID")?,
            })
        })
        .collect()
}

fn required_str(value: &Value, path: &str, field: &str) -> Result<String, AdlensError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| malformed(format!("{}.{} is missing", path, field)))
}

fn malformed(message: impl Into<String>) -> AdlensError {
    AdlensError::MalformedResult(message.into())
}
