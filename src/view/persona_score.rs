// src/view/persona_score.rs
use crate::models::PersonaResult;
use serde_json::Value;

/// Averages the finite numeric metrics of a persona result.
///
/// Strings, nulls, booleans and non-finite numbers are skipped rather than
/// coerced. Returns `None` when no usable metric remains, so callers can show
/// "no score" instead of a fabricated number. This is the only persona
/// average in the crate.
pub fn average_persona_score(result: &PersonaResult) -> Option<i64> {
    let values: Vec<f64> = result.values().filter_map(metric_value).collect();
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(round_half_up(sum / values.len() as f64))
}

/// The usable numeric value of a single metric, if it has one.
pub fn metric_value(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

/// Rounds `.5` towards positive infinity, matching how scores were always
/// displayed.
pub(crate) fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(entries: &[(&str, Value)]) -> PersonaResult {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn averages_numeric_metrics() {
        let scores = result(&[("Simplicity", json!(2)), ("Relevance", json!(4))]);
        assert_eq!(average_persona_score(&scores), Some(3));
        assert_eq!(average_persona_score(&result(&[("Relevance", json!(5))])), Some(5));
    }

    #[test]
    fn empty_or_non_numeric_means_no_score() {
        assert_eq!(average_persona_score(&PersonaResult::new()), None);
        let junk = result(&[
            ("Simplicity", json!("high")),
            ("Relevance", Value::Null),
            ("Ad Visibility", json!(true)),
        ]);
        assert_eq!(average_persona_score(&junk), None);
    }

    #[test]
    fn invalid_entries_do_not_drag_the_average() {
        let mixed = result(&[
            ("Simplicity", json!(4)),
            ("Relevance", json!("n/a")),
            ("Brand Recall", json!(5)),
        ]);
        assert_eq!(average_persona_score(&mixed), Some(5));
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(0.5), 1);
    }
}
