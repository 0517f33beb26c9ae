// src/models.rs
use crate::errors::AdlensError;
use crate::view::ResultsUiState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The ten dimensions a simulated persona scores an ad on, in display order.
pub static PERSONA_METRICS: [&str; 10] = [
    "Brand Recognition",
    "Message Clarity",
    "Visual Appeal",
    "Emotional Resonance",
    "Brand Recall",
    "Interest Generation",
    "Ad Visibility",
    "Simplicity",
    "Relevance",
    "Brand Association",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub guideline: String,
    pub score: i64,
    pub feedback: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandReview {
    pub evaluations: Vec<Evaluation>,
}

/// Raw metric values as the service sent them. Entries may be missing,
/// strings, or null; only finite numbers count towards an average.
pub type PersonaResult = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaReview {
    pub persona: String,
    pub result: PersonaResult,
    #[serde(rename = "interactionID")]
    pub interaction_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PersonaReviewSet {
    #[serde(rename = "imageIdentifiedPersonasList", default)]
    pub identified_personas: Vec<String>,
    pub results: Vec<PersonaReview>,
}

/// Typed form of a batch review payload. `persona_reviews` is index-aligned
/// with `brand_reviews`; `None` marks an image whose persona analysis never
/// completed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "brandReviews")]
    pub brand_reviews: Vec<BrandReview>,
    #[serde(rename = "personaReviews")]
    pub persona_reviews: Vec<Option<PersonaReviewSet>>,
}

impl AnalysisResult {
    pub fn persona_set(&self, index: usize) -> Option<&PersonaReviewSet> {
        self.persona_reviews.get(index).and_then(Option::as_ref)
    }

    pub fn find_review(&self, interaction_id: &str) -> Option<&PersonaReview> {
        self.persona_reviews
            .iter()
            .flatten()
            .flat_map(|set| set.results.iter())
            .find(|review| review.interaction_id == interaction_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaCatalogEntry {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub occupation: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Guideline {
    #[serde(
        rename = "_id",
        alias = "id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(alias = "brandName", default)]
    pub name: String,
    #[serde(default)]
    pub guidelines: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A guideline profile as the user enters it: a brand name plus one rule
/// per entry.
#[derive(Debug, Clone, Deserialize)]
pub struct GuidelineDraft {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<String>,
}

impl GuidelineDraft {
    pub fn validate(&self) -> Result<(), AdlensError> {
        if self.name.trim().is_empty() {
            return Err(AdlensError::Validation(
                "Please enter brand name".to_string(),
            ));
        }
        rules_text(&self.rules).map(|_| ())
    }

    pub fn guidelines_text(&self) -> Result<String, AdlensError> {
        rules_text(&self.rules)
    }
}

/// Numbers rules one per line: `"1. first\n2. second"`.
pub fn rules_text(rules: &[String]) -> Result<String, AdlensError> {
    if rules.is_empty() {
        return Err(AdlensError::Validation(
            "At least one guideline is required".to_string(),
        ));
    }
    if rules.iter().any(|rule| rule.trim().is_empty()) {
        return Err(AdlensError::Validation("Missing guideline".to_string()));
    }

    Ok(rules
        .iter()
        .enumerate()
        .map(|(index, rule)| format!("{}. {}", index + 1, rule.trim()))
        .collect::<Vec<_>>()
        .join("\n"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanedGuideline {
    #[serde(alias = "GuidelineCategory")]
    pub category: String,
    #[serde(alias = "GuidelineDescription")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelineCleanup {
    #[serde(rename = "cleanedGuidelines")]
    pub cleaned_guidelines: Vec<CleanedGuideline>,
    #[serde(rename = "rawGuidelines", default)]
    pub raw_guidelines: String,
    #[serde(rename = "normalizeGuidelines", default)]
    pub normalize_guidelines: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    #[serde(rename = "isUser")]
    pub is_user: bool,
}

/// Chat replies carry their text under either key depending on the backend
/// version.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
}

impl ChatReply {
    pub fn into_text(self) -> Option<String> {
        self.message.or(self.response)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// One submitted analysis: what was uploaded, what came back, and the
/// results screen's UI state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: Uuid,
    pub guideline_id: String,
    pub ad_brief: String,
    pub images: Vec<UploadedImage>,
    pub result: AnalysisResult,
    #[serde(default)]
    pub ui: ResultsUiState,
    pub created_at: DateTime<Utc>,
}

mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&general_purpose::STANDARD.encode(data))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
