// src/services/analysis_client.rs
use crate::errors::AdlensError;
use crate::models::*;
use log::{debug, error};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Instant;

const GUIDELINES_PATH: &str = "/brand/getBrandGuideline";
const CREATE_GUIDELINE_PATH: &str = "/brand/createBrandGuideline";
const CLEAN_GUIDELINES_PATH: &str = "/brand/generateBrandGuidelines";
const BATCH_REVIEW_PATH: &str = "/brand/batchBrandReview";
const PERSONA_CATALOG_PATH: &str = "/persona/getPersonas";
const CHAT_PATH: &str = "/persona/chat";

/// Client for the remote brand review service. Every request is sent once;
/// failures are logged and returned as [`AdlensError::Remote`].
pub struct AnalysisClient {
    base_url: String,
    client: Client,
}

impl AnalysisClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn fetch_guidelines(&self) -> Result<Vec<Guideline>, AdlensError> {
        let response = self
            .client
            .get(self.url(GUIDELINES_PATH))
            .header("accept", "*/*")
            .send()
            .await
            .map_err(|e| remote_error("Guideline fetch", e))?;

        read_json(response, "Guideline fetch").await
    }

    pub async fn create_guideline(
        &self,
        name: &str,
        guidelines: &str,
    ) -> Result<Guideline, AdlensError> {
        let response = self
            .client
            .post(self.url(CREATE_GUIDELINE_PATH))
            .json(&json!({
                "brandName": name,
                "guidelines": guidelines
            }))
            .send()
            .await
            .map_err(|e| remote_error("Guideline create", e))?;

        let mut created: Guideline = read_json(response, "Guideline create").await?;
        if created.name.is_empty() {
            created.name = name.to_string();
        }
        if created.guidelines.is_empty() {
            created.guidelines = guidelines.to_string();
        }
        Ok(created)
    }

    pub async fn clean_guidelines(&self, guidelines: &str) -> Result<GuidelineCleanup, AdlensError> {
        let response = self
            .client
            .post(self.url(CLEAN_GUIDELINES_PATH))
            .json(&json!({ "guidelines": guidelines }))
            .send()
            .await
            .map_err(|e| remote_error("Guideline cleanup", e))?;

        read_json(response, "Guideline cleanup").await
    }

    /// Submits every image in one multipart request. The raw JSON is returned
    /// so the caller can validate it against the number of images sent.
    pub async fn submit_batch_review(
        &self,
        images: &[UploadedImage],
        guideline_id: &str,
        ad_brief: &str,
    ) -> Result<serde_json::Value, AdlensError> {
        let start = Instant::now();

        let mut form = Form::new();
        for image in images {
            let part = Part::bytes(image.data.clone())
                .file_name(image.filename.clone())
                .mime_str(&image.content_type)
                .map_err(|e| {
                    AdlensError::Validation(format!(
                        "Invalid content type {:?}: {}",
                        image.content_type, e
                    ))
                })?;
            form = form.part("images", part);
        }
        let form = form
            .text("brandID", guideline_id.to_string())
            .text("adBrief", ad_brief.to_string());

        let response = self
            .client
            .post(self.url(BATCH_REVIEW_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(|e| remote_error("Batch review", e))?;

        let result = read_json(response, "Batch review").await?;
        debug!(
            "Batch review of {} image(s) took {} ms",
            images.len(),
            start.elapsed().as_millis()
        );
        Ok(result)
    }

    pub async fn fetch_persona_catalog(&self) -> Result<Vec<PersonaCatalogEntry>, AdlensError> {
        let response = self
            .client
            .get(self.url(PERSONA_CATALOG_PATH))
            .header("accept", "*/*")
            .send()
            .await
            .map_err(|e| remote_error("Persona catalog fetch", e))?;

        read_json(response, "Persona catalog fetch").await
    }

    pub async fn send_chat(
        &self,
        user_message: &str,
        interaction_id: &str,
    ) -> Result<String, AdlensError> {
        let response = self
            .client
            .post(self.url(CHAT_PATH))
            .json(&json!({
                "userMessage": user_message,
                "interactionID": interaction_id
            }))
            .send()
            .await
            .map_err(|e| remote_error("Chat", e))?;

        let reply: ChatReply = read_json(response, "Chat").await?;
        reply
            .into_text()
            .ok_or_else(|| remote_error("Chat", "reply had neither message nor response"))
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, what: &str) -> Result<T, AdlensError> {
    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(remote_error(what, format!("{}: {}", status, error_text)));
    }

    response
        .json()
        .await
        .map_err(|e| remote_error(what, format!("unreadable response: {}", e)))
}

fn remote_error(what: &str, detail: impl std::fmt::Display) -> AdlensError {
    error!("{} failed: {}", what, detail);
    AdlensError::Remote(format!("{} failed: {}", what, detail))
}
