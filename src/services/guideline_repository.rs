// src/services/guideline_repository.rs
use crate::errors::AdlensError;
use crate::models::{Guideline, GuidelineDraft};
use crate::services::AnalysisClient;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

/// All guideline reads and writes go through one store.
#[async_trait]
pub trait GuidelineRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Guideline>, AdlensError>;
    async fn create(&self, draft: &GuidelineDraft) -> Result<Guideline, AdlensError>;
    async fn update(&self, id: &str, draft: &GuidelineDraft) -> Result<Guideline, AdlensError>;
    async fn delete(&self, id: &str) -> Result<(), AdlensError>;
}

/// Guidelines stored by the remote review service. The service exposes list
/// and create only, so edits and deletes are refused instead of being kept
/// somewhere the service never sees.
pub struct RemoteGuidelineRepository {
    client: Arc<AnalysisClient>,
}

impl RemoteGuidelineRepository {
    pub fn new(client: Arc<AnalysisClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl GuidelineRepository for RemoteGuidelineRepository {
    async fn list(&self) -> Result<Vec<Guideline>, AdlensError> {
        self.client.fetch_guidelines().await
    }

    async fn create(&self, draft: &GuidelineDraft) -> Result<Guideline, AdlensError> {
        draft.validate()?;
        let text = draft.guidelines_text()?;
        let created = self.client.create_guideline(draft.name.trim(), &text).await?;
        info!(
            "Created guideline {:?} ({} rules)",
            created.name,
            draft.rules.len()
        );
        Ok(created)
    }

    async fn update(&self, id: &str, _draft: &GuidelineDraft) -> Result<Guideline, AdlensError> {
        Err(AdlensError::Unsupported(format!(
            "the review service cannot edit guideline {}",
            id
        )))
    }

    async fn delete(&self, id: &str) -> Result<(), AdlensError> {
        Err(AdlensError::Unsupported(format!(
            "the review service cannot delete guideline {}",
            id
        )))
    }
}
