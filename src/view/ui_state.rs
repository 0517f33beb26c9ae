// src/view/ui_state.rs
//! Transient results-screen state. It only changes through [`ResultsUiState::apply`]
//! and the chat functions below, and it round-trips through serde so it can
//! live in the session store.

use crate::errors::AdlensError;
use crate::models::{AnalysisResult, ChatMessage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultsUiState {
    #[serde(default)]
    expanded_sections: BTreeSet<String>,
    #[serde(default)]
    expanded_cards: BTreeSet<usize>,
    #[serde(default)]
    preview: Option<usize>,
    #[serde(default)]
    chat: Option<ChatPanel>,
    #[serde(default)]
    chat_contexts_opened: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatPanel {
    pub interaction_id: String,
    pub persona: String,
    pub context: u64,
    pub transcript: Vec<ChatMessage>,
    /// True while any reply for this context is still outstanding.
    pub awaiting_reply: bool,
    #[serde(default)]
    pub pending_replies: u32,
}

impl ChatPanel {
    fn settle_reply(&mut self) {
        self.pending_replies = self.pending_replies.saturating_sub(1);
        self.awaiting_reply = self.pending_replies > 0;
    }
}

/// Identifies the chat context a request was sent from, so a late reply
/// can be matched against whatever panel is open when it lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTicket {
    pub interaction_id: String,
    pub context: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UiAction {
    ToggleGuideline { image: usize, evaluation: usize },
    ToggleFeedback { image: usize, evaluation: usize },
    ToggleCard { image: usize },
    OpenPreview { image: usize },
    ClosePreview,
    OpenChat { interaction_id: String },
    CloseChat,
}

fn guideline_key(image: usize, evaluation: usize) -> String {
    format!("{}-{}", image, evaluation)
}

fn feedback_key(image: usize, evaluation: usize) -> String {
    format!("{}-{}-feedback", image, evaluation)
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, key: T) {
    if set.contains(&key) {
        set.remove(&key);
    } else {
        set.insert(key);
    }
}

impl ResultsUiState {
    pub fn apply(&mut self, action: UiAction, result: &AnalysisResult) -> Result<(), AdlensError> {
        match action {
            UiAction::ToggleGuideline { image, evaluation } => {
                check_evaluation(result, image, evaluation)?;
                toggle(&mut self.expanded_sections, guideline_key(image, evaluation));
            }
            UiAction::ToggleFeedback { image, evaluation } => {
                check_evaluation(result, image, evaluation)?;
                toggle(&mut self.expanded_sections, feedback_key(image, evaluation));
            }
            UiAction::ToggleCard { image } => {
                check_image(result, image)?;
                toggle(&mut self.expanded_cards, image);
            }
            UiAction::OpenPreview { image } => {
                check_image(result, image)?;
                self.preview = Some(image);
            }
            UiAction::ClosePreview => self.preview = None,
            UiAction::OpenChat { interaction_id } => {
                let review = result.find_review(&interaction_id).ok_or_else(|| {
                    AdlensError::NotFound(format!("No persona review for interaction {}", interaction_id))
                })?;
                self.open_chat(interaction_id.clone(), review.persona.clone());
            }
            UiAction::CloseChat => self.chat = None,
        }
        Ok(())
    }

    /// Starts a fresh chat context. The transcript and any pending reply of
    /// the previous context are discarded.
    fn open_chat(&mut self, interaction_id: String, persona: String) {
        self.chat_contexts_opened += 1;
        self.chat = Some(ChatPanel {
            interaction_id,
            persona,
            context: self.chat_contexts_opened,
            transcript: Vec::new(),
            awaiting_reply: false,
            pending_replies: 0,
        });
    }

    pub fn begin_chat_send(&mut self, text: &str) -> Result<ChatTicket, AdlensError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AdlensError::Validation(
                "Chat message must not be empty".to_string(),
            ));
        }
        let chat = self
            .chat
            .as_mut()
            .ok_or_else(|| AdlensError::Validation("No chat panel is open".to_string()))?;

        chat.transcript.push(ChatMessage {
            text: text.to_string(),
            is_user: true,
        });
        chat.pending_replies += 1;
        chat.awaiting_reply = true;

        Ok(ChatTicket {
            interaction_id: chat.interaction_id.clone(),
            context: chat.context,
        })
    }

    /// Appends the persona's reply. Returns `false` when the ticket belongs
    /// to a context that has since been closed or replaced.
    pub fn receive_chat_reply(&mut self, ticket: &ChatTicket, text: String) -> bool {
        match self.current_chat_mut(ticket) {
            Some(chat) => {
                chat.transcript.push(ChatMessage {
                    text,
                    is_user: false,
                });
                chat.settle_reply();
                true
            }
            None => false,
        }
    }

    pub fn fail_chat_reply(&mut self, ticket: &ChatTicket) -> bool {
        match self.current_chat_mut(ticket) {
            Some(chat) => {
                chat.settle_reply();
                true
            }
            None => false,
        }
    }

    fn current_chat_mut(&mut self, ticket: &ChatTicket) -> Option<&mut ChatPanel> {
        self.chat
            .as_mut()
            .filter(|chat| chat.context == ticket.context && chat.interaction_id == ticket.interaction_id)
    }

    pub fn is_guideline_expanded(&self, image: usize, evaluation: usize) -> bool {
        self.expanded_sections.contains(&guideline_key(image, evaluation))
    }

    pub fn is_feedback_expanded(&self, image: usize, evaluation: usize) -> bool {
        self.expanded_sections.contains(&feedback_key(image, evaluation))
    }

    pub fn is_card_expanded(&self, image: usize) -> bool {
        self.expanded_cards.contains(&image)
    }

    pub fn preview(&self) -> Option<usize> {
        self.preview
    }

    pub fn chat(&self) -> Option<&ChatPanel> {
        self.chat.as_ref()
    }
}

fn check_image(result: &AnalysisResult, image: usize) -> Result<(), AdlensError> {
    if image < result.brand_reviews.len() {
        Ok(())
    } else {
        Err(AdlensError::Validation(format!("Image {} does not exist", image)))
    }
}

fn check_evaluation(result: &AnalysisResult, image: usize, evaluation: usize) -> Result<(), AdlensError> {
    check_image(result, image)?;
    if evaluation < result.brand_reviews[image].evaluations.len() {
        Ok(())
    } else {
        Err(AdlensError::Validation(format!(
            "Image {} has no evaluation {}",
            image, evaluation
        )))
    }
}
