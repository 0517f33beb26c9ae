// src/view/mod.rs
//! Derived values for the results screen, built from a parsed
//! [`AnalysisResult`](crate::models::AnalysisResult).

pub mod assembler;
pub mod persona_match;
pub mod persona_score;
pub mod rating;
pub mod ui_state;

pub use assembler::{ResultsViewModel, assemble};
pub use ui_state::{ResultsUiState, UiAction};
