// src/services/mod.rs
pub mod analysis_client;
pub mod guideline_repository;
pub mod image_processor;
pub mod session_store;

pub use analysis_client::AnalysisClient;
pub use guideline_repository::{GuidelineRepository, RemoteGuidelineRepository};
pub use image_processor::ImageProcessor;
pub use session_store::{MemorySessionStore, RedisSessionStore, SessionLocks, SessionStore};
