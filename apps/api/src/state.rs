use std::sync::Arc;

use crate::analysis::orchestrator::AnalysisOrchestrator;
use crate::llm_client::key_pool::KeyPool;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<AnalysisOrchestrator>,
    /// Same pool the model client rotates through; read for health reporting.
    pub key_pool: Arc<KeyPool>,
}
