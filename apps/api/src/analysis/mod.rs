// Resume/job compatibility analysis.
// Implements: prompt construction, model call, response normalization, result merge.
// All model calls go through llm_client.

pub mod handlers;
pub mod ingest;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod prompts;
