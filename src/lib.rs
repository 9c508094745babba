//! Chat-bot orchestration core.
//!
//! Pipeline: frontend producers call [`router::MessageRouter::ingest`], a
//! single worker drains the queue and routes each turn to either the plugin
//! dispatcher (`/command` messages) or the inference orchestrator, which runs
//! a bounded two-round tool-calling exchange against an OpenAI-compatible
//! backend. Responses are chunked by the egester and delivered through the
//! [`frontend::Frontend`] collaborator.

pub mod ai;
pub mod config;
pub mod egest;
pub mod frontend;
pub mod history;
pub mod media;
pub mod orchestrator;
pub mod plugins;
pub mod router;
pub mod tools;

pub use config::Config;
pub use orchestrator::InferenceOrchestrator;
pub use router::{InboundMessage, MessageRouter};

/// Initializes env_logger with an info default. Call once from the
/// embedding binary before spawning the router.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
