#[cfg(test)]
mod worker_tests;

use crate::config::Config;
use crate::egest;
use crate::frontend::Frontend;
use crate::media::cleanup_media;
use crate::orchestrator::{InferenceOrchestrator, InferenceRequest};
use crate::plugins::PluginDispatcher;
use futures_util::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shown when turn processing itself blows up past every inner guard.
pub const GENERIC_TURN_ERROR: &str = "An error occurred processing your request.";

/// Notice wrapped around the safety preview when delivery fails.
const DELIVERY_RETRY_NOTICE: &str = "An error occurred delivering the response to the \
frontend. The content may be too large or invalid. Showing a shortened preview:\n\n";

const PREVIEW_LIMIT: usize = 1000;

/// One queued unit of work. `aux` is an opaque routing token the core
/// threads through to egestion unchanged.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub text: String,
    pub username: String,
    /// Local paths of incoming attachments. Deleted once the turn ends,
    /// success or not.
    pub media: Vec<String>,
    pub aux: Value,
    pub conversation_id: Option<String>,
    pub temperature: Option<Value>,
    pub format: Option<String>,
}

impl InboundMessage {
    pub fn new(
        text: impl Into<String>,
        username: impl Into<String>,
        media: Vec<String>,
        aux: Value,
    ) -> Self {
        InboundMessage {
            text: text.into(),
            username: username.into(),
            media,
            aux,
            conversation_id: None,
            temperature: None,
            format: None,
        }
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_temperature(mut self, temperature: Value) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Ingestion handle plus the single worker draining the queue. Producers
/// may enqueue from any task; exactly one turn is in flight at a time,
/// in strict enqueue order.
pub struct MessageRouter {
    tx: mpsc::UnboundedSender<InboundMessage>,
    worker: JoinHandle<()>,
}

impl MessageRouter {
    pub fn spawn(
        dispatcher: Arc<PluginDispatcher>,
        orchestrator: Arc<InferenceOrchestrator>,
        frontend: Arc<dyn Frontend>,
        config: &Config,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Worker {
            dispatcher,
            orchestrator,
            frontend,
            system_prompt: config.system_prompt.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            egest_limit: config.egest_limit,
        };
        let handle = tokio::spawn(worker.run(rx));
        MessageRouter { tx, worker: handle }
    }

    /// Enqueues atomically; safe to call from concurrent producers.
    pub fn ingest(
        &self,
        text: impl Into<String>,
        username: impl Into<String>,
        media: Vec<String>,
        aux: Value,
    ) -> Result<(), String> {
        self.ingest_message(InboundMessage::new(text, username, media, aux))
    }

    pub fn ingest_message(&self, message: InboundMessage) -> Result<(), String> {
        self.tx
            .send(message)
            .map_err(|_| "Router worker has stopped".to_string())
    }

    /// Drains the queue, then stops the worker.
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            log::warn!("[ROUTER] Worker ended abnormally: {}", e);
        }
    }
}

struct Worker {
    dispatcher: Arc<PluginDispatcher>,
    orchestrator: Arc<InferenceOrchestrator>,
    frontend: Arc<dyn Frontend>,
    system_prompt: Option<String>,
    poll_interval: Duration,
    egest_limit: usize,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<InboundMessage>) {
        log::info!("[ROUTER] Worker started");
        loop {
            match rx.try_recv() {
                Ok(message) => self.process_turn(message).await,
                Err(mpsc::error::TryRecvError::Empty) => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }
        log::info!("[ROUTER] Worker stopped");
    }

    /// One complete turn: dispatch, incoming-media cleanup, delivery.
    /// Nothing escapes; the loop always reaches the next item.
    async fn process_turn(&self, message: InboundMessage) {
        log::info!(
            "[ROUTER] Turn from '{}' ({} media)",
            message.username,
            message.media.len()
        );

        let outcome = AssertUnwindSafe(self.handle(&message)).catch_unwind().await;
        let (text, media) = match outcome {
            Ok(pair) => pair,
            Err(_) => {
                log::error!("[ROUTER] Turn handling panicked");
                (GENERIC_TURN_ERROR.to_string(), Vec::new())
            }
        };

        // Incoming attachments die with the turn, whatever happened above.
        cleanup_media(&message.media);

        self.deliver(&text, &media, &message).await;
    }

    /// Routes to the plugin path or the inference path and returns the
    /// reply text plus outgoing media.
    async fn handle(&self, message: &InboundMessage) -> (String, Vec<String>) {
        if let Some(response) = self
            .dispatcher
            .dispatch(
                &message.text,
                &message.media,
                message.conversation_id.as_deref(),
            )
            .await
        {
            let media = response.media.into_iter().collect();
            return (response.text, media);
        }

        let request = InferenceRequest {
            prompt: message.text.clone(),
            system_prompt: self.system_prompt.clone(),
            username: message.username.clone(),
            media: message.media.clone(),
            temperature: message.temperature.clone(),
            use_tools: true,
            conversation_id: message.conversation_id.clone(),
            format: message.format.clone(),
        };
        let outcome = self.orchestrator.run_inference(request).await;
        (outcome.text, outcome.media)
    }

    /// Chunks and sends the reply. On a delivery failure, retries once
    /// with a bounded preview, then gives up quietly; the worker must
    /// outlive any frontend trouble.
    async fn deliver(&self, text: &str, media: &[String], message: &InboundMessage) {
        let prefix = if message.username.is_empty() {
            String::new()
        } else {
            format!("@{}: ", message.username)
        };
        let mut blocks = egest::chunk(&prefix, text, self.egest_limit);
        if blocks.is_empty() {
            // Empty reply and no prefix; the frontend still gets its one
            // delivery for the turn.
            blocks.push(String::new());
        }

        if media.len() > 1 {
            log::warn!(
                "[ROUTER] {} outgoing media items; delivering only the first",
                media.len()
            );
        }
        let attachment = media.first().map(String::as_str);

        for (i, block) in blocks.iter().enumerate() {
            let block_media = if i == 0 { attachment } else { None };
            if let Err(e) = self.frontend.egest(block, block_media, &message.aux).await {
                log::warn!("[ROUTER] Delivery failed: {}; retrying with preview", e);
                let preview: String = text.chars().take(PREVIEW_LIMIT).collect();
                let retry = format!("{}{}", DELIVERY_RETRY_NOTICE, preview);
                if let Err(e) = self.frontend.egest(&retry, None, &message.aux).await {
                    log::error!("[ROUTER] Preview delivery also failed: {}", e);
                }
                return;
            }
        }
    }
}
