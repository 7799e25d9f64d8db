//! Exchange orchestration: rate limit, request, read, decode, remember.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::RelayConfig;
use crate::conversation::{ConversationStore, Turn};
use crate::decoder::{decode_response, DecodedResponse};
use crate::error::{RelayError, Result};
use crate::rate_limit::RateLimiter;
use crate::reader::{read_to_end, ReadLimits};
use crate::request::build_request;
use crate::transport::Transport;

/// Stored and returned when the model produced no text at all (for example
/// only tool calls, or the whole budget went to reasoning).
pub const EMPTY_REPLY: &str = "(no reply)";

/// Runs one exchange at a time against a single shared conversation.
///
/// Not re-entrant: callers that receive events concurrently must go through
/// [`SharedOrchestrator`].
pub struct ExchangeOrchestrator {
    config: RelayConfig,
    transport: Arc<dyn Transport>,
    conversation: ConversationStore,
    limiter: RateLimiter,
    limits: ReadLimits,
    poisoned: bool,
}

impl ExchangeOrchestrator {
    pub fn new(config: RelayConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            conversation: ConversationStore::new(config.max_turns),
            limiter: RateLimiter::new(config.cooldown()),
            limits: ReadLimits::new(config.max_response_bytes, config.response_margin),
            transport,
            config,
            poisoned: false,
        }
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    /// Set once conversation memory has failed its consistency check; every
    /// later exchange is refused.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Entry point for the gateway. Failures come back as their diagnostic
    /// text so the user always gets an answer.
    pub async fn handle_user_message(&mut self, text: &str) -> String {
        match self.exchange(text).await {
            Ok(reply) => reply,
            Err(err) => {
                match &err {
                    RelayError::RateLimited { .. } => log::info!("Exchange rejected: {err}"),
                    RelayError::ConversationCorrupted(_) => log::error!("Exchange aborted: {err}"),
                    _ => log::warn!("Exchange failed: {err}"),
                }
                err.to_string()
            }
        }
    }

    /// Run one exchange and return the text to deliver.
    pub async fn exchange(&mut self, text: &str) -> Result<String> {
        if self.poisoned {
            return Err(RelayError::ConversationCorrupted(
                "refusing to continue after an earlier corruption".to_string(),
            ));
        }

        let result = self.run_exchange(text).await;
        if let Err(err) = &result {
            if err.is_fatal() {
                self.poisoned = true;
            }
        }
        result
    }

    async fn run_exchange(&mut self, text: &str) -> Result<String> {
        self.limiter.admit()?;

        self.conversation.append_user(text)?;
        log::debug!("Recorded user turn ({} turns in window)", self.conversation.len());

        let decoded = match self.request_reply().await {
            Ok(decoded) => decoded,
            Err(err) => {
                if self.conversation.rollback_pending_user().is_some() {
                    log::debug!("Rolled back unanswered user turn");
                }
                return Err(err);
            }
        };

        let reply_text = if decoded.reply_text.trim().is_empty() {
            log::warn!("Upstream response contained no text");
            EMPTY_REPLY.to_string()
        } else {
            decoded.reply_text.clone()
        };

        self.conversation.append_assistant(reply_text.as_str())?;
        self.conversation.trim_if_needed()?;

        Ok(match decoded.reasoning() {
            Some(reasoning) if self.config.reasoning_enabled => {
                format_with_reasoning(reasoning, &reply_text)
            }
            _ => reply_text,
        })
    }

    async fn request_reply(&self) -> Result<DecodedResponse> {
        let today = chrono::Local::now().date_naive();
        let request = build_request(&self.config, &self.conversation.to_ordered_slice(), today);

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(RelayError::UpstreamHttp {
                status: response.status,
            });
        }

        let body = read_to_end(response.body, response.content_length, self.limits).await?;
        Ok(decode_response(&body, self.config.reasoning_enabled)?)
    }
}

/// Quote the reasoning above the reply so chat readers can tell them apart.
pub fn format_with_reasoning(reasoning: &str, reply: &str) -> String {
    let quoted: Vec<String> = reasoning
        .trim()
        .lines()
        .map(|line| format!("> {line}"))
        .collect();
    format!("> **Reasoning**\n{}\n\n{}", quoted.join("\n"), reply)
}

/// Serializes whole exchanges behind one async lock so concurrent callers
/// cannot interleave conversation updates.
#[derive(Clone)]
pub struct SharedOrchestrator {
    inner: Arc<Mutex<ExchangeOrchestrator>>,
}

impl SharedOrchestrator {
    pub fn new(orchestrator: ExchangeOrchestrator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
        }
    }

    pub async fn handle_user_message(&self, text: &str) -> String {
        self.inner.lock().await.handle_user_message(text).await
    }

    pub async fn is_poisoned(&self) -> bool {
        self.inner.lock().await.is_poisoned()
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.inner.lock().await.conversation().to_ordered_slice()
    }
}
