//! Command matching for inbound chat messages.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use relay_core::SharedOrchestrator;

use crate::gateway::InboundMessage;

/// Whatever turns a user question into a reply.
#[async_trait]
pub trait ExchangeHandler: Send + Sync {
    async fn handle_user_message(&self, text: &str) -> String;

    /// True once the handler can no longer serve and the process should stop.
    async fn is_poisoned(&self) -> bool {
        false
    }
}

#[async_trait]
impl ExchangeHandler for SharedOrchestrator {
    async fn handle_user_message(&self, text: &str) -> String {
        SharedOrchestrator::handle_user_message(self, text).await
    }

    async fn is_poisoned(&self) -> bool {
        SharedOrchestrator::is_poisoned(self).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Ask(String),
}

/// Parse a message into a command, or `None` when it is not addressed to
/// the bot. Commands are matched on the first whitespace-separated field,
/// so `!help me` shows help while `! help` is a question.
pub fn parse_command(prefix: &str, content: &str) -> Option<Command> {
    let rest = content.strip_prefix(prefix)?.trim();
    if rest.is_empty() {
        return None;
    }

    let first = content.split_whitespace().next().unwrap_or_default();
    let word = first.strip_prefix(prefix).unwrap_or_default();
    match word.to_lowercase().as_str() {
        "help" => Some(Command::Help),
        "status" => Some(Command::Status),
        _ => Some(Command::Ask(rest.to_string())),
    }
}

/// Render an uptime the way `1h2m3s` reads, rounded to whole seconds.
pub fn format_uptime(uptime: Duration) -> String {
    let total = (uptime.as_millis() + 500) / 1000;
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub prefix: String,
    pub max_message_chars: usize,
    /// Author id of the bot itself; its own messages are ignored.
    pub self_id: String,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            max_message_chars: 1000,
            self_id: "relay-bot".to_string(),
        }
    }
}

pub struct Dispatcher<H> {
    handler: H,
    settings: DispatchSettings,
    started: Instant,
}

impl<H: ExchangeHandler> Dispatcher<H> {
    pub fn new(handler: H, settings: DispatchSettings) -> Self {
        Self {
            handler,
            settings,
            started: Instant::now(),
        }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn help_text(&self) -> String {
        let p = &self.settings.prefix;
        format!(
            "I'm a bot powered by an AI.  Talk to me by starting your message with `{p}`.\n\
             Examples:\n\
             \n\
             `{p}What is the mass of Jupiter?`\n\
             `{p}In philosophy, what is the Hard Problem of Consciousness?`\n\
             `{p}In 'The Lord of the Rings', who was Saruman?`\n\
             \n\
             My replies will be brief.\n\
             \n\
             I also respond to these commands:\n\
             \n\
             `{p}help`   - Shows this help message.\n\
             `{p}status` - Shows my status and uptime."
        )
    }

    pub fn status_text(&self) -> String {
        format!(
            "All systems are nominal.  I have been running for {}.",
            format_uptime(self.started.elapsed())
        )
    }

    /// Produce the reply for one inbound message, if any is due.
    pub async fn dispatch(&self, message: &InboundMessage) -> Option<String> {
        if message.author_id == self.settings.self_id {
            return None;
        }

        match parse_command(&self.settings.prefix, &message.content)? {
            Command::Help => Some(self.help_text()),
            Command::Status => Some(self.status_text()),
            Command::Ask(question) => {
                let length = question.chars().count();
                if length > self.settings.max_message_chars {
                    log::info!(
                        "Rejected {length}-character message from {}",
                        message.author_id
                    );
                    return Some(format!(
                        "Sorry, your message is too long ({length} characters).  \
                         Please keep it under {} characters.",
                        self.settings.max_message_chars
                    ));
                }
                log::debug!(
                    "Forwarding message from {} in {}",
                    message.author_id,
                    message.channel.id
                );
                Some(self.handler.handle_user_message(&question).await)
            }
        }
    }
}
