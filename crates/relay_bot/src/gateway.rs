//! Messaging gateway: where messages come from and where replies go.

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tokio::sync::Mutex;

use crate::dispatcher::{Dispatcher, ExchangeHandler};

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelContext {
    pub id: String,
}

impl ChannelContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub author_id: String,
    pub channel: ChannelContext,
    pub content: String,
}

#[async_trait]
pub trait Gateway: Send {
    /// Next inbound message, or `None` once the source is closed.
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, GatewayError>;

    async fn deliver(&self, channel: &ChannelContext, text: &str) -> Result<(), GatewayError>;
}

pub const CONSOLE_CHANNEL: &str = "console";
pub const CONSOLE_USER: &str = "console-user";

/// Treats each input line as a message on a single channel and writes
/// replies to the output, one blank line after each.
pub struct ConsoleGateway<R, W> {
    lines: Mutex<Lines<R>>,
    output: Mutex<W>,
}

impl<R, W> ConsoleGateway<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self {
            lines: Mutex::new(input.lines()),
            output: Mutex::new(output),
        }
    }
}

#[async_trait]
impl<R, W> Gateway for ConsoleGateway<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn next_message(&mut self) -> Result<Option<InboundMessage>, GatewayError> {
        let Some(line) = self.lines.get_mut().next_line().await? else {
            return Ok(None);
        };
        Ok(Some(InboundMessage {
            author_id: CONSOLE_USER.to_string(),
            channel: ChannelContext::new(CONSOLE_CHANNEL),
            content: line,
        }))
    }

    async fn deliver(&self, channel: &ChannelContext, text: &str) -> Result<(), GatewayError> {
        if channel.id != CONSOLE_CHANNEL {
            return Err(GatewayError::Delivery(format!("unknown channel {}", channel.id)));
        }
        let mut output = self.output.lock().await;
        output.write_all(text.as_bytes()).await?;
        output.write_all(b"\n\n").await?;
        output.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The message source closed.
    Closed,
    /// The handler reported an unrecoverable state.
    Poisoned,
}

/// Handle messages one at a time until the source closes or the handler
/// becomes unusable. Delivery failures are logged and skipped.
pub async fn run<G, H>(
    gateway: &mut G,
    dispatcher: &Dispatcher<H>,
) -> Result<RunOutcome, GatewayError>
where
    G: Gateway,
    H: ExchangeHandler,
{
    while let Some(message) = gateway.next_message().await? {
        if let Some(reply) = dispatcher.dispatch(&message).await {
            if let Err(err) = gateway.deliver(&message.channel, &reply).await {
                log::warn!("Failed to deliver reply to {}: {}", message.channel.id, err);
            }
        }
        if dispatcher.handler().is_poisoned().await {
            log::error!("Conversation memory is corrupted, shutting down");
            return Ok(RunOutcome::Poisoned);
        }
    }
    Ok(RunOutcome::Closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::DispatchSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::BufReader;

    struct CountingHandler {
        calls: AtomicUsize,
        poison_after: usize,
    }

    #[async_trait]
    impl ExchangeHandler for CountingHandler {
        async fn handle_user_message(&self, text: &str) -> String {
            self.calls.fetch_add(1, Ordering::SeqCst);
            text.to_uppercase()
        }

        async fn is_poisoned(&self) -> bool {
            self.calls.load(Ordering::SeqCst) >= self.poison_after
        }
    }

    fn dispatcher(poison_after: usize) -> Dispatcher<CountingHandler> {
        Dispatcher::new(
            CountingHandler {
                calls: AtomicUsize::new(0),
                poison_after,
            },
            DispatchSettings::default(),
        )
    }

    #[tokio::test]
    async fn console_round_trip_until_eof() {
        let input = BufReader::new(&b"!hello\nnot for the bot\n!again\n"[..]);
        let mut gateway = ConsoleGateway::new(input, Vec::new());

        let outcome = run(&mut gateway, &dispatcher(usize::MAX)).await.unwrap();

        assert_eq!(outcome, RunOutcome::Closed);
        let written = String::from_utf8(gateway.output.into_inner()).unwrap();
        assert_eq!(written, "HELLO\n\nAGAIN\n\n");
    }

    #[tokio::test]
    async fn stops_when_handler_is_poisoned() {
        let input = BufReader::new(&b"!one\n!two\n!three\n"[..]);
        let mut gateway = ConsoleGateway::new(input, Vec::new());
        let d = dispatcher(2);

        let outcome = run(&mut gateway, &d).await.unwrap();

        assert_eq!(outcome, RunOutcome::Poisoned);
        assert_eq!(d.handler().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn delivery_to_unknown_channel_fails() {
        let gateway = ConsoleGateway::new(BufReader::new(&b""[..]), Vec::new());
        let err = gateway
            .deliver(&ChannelContext::new("elsewhere"), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Delivery(_)));
    }
}
