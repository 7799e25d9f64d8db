//! Conversation memory and response assembly for the chat relay.
//!
//! A user message goes through [`ExchangeOrchestrator`], which rate-limits
//! it, records it in the [`ConversationStore`], sends the history upstream,
//! reads the body with a hard size ceiling, decodes the content blocks and
//! records the reply.

pub mod config;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod orchestrator;
pub mod rate_limit;
pub mod reader;
pub mod request;
pub mod transport;

pub use config::{ConfigError, RelayConfig};
pub use conversation::{ConversationStore, Role, Turn};
pub use decoder::{decode_response, ContentBlock, DecodedResponse};
pub use error::{DecodeError, RelayError, Result};
pub use orchestrator::{ExchangeOrchestrator, SharedOrchestrator};
pub use rate_limit::RateLimiter;
pub use reader::{read_to_end, ReadLimits};
pub use request::{build_request, MessagesRequest};
pub use transport::{HttpTransport, Transport, TransportResponse};
