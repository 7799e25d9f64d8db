use thiserror::Error;

/// Every way a single exchange can fail.
///
/// The `Display` text of each variant is shown to chat users verbatim, so it
/// is written as a short diagnostic sentence rather than an opaque code.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(
        "I'm overloaded.  Please wait {seconds_remaining} more second(s) \
         before sending another command."
    )]
    RateLimited { seconds_remaining: u64 },

    #[error("Error sending request: {0}")]
    TransportSend(String),

    #[error("Error: the AI backend did not answer within {0} seconds.")]
    TransportTimeout(u64),

    #[error("API returned error: HTTP {status}")]
    UpstreamHttp { status: u16 },

    #[error("Error reading response: {0}")]
    TransportRead(String),

    #[error("Error: response exceeded the {limit} byte limit.")]
    ResponseTooLarge { limit: usize },

    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] DecodeError),

    #[error("Internal error: conversation memory is corrupted ({0}).")]
    ConversationCorrupted(String),
}

impl RelayError {
    /// Whether the orchestrator must stop serving after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::ConversationCorrupted(_))
    }
}

/// Reasons a response body could not be decoded into a reply.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("top-level value is not an object")]
    NotAnObject,

    #[error("missing `content` array")]
    MissingContent,

    #[error("`content` array is empty")]
    EmptyContent,

    #[error("content block {index} is not an object")]
    BlockNotObject { index: usize },

    #[error("`{block_type}` block {index} has no string `{field}` field")]
    MissingField {
        index: usize,
        block_type: &'static str,
        field: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, RelayError>;
