//! Bounded read-to-completion of a response body.

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::{RelayError, Result};

pub const DEFAULT_CEILING: usize = 1024 * 1024;
pub const DEFAULT_MARGIN: usize = 100;
/// Upper bound on the up-front allocation; larger bodies grow the buffer.
pub const INITIAL_CAPACITY: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLimits {
    /// Hard ceiling on buffer size.
    pub ceiling: usize,
    /// Bytes kept free below the ceiling; a body that needs them is rejected.
    pub margin: usize,
}

impl Default for ReadLimits {
    fn default() -> Self {
        Self {
            ceiling: DEFAULT_CEILING,
            margin: DEFAULT_MARGIN,
        }
    }
}

impl ReadLimits {
    pub fn new(ceiling: usize, margin: usize) -> Self {
        Self { ceiling, margin }
    }

    /// Largest body accepted.
    pub fn usable(&self) -> usize {
        self.ceiling.saturating_sub(self.margin)
    }
}

/// Drain `source` into a buffer, failing instead of truncating when the body
/// grows past [`ReadLimits::usable`].
///
/// `declared_len` (e.g. `Content-Length`) is only a hint: a zero or missing
/// value sizes the buffer by the ceiling, and a value above the usable limit
/// fails before anything is read. Either way the first allocation is capped at
/// [`INITIAL_CAPACITY`]. The returned vector holds exactly the bytes received.
pub async fn read_to_end<S>(
    mut source: S,
    declared_len: Option<u64>,
    limits: ReadLimits,
) -> Result<Vec<u8>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let usable = limits.usable();

    let capacity = match declared_len {
        Some(len) if len > usable as u64 => {
            log::warn!("Declared body length {len} exceeds limit of {usable} bytes");
            return Err(RelayError::ResponseTooLarge { limit: usable });
        }
        Some(len) if len > 0 => len as usize,
        _ => limits.ceiling,
    };

    let mut buf = Vec::with_capacity(capacity.min(INITIAL_CAPACITY));
    while let Some(chunk) = source.next().await {
        let chunk = chunk?;
        if buf.len() + chunk.len() > usable {
            log::warn!(
                "Response body exceeded limit of {usable} bytes after {} bytes",
                buf.len()
            );
            return Err(RelayError::ResponseTooLarge { limit: usable });
        }
        buf.extend_from_slice(&chunk);
    }

    log::debug!("Read {} response bytes", buf.len());
    Ok(buf)
}
