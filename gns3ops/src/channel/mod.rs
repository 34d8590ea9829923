//! Line channel over a transport.
//!
//! Adds the output buffer, line terminators, and deadline-bounded reads
//! on top of a raw [`Transport`].

mod buffer;
mod patterns;

pub use buffer::PatternBuffer;
pub use patterns::{ConfirmRule, compile_prompt_pattern, last_line};

use std::time::Duration;

use log::trace;
use regex::bytes::Regex;
use tokio::time::Instant;

use crate::error::{ChannelError, Result};
use crate::transport::Transport;

/// What one [`Channel::fill`] call produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// New output was appended to the buffer.
    Data,

    /// The deadline passed before any output arrived.
    Deadline,

    /// The peer closed the connection.
    Closed,
}

/// Buffered line channel to one device.
pub struct Channel<T> {
    transport: T,
    buffer: PatternBuffer,
    line_ending: &'static str,
}

impl<T: Transport> Channel<T> {
    /// Wrap a transport, using its profile's line terminator.
    pub fn new(transport: T) -> Self {
        let line_ending = transport.profile().line_ending();
        Self {
            transport,
            buffer: PatternBuffer::default(),
            line_ending,
        }
    }

    /// Override how far back prompt searches look.
    pub fn with_search_depth(mut self, depth: usize) -> Self {
        self.buffer = PatternBuffer::new(depth);
        self
    }

    /// Send one line plus the line terminator.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        trace!("send: {:?}", line);
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.line_ending.as_bytes());
        self.transport.write_all(&data).await
    }

    /// Send a secret line. Never traced.
    pub async fn send_hidden(&mut self, line: &str) -> Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(self.line_ending.as_bytes());
        self.transport.write_all(&data).await
    }

    /// Read one chunk of output into the buffer, or give up at `deadline`.
    pub async fn fill(&mut self, deadline: Instant) -> Result<Fill> {
        match tokio::time::timeout_at(deadline, self.transport.read_chunk()).await {
            Err(_) => Ok(Fill::Deadline),
            Ok(Ok(Some(chunk))) => {
                trace!("recv: {:?}", String::from_utf8_lossy(&chunk));
                self.buffer.extend(&chunk);
                Ok(Fill::Data)
            }
            Ok(Ok(None)) => Ok(Fill::Closed),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Read until `pattern` matches the buffer tail.
    ///
    /// Returns the buffer contents and leaves the buffer empty.
    pub async fn read_until(&mut self, pattern: &Regex, timeout: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.buffer.tail_contains(pattern) {
                return Ok(self.buffer.take());
            }
            match self.fill(deadline).await? {
                Fill::Data => continue,
                Fill::Deadline => return Err(ChannelError::PromptTimeout(timeout).into()),
                Fill::Closed => return Err(ChannelError::Closed.into()),
            }
        }
    }

    pub fn buffer(&self) -> &PatternBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut PatternBuffer {
        &mut self.buffer
    }

    pub fn line_ending(&self) -> &'static str {
        self.line_ending
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::TransportProfile;
    use crate::transport::scripted::ScriptedTransport;

    #[tokio::test]
    async fn test_send_line_uses_profile_terminator() {
        let transport = ScriptedTransport::new(TransportProfile::Console);
        let sent = transport.sent();
        let mut channel = Channel::new(transport);
        assert_eq!(channel.line_ending(), "\r\n");
        channel.send_line("show clock").await.unwrap();
        assert_eq!(sent.lock().unwrap().as_slice(), ["show clock"]);

        let channel = Channel::new(ScriptedTransport::new(TransportProfile::Ssh));
        assert_eq!(channel.line_ending(), "\n");
    }

    #[tokio::test]
    async fn test_read_until_collects_split_chunks() {
        let transport = ScriptedTransport::new(TransportProfile::Console)
            .banner("\r\nR1")
            .banner("#");
        let mut channel = Channel::new(transport);
        let prompt = compile_prompt_pattern(r"R1#").unwrap();

        let out = channel
            .read_until(&prompt, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(out, b"\nR1#");
        assert!(channel.buffer().is_empty());
    }

    #[tokio::test]
    async fn test_read_until_deadline() {
        let mut channel = Channel::new(ScriptedTransport::new(TransportProfile::Console));
        let prompt = compile_prompt_pattern(r"R1#").unwrap();

        let err = channel
            .read_until(&prompt, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::PromptTimeout(_))));
    }

    #[tokio::test]
    async fn test_read_until_closed() {
        let transport = ScriptedTransport::new(TransportProfile::Console)
            .banner("partial")
            .hang_up();
        let mut channel = Channel::new(transport);
        let prompt = compile_prompt_pattern(r"R1#").unwrap();

        let err = channel
            .read_until(&prompt, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::Closed)));
        assert_eq!(channel.buffer().as_slice(), b"partial");
    }
}
