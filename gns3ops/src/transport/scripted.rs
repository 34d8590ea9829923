//! Transcript-replaying transport for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::Transport;
use super::config::TransportProfile;
use crate::error::{Result, TransportError};

struct Reply {
    line: String,
    chunks: Vec<Vec<u8>>,
}

/// Replays canned device output in response to the lines written to it.
///
/// Each `on(line, ..)` rule fires once, in registration order, the first
/// time that exact line is written. Reads stay pending once the queue is
/// drained, like a quiet device, unless `hang_up` was called.
pub(crate) struct ScriptedTransport {
    profile: TransportProfile,
    pending: VecDeque<Vec<u8>>,
    replies: Vec<Reply>,
    partial: String,
    sent: Arc<Mutex<Vec<String>>>,
    hang_up: bool,
}

impl ScriptedTransport {
    pub fn new(profile: TransportProfile) -> Self {
        Self {
            profile,
            pending: VecDeque::new(),
            replies: Vec::new(),
            partial: String::new(),
            sent: Arc::new(Mutex::new(Vec::new())),
            hang_up: false,
        }
    }

    /// Output available before anything is written.
    pub fn banner(mut self, data: &str) -> Self {
        self.pending.push_back(data.as_bytes().to_vec());
        self
    }

    /// Output sent back once `line` is written.
    pub fn on(mut self, line: &str, chunks: &[&str]) -> Self {
        self.replies.push(Reply {
            line: line.to_string(),
            chunks: chunks.iter().map(|c| c.as_bytes().to_vec()).collect(),
        });
        self
    }

    /// Report EOF instead of blocking once output runs out.
    pub fn hang_up(mut self) -> Self {
        self.hang_up = true;
        self
    }

    /// Handle to the lines written so far, terminators stripped.
    pub fn sent(&self) -> Arc<Mutex<Vec<String>>> {
        self.sent.clone()
    }

    fn line_complete(&mut self, line: String) {
        if let Some(pos) = self.replies.iter().position(|r| r.line == line) {
            let reply = self.replies.remove(pos);
            self.pending.extend(reply.chunks);
        }
        self.sent.lock().unwrap().push(line);
    }
}

impl Transport for ScriptedTransport {
    fn profile(&self) -> TransportProfile {
        self.profile
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.partial.push_str(&String::from_utf8_lossy(data));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            self.line_complete(line.trim_end_matches(['\r', '\n']).to_string());
        }
        Ok(())
    }

    async fn read_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(Some(chunk));
        }
        if self.hang_up {
            return Ok(None);
        }
        std::future::pending::<()>().await;
        Err(TransportError::Disconnected.into())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
