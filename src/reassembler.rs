//! Upstream SSE → MCP SSE reassembly.
//!
//! The upstream sends `data: <chunk>` lines carrying chat-completion deltas
//! and a final `data: [DONE]`. Chunk boundaries are arbitrary: a line, or a
//! UTF-8 sequence, may be split across reads. [`Reassembler`] buffers raw
//! bytes until a full line is available, accumulates the answer, and yields
//! [`Frame`]s: one `notifications/progress` per non-empty delta, then exactly
//! one terminal frame (final result or error).
//!
//! [`reassemble`] drives a [`Reassembler`] over a live byte stream. It pulls
//! the next upstream chunk only when the consumer asks for the next frame,
//! and dropping the returned stream drops the upstream body.

use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::protocol::{
    JsonRpcError, JsonRpcNotification, JsonRpcResponse, ProgressParams, ProgressToken, RpcId,
    ToolResult,
};
use crate::upstream::{ByteStream, StreamChunk};

/// Upstream end-of-stream marker.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Characters of accumulated answer per unit of reported progress.
pub const PROGRESS_DIVISOR: usize = 5;

const PROGRESS_MESSAGE: &str = "Accumulating response";

/// One outbound SSE event.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Frame {
    Progress(JsonRpcNotification<ProgressParams>),
    Terminal(JsonRpcResponse),
}

impl Frame {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// Reassembly state for one streaming tool call.
#[derive(Debug)]
pub struct Reassembler {
    id: Option<RpcId>,
    progress_token: Option<ProgressToken>,
    line_buffer: Vec<u8>,
    answer: String,
    answer_chars: usize,
    progress_events: usize,
    finished: bool,
}

impl Reassembler {
    pub fn new(id: Option<RpcId>, progress_token: Option<ProgressToken>) -> Self {
        Self {
            id,
            progress_token,
            line_buffer: Vec::new(),
            answer: String::new(),
            answer_chars: 0,
            progress_events: 0,
            finished: false,
        }
    }

    /// Answer accumulated so far.
    pub fn answer(&self) -> &str {
        &self.answer
    }

    /// Whether the terminal frame has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one upstream chunk; returns the frames for every line it
    /// completes, in order.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        let mut scan_from = self.line_buffer.len();
        self.line_buffer.extend_from_slice(chunk);

        while let Some(offset) = self.line_buffer[scan_from..].iter().position(|b| *b == b'\n') {
            let end = scan_from + offset;
            let line: Vec<u8> = self.line_buffer.drain(..=end).collect();
            scan_from = 0;

            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(frame) = self.on_line(&text) {
                frames.push(frame);
            }
            if self.finished {
                self.line_buffer.clear();
                break;
            }
        }

        frames
    }

    /// Process one complete line (without its `\n`).
    pub fn on_line(&mut self, line: &str) -> Option<Frame> {
        if self.finished {
            return None;
        }

        let line = line.strip_suffix('\r').unwrap_or(line);
        let payload = line.strip_prefix("data:")?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        if payload == DONE_SENTINEL {
            return Some(self.finish());
        }

        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!(error = %e, "skipping unparsable upstream line");
                return None;
            }
        };

        let content = chunk.delta_content().filter(|c| !c.is_empty())?;
        self.answer.push_str(content);
        self.answer_chars += content.chars().count();
        self.progress_events += 1;

        Some(Frame::Progress(JsonRpcNotification::progress(ProgressParams {
            progress_token: self.progress_token.clone(),
            progress: (self.answer_chars / PROGRESS_DIVISOR) as u64,
            message: PROGRESS_MESSAGE.into(),
        })))
    }

    /// Upstream exhausted. Flushes any unterminated last line, then emits the
    /// final result if the sentinel never arrived.
    pub fn on_done(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        if self.finished {
            return frames;
        }

        let residual = std::mem::take(&mut self.line_buffer);
        let residual = String::from_utf8_lossy(&residual);
        for line in residual.split('\n').filter(|l| !l.trim().is_empty()) {
            if let Some(frame) = self.on_line(line) {
                frames.push(frame);
            }
        }

        if !self.finished {
            debug!("upstream ended without [DONE]");
            frames.push(self.finish());
        }
        frames
    }

    /// Upstream read failed. Returns the error frame unless a terminal frame
    /// was already produced.
    pub fn on_error(&mut self, error: &str) -> Option<Frame> {
        if self.finished {
            return None;
        }
        self.finished = true;
        self.line_buffer.clear();
        Some(Frame::Terminal(JsonRpcResponse::error(
            self.id.clone(),
            JsonRpcError::internal_error(format!("Error during streaming: {error}")),
        )))
    }

    fn finish(&mut self) -> Frame {
        self.finished = true;
        self.line_buffer.clear();
        Frame::Terminal(JsonRpcResponse::tool_result(
            self.id.clone(),
            ToolResult::text(self.answer.clone()),
        ))
    }
}

/// Drive `state` over an upstream body, yielding outbound frames.
pub fn reassemble(upstream: ByteStream, state: Reassembler) -> BoxStream<'static, Frame> {
    async_stream::stream! {
        let mut upstream = upstream;
        let mut state = state;

        while let Some(next) = upstream.next().await {
            match next {
                Ok(chunk) => {
                    for frame in state.on_chunk(&chunk) {
                        yield frame;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "upstream stream failed");
                    if let Some(frame) = state.on_error(&e.to_string()) {
                        yield frame;
                    }
                }
            }
            if state.is_finished() {
                break;
            }
        }
        drop(upstream);

        for frame in state.on_done() {
            yield frame;
        }

        info!(
            answer_chars = state.answer_chars,
            progress_events = state.progress_events,
            "stream reassembly finished"
        );
    }
    .boxed()
}
