use crate::bounds::fix_bounds;
use crate::config::Theme;
use crate::dom::Document;
use crate::engine::{DiagramEngine, EngineConfig, EngineResult};
use crate::hooks::install_measurement_hooks;
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Read, Write};

pub const MAX_CODE_CHARS: usize = 100_000;
pub const MAX_LINE_BYTES: usize = 16 * 1024 * 1024;
const MAX_ERROR_CHARS: usize = 500;

static BLOCK_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

/// One entry of a `result` message; exactly one of `svg`/`error` is set.
#[derive(Debug, Serialize)]
pub struct BlockResult {
    pub id: String,
    pub svg: Option<String>,
    pub error: Option<String>,
}

impl BlockResult {
    fn rendered(id: String, svg: String) -> Self {
        Self { id, svg: Some(svg), error: None }
    }

    fn failed(id: String, error: impl Into<String>) -> Self {
        Self { id, svg: None, error: Some(error.into()) }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    Ready,
    Pong,
    Result { results: Vec<BlockResult> },
    Error { message: String },
}

#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    Line(String),
    Oversized,
}

/// Reassembles newline-delimited lines from arbitrary byte chunks. Raw
/// bytes are buffered and each extracted line is decoded on its own, so a
/// UTF-8 sequence split across chunks comes back intact (the delimiter is
/// ASCII and can never land inside one).
///
/// A line growing past the limit flips the buffer into discard mode: the
/// oversized line is reported once and its remaining bytes are swallowed
/// up to the next newline.
#[derive(Debug)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    limit: usize,
    discarding: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::with_limit(MAX_LINE_BYTES)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit,
            discarding: false,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    pub fn next_line(&mut self) -> Option<LineEvent> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                if self.discarding {
                    // Tail of a line already reported as oversized.
                    self.discarding = false;
                    continue;
                }
                let text = String::from_utf8_lossy(&line[..line.len() - 1]).into_owned();
                return Some(LineEvent::Line(text));
            }
            if self.buffer.len() > self.limit && !self.discarding {
                self.buffer.clear();
                self.discarding = true;
                return Some(LineEvent::Oversized);
            }
            return None;
        }
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// The request/response loop. Owns the synthetic document and the active
/// theme. Processes one line at a time, one block at a time; rendering is
/// never parallelized across blocks or requests.
pub struct Service<E> {
    engine: E,
    document: Document,
    theme: Theme,
}

impl<E: DiagramEngine> Service<E> {
    pub fn new(mut engine: E, theme: Theme) -> EngineResult<Self> {
        let mut document = Document::new();
        install_measurement_hooks(&mut document);
        engine.initialize(&EngineConfig::for_theme(theme))?;
        Ok(Self { engine, document, theme })
    }

    /// Runs until the reader reaches end of stream. Emits `ready` before
    /// consuming any input; flushes after every response line. No input is
    /// fatal: only a transport error or stream end ends the loop.
    pub fn serve<R: Read, W: Write>(&mut self, mut reader: R, mut writer: W) -> io::Result<()> {
        emit(&mut writer, &Response::Ready)?;

        let mut lines = LineBuffer::new();
        let mut chunk = [0u8; 8192];
        loop {
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            lines.push(&chunk[..read]);
            while let Some(event) = lines.next_line() {
                match event {
                    LineEvent::Line(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        let response = self.dispatch(line);
                        emit(&mut writer, &response)?;
                    }
                    LineEvent::Oversized => {
                        warn!("dropping request line over {MAX_LINE_BYTES} bytes");
                        let response = Response::Error {
                            message: "Request line too long".to_string(),
                        };
                        emit(&mut writer, &response)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn dispatch(&mut self, line: &str) -> Response {
        let request: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => {
                return Response::Error {
                    message: format!("JSON parse error: {err}"),
                };
            }
        };

        match request.get("type").and_then(Value::as_str) {
            Some("ping") => Response::Pong,
            Some("render") => self.handle_render(&request),
            _ => Response::Error {
                message: format!("Unknown request type: {}", unknown_type_label(&request)),
            },
        }
    }

    fn handle_render(&mut self, request: &Value) -> Response {
        let theme = request
            .get("theme")
            .and_then(Value::as_str)
            .and_then(Theme::parse)
            .unwrap_or_default();
        if theme != self.theme {
            debug!("theme change {} -> {}", self.theme.as_str(), theme.as_str());
            self.theme = theme;
            if let Err(err) = self.engine.initialize(&EngineConfig::for_theme(theme)) {
                warn!("engine reinitialization failed: {err}");
            }
        }

        let blocks = request
            .get("blocks")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut results = Vec::with_capacity(blocks.len());
        for block in blocks {
            results.push(self.render_block(block));
        }
        Response::Result { results }
    }

    fn render_block(&mut self, block: &Value) -> BlockResult {
        let id = match block.get("id").and_then(Value::as_str) {
            Some(id) if BLOCK_ID_RE.is_match(id) => id.to_string(),
            _ => return BlockResult::failed(block_id_label(block), "Invalid block id"),
        };
        let code = match block.get("code") {
            Some(Value::String(code)) => code,
            _ => return BlockResult::failed(id, "Invalid block code type"),
        };
        if code.chars().count() > MAX_CODE_CHARS {
            return BlockResult::failed(id, "Code too long");
        }

        self.document.reset_body();
        match self.engine.render(&mut self.document, &id, code) {
            Ok(svg) => BlockResult::rendered(id, fix_bounds(&svg)),
            Err(err) => BlockResult::failed(id, truncate_error(&err.to_string())),
        }
    }
}

fn emit<W: Write>(writer: &mut W, response: &Response) -> io::Result<()> {
    let line = serde_json::to_string(response).map_err(io::Error::other)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()
}

fn unknown_type_label(request: &Value) -> String {
    match request.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => other.to_string(),
        None => "none".to_string(),
    }
}

fn block_id_label(block: &Value) -> String {
    match block.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Null) | None => "invalid".to_string(),
        Some(other) => other.to_string(),
    }
}

fn truncate_error(message: &str) -> String {
    message.chars().take(MAX_ERROR_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_buffer_reassembles_split_chunks() {
        let mut buffer = LineBuffer::new();
        buffer.push(b"{\"type\":");
        assert_eq!(buffer.next_line(), None);
        buffer.push(b"\"ping\"}\n{\"ty");
        assert_eq!(
            buffer.next_line(),
            Some(LineEvent::Line("{\"type\":\"ping\"}".to_string()))
        );
        assert_eq!(buffer.next_line(), None);
        buffer.push(b"pe\":\"x\"}\n");
        assert_eq!(
            buffer.next_line(),
            Some(LineEvent::Line("{\"type\":\"x\"}".to_string()))
        );
    }

    #[test]
    fn line_buffer_reassembles_utf8_split_mid_code_point() {
        let mut buffer = LineBuffer::new();
        let bytes = "héllo\n".as_bytes();
        // Split inside the two-byte é sequence.
        buffer.push(&bytes[..2]);
        assert_eq!(buffer.next_line(), None);
        buffer.push(&bytes[2..]);
        assert_eq!(buffer.next_line(), Some(LineEvent::Line("héllo".to_string())));
    }

    #[test]
    fn line_buffer_reports_oversized_lines_once() {
        let mut buffer = LineBuffer::with_limit(8);
        buffer.push(b"0123456789");
        assert_eq!(buffer.next_line(), Some(LineEvent::Oversized));
        assert_eq!(buffer.next_line(), None);
        // Rest of the long line is swallowed; the next line comes through.
        buffer.push(b"aaaa\nok\n");
        assert_eq!(buffer.next_line(), Some(LineEvent::Line("ok".to_string())));
        assert_eq!(buffer.next_line(), None);
    }

    #[test]
    fn truncate_error_respects_char_boundaries() {
        let long = "é".repeat(600);
        let truncated = truncate_error(&long);
        assert_eq!(truncated.chars().count(), 500);
    }

    #[test]
    fn unknown_type_label_echoes_non_string_types() {
        let request: Value = serde_json::json!({"type": 7});
        assert_eq!(unknown_type_label(&request), "7");
        let missing: Value = serde_json::json!({});
        assert_eq!(unknown_type_label(&missing), "none");
    }

    #[test]
    fn block_id_label_falls_back_to_invalid() {
        assert_eq!(block_id_label(&serde_json::json!({})), "invalid");
        assert_eq!(block_id_label(&serde_json::json!({"id": null})), "invalid");
        assert_eq!(block_id_label(&serde_json::json!({"id": ""})), "invalid");
        assert_eq!(block_id_label(&serde_json::json!({"id": 12})), "12");
        assert_eq!(block_id_label(&serde_json::json!({"id": "has space"})), "has space");
    }

    #[test]
    fn responses_serialize_with_lowercase_type_tags() {
        assert_eq!(
            serde_json::to_string(&Response::Pong).unwrap(),
            "{\"type\":\"pong\"}"
        );
        let result = Response::Result {
            results: vec![BlockResult::failed("a".to_string(), "Invalid block id")],
        };
        assert_eq!(
            serde_json::to_string(&result).unwrap(),
            "{\"type\":\"result\",\"results\":[{\"id\":\"a\",\"svg\":null,\"error\":\"Invalid block id\"}]}"
        );
    }
}
