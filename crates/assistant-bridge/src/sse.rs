use std::collections::VecDeque;
use std::pin::Pin;

use futures::StreamExt as _;
use futures::stream;

use crate::errors::BridgeError;
use crate::stream::names;

/// Response body as a stream of byte chunks.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, BridgeError>> + Send + 'static>>;

/// One SSE event block: the `event:` name (if any) and the joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Splits byte chunks into text lines.
///
/// Lines end at `\n` and a directly preceding `\r` is dropped. Blank lines are
/// kept. Bytes after the last terminator stay buffered until more input or
/// `finish`.
#[derive(Debug, Default)]
pub struct LineFramer {
    buf: Vec<u8>,
}

impl LineFramer {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=idx).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Returns the unterminated tail, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let mut rest = std::mem::take(&mut self.buf);
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        Some(String::from_utf8_lossy(&rest).into_owned())
    }
}

/// Adapts a byte stream into a stream of lines.
///
/// A source error is yielded once and ends the stream; buffered partial
/// text is discarded in that case.
pub fn lines(bytes: ByteStream) -> impl futures::Stream<Item = Result<String, BridgeError>> + Send {
    struct State {
        bytes: ByteStream,
        framer: LineFramer,
        pending: VecDeque<String>,
        done: bool,
    }

    stream::try_unfold(
        State {
            bytes,
            framer: LineFramer::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(line) = state.pending.pop_front() {
                    return Ok(Some((line, state)));
                }
                if state.done {
                    return Ok(None);
                }

                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.pending.extend(state.framer.push(&chunk));
                    }
                    Some(Err(err)) => return Err(err),
                    None => {
                        state.pending.extend(state.framer.finish());
                        state.done = true;
                    }
                }
            }
        },
    )
}

/// Accumulates `event:` and `data:` lines into `RawEvent`s, flushing on
/// blank lines.
#[derive(Debug, Default)]
pub struct EventAssembler {
    event: Option<String>,
    data: String,
    has_data: bool,
}

impl EventAssembler {
    /// Feeds one line; returns an event when the line closes a block.
    pub fn push_line(&mut self, line: &str) -> Option<RawEvent> {
        let line = line.trim();
        if line.is_empty() {
            return self.flush();
        }
        if let Some(rest) = line.strip_prefix("event:") {
            self.event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            let body = rest.strip_prefix(' ').unwrap_or(rest);
            if self.has_data {
                self.data.push('\n');
            }
            self.data.push_str(body);
            self.has_data = true;
        }
        None
    }

    fn flush(&mut self) -> Option<RawEvent> {
        let event = self.event.take().filter(|name| !name.is_empty());
        let data = std::mem::take(&mut self.data);
        self.has_data = false;
        if event.is_none() && data.is_empty() {
            return None;
        }
        if event.is_none() && data.trim() == names::DONE_SENTINEL {
            return Some(RawEvent {
                event: Some(names::DONE.to_string()),
                data,
            });
        }
        Some(RawEvent { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIRE: &str = "event: thread.run.created\r\ndata: {\"id\":\"run_1\"}\r\n\r\n: keep-alive\n\nevent: thread.message.delta\ndata: {\"a\":\ndata: 1}\n\ndata: [DONE]\n\n";

    fn frame_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut framer = LineFramer::default();
        let mut lines = Vec::new();
        for chunk in chunks {
            lines.extend(framer.push(chunk));
        }
        lines.extend(framer.finish());
        lines
    }

    fn assemble(lines: &[String]) -> Vec<RawEvent> {
        let mut assembler = EventAssembler::default();
        lines
            .iter()
            .filter_map(|line| assembler.push_line(line))
            .collect()
    }

    #[test]
    fn framer_is_chunking_invariant() {
        let bytes = WIRE.as_bytes();
        let whole = frame_all(&[bytes]);
        for size in 1..bytes.len() {
            let chunks: Vec<&[u8]> = bytes.chunks(size).collect();
            assert_eq!(frame_all(&chunks), whole, "chunk size {size}");
        }
        assert_eq!(whole[0], "event: thread.run.created");
        assert_eq!(whole[2], "");
    }

    #[test]
    fn framer_keeps_blank_lines_and_unterminated_tail() {
        assert_eq!(
            frame_all(&[b"a\n\n\r\nb"]),
            vec!["a".to_string(), String::new(), String::new(), "b".to_string()]
        );
        assert_eq!(frame_all(&[b"x\r\ny\r"]), vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn assembler_joins_data_and_synthesizes_done() {
        let events = assemble(&frame_all(&[WIRE.as_bytes()]));
        assert_eq!(
            events,
            vec![
                RawEvent {
                    event: Some("thread.run.created".into()),
                    data: "{\"id\":\"run_1\"}".into(),
                },
                RawEvent {
                    event: Some("thread.message.delta".into()),
                    data: "{\"a\":\n1}".into(),
                },
                RawEvent {
                    event: Some("done".into()),
                    data: "[DONE]".into(),
                },
            ]
        );
    }

    #[test]
    fn assembler_resets_after_every_flush() {
        let mut assembler = EventAssembler::default();
        assert_eq!(assembler.push_line("event: error"), None);
        assert!(assembler.push_line("").is_some());
        assert_eq!(assembler.push_line(""), None);
        assert_eq!(assembler.push_line("data: x"), None);
        assert_eq!(
            assembler.push_line(""),
            Some(RawEvent {
                event: None,
                data: "x".into()
            })
        );
    }

    #[tokio::test]
    async fn line_stream_stops_at_source_error_without_partial_line() {
        let chunks: Vec<Result<bytes::Bytes, BridgeError>> = vec![
            Ok(bytes::Bytes::from_static(b"one\ntw")),
            Err(BridgeError::Transport("reset".into())),
            Ok(bytes::Bytes::from_static(b"o\n")),
        ];
        let collected: Vec<Result<String, BridgeError>> =
            lines(Box::pin(stream::iter(chunks))).collect().await;
        assert_eq!(
            collected,
            vec![
                Ok("one".to_string()),
                Err(BridgeError::Transport("reset".into()))
            ]
        );
    }
}
