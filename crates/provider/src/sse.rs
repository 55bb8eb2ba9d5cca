use std::collections::VecDeque;

use anyhow::Result;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Response;

use crate::decode::Utf8Decoder;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Line-based SSE framer. Both target protocols deliver one event per
/// `data:` line; a trailing line without its terminator is retained until
/// the terminator arrives in a later chunk.
#[derive(Debug, Default)]
pub struct SseFramer {
    buf: String,
}

impl SseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume decoded text, returning the data payloads of every line
    /// completed by this push.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buf.push_str(text);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            if let Some(payload) = parse_data_line(&line) {
                events.push(payload);
            }
        }
        events
    }

    /// Flush at end of stream: a final line may arrive without a terminator.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        parse_data_line(&line)
    }
}

fn parse_data_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    let payload = trimmed.strip_prefix(DATA_PREFIX)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }
    Some(payload.to_string())
}

/// Drive a streaming response body through the decoder and framer, yielding
/// one raw data payload per event.
pub fn sse_data_stream(response: Response) -> BoxStream<'static, Result<String>> {
    let byte_stream = response.bytes_stream();

    let stream = futures::stream::unfold(
        (
            byte_stream,
            Utf8Decoder::new(),
            SseFramer::new(),
            VecDeque::<String>::new(),
            false,
        ),
        |(mut bytes, mut decoder, mut framer, mut pending, mut ended)| async move {
            loop {
                if let Some(payload) = pending.pop_front() {
                    return Some((Ok(payload), (bytes, decoder, framer, pending, ended)));
                }
                if ended {
                    return None;
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => {
                        let text = decoder.push(&chunk);
                        pending.extend(framer.push(&text));
                    }
                    Some(Err(e)) => {
                        ended = true;
                        return Some((Err(e.into()), (bytes, decoder, framer, pending, ended)));
                    }
                    None => {
                        ended = true;
                        let tail = decoder.finish();
                        pending.extend(framer.push(&tail));
                        if let Some(last) = framer.finish() {
                            pending.push_back(last);
                        }
                    }
                }
            }
        },
    );

    Box::pin(stream)
}
