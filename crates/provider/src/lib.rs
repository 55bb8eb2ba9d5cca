pub mod types;

pub mod gemini;
pub mod openai_compat;

mod decode;
mod error;
mod list_models;
mod sse;

pub use decode::Utf8Decoder;
pub use error::ProviderError;
pub use sse::SseFramer;
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use waymark_config::{Config, ProviderKind};

#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn default_model(&self) -> &str;

    async fn chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

pub fn create_provider(kind: ProviderKind, config: &Config) -> Result<Box<dyn Provider>> {
    let entry = config.provider.entry(kind);
    let api_key = config.api_key(kind).ok_or_else(|| ProviderError::MissingApiKey {
        provider: kind.to_string(),
    })?;

    let base_url = entry.base_url.clone();
    let model = entry.model.clone();

    Ok(match kind {
        ProviderKind::Groq => Box::new(openai_compat::OpenAiCompatProvider::groq(
            api_key, base_url, model,
        )),
        ProviderKind::Glm => Box::new(openai_compat::OpenAiCompatProvider::glm(
            api_key, base_url, model,
        )),
        ProviderKind::Gemini => Box::new(gemini::GeminiProvider::new(api_key, base_url, model)),
    })
}

// End-to-end checks over the byte pipeline: decoder, framer, and the two
// vendor adapters, driven the same way the live stream drives them.
#[cfg(test)]
mod pipeline_tests {
    use crate::decode::Utf8Decoder;
    use crate::sse::SseFramer;
    use crate::{gemini, openai_compat};

    type Adapter = fn(&serde_json::Value) -> Option<String>;

    /// Feed the raw bytes in the given chunking through the whole pipeline,
    /// returning the extracted deltas and the aggregated text.
    fn run_pipeline(bytes: &[u8], splits: &[usize], adapter: Adapter) -> (Vec<String>, String) {
        let mut decoder = Utf8Decoder::new();
        let mut framer = SseFramer::new();
        let mut deltas = Vec::new();
        let mut full = String::new();

        let mut consume = |payloads: Vec<String>,
                           deltas: &mut Vec<String>,
                           full: &mut String| {
            for payload in payloads {
                let Ok(data) = serde_json::from_str::<serde_json::Value>(&payload) else {
                    continue;
                };
                if let Some(delta) = adapter(&data) {
                    if !delta.is_empty() {
                        full.push_str(&delta);
                        deltas.push(delta);
                    }
                }
            }
        };

        let mut start = 0;
        for &split in splits {
            let text = decoder.push(&bytes[start..split]);
            consume(framer.push(&text), &mut deltas, &mut full);
            start = split;
        }
        let text = decoder.push(&bytes[start..]);
        consume(framer.push(&text), &mut deltas, &mut full);

        let tail = decoder.finish();
        consume(framer.push(&tail), &mut deltas, &mut full);
        if let Some(last) = framer.finish() {
            consume(vec![last], &mut deltas, &mut full);
        }

        (deltas, full)
    }

    const OPENAI_FIXTURE: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"H\u{e9}l\"}}]}\r\n",
        "\r\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo \u{1F30D}\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n",
        "data: [DONE]\n",
    );

    const GEMINI_FIXTURE: &str = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"\u{4f60}\u{597d}\"}]}}]}\r\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" world\"}]}}]}\r\n",
    );

    #[test]
    fn openai_scenario_extracts_deltas_in_order() {
        let bytes = "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
                     data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\
                     data: [DONE]\n"
            .as_bytes();
        let (deltas, full) = run_pipeline(bytes, &[], openai_compat::delta_from_event);
        assert_eq!(deltas, vec!["Hel", "lo"]);
        assert_eq!(full, "Hello");
    }

    #[test]
    fn gemini_scenario_extracts_delta() {
        let bytes =
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n".as_bytes();
        let (deltas, full) = run_pipeline(bytes, &[], gemini::delta_from_event);
        assert_eq!(deltas, vec!["Hi"]);
        assert_eq!(full, "Hi");
    }

    // Every way of splitting the fixture bytes into three chunks, including
    // splits inside multi-byte characters and inside \r\n, yields the same
    // deltas and the same aggregated text.
    #[test]
    fn openai_pipeline_invariant_under_all_double_splits() {
        let bytes = OPENAI_FIXTURE.as_bytes();
        let (expected_deltas, expected_full) =
            run_pipeline(bytes, &[], openai_compat::delta_from_event);
        assert_eq!(expected_full, "H\u{e9}llo \u{1F30D}");

        for i in 0..=bytes.len() {
            for j in i..=bytes.len() {
                let (deltas, full) = run_pipeline(bytes, &[i, j], openai_compat::delta_from_event);
                assert_eq!(deltas, expected_deltas, "split at {i}/{j}");
                assert_eq!(full, expected_full, "split at {i}/{j}");
            }
        }
    }

    #[test]
    fn gemini_pipeline_invariant_under_all_double_splits() {
        let bytes = GEMINI_FIXTURE.as_bytes();
        let (expected_deltas, expected_full) =
            run_pipeline(bytes, &[], gemini::delta_from_event);
        assert_eq!(expected_full, "\u{4f60}\u{597d} world");

        for i in 0..=bytes.len() {
            for j in i..=bytes.len() {
                let (deltas, full) = run_pipeline(bytes, &[i, j], gemini::delta_from_event);
                assert_eq!(deltas, expected_deltas, "split at {i}/{j}");
                assert_eq!(full, expected_full, "split at {i}/{j}");
            }
        }
    }

    // A malformed event in the middle of the stream is skipped without
    // losing the well-formed ones around it.
    #[test]
    fn malformed_events_are_skipped_not_fatal() {
        let bytes = "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\
                     data: {broken json\n\
                     data: \n\
                     data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n"
            .as_bytes();
        let (deltas, full) = run_pipeline(bytes, &[], openai_compat::delta_from_event);
        assert_eq!(deltas, vec!["a", "b"]);
        assert_eq!(full, "ab");
    }
}
