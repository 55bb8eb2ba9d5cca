use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::json;

use crate::sse::sse_data_stream;
use crate::types::*;
use crate::{list_models, Provider, ProviderError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    /// Gemini has no system role in the turn list; the instruction moves to
    /// the top-level systemInstruction field and assistant turns become
    /// role "model".
    fn build_body(&self, request: &ChatRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|msg| {
                let role = match msg.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": msg.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature.unwrap_or(0.7),
            },
        });

        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }

        body
    }
}

/// Extract the incremental text from one parsed generateContent event.
pub(crate) fn delta_from_event(data: &serde_json::Value) -> Option<String> {
    data["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(String::from)
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let model = if request.model.is_empty() {
            &self.default_model
        } else {
            &request.model
        };

        let body = self.build_body(request);
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.base_url, model, self.api_key
        );
        tracing::debug!(provider = "gemini", model, "dispatching chat request");

        let resp = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Http {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let sse_stream = sse_data_stream(resp);

        let event_stream = sse_stream.filter_map(|result| async move {
            match result {
                Ok(payload) => {
                    let data: serde_json::Value = serde_json::from_str(&payload).ok()?;
                    if let Some(delta) = delta_from_event(&data) {
                        return Some(Ok(StreamEvent::TextDelta(delta)));
                    }
                    if data["candidates"][0]["finishReason"].is_string() {
                        return Some(Ok(StreamEvent::Done));
                    }
                    None
                }
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(event_stream))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        list_models::fetch_gemini(&self.base_url, &self.api_key).await
    }
}
