use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde_json::json;

use crate::sse::sse_data_stream;
use crate::types::*;
use crate::{list_models, Provider, ProviderError};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

const GLM_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";
const GLM_DEFAULT_MODEL: &str = "glm-4-flash";

/// Client for vendors speaking the OpenAI chat-completions wire format.
/// Groq and GLM differ only in endpoint, default model, and model listing.
pub struct OpenAiCompatProvider {
    id: &'static str,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl OpenAiCompatProvider {
    pub fn groq(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self::new("groq", GROQ_BASE_URL, GROQ_DEFAULT_MODEL, api_key, base_url, model)
    }

    pub fn glm(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self::new("glm", GLM_BASE_URL, GLM_DEFAULT_MODEL, api_key, base_url, model)
    }

    fn new(
        id: &'static str,
        default_base: &str,
        default_model: &str,
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
    ) -> Self {
        Self {
            id,
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| default_base.to_string()),
            api_key,
            default_model: model.unwrap_or_else(|| default_model.to_string()),
        }
    }

    /// The wire turn list: system instruction first, then the conversation.
    fn build_messages(&self, request: &ChatRequest) -> Vec<serde_json::Value> {
        let mut msgs = Vec::with_capacity(request.messages.len() + 1);

        if let Some(system) = &request.system {
            msgs.push(json!({
                "role": "system",
                "content": system,
            }));
        }

        for msg in &request.messages {
            msgs.push(json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            }));
        }

        msgs
    }
}

/// Extract the incremental text from one parsed chat-completions event.
pub(crate) fn delta_from_event(data: &serde_json::Value) -> Option<String> {
    data["choices"][0]["delta"]["content"]
        .as_str()
        .map(String::from)
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.id
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

        let body = json!({
            "model": model,
            "messages": self.build_messages(request),
            "stream": true,
        });

        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(provider = self.id, model, "dispatching chat request");

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        // A single unparsable event is skipped, never fatal to the stream.
        let event_stream = sse_stream.filter_map(|result| async move {
            match result {
                Ok(payload) => {
                    let data: serde_json::Value = serde_json::from_str(&payload).ok()?;
                    if let Some(delta) = delta_from_event(&data) {
                        return Some(Ok(StreamEvent::TextDelta(delta)));
                    }
                    if data["choices"][0]["finish_reason"].is_string() {
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
        match self.id {
            "groq" => Ok(list_models::fetch_groq(&self.base_url, &self.api_key).await),
            _ => list_models::fetch_glm(&self.base_url, &self.api_key).await,
        }
    }
}
