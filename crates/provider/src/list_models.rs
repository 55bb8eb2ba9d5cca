use anyhow::Result;
use serde_json::Value;

use crate::types::ModelInfo;
use crate::ProviderError;

/// Known Groq chat models, used when the listing endpoint is unreachable
/// (the call fails from browsers on CORS; a bad key fails it too, which the
/// fallback masks -- so the underlying error is logged before falling back).
const GROQ_FALLBACK: &[&str] = &[
    "llama-3.3-70b-versatile",
    "llama-3.1-70b-versatile",
    "llama-3.1-8b-instant",
    "mixtral-8x7b-32768",
    "gemma2-9b-it",
    "llama3-70b-8192",
    "llama3-8b-8192",
];

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

fn sort_by_display_name(mut models: Vec<ModelInfo>) -> Vec<ModelInfo> {
    models.sort_by(|a, b| a.display_name.cmp(&b.display_name));
    models
}

fn groq_chat_capable(id: &str) -> bool {
    !id.contains("whisper") && !id.contains("guard") && !id.contains("tts")
}

pub(crate) async fn fetch_groq(base_url: &str, api_key: &str) -> Vec<ModelInfo> {
    match fetch_openai_compat(base_url, api_key, groq_chat_capable).await {
        Ok(models) if !models.is_empty() => models,
        Ok(_) => fallback_groq_models(),
        Err(err) => {
            tracing::warn!(error = %err, "groq model listing failed, using fallback list");
            fallback_groq_models()
        }
    }
}

fn fallback_groq_models() -> Vec<ModelInfo> {
    GROQ_FALLBACK
        .iter()
        .map(|id| ModelInfo {
            id: id.to_string(),
            display_name: id.to_string(),
        })
        .collect()
}

pub(crate) async fn fetch_glm(base_url: &str, api_key: &str) -> Result<Vec<ModelInfo>> {
    fetch_openai_compat(base_url, api_key, |id| !id.contains("embedding")).await
}

/// GET /models in the OpenAI listing format (Groq, GLM).
async fn fetch_openai_compat(
    base_url: &str,
    api_key: &str,
    filter: fn(&str) -> bool,
) -> Result<Vec<ModelInfo>> {
    let url = format!("{}/models", base_url.trim_end_matches('/'));

    let resp = client()
        .get(&url)
        .header("Authorization", format!("Bearer {api_key}"))
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

    let data: Value = resp.json().await?;
    let models = data["data"].as_array().cloned().unwrap_or_default();

    Ok(sort_by_display_name(
        models
            .iter()
            .filter_map(|m| {
                let id = m["id"].as_str()?;
                if id.is_empty() || !filter(id) {
                    return None;
                }
                Some(ModelInfo {
                    id: id.to_string(),
                    display_name: id.to_string(),
                })
            })
            .collect(),
    ))
}

/// GET /v1beta/models, keeping only entries that can generateContent.
pub(crate) async fn fetch_gemini(base_url: &str, api_key: &str) -> Result<Vec<ModelInfo>> {
    let url = format!("{}/models?key={}", base_url.trim_end_matches('/'), api_key);

    let resp = client().get(&url).send().await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Http {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    let data: Value = resp.json().await?;
    let models = data["models"].as_array().cloned().unwrap_or_default();

    Ok(sort_by_display_name(
        models.iter().filter_map(gemini_model_info).collect(),
    ))
}

fn gemini_model_info(m: &Value) -> Option<ModelInfo> {
    let name = m["name"].as_str()?;
    let id = name.strip_prefix("models/").unwrap_or(name);

    let supports_generate = m["supportedGenerationMethods"]
        .as_array()?
        .iter()
        .any(|v| v.as_str() == Some("generateContent"));
    if !supports_generate {
        return None;
    }

    let display = m["displayName"].as_str().unwrap_or(id);
    Some(ModelInfo {
        id: id.to_string(),
        display_name: display.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gemini_filter_requires_generate_content() {
        let chat = json!({
            "name": "models/gemini-2.0-flash",
            "displayName": "Gemini 2.0 Flash",
            "supportedGenerationMethods": ["generateContent", "countTokens"],
        });
        let embed = json!({
            "name": "models/text-embedding-004",
            "displayName": "Text Embedding",
            "supportedGenerationMethods": ["embedContent"],
        });

        let info = gemini_model_info(&chat).unwrap();
        assert_eq!(info.id, "gemini-2.0-flash");
        assert_eq!(info.display_name, "Gemini 2.0 Flash");
        assert!(gemini_model_info(&embed).is_none());
    }

    #[test]
    fn gemini_id_strips_models_prefix() {
        let m = json!({
            "name": "models/gemini-pro",
            "supportedGenerationMethods": ["generateContent"],
        });
        let info = gemini_model_info(&m).unwrap();
        assert_eq!(info.id, "gemini-pro");
        assert_eq!(info.display_name, "gemini-pro");
    }

    #[test]
    fn sorted_ascending_by_display_name() {
        let models = vec![
            ModelInfo {
                id: "b".into(),
                display_name: "Beta".into(),
            },
            ModelInfo {
                id: "a".into(),
                display_name: "Alpha".into(),
            },
        ];
        let sorted = sort_by_display_name(models);
        assert_eq!(sorted[0].display_name, "Alpha");
        assert_eq!(sorted[1].display_name, "Beta");
    }

    #[test]
    fn groq_fallback_covers_known_chat_models() {
        let models = fallback_groq_models();
        assert!(models.iter().any(|m| m.id == "llama-3.3-70b-versatile"));
        assert_eq!(models.len(), GROQ_FALLBACK.len());
    }

    #[test]
    fn groq_filter_drops_non_chat_entries() {
        assert!(groq_chat_capable("llama-3.3-70b-versatile"));
        assert!(!groq_chat_capable("whisper-large-v3"));
        assert!(!groq_chat_capable("llama-guard-3-8b"));
    }
}
