use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{error, info};

use crate::models::{EditedImage, GeneratedHook, HookRequest, ImageEditRequest};
use crate::prompt::{build_hook_prompt, hook_response_schema, SYSTEM_INSTRUCTION};

const HOOK_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL: &str = "gemini-2.5-flash-image";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("no image produced")]
    NoImage,
}

/// Remote generative capability. Route handlers hold it as `Arc<dyn Generative>`
/// so tests can substitute a fake without touching the adapter contract.
///
/// Both operations are fire-once and fail-fast: no retries, the caller
/// resubmits the whole request on failure.
#[async_trait]
pub trait Generative: Send + Sync {
    async fn generate_hooks(&self, req: &HookRequest) -> Result<Vec<GeneratedHook>, GeminiError>;
    async fn edit_image(&self, req: ImageEditRequest) -> Result<EditedImage, GeminiError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100
                            && s.chars().all(|c| c.is_alphanumeric() || c == '+' || c == '/' || c == '=')
                        {
                            *val = serde_json::Value::String(format!(
                                "{}...[truncated {} chars]",
                                &s[..50],
                                s.len() - 50
                            ));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn loggable(body: &serde_json::Value) -> String {
    let mut copy = body.clone();
    truncate_base64_in_json(&mut copy);
    serde_json::to_string(&copy).unwrap_or_default()
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Result<Self, GeminiError> {
        let base_url =
            std::env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self::with_base_url(api_key, base_url, timeout_secs)
    }

    pub fn with_base_url(
        api_key: String,
        base_url: String,
        timeout_secs: u64,
    ) -> Result<Self, GeminiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| GeminiError::Http(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, api_key, base_url })
    }

    async fn perform_api_call(
        &self,
        model: &str,
        request_body: serde_json::Value,
    ) -> Result<GenerateContentResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, self.api_key);

        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));
        info!("📤 Request body: {}", loggable(&request_body));

        let response = self
            .client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!("❌ API error response: {}", error_body);
            return Err(GeminiError::Http(format!("status={} body={}", status, error_body)));
        }

        let response_text =
            response.text().await.map_err(|e| GeminiError::Http(e.to_string()))?;

        // An empty reply body carries no candidates; not a parse failure.
        if response_text.trim().is_empty() || response_text.trim() == "null" {
            return Ok(GenerateContentResponse::default());
        }

        // Truncate base64 image data for cleaner logging
        if let Ok(mut value) = serde_json::from_str::<serde_json::Value>(&response_text) {
            truncate_base64_in_json(&mut value);
            info!("📥 Raw Gemini API response: {}", value);
        }

        serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Schema(format!("parse error: {}", e)))
    }
}

#[async_trait]
impl Generative for GeminiClient {
    async fn generate_hooks(&self, req: &HookRequest) -> Result<Vec<GeneratedHook>, GeminiError> {
        let prompt = build_hook_prompt(req);
        info!(
            "🎯 Generating hooks for topic '{}' on {} (thunder: {})",
            req.topic.trim(),
            req.platform.as_str(),
            req.thunder_mode
        );

        let request_body = json!({
            "contents": [{
                "parts": [{"text": prompt}]
            }],
            "systemInstruction": {
                "parts": [{"text": SYSTEM_INSTRUCTION}]
            },
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": hook_response_schema()
            }
        });

        let parsed = self.perform_api_call(HOOK_MODEL, request_body).await?;
        let hooks = parse_hooks_reply(first_text_part(&parsed).unwrap_or_default())?;
        info!("✅ Parsed {} hooks from API response", hooks.len());
        Ok(hooks)
    }

    async fn edit_image(&self, req: ImageEditRequest) -> Result<EditedImage, GeminiError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&req.data);
        info!(
            "🖼️ Editing {} image ({} bytes) with instruction: {}",
            req.mime_type,
            req.data.len(),
            req.instruction
        );

        let request_body = json!({
            "contents": [{
                "parts": [
                    {
                        "inlineData": {
                            "mimeType": req.mime_type,
                            "data": encoded
                        }
                    },
                    {
                        "text": format!(
                            "Edit this image based on the following instruction: {}. Return the edited image.",
                            req.instruction
                        )
                    }
                ]
            }]
        });

        let parsed = self.perform_api_call(IMAGE_MODEL, request_body).await?;
        let Some(inline) = first_inline_part(&parsed) else {
            info!("⚠️ No inline image data found in response structure");
            return Err(GeminiError::NoImage);
        };

        info!("🎯 Found image data with mime type: {}", inline.mime_type);
        let data = base64::engine::general_purpose::STANDARD
            .decode(&inline.data)
            .map_err(|e| GeminiError::Schema(format!("invalid inline image payload: {}", e)))?;
        Ok(EditedImage { mime_type: inline.mime_type.clone(), data })
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
    #[serde(rename = "mimeType")]
    mime_type: String,
}

fn first_text_part(resp: &GenerateContentResponse) -> Option<&str> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Text { text } = p {
                return Some(text);
            }
        }
    }
    None
}

fn first_inline_part(resp: &GenerateContentResponse) -> Option<&InlineData> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            if let Part::Inline { inline_data } = p {
                return Some(inline_data);
            }
        }
    }
    None
}

/// An absent or `null` reply body is an empty result, not a failure.
/// Anything else must parse as the requested hook array.
fn parse_hooks_reply(text: &str) -> Result<Vec<GeneratedHook>, GeminiError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed)
        .map_err(|e| GeminiError::Schema(format!("reply did not match hook schema: {}", e)))
}
