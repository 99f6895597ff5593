// src/ai/gemini.rs
//! Gemini `generateContent` REST client. Bounded timeouts, bounded retries
//! with exponential backoff; every reply carries the reported token usage.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{GenRequest, ModelClient, ModelReply, TokenUsage};
use crate::error::DigestError;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    max_retries: u8,
}

impl GeminiClient {
    pub fn new(api_key: String, connect_timeout: Duration, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("ai-digest-agent/0.1")
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_key,
            max_retries: 3,
        }
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn call_once(&self, req: &GenRequest<'_>) -> Result<ModelReply, DigestError> {
        let url = format!("{API_BASE}/models/{}:generateContent", req.model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: req.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: req.temperature,
            },
        };

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DigestError::Model(format!("gemini request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let snippet = resp.text().await.unwrap_or_default();
            return Err(DigestError::Model(format!(
                "gemini http {status}: {}",
                snippet.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| DigestError::Model(format!("gemini response body: {e}")))?;

        let text: String = parsed
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.is_empty() {
            // Safety blocks and truncations come back as candidate-less
            // bodies; treat them like any other failed call.
            return Err(DigestError::Model("gemini returned no candidates".into()));
        }

        let usage = parsed
            .usage_metadata
            .map(|u| TokenUsage {
                prompt: u.prompt_token_count,
                completion: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(ModelReply { text, usage })
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, req: GenRequest<'_>) -> Result<ModelReply, DigestError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.call_once(&req).await {
                Ok(reply) => return Ok(reply),
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(error = %e, model = req.model, attempt, "model call failed; retrying");
                    tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn provider_name(&self) -> &'static str {
        "gemini"
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Deserialize)]
struct RespPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_token_count: u64,
    #[serde(rename = "candidatesTokenCount", default)]
    candidates_token_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_deserializes() {
        let body = r#"{
            "candidates": [{"content": {"parts": [{"text": "hello "}, {"text": "world"}]}}],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3, "totalTokenCount": 15}
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .parts
            .iter()
            .map(|p| p.text.as_str())
            .collect();
        assert_eq!(text, "hello world");
        let u = parsed.usage_metadata.unwrap();
        assert_eq!(u.prompt_token_count, 12);
        assert_eq!(u.candidates_token_count, 3);
    }

    #[test]
    fn candidate_less_body_parses_to_empty() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(parsed.candidates.is_empty());
        assert!(parsed.usage_metadata.is_none());
    }
}
