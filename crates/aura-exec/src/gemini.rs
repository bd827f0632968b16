use std::time::Duration;

use async_trait::async_trait;
use aura_core::config::ModelConfig;
use aura_core::decision::RawDecision;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::contracts::ClassifierError;
use crate::contracts::ContextSnapshot;
use crate::contracts::IntentClassifier;
use crate::prompt;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const MAX_ERROR_BODY: usize = 512;
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f32,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Classifies utterances with one structured-output `generateContent` call.
pub struct GeminiClassifier {
    api_key: Option<String>,
    checked_env: Vec<String>,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GeminiClassifier {
    /// Looks up the credential in the configured environment variables, in order.
    /// A missing credential is reported when the first turn runs, not here.
    pub fn from_config(config: &ModelConfig) -> Self {
        let api_key = config
            .api_key_env
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty());
        let mut classifier = Self::new(api_key, config.model());
        classifier.checked_env = config.api_key_env.clone();
        classifier
    }

    pub fn new(api_key: Option<String>, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            api_key,
            checked_env: Vec::new(),
            model: model.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            client,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_body(&self, utterance: &str, context: &ContextSnapshot) -> GenerateRequest {
        GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: prompt::system_instruction(),
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part {
                    text: prompt::user_turn(context, utterance, Utc::now()),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: prompt::response_schema(),
                temperature: 0.0,
            },
        }
    }
}

#[async_trait]
impl IntentClassifier for GeminiClassifier {
    async fn classify(
        &self,
        utterance: &str,
        context: &ContextSnapshot,
    ) -> Result<RawDecision, ClassifierError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ClassifierError::MissingCredential {
                checked: self.checked_env.join(", "),
            });
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.request_body(utterance, context);
        debug!(model = %self.model, "classifying utterance");

        let res = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let mut body = res.text().await.unwrap_or_default();
            body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
            return Err(ClassifierError::Status { status, body });
        }

        let parsed: GenerateResponse = res
            .json()
            .await
            .map_err(|err| ClassifierError::MalformedResponse(format!("response body: {err}")))?;
        let text = parsed.first_text().ok_or(ClassifierError::EmptyResponse)?;
        parse_decision_text(&text)
    }
}

fn transport_error(err: reqwest::Error) -> ClassifierError {
    if err.is_timeout() {
        ClassifierError::Timeout(CLIENT_TIMEOUT)
    } else {
        ClassifierError::Transport(err.to_string())
    }
}

fn floor_char_boundary(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    (0..=max).rev().find(|idx| text.is_char_boundary(*idx)).unwrap_or(0)
}

/// Parses the model's JSON text, tolerating a surrounding Markdown code fence.
pub fn parse_decision_text(text: &str) -> Result<RawDecision, ClassifierError> {
    let body = strip_code_fence(text);
    serde_json::from_str::<RawDecision>(body)
        .map_err(|err| ClassifierError::MalformedResponse(format!("{err}")))
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
