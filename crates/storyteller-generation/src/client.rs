//! `OpenAiGenerationClient` — chat completions over HTTP.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use storyteller_core::error::GenerationError;
use storyteller_core::generation::{GenerationClient, SUGGESTION_RANGE};
use storyteller_core::message::Message;
use tracing::{debug, instrument, warn};

use crate::config::{ConfigError, GenerationConfig};
use crate::reply::parse_string_array;

/// Generation client backed by an OpenAI-compatible REST endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiGenerationClient {
    http: Client,
    config: GenerationConfig,
}

impl OpenAiGenerationClient {
    /// Creates a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::HttpClient` if the HTTP client cannot be built.
    pub fn new(config: GenerationConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Creates a client from process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(GenerationConfig::from_env()?)
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [Message],
        temperature: f32,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages,
            temperature,
            presence_penalty: self.config.presence_penalty,
            frequency_penalty: self.config.frequency_penalty,
        }
    }

    async fn complete(&self, body: &ChatCompletionRequest<'_>) -> Result<String, GenerationError> {
        if self.config.api_key.trim().is_empty() {
            return Err(GenerationError::CredentialMissing);
        }

        let response = self
            .http
            .post(self.config.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::NetworkFailure(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("unexpected response body: {e}"))
        })?;

        extract_text(parsed)
    }

    async fn complete_list(
        &self,
        mut messages: Vec<Message>,
        instruction: String,
        count: usize,
        minimum: usize,
    ) -> Result<Vec<String>, GenerationError> {
        messages.push(Message::user(instruction));
        let body = self.request_body(&messages, self.config.list_temperature);
        let text = self.complete(&body).await?;
        let options = clean_options(parse_string_array(&text)?, count, minimum)?;
        if options.len() != count {
            debug!(requested = count, received = options.len(), "option count differs");
        }
        Ok(options)
    }
}

#[async_trait]
impl GenerationClient for OpenAiGenerationClient {
    #[instrument(skip(self, facts), fields(model = %self.config.model))]
    async fn generate_genres(
        &self,
        facts: &[Message],
        count: usize,
    ) -> Result<Vec<String>, GenerationError> {
        let instruction = format!(
            "give me {count} options for interesting and innovative genres.\n\
             format your answer as a json array of strings: [\"option1\",\"option2\",...]"
        );
        self.complete_list(facts.to_vec(), instruction, count, count)
            .await
    }

    #[instrument(skip(self, context), fields(model = %self.config.model, messages = context.len()))]
    async fn generate_suggestions(
        &self,
        context: &[Message],
        count: usize,
    ) -> Result<Vec<String>, GenerationError> {
        let instruction = format!(
            "give me {count} options for what could happen next in the story.\n\
             each option should be 1 sentence\n\
             format your answer as a json array of strings: [\"text\",\"text\",...]"
        );
        let minimum = count.min(SUGGESTION_RANGE.0);
        self.complete_list(context.to_vec(), instruction, count, minimum)
            .await
    }

    #[instrument(skip(self, context), fields(model = %self.config.model, messages = context.len()))]
    async fn generate_paragraph(&self, context: &[Message]) -> Result<String, GenerationError> {
        let body = self.request_body(context, self.config.paragraph_temperature);
        let text = self.complete(&body).await?;
        if text.trim().is_empty() {
            return Err(GenerationError::MalformedResponse(
                "paragraph reply was empty".into(),
            ));
        }
        Ok(text)
    }
}

/// Trims each option, drops blanks, and keeps at most `count`. Fewer than
/// `minimum` usable options (and never zero) is a malformed reply.
fn clean_options(
    options: Vec<String>,
    count: usize,
    minimum: usize,
) -> Result<Vec<String>, GenerationError> {
    let required = minimum.max(1);
    let cleaned: Vec<String> = options
        .into_iter()
        .map(|o| o.trim().to_owned())
        .filter(|o| !o.is_empty())
        .take(count)
        .collect();
    if cleaned.len() < required {
        return Err(GenerationError::MalformedResponse(format!(
            "reply contained {} usable options, expected at least {required}",
            cleaned.len()
        )));
    }
    Ok(cleaned)
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_text(response: ChatCompletionResponse) -> Result<String, GenerationError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| GenerationError::MalformedResponse("response had no choices".into()))
}

fn map_http_error(status: StatusCode, body: &str) -> GenerationError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map_or_else(|_| body.to_owned(), |wrapper| wrapper.error.message);
    warn!(%status, %message, "generation service returned an error");
    GenerationError::NetworkFailure(format!("{status}: {message}"))
}
