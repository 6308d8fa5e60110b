//! Narrative itinerary generation through a chat-completion endpoint

use crate::catalog::{Activity, Lodging};
use crate::config::Config;
use crate::flights::FlightOffer;
use crate::TripError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument};

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4";

/// Token budget for every generation request
pub const NARRATIVE_MAX_TOKENS: u32 = 1000;

pub const TRAVEL_ASSISTANT_PROMPT: &str = "You are a helpful travel assistant.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Turns a role-tagged conversation into generated text
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String, TripError>;

    /// Model name for logging
    fn model_name(&self) -> &str;
}

/// Prompt asking for a day-by-day itinerary over the user's selections
pub fn build_itinerary_prompt(
    flights: &[FlightOffer],
    accommodations: &[Lodging],
    activities: &[Activity],
) -> String {
    let flights = flights
        .iter()
        .map(FlightOffer::route_label)
        .collect::<Vec<_>>()
        .join(", ");
    let accommodations = accommodations
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let activities = activities
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "The user has selected the following details for their trip:\n\
         - Flights: {}\n\
         - Accommodations: {}\n\
         - Activities: {}\n\
         \n\
         Create a detailed itinerary based on the provided details. The itinerary should be \
         structured day by day, including any relevant suggestions for travel, lodging, or activities.",
        flights, accommodations, activities
    )
}

/// Full message list sent at submission
pub fn itinerary_messages(
    flights: &[FlightOffer],
    accommodations: &[Lodging],
    activities: &[Activity],
) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(TRAVEL_ASSISTANT_PROMPT),
        ChatMessage::user(build_itinerary_prompt(flights, accommodations, activities)),
    ]
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

/// OpenAI chat-completions client
#[derive(Clone)]
pub struct OpenAiNarrator {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiNarrator {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            http_client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, TripError> {
        let api_key = config.openai_api_key()?;
        Ok(Self::new(api_key, &config.openai_base_url, &config.openai_model))
    }
}

#[async_trait]
impl NarrativeGenerator for OpenAiNarrator {
    #[instrument(level = "info", skip(self, messages), fields(model = %self.model, messages = messages.len()))]
    async fn generate(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<String, TripError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages,
            max_tokens,
        };

        let start_time = std::time::Instant::now();
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        info!(
            status = %status,
            duration_ms = start_time.elapsed().as_millis(),
            "Chat completion request completed"
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Chat completion request failed");
            return Err(TripError::NarrativeError(format!(
                "chat completion failed with status {}: {}",
                status, body
            )));
        }

        let completion: CompletionResponse = response.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TripError::NarrativeError("model returned no choices".to_string()))?;

        debug!(length = text.len(), "Received generated text");
        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
