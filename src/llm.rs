//! Language-model collaborator: the OpenRouter chat-completions client, the
//! brain-dump categorization prompt and parsing of what comes back.
//!
//! The HTTP call sits behind [`ChatService`] so the session and its tests can
//! run against a canned service. One request per call: no retry, no timeout
//! beyond the transport's own.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::truncate;
use crate::error::{Error, Result};
use crate::fields::Quadrant;
use crate::task::Categorization;

pub const APP_TITLE: &str = "BrainSort";

const CATEGORIZE_SYSTEM_PROMPT: &str = "You are a task organization assistant. Analyze text and categorize tasks into quadrants. Always respond with valid JSON only.";
const CATEGORIZE_MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Everything needed for one completion call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl ChatRequest {
    /// A system + user exchange at the app's usual temperature.
    pub fn new(model: &str, system: impl Into<String>, user: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: TEMPERATURE,
            max_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A remote service that turns a chat request into reply text.
pub trait ChatService {
    fn complete(&self, request: &ChatRequest) -> Result<String>;
}

/// Blocking OpenRouter client.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    api_url: String,
    api_key: Option<String>,
    referer: String,
}

impl OpenRouterClient {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, referer: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key,
            referer: referer.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.api_url, config.api_key.clone(), &config.http_referer)
    }
}

impl ChatService for OpenRouterClient {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) else {
            return Err(Error::RemoteService(
                "no API key configured; run `bsort config --api-key <KEY>` or set OPENROUTER_API_KEY".into(),
            ));
        };

        info!("POST {} (model {})", self.api_url, request.model);
        let response = ureq::post(&self.api_url)
            .set("Authorization", &format!("Bearer {}", key))
            .set("Content-Type", "application/json")
            .set("HTTP-Referer", &self.referer)
            .set("X-Title", APP_TITLE)
            .send_json(request);

        let response = match response {
            Ok(response) => response,
            Err(ureq::Error::Status(code, response)) => {
                let body = response.into_string().unwrap_or_default();
                return Err(Error::RemoteService(format!(
                    "API request failed with HTTP {}: {}",
                    code,
                    truncate(body.trim(), 200)
                )));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(Error::RemoteService(transport.to_string()));
            }
        };

        let parsed: ChatResponse = response
            .into_json()
            .map_err(|e| Error::RemoteService(format!("unreadable API response: {}", e)))?;
        reply_text(parsed)
    }
}

fn reply_text(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| Error::RemoteService("API response had no message content".into()))
}

/// The user prompt sent for a brain dump.
pub fn categorize_prompt(brain_dump: &str) -> String {
    let quadrants = [
        (Quadrant::Triggers, "2-5 minute tasks that unblock next steps"),
        (Quadrant::Marinate, "Ideas/thoughts to capture so they're not taking up mental bandwidth"),
        (Quadrant::Deepwork, "Tasks requiring 1+ hours of focused time"),
        (Quadrant::Quickwins, "10-30 minute tasks for momentum"),
    ];
    let listing = quadrants
        .iter()
        .enumerate()
        .map(|(i, (q, desc))| format!("{}. {} (key: \"{}\"): {}", i + 1, q.display_name(), q.key(), desc))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Analyze this brain dump and organize the tasks into four quadrants:

{listing}

Brain dump:
{brain_dump}

Extract ALL tasks and ideas mentioned. Be specific and action-oriented. Include everything, even if it seems minor.

Return ONLY this JSON format:
{{
    "triggers": ["task1", "task2"],
    "marinate": ["idea1", "idea2"],
    "deepwork": ["task1", "task2"],
    "quickwins": ["task1", "task2"]
}}"#
    )
}

/// Pull the categorization out of a model reply.
///
/// Models like to wrap JSON in prose or code fences, so the span from the first
/// `{` to the last `}` is parsed. Missing quadrant keys default to empty.
pub fn parse_categorization(content: &str) -> Result<Categorization> {
    let start = content.find('{');
    let end = content.rfind('}');
    let (Some(start), Some(end)) = (start, end) else {
        return Err(Error::RemoteService("reply contained no JSON object".into()));
    };
    if end < start {
        return Err(Error::RemoteService("reply contained no JSON object".into()));
    }
    serde_json::from_str(&content[start..=end])
        .map_err(|e| Error::RemoteService(format!("reply was not valid categorization JSON: {}", e)))
}

/// Ask the service to sort a brain dump into quadrants.
pub fn categorize(service: &dyn ChatService, model: &str, brain_dump: &str) -> Result<Categorization> {
    let request = ChatRequest::new(
        model,
        CATEGORIZE_SYSTEM_PROMPT,
        categorize_prompt(brain_dump),
        CATEGORIZE_MAX_TOKENS,
    );
    let reply = service.complete(&request)?;
    debug!("categorization reply: {} chars", reply.len());
    parse_categorization(&reply)
}

#[cfg(test)]
pub mod testing {
    use std::cell::RefCell;

    use super::*;

    /// Canned service that records what it was asked.
    pub struct CannedService {
        pub reply: std::result::Result<String, String>,
        pub requests: RefCell<Vec<ChatRequest>>,
    }

    impl CannedService {
        pub fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), requests: RefCell::new(Vec::new()) }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                requests: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatService for CannedService {
        fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.requests.borrow_mut().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(Error::RemoteService(message.clone())),
            }
        }
    }
}
