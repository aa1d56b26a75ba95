use crate::config::Config;
use crate::error::ConfigurationError;
use crate::logging;
use crate::message::Mode;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

const MALFORMED_RESPONSE: &str = "malformed response";

/// Normalized outcome of one backend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterResult {
    Answered(String),
    NoMatch,
    BackendError(String),
}

/// Issues exactly one request per call and never touches the message log.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `Err` only for configuration problems detected before any network attempt.
    async fn dispatch(&self, mode: Mode, text: &str) -> Result<RouterResult, ConfigurationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    mode: &'static str,
}

pub struct HttpRouter {
    client: Client,
    base_url: Option<String>,
}

impl HttpRouter {
    pub fn new(config: &Config) -> Self {
        let client = match Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
        {
            Ok(client) => client,
            Err(e) => {
                logging::log_error(
                    None,
                    &format!("HTTP client setup failed, using defaults: {}", e),
                );
                Client::new()
            }
        };

        Self {
            client,
            base_url: config.api_url.clone(),
        }
    }

    fn base_url(&self) -> Result<&str, ConfigurationError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or(ConfigurationError::MissingBaseUrl)?;
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigurationError::InvalidBaseUrl(base.to_string()));
        }
        Ok(base)
    }

    async fn search(&self, base: &str, text: &str) -> RouterResult {
        let request = self
            .client
            .get(format!("{}/search", base))
            .query(&[("q", text)]);
        match fetch_json(request).await {
            Ok(body) => parse_search_response(&body),
            Err(reason) => RouterResult::BackendError(reason),
        }
    }

    async fn chat(&self, base: &str, text: &str) -> RouterResult {
        let request = self
            .client
            .post(format!("{}/chat", base))
            .header("Content-Type", "application/json")
            .json(&ChatRequest {
                message: text,
                mode: "gpt",
            });
        match fetch_json(request).await {
            Ok(body) => parse_chat_response(&body),
            Err(reason) => RouterResult::BackendError(reason),
        }
    }
}

#[async_trait]
impl Backend for HttpRouter {
    async fn dispatch(&self, mode: Mode, text: &str) -> Result<RouterResult, ConfigurationError> {
        let base = self.base_url()?;
        logging::log_routing(None, &format!("Dispatching {} request", mode.as_str()));

        let result = match mode {
            Mode::FaqKeyword => self.search(base, text).await,
            Mode::Generative => self.chat(base, text).await,
        };

        match &result {
            RouterResult::Answered(_) => logging::log_routing(None, "Backend answered"),
            RouterResult::NoMatch => logging::log_routing(None, "No FAQ match"),
            RouterResult::BackendError(reason) => {
                logging::log_error(None, &format!("{} backend failed: {}", mode.as_str(), reason))
            }
        }
        Ok(result)
    }
}

async fn fetch_json(request: reqwest::RequestBuilder) -> Result<Value, String> {
    let response = request.send().await.map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(format!("backend error ({}): {}", status, error_text));
    }

    response.json::<Value>().await.map_err(|e| e.to_string())
}

/// First candidate wins; ranking is the search backend's job.
fn parse_search_response(body: &Value) -> RouterResult {
    let Some(first) = body.as_array().and_then(|hits| hits.first()) else {
        return RouterResult::NoMatch;
    };
    match first.get("answer").and_then(Value::as_str) {
        Some(answer) => RouterResult::Answered(answer.to_string()),
        None => RouterResult::BackendError(MALFORMED_RESPONSE.to_string()),
    }
}

fn parse_chat_response(body: &Value) -> RouterResult {
    match body.get("response").and_then(Value::as_str) {
        Some(reply) if !reply.is_empty() => RouterResult::Answered(reply.to_string()),
        _ => RouterResult::BackendError(MALFORMED_RESPONSE.to_string()),
    }
}
