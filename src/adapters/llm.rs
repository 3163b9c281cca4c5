use crate::config::CopilotConfig;
use crate::domain::ports::LlmClient;
use crate::utils::error::{CopilotError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub const ANTHROPIC_FALLBACK_MODELS: [&str; 4] = [
    "claude-3-5-sonnet-20241022",
    "claude-3-5-sonnet-20240620",
    "claude-3-opus-20240229",
    "claude-3-sonnet-20240229",
];

pub const OPENAI_FALLBACK_MODELS: [&str; 3] = ["gpt-4-turbo-preview", "gpt-4-1106-preview", "gpt-4"];

/// 單一模型嘗試的結果
#[derive(Debug)]
enum Attempt {
    Answer(String),
    TryNext(String),
    Stop(String),
}

/// 404 與其他錯誤換下一個模型；認證失敗或被限流就停止
fn classify_status(status: StatusCode, body: &str) -> Attempt {
    let message = format!("HTTP {}: {}", status.as_u16(), body.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            Attempt::Stop(message)
        }
        _ => Attempt::TryNext(message),
    }
}

/// 設定的模型排第一，其餘為備援，去除重複
fn model_chain(preferred: Option<&str>, fallbacks: &[&str]) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    for model in preferred.into_iter().chain(fallbacks.iter().copied()) {
        if !model.is_empty() && !models.iter().any(|m| m == model) {
            models.push(model.to_string());
        }
    }
    models
}

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: 3000,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &CopilotConfig) -> Self {
        Self {
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            timeout: Duration::from_secs(config.llm.timeout_seconds),
        }
    }
}

pub struct AnthropicClient {
    client: Client,
    base_url: String,
    api_key: String,
    models: Vec<String>,
    settings: GenerationSettings,
}

impl AnthropicClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models: model_chain(None, &ANTHROPIC_FALLBACK_MODELS),
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_preferred_model(mut self, model: &str) -> Self {
        self.models = model_chain(Some(model), &ANTHROPIC_FALLBACK_MODELS);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    async fn attempt(&self, model: &str, prompt: &str) -> Attempt {
        let body = json!({
            "model": model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .timeout(self.settings.timeout)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return Attempt::TryNext(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return classify_status(status, &text);
        }

        match response.json::<Value>().await {
            Ok(value) => {
                let text = value["content"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|block| block["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
                    .trim()
                    .to_string();
                if text.is_empty() {
                    Attempt::TryNext("empty response".to_string())
                } else {
                    Attempt::Answer(text)
                }
            }
            Err(e) => Attempt::TryNext(e.to_string()),
        }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = "no models configured".to_string();

        for model in &self.models {
            tracing::debug!("🔄 Trying model {}", model);
            match self.attempt(model, prompt).await {
                Attempt::Answer(text) => {
                    tracing::info!("✅ Answer generated with {} ({} chars)", model, text.len());
                    return Ok(text);
                }
                Attempt::TryNext(message) => {
                    tracing::warn!("⚠️  {} failed, trying next: {}", model, message);
                    last_error = message;
                }
                Attempt::Stop(message) => {
                    tracing::error!("❌ {} rejected the request: {}", model, message);
                    last_error = message;
                    break;
                }
            }
        }

        Err(CopilotError::LlmError {
            provider: self.provider().to_string(),
            message: last_error,
        })
    }
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    models: Vec<String>,
    settings: GenerationSettings,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models: model_chain(None, &OPENAI_FALLBACK_MODELS),
            settings: GenerationSettings::default(),
        }
    }

    pub fn with_preferred_model(mut self, model: &str) -> Self {
        self.models = model_chain(Some(model), &OPENAI_FALLBACK_MODELS);
        self
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    async fn attempt(&self, model: &str, prompt: &str) -> Attempt {
        let body = json!({
            "model": model,
            "max_tokens": self.settings.max_tokens,
            "temperature": self.settings.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(self.settings.timeout)
            .json(&body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return Attempt::TryNext(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return classify_status(status, &text);
        }

        match response.json::<Value>().await {
            Ok(value) => {
                let text = value["choices"][0]["message"]["content"]
                    .as_str()
                    .unwrap_or_default()
                    .trim()
                    .to_string();
                if text.is_empty() {
                    Attempt::TryNext("empty response".to_string())
                } else {
                    Attempt::Answer(text)
                }
            }
            Err(e) => Attempt::TryNext(e.to_string()),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn provider(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = "no models configured".to_string();

        for model in &self.models {
            tracing::debug!("🔄 Trying model {}", model);
            match self.attempt(model, prompt).await {
                Attempt::Answer(text) => {
                    tracing::info!("✅ Answer generated with {}", model);
                    return Ok(text);
                }
                Attempt::TryNext(message) => {
                    tracing::warn!("⚠️  {} failed, trying next: {}", model, message);
                    last_error = message;
                }
                Attempt::Stop(message) => {
                    tracing::error!("❌ {} rejected the request: {}", model, message);
                    last_error = message;
                    break;
                }
            }
        }

        Err(CopilotError::LlmError {
            provider: self.provider().to_string(),
            message: last_error,
        })
    }
}

/// 依序嘗試多個 provider，回傳第一個成功的答案
pub struct FallbackLlm {
    clients: Vec<Box<dyn LlmClient>>,
}

impl FallbackLlm {
    pub fn new(clients: Vec<Box<dyn LlmClient>>) -> Self {
        Self { clients }
    }

    pub fn providers(&self) -> Vec<&str> {
        self.clients.iter().map(|c| c.provider()).collect()
    }
}

#[async_trait]
impl LlmClient for FallbackLlm {
    fn provider(&self) -> &str {
        self.clients.first().map(|c| c.provider()).unwrap_or("none")
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let mut last_error = None;
        for client in &self.clients {
            match client.complete(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!("⚠️  {} unavailable: {}", client.provider(), e);
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| CopilotError::LlmError {
            provider: "none".to_string(),
            message: "no language model configured".to_string(),
        }))
    }
}

/// 設定的 provider 優先，另一家有金鑰時作為備援；`local` 或沒有金鑰時回傳 None
pub fn build_llm(config: &CopilotConfig) -> Option<Box<dyn LlmClient>> {
    let llm = &config.llm;
    if llm.provider == "local" {
        tracing::info!("LLM provider is local; answers use extracted text only");
        return None;
    }

    let settings = GenerationSettings::from_config(config);
    let anthropic = (!llm.anthropic_api_key.is_empty()).then(|| {
        let preferred = (llm.provider == "anthropic").then_some(llm.model.as_str());
        Box::new(
            AnthropicClient::new(&llm.anthropic_base_url, &llm.anthropic_api_key)
                .with_models(model_chain(preferred, &ANTHROPIC_FALLBACK_MODELS))
                .with_settings(settings.clone()),
        ) as Box<dyn LlmClient>
    });
    let openai = (!llm.openai_api_key.is_empty()).then(|| {
        let preferred = (llm.provider == "openai").then_some(llm.model.as_str());
        Box::new(
            OpenAiClient::new(&llm.openai_base_url, &llm.openai_api_key)
                .with_models(model_chain(preferred, &OPENAI_FALLBACK_MODELS))
                .with_settings(settings.clone()),
        ) as Box<dyn LlmClient>
    });

    let mut clients: Vec<Box<dyn LlmClient>> = if llm.provider == "openai" {
        openai.into_iter().chain(anthropic).collect()
    } else {
        anthropic.into_iter().chain(openai).collect()
    };

    match clients.len() {
        0 => {
            tracing::warn!(
                "⚠️  No API key set for provider '{}'; answers use extracted text only",
                llm.provider
            );
            None
        }
        1 => clients.pop(),
        _ => Some(Box::new(FallbackLlm::new(clients))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn test_model_chain_puts_preferred_first_without_duplicates() {
        let chain = model_chain(Some("claude-3-opus-20240229"), &ANTHROPIC_FALLBACK_MODELS);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0], "claude-3-opus-20240229");

        let chain = model_chain(Some("my-model"), &OPENAI_FALLBACK_MODELS);
        assert_eq!(chain.len(), 4);
        assert_eq!(chain[0], "my-model");
    }

    #[tokio::test]
    async fn test_anthropic_skips_missing_model() {
        let server = MockServer::start();

        let missing = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "sk-test")
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json_body_partial(r#"{"model": "retired-model"}"#);
            then.status(404).body(r#"{"type":"error","error":{"type":"not_found_error"}}"#);
        });
        let ok = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .json_body_partial(r#"{"model": "current-model"}"#);
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "content": [{"type": "text", "text": "  HIC must not exceed 1000.  "}]
                }));
        });

        let client = AnthropicClient::new(server.base_url(), "sk-test")
            .with_models(vec!["retired-model".to_string(), "current-model".to_string()]);

        let answer = client.complete("What is the HIC limit?").await.unwrap();

        missing.assert();
        ok.assert();
        assert_eq!(answer, "HIC must not exceed 1000.");
    }

    #[tokio::test]
    async fn test_anthropic_stops_on_auth_failure() {
        let server = MockServer::start();

        let unauthorized = server.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(401).body("invalid x-api-key");
        });

        let client = AnthropicClient::new(server.base_url(), "bad-key")
            .with_models(vec!["model-a".to_string(), "model-b".to_string()]);

        let err = client.complete("hello").await.unwrap_err();

        unauthorized.assert_hits(1);
        assert!(matches!(err, CopilotError::LlmError { ref provider, .. } if provider == "anthropic"));
    }

    #[tokio::test]
    async fn test_openai_reads_chat_completion() {
        let server = MockServer::start();

        let completion = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-openai");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({
                    "choices": [{"message": {"role": "assistant", "content": "ASIL D is the strictest level."}}]
                }));
        });

        let client = OpenAiClient::new(server.base_url(), "sk-openai").with_preferred_model("gpt-4o");

        let answer = client.complete("What is ASIL D?").await.unwrap();

        completion.assert_hits(1);
        assert_eq!(answer, "ASIL D is the strictest level.");
    }

    #[tokio::test]
    async fn test_fallback_moves_to_second_provider() {
        let failing = MockServer::start();
        let working = MockServer::start();

        failing.mock(|when, then| {
            when.method(POST).path("/v1/messages");
            then.status(500);
        });
        working.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(json!({"choices": [{"message": {"content": "fallback answer"}}]}));
        });

        let llm = FallbackLlm::new(vec![
            Box::new(AnthropicClient::new(failing.base_url(), "k").with_models(vec!["m".to_string()])),
            Box::new(OpenAiClient::new(working.base_url(), "k").with_models(vec!["m".to_string()])),
        ]);

        assert_eq!(llm.providers(), vec!["anthropic", "openai"]);
        assert_eq!(llm.complete("q").await.unwrap(), "fallback answer");
    }

    #[test]
    fn test_build_llm_requires_key_and_non_local_provider() {
        let mut config = CopilotConfig::default();
        assert!(build_llm(&config).is_none());

        config.llm.anthropic_api_key = "sk-ant".to_string();
        let llm = build_llm(&config).unwrap();
        assert_eq!(llm.provider(), "anthropic");

        config.llm.openai_api_key = "sk-openai".to_string();
        config.llm.provider = "openai".to_string();
        let llm = build_llm(&config).unwrap();
        assert_eq!(llm.provider(), "openai");

        config.llm.provider = "local".to_string();
        assert!(build_llm(&config).is_none());
    }
}
