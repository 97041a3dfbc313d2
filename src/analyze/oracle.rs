//! Judgment oracle: provider abstraction + daily call budget.
//!
//! The oracle is a plain text-completion capability. Nothing here trusts the
//! text it returns; see `judgment::parse_judgment` for validation.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OracleConfig;
use crate::error::OracleError;

pub type OracleFuture<'a> = Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>>;

/// One completion request: persona + per-item prompt + generation options.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub trait JudgmentOracle: Send + Sync {
    /// Return the raw completion text for `request`.
    fn complete<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a>;
    /// Provider name for logs.
    fn provider_name(&self) -> &'static str;
}

pub type DynOracle = Arc<dyn JudgmentOracle>;

/// Factory: build an oracle according to config and environment.
///
/// * `ORACLE_TEST_MODE=mock` returns a [`FixedOracle`] with a canned judgment.
/// * `provider = "disabled"` (or unknown) returns [`DisabledOracle`].
/// * Otherwise the real provider, wrapped in a [`BudgetedOracle`] when a
///   daily limit is configured.
pub fn build_oracle(config: &OracleConfig) -> anyhow::Result<DynOracle> {
    if std::env::var("ORACLE_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        return Ok(Arc::new(FixedOracle::new(FixedOracle::CANNED)));
    }

    let timeout = Duration::from_secs(config.request_timeout_secs);
    match config.provider.to_ascii_lowercase().as_str() {
        "ollama" => {
            let inner = OllamaOracle::new(&config.ollama_base_url(), &config.model, timeout)?;
            Ok(with_budget(inner, config.daily_limit))
        }
        "openai" => {
            let key = config.resolve_api_key()?;
            let inner = OpenAiOracle::new(&config.base_url, &config.model, key, timeout)?;
            Ok(with_budget(inner, config.daily_limit))
        }
        "disabled" => Ok(Arc::new(DisabledOracle)),
        other => {
            tracing::warn!(target: "scoring", provider = other, "unknown oracle provider, scoring disabled");
            Ok(Arc::new(DisabledOracle))
        }
    }
}

fn with_budget<O: JudgmentOracle + 'static>(inner: O, daily_limit: Option<u32>) -> DynOracle {
    match daily_limit {
        Some(limit) => Arc::new(BudgetedOracle::new(inner, limit)),
        None => Arc::new(inner),
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, OracleError> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("trend-scanner/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(timeout)
        .build()?)
}

// ------------------------------------------------------------
// Ollama
// ------------------------------------------------------------

/// Local Ollama server (`POST /api/chat`, non-streaming).
pub struct OllamaOracle {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaOracle {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, OracleError> {
        Ok(Self {
            http: http_client(timeout)?,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[derive(Serialize)]
struct ChatMsg<'a> {
    role: &'a str,
    content: &'a str,
}

fn chat_messages(request: &OracleRequest) -> Vec<ChatMsg<'_>> {
    vec![
        ChatMsg {
            role: "system",
            content: &request.system,
        },
        ChatMsg {
            role: "user",
            content: &request.user,
        },
    ]
}

impl JudgmentOracle for OllamaOracle {
    fn complete<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Options {
                temperature: f32,
                num_predict: u32,
            }
            #[derive(Serialize)]
            struct Req<'r> {
                model: &'r str,
                messages: Vec<ChatMsg<'r>>,
                stream: bool,
                options: Options,
            }
            #[derive(Deserialize)]
            struct Resp {
                message: RespMsg,
            }
            #[derive(Deserialize)]
            struct RespMsg {
                content: String,
            }

            let req = Req {
                model: &self.model,
                messages: chat_messages(request),
                stream: false,
                options: Options {
                    temperature: request.temperature,
                    num_predict: request.max_tokens,
                },
            };
            let resp = self.http.post(&self.endpoint).json(&req).send().await?;
            if !resp.status().is_success() {
                return Err(OracleError::Status(resp.status().as_u16()));
            }
            let body: Resp = resp.json().await?;
            non_empty(body.message.content)
        })
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

// ------------------------------------------------------------
// OpenAI-compatible chat completions
// ------------------------------------------------------------

pub struct OpenAiOracle {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiOracle {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        Ok(Self {
            http: http_client(timeout)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: model.to_string(),
        })
    }
}

impl JudgmentOracle for OpenAiOracle {
    fn complete<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Req<'r> {
                model: &'r str,
                messages: Vec<ChatMsg<'r>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: Option<String>,
            }

            let req = Req {
                model: &self.model,
                messages: chat_messages(request),
                temperature: request.temperature,
                max_tokens: request.max_tokens,
            };
            let resp = self
                .http
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&req)
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(OracleError::Status(resp.status().as_u16()));
            }
            let body: Resp = resp.json().await?;
            let content = body
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .unwrap_or_default();
            non_empty(content)
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

fn non_empty(content: String) -> Result<String, OracleError> {
    if content.trim().is_empty() {
        Err(OracleError::EmptyResponse)
    } else {
        Ok(content)
    }
}

// ------------------------------------------------------------
// Disabled + fixed
// ------------------------------------------------------------

/// Always fails with [`OracleError::Disabled`]; used when scoring is off.
pub struct DisabledOracle;

impl JudgmentOracle for DisabledOracle {
    fn complete<'a>(&'a self, _request: &'a OracleRequest) -> OracleFuture<'a> {
        Box::pin(async { Err(OracleError::Disabled) })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Returns the same text for every request. Local runs and tests.
#[derive(Clone)]
pub struct FixedOracle {
    pub text: String,
}

impl FixedOracle {
    pub const CANNED: &'static str = r#"```json
{"topic":"Mock trend","summary":"Deterministic response from the mock oracle.","niche_relevance":5,"monetization_score":5,"urgency_score":5,"competition_score":5,"hebrew_gap":5,"suggested_format":"short_video","suggested_angle":"n/a","affiliate_opportunities":"none","content_language":"he"}
```"#;

    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl JudgmentOracle for FixedOracle {
    fn complete<'a>(&'a self, _request: &'a OracleRequest) -> OracleFuture<'a> {
        let out = self.text.clone();
        Box::pin(async move { Ok(out) })
    }
    fn provider_name(&self) -> &'static str {
        "fixed"
    }
}

// ------------------------------------------------------------
// Daily budget wrapper
// ------------------------------------------------------------

/// Caps the number of calls forwarded to `inner` per UTC day.
/// Failed calls count too: they cost the provider the same.
pub struct BudgetedOracle<O: JudgmentOracle> {
    inner: O,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

#[derive(Debug, Clone)]
struct DailyCounter {
    day: NaiveDate,
    count: u32,
}

impl DailyCounter {
    fn today() -> Self {
        Self {
            day: Utc::now().date_naive(),
            count: 0,
        }
    }
}

impl<O: JudgmentOracle> BudgetedOracle<O> {
    pub fn new(inner: O, daily_limit: u32) -> Self {
        Self {
            inner,
            daily_limit,
            counter: Mutex::new(DailyCounter::today()),
        }
    }

    /// Reserve one call for today; `false` once the budget is spent.
    fn try_reserve(&self) -> bool {
        let Ok(mut g) = self.counter.lock() else {
            return false;
        };
        let today = Utc::now().date_naive();
        if g.day != today {
            *g = DailyCounter::today();
        }
        if g.count >= self.daily_limit {
            return false;
        }
        g.count = g.count.saturating_add(1);
        true
    }

    pub fn used_today(&self) -> u32 {
        self.counter.lock().map(|g| g.count).unwrap_or(0)
    }
}

impl<O: JudgmentOracle> JudgmentOracle for BudgetedOracle<O> {
    fn complete<'a>(&'a self, request: &'a OracleRequest) -> OracleFuture<'a> {
        Box::pin(async move {
            if !self.try_reserve() {
                return Err(OracleError::BudgetExhausted(self.daily_limit));
            }
            self.inner.complete(request).await
        })
    }
    fn provider_name(&self) -> &'static str {
        self.inner.provider_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> OracleRequest {
        OracleRequest {
            system: "sys".into(),
            user: "user".into(),
            temperature: 0.3,
            max_tokens: 10,
        }
    }

    #[tokio::test]
    async fn disabled_oracle_errors() {
        let err = DisabledOracle.complete(&req()).await.unwrap_err();
        assert!(matches!(err, OracleError::Disabled));
    }

    #[tokio::test]
    async fn budget_blocks_after_limit() {
        let o = BudgetedOracle::new(FixedOracle::new("{}"), 2);
        let r = req();
        assert!(o.complete(&r).await.is_ok());
        assert!(o.complete(&r).await.is_ok());
        let err = o.complete(&r).await.unwrap_err();
        assert!(matches!(err, OracleError::BudgetExhausted(2)));
        assert_eq!(o.used_today(), 2);
        assert_eq!(o.provider_name(), "fixed");
    }

    #[test]
    fn empty_content_is_an_error() {
        assert!(matches!(
            non_empty("  \n".into()),
            Err(OracleError::EmptyResponse)
        ));
    }
}
