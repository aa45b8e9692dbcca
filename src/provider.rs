//! External model calls with candidate rotation and retry.
//!
//! Issues chat-completion requests against an OpenRouter-compatible
//! API, walking an ordered candidate-model list. Transient failures
//! (transport errors, 429/5xx) are retried within a candidate with
//! exponential backoff plus jitter; malformed responses and other
//! non-200s advance to the next candidate without retry. The single
//! failure mode surfaced to callers is exhaustion of every candidate.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::enhance::{EnhanceResult, Tone, truncate_chars};
use crate::error::ServiceError;
use crate::mode::Mode;

const SYSTEM_PROMPT: &str = "You are an expert prompt engineer. Transform the user's raw \
     input into a complete, structured, high-signal prompt for a large language model. \
     Preserve intent; add role, task, context, constraints, tone, output format, and \
     quality checks when helpful. Return STRICT JSON as \
     {\"enhanced\": string, \"improvements\": string[]}.";

/// Attempts per candidate: one initial call plus two retries.
const MAX_ATTEMPTS_PER_CANDIDATE: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_JITTER_MS: u64 = 250;
const ERROR_SNIPPET_CHARS: usize = 200;

/// Hint phrases sent to the external model. These intentionally differ
/// from the deterministic templates: they steer the remote model rather
/// than appearing in output directly.
fn mode_hint(mode: Mode) -> &'static str {
    match mode {
        Mode::Technical => "Focus on steps, examples, edge cases, and code-ready outputs.",
        Mode::Creative => "Focus on voice, hooks, story structure, and audience fit.",
        Mode::Health => {
            "Focus on evidence-aware advice, safety, contraindications, and mechanisms of action."
        }
        Mode::Analytical => "Focus on analysis structure, assumptions, risks, decision criteria.",
        Mode::Auto => "Focus on clarity and structure.",
    }
}

fn tone_hint(tone: &Tone) -> &'static str {
    match tone {
        Tone::Concise => "Short, direct sentences. Remove filler.",
        Tone::Formal => "Professional, precise language.",
        Tone::Friendly => "Warm and approachable, but clear.",
        Tone::Persuasive => "Benefit-first framing; conclude with a CTA.",
        Tone::Neutral => "Informative and balanced.",
        Tone::Other(_) => "Keep it neutral and clear.",
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// The JSON object the remote model is instructed to return.
#[derive(Debug, Deserialize)]
struct Enhancement {
    #[serde(default)]
    enhanced: String,
    #[serde(default)]
    improvements: Vec<String>,
}

/// Per-attempt outcome, deciding between retrying the same candidate
/// and advancing to the next one.
enum Attempt {
    Success(Enhancement),
    /// Transport error or retryable HTTP status.
    Retry(String),
    /// Malformed response or non-retryable status: the candidate is a
    /// lost cause, move on without burning the retry budget.
    Advance(String),
}

#[derive(Debug)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    api_key: Option<String>,
    completions_url: String,
    models: Vec<String>,
}

impl OpenRouterClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            completions_url: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            models: config.models.clone(),
        })
    }

    /// Enhance `raw` via the first candidate model that yields a valid
    /// response.
    ///
    /// Fails with [`ServiceError::Config`] when no credential is set
    /// (checked before any network attempt) and with
    /// [`ServiceError::Provider`] when every candidate is exhausted.
    pub async fn enhance(
        &self,
        raw: &str,
        mode: Mode,
        tone: &Tone,
    ) -> Result<EnhanceResult, ServiceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ServiceError::Config("OPENROUTER_API_KEY is not set".to_string()))?;

        let mode = mode.resolve(raw);
        let user_prompt = build_user_prompt(raw, mode, tone);

        let mut last_error = "no candidate models configured".to_string();
        for model in &self.models {
            match self.try_candidate(api_key, model, &user_prompt).await {
                Ok(enhancement) => {
                    tracing::debug!(model = %model, "candidate produced a valid enhancement");
                    return Ok(EnhanceResult {
                        enhanced: enhancement.enhanced,
                        improvements: enhancement.improvements,
                        model_used: model.clone(),
                        note: None,
                    });
                }
                Err(err) => {
                    tracing::warn!(model = %model, error = %err, "candidate exhausted");
                    last_error = err;
                }
            }
        }

        Err(ServiceError::Provider(last_error))
    }

    /// Run the retry budget for one candidate. Returns the last error
    /// once the budget is spent or the candidate proves malformed.
    async fn try_candidate(
        &self,
        api_key: &str,
        model: &str,
        user_prompt: &str,
    ) -> Result<Enhancement, String> {
        let mut last_error = String::new();
        for attempt in 0..MAX_ATTEMPTS_PER_CANDIDATE {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }
            match self.attempt(api_key, model, user_prompt).await {
                Attempt::Success(enhancement) => return Ok(enhancement),
                Attempt::Retry(err) => {
                    tracing::debug!(
                        model = %model,
                        attempt = attempt + 1,
                        error = %err,
                        "retryable attempt failure"
                    );
                    last_error = err;
                }
                Attempt::Advance(err) => return Err(err),
            }
        }
        Err(last_error)
    }

    async fn attempt(&self, api_key: &str, model: &str, user_prompt: &str) -> Attempt {
        let body = ChatRequest {
            model,
            messages: vec![
                Message { role: "system", content: SYSTEM_PROMPT },
                Message { role: "user", content: user_prompt },
            ],
            temperature: 0.2,
        };

        let response = match self
            .http
            .post(self.completions_url.as_str())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return Attempt::Retry(format!("transport error: {err}")),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(err) => return Attempt::Retry(format!("body read error: {err}")),
        };

        if status.is_success() {
            let content = match serde_json::from_str::<ChatResponse>(&text) {
                Ok(chat) => chat
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content),
                Err(err) => {
                    return Attempt::Advance(format!("unparseable completion envelope: {err}"));
                }
            };
            let Some(content) = content else {
                return Attempt::Advance("completion had no message content".to_string());
            };
            match extract_enhancement(&content) {
                Some(enhancement) => Attempt::Success(enhancement),
                None => Attempt::Advance(format!(
                    "malformed enhancement JSON: {}",
                    truncate_chars(&content, ERROR_SNIPPET_CHARS)
                )),
            }
        } else if is_retryable_status(status.as_u16()) {
            Attempt::Retry(format!(
                "HTTP {status}: {}",
                truncate_chars(&text, ERROR_SNIPPET_CHARS)
            ))
        } else {
            Attempt::Advance(format!(
                "HTTP {status}: {}",
                truncate_chars(&text, ERROR_SNIPPET_CHARS)
            ))
        }
    }
}

fn build_user_prompt(raw: &str, mode: Mode, tone: &Tone) -> String {
    format!(
        "Mode: {mode} ({mode_hint})\nTone: {tone_label} ({tone_hint})\n\nUser Input:\n\"\"\"{input}\"\"\"",
        mode_hint = mode_hint(mode),
        tone_label = tone.label(),
        tone_hint = tone_hint(tone),
        input = raw.trim(),
    )
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Exponential backoff with jitter: 1s, 2s (+ up to 250ms) before the
/// second and third attempts.
fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS * 2u64.pow(attempt);
    let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
    Duration::from_millis(base + jitter)
}

/// Two-stage tolerant extraction: strict parse of the whole content,
/// then a scan for the first balanced `{...}` region. Content that
/// survives neither stage, or parses without a non-empty `enhanced`
/// value, is a terminal condition for the candidate.
fn extract_enhancement(content: &str) -> Option<Enhancement> {
    if let Some(enhancement) = parse_candidate(content) {
        return Some(enhancement);
    }
    let start = content.find('{')?;
    let region = balanced_region(content, start)?;
    parse_candidate(region)
}

fn parse_candidate(candidate: &str) -> Option<Enhancement> {
    serde_json::from_str::<Enhancement>(candidate)
        .ok()
        .filter(|e| !e.enhanced.trim().is_empty())
}

/// Return the balanced `{...}` slice starting at `start`, honoring JSON
/// string and escape rules so braces inside strings don't miscount.
fn balanced_region(content: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in content[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&content[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
