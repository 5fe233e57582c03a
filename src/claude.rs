//! Anthropic Messages API implementation of [`Translator`].

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::translator::{TranslationReply, TranslationRequest, Translator, TranslatorError, UsageReceipt};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

/// USD per million tokens.
const INPUT_PRICE_PER_M: f64 = 3.0;
const OUTPUT_PRICE_PER_M: f64 = 15.0;

#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ClaudeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct ClaudeTranslator {
    config: ClaudeConfig,
    client: Client,
}

impl ClaudeTranslator {
    pub fn new(config: ClaudeConfig) -> Result<Self, TranslatorError> {
        if config.api_key.trim().is_empty() {
            return Err(TranslatorError::MissingApiKey);
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TranslatorError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl Translator for ClaudeTranslator {
    fn name(&self) -> &str {
        &self.config.model
    }

    fn translate(&self, request: &TranslationRequest) -> Result<TranslationReply, TranslatorError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": build_prompt(request) }],
        });
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        tracing::debug!(event = "claude_request", url = %url, items = request.items.len());

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| TranslatorError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranslatorError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let parsed: MessagesResponse = response
            .json()
            .map_err(|e| TranslatorError::Reply(e.to_string()))?;
        let text = parsed
            .content
            .first()
            .map(|block| block.text.as_str())
            .ok_or_else(|| TranslatorError::Reply("no content in reply".into()))?;

        Ok(TranslationReply {
            translations: parse_translations(text)?,
            usage: UsageReceipt::priced(
                parsed.usage.input_tokens,
                parsed.usage.output_tokens,
                INPUT_PRICE_PER_M,
                OUTPUT_PRICE_PER_M,
            ),
        })
    }
}

/// Prompt carrying the language pair, domain, terminology, notes and items.
pub fn build_prompt(request: &TranslationRequest) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "You are a professional translator specializing in {}.\n",
        request.domain
    );
    let _ = writeln!(
        out,
        "Translate the following text from {} to {} ({}).\n",
        request.source_language, request.language_name, request.target_language
    );
    if !request.terminology.is_empty() {
        out.push_str("TERMINOLOGY (use these exact translations):\n");
        for (source, target) in &request.terminology {
            let _ = writeln!(out, "- {source} → {target}");
        }
        out.push('\n');
    }
    if !request.notes.is_empty() {
        out.push_str("TRANSLATION NOTES:\n");
        for note in &request.notes {
            let _ = writeln!(out, "- {note}");
        }
        out.push('\n');
    }
    out.push_str("Return a JSON array with one object per item, in this exact format:\n");
    out.push_str("[\n  {\"id\": 1, \"target_text\": \"TRANSLATION\"},\n  ...\n]\n");
    out.push_str("Keep each translation on a single line.\n\nItems:\n");
    for item in &request.items {
        let _ = writeln!(out, "ID: {}", item.id);
        let _ = writeln!(out, "Context: {}", item.context.as_str());
        let _ = writeln!(out, "Source: {}\n", item.source_text);
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ReplyId {
    Number(u32),
    Text(String),
}

#[derive(Deserialize)]
struct ReplyEntry {
    id: ReplyId,
    #[serde(default)]
    target_text: String,
}

/// Pull the JSON array out of the model's reply text.
pub fn parse_translations(text: &str) -> Result<BTreeMap<u32, String>, TranslatorError> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        return Err(TranslatorError::Reply("no JSON array found in reply".into()));
    };
    if end < start {
        return Err(TranslatorError::Reply("no JSON array found in reply".into()));
    }
    let entries: Vec<ReplyEntry> = serde_json::from_str(&text[start..=end])
        .map_err(|e| TranslatorError::Reply(e.to_string()))?;

    let mut out = BTreeMap::new();
    for entry in entries {
        let id = match entry.id {
            ReplyId::Number(id) => id,
            ReplyId::Text(raw) => match raw.trim().parse() {
                Ok(id) => id,
                Err(_) => {
                    tracing::debug!(event = "reply_id_ignored", id = %raw);
                    continue;
                }
            },
        };
        out.insert(id, entry.target_text);
    }
    Ok(out)
}
