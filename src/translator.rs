//! Batch translation through an external capability.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::TranslationSettings;
use crate::error::{Result, TranslateError};
use crate::model::{FragmentContext, Task};

/// One fragment sent for translation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TranslationItem {
    pub id: u32,
    pub context: FragmentContext,
    pub source_text: String,
}

/// A whole batch: every unfilled fragment of one task.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TranslationRequest {
    pub source_language: String,
    pub target_language: String,
    pub language_name: String,
    pub domain: String,
    pub terminology: BTreeMap<String, String>,
    pub notes: Vec<String>,
    pub items: Vec<TranslationItem>,
}

/// Token usage and estimated cost of one call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct UsageReceipt {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl UsageReceipt {
    /// Receipt priced in USD per million input/output tokens.
    pub fn priced(input_tokens: u64, output_tokens: u64, input_per_m: f64, output_per_m: f64) -> Self {
        let cost = input_tokens as f64 * input_per_m / 1_000_000.0
            + output_tokens as f64 * output_per_m / 1_000_000.0;
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
            estimated_cost_usd: cost,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TranslationReply {
    pub translations: BTreeMap<u32, String>,
    pub usage: UsageReceipt,
}

#[derive(Debug, thiserror::Error)]
pub enum TranslatorError {
    #[error("API key not set (use --api-key or ANTHROPIC_API_KEY)")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },
    #[error("unreadable reply: {0}")]
    Reply(String),
}

/// An external translation capability. One call per batch.
pub trait Translator {
    /// Model or service identifier, recorded in events.
    fn name(&self) -> &str;

    fn translate(&self, request: &TranslationRequest) -> Result<TranslationReply, TranslatorError>;
}

/// Position of a requested fragment: `(file index, extraction index)`.
pub type ItemRef = (usize, usize);

/// Collect every unfilled fragment of `task` into one request. Ids start at 1.
pub fn build_request(
    task: &Task,
    settings: &TranslationSettings,
) -> (TranslationRequest, BTreeMap<u32, ItemRef>) {
    let mut items = Vec::new();
    let mut refs = BTreeMap::new();
    for (file_index, file) in task.files.iter().enumerate() {
        for (index, fragment) in file.extractions.iter().enumerate() {
            if fragment.is_filled() {
                continue;
            }
            let id = items.len() as u32 + 1;
            items.push(TranslationItem {
                id,
                context: fragment.context,
                source_text: fragment.source_text.clone(),
            });
            refs.insert(id, (file_index, index));
        }
    }
    let request = TranslationRequest {
        source_language: task.source_language.clone(),
        target_language: task.target_language.clone(),
        language_name: task.language_name.clone(),
        domain: settings.domain.clone(),
        terminology: settings.terminology.clone(),
        notes: task.translation_notes.clone(),
        items,
    };
    (request, refs)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoOutcome {
    pub requested: usize,
    pub filled: usize,
    pub receipt: UsageReceipt,
}

/// Fill the unfilled fragments of `task` with one translator call.
///
/// On error the task is left untouched. Unknown ids and blank translations in
/// the reply are ignored; fragments without a reply stay unfilled.
pub fn auto_translate(
    task: &mut Task,
    translator: &dyn Translator,
    settings: &TranslationSettings,
) -> Result<AutoOutcome> {
    let (request, refs) = build_request(task, settings);
    if request.items.is_empty() {
        return Ok(AutoOutcome::default());
    }
    tracing::info!(
        event = "translation_requested",
        translator = translator.name(),
        items = request.items.len()
    );
    let reply = translator
        .translate(&request)
        .map_err(|e| TranslateError::ExternalCapability(e.to_string()))?;

    let mut filled = 0;
    for (id, text) in reply.translations {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let Some(&(file, index)) = refs.get(&id) else {
            tracing::debug!(event = "translation_unknown_id", id);
            continue;
        };
        task.files[file].extractions[index].target_text = text.to_string();
        filled += 1;
    }
    Ok(AutoOutcome {
        requested: request.items.len(),
        filled,
        receipt: reply.usage,
    })
}
