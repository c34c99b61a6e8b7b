//! Schema coercion on top of a chat model.
//!
//! The model is asked for a single JSON object. Whatever comes back is located,
//! parsed and validated against the schema before anyone downstream sees it.

use devscout_core::{
    Coercer, CoercionError, CompletionRequest, LanguageModel, SchemaDescriptor, SchemaInstance,
};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct CoercerOptions {
    pub temperature: f64,
    pub timeout_ms: u64,
    pub max_tokens: Option<u64>,
}

impl Default for CoercerOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            timeout_ms: 60_000,
            max_tokens: Some(1_500),
        }
    }
}

pub struct ModelCoercer {
    model: Arc<dyn LanguageModel>,
    opts: CoercerOptions,
}

impl ModelCoercer {
    pub fn new(model: Arc<dyn LanguageModel>, opts: CoercerOptions) -> Self {
        Self { model, opts }
    }

    fn system_prompt(schema: &SchemaDescriptor) -> String {
        format!(
            "You convert the user's material into structured data.\n\
             Respond with exactly one JSON object and nothing else, shaped like:\n{}\n\
             Use null, false or [] when the material does not say.",
            schema.render()
        )
    }
}

/// Locate the JSON object in a model reply: bare, fenced, or embedded in prose.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let trimmed = response.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }
    if let Some(fence) = trimmed.find("```") {
        let after = &trimmed[fence + 3..];
        let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after[body_start..];
        if let Some(end) = body.find("```") {
            let inner = body[..end].trim();
            if inner.starts_with('{') && inner.ends_with('}') {
                return Some(inner);
            }
        }
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (start < end).then(|| &trimmed[start..=end])
}

#[async_trait::async_trait]
impl Coercer for ModelCoercer {
    async fn coerce(
        &self,
        context: &str,
        schema: &SchemaDescriptor,
    ) -> Result<SchemaInstance, CoercionError> {
        let req = CompletionRequest {
            system: Self::system_prompt(schema),
            user: context.to_string(),
            temperature: self.opts.temperature,
            max_tokens: self.opts.max_tokens,
            json_mode: true,
            timeout_ms: self.opts.timeout_ms,
        };
        let raw = self.model.complete(&req).await.map_err(|e| {
            warn!(schema = schema.name, error = %e, "model call failed");
            CoercionError::from(e)
        })?;

        let mismatch = |detail: String| CoercionError::SchemaMismatch {
            schema: schema.name,
            detail,
            raw: raw.clone(),
        };
        let json = extract_json_object(&raw)
            .ok_or_else(|| mismatch("no JSON object in response".to_string()))?;
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| mismatch(format!("invalid JSON: {e}")))?;
        let instance = schema.validate(value).map_err(|e| match e {
            CoercionError::SchemaMismatch { detail, .. } => mismatch(detail),
            other => other,
        })?;
        debug!(schema = schema.name, model = self.model.name(), "coerced");
        Ok(instance)
    }
}
