//! [`GenerativeAnalyzer`] backed by a `genai` chat model.

use async_trait::async_trait;
use genai::Client;
use genai::chat::{ChatMessage, ChatRequest};
use tracing::{debug, instrument};

use super::error::AnalyzerError;
use super::ports::GenerativeAnalyzer;
use super::types::{AnalysisPayload, AnalyzeOptions};
use crate::constants::LIVE_SOURCE_LABEL;
use crate::domain::{HealthProfile, Product, StackItem};

const SYSTEM_PROMPT: &str = r#"You review dietary supplement and medication combinations for safety.
Reply with a single JSON object and nothing else, using this shape:
{
  "summary": string,
  "overall_risk_level": "NONE" | "LOW" | "MODERATE" | "HIGH" | "CRITICAL",
  "interactions": [{
    "pair": {"first": string, "second": string},
    "interaction_type": "drug_drug" | "drug_supplement" | "supplement_supplement" | "nutrient_nutrient" | "food_drug",
    "severity": "LOW" | "MODERATE" | "HIGH" | "CRITICAL",
    "mechanism": string,
    "evidence": "high" | "moderate" | "low" | "theoretical",
    "recommendations": [string],
    "source": "live_analysis"
  }],
  "nutrient_warnings": [],
  "recommendations": [string],
  "category_scores": {"<category>": number between 0 and 1},
  "confidence": number between 0 and 1
}"#;

pub struct GenaiAnalyzer {
    client: Client,
    model: String,
}

impl std::fmt::Debug for GenaiAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenaiAnalyzer")
            .field("model", &self.model)
            .finish()
    }
}

impl GenaiAnalyzer {
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_client(Client::default(), model)
    }

    pub fn with_client(client: Client, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerativeAnalyzer for GenaiAnalyzer {
    #[instrument(skip_all, fields(model = %self.model, product = %product.name))]
    async fn analyze(
        &self,
        product: &Product,
        stack: &[StackItem],
        profile: Option<&HealthProfile>,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisPayload, AnalyzerError> {
        let body = serde_json::json!({
            "product": product,
            "stack": stack,
            "health_profile": profile,
            "priority": options.priority,
        });
        let request = ChatRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(body.to_string()),
        ]);

        let response = self
            .client
            .exec_chat(&self.model, request, None)
            .await
            .map_err(|e| AnalyzerError::Request {
                reason: e.to_string(),
            })?;

        let text = response.first_text().unwrap_or_default();
        debug!(reply_len = text.len(), "Analysis reply received");
        parse_reply(text)
    }
}

/// Parses a model reply, tolerating a surrounding Markdown code fence.
pub fn parse_reply(text: &str) -> Result<AnalysisPayload, AnalyzerError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(AnalyzerError::Parse {
            reason: "empty reply".to_string(),
        });
    }

    let json = strip_code_fence(trimmed);
    let mut payload: AnalysisPayload =
        serde_json::from_str(json).map_err(|e| AnalyzerError::Parse {
            reason: e.to_string(),
        })?;

    for interaction in &mut payload.interactions {
        if interaction.source.is_empty() {
            interaction.source = LIVE_SOURCE_LABEL.to_string();
        }
    }
    payload.category_scores = std::mem::take(&mut payload.category_scores)
        .into_iter()
        .filter(|(_, score)| score.is_finite())
        .map(|(name, score)| (name.trim().to_lowercase(), score.clamp(0.0, 1.0)))
        .filter(|(name, _)| !name.is_empty())
        .collect();
    if let Some(c) = payload.confidence {
        payload.confidence = Some(if c.is_finite() { c.clamp(0.0, 1.0) } else { 0.0 });
    }
    Ok(payload)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop an optional language tag on the opening fence.
    let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
