use std::time::Duration;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("composer unavailable: {0}")]
    Unavailable(String),
    #[error("composer reply unusable: {0}")]
    Malformed(String),
}

/// Turns a prompt into free text. Replies may be partial or wrapped in prose;
/// callers go through [`parse_reply`].
pub trait RationaleGenerator: Send + Sync {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ComposeError>>;
}

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("valid fence regex"));

/// OpenAI-compatible chat completion client.
pub struct LlmComposer {
    model: String,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
    client: Client,
}

impl LlmComposer {
    pub fn from_config(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            model: config.llm_model.clone(),
            base_url: config.llm_endpoint.clone(),
            api_key: config.llm_api_key.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
            client,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, ComposeError> {
        let base = self.base_url.trim_end_matches('/');
        let url = format!("{}/chat/completions", base);

        let payload = json!({
            "model": self.model,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });

        let mut request = self.client.post(url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ComposeError::Unavailable(err.to_string()))?;

        let status = response.status();
        let text_body = response
            .text()
            .await
            .map_err(|err| ComposeError::Unavailable(err.to_string()))?;

        if !status.is_success() {
            return Err(ComposeError::Unavailable(format!(
                "HTTP {}: {}",
                status, text_body
            )));
        }

        let value: serde_json::Value = serde_json::from_str(&text_body)
            .map_err(|err| ComposeError::Malformed(err.to_string()))?;

        value
            .get("choices")
            .and_then(|choices| choices.as_array())
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ComposeError::Malformed("LLM response missing content".to_string()))
    }
}

impl RationaleGenerator for LlmComposer {
    fn generate<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, ComposeError>> {
        Box::pin(self.complete(prompt))
    }
}

const SYSTEM_PROMPT: &str = "Sos un asistente que recomienda salidas en Buenos Aires combinando un evento cultural con un restaurante. Usá solo los datos provistos y respondé en JSON.";

/// What a reply is reduced to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rationale {
    pub answer: String,
    pub event_name: Option<String>,
    pub restaurant_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyDoc {
    #[serde(default, alias = "respuesta")]
    answer: Option<String>,
    #[serde(default, alias = "eventName", alias = "evento_nombre")]
    event_name: Option<String>,
    #[serde(default, alias = "restaurantName", alias = "restaurante_nombre")]
    restaurant_name: Option<String>,
}

/// Pulls the structured answer out of a reply that may carry code fences or
/// prose around the JSON object. A reply with no JSON at all is taken as the
/// answer text itself.
pub fn parse_reply(text: &str) -> Result<Rationale, ComposeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ComposeError::Malformed("empty reply".into()));
    }

    let unfenced = FENCE_RE
        .captures(trimmed)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(trimmed);

    let object = match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => &unfenced[start..=end],
        _ => {
            return Ok(Rationale {
                answer: unfenced.trim().to_string(),
                event_name: None,
                restaurant_name: None,
            })
        }
    };

    let doc: ReplyDoc =
        serde_json::from_str(object).map_err(|err| ComposeError::Malformed(err.to_string()))?;
    let answer = non_blank(doc.answer)
        .ok_or_else(|| ComposeError::Malformed("reply has no answer".into()))?;

    Ok(Rationale {
        answer,
        event_name: non_blank(doc.event_name),
        restaurant_name: non_blank(doc.restaurant_name),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_fenced_json_with_original_keys() {
        let reply = "Claro! Mirá esto:\n```json\n{\n  \"respuesta\": \"Andá a ver Toc Toc y cená en El Preferido.\",\n  \"evento_nombre\": \"Toc Toc\",\n  \"restaurante_nombre\": \"El Preferido\"\n}\n```\nQue lo disfrutes.";
        let rationale = parse_reply(reply).expect("parse");
        assert_eq!(rationale.event_name.as_deref(), Some("Toc Toc"));
        assert_eq!(rationale.restaurant_name.as_deref(), Some("El Preferido"));
        assert!(rationale.answer.starts_with("Andá"));
    }

    #[test]
    fn reads_bare_json_with_prose_around_it() {
        let reply = r#"Acá va: {"answer": "Plan", "eventName": "Duki", "restaurantName": " "} fin"#;
        let rationale = parse_reply(reply).expect("parse");
        assert_eq!(rationale.answer, "Plan");
        assert_eq!(rationale.event_name.as_deref(), Some("Duki"));
        assert!(rationale.restaurant_name.is_none());
    }

    #[test]
    fn prose_only_reply_becomes_the_answer() {
        let rationale = parse_reply("Te recomiendo ir al Luna Park.").expect("parse");
        assert_eq!(rationale.answer, "Te recomiendo ir al Luna Park.");
        assert!(rationale.event_name.is_none());
    }

    #[test]
    fn broken_json_is_malformed() {
        assert!(matches!(
            parse_reply(r#"{"respuesta": "sin cerrar", }"#),
            Err(ComposeError::Malformed(_))
        ));
        assert!(matches!(parse_reply("   "), Err(ComposeError::Malformed(_))));
        assert!(matches!(
            parse_reply(r#"{"evento_nombre": "Toc Toc"}"#),
            Err(ComposeError::Malformed(_))
        ));
    }
}
