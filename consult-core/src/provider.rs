use async_trait::async_trait;
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::{Chat, CompletionError, CompletionModel, Message, PromptError},
    providers::{gemini, xai},
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::{ConsultError, Result},
    models::{AiProvider, ConsultationTurn},
    prompt::{DOCTOR_NAME, DOCTOR_PERSONA},
};

const TEMPERATURE: f64 = 0.7;
const MAX_OUTPUT_TOKENS: u64 = 1000;

/// A language model answering as the doctor persona
#[async_trait]
pub trait DoctorModel: Send + Sync {
    /// Answer `prompt` given the earlier turns of the same session.
    async fn reply(&self, prompt: &str, history: &[ConsultationTurn]) -> Result<String>;
}

/// Convert stored turns into alternating user/assistant chat messages
pub fn to_chat_history(history: &[ConsultationTurn]) -> Vec<Message> {
    history
        .iter()
        .flat_map(|turn| {
            [
                Message::user(format!("Patient: {}", turn.patient_message)),
                Message::assistant(format!("{}: {}", DOCTOR_NAME, turn.doctor_response)),
            ]
        })
        .collect()
}

/// Provider errors that mean "slow down" are retried by the caller;
/// everything else is final.
pub fn classify_provider_error(err: PromptError) -> ConsultError {
    match &err {
        PromptError::CompletionError(CompletionError::ProviderError(body))
            if is_rate_limit_body(body) =>
        {
            ConsultError::ProviderRateLimited(err.to_string())
        }
        _ => ConsultError::Provider(err.to_string()),
    }
}

/// Recognise the error bodies providers send with HTTP 429: Gemini's
/// `{"error": {"code": 429, "status": "RESOURCE_EXHAUSTED"}}` and the
/// OpenAI-style `type`/`code` strings xAI uses.
fn is_rate_limit_body(body: &str) -> bool {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return false;
    };
    let error = value.get("error").filter(|e| e.is_object()).unwrap_or(&value);
    let code = error.get("code");
    if code.and_then(Value::as_u64) == Some(429) {
        return true;
    }

    [error.get("status"), error.get("type"), code]
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_ascii_lowercase)
        .any(|tag| {
            tag == "resource_exhausted"
                || tag.contains("rate_limit")
                || tag.contains("resource has been exhausted")
        })
}

/// DoctorModel backed by a rig agent
pub struct RigDoctor<M: CompletionModel> {
    agent: Agent<M>,
}

impl<M: CompletionModel> RigDoctor<M> {
    pub fn new(agent: Agent<M>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl<M> DoctorModel for RigDoctor<M>
where
    M: CompletionModel + 'static,
{
    async fn reply(&self, prompt: &str, history: &[ConsultationTurn]) -> Result<String> {
        let chat_history = to_chat_history(history);
        self.agent
            .chat(prompt.to_string(), chat_history)
            .await
            .map_err(classify_provider_error)
    }
}

pub fn gemini_doctor(api_key: &str, model: &str) -> Arc<dyn DoctorModel> {
    let client = gemini::Client::new(api_key);
    let agent = client
        .agent(model)
        .preamble(DOCTOR_PERSONA)
        .additional_params(json!({
            "generationConfig": {
                "temperature": TEMPERATURE,
                "maxOutputTokens": MAX_OUTPUT_TOKENS
            }
        }))
        .build();
    Arc::new(RigDoctor::new(agent))
}

pub fn grok_doctor(api_key: &str, model: &str) -> Arc<dyn DoctorModel> {
    let client = xai::Client::new(api_key);
    let agent = client
        .agent(model)
        .preamble(DOCTOR_PERSONA)
        .temperature(TEMPERATURE)
        .max_tokens(MAX_OUTPUT_TOKENS)
        .build();
    Arc::new(RigDoctor::new(agent))
}

/// The configured models, keyed by provider
#[derive(Clone)]
pub struct ProviderRegistry {
    default_provider: AiProvider,
    models: HashMap<AiProvider, Arc<dyn DoctorModel>>,
}

impl ProviderRegistry {
    pub fn new(default_provider: AiProvider) -> Self {
        Self {
            default_provider,
            models: HashMap::new(),
        }
    }

    pub fn with_model(mut self, provider: AiProvider, model: Arc<dyn DoctorModel>) -> Self {
        self.models.insert(provider, model);
        self
    }

    pub fn is_configured(&self, provider: AiProvider) -> bool {
        self.models.contains_key(&provider)
    }

    pub fn any_configured(&self) -> bool {
        !self.models.is_empty()
    }

    /// Resolve the requested provider, falling back to the default one.
    pub fn resolve(
        &self,
        requested: Option<AiProvider>,
    ) -> Result<(AiProvider, Arc<dyn DoctorModel>)> {
        let provider = requested.unwrap_or(self.default_provider);
        self.models
            .get(&provider)
            .map(|model| (provider, model.clone()))
            .ok_or(ConsultError::ProviderNotConfigured(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl DoctorModel for Echo {
        async fn reply(&self, prompt: &str, _history: &[ConsultationTurn]) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn test_chat_history_alternates_roles() {
        let turns = vec![
            ConsultationTurn::new("s", "first", "answer one", None, AiProvider::Gemini),
            ConsultationTurn::new("s", "second", "answer two", None, AiProvider::Gemini),
        ];
        assert_eq!(to_chat_history(&turns).len(), 4);
        assert!(to_chat_history(&[]).is_empty());
    }

    fn provider_body(body: &str) -> PromptError {
        PromptError::CompletionError(CompletionError::ProviderError(body.to_string()))
    }

    #[test]
    fn test_classify_provider_error() {
        let gemini_busy = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_provider_error(provider_body(gemini_busy)),
            ConsultError::ProviderRateLimited(_)
        ));

        let xai_busy = r#"{"code": "Some resource has been exhausted", "error": "Too many requests"}"#;
        assert!(matches!(
            classify_provider_error(provider_body(xai_busy)),
            ConsultError::ProviderRateLimited(_)
        ));

        let openai_style = r#"{"error": {"message": "slow down", "type": "rate_limit_exceeded"}}"#;
        assert!(matches!(
            classify_provider_error(provider_body(openai_style)),
            ConsultError::ProviderRateLimited(_)
        ));
    }

    #[test]
    fn test_numbers_in_messages_are_not_rate_limits() {
        let bad_request = r#"{"error": {"code": 400, "message": "prompt used 429 tokens", "status": "INVALID_ARGUMENT"}}"#;
        assert!(matches!(
            classify_provider_error(provider_body(bad_request)),
            ConsultError::Provider(_)
        ));
        assert!(matches!(
            classify_provider_error(provider_body("upstream 429 gateway text")),
            ConsultError::Provider(_)
        ));
        assert!(matches!(
            classify_provider_error(PromptError::CompletionError(CompletionError::ResponseError(
                "rate limit".to_string()
            ))),
            ConsultError::Provider(_)
        ));
    }

    #[tokio::test]
    async fn test_registry_resolution() {
        let registry =
            ProviderRegistry::new(AiProvider::Gemini).with_model(AiProvider::Gemini, Arc::new(Echo));

        let (provider, model) = registry.resolve(None).unwrap();
        assert_eq!(provider, AiProvider::Gemini);
        assert_eq!(model.reply("hi", &[]).await.unwrap(), "hi");

        assert!(registry.is_configured(AiProvider::Gemini));
        assert!(!registry.is_configured(AiProvider::Grok));
        assert!(matches!(
            registry.resolve(Some(AiProvider::Grok)),
            Err(ConsultError::ProviderNotConfigured(AiProvider::Grok))
        ));
        assert!(!ProviderRegistry::new(AiProvider::Grok).any_configured());
    }
}
