use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::{
    error::{ConsultError, Result},
    models::{
        AiProvider, ConsultationRequest, ConsultationTurn, HealthReport, PatientInfo,
        SessionHistory,
    },
    prompt::{build_patient_prompt, ensure_disclaimer},
    provider::{DoctorModel, ProviderRegistry},
    rate_limit::RateLimiter,
    storage::ConsultationStore,
};

pub const SERVICE_NAME: &str = "Ghana AI Doctor Agent";

const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_SESSION_ID_CHARS: usize = 100;
const MAX_AGE: u8 = 150;
const MAX_LOCATION_CHARS: usize = 100;

/// Tunables for consultation calls
#[derive(Debug, Clone)]
pub struct ConsultSettings {
    pub provider_timeout: Duration,
    /// Total attempts when the provider reports a rate limit.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Turns returned by the history endpoint.
    pub history_limit: usize,
    /// Earlier turns replayed to the provider as chat history.
    pub prompt_history_limit: usize,
}

impl Default for ConsultSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            history_limit: 100,
            prompt_history_limit: 20,
        }
    }
}

/// Consultation, history and health operations over a store and the
/// configured provider models.
#[derive(Clone)]
pub struct ConsultationService {
    store: Arc<dyn ConsultationStore>,
    providers: ProviderRegistry,
    limiter: RateLimiter,
    settings: ConsultSettings,
}

impl ConsultationService {
    pub fn new(
        store: Arc<dyn ConsultationStore>,
        providers: ProviderRegistry,
        limiter: RateLimiter,
        settings: ConsultSettings,
    ) -> Self {
        Self {
            store,
            providers,
            limiter,
            settings,
        }
    }

    /// Ask the doctor model and persist the exchange. Nothing is stored
    /// unless the provider answered.
    pub async fn consult(&self, request: ConsultationRequest) -> Result<ConsultationTurn> {
        let request = validate_request(request)?;
        let session_id = request.session_id.as_str();

        if !self.limiter.check(session_id) {
            warn!(session_id = %session_id, "Consultation rate limit exceeded");
            return Err(ConsultError::RateLimited(session_id.to_string()));
        }

        let (provider, model) = self.providers.resolve(request.ai_provider)?;

        let history = self
            .store
            .recent(session_id, self.settings.prompt_history_limit)
            .await?;
        let prompt = build_patient_prompt(&request.message, request.patient_info.as_ref());

        info!(
            session_id = %session_id,
            provider = %provider,
            history_turns = history.len(),
            "Sending consultation to AI provider"
        );

        let reply = self.ask_with_retry(model.as_ref(), provider, &prompt, &history).await?;
        let doctor_response = ensure_disclaimer(&reply);

        let turn = ConsultationTurn::new(
            request.session_id.clone(),
            request.message,
            doctor_response,
            request.patient_info,
            provider,
        );
        self.store.save(&turn).await.inspect_err(|e| {
            error!(session_id = %turn.session_id, error = %e, "Failed to store consultation");
        })?;

        info!(session_id = %turn.session_id, consultation_id = %turn.id, "Consultation completed");
        Ok(turn)
    }

    async fn ask_with_retry(
        &self,
        model: &dyn DoctorModel,
        provider: AiProvider,
        prompt: &str,
        history: &[ConsultationTurn],
    ) -> Result<String> {
        let mut delay = self.settings.initial_backoff;
        let mut attempt = 1;

        loop {
            let outcome = tokio::time::timeout(
                self.settings.provider_timeout,
                model.reply(prompt, history),
            )
            .await;

            match outcome {
                Err(_) => {
                    error!(provider = %provider, "AI provider timed out");
                    return Err(ConsultError::Timeout(self.settings.provider_timeout));
                }
                Ok(Ok(reply)) if reply.trim().is_empty() => {
                    error!(provider = %provider, "AI provider returned an empty reply");
                    return Err(ConsultError::Provider("empty response".to_string()));
                }
                Ok(Ok(reply)) => return Ok(reply),
                Ok(Err(ConsultError::ProviderRateLimited(message)))
                    if attempt < self.settings.max_attempts =>
                {
                    warn!(
                        provider = %provider,
                        attempt,
                        retry_in = ?delay,
                        error = %message,
                        "AI provider rate limited, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Ok(Err(e)) => {
                    error!(provider = %provider, error = %e, "AI provider call failed");
                    return Err(e);
                }
            }
        }
    }

    /// All stored turns for a session, oldest first.
    pub async fn history(&self, session_id: &str) -> Result<SessionHistory> {
        let consultations = self
            .store
            .list(session_id, self.settings.history_limit)
            .await?;
        info!(
            session_id = %session_id,
            count = consultations.len(),
            "Fetched consultation history"
        );
        Ok(SessionHistory {
            session_id: session_id.to_string(),
            consultations,
        })
    }

    pub async fn health(&self) -> HealthReport {
        let database = match self.store.ping().await {
            Ok(()) => "connected",
            Err(e) => {
                warn!(error = %e, "Database ping failed");
                "disconnected"
            }
        };
        let configured = |yes: bool| if yes { "configured" } else { "not configured" };

        HealthReport {
            status: "healthy".to_string(),
            database: database.to_string(),
            ai_service: configured(self.providers.any_configured()).to_string(),
            gemini: configured(self.providers.is_configured(AiProvider::Gemini)).to_string(),
            grok: configured(self.providers.is_configured(AiProvider::Grok)).to_string(),
            service: SERVICE_NAME.to_string(),
        }
    }
}

/// Trim the message and check field bounds.
pub fn validate_request(mut request: ConsultationRequest) -> Result<ConsultationRequest> {
    request.message = request.message.trim().to_string();
    if request.message.is_empty() {
        return Err(ConsultError::Validation("Message cannot be empty".to_string()));
    }
    if request.message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ConsultError::Validation(format!(
            "Message cannot be longer than {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let session_chars = request.session_id.chars().count();
    if session_chars == 0 || session_chars > MAX_SESSION_ID_CHARS {
        return Err(ConsultError::Validation(format!(
            "session_id must be between 1 and {MAX_SESSION_ID_CHARS} characters"
        )));
    }

    if let Some(info) = &request.patient_info {
        validate_patient_info(info)?;
    }
    Ok(request)
}

fn validate_patient_info(info: &PatientInfo) -> Result<()> {
    if info.age.is_some_and(|age| age > MAX_AGE) {
        return Err(ConsultError::Validation(format!(
            "age must be between 0 and {MAX_AGE}"
        )));
    }
    if info
        .location
        .as_ref()
        .is_some_and(|l| l.chars().count() > MAX_LOCATION_CHARS)
    {
        return Err(ConsultError::Validation(format!(
            "location cannot be longer than {MAX_LOCATION_CHARS} characters"
        )));
    }
    Ok(())
}
