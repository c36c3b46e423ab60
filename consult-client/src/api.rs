use consult_core::{ConsultationRequest, ConsultationTurn, HealthReport, SessionHistory};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server answered {status}: {detail}")]
    Api { status: u16, detail: String },
}

/// HTTP client for the consultation API
#[derive(Clone)]
pub struct ConsultClient {
    http: Client,
    base_url: Url,
}

impl ConsultClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base_url.to_string()));
        }
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    pub async fn consult(
        &self,
        request: &ConsultationRequest,
    ) -> Result<ConsultationTurn, ClientError> {
        let url = self.endpoint(&["consult"])?;
        let response = self.http.post(url).json(request).send().await?;
        read_json(response).await
    }

    pub async fn history(&self, session_id: &str) -> Result<SessionHistory, ClientError> {
        let url = self.endpoint(&["consultations", session_id])?;
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }

    /// History for display: failures are logged and show as an empty
    /// conversation.
    pub async fn history_or_empty(&self, session_id: &str) -> Vec<ConsultationTurn> {
        match self.history(session_id).await {
            Ok(history) => {
                info!(session_id = %session_id, count = history.consultations.len(), "Loaded history");
                history.consultations
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to load consultation history");
                Vec::new()
            }
        }
    }

    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        let url = self.endpoint(&["health"])?;
        let response = self.http.get(url).send().await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("detail")
                .or_else(|| value.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(body);

    Err(ClientError::Api {
        status: status.as_u16(),
        detail,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use consult_core::{
        AiProvider, ConsultError, ConsultSettings, ConsultationService, DoctorModel,
        InMemoryConsultationStore, PatientInfo, ProviderRegistry, RateLimiter,
    };
    use consult_service::{AppState, build_router};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    struct KindDoctor;

    #[async_trait]
    impl DoctorModel for KindDoctor {
        async fn reply(
            &self,
            _prompt: &str,
            history: &[ConsultationTurn],
        ) -> consult_core::Result<String> {
            Ok(format!(
                "Reply number {}. This is not a prescription.",
                history.len() + 1
            ))
        }
    }

    struct DownDoctor;

    #[async_trait]
    impl DoctorModel for DownDoctor {
        async fn reply(
            &self,
            _prompt: &str,
            _history: &[ConsultationTurn],
        ) -> consult_core::Result<String> {
            Err(ConsultError::Provider("quota exceeded".to_string()))
        }
    }

    async fn serve(doctor: Arc<dyn DoctorModel>) -> String {
        let providers =
            ProviderRegistry::new(AiProvider::Gemini).with_model(AiProvider::Gemini, doctor);
        let app = build_router(AppState {
            consultations: ConsultationService::new(
                Arc::new(InMemoryConsultationStore::new()),
                providers,
                RateLimiter::new(10, Duration::from_secs(60)),
                ConsultSettings::default(),
            ),
        });

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request(session_id: &str, message: &str) -> ConsultationRequest {
        ConsultationRequest {
            message: message.to_string(),
            session_id: session_id.to_string(),
            patient_info: Some(PatientInfo {
                age: Some(25),
                ..PatientInfo::default()
            }),
            ai_provider: None,
        }
    }

    #[tokio::test]
    async fn test_consult_and_history_round_trip() {
        let client = ConsultClient::new(&serve(Arc::new(KindDoctor)).await).unwrap();

        let first = client.consult(&request("chat-1", "I have a cough")).await.unwrap();
        assert_eq!(first.doctor_response, "Reply number 1. This is not a prescription.");
        let second = client.consult(&request("chat-1", "Still coughing")).await.unwrap();
        assert_eq!(second.doctor_response, "Reply number 2. This is not a prescription.");

        let turns = client.history_or_empty("chat-1").await;
        assert_eq!(turns, vec![first, second]);

        let health = client.health().await.unwrap();
        assert!(health.database_connected());
    }

    #[tokio::test]
    async fn test_session_ids_are_path_encoded() {
        let client = ConsultClient::new(&serve(Arc::new(KindDoctor)).await).unwrap();

        let turn = client.consult(&request("a/b c", "hello")).await.unwrap();
        let history = client.history("a/b c").await.unwrap();
        assert_eq!(history.session_id, "a/b c");
        assert_eq!(history.consultations, vec![turn]);
    }

    #[tokio::test]
    async fn test_provider_failure_surfaces_as_api_error() {
        let client = ConsultClient::new(&serve(Arc::new(DownDoctor)).await).unwrap();

        match client.consult(&request("s1", "hello")).await {
            Err(ClientError::Api { status, detail }) => {
                assert_eq!(status, 500);
                assert!(detail.contains("healthcare facility"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(client.history_or_empty("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_backend_gives_empty_history() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ConsultClient::new(&format!("http://{addr}")).unwrap();
        assert!(client.history_or_empty("s1").await.is_empty());
        assert!(matches!(client.health().await, Err(ClientError::Http(_))));
    }

    #[test]
    fn test_endpoint_urls() {
        let client = ConsultClient::new("http://localhost:8001/").unwrap();
        assert_eq!(
            client.endpoint(&["consultations", "s1"]).unwrap().as_str(),
            "http://localhost:8001/api/consultations/s1"
        );

        let client = ConsultClient::new("https://example.org/doctor").unwrap();
        assert_eq!(
            client.endpoint(&["health"]).unwrap().as_str(),
            "https://example.org/doctor/api/health"
        );

        assert!(matches!(
            ConsultClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }
}
