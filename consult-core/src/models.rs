use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub const DEFAULT_LOCATION: &str = "Ghana";

/// Which external model answered a consultation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    #[default]
    Gemini,
    Grok,
}

impl AiProvider {
    pub const ALL: [AiProvider; 2] = [AiProvider::Gemini, AiProvider::Grok];

    pub fn as_str(&self) -> &'static str {
        match self {
            AiProvider::Gemini => "gemini",
            AiProvider::Grok => "grok",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(AiProvider::Gemini),
            "grok" => Ok(AiProvider::Grok),
            other => Err(format!("unknown AI provider '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        })
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            other => Err(format!("gender must be male, female or other, got '{other}'")),
        }
    }
}

fn default_location() -> Option<String> {
    Some(DEFAULT_LOCATION.to_string())
}

/// Optional patient attributes sent along with a message.
///
/// A missing `location` defaults to Ghana; an explicit `null` clears it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default = "default_location")]
    pub location: Option<String>,
}

impl Default for PatientInfo {
    fn default() -> Self {
        Self {
            age: None,
            gender: None,
            location: default_location(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultationRequest {
    pub message: String,
    pub session_id: String,
    #[serde(default)]
    pub patient_info: Option<PatientInfo>,
    #[serde(default)]
    pub ai_provider: Option<AiProvider>,
}

/// One persisted request/response pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationTurn {
    pub id: String,
    pub session_id: String,
    pub patient_message: String,
    pub doctor_response: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub patient_info: Option<PatientInfo>,
    #[serde(default)]
    pub ai_provider: AiProvider,
}

impl ConsultationTurn {
    pub fn new(
        session_id: impl Into<String>,
        patient_message: impl Into<String>,
        doctor_response: impl Into<String>,
        patient_info: Option<PatientInfo>,
        ai_provider: AiProvider,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            patient_message: patient_message.into(),
            doctor_response: doctor_response.into(),
            // TIMESTAMPTZ keeps microseconds
            timestamp: Utc::now().trunc_subsecs(6),
            patient_info,
            ai_provider,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session_id: String,
    pub consultations: Vec<ConsultationTurn>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub database: String,
    pub ai_service: String,
    pub gemini: String,
    pub grok: String,
    pub service: String,
}

impl HealthReport {
    pub fn database_connected(&self) -> bool {
        self.database == "connected"
    }
}
