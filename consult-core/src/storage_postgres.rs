use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    FromRow, PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
    types::Json,
};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::{
    error::{ConsultError, Result},
    models::{AiProvider, ConsultationTurn, PatientInfo},
    storage::ConsultationStore,
};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS consultations (
    seq BIGSERIAL PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    session_id TEXT NOT NULL,
    patient_message TEXT NOT NULL,
    doctor_response TEXT NOT NULL,
    patient_info JSONB,
    ai_provider TEXT NOT NULL DEFAULT 'gemini',
    created_at TIMESTAMPTZ NOT NULL
)"#;

const CREATE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS consultations_session_idx
    ON consultations (session_id, created_at, seq)"#;

#[derive(FromRow)]
struct ConsultationRow {
    id: String,
    session_id: String,
    patient_message: String,
    doctor_response: String,
    patient_info: Option<serde_json::Value>,
    ai_provider: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ConsultationRow> for ConsultationTurn {
    type Error = String;

    fn try_from(row: ConsultationRow) -> std::result::Result<Self, Self::Error> {
        let patient_info = row
            .patient_info
            .map(serde_json::from_value::<PatientInfo>)
            .transpose()
            .map_err(|e| format!("invalid patient_info: {e}"))?;
        let ai_provider = row.ai_provider.parse::<AiProvider>()?;

        Ok(ConsultationTurn {
            id: row.id,
            session_id: row.session_id,
            patient_message: row.patient_message,
            doctor_response: row.doctor_response,
            timestamp: row.created_at,
            patient_info,
            ai_provider,
        })
    }
}

/// Rows that no longer decode are logged and skipped so one bad record
/// does not hide a whole conversation.
fn decode_rows(rows: Vec<ConsultationRow>) -> Vec<ConsultationTurn> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id.clone();
            match ConsultationTurn::try_from(row) {
                Ok(turn) => Some(turn),
                Err(e) => {
                    warn!(consultation_id = %id, error = %e, "Skipping unreadable consultation record");
                    None
                }
            }
        })
        .collect()
}

/// PostgreSQL implementation of ConsultationStore
pub struct PostgresConsultationStore {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PostgresConsultationStore {
    /// Build a lazily connecting pool. `database_name` overrides the
    /// database named in the URL.
    pub fn connect_lazy(database_url: &str, database_name: Option<&str>) -> Result<Self> {
        let mut options = PgConnectOptions::from_str(database_url)?;
        if let Some(name) = database_name {
            options = options.database(name);
        }

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy_with(options);

        Ok(Self {
            pool,
            schema: OnceCell::new(),
        })
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
                sqlx::query(CREATE_INDEX).execute(&self.pool).await?;
                info!("Consultations table ready");
                Ok::<(), ConsultError>(())
            })
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ConsultationStore for PostgresConsultationStore {
    async fn save(&self, turn: &ConsultationTurn) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO consultations
                (id, session_id, patient_message, doctor_response, patient_info, ai_provider, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&turn.id)
        .bind(&turn.session_id)
        .bind(&turn.patient_message)
        .bind(&turn.doctor_response)
        .bind(turn.patient_info.as_ref().map(Json))
        .bind(turn.ai_provider.as_str())
        .bind(turn.timestamp)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self, session_id: &str, limit: usize) -> Result<Vec<ConsultationTurn>> {
        self.ensure_schema().await?;

        let rows: Vec<ConsultationRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, patient_message, doctor_response, patient_info, ai_provider, created_at
            FROM consultations
            WHERE session_id = $1
            ORDER BY created_at ASC, seq ASC
            LIMIT $2
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows))
    }

    async fn recent(&self, session_id: &str, limit: usize) -> Result<Vec<ConsultationTurn>> {
        self.ensure_schema().await?;

        let rows: Vec<ConsultationRow> = sqlx::query_as(
            r#"
            SELECT id, session_id, patient_message, doctor_response, patient_info, ai_provider, created_at
            FROM (
                SELECT *
                FROM consultations
                WHERE session_id = $1
                ORDER BY created_at DESC, seq DESC
                LIMIT $2
            ) latest
            ORDER BY created_at ASC, seq ASC
            "#,
        )
        .bind(session_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows(rows))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
