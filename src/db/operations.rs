use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::models::{AccountFlags, ProcedureReply, Session};
use crate::db::CredentialStore;
use crate::error::DatabaseError;

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Connects a bounded pool. Acquisition beyond `acquire_timeout` surfaces
    /// as a connection error, which the auth pipeline treats as an infra
    /// fault.
    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Invokes a stored procedure taking a jsonb request and returning the
    /// `{status, code, message, ...}` envelope.
    async fn call(
        &self,
        sql: &str,
        payload: serde_json::Value,
    ) -> Result<ProcedureReply, DatabaseError> {
        let reply: serde_json::Value = sqlx::query_scalar(sql)
            .bind(payload)
            .fetch_one(self.pool.as_ref())
            .await?;

        serde_json::from_value(reply).map_err(|e| DatabaseError::MalformedReply(e.to_string()))
    }

    pub async fn login_local(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProcedureReply, DatabaseError> {
        self.call("SELECT auth_login_local($1::jsonb)", payload).await
    }

    pub async fn register_account(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProcedureReply, DatabaseError> {
        self.call("SELECT auth_register_account($1::jsonb)", payload)
            .await
    }

    pub async fn verify_email_code(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProcedureReply, DatabaseError> {
        self.call("SELECT auth_verify_email_code($1::jsonb)", payload)
            .await
    }

    pub async fn resend_verification_code(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProcedureReply, DatabaseError> {
        self.call("SELECT auth_resend_verification_code($1::jsonb)", payload)
            .await
    }

    pub async fn request_password_reset(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProcedureReply, DatabaseError> {
        self.call("SELECT auth_request_password_reset($1::jsonb)", payload)
            .await
    }

    pub async fn verify_password_reset_code(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProcedureReply, DatabaseError> {
        self.call("SELECT auth_verify_password_reset_code($1::jsonb)", payload)
            .await
    }

    pub async fn reset_password_with_code(
        &self,
        payload: serde_json::Value,
    ) -> Result<ProcedureReply, DatabaseError> {
        self.call("SELECT auth_reset_password_with_code($1::jsonb)", payload)
            .await
    }

    pub async fn account_overview(
        &self,
        user_id: Uuid,
    ) -> Result<ProcedureReply, DatabaseError> {
        self.call(
            "SELECT auth_account_overview($1::jsonb)",
            serde_json::json!({ "user_id": user_id }),
        )
        .await
    }
}

#[async_trait]
impl CredentialStore for DbOperations {
    async fn live_session(&self, session_id: Uuid) -> Result<Option<Session>, DatabaseError> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT session_id, user_id, user_agent, ip_address, expires_at, last_activity_at
            FROM sessions
            WHERE session_id = $1 AND expires_at > NOW()
            "#,
        )
        .bind(session_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(session)
    }

    async fn account_flags(&self, user_id: Uuid) -> Result<Option<AccountFlags>, DatabaseError> {
        let flags = sqlx::query_as::<_, AccountFlags>(
            "SELECT email_verified, is_active FROM accounts WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(flags)
    }

    async fn create_session(&self, session: &Session) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (session_id, user_id, user_agent, ip_address, expires_at, last_activity_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(&session.user_agent)
        .bind(&session.ip_address)
        .bind(session.expires_at)
        .bind(session.last_activity_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}
