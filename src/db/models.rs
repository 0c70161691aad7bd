use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Server-side session record: the authority on whether a token's claimed
/// identity is still valid. Never mutated after creation; expires passively.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        user_id: Uuid,
        user_agent: Option<String>,
        ip_address: Option<String>,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            user_id,
            user_agent,
            ip_address,
            expires_at: now + duration,
            last_activity_at: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

/// Verification/active flags read to gate authentication. `is_active` is
/// surfaced to callers but does not itself block the pipeline.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct AccountFlags {
    pub email_verified: bool,
    pub is_active: bool,
}

/// Envelope returned by the business-logic stored procedures.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcedureReply {
    pub status: String,
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub user_data: Option<serde_json::Value>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ProcedureReply {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn code_or(&self, fallback: u16) -> u16 {
        self.code.unwrap_or(fallback)
    }

    pub fn message_or(&self, fallback: &str) -> String {
        self.message.clone().unwrap_or_else(|| fallback.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_window() {
        let user_id = Uuid::new_v4();
        let session = Session::new(user_id, Some("agent".into()), None, Duration::hours(4));

        assert_eq!(session.user_id, user_id);
        assert!(!session.is_expired());
        assert!(session.expires_at > session.last_activity_at);
    }

    #[test]
    fn test_session_expired() {
        let session = Session::new(Uuid::new_v4(), None, None, Duration::hours(-1));
        assert!(session.is_expired());
    }

    #[test]
    fn test_procedure_reply_parsing() {
        let reply: ProcedureReply = serde_json::from_value(serde_json::json!({
            "status": "error",
            "code": 403,
            "message": "Account not verified.",
            "user_data": { "email": "a@b.c" }
        }))
        .unwrap();

        assert!(!reply.is_success());
        assert_eq!(reply.code_or(500), 403);
        assert_eq!(reply.message_or("fallback"), "Account not verified.");
        assert!(reply.user_data.is_some());
        assert!(reply.data.is_none());
    }
}
