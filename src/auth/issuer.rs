use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::token::TokenCodec;
use crate::db::models::Session;
use crate::db::CredentialStore;
use crate::error::AppError;

/// Client request metadata recorded with a new session for audit.
#[derive(Debug, Clone, Default)]
pub struct ClientMetadata {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub token: String,
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Creates session records and mints the tokens bound to them. Runs once per
/// successful login or first-time email verification, never on a failed
/// credential check.
pub struct SessionIssuer {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    session_duration_hours: i64,
}

impl SessionIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: TokenCodec,
        session_duration_hours: i64,
    ) -> Self {
        Self {
            store,
            codec,
            session_duration_hours,
        }
    }

    pub fn session_duration_hours(&self) -> i64 {
        self.session_duration_hours
    }

    /// Persists a fresh session and mints its token. Session row and token
    /// expiry both derive from the one configured duration, so the two clocks
    /// cannot diverge within a single issuance.
    pub async fn issue(
        &self,
        user_id: Uuid,
        meta: ClientMetadata,
    ) -> Result<IssuedSession, AppError> {
        let duration = Duration::hours(self.session_duration_hours);
        let session = Session::new(user_id, meta.user_agent, meta.ip_address, duration);

        self.store.create_session(&session).await?;

        let token = self.codec.mint(session.session_id, user_id, duration)?;

        Ok(IssuedSession {
            token,
            session_id: session.session_id,
            expires_at: session.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockCredentialStore;
    use std::sync::Mutex;

    fn codec() -> TokenCodec {
        TokenCodec::new("test_secret")
    }

    fn recording_store() -> (MockCredentialStore, Arc<Mutex<Vec<Session>>>) {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let sink = recorded.clone();

        let mut store = MockCredentialStore::new();
        store.expect_create_session().returning(move |session| {
            sink.lock().unwrap().push(session.clone());
            Ok(())
        });

        (store, recorded)
    }

    #[tokio::test]
    async fn test_issue_persists_then_mints() {
        let (store, recorded) = recording_store();
        let issuer = SessionIssuer::new(Arc::new(store), codec(), 4);
        let user_id = Uuid::new_v4();

        let issued = issuer
            .issue(
                user_id,
                ClientMetadata {
                    user_agent: Some("test-agent/1.0".into()),
                    ip_address: Some("127.0.0.1".into()),
                },
            )
            .await
            .unwrap();

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let session = &recorded[0];

        assert_eq!(session.session_id, issued.session_id);
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.user_agent.as_deref(), Some("test-agent/1.0"));
        assert_eq!(session.ip_address.as_deref(), Some("127.0.0.1"));
        assert_eq!(session.expires_at, issued.expires_at);

        // The minted token is bound to exactly the persisted session.
        let claims = codec().verify(&issued.token).unwrap();
        assert_eq!(claims.sid, Some(session.session_id));
        assert_eq!(claims.sub, user_id);

        // Both expiry clocks derive from the same duration at issuance.
        assert!((claims.exp - session.expires_at.timestamp()).abs() <= 1);
    }

    #[tokio::test]
    async fn test_two_issuances_are_independent() {
        let (store, recorded) = recording_store();
        let issuer = SessionIssuer::new(Arc::new(store), codec(), 4);
        let user_id = Uuid::new_v4();

        let first = issuer.issue(user_id, ClientMetadata::default()).await.unwrap();
        let second = issuer.issue(user_id, ClientMetadata::default()).await.unwrap();

        assert_ne!(first.session_id, second.session_id);
        assert_ne!(first.token, second.token);
        assert_eq!(recorded.lock().unwrap().len(), 2);

        // Each token verifies on its own.
        assert_eq!(
            codec().verify(&first.token).unwrap().sid,
            Some(first.session_id)
        );
        assert_eq!(
            codec().verify(&second.token).unwrap().sid,
            Some(second.session_id)
        );
    }

    #[tokio::test]
    async fn test_issue_fails_when_store_fails() {
        use crate::error::DatabaseError;

        let mut store = MockCredentialStore::new();
        store
            .expect_create_session()
            .returning(|_| Err(DatabaseError::ConnectionError("down".into())));

        let issuer = SessionIssuer::new(Arc::new(store), codec(), 4);
        let result = issuer.issue(Uuid::new_v4(), ClientMetadata::default()).await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));
    }

    #[tokio::test]
    async fn test_session_window_matches_configuration() {
        let (store, _) = recording_store();
        let issuer = SessionIssuer::new(Arc::new(store), codec(), 4);

        let before = Utc::now();
        let issued = issuer
            .issue(Uuid::new_v4(), ClientMetadata::default())
            .await
            .unwrap();
        let after = Utc::now();

        assert!(issued.expires_at >= before + Duration::hours(4));
        assert!(issued.expires_at <= after + Duration::hours(4));
    }
}
