use serde::Serialize;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::auth::token::TokenCodec;
use crate::db::CredentialStore;
use crate::error::{AuthError, DatabaseError};

/// Identity established for one request, handed to downstream handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub is_active: bool,
}

/// Validates an inbound credential against the token codec and the session
/// store. Runs on every protected request.
///
/// An identity is authenticated only when the token signature and expiry, the
/// session row, and the account's verification flag all check out; failing
/// any single step denies with the specific [`AuthError`] kind for that step.
pub struct SessionAuthenticator {
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
}

impl SessionAuthenticator {
    pub fn new(store: Arc<dyn CredentialStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    pub async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let raw = credential.ok_or(AuthError::MissingCredential)?;

        let claims = self.codec.verify(raw)?;
        let session_id = claims.sid.ok_or(AuthError::IncompleteCredential)?;

        // The session row is the authority: a revocation or server-side expiry
        // beats a token whose own expiry claim is still valid.
        let session = self
            .store
            .live_session(session_id)
            .await
            .map_err(infra_fault)?
            .ok_or(AuthError::SessionInvalid)?;

        let flags = self
            .store
            .account_flags(session.user_id)
            .await
            .map_err(infra_fault)?;

        match flags {
            Some(flags) if flags.email_verified => Ok(AuthenticatedUser {
                user_id: session.user_id,
                session_id,
                is_active: flags.is_active,
            }),
            _ => Err(AuthError::AccountNotVerified),
        }
    }
}

fn infra_fault(err: DatabaseError) -> AuthError {
    warn!("credential store fault during authentication: {}", err);
    AuthError::InfraFault(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{AccountFlags, Session};
    use crate::db::MockCredentialStore;
    use chrono::{Duration, Utc};
    use mockall::predicate::eq;

    fn codec() -> TokenCodec {
        TokenCodec::new("test_secret")
    }

    fn live_session(session_id: Uuid, user_id: Uuid) -> Session {
        let now = Utc::now();
        Session {
            session_id,
            user_id,
            user_agent: None,
            ip_address: None,
            expires_at: now + Duration::hours(4),
            last_activity_at: now,
        }
    }

    fn authenticator(store: MockCredentialStore) -> SessionAuthenticator {
        SessionAuthenticator::new(Arc::new(store), codec())
    }

    #[tokio::test]
    async fn test_missing_credential() {
        // The store must not be consulted at all.
        let auth = authenticator(MockCredentialStore::new());
        assert_eq!(
            auth.authenticate(None).await,
            Err(AuthError::MissingCredential)
        );
    }

    #[tokio::test]
    async fn test_malformed_credential() {
        let auth = authenticator(MockCredentialStore::new());
        assert_eq!(
            auth.authenticate(Some("garbage")).await,
            Err(AuthError::MalformedCredential)
        );
    }

    #[tokio::test]
    async fn test_expired_credential() {
        let token = codec()
            .mint(Uuid::new_v4(), Uuid::new_v4(), Duration::seconds(-1))
            .unwrap();

        let auth = authenticator(MockCredentialStore::new());
        assert_eq!(
            auth.authenticate(Some(&token)).await,
            Err(AuthError::ExpiredCredential)
        );
    }

    #[tokio::test]
    async fn test_incomplete_credential() {
        use jsonwebtoken::{encode, EncodingKey, Header};
        use serde::Serialize;

        #[derive(Serialize)]
        struct BareClaims {
            sub: Uuid,
            iat: i64,
            exp: i64,
        }

        let now = Utc::now();
        let token = encode(
            &Header::default(),
            &BareClaims {
                sub: Uuid::new_v4(),
                iat: now.timestamp(),
                exp: (now + Duration::hours(1)).timestamp(),
            },
            &EncodingKey::from_secret(b"test_secret"),
        )
        .unwrap();

        let auth = authenticator(MockCredentialStore::new());
        assert_eq!(
            auth.authenticate(Some(&token)).await,
            Err(AuthError::IncompleteCredential)
        );
    }

    #[tokio::test]
    async fn test_revoked_session_beats_valid_token() {
        let session_id = Uuid::new_v4();
        let token = codec()
            .mint(session_id, Uuid::new_v4(), Duration::hours(4))
            .unwrap();

        // Token is unexpired, but the store no longer has a live row.
        let mut store = MockCredentialStore::new();
        store
            .expect_live_session()
            .with(eq(session_id))
            .times(1)
            .returning(|_| Ok(None));

        let auth = authenticator(store);
        assert_eq!(
            auth.authenticate(Some(&token)).await,
            Err(AuthError::SessionInvalid)
        );
    }

    #[tokio::test]
    async fn test_store_fault_is_infra_fault() {
        let session_id = Uuid::new_v4();
        let token = codec()
            .mint(session_id, Uuid::new_v4(), Duration::hours(4))
            .unwrap();

        let mut store = MockCredentialStore::new();
        store.expect_live_session().returning(|_| {
            Err(DatabaseError::ConnectionError("pool timed out".into()))
        });

        let auth = authenticator(store);
        let denial = auth.authenticate(Some(&token)).await.unwrap_err();
        assert!(matches!(denial, AuthError::InfraFault(_)));
        assert!(!denial.clears_credential());
    }

    #[tokio::test]
    async fn test_missing_account() {
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let token = codec().mint(session_id, user_id, Duration::hours(4)).unwrap();

        let mut store = MockCredentialStore::new();
        store
            .expect_live_session()
            .returning(move |_| Ok(Some(live_session(session_id, user_id))));
        store
            .expect_account_flags()
            .with(eq(user_id))
            .returning(|_| Ok(None));

        let auth = authenticator(store);
        assert_eq!(
            auth.authenticate(Some(&token)).await,
            Err(AuthError::AccountNotVerified)
        );
    }

    #[tokio::test]
    async fn test_unverified_account() {
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let token = codec().mint(session_id, user_id, Duration::hours(4)).unwrap();

        let mut store = MockCredentialStore::new();
        store
            .expect_live_session()
            .returning(move |_| Ok(Some(live_session(session_id, user_id))));
        store.expect_account_flags().returning(|_| {
            Ok(Some(AccountFlags {
                email_verified: false,
                is_active: true,
            }))
        });

        let auth = authenticator(store);
        assert_eq!(
            auth.authenticate(Some(&token)).await,
            Err(AuthError::AccountNotVerified)
        );
    }

    #[tokio::test]
    async fn test_authenticated_identity_is_exact() {
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let token = codec().mint(session_id, user_id, Duration::hours(4)).unwrap();

        let mut store = MockCredentialStore::new();
        store
            .expect_live_session()
            .with(eq(session_id))
            .returning(move |_| Ok(Some(live_session(session_id, user_id))));
        store
            .expect_account_flags()
            .with(eq(user_id))
            .returning(|_| {
                Ok(Some(AccountFlags {
                    email_verified: true,
                    is_active: true,
                }))
            });

        let auth = authenticator(store);
        let identity = auth.authenticate(Some(&token)).await.unwrap();
        assert_eq!(
            identity,
            AuthenticatedUser {
                user_id,
                session_id,
                is_active: true,
            }
        );
    }

    #[tokio::test]
    async fn test_inactive_account_still_authenticates() {
        let session_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let token = codec().mint(session_id, user_id, Duration::hours(4)).unwrap();

        let mut store = MockCredentialStore::new();
        store
            .expect_live_session()
            .returning(move |_| Ok(Some(live_session(session_id, user_id))));
        store.expect_account_flags().returning(|_| {
            Ok(Some(AccountFlags {
                email_verified: true,
                is_active: false,
            }))
        });

        // `is_active` is surfaced but does not gate authentication here.
        let auth = authenticator(store);
        let identity = auth.authenticate(Some(&token)).await.unwrap();
        assert!(!identity.is_active);
    }
}
