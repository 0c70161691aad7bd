//! Credential store access.
//!
//! The authentication core reaches the database only through the
//! [`CredentialStore`] trait; the business-logic stored procedures are exposed
//! as concrete [`DbOperations`] methods.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;

pub mod models;
pub mod operations;

pub use models::{AccountFlags, ProcedureReply, Session};
pub use operations::DbOperations;

/// The store surface the session protocol needs: session lookup/creation/
/// revocation and account gating flags. Everything else stays behind
/// `DbOperations`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetches the session only if it is still live (`expires_at > now`).
    async fn live_session(&self, session_id: Uuid) -> Result<Option<Session>, DatabaseError>;

    /// Fetches the verification/active flags for an account, if it exists.
    async fn account_flags(&self, user_id: Uuid) -> Result<Option<AccountFlags>, DatabaseError>;

    async fn create_session(&self, session: &Session) -> Result<(), DatabaseError>;

    async fn delete_session(&self, session_id: Uuid) -> Result<(), DatabaseError>;
}
