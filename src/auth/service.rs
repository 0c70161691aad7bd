use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::issuer::{ClientMetadata, IssuedSession, SessionIssuer};
use crate::db::{CredentialStore, DbOperations, ProcedureReply};
use crate::error::AppError;
use crate::notify::{Notifier, NotifyError};

const HASH_COST: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub name: Option<String>,
    pub profile_completed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifiedUser {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub profile_completed: bool,
}

pub struct LoginOutcome {
    pub session: IssuedSession,
    pub user: UserSummary,
}

pub struct RegisterOutcome {
    pub code: u16,
    pub message: String,
    pub email: String,
}

pub struct VerifyEmailOutcome {
    pub session: IssuedSession,
    pub message: String,
    pub user: VerifiedUser,
}

pub struct ResendOutcome {
    pub code: u16,
    pub message: String,
    pub email: Option<String>,
}

/// Account record returned by the login procedure. The password hash never
/// leaves this module.
#[derive(Debug, Deserialize)]
struct LoginRecord {
    user_id: Uuid,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    password_hash: Option<String>,
    #[serde(default)]
    profile_completed: bool,
}

#[derive(Debug, Deserialize)]
struct VerifiedRecord {
    user_id: Uuid,
    #[serde(default)]
    name: Option<String>,
    email: String,
    #[serde(default)]
    profile_completed: bool,
}

/// Addressing data the code-issuing procedures hand back for delivery.
#[derive(Debug, Deserialize)]
struct CodeDelivery {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    email_verification_code: Option<String>,
    #[serde(default)]
    password_reset_code: Option<String>,
}

/// Orchestrates the account flows: credential checks against the store's
/// procedures, session issuance on success, best-effort code notifications.
pub struct AuthService {
    db: Arc<DbOperations>,
    issuer: Arc<SessionIssuer>,
    notifier: Arc<Notifier>,
}

impl AuthService {
    pub fn new(db: Arc<DbOperations>, issuer: Arc<SessionIssuer>, notifier: Arc<Notifier>) -> Self {
        Self { db, issuer, notifier }
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: ClientMetadata,
    ) -> Result<LoginOutcome, AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::ValidationError(
                "Email and password are required.".into(),
            ));
        }

        let reply = self
            .db
            .login_local(json!({ "email": email.to_lowercase() }))
            .await?;

        if !reply.is_success() {
            return Err(login_rejection(reply));
        }

        let record: LoginRecord = parse_payload(reply.user_data, "login")?;

        let hash = record.password_hash.ok_or_else(|| AppError::Rejected {
            code: 400,
            message: "No local password is set for this account. Please set one.".into(),
            data: None,
        })?;

        if !bcrypt::verify(password, &hash)? {
            return Err(AppError::ValidationError(
                "Incorrect email or password.".into(),
            ));
        }

        let session = self.issuer.issue(record.user_id, meta).await?;
        info!("session issued for user {}", record.user_id);

        Ok(LoginOutcome {
            session,
            user: UserSummary {
                name: record.name,
                profile_completed: record.profile_completed,
            },
        })
    }

    pub async fn register(
        &self,
        name: &str,
        lastname: &str,
        email: &str,
        password: &str,
        phone_number: Option<&str>,
    ) -> Result<RegisterOutcome, AppError> {
        if name.trim().is_empty()
            || lastname.trim().is_empty()
            || email.trim().is_empty()
            || password.is_empty()
        {
            return Err(AppError::ValidationError(
                "Name, last name, email and password are required.".into(),
            ));
        }
        if password.len() < 8 {
            return Err(AppError::ValidationError(
                "Password must be at least 8 characters long.".into(),
            ));
        }

        let password_hash = bcrypt::hash(password, HASH_COST)?;

        let reply = self
            .db
            .register_account(json!({
                "name": name,
                "lastname": lastname,
                "email": email.to_lowercase(),
                "password_hash": password_hash,
                "phone_number": phone_number,
            }))
            .await?;

        if !reply.is_success() {
            return Err(rejection(reply, 500, "Registration failed."));
        }

        let code = reply.code_or(201);
        let message = reply.message_or("Account registered. A verification code has been sent.");

        // A reply without delivery data is a procedure anomaly, not a failed
        // registration: warn and answer the client anyway.
        let mut email_out = email.to_lowercase();
        match optional_payload::<CodeDelivery>(reply.user_data) {
            Some(delivery) => {
                if let Some(e) = &delivery.email {
                    email_out = e.clone();
                }
                self.dispatch_verification_code(delivery);
            }
            None => warn!("registration reply carried no notification payload"),
        }

        Ok(RegisterOutcome {
            code,
            message,
            email: email_out,
        })
    }

    pub async fn verify_email_and_login(
        &self,
        email: &str,
        code: &str,
        meta: ClientMetadata,
    ) -> Result<VerifyEmailOutcome, AppError> {
        if email.trim().is_empty() || code.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Email and verification code are required.".into(),
            ));
        }

        let reply = self
            .db
            .verify_email_code(json!({ "email": email.to_lowercase(), "code": code }))
            .await?;

        // An already-verified account (409 with user data) still signs in.
        if !reply.is_success() && !(reply.code_or(0) == 409 && reply.user_data.is_some()) {
            return Err(rejection(reply, 400, "Verification failed."));
        }

        let message = reply.message_or("Email verified.");
        let record: VerifiedRecord = parse_payload(reply.user_data, "verification")?;

        let session = self.issuer.issue(record.user_id, meta).await?;
        info!("session issued after email verification for user {}", record.user_id);

        Ok(VerifyEmailOutcome {
            session,
            message,
            user: VerifiedUser {
                user_id: record.user_id,
                name: record.name,
                email: record.email,
                profile_completed: record.profile_completed,
            },
        })
    }

    pub async fn resend_verification_code(&self, email: &str) -> Result<ResendOutcome, AppError> {
        if email.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Email is required to resend the code.".into(),
            ));
        }

        let reply = self
            .db
            .resend_verification_code(json!({ "email": email.to_lowercase() }))
            .await?;

        // "info" replies (e.g. account already verified) pass through as-is
        // without generating a new code.
        if reply.status == "info" {
            return Ok(ResendOutcome {
                code: reply.code_or(200),
                message: reply.message_or("Nothing to resend."),
                email: None,
            });
        }
        if !reply.is_success() {
            return Err(rejection(reply, 400, "Could not resend the code."));
        }

        let code = reply.code_or(200);
        let message = reply.message_or("A new verification code has been sent.");

        let mut email_out = None;
        match optional_payload::<CodeDelivery>(reply.data) {
            Some(delivery) => {
                email_out = delivery.email.clone();
                self.dispatch_verification_code(delivery);
            }
            None => warn!("code resend reply carried no notification payload"),
        }

        Ok(ResendOutcome {
            code,
            message,
            email: email_out,
        })
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<String, AppError> {
        if email.trim().is_empty() {
            return Err(AppError::ValidationError("Email is required.".into()));
        }

        let reply = self
            .db
            .request_password_reset(json!({ "email": email.to_lowercase() }))
            .await?;

        if !reply.is_success() {
            if reply.code_or(0) == 404 {
                return Err(AppError::Rejected {
                    code: 404,
                    message: "The email address is not registered.".into(),
                    data: None,
                });
            }
            return Err(rejection(reply, 500, "Could not start the password reset."));
        }

        match optional_payload::<CodeDelivery>(reply.data) {
            Some(delivery) => self.dispatch_reset_code(delivery),
            None => warn!("password reset reply carried no notification payload"),
        }

        Ok("If the email is registered, a password reset code has been sent.".into())
    }

    pub async fn verify_password_reset_code(
        &self,
        email: &str,
        code: &str,
    ) -> Result<String, AppError> {
        if email.trim().is_empty() || code.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Email and reset code are required.".into(),
            ));
        }

        let reply = self
            .db
            .verify_password_reset_code(json!({ "email": email.to_lowercase(), "code": code }))
            .await?;

        if !reply.is_success() {
            return Err(rejection(reply, 400, "Invalid reset code."));
        }

        Ok(optional_payload::<CodeDelivery>(reply.data)
            .and_then(|d| d.email)
            .unwrap_or_else(|| email.to_lowercase()))
    }

    pub async fn reset_password_with_code(
        &self,
        email: &str,
        code: &str,
        new_password: &str,
    ) -> Result<(u16, String), AppError> {
        if email.trim().is_empty() || code.trim().is_empty() || new_password.is_empty() {
            return Err(AppError::ValidationError(
                "Email, reset code and new password are required.".into(),
            ));
        }
        if new_password.len() < 8 {
            return Err(AppError::ValidationError(
                "The new password must be at least 8 characters long.".into(),
            ));
        }

        let password_hash = bcrypt::hash(new_password, HASH_COST)?;

        let reply = self
            .db
            .reset_password_with_code(json!({
                "email": email.to_lowercase(),
                "code": code,
                "password_hash": password_hash,
            }))
            .await?;

        if !reply.is_success() {
            return Err(rejection(reply, 400, "Could not reset the password."));
        }

        Ok((
            reply.code_or(200),
            reply.message_or("Password updated. You can now sign in."),
        ))
    }

    /// Server-side revocation: deletes the session row so concurrent and
    /// future lookups observe the session as invalid.
    pub async fn logout(&self, session_id: Uuid) -> Result<(), AppError> {
        self.db.delete_session(session_id).await?;
        info!("session {} revoked", session_id);
        Ok(())
    }

    pub async fn account_overview(&self, user_id: Uuid) -> Result<serde_json::Value, AppError> {
        let reply = self.db.account_overview(user_id).await?;

        if !reply.is_success() {
            return Err(rejection(reply, 500, "Could not load the account overview."));
        }

        Ok(reply.data.unwrap_or_else(|| json!({})))
    }

    fn dispatch_verification_code(&self, delivery: CodeDelivery) {
        let Some(code) = delivery.email_verification_code else {
            warn!("procedure reply carried no verification code, skipping notifications");
            return;
        };

        if let Some(email) = delivery.email {
            let notifier = self.notifier.clone();
            let code = code.clone();
            spawn_best_effort("verification email", async move {
                notifier.send_email_verification_code(&email, &code).await
            });
        }
        if let Some(phone) = delivery.phone_number {
            let notifier = self.notifier.clone();
            spawn_best_effort("verification whatsapp", async move {
                notifier.send_whatsapp_verification_code(&phone, &code).await
            });
        }
    }

    fn dispatch_reset_code(&self, delivery: CodeDelivery) {
        let Some(code) = delivery.password_reset_code else {
            warn!("procedure reply carried no reset code, skipping notifications");
            return;
        };

        if let Some(email) = delivery.email {
            let notifier = self.notifier.clone();
            let code = code.clone();
            let name = delivery.name.clone();
            spawn_best_effort("reset email", async move {
                notifier
                    .send_email_password_reset_code(&email, name.as_deref(), &code)
                    .await
            });
        }
        if let Some(phone) = delivery.phone_number {
            let notifier = self.notifier.clone();
            let name = delivery.name;
            spawn_best_effort("reset whatsapp", async move {
                notifier
                    .send_whatsapp_password_reset_code(&phone, name.as_deref(), &code)
                    .await
            });
        }
    }
}

/// Fire-and-forget delivery: failures are logged, never surfaced.
fn spawn_best_effort<F>(what: &'static str, task: F)
where
    F: Future<Output = Result<(), NotifyError>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = task.await {
            warn!("{} delivery failed: {}", what, e);
        }
    });
}

fn parse_payload<T: DeserializeOwned>(
    payload: Option<serde_json::Value>,
    context: &str,
) -> Result<T, AppError> {
    let value = payload.ok_or_else(|| {
        AppError::InternalError(format!("{} reply carried no payload", context))
    })?;
    serde_json::from_value(value)
        .map_err(|e| AppError::InternalError(format!("malformed {} payload: {}", context, e)))
}

/// For payloads that only feed best-effort notifications: absent or
/// unreadable data degrades to `None` instead of failing the operation.
fn optional_payload<T: DeserializeOwned>(payload: Option<serde_json::Value>) -> Option<T> {
    payload.and_then(|v| serde_json::from_value(v).ok())
}

fn rejection(reply: ProcedureReply, fallback_code: u16, fallback_message: &str) -> AppError {
    AppError::Rejected {
        code: reply.code_or(fallback_code),
        message: reply.message_or(fallback_message),
        data: reply.data,
    }
}

/// Login rejections shape their payload explicitly so account internals never
/// leak to the client.
fn login_rejection(reply: ProcedureReply) -> AppError {
    let code = reply.code_or(400);
    let message = reply.message_or("Account not registered.");
    let user_data = reply.user_data.unwrap_or_default();

    let data = match code {
        // Unverified account: hand the email back so the client can jump to
        // the verification step.
        403 => Some(json!({ "email": user_data["email"] })),
        // Social-login account without a local password.
        428 => Some(json!({
            "auth_provider": user_data["auth_provider"],
            "name": user_data["name"],
        })),
        _ => None,
    };

    AppError::Rejected { code, message, data }
}
