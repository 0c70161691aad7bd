use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::auth::authenticator::AuthenticatedUser;
use crate::auth::cookie::{auth_cookie, clear_auth_cookie, AUTH_COOKIE_NAME};
use crate::auth::issuer::ClientMetadata;
use crate::error::AppError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub lastname: String,
    pub email: String,
    pub password: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Resolves the caller's identity from the auth cookie, or denies.
async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<AuthenticatedUser, AppError> {
    let cookie = req.cookie(AUTH_COOKIE_NAME);
    let identity = state
        .authenticator
        .authenticate(cookie.as_ref().map(|c| c.value()))
        .await?;
    Ok(identity)
}

fn client_metadata(req: &HttpRequest) -> ClientMetadata {
    ClientMetadata {
        user_agent: req
            .headers()
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        ip_address: req
            .connection_info()
            .realip_remote_addr()
            .map(str::to_string),
    }
}

pub async fn login(
    req: HttpRequest,
    body: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("login request for {}", body.email);

    let meta = client_metadata(&req);
    let outcome = state.auth.login(&body.email, &body.password, meta).await?;

    let hours = state.config.auth.session_duration_hours;
    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(&outcome.session.token, hours))
        .json(json!({
            "status": "success",
            "code": 200,
            "message": "Login successful.",
            "user": outcome.user,
        })))
}

pub async fn register(
    body: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("registration request for {}", body.email);

    let outcome = state
        .auth
        .register(
            &body.name,
            &body.lastname,
            &body.email,
            &body.password,
            body.phone_number.as_deref(),
        )
        .await?;

    Ok(HttpResponse::Created().json(json!({
        "status": "success",
        "code": outcome.code,
        "message": outcome.message,
        "data": { "email": outcome.email },
    })))
}

pub async fn verify_email(
    req: HttpRequest,
    body: web::Json<VerifyEmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("email verification attempt for {}", body.email);

    let meta = client_metadata(&req);
    let outcome = state
        .auth
        .verify_email_and_login(&body.email, &body.code, meta)
        .await?;

    let hours = state.config.auth.session_duration_hours;
    Ok(HttpResponse::Ok()
        .cookie(auth_cookie(&outcome.session.token, hours))
        .json(json!({
            "status": "success",
            "code": 200,
            "message": outcome.message,
            "user": outcome.user,
        })))
}

pub async fn resend_code(
    body: web::Json<EmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let outcome = state.auth.resend_verification_code(&body.email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "code": outcome.code,
        "message": outcome.message,
        "data": { "email": outcome.email },
    })))
}

pub async fn request_password_reset(
    body: web::Json<EmailRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("password reset requested for {}", body.email);

    let message = state.auth.request_password_reset(&body.email).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "code": 200,
        "message": message,
    })))
}

pub async fn verify_reset_code(
    body: web::Json<ResetCodeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let email = state
        .auth
        .verify_password_reset_code(&body.email, &body.code)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "code": 200,
        "message": "Reset code validated. You can now set a new password.",
        "data": { "email": email },
    })))
}

pub async fn confirm_password_reset(
    body: web::Json<ResetPasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (code, message) = state
        .auth
        .reset_password_with_code(&body.email, &body.code, &body.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "code": code,
        "message": message,
    })))
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let identity = authenticate(&req, &state).await?;
    state.auth.logout(identity.session_id).await?;

    Ok(HttpResponse::Ok()
        .cookie(clear_auth_cookie())
        .json(json!({
            "status": "success",
            "code": 200,
            "message": "Signed out.",
        })))
}

pub async fn account_overview(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let identity = authenticate(&req, &state).await?;
    let data = state.auth.account_overview(identity.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "code": 200,
        "message": "Account overview loaded.",
        "data": data,
        "is_active": identity.is_active,
    })))
}
