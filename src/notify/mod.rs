//! Outbound verification/reset-code notifications.
//!
//! Delivery is best-effort by design: callers spawn these sends in the
//! background and only log failures. A lost notification never blocks or
//! fails the primary response.

use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("delivery rejected: {0}")]
    Rejected(String),
}

pub struct Notifier {
    client: reqwest::Client,
    config: NotifyConfig,
}

impl Notifier {
    pub fn new(config: NotifyConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    pub async fn send_email_verification_code(
        &self,
        to: &str,
        code: &str,
    ) -> Result<(), NotifyError> {
        let subject = "Your verification code";
        let html = format!(
            "<p>Welcome! Your verification code is:</p>\
             <p><strong style=\"font-size:1.5em\">{code}</strong></p>\
             <p>The code expires shortly. If you did not create an account, ignore this message.</p>"
        );
        self.send_email(to, subject, &html).await
    }

    pub async fn send_whatsapp_verification_code(
        &self,
        to: &str,
        code: &str,
    ) -> Result<(), NotifyError> {
        let body = format!("Your verification code is: {code}");
        self.send_whatsapp(to, &body).await
    }

    pub async fn send_email_password_reset_code(
        &self,
        to: &str,
        name: Option<&str>,
        code: &str,
    ) -> Result<(), NotifyError> {
        let greeting = name.map_or_else(|| "Hello".to_string(), |n| format!("Hello {n}"));
        let subject = "Your password reset code";
        let html = format!(
            "<p>{greeting},</p>\
             <p>Your password reset code is:</p>\
             <p><strong style=\"font-size:1.5em\">{code}</strong></p>\
             <p>If you did not request a reset, ignore this message.</p>"
        );
        self.send_email(to, subject, &html).await
    }

    pub async fn send_whatsapp_password_reset_code(
        &self,
        to: &str,
        name: Option<&str>,
        code: &str,
    ) -> Result<(), NotifyError> {
        let greeting = name.map_or_else(|| "Hello".to_string(), |n| format!("Hello {n}"));
        let body = format!("{greeting}, your password reset code is: {code}");
        self.send_whatsapp(to, &body).await
    }

    async fn send_email(&self, to: &str, subject: &str, html: &str) -> Result<(), NotifyError> {
        if !self.config.enabled {
            debug!("notifications disabled, skipping email to {}", to);
            return Ok(());
        }

        let response = self
            .client
            .post(&self.config.email_endpoint)
            .json(&json!({
                "from": self.config.email_from,
                "to": to,
                "subject": subject,
                "html": html,
            }))
            .send()
            .await?;

        if response.status().is_success() {
            info!("email dispatched to {}", to);
            Ok(())
        } else {
            Err(NotifyError::Rejected(format!(
                "email relay returned {}",
                response.status()
            )))
        }
    }

    /// Sends via the primary message service; falls back to the backup
    /// provider when the primary fails and a backup is configured.
    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        if !self.config.enabled {
            debug!("notifications disabled, skipping whatsapp to {}", to);
            return Ok(());
        }

        match self.send_whatsapp_primary(to, body).await {
            Ok(()) => Ok(()),
            Err(primary_err) => {
                if self.config.whatsapp_backup_url.is_empty() {
                    return Err(primary_err);
                }
                warn!(
                    "primary whatsapp service failed ({}), trying backup",
                    primary_err
                );
                self.send_whatsapp_backup(to, body).await
            }
        }
    }

    async fn send_whatsapp_primary(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.config.whatsapp_primary_url)
            .json(&json!({ "to": to, "body": body }))
            .send()
            .await?;

        let status = response.status();
        let reply: serde_json::Value = response.json().await.unwrap_or_default();

        if status.is_success() && reply["success"].as_bool().unwrap_or(false) {
            info!("whatsapp message delivered to primary service");
            Ok(())
        } else {
            Err(NotifyError::Rejected(format!(
                "primary service returned {} ({})",
                status,
                reply["message"].as_str().unwrap_or("unknown")
            )))
        }
    }

    async fn send_whatsapp_backup(&self, to: &str, body: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.config.whatsapp_backup_url)
            .form(&[
                ("token", self.config.whatsapp_backup_token.as_str()),
                ("to", to),
                ("body", body),
            ])
            .send()
            .await?;

        if response.status().is_success() {
            info!("whatsapp message delivered via backup service");
            Ok(())
        } else {
            Err(NotifyError::Rejected(format!(
                "backup service returned {}",
                response.status()
            )))
        }
    }
}
