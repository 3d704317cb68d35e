//! Account session and access-token lifecycle.
//!
//! A session is created per run and never persisted. The manager checks the
//! current account context, fetches a scoped access token, tracks its expiry
//! against local time, and forces exactly one device-code re-login when the
//! context is missing or the token has expired.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{AppError, AuthError, ProviderError};
use crate::provider::CloudCli;

/// Timestamp layout used by `account get-access-token` for `expiresOn`,
/// after fractional seconds are stripped.
const EXPIRES_ON_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// An authenticated provider session.
#[derive(Debug, Clone)]
pub struct Session {
    pub access_token: String,
    /// Expiry in local time, second precision.
    pub expires_on: NaiveDateTime,
    pub tenant_id: String,
    pub subscription_id: String,
}

impl Session {
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.expires_on <= now
    }

    /// Remaining validity; zero once expired.
    pub fn remaining(&self, now: NaiveDateTime) -> Duration {
        if self.is_expired(now) {
            Duration::zero()
        } else {
            self.expires_on - now
        }
    }
}

/// Parse an `expiresOn` timestamp, stripping fractional seconds first.
pub fn parse_expires_on(raw: &str) -> Result<NaiveDateTime, ProviderError> {
    let trimmed = raw.split('.').next().unwrap_or(raw).trim();
    NaiveDateTime::parse_from_str(trimmed, EXPIRES_ON_FORMAT)
        .map_err(|_| ProviderError::BadTimestamp(raw.to_string()))
}

/// Build a [`Session`] from the `account show` and `account get-access-token`
/// payloads. Pure: a malformed payload produces an error and leaves any
/// previously held session untouched.
pub fn session_from_parts(account: &Value, token: &Value) -> Result<Session, ProviderError> {
    let access_token = token
        .get("accessToken")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::missing_field("account get-access-token", "accessToken"))?;

    let raw_expiry = token
        .get("expiresOn")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::missing_field("account get-access-token", "expiresOn"))?;
    let expires_on = parse_expires_on(raw_expiry)?;

    let tenant_id = token
        .get("tenant")
        .and_then(Value::as_str)
        .or_else(|| account.get("tenantId").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let subscription_id = token
        .get("subscription")
        .and_then(Value::as_str)
        .or_else(|| account.get("id").and_then(Value::as_str))
        .ok_or_else(|| ProviderError::missing_field("account show", "id"))?
        .to_string();

    Ok(Session {
        access_token: access_token.to_string(),
        expires_on,
        tenant_id,
        subscription_id,
    })
}

/// Format remaining validity as hours/minutes/seconds for operator display.
pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Manages the provider session for a run.
pub struct SessionManager {
    cli: Arc<dyn CloudCli>,
    audience: String,
}

impl SessionManager {
    pub fn new(cli: Arc<dyn CloudCli>, audience: impl Into<String>) -> Self {
        Self {
            cli,
            audience: audience.into(),
        }
    }

    /// Establish a valid session, logging in at most once more when the
    /// existing context is missing or the token has expired.
    ///
    /// Side effect: selects the session's subscription as the active context
    /// for all subsequent provider calls.
    pub async fn ensure_session(&self) -> Result<Session, AppError> {
        let account = match self.cli.invoke(&["account", "show"]).await {
            Ok(account) => account,
            Err(e) if e.is_auth_error() => {
                warn!("No active account context, starting device-code login");
                self.login().await?;
                self.cli
                    .invoke(&["account", "show"])
                    .await
                    .map_err(|e| AuthError::AccountUnavailable(e.to_string()))?
            }
            Err(e) => return Err(e.into()),
        };

        let mut session = self.fetch_token(&account).await?;

        let now = Local::now().naive_local();
        if session.is_expired(now) {
            warn!(
                "Access token expired at {}, re-authenticating",
                session.expires_on
            );
            self.login().await?;
            session = self
                .fetch_token(&account)
                .await
                .map_err(|e| AuthError::AccountUnavailable(e.to_string()))?;
        }

        self.cli
            .invoke(&["account", "set", "--subscription", &session.subscription_id])
            .await?;

        debug!("Acquired access token of {} bytes", session.access_token.len());
        info!(
            "Session for tenant {} / subscription {} valid for {}",
            session.tenant_id,
            session.subscription_id,
            format_remaining(session.remaining(Local::now().naive_local()))
        );

        Ok(session)
    }

    async fn fetch_token(&self, account: &Value) -> Result<Session, AppError> {
        let token = self
            .cli
            .invoke(&["account", "get-access-token", "--resource", &self.audience])
            .await?;
        Ok(session_from_parts(account, &token)?)
    }

    async fn login(&self) -> Result<(), AuthError> {
        self.cli
            .invoke_interactive(&["login", "--use-device-code"])
            .await
            .map_err(|e| AuthError::LoginFailed(e.to_string()))?;
        Ok(())
    }
}
