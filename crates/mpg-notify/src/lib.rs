//! mpg-notify
//!
//! Best-effort reload signal to the serving process after a promotion.
//!
//! The alias repoint is the durable effect of a promotion; this signal only
//! shortens the time until the server picks it up. A failed signal is
//! reported as [`NotifyOutcome::Failed`] and logged at WARN, never raised as
//! an error, and never rolls anything back.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of one reload signal (including its optional retry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NotifyOutcome {
    /// No reload URL configured; nothing was sent.
    NotConfigured,
    /// The endpoint answered 2xx.
    Delivered { http_status: u16, attempts: u32 },
    /// Every attempt failed (transport error or non-2xx).
    Failed { reason: String, attempts: u32 },
}

impl NotifyOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, NotifyOutcome::Failed { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyOutcome::NotConfigured => "not_configured",
            NotifyOutcome::Delivered { .. } => "delivered",
            NotifyOutcome::Failed { .. } => "failed",
        }
    }
}

// ---------------------------------------------------------------------------
// Notifier trait
// ---------------------------------------------------------------------------

/// Serving-process reload hook.
pub trait ReloadNotifier: Send + Sync {
    fn notify(&self) -> NotifyOutcome;
}

/// Notifier used when no reload URL is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ReloadNotifier for NoopNotifier {
    fn notify(&self) -> NotifyOutcome {
        NotifyOutcome::NotConfigured
    }
}

// ---------------------------------------------------------------------------
// HTTP notifier
// ---------------------------------------------------------------------------

/// One attempt plus at most one retry after a fixed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry: bool,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry: true,
            delay: Duration::from_millis(1_000),
        }
    }
}

/// POSTs to the serving process reload endpoint.
///
/// The token is sent as `Authorization: Bearer <token>`. Neither the token
/// nor the URL is logged.
#[derive(Clone)]
pub struct HttpReloadNotifier {
    http: Client,
    url: String,
    token: Option<String>,
    policy: RetryPolicy,
}

impl std::fmt::Debug for HttpReloadNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpReloadNotifier")
            .field("token", &self.token.as_ref().map(|_| "REDACTED"))
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl HttpReloadNotifier {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            token,
            policy,
        })
    }

    fn attempt(&self) -> Result<u16, String> {
        let mut req = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(t) = self.token.as_deref() {
            req = req.bearer_auth(t);
        }

        let resp = req.send().map_err(|e| format!("request failed: {}", e.without_url()))?;
        let status = resp.status();
        if status.is_success() {
            Ok(status.as_u16())
        } else {
            Err(format!("http status={}", status.as_u16()))
        }
    }
}

impl ReloadNotifier for HttpReloadNotifier {
    fn notify(&self) -> NotifyOutcome {
        let max_attempts = if self.policy.retry { 2 } else { 1 };
        let mut last_reason = String::new();

        for attempt in 1..=max_attempts {
            match self.attempt() {
                Ok(http_status) => {
                    info!(http_status, attempt, "reload request delivered");
                    return NotifyOutcome::Delivered {
                        http_status,
                        attempts: attempt,
                    };
                }
                Err(reason) => {
                    warn!(attempt, %reason, "reload request failed");
                    last_reason = reason;
                    if attempt < max_attempts {
                        thread::sleep(self.policy.delay);
                    }
                }
            }
        }

        NotifyOutcome::Failed {
            reason: last_reason,
            attempts: max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_reports_not_configured() {
        assert_eq!(NoopNotifier.notify(), NotifyOutcome::NotConfigured);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let v = serde_json::to_value(NotifyOutcome::Delivered {
            http_status: 204,
            attempts: 1,
        })
        .unwrap();
        assert_eq!(
            v,
            serde_json::json!({ "status": "delivered", "http_status": 204, "attempts": 1 })
        );
    }
}
