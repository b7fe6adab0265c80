//! Remote browser agent client.
//!
//! Production implementation of the browser traits: both operations are
//! delegated over HTTP to a companion automation agent that owns the actual
//! page driving. Requests carry the target URL, the farmed session, and (for
//! checkout) the form profile; replies come back as business-level statuses.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::browser::{
    CheckoutBrowser, CheckoutOutcome, CheckoutProfile, RideBrowser, RideOutcome, SessionCookie,
};
use crate::error::BrowserError;

/// Browser steps run for minutes (page loads, payment rails); give each call
/// a generous ceiling rather than reqwest's default.
const STEP_TIMEOUT: Duration = Duration::from_secs(900);

/// HTTP client for the automation agent.
pub struct RemoteBrowser {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteBrowser {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        step: &str,
        body: &serde_json::Value,
    ) -> Result<T, BrowserError> {
        let url = format!("{}/{step}", self.base_url);
        let resp = self
            .http
            .post(&url)
            .timeout(STEP_TIMEOUT)
            .json(body)
            .send()
            .await
            .map_err(|e| BrowserError::AgentUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(BrowserError::StepFailed {
                step: step.to_string(),
                reason: format!("HTTP {status}: {detail}"),
            });
        }

        resp.json().await.map_err(|e| BrowserError::StepFailed {
            step: step.to_string(),
            reason: format!("Invalid reply: {e}"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RideStepReply {
    status: String,
    #[serde(default)]
    session: Vec<SessionCookie>,
}

#[derive(Debug, Deserialize)]
struct CheckoutStepReply {
    status: String,
    #[serde(default)]
    details: serde_json::Value,
    #[serde(default)]
    message: Option<String>,
}

fn parse_ride_reply(reply: RideStepReply) -> Result<RideOutcome, BrowserError> {
    match reply.status.as_str() {
        "requested" => Ok(RideOutcome::Requested {
            refreshed_session: reply.session,
        }),
        "payment_declined" => Ok(RideOutcome::PaymentDeclined),
        other => Err(BrowserError::StepFailed {
            step: "ride".to_string(),
            reason: format!("unexpected status '{other}'"),
        }),
    }
}

fn parse_checkout_reply(reply: CheckoutStepReply) -> Result<CheckoutOutcome, BrowserError> {
    match reply.status.as_str() {
        "confirmed" => Ok(CheckoutOutcome::Confirmed {
            details: reply.details,
        }),
        "submitted" => Ok(CheckoutOutcome::Submitted {
            details: reply.details,
        }),
        "payment_declined" => Ok(CheckoutOutcome::PaymentDeclined {
            message: reply
                .message
                .unwrap_or_else(|| "Your card was declined".to_string()),
        }),
        other => Err(BrowserError::StepFailed {
            step: "checkout".to_string(),
            reason: format!("unexpected status '{other}'"),
        }),
    }
}

#[async_trait]
impl RideBrowser for RemoteBrowser {
    async fn request_ride(
        &self,
        deep_link: &str,
        session: &[SessionCookie],
    ) -> Result<RideOutcome, BrowserError> {
        let body = serde_json::json!({
            "deep_link": deep_link,
            "session": session,
        });
        let reply: RideStepReply = self.call("ride", &body).await?;
        parse_ride_reply(reply)
    }
}

#[async_trait]
impl CheckoutBrowser for RemoteBrowser {
    async fn submit_checkout(
        &self,
        checkout_url: &str,
        session: &[SessionCookie],
        profile: &CheckoutProfile,
    ) -> Result<CheckoutOutcome, BrowserError> {
        let body = serde_json::json!({
            "checkout_url": checkout_url,
            "session": session,
            "profile": profile,
        });
        let reply: CheckoutStepReply = self.call("checkout", &body).await?;
        parse_checkout_reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ride_reply_statuses() {
        let reply = RideStepReply {
            status: "requested".to_string(),
            session: vec![SessionCookie::new("sid", "v")],
        };
        match parse_ride_reply(reply).unwrap() {
            RideOutcome::Requested { refreshed_session } => {
                assert_eq!(refreshed_session.len(), 1)
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let declined = RideStepReply {
            status: "payment_declined".to_string(),
            session: vec![],
        };
        assert!(matches!(
            parse_ride_reply(declined).unwrap(),
            RideOutcome::PaymentDeclined
        ));

        let bogus = RideStepReply {
            status: "on_fire".to_string(),
            session: vec![],
        };
        assert!(parse_ride_reply(bogus).is_err());
    }

    #[test]
    fn checkout_reply_statuses() {
        let reply = CheckoutStepReply {
            status: "confirmed".to_string(),
            details: serde_json::json!({"order": 1}),
            message: None,
        };
        assert!(matches!(
            parse_checkout_reply(reply).unwrap(),
            CheckoutOutcome::Confirmed { .. }
        ));

        let declined = CheckoutStepReply {
            status: "payment_declined".to_string(),
            details: serde_json::Value::Null,
            message: None,
        };
        match parse_checkout_reply(declined).unwrap() {
            CheckoutOutcome::PaymentDeclined { message } => {
                assert_eq!(message, "Your card was declined")
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn base_url_trailing_slash_normalized() {
        let browser = RemoteBrowser::new("http://127.0.0.1:8700/");
        assert_eq!(browser.base_url, "http://127.0.0.1:8700");
    }
}
