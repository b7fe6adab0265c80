//! Browser automation boundary — the opaque "drive the page" capability.
//!
//! The worker engine never touches selectors or pages; executors hand a URL,
//! a farmed session, and (for checkout) a form profile across these traits
//! and get a business-level outcome back.

pub mod remote;
pub mod session;

pub use remote::RemoteBrowser;
pub use session::{SessionCookie, SessionStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BrowserError;

/// Contact, shipping and payment fields for checkout form fill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutProfile {
    pub email: String,
    pub country_region: String,
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    #[serde(default)]
    pub suite_apt: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub phone: String,
    pub card_number: String,
    pub expiry: String,
    pub cvv: String,
}

impl CheckoutProfile {
    /// Load a profile from a JSON file.
    pub async fn load(path: &std::path::Path) -> Result<Self, BrowserError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            BrowserError::SessionFile(format!(
                "Failed to read checkout profile {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            BrowserError::SessionFile(format!(
                "Invalid checkout profile {}: {e}",
                path.display()
            ))
        })
    }
}

/// Outcome of driving the ride request page.
#[derive(Debug, Clone)]
pub enum RideOutcome {
    /// The trip was requested; the (possibly refreshed) session is returned
    /// for persistence.
    Requested {
        refreshed_session: Vec<SessionCookie>,
    },
    /// The provider rejected the payment — a definitive answer.
    PaymentDeclined,
}

/// Outcome of driving the checkout page.
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// Order confirmed by the storefront.
    Confirmed { details: serde_json::Value },
    /// Checkout submitted; confirmation not (yet) observed.
    Submitted { details: serde_json::Value },
    /// Card declined — a definitive answer.
    PaymentDeclined { message: String },
}

/// Drives the ride-hailing web app for one trip request.
#[async_trait]
pub trait RideBrowser: Send + Sync {
    async fn request_ride(
        &self,
        deep_link: &str,
        session: &[SessionCookie],
    ) -> Result<RideOutcome, BrowserError>;
}

/// Drives a storefront checkout page through form fill and submission.
#[async_trait]
pub trait CheckoutBrowser: Send + Sync {
    async fn submit_checkout(
        &self,
        checkout_url: &str,
        session: &[SessionCookie],
        profile: &CheckoutProfile,
    ) -> Result<CheckoutOutcome, BrowserError>;
}
