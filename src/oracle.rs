//! LLM oracle — structured coordinate and size resolution.
//!
//! The worker engine treats this as an external oracle: given text input it
//! returns structured data or fails. Two queries are needed: resolving a pair
//! of street addresses to coordinates, and matching a requested garment size
//! against a product's available variants.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::OracleError;

/// Default model for oracle queries.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Sentinel the size-matching prompt uses for "no such size".
const NOT_AVAILABLE: &str = "NOT_AVAILABLE";

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Resolved pickup and dropoff coordinates for a ride.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RouteCoordinates {
    pub pickup: Coordinates,
    pub dropoff: Coordinates,
}

/// Structured-data oracle consumed by the executors.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Resolve two street addresses into pickup/dropoff coordinates.
    async fn geocode_route(
        &self,
        pickup_address: &str,
        dropoff_address: &str,
    ) -> Result<RouteCoordinates, OracleError>;

    /// Match a requested size against the available variant titles.
    ///
    /// Returns the exact title from `available` when the requested size is
    /// the same size in a different format, `None` when it is genuinely not
    /// available.
    async fn match_size(
        &self,
        requested: &str,
        available: &[String],
    ) -> Result<Option<String>, OracleError>;
}

/// Anthropic Messages API backed oracle.
pub struct AnthropicOracle {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl AnthropicOracle {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Override the model used for oracle queries.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// One-shot completion returning the reply text.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, OracleError> {
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "messages": [{"role": "user", "content": prompt}],
        });

        let resp = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(OracleError::AuthFailed);
        }
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(OracleError::RequestFailed(format!("HTTP {status}: {detail}")));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| OracleError::RequestFailed(format!("Invalid response body: {e}")))?;

        let text = data
            .pointer("/content/0/text")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                OracleError::InvalidAnswer("response carried no text content".to_string())
            })?;

        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl Oracle for AnthropicOracle {
    async fn geocode_route(
        &self,
        pickup_address: &str,
        dropoff_address: &str,
    ) -> Result<RouteCoordinates, OracleError> {
        let prompt = format!(
            r#"Given these two addresses, provide the latitude and longitude coordinates for each:

Pickup address: {pickup_address}
Dropoff address: {dropoff_address}

Return the coordinates in this exact JSON format:
{{
  "pickup": {{
    "latitude": <latitude>,
    "longitude": <longitude>
  }},
  "dropoff": {{
    "latitude": <latitude>,
    "longitude": <longitude>
  }}
}}

Return ONLY the JSON, nothing else. No explanations, no markdown formatting."#
        );

        let answer = self.complete(&prompt, 500).await?;
        parse_route_answer(&answer)
    }

    async fn match_size(
        &self,
        requested: &str,
        available: &[String],
    ) -> Result<Option<String>, OracleError> {
        let prompt = format!(
            r#"You are helping match a user-requested size with available product sizes.

User requested size: "{requested}"
Available sizes: {available:?}

Your task:
1. Check if the user's requested size matches any of the available sizes, but in a different format (e.g., "M" vs "Medium", "7" vs "7.0", "Wide (EE) / 7" vs "7 Wide")
2. If it is the SAME size in a different format, return ONLY the exact string from the available sizes list that matches
3. If it is a DIFFERENT size (not just a format difference), return "{NOT_AVAILABLE}"

Important rules:
- Only return a match if it is the same size in a different format
- If the size does not exist (even in different formats), return "{NOT_AVAILABLE}"
- Return ONLY the exact string from the available sizes, nothing else

Return your response now:"#
        );

        let answer = self.complete(&prompt, 100).await?;
        Ok(verify_size_answer(&answer, available))
    }
}

/// Strip a surrounding markdown code fence, if any.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") up to the first newline.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_route_answer(answer: &str) -> Result<RouteCoordinates, OracleError> {
    serde_json::from_str(strip_code_fences(answer))
        .map_err(|e| OracleError::InvalidAnswer(format!("unparseable coordinates: {e}")))
}

/// Accept the oracle's size answer only if it names an actually-available
/// variant; a sentinel or a hallucinated size both mean "not available".
fn verify_size_answer(answer: &str, available: &[String]) -> Option<String> {
    let answer = strip_code_fences(answer);
    if answer == NOT_AVAILABLE {
        return None;
    }
    available
        .iter()
        .find(|size| size.eq_ignore_ascii_case(answer))
        .cloned()
}
