//! Storefront product search.
//!
//! Finds candidate product pages through the Exa search API, then keeps only
//! URLs that look like product pages on stores actually running the
//! storefront platform (verified by response headers, cached per store).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::error::SearchError;

const SEARCH_URL: &str = "https://api.exa.ai/search";

/// Over-fetch factor: most raw results are filtered out as non-product or
/// non-storefront URLs.
const OVERSAMPLE: usize = 50;

const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct SearchReply {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    url: String,
}

/// Exa-backed product search client.
pub struct ProductSearch {
    http: reqwest::Client,
    api_key: SecretString,
}

impl ProductSearch {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Search for product page URLs matching `query`.
    pub async fn search_products(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<String>, SearchError> {
        let clean = clean_query(query);
        debug!(query = %clean, "Searching for products");

        let body = serde_json::json!({
            "query": clean,
            "num_results": OVERSAMPLE,
            "type": "neural",
            "use_autoprompt": true,
        });

        let resp = self
            .http
            .post(SEARCH_URL)
            .header("x-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(SearchError::RequestFailed(format!(
                "HTTP {status}: {detail}"
            )));
        }

        let reply: SearchReply = resp
            .json()
            .await
            .map_err(|e| SearchError::InvalidResponse(e.to_string()))?;

        let mut product_urls = Vec::new();
        let mut seen = HashSet::new();
        let mut verified_stores: HashMap<String, bool> = HashMap::new();

        for hit in reply.results {
            if !hit.url.to_lowercase().contains("/products/") {
                continue;
            }
            let clean_url = normalize_url(&hit.url);
            if !seen.insert(clean_url.clone()) {
                continue;
            }
            let Some(origin) = origin_of(&clean_url) else {
                continue;
            };

            let verified = match verified_stores.get(&origin) {
                Some(verified) => *verified,
                None => {
                    let verified = self.is_storefront(&origin).await;
                    verified_stores.insert(origin, verified);
                    verified
                }
            };

            if verified {
                product_urls.push(clean_url);
                if product_urls.len() >= num_results {
                    break;
                }
            }
        }

        debug!(count = product_urls.len(), "Verified product URLs");
        Ok(product_urls)
    }

    /// Check whether a store origin runs the storefront platform.
    ///
    /// HEAD first (cheaper), GET as a fallback for stores that reject HEAD.
    /// Unverifiable stores are treated as non-matches.
    async fn is_storefront(&self, origin: &str) -> bool {
        let resp = match self
            .http
            .head(origin)
            .timeout(VERIFY_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => Some(resp),
            Err(_) => self
                .http
                .get(origin)
                .timeout(VERIFY_TIMEOUT)
                .send()
                .await
                .ok(),
        };

        resp.map(|r| headers_mark_storefront(r.headers()))
            .unwrap_or(false)
    }
}

/// Strip the platform name out of the query; the platform filter happens by
/// header verification, and the literal word only skews the search.
fn clean_query(query: &str) -> String {
    query
        .replace("shopify", " ")
        .replace("Shopify", " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop query string and fragment.
fn normalize_url(url: &str) -> String {
    url.split(['?', '#']).next().unwrap_or(url).to_string()
}

fn origin_of(url: &str) -> Option<String> {
    reqwest::Url::parse(url)
        .ok()
        .map(|u| u.origin().ascii_serialization())
}

fn headers_mark_storefront(headers: &reqwest::header::HeaderMap) -> bool {
    if headers
        .get("powered-by")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Shopify")
    {
        return true;
    }
    headers
        .keys()
        .any(|k| k.as_str().starts_with("x-shopify-"))
}
