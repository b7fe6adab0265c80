//! Storefront order executor.
//!
//! Runs the storefront's cart flow over plain HTTP — product data from the
//! `.js` endpoint, variant selection, cart add, checkout redirect — then hands
//! the checkout URL, the accumulated session cookies, and the form profile
//! across the browser boundary for fill and submission.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::browser::{CheckoutBrowser, CheckoutOutcome, CheckoutProfile, SessionCookie};
use crate::error::Error;
use crate::oracle::Oracle;
use crate::tasks::TaskType;
use crate::worker::{ExecutionError, Executor, TaskContext};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Per-step HTTP retry budget.
const STEP_ATTEMPTS: usize = 5;
const STEP_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct StorefrontOrderInput {
    product_url: String,
    size: String,
}

/// Product payload from the storefront's `/products/<slug>.js` endpoint.
#[derive(Debug, Deserialize)]
struct Product {
    id: u64,
    #[serde(default)]
    variants: Vec<Variant>,
}

#[derive(Debug, Deserialize)]
struct Variant {
    id: u64,
    #[serde(default)]
    title: String,
}

pub struct StorefrontOrderExecutor {
    http: reqwest::Client,
    oracle: Arc<dyn Oracle>,
    browser: Arc<dyn CheckoutBrowser>,
    profile: CheckoutProfile,
}

impl StorefrontOrderExecutor {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        browser: Arc<dyn CheckoutBrowser>,
        profile: CheckoutProfile,
    ) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                Error::Config(crate::error::ConfigError::ParseError(format!(
                    "Failed to build storefront HTTP client: {e}"
                )))
            })?;
        Ok(Self {
            http,
            oracle,
            browser,
            profile,
        })
    }

    /// Send a request, retrying transient failures and unexpected statuses.
    ///
    /// Every response lands in `request_log` as a `url: status` line.
    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
        step: &str,
        request_log: &mut Vec<String>,
    ) -> Result<reqwest::Response, ExecutionError> {
        for attempt in 1..=STEP_ATTEMPTS {
            match build().send().await {
                Ok(resp) => {
                    let status = resp.status();
                    request_log.push(format!("{}: {}", resp.url(), status.as_u16()));
                    if status.is_success() {
                        return Ok(resp);
                    }
                    warn!(step, attempt, status = status.as_u16(), "Unexpected status");
                }
                Err(e) => {
                    warn!(step, attempt, error = %e, "Request failed");
                }
            }
            if attempt < STEP_ATTEMPTS {
                tokio::time::sleep(STEP_BACKOFF).await;
            }
        }
        Err(ExecutionError::retryable(format!(
            "{step} failed after {STEP_ATTEMPTS} attempts"
        )))
    }

    /// Resolve the variant to order, consulting the oracle when the requested
    /// size has no exact title match.
    async fn select_variant<'a>(
        &self,
        ctx: &TaskContext,
        product: &'a Product,
        size: &str,
    ) -> Result<&'a Variant, ExecutionError> {
        if let Some(variant) = find_variant(&product.variants, size) {
            return Ok(variant);
        }

        let available: Vec<String> = product
            .variants
            .iter()
            .map(|v| v.title.clone())
            .collect();
        ctx.progress("No exact size match; consulting size oracle")
            .await;

        let matched = self
            .oracle
            .match_size(size, &available)
            .await
            .map_err(Error::from)?;

        matched
            .as_deref()
            .and_then(|title| find_variant(&product.variants, title))
            .ok_or_else(|| {
                ExecutionError::retryable(format!(
                    "Size '{size}' is not available. Available sizes: {available:?}"
                ))
            })
    }
}

fn find_variant<'a>(variants: &'a [Variant], title: &str) -> Option<&'a Variant> {
    variants.iter().find(|v| v.title.eq_ignore_ascii_case(title))
}

/// Extract the product slug from a product page URL path.
fn product_slug(url: &reqwest::Url) -> Option<&str> {
    url.path()
        .split("/products/")
        .nth(1)
        .map(|rest| rest.trim_end_matches('/'))
        .filter(|slug| !slug.is_empty())
}

/// Parse the name/value pair out of a raw `Set-Cookie` line.
fn parse_set_cookie(raw: &str) -> Option<(String, String)> {
    let first = raw.split(';').next()?;
    let (name, value) = first.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}

/// Fold a response's `Set-Cookie` headers into the session, newest value per
/// name winning.
fn collect_session_cookies(
    resp: &reqwest::Response,
    domain: &str,
    session: &mut Vec<SessionCookie>,
) {
    for header in resp.headers().get_all(reqwest::header::SET_COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        let Some((name, value)) = parse_set_cookie(raw) else {
            continue;
        };
        session.retain(|c| c.name != name);
        session.push(SessionCookie::new(name, value).with_domain(domain));
    }
}

#[async_trait]
impl Executor for StorefrontOrderExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::StorefrontOrder
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<serde_json::Value, ExecutionError> {
        let input: StorefrontOrderInput = ctx.parse_input()?;

        ctx.progress("Starting checkout process").await;

        let product_url = reqwest::Url::parse(&input.product_url)
            .map_err(|e| ExecutionError::retryable(format!("Invalid product URL: {e}")))?;
        let shop_origin = product_url.origin().ascii_serialization();
        let shop_host = product_url
            .host_str()
            .ok_or_else(|| ExecutionError::retryable("Product URL has no host"))?
            .to_string();
        let slug = product_slug(&product_url)
            .ok_or_else(|| ExecutionError::retryable("Not a product URL (missing /products/)"))?;

        let mut request_log = Vec::new();
        let mut session = Vec::new();

        // Product data from the .js endpoint.
        let product_js_url = format!("{shop_origin}/products/{slug}.js");
        let resp = self
            .send_with_retry(
                || self.http.get(&product_js_url),
                "Fetch product data",
                &mut request_log,
            )
            .await?;
        collect_session_cookies(&resp, &shop_host, &mut session);
        let product: Product = resp
            .json()
            .await
            .map_err(|e| ExecutionError::retryable(format!("Invalid product data: {e}")))?;
        ctx.progress(format!("Fetched product data for {slug}")).await;

        let variant = self.select_variant(ctx, &product, &input.size).await?;
        ctx.progress(format!(
            "Selected variant {} (size {})",
            variant.id, variant.title
        ))
        .await;

        // Add to cart.
        let cart_add_url = format!("{shop_origin}/cart/add");
        let form = [
            ("form_type", "product".to_string()),
            ("utf8", "✓".to_string()),
            ("id", variant.id.to_string()),
            ("quantity", "1".to_string()),
            ("product-id", product.id.to_string()),
        ];
        let resp = self
            .send_with_retry(
                || {
                    self.http
                        .post(&cart_add_url)
                        .header(reqwest::header::ACCEPT, "application/javascript")
                        .header("x-requested-with", "XMLHttpRequest")
                        .header(reqwest::header::ORIGIN, shop_origin.clone())
                        .header(reqwest::header::REFERER, product_url.as_str())
                        .form(&form)
                },
                "Add to cart",
                &mut request_log,
            )
            .await?;
        collect_session_cookies(&resp, &shop_host, &mut session);
        ctx.progress("Added to cart").await;

        // Proceed to checkout; the redirect chain ends on the checkout URL.
        let cart_url = format!("{shop_origin}/cart");
        let resp = self
            .send_with_retry(
                || {
                    self.http
                        .post(&cart_url)
                        .header(
                            reqwest::header::CONTENT_TYPE,
                            "application/x-www-form-urlencoded",
                        )
                        .header(reqwest::header::ORIGIN, shop_origin.clone())
                        .header(reqwest::header::REFERER, product_url.as_str())
                        .body("updates[]=1&checkout=")
                },
                "Proceed to checkout",
                &mut request_log,
            )
            .await?;
        collect_session_cookies(&resp, &shop_host, &mut session);
        let checkout_url = resp.url().to_string();
        ctx.progress("Checkout URL generated").await;

        // Form fill and submission happen behind the browser boundary.
        let outcome = self
            .browser
            .submit_checkout(&checkout_url, &session, &self.profile)
            .await
            .map_err(Error::from)?;

        match outcome {
            CheckoutOutcome::Confirmed { details } => {
                ctx.progress("Order confirmed - checked out").await;
                Ok(serde_json::json!({
                    "success": true,
                    "status": "confirmed",
                    "message": "Order confirmed successfully",
                    "order_details": details,
                    "request_log": request_log,
                }))
            }
            CheckoutOutcome::Submitted { details } => {
                ctx.progress("Order processing complete").await;
                Ok(serde_json::json!({
                    "success": true,
                    "message": "Order placed successfully",
                    "order_details": details,
                    "request_log": request_log,
                }))
            }
            CheckoutOutcome::PaymentDeclined { message } => {
                ctx.progress("Payment declined").await;
                Err(ExecutionError::declined(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_extraction() {
        let url =
            reqwest::Url::parse("https://shop.example.com/products/low-top-sneaker?variant=1")
                .unwrap();
        assert_eq!(product_slug(&url), Some("low-top-sneaker"));

        let nested =
            reqwest::Url::parse("https://shop.example.com/collections/all/products/tee/").unwrap();
        assert_eq!(product_slug(&nested), Some("tee"));

        let not_product = reqwest::Url::parse("https://shop.example.com/pages/about").unwrap();
        assert_eq!(product_slug(&not_product), None);
    }

    #[test]
    fn set_cookie_parsing() {
        assert_eq!(
            parse_set_cookie("cart=abc123; Path=/; HttpOnly"),
            Some(("cart".to_string(), "abc123".to_string()))
        );
        assert_eq!(
            parse_set_cookie("secure_session=x=y; Secure"),
            Some(("secure_session".to_string(), "x=y".to_string()))
        );
        assert_eq!(parse_set_cookie("malformed"), None);
        assert_eq!(parse_set_cookie("=orphan; Path=/"), None);
    }

    #[test]
    fn variant_match_is_case_insensitive() {
        let variants = vec![
            Variant {
                id: 1,
                title: "Small".to_string(),
            },
            Variant {
                id: 2,
                title: "7 Wide".to_string(),
            },
        ];
        assert_eq!(find_variant(&variants, "small").unwrap().id, 1);
        assert_eq!(find_variant(&variants, "7 WIDE").unwrap().id, 2);
        assert!(find_variant(&variants, "9").is_none());
    }

    #[test]
    fn product_payload_parses() {
        let raw = r#"{
            "id": 4479716163625,
            "title": "Premier Low Top",
            "variants": [
                {"id": 31881073721385, "title": "7", "price": 14900},
                {"id": 31881073754153, "title": "7.5"}
            ]
        }"#;
        let product: Product = serde_json::from_str(raw).unwrap();
        assert_eq!(product.id, 4479716163625);
        assert_eq!(product.variants.len(), 2);
        assert_eq!(product.variants[0].title, "7");
    }
}
