//! Ride booking executor.
//!
//! Resolves the pickup/dropoff addresses to coordinates through the oracle,
//! builds the ride-hailing web app's deep link, and drives the request page
//! through the browser boundary using a previously farmed session.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::browser::{RideBrowser, RideOutcome, SessionStore};
use crate::error::{BrowserError, Error};
use crate::oracle::{Oracle, RouteCoordinates};
use crate::tasks::TaskType;
use crate::worker::{ExecutionError, Executor, TaskContext};

/// Session file key for the ride provider.
const SESSION_PROVIDER: &str = "uber";

/// The provider's trip-request page; coordinates ride in as query params.
const DEEP_LINK_BASE: &str = "https://m.uber.com/looking";

#[derive(Debug, Deserialize)]
struct RideBookingInput {
    from_address: String,
    to_address: String,
}

pub struct RideBookingExecutor {
    oracle: Arc<dyn Oracle>,
    browser: Arc<dyn RideBrowser>,
    sessions: Arc<SessionStore>,
}

impl RideBookingExecutor {
    pub fn new(
        oracle: Arc<dyn Oracle>,
        browser: Arc<dyn RideBrowser>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            oracle,
            browser,
            sessions,
        }
    }
}

/// Build the trip-request deep link for a resolved route.
///
/// Each endpoint is a compact JSON coordinate object carried form-encoded in
/// the query string.
fn deep_link(route: &RouteCoordinates) -> Result<String, ExecutionError> {
    let pickup = serde_json::json!({
        "latitude": route.pickup.latitude,
        "longitude": route.pickup.longitude,
    })
    .to_string();
    let dropoff = serde_json::json!({
        "latitude": route.dropoff.latitude,
        "longitude": route.dropoff.longitude,
    })
    .to_string();

    let mut url = reqwest::Url::parse(DEEP_LINK_BASE)
        .map_err(|e| ExecutionError::retryable(format!("Invalid deep link base: {e}")))?;
    url.query_pairs_mut()
        .append_pair("pickup", &pickup)
        .append_pair("drop[0]", &dropoff);
    Ok(url.to_string())
}

#[async_trait]
impl Executor for RideBookingExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::RideBooking
    }

    async fn execute(&self, ctx: &TaskContext) -> Result<serde_json::Value, ExecutionError> {
        let input: RideBookingInput = ctx.parse_input()?;

        ctx.progress("Starting ride booking").await;

        let route = self
            .oracle
            .geocode_route(&input.from_address, &input.to_address)
            .await
            .map_err(Error::from)?;
        let ride_url = deep_link(&route)?;
        ctx.progress("Generated trip request link").await;

        let session = self.sessions.load(SESSION_PROVIDER).await;
        if session.is_empty() {
            // Sessions are farmed out-of-band; without one the page lands on
            // a login wall. Retryable so the task survives until a session
            // shows up or the retry budget runs out.
            return Err(Error::Browser(BrowserError::NoSession {
                provider: SESSION_PROVIDER.to_string(),
            })
            .into());
        }

        ctx.progress("Driving trip request page").await;
        let outcome = self
            .browser
            .request_ride(&ride_url, &session)
            .await
            .map_err(Error::from)?;

        match outcome {
            RideOutcome::Requested { refreshed_session } => {
                if !refreshed_session.is_empty() {
                    if let Err(e) = self.sessions.save(SESSION_PROVIDER, &refreshed_session).await {
                        warn!(task = %ctx.task_id, error = %e, "Failed to save refreshed session");
                    }
                }
                ctx.progress("Ride requested").await;
                Ok(serde_json::json!({
                    "success": true,
                    "message": "Ride booking process completed",
                    "ride_url": ride_url,
                }))
            }
            RideOutcome::PaymentDeclined => {
                ctx.progress("Payment declined").await;
                Err(ExecutionError::declined("Payment was declined"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::SessionCookie;
    use crate::error::OracleError;
    use crate::oracle::Coordinates;
    use crate::store::{LibSqlStore, TaskStore};

    struct FixedOracle;

    #[async_trait]
    impl Oracle for FixedOracle {
        async fn geocode_route(
            &self,
            _pickup: &str,
            _dropoff: &str,
        ) -> Result<RouteCoordinates, OracleError> {
            Ok(RouteCoordinates {
                pickup: Coordinates {
                    latitude: 37.7749,
                    longitude: -122.4194,
                },
                dropoff: Coordinates {
                    latitude: 37.8044,
                    longitude: -122.2712,
                },
            })
        }

        async fn match_size(
            &self,
            _requested: &str,
            _available: &[String],
        ) -> Result<Option<String>, OracleError> {
            unreachable!("ride booking never matches sizes")
        }
    }

    struct ScriptedBrowser {
        declined: bool,
    }

    #[async_trait]
    impl RideBrowser for ScriptedBrowser {
        async fn request_ride(
            &self,
            _deep_link: &str,
            _session: &[SessionCookie],
        ) -> Result<RideOutcome, crate::error::BrowserError> {
            if self.declined {
                Ok(RideOutcome::PaymentDeclined)
            } else {
                Ok(RideOutcome::Requested {
                    refreshed_session: vec![SessionCookie::new("sid", "fresh")],
                })
            }
        }
    }

    async fn test_ctx() -> (Arc<LibSqlStore>, TaskContext) {
        let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
        let input = serde_json::json!({
            "from_address": "1 Main St, Fremont CA",
            "to_address": "2 Oak Ave, Oakland CA",
        });
        let task = store
            .create(TaskType::RideBooking, input.clone(), 3)
            .await
            .unwrap();
        let ctx = TaskContext::new(task.id, input, store.clone());
        (store, ctx)
    }

    async fn farmed_sessions() -> (tempfile::TempDir, Arc<SessionStore>) {
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(SessionStore::new(dir.path()));
        sessions
            .save("uber", &[SessionCookie::new("sid", "farmed")])
            .await
            .unwrap();
        (dir, sessions)
    }

    #[test]
    fn deep_link_encodes_coordinates() {
        let route = RouteCoordinates {
            pickup: Coordinates {
                latitude: 37.7749,
                longitude: -122.4194,
            },
            dropoff: Coordinates {
                latitude: 37.8044,
                longitude: -122.2712,
            },
        };
        let url = deep_link(&route).unwrap();
        assert!(url.starts_with("https://m.uber.com/looking?"));
        assert!(url.contains("pickup=%7B%22latitude%22%3A37.7749"));
        assert!(url.contains("drop%5B0%5D=%7B%22latitude%22%3A37.8044"));
    }

    #[tokio::test]
    async fn successful_booking_saves_refreshed_session() {
        let (_store, ctx) = test_ctx().await;
        let (dir, sessions) = farmed_sessions().await;

        let executor = RideBookingExecutor::new(
            Arc::new(FixedOracle),
            Arc::new(ScriptedBrowser { declined: false }),
            sessions.clone(),
        );

        let result = executor.execute(&ctx).await.unwrap();
        assert_eq!(result["success"], serde_json::json!(true));
        assert!(result["ride_url"]
            .as_str()
            .unwrap()
            .starts_with("https://m.uber.com/looking?"));

        let refreshed = sessions.load("uber").await;
        assert_eq!(refreshed[0].value, "fresh");
        drop(dir);
    }

    #[tokio::test]
    async fn declined_payment_is_non_retryable() {
        let (_store, ctx) = test_ctx().await;
        let (_dir, sessions) = farmed_sessions().await;

        let executor = RideBookingExecutor::new(
            Arc::new(FixedOracle),
            Arc::new(ScriptedBrowser { declined: true }),
            sessions,
        );

        match executor.execute(&ctx).await {
            Err(ExecutionError::Declined { reason }) => {
                assert_eq!(reason, "Payment was declined")
            }
            other => panic!("expected declined, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_session_is_retryable() {
        let (_store, ctx) = test_ctx().await;
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(SessionStore::new(dir.path()));

        let executor = RideBookingExecutor::new(
            Arc::new(FixedOracle),
            Arc::new(ScriptedBrowser { declined: false }),
            sessions,
        );

        assert!(matches!(
            executor.execute(&ctx).await,
            Err(ExecutionError::Retryable(_))
        ));
    }
}
