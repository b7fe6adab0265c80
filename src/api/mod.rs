//! HTTP surface — thin translation onto the task store and side services.

pub mod model;
pub mod routes;

pub use routes::{api_routes, ApiState};
