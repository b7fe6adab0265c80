//! Task executors — the browser-driven purchasing flows.

pub mod ride;
pub mod storefront;

pub use ride::RideBookingExecutor;
pub use storefront::StorefrontOrderExecutor;
