//! Request middleware.
//!
//! - [`rate_limit::limit_by_client`] -- Per-client fixed-window request budget.

pub mod rate_limit;
