//! Client library for the upstream image-generation service.
//!
//! Provides the typed wire messages, an HTTP wrapper around the four
//! upstream endpoints, the [`client::UpstreamClient`] contract used by the
//! rest of the relay, and the [`poller::Poller`] that waits for a
//! generation to finish.

pub mod api;
pub mod client;
pub mod correlation;
pub mod messages;
pub mod poller;
