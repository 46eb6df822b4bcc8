//! Domain types and pure logic for the image relay.
//!
//! No I/O lives here: the upstream client, poller, runners and HTTP facade
//! all build on these types.

pub mod error;
pub mod job;
pub mod polling;
pub mod prompt;
pub mod quota;
pub mod rate_window;
pub mod session;
pub mod types;
