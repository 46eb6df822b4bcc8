//! Per-call correlation tokens attached to every upstream request.
//!
//! Both values are opaque to the upstream's business logic; they only let
//! its logs be matched with ours.

use rand::Rng;

/// Fresh `x-request-id` value: a UUID v4 rendered without hyphens.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Fresh W3C `traceparent` header: version `00`, random 16-byte trace id,
/// random 8-byte parent id, `sampled` flag set.
pub fn new_traceparent() -> String {
    let mut trace_id = [0u8; 16];
    let mut parent_id = [0u8; 8];
    let mut rng = rand::rng();
    rng.fill(&mut trace_id);
    rng.fill(&mut parent_id);

    format!("00-{}-{}-01", to_hex(&trace_id), to_hex(&parent_id))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
