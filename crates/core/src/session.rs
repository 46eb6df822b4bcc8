//! Authenticated upstream identity.
//!
//! A [`Session`] is established once at process start (via login) and is
//! never mutated afterwards. It is threaded by reference through every
//! upstream call instead of living in global mutable state.

use serde::Serialize;

use crate::error::CoreError;

/// Identity returned by the upstream login plus the locally generated
/// analytics session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: String,
    pub user_handle: String,
    pub org_id: String,
    pub session_id: String,
}

impl Session {
    /// Build a session from the identity fields of a login response.
    ///
    /// Fails with [`CoreError::Auth`] when any identity field is missing or
    /// empty, since no job may run without a complete session.
    pub fn from_login(
        user_id: Option<String>,
        user_handle: Option<String>,
        org_id: Option<String>,
    ) -> Result<Self, CoreError> {
        let user_id = require_field("user_id", user_id)?;
        let user_handle = require_field("display_handle", user_handle)?;
        let org_id = require_field("organization_id", org_id)?;

        Ok(Self {
            user_id,
            user_handle,
            org_id,
            session_id: generate_session_id(),
        })
    }
}

/// Generate an analytics session id of the form `<uuid-v4>_<unix-millis>`.
pub fn generate_session_id() -> String {
    format!(
        "{}_{}",
        uuid::Uuid::new_v4(),
        chrono::Utc::now().timestamp_millis()
    )
}

fn require_field(name: &str, value: Option<String>) -> Result<String, CoreError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CoreError::Auth(format!(
            "login response is missing user_model.{name}"
        ))),
    }
}
