// handlers/mod.rs - Route handlers
//
// Public (no auth) → tenant-scoped resources (JWT + tenant context).
// Every tenant-scoped handler takes a TenantContext and hands off to the
// pipeline or a service; handlers hold no query logic of their own.

pub mod attendance;
pub mod auth;
pub mod billing;
pub mod public;
pub mod resources;

use std::collections::HashMap;

use crate::error::ApiError;

/// The `:id` segment from a route that may also carry `:tenant_id`
pub(crate) fn path_id(params: &HashMap<String, String>) -> Result<&str, ApiError> {
    params
        .get("id")
        .map(String::as_str)
        .ok_or_else(|| ApiError::bad_request("missing id"))
}
