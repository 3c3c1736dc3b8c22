use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::validate_jwt;
use crate::error::ApiError;
use crate::tenancy::CallerIdentity;

/// Decode an optional bearer token into a [`CallerIdentity`] request extension.
///
/// Requests without an `Authorization` header pass through anonymously so public
/// routes keep working; a header that is present but invalid is rejected with 401.
pub async fn jwt_auth_middleware(mut request: Request, next: Next) -> Response {
    let token = match extract_jwt_from_headers(request.headers()) {
        Ok(Some(token)) => token,
        Ok(None) => return next.run(request).await,
        Err(msg) => return ApiError::unauthorized(msg).into_response(),
    };

    match validate_jwt(&token) {
        Ok(claims) => {
            let caller = CallerIdentity::from(claims);
            tracing::debug!(user_id = %caller.user_id, "authenticated request");
            request.extensions_mut().insert(caller);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!("rejected token: {}", e);
            ApiError::unauthorized("Invalid or expired token").into_response()
        }
    }
}

/// Bearer token from the Authorization header, `None` when the header is absent
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<Option<String>, String> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err("Empty JWT token".to_string()),
        None => Err("Authorization header must use Bearer token format".to_string()),
    }
}
