use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::pagination::Pagination;

/// Uniform success envelope: `{message, data, include?, pagination?}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub message: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip)]
    pub status_code: Option<StatusCode>,
}

impl ApiResponse {
    /// Create a 200 response around arbitrary serializable data
    pub fn success<T: Serialize>(message: impl Into<String>, data: T) -> Result<Self, ApiError> {
        let data = serde_json::to_value(data).map_err(|e| {
            tracing::error!("Failed to serialize response data: {}", e);
            ApiError::internal_server_error("Failed to serialize response data")
        })?;
        Ok(Self {
            message: message.into(),
            data,
            include: None,
            pagination: None,
            status_code: None,
        })
    }

    /// A page of rows from a list endpoint
    pub fn list(
        message: impl Into<String>,
        items: Vec<Map<String, Value>>,
        include: Option<Map<String, Value>>,
        pagination: Pagination,
    ) -> Self {
        Self {
            message: message.into(),
            data: Value::Array(items.into_iter().map(Value::Object).collect()),
            include,
            pagination: Some(pagination),
            status_code: None,
        }
    }

    /// A single row, optionally with its include block
    pub fn item(message: impl Into<String>, item: Map<String, Value>, include: Option<Map<String, Value>>) -> Self {
        Self {
            message: message.into(),
            data: Value::Object(item),
            include,
            pagination: None,
            status_code: None,
        }
    }

    pub fn with_status(mut self, status_code: StatusCode) -> Self {
        self.status_code = Some(status_code);
        self
    }

    /// Create a 201 Created response
    pub fn created(self) -> Self {
        self.with_status(StatusCode::CREATED)
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status = self.status_code.unwrap_or(StatusCode::OK);
        match serde_json::to_value(&self) {
            Ok(envelope) => (status, Json(envelope)).into_response(),
            Err(e) => {
                tracing::error!("Failed to serialize response envelope: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Failed to serialize response data", "code": "INTERNAL_SERVER_ERROR"})),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult = Result<ApiResponse, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_omits_absent_include() {
        let response = ApiResponse::list("fee rules retrieved", vec![], None, Pagination::new(0, 1, 20));
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["message"], "fee rules retrieved");
        assert_eq!(body["data"], json!([]));
        assert!(body.get("include").is_none());
        assert_eq!(body["pagination"]["total_pages"], 0);
        assert!(body.get("status_code").is_none());
    }

    #[test]
    fn item_envelope_has_no_pagination() {
        let mut include = Map::new();
        include.insert("academic_terms".into(), json!([]));
        let response = ApiResponse::item("fee rule retrieved", Map::new(), Some(include));
        let body = serde_json::to_value(&response).unwrap();
        assert!(body.get("pagination").is_none());
        assert_eq!(body["include"]["academic_terms"], json!([]));
    }
}
