use axum::http::{HeaderValue, StatusCode, header};
use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

pub const PROBLEM_JSON: &str = "application/problem+json";

/// An RFC 7807 style error body.
#[derive(Debug, Clone)]
pub struct ProblemDetails {
    status: StatusCode,
    details: Map<String, Value>,
}

impl Serialize for ProblemDetails {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut body = Map::with_capacity(self.details.len() + 1);
        body.insert("status".to_string(), Value::from(self.status.as_u16()));
        body.extend(self.details.clone());
        body.serialize(serializer)
    }
}

impl ProblemDetails {
    pub fn new(status: StatusCode) -> Self {
        let mut details = Map::new();
        if let Some(reason) = status.canonical_reason() {
            details.insert("title".to_string(), Value::from(reason));
        }
        Self { status, details }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn with_type(self, value: &str) -> Self {
        self.with_detail("type", value)
    }

    pub fn with_title(self, value: &str) -> Self {
        self.with_detail("title", value)
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

impl IntoResponse for ProblemDetails {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(&self)).into_response();
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(PROBLEM_JSON));
        response
    }
}
