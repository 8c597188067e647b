use axum::Json;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::store::ContentType;

const APPLICATION_LD_JSON: HeaderValue = HeaderValue::from_static("application/ld+json");

/// JSON-LD is announced either by media type or, failing that, by the
/// submitted document carrying a top-level @context.
pub(super) fn detect_content_type(headers: &HeaderMap, content: &Value) -> ContentType {
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim);
    if declared == Some("application/ld+json") {
        return ContentType::JsonLd;
    }
    if content.get("@context").is_some() {
        return ContentType::JsonLd;
    }
    ContentType::Json
}

pub(super) struct LdJson<T>(pub(super) Json<T>);

impl<T> IntoResponse for LdJson<T>
where
    T: Serialize,
{
    fn into_response(self) -> Response {
        let mut response = self.0.into_response();
        if response.status() != StatusCode::INTERNAL_SERVER_ERROR {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, APPLICATION_LD_JSON);
        }
        response
    }
}
