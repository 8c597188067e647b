pub(crate) mod auth;
mod content_type;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router, middleware};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::config::RuntimeConfig;
use crate::error::Error;
use crate::json_ld::{TransformOp, TransformOptions};
use crate::store::ContentType;

use self::auth::Principal;
use self::content_type::{LdJson, detect_content_type};

pub(crate) async fn serve(config: &RuntimeConfig) -> Result<()> {
    let listener =
        TcpListener::bind(format!("0.0.0.0:{}", config.init.server.http_port)).await?;
    info!(target: "http", port = config.init.server.http_port, "listening");
    axum::serve(listener, router(config.clone())).await?;
    Ok(())
}

fn router(config: RuntimeConfig) -> Router {
    Router::new()
        .route("/d", post(store_document))
        .route(
            "/d/{id}",
            get(fetch_document)
                .put(replace_document)
                .delete(remove_document),
        )
        .route("/d/{id}/transform", post(transform_document))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth::attach_principal,
        ))
        // every response carries permissive CORS headers and stays out of
        // shared caches, error responses included
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("private, no-store, no-cache, must-revalidate"),
        ))
        .with_state(config)
}

#[derive(Deserialize, Default)]
struct TtlParams {
    ttl: Option<i64>,
}

#[derive(Deserialize)]
struct TransformRequest {
    operation: String,
    #[serde(default)]
    context: Option<Value>,
    #[serde(default)]
    frame: Option<Value>,
}

async fn store_document(
    State(config): State<RuntimeConfig>,
    Query(params): Query<TtlParams>,
    Extension(Principal(principal)): Extension<Principal>,
    headers: HeaderMap,
    Json(content): Json<Value>,
) -> Result<Response, Fault> {
    let content_type = detect_content_type(&headers, &content);
    let document = config
        .service
        .store(content, content_type, params.ttl, principal)?;
    let url = format!("{}/d/{}", config.init.server.base_url, document.id);
    let response = (
        StatusCode::CREATED,
        [(header::LOCATION, url.clone())],
        Json(json!({ "id": document.id.to_string(), "url": url })),
    )
        .into_response();
    Ok(response)
}

async fn fetch_document(
    State(config): State<RuntimeConfig>,
    Path(id): Path<String>,
) -> Result<Response, Fault> {
    let document = config.service.fetch(&id)?;
    let response = match document.content_type {
        ContentType::JsonLd => LdJson(Json(document.content)).into_response(),
        ContentType::Json => Json(document.content).into_response(),
    };
    Ok(response)
}

async fn transform_document(
    State(config): State<RuntimeConfig>,
    Path(id): Path<String>,
    Json(request): Json<TransformRequest>,
) -> Result<LdJson<Value>, Fault> {
    let op: TransformOp = request.operation.parse()?;
    let options = TransformOptions {
        context: request.context,
        frame: request.frame,
    };
    let transformed = config.service.fetch_transformed(&id, op, &options).await?;
    Ok(LdJson(Json(transformed)))
}

async fn replace_document(
    State(config): State<RuntimeConfig>,
    Path(id): Path<String>,
    Query(params): Query<TtlParams>,
    Extension(Principal(principal)): Extension<Principal>,
    Json(content): Json<Value>,
) -> Result<StatusCode, Fault> {
    config
        .service
        .replace(&id, content, params.ttl, principal.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_document(
    State(config): State<RuntimeConfig>,
    Path(id): Path<String>,
    Extension(Principal(principal)): Extension<Principal>,
) -> Result<StatusCode, Fault> {
    config.service.remove(&id, principal.as_deref())?;
    Ok(StatusCode::NO_CONTENT)
}

/// Every fault turns into a status code plus a {"message"} envelope here,
/// and nowhere else.
struct Fault(Error);

impl From<Error> for Fault {
    fn from(error: Error) -> Self {
        Fault(error)
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MalformedDocument(_) | Error::UnsupportedOperation(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::InvalidContext { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::FetchTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::FetchError { .. } => StatusCode::BAD_GATEWAY,
            Error::StoreUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
        };
        (status, Json(json!({ "message": self.0.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use serde_json::{Value, json};
    use tempfile::tempdir;
    use tokio::net::TcpListener;

    use crate::config::{Config, RuntimeConfig};
    use crate::error::Error;

    use super::{Fault, router};

    #[test]
    fn fault_status_mapping_is_exhaustive() {
        let cases = [
            (Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                Error::MalformedDocument("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::UnsupportedOperation("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                Error::InvalidContext { url: "u".into() },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                Error::FetchTimeout { url: "u".into() },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                Error::FetchError {
                    url: "u".into(),
                    reason: "r".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                Error::StoreUnavailable(anyhow::anyhow!("x")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (Error::Unauthorized, StatusCode::UNAUTHORIZED),
        ];
        for (error, status) in cases {
            let response = Fault(error).into_response();
            assert_eq!(response.status(), status);
        }
    }

    async fn serve_temp() -> Result<(tempfile::TempDir, String)> {
        let tmp_dir = tempdir()?;
        let keyspace = fjall::Config::new(tmp_dir.path()).temporary(true).open()?;
        let config = RuntimeConfig::new(Config::default(), keyspace)?;
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            axum::serve(listener, router(config)).await.unwrap();
        });
        Ok((tmp_dir, format!("http://{addr}")))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn document_crud_over_http() -> Result<()> {
        let (_guard, base) = serve_temp().await?;
        let client = reqwest::Client::new();

        let created = client
            .post(format!("{base}/d"))
            .json(&json!({"a": 1}))
            .send()
            .await?;
        assert_eq!(created.status(), StatusCode::CREATED);
        assert!(created.headers().get("location").is_some());
        assert!(created.headers().get("cache-control").is_some());
        let body: Value = created.json().await?;
        let id = body["id"].as_str().unwrap().to_owned();

        let fetched = client.get(format!("{base}/d/{id}")).send().await?;
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(fetched.json::<Value>().await?, json!({"a": 1}));

        let replaced = client
            .put(format!("{base}/d/{id}"))
            .json(&json!({"a": 2}))
            .send()
            .await?;
        assert_eq!(replaced.status(), StatusCode::NO_CONTENT);

        let removed = client.delete(format!("{base}/d/{id}")).send().await?;
        assert_eq!(removed.status(), StatusCode::NO_CONTENT);

        let gone = client.get(format!("{base}/d/{id}")).send().await?;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
        let envelope: Value = gone.json().await?;
        assert!(envelope["message"].as_str().is_some());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transform_endpoint_expands_ld_documents() -> Result<()> {
        let (_guard, base) = serve_temp().await?;
        let client = reqwest::Client::new();

        let created = client
            .post(format!("{base}/d"))
            .json(&json!({
                "@context": {"name": "https://schema.org/name"},
                "name": "Deng"
            }))
            .send()
            .await?;
        let body: Value = created.json().await?;
        let id = body["id"].as_str().unwrap();

        let transformed = client
            .post(format!("{base}/d/{id}/transform"))
            .json(&json!({"operation": "expand"}))
            .send()
            .await?;
        assert_eq!(transformed.status(), StatusCode::OK);
        assert_eq!(
            transformed
                .headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok()),
            Some("application/ld+json")
        );
        assert_eq!(
            transformed.json::<Value>().await?,
            json!([{"https://schema.org/name": [{"@value": "Deng"}]}])
        );
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_ttl_is_a_bad_request() -> Result<()> {
        let (_guard, base) = serve_temp().await?;
        let client = reqwest::Client::new();
        let response = client
            .post(format!("{base}/d?ttl=0"))
            .json(&json!({"a": 1}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn transform_of_plain_json_is_rejected() -> Result<()> {
        let (_guard, base) = serve_temp().await?;
        let client = reqwest::Client::new();
        let created = client
            .post(format!("{base}/d"))
            .json(&json!({"a": 1}))
            .send()
            .await?;
        let body: Value = created.json().await?;
        let id = body["id"].as_str().unwrap();

        let response = client
            .post(format!("{base}/d/{id}/transform"))
            .json(&json!({"operation": "expand"}))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
