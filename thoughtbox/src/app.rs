use aide::scalar::Scalar;
use axum::{
    http::{HeaderValue, Method},
    middleware::{self},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::config;

use serde_json::json;

use crate::{
    crypto::FieldCipher,
    db::DB,
    errors::{self, on_error, ErrorResponseDocs},
    health,
    openapi::{
        self,
        aide::axum::{ApiRouter, IntoApiResponse},
        OpenApi,
    },
    state::AppState,
};

pub struct AppParams<Router>
where
    Router: FnOnce(AppState) -> ApiRouter,
{
    pub db: DB,
    pub cipher: FieldCipher,
    pub router: Router,
}

pub async fn create<R>(AppParams { db, cipher, router }: AppParams<R>) -> errors::Result<(Router, OpenApi)>
where
    R: FnOnce(AppState) -> ApiRouter,
{
    let mut api = OpenApi::default();

    let state = AppState::new(db.clone(), cipher.clone());

    let docs_router = axum::Router::new()
        .route(
            "/__docs__",
            get(Scalar::new("/__docs__/spec.json")
                .with_title("ThoughtBox API")
                .axum_handler()),
        )
        .route("/__docs__/spec.json", get(serve_docs));

    let app = ApiRouter::new()
        .route("/__version__", get(version))
        .route("/__lbheartbeat__", get(lbheartbeat))
        .merge(docs_router)
        .merge(health::router(state.clone()))
        .merge(router(state))
        .finish_api_with(&mut api, |t| {
            t.title("ThoughtBox").default_response::<openapi::Json<ErrorResponseDocs>>()
        })
        .layer(
            ServiceBuilder::new()
                .layer(Extension(db))
                .layer(Extension(cipher))
                .layer(Extension(Arc::new(api.clone())))
                .layer(middleware::from_fn(on_error)),
        );

    Ok((app, api))
}

/// Allows the configured origin, or any origin when none is configured.
pub fn cors_layer(origin: Option<&str>) -> errors::Result<CorsLayer> {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    Ok(match origin {
        Some(origin) => {
            let origin = HeaderValue::from_str(origin)
                .map_err(|e| errors::Error::Config(format!("invalid CORS_ORIGIN: {e}")))?;
            layer.allow_origin(origin)
        }
        None => layer.allow_origin(Any),
    })
}

async fn version() -> impl IntoResponse {
    let config = &config();
    Json(json!({
        "source" : config.source,
        "version": config.version,
        "commit" : config.git_commit,
        "build"  : config.pipeline_id
    }))
}

async fn lbheartbeat() -> impl IntoResponse {
    ""
}

async fn serve_docs(Extension(api): Extension<Arc<OpenApi>>) -> impl IntoApiResponse {
    openapi::Json(api).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_test_db;

    #[tokio::test]
    async fn service_endpoints() -> errors::Result<()> {
        let db = init_test_db().await?;
        let server = crate::tests::test_server(db, crate::notes::router).await?;

        assert_eq!(server.get("/__lbheartbeat__").await.status_code(), 200);
        assert_eq!(server.get("/__version__").await.json::<serde_json::Value>()["source"], "local");

        let spec = server.get("/__docs__/spec.json").await;
        assert_eq!(spec.status_code(), 200);
        assert!(spec.json::<serde_json::Value>()["paths"]["/api/notes"].is_object());
        Ok(())
    }

    #[test]
    fn cors_rejects_invalid_origin() {
        assert!(cors_layer(Some("http://localhost:5173")).is_ok());
        assert!(cors_layer(None).is_ok());
        assert!(cors_layer(Some("bad\norigin")).is_err());
    }
}
