use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode};
use axum::middleware::Next;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{info, warn};

use super::models::{ErrorResponse, HealthResponse, LookupQuery, LookupRequest};
use super::state::ServerState;
use crate::error::LookupError;
use crate::record::WordRecord;
use crate::resolver::Resolver;

type HandlerError = (StatusCode, Json<ErrorResponse>);

pub async fn run_server(resolver: Arc<Resolver>, addr: String) -> Result<()> {
    let app = router(resolver.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind server address {}", addr))?;
    info!("listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .with_context(|| "server exited with an error")?;
    info!("shutting down, flushing cache");
    resolver.shutdown().await;
    Ok(())
}

pub fn router(resolver: Arc<Resolver>) -> Router {
    let state = Arc::new(ServerState { resolver });
    Router::new()
        .route("/health", get(health))
        .route("/translate/:word", get(lookup_path))
        .route("/word/:word", get(lookup_path))
        .route("/translate", get(translate_query).post(lookup_body))
        .route("/search", post(lookup_body))
        .with_state(state)
        .layer(axum::middleware::from_fn(cors_middleware))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl+c: {}", err);
        std::future::pending::<()>().await;
    }
}

async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        cached: state.resolver.cache().len(),
        fixed: state.resolver.fixed().len(),
    })
}

async fn cors_middleware(req: Request<Body>, next: Next) -> Result<Response<Body>, StatusCode> {
    if req.method() == Method::OPTIONS {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;
        apply_cors_headers(response.headers_mut());
        return Ok(response);
    }
    let mut response = next.run(req).await;
    apply_cors_headers(response.headers_mut());
    Ok(response)
}

fn apply_cors_headers(headers: &mut HeaderMap) {
    headers.insert("access-control-allow-origin", HeaderValue::from_static("*"));
    headers.insert(
        "access-control-allow-methods",
        HeaderValue::from_static("GET,POST,OPTIONS"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("content-type"),
    );
}

async fn lookup_path(
    State(state): State<Arc<ServerState>>,
    Path(word): Path<String>,
) -> Result<Json<WordRecord>, HandlerError> {
    lookup(&state, &word).await
}

async fn translate_query(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<WordRecord>, HandlerError> {
    lookup(&state, query.word.as_deref().unwrap_or_default()).await
}

async fn lookup_body(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Result<Json<WordRecord>, HandlerError> {
    let Json(payload) = payload.map_err(|err| bad_request(err.body_text()))?;
    lookup(&state, payload.word.as_deref().unwrap_or_default()).await
}

async fn lookup(state: &ServerState, word: &str) -> Result<Json<WordRecord>, HandlerError> {
    match state.resolver.resolve(word).await {
        Ok(record) => Ok(Json(record)),
        Err(err) => Err(error_response(err)),
    }
}

fn error_response(err: LookupError) -> HandlerError {
    let status = match err {
        LookupError::InvalidInput => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: String) -> HandlerError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DEFAULT_LIMIT, WordCache};
    use crate::fixed::FixedTable;
    use crate::record::PartialRecord;
    use crate::resolver::ResolverOptions;
    use crate::sources::Source;
    use crate::test_util::{Behavior, translator};

    fn state() -> Arc<ServerState> {
        let fixed = FixedTable::from_json(r#"{"good morning": "bom dia"}"#).expect("fixed");
        let source: Arc<dyn Source> =
            Arc::new(translator(Behavior::Answer(PartialRecord::translation("casa"))));
        let resolver = Resolver::new(
            Arc::new(WordCache::in_memory(DEFAULT_LIMIT)),
            Arc::new(fixed),
            vec![source],
            ResolverOptions::default(),
        );
        Arc::new(ServerState {
            resolver: Arc::new(resolver),
        })
    }

    #[tokio::test]
    async fn path_lookup_returns_record() {
        let state = state();
        let Json(record) = lookup_path(State(state.clone()), Path("House".to_string()))
            .await
            .expect("record");
        assert_eq!(record.word, "house");
        assert_eq!(record.translation, "casa");
        assert!(record.audio.contains("q=house"));

        let Json(health) = health(State(state)).await;
        assert_eq!(health.status, "ok");
        assert_eq!(health.cached, 1);
        assert_eq!(health.fixed, 1);
    }

    #[tokio::test]
    async fn query_lookup_uses_fixed_table() {
        let query = LookupQuery {
            word: Some("Good Morning".to_string()),
        };
        let Json(record) = translate_query(State(state()), Query(query))
            .await
            .expect("record");
        assert_eq!(record.word, "good morning");
        assert_eq!(record.translation, "bom dia");
    }

    #[tokio::test]
    async fn blank_word_is_bad_request() {
        let query = LookupQuery { word: None };
        let (status, Json(body)) = translate_query(State(state()), Query(query))
            .await
            .expect_err("blank word");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "word is empty");

        let payload = LookupRequest {
            word: Some("   ".to_string()),
        };
        let (status, _) = lookup_body(State(state()), Ok(Json(payload)))
            .await
            .expect_err("blank word");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn lookup_errors_map_to_status_codes() {
        let (status, Json(body)) = error_response(LookupError::InvalidInput);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "word is empty");

        let (status, _) = error_response(LookupError::Persistence("disk full".to_string()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn cors_headers_are_permissive() {
        let mut headers = HeaderMap::new();
        apply_cors_headers(&mut headers);
        assert_eq!(
            headers.get("access-control-allow-origin"),
            Some(&HeaderValue::from_static("*"))
        );
        assert!(headers.contains_key("access-control-allow-methods"));
    }
}
