use crate::engine::{CorpusStats, Engine};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

const USAGE_HINT: &str =
    "You have to provide a query. Example: curl 'localhost:4000/search?query=memory%20management'";

// ========== Request/Response Types ==========

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    fn error_msg(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

// ========== Error Handling ==========

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = format!("{:#}", self.0);
        tracing::error!("API error: {}", message);

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error_msg(message)),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// ========== Handlers ==========

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    default_result_count: usize,
}

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success("OK"))
}

type SearchResult = Result<(StatusCode, Json<ApiResponse<SearchResponse>>), AppError>;

async fn search_documents(
    State(state): State<AppState>,
    req: Result<Query<SearchRequest>, QueryRejection>,
) -> SearchResult {
    // Malformed parameters still answer with the JSON envelope
    let Query(req) = match req {
        Ok(req) => req,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "rejected search parameters");
            let body = ApiResponse::error_msg(rejection.body_text());
            return Ok((rejection.status(), Json(body)));
        }
    };

    let query = req.query.trim().to_string();
    if query.is_empty() || query == "\"\"" {
        return Ok((StatusCode::OK, Json(ApiResponse::error_msg(USAGE_HINT.to_string()))));
    }

    let count = req.count.unwrap_or(state.default_result_count);
    tracing::info!(%query, count, "searching");

    // Ranking scans the whole corpus, keep it off the async workers
    let engine = Arc::clone(&state.engine);
    let search_query = query.clone();
    let documents =
        tokio::task::spawn_blocking(move || engine.search(&search_query, count)).await?;

    let body = ApiResponse::success(SearchResponse { query, documents });
    Ok((StatusCode::OK, Json(body)))
}

async fn get_stats(State(state): State<AppState>) -> Json<ApiResponse<CorpusStats>> {
    Json(ApiResponse::success(state.engine.stats()))
}

// ========== Router ==========

pub fn create_router(engine: Arc<Engine>, default_result_count: usize) -> Router {
    let state = AppState {
        engine,
        default_result_count,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search_documents))
        .route("/stats", get(get_stats))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// Serve `router` on all interfaces until the process is stopped
pub async fn serve(router: Router, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("starting server on port {}", port);
    axum::serve(listener, router).await?;
    Ok(())
}
