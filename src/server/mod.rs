use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use tower_http::services::ServeDir;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::data::load_snapshot;

pub mod api;
pub mod routes;

use api::ApiContext;
use routes::{error_response, route_request, HttpResponse};

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, [(header::CONTENT_TYPE, self.content_type)], self.body).into_response()
    }
}

async fn dispatch(
    State(ctx): State<Arc<ApiContext>>,
    method: Method,
    uri: Uri,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> HttpResponse {
    let method = method.to_string();
    let path = uri.path().to_string();
    let log_method = method.clone();
    let log_path = path.clone();

    // Batch reports fan out on rayon; keep that off the async workers.
    let response = tokio::task::spawn_blocking(move || {
        route_request(&ctx, &method, &path, &query, &body)
    })
    .await;

    match response {
        Ok(response) => {
            debug!(
                method = %log_method,
                path = %log_path,
                status = response.status_code,
                "api request"
            );
            response
        }
        Err(err) => {
            warn!(
                method = %log_method,
                path = %log_path,
                error = %err,
                "api handler failed"
            );
            error_response(500, "request handler failed")
        }
    }
}

async fn index() -> Html<&'static str> {
    Html(routes::index_html())
}

async fn not_found() -> HttpResponse {
    error_response(404, "Route not found")
}

/// API routes plus the built front-end from `static_dir` when it exists,
/// otherwise a small console page at `/`.
pub fn app(ctx: Arc<ApiContext>, static_dir: &Path) -> Router {
    let api = Router::new()
        .route("/api/*path", any(dispatch))
        .with_state(ctx);

    if static_dir.is_dir() {
        api.fallback_service(ServeDir::new(static_dir).append_index_html_on_directories(true))
    } else {
        api.route("/", get(index)).fallback(not_found)
    }
}

pub fn run_server(config: &AppConfig) -> std::io::Result<()> {
    let snapshot = load_snapshot(config.data_path.as_deref());
    let ctx = Arc::new(ApiContext::new(snapshot, config.defaults.clone()));
    let router = app(ctx, Path::new(&config.static_dir));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(&config.bind).await?;
        info!(bind = %config.bind, "funnelsim server listening on http://{}", config.bind);
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
