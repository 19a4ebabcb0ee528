use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{state::AppState, users};

pub fn build_app(state: AppState) -> Router {
    let base_path = state.config.api_base_path.clone();
    let api = Router::new()
        .merge(users::router())
        .route("/health", get(health));
    let routes = if base_path.is_empty() || base_path == "/" {
        api
    } else {
        Router::new().nest(&base_path, api)
    };

    routes
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// Liveness plus a round trip to the database.
async fn health(State(state): State<AppState>) -> Result<&'static str, (StatusCode, String)> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "database unavailable".to_string(),
            )
        })?;
    Ok("ok")
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
