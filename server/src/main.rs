use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

#[tokio::main]
pub async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let app = axum::Router::new()
        .fallback(axum::routing::get(|| async { "No Route! Use /health or /solve" }))
        .route("/health", axum::routing::get(healthy))
        .route("/solve", axum::routing::post(solve));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("server listening on 0.0.0.0:3000");
    axum::serve(listener, app).await.unwrap();
}

pub async fn healthy() -> &'static str {
    "Healthy"
}

pub async fn solve(axum::extract::Json(input_data): axum::extract::Json<serde_json::Value>) -> impl IntoResponse {
    match fleet_server::solve_instance(input_data) {
        Ok(output) => (StatusCode::OK, Json(output)),
        Err(message) => (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": message }))),
    }
}
