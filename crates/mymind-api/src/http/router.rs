//! Axum router configuration with middleware.
//!
//! - `/activeChatSession`, `/loadMsgs`: bare JSON for the chat page.
//! - `/ws/chat`: chat WebSocket.
//! - `/api/v1/...`: booking API with envelope responses.
//! - `/health`: unauthenticated liveness probe.
//!
//! Middleware: CORS, request tracing.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Cart
        .route(
            "/cart",
            post(handlers::cart::create_cart)
                .get(handlers::cart::get_cart)
                .put(handlers::cart::select_plan)
                .delete(handlers::cart::delete_cart),
        )
        .route("/cart/confirm", post(handlers::cart::confirm_cart))
        // Orders
        .route("/orders/active", get(handlers::orders::active_order))
        .route("/orders/recent", get(handlers::orders::recent_order))
        .route("/orders/history", get(handlers::orders::order_history))
        .route("/orders/{id}/refund", post(handlers::orders::refund_order))
        .route("/patients/history", get(handlers::orders::patient_history))
        // Directory
        .route("/therapists", get(handlers::directory::list_therapists))
        .route("/users/{id}", get(handlers::directory::get_user));

    Router::new()
        .nest("/api/v1", api_routes)
        .route(
            "/activeChatSession",
            get(handlers::chat::active_chat_session),
        )
        .route("/loadMsgs", post(handlers::chat::load_messages))
        .route("/ws/chat", get(handlers::ws::ws_chat))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
