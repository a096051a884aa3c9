use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{body::Bytes, extract::State, http::StatusCode, routing::post, Router};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::event::{InboundEvent, Update};
use crate::router::EventRouter;

/// Build the webhook app. Only `POST` is routed, so any other method on the
/// webhook path gets `405 Method Not Allowed` from axum.
pub fn app(router: Arc<EventRouter>, webhook_path: &str) -> Router {
    Router::new()
        .route(webhook_path, post(receive_update))
        .layer(TraceLayer::new_for_http())
        .with_state(router)
}

/// Every update is acknowledged with 200 so Telegram stops redelivering it,
/// including ones that cannot be parsed.
async fn receive_update(
    State(router): State<Arc<EventRouter>>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Ignoring malformed update: {}", e);
            return (StatusCode::OK, "OK");
        }
    };

    let update_id = update.update_id;
    match InboundEvent::from_update(update) {
        Some(event) => {
            let outcome = router.handle(&event).await;
            debug!("Update {} handled: {:?}", update_id, outcome);
        }
        None => debug!("Update {} carries no message, skipping", update_id),
    }

    (StatusCode::OK, "OK")
}

pub async fn serve(router: Arc<EventRouter>, bind_address: &str, webhook_path: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;

    info!("Webhook listening on http://{}{}", bind_address, webhook_path);

    axum::serve(listener, app(router, webhook_path))
        .await
        .context("Server error")?;

    Ok(())
}
