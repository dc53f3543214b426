//! HTTP endpoints in front of the action dispatcher.
//!
//! `POST /action` is the only endpoint that changes the session. Everything else reads
//! status cards, the session snapshot or metrics, except `DELETE /cards/{hash}` which
//! closes a settled card and `POST /wallet/network` which switches the local signer.

use alloy::primitives::B256;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::instrument;

use crate::action::ActionRequest;
use crate::cards::StatusCard;
use crate::dispatcher::ActionDispatcher;
use crate::error::EngineError;
use crate::events::MetricsCollector;
use crate::network::Network;
use crate::wallet::LocalWalletSigner;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ActionDispatcher>,
    pub metrics: MetricsCollector,
    /// Present when the server signs with a local key.
    pub local_wallet: Option<Arc<LocalWalletSigner>>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/action", post(post_action))
        .route("/cards", get(get_cards))
        .route("/cards/{hash}", delete(delete_card))
        .route("/session", get(get_session))
        .route("/metrics", get(get_metrics))
        .route("/wallet/network", post(post_wallet_network))
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

/// `GET /`: Service information with the endpoint list.
#[instrument(skip_all)]
pub async fn get_root() -> impl IntoResponse {
    let pkg_version = env!("CARGO_PKG_VERSION");
    let pkg_description = env!("CARGO_PKG_DESCRIPTION");

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>chainpilot</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif; max-width: 900px; margin: 0 auto; padding: 20px; }}
        code {{ background: #f5f5f5; padding: 2px 4px; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>chainpilot</h1>
    <p>Version: {pkg_version}</p>
    <p>{pkg_description}</p>

    <h2>Endpoints</h2>
    <ul>
        <li><code>GET /health</code> health check</li>
        <li><code>POST /action</code> run an action, body <code>{{"action": "prepareTransaction", ...}}</code></li>
        <li><code>GET /cards</code> status cards, newest first</li>
        <li><code>DELETE /cards/{{hash}}</code> close a settled card</li>
        <li><code>GET /session</code> connected account, chain and pending operation</li>
        <li><code>GET /metrics</code> engine counters</li>
        <li><code>POST /wallet/network</code> switch the local signer, body <code>{{"network": "base-sepolia"}}</code></li>
    </ul>
</body>
</html>"#
    );

    (StatusCode::OK, Html(html)).into_response()
}

#[instrument(skip_all)]
pub async fn get_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `POST /action`: Dispatch one action for the session.
///
/// Action failures are part of the reply (`ok: false`), so the status is 200 whenever the
/// dispatcher ran.
#[instrument(skip_all)]
pub async fn post_action(State(state): State<AppState>, Json(request): Json<ActionRequest>) -> Response {
    // A dropped connection must not abort a signing round trip halfway.
    let dispatcher = state.dispatcher.clone();
    match tokio::spawn(async move { dispatcher.dispatch(request).await }).await {
        Ok(reply) => (StatusCode::OK, Json(reply)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Dispatch task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal server error" })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderedCard {
    #[serde(flatten)]
    card: StatusCard,
    rendered: String,
    dismissable: bool,
    explorer_url: Option<String>,
}

/// `GET /cards`: Status cards, newest first.
#[instrument(skip_all)]
pub async fn get_cards(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.dispatcher.cards();
    let cards: Vec<_> = registry
        .list()
        .into_iter()
        .map(|card| RenderedCard {
            rendered: registry.render(&card),
            dismissable: card.dismissable(),
            explorer_url: registry.explorer_tx_url(card.chain_id, &card.hash),
            card,
        })
        .collect();
    (StatusCode::OK, Json(cards))
}

/// `DELETE /cards/{hash}`: Close a settled card.
#[instrument(skip_all)]
pub async fn delete_card(State(state): State<AppState>, Path(hash): Path<String>) -> Response {
    let hash: B256 = match hash.parse() {
        Ok(hash) => hash,
        Err(_) => {
            return EngineError::Validation(format!("Invalid transaction hash: {hash}")).into_response();
        }
    };
    match state.dispatcher.cards().dismiss(&hash) {
        Ok(card) => (StatusCode::OK, Json(card)).into_response(),
        Err(error) => error.into_response(),
    }
}

#[instrument(skip_all)]
pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.dispatcher.session().await))
}

#[instrument(skip_all)]
pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.metrics.snapshot()))
}

#[derive(Debug, Deserialize)]
pub struct SwitchNetwork {
    pub network: String,
}

/// `POST /wallet/network`: Reconnect the local signer to another network.
#[instrument(skip_all)]
pub async fn post_wallet_network(State(state): State<AppState>, Json(body): Json<SwitchNetwork>) -> Response {
    let Some(wallet) = state.local_wallet.as_ref() else {
        return EngineError::WalletUnavailable.into_response();
    };
    let network: Network = match body.network.parse() {
        Ok(network) => network,
        Err(_) => {
            return EngineError::Validation(format!(
                "Unknown network '{}'. Supported networks: {}",
                body.network,
                Network::supported_names()
            ))
            .into_response();
        }
    };
    wallet.switch_network(network).await;
    (
        StatusCode::OK,
        Json(json!({ "network": network, "chainId": network.chain_id() })),
    )
        .into_response()
}

fn status_for(error: &EngineError) -> StatusCode {
    match error {
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::WalletUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Network(_) | EngineError::Provider(_) => StatusCode::BAD_GATEWAY,
        EngineError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        if status.is_server_error() {
            tracing::error!(error = %self, kind = self.kind(), "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
                kind: self.kind(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_404() {
        assert_eq!(status_for(&EngineError::NotFound("x".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_user_errors_are_400() {
        assert_eq!(status_for(&EngineError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&EngineError::NoPendingOperation("confirm")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&EngineError::ChainMismatch {
                expected: 1,
                actual: 5
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_infrastructure_errors_are_5xx() {
        assert_eq!(status_for(&EngineError::WalletUnavailable), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&EngineError::Provider("down".into())), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status_for(&EngineError::Registry("corrupt".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
