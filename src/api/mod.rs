// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;

use crate::{
    blockchain::{GrantSigner, RegistryLedger},
    fhe::ConfidentialCompute,
    models::{
        FileRecordResponse, Randomness, RevealStatus, RevealedFileResponse,
        SessionStatusResponse, StoreFileRequest, StoredFileResponse,
    },
    state::AppState,
};

pub mod files;
pub mod health;

pub fn router<L, C, S>(state: AppState<L, C, S>) -> Router
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let v1_routes = Router::new()
        .route("/session", get(health::session_status::<L, C, S>))
        .route(
            "/files",
            get(files::list_files::<L, C, S>).post(files::store_file::<L, C, S>),
        )
        .route("/files/revealed", get(files::list_revealed::<L, C, S>))
        .route("/files/reveal", post(files::reveal_all::<L, C, S>))
        .route(
            "/files/{index}/reveal",
            post(files::reveal_file::<L, C, S>).delete(files::dismiss_file::<L, C, S>),
        )
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health::health::<L, C, S>))
        .with_state(state)
        .nest("/v1", v1_routes)
        .route("/api-doc/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::session_status,
        files::list_files,
        files::store_file,
        files::list_revealed,
        files::reveal_file,
        files::dismiss_file,
        files::reveal_all
    ),
    components(
        schemas(
            SessionStatusResponse,
            Randomness,
            FileRecordResponse,
            RevealStatus,
            StoreFileRequest,
            StoredFileResponse,
            RevealedFileResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Session", description = "Wallet and compute status"),
        (name = "Files", description = "Registry records"),
        (name = "Reveal", description = "Decrypt handshake and revealed view")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{InMemoryLedger, LOCALHOST};
    use crate::fhe::MockCompute;
    use crate::session::{RegistrySession, SessionContext};
    use alloy::primitives::Address;
    use alloy::signers::local::PrivateKeySigner;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(connected: bool) -> Router {
        let signer = PrivateKeySigner::random();
        let mut context = SessionContext::new(Address::repeat_byte(0x33)).with_compute_ready(true);
        if connected {
            context = context.with_principal(signer.address());
        }
        let session = RegistrySession::new(
            Arc::new(InMemoryLedger::new()),
            Arc::new(MockCompute::localhost()),
            signer,
        );
        router(AppState::new(session, context, LOCALHOST))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app(true);
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["ledger"], "ok");
    }

    #[tokio::test]
    async fn session_status_never_uses_local_storage() {
        let app = app(false);
        let (status, body) = send(&app, "GET", "/v1/session", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["wallet_connected"], false);
        assert_eq!(body["local_storage"], false);
        assert_eq!(body["chain_id"], 31_337);
    }

    #[tokio::test]
    async fn listing_without_wallet_is_input_error() {
        let app = app(false);
        let (status, body) = send(&app, "GET", "/v1/files", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "input_error");
    }

    #[tokio::test]
    async fn store_reveal_and_dismiss_over_http() {
        let app = app(true);
        let (status, stored) = send(
            &app,
            "POST",
            "/v1/files",
            Some(r#"{"file_name":"report.pdf","content_id":"QmExampleHash"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(stored["index"], 0);

        let (status, file) = send(&app, "POST", "/v1/files/0/reveal", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(file["content_id"], "QmExampleHash");

        let (_, listed) = send(&app, "GET", "/v1/files", None).await;
        assert_eq!(listed[0]["reveal_state"], "revealed");

        let (status, _) = send(&app, "DELETE", "/v1/files/0/reveal", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, listed) = send(&app, "GET", "/v1/files", None).await;
        assert_eq!(listed[0]["reveal_state"], "hidden");
    }

    #[tokio::test]
    async fn openapi_document_lists_routes() {
        let app = app(true);
        let (status, doc) = send(&app, "GET", "/api-doc/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/v1/files/{index}/reveal"].is_object());
        assert!(doc["paths"]["/health"].is_object());
    }
}
