// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use alloy::primitives::Address;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::blockchain::{GrantSigner, RegistryLedger};
use crate::fhe::ConfidentialCompute;
use crate::models::SessionStatusResponse;
use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Ledger RPC reachability ("ok" or "unavailable").
    pub ledger: String,
    /// Confidential-compute client ("ok" or "not_initialised").
    pub compute: String,
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health<L, C, S>(
    State(state): State<AppState<L, C, S>>,
) -> (StatusCode, Json<ReadyResponse>)
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let principal = state.context.principal.unwrap_or(Address::ZERO);
    let ledger_ok = state.session.ledger().count(principal).await.is_ok();
    let compute_ok = state.context.compute_ready;
    let all_ok = ledger_ok && compute_ok;

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            ledger: if ledger_ok { "ok" } else { "unavailable" }.to_string(),
            compute: if compute_ok { "ok" } else { "not_initialised" }.to_string(),
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Wallet, compute and randomness status of the running session.
#[utoipa::path(
    get,
    path = "/v1/session",
    tag = "Session",
    responses((status = 200, body = SessionStatusResponse))
)]
pub async fn session_status<L, C, S>(
    State(state): State<AppState<L, C, S>>,
) -> Json<SessionStatusResponse>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let session = &state.session;
    let revealed = match session.revealed(&state.context).await {
        Ok(files) => files.len(),
        Err(_) => 0,
    };

    Json(SessionStatusResponse {
        network: state.network.name.to_string(),
        chain_id: state.network.chain_id,
        registry: state.context.registry.to_checksum(None),
        principal: state.context.principal.map(|a| a.to_checksum(None)),
        wallet_connected: state.context.principal.is_some(),
        compute_ready: state.context.compute_ready,
        randomness: session.randomness().into(),
        grant_duration_days: session.policy().duration_days,
        revealed,
        local_storage: false,
    })
}
