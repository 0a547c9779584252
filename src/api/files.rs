// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registry endpoints: list and store records, reveal and dismiss them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use base64ct::{Base64, Encoding};
use tracing::info;

use crate::blockchain::{GrantSigner, RegistryLedger};
use crate::crypto::ContentId;
use crate::error::ApiError;
use crate::fhe::ConfidentialCompute;
use crate::models::{
    FileRecordResponse, RevealedFileResponse, StoreFileRequest, StoredFileResponse,
};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/v1/files",
    tag = "Files",
    responses(
        (status = 200, body = [FileRecordResponse]),
        (status = 400, description = "No wallet connected"),
        (status = 502, description = "Ledger read failed")
    )
)]
pub async fn list_files<L, C, S>(
    State(state): State<AppState<L, C, S>>,
) -> Result<Json<Vec<FileRecordResponse>>, ApiError>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let records = state.session.list_files(&state.context).await?;
    let mut response = Vec::with_capacity(records.len());
    for record in records {
        let reveal_state = state
            .session
            .reveal_state(&state.context, record.index)
            .await?;
        response.push(FileRecordResponse::new(record, reveal_state));
    }
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/v1/files",
    request_body = StoreFileRequest,
    tag = "Files",
    responses(
        (status = 201, body = StoredFileResponse),
        (status = 400, description = "Missing file name, content or wallet"),
        (status = 502, description = "Ledger write reverted"),
        (status = 503, description = "Confidential-compute network unavailable")
    )
)]
pub async fn store_file<L, C, S>(
    State(state): State<AppState<L, C, S>>,
    Json(request): Json<StoreFileRequest>,
) -> Result<(StatusCode, Json<StoredFileResponse>), ApiError>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let stored = match (request.content_id, request.content_base64) {
        (Some(_), Some(_)) => {
            return Err(ApiError::bad_request(
                "supply either content_id or content_base64, not both",
            ))
        }
        (Some(raw), None) => {
            let content_id = ContentId::new(raw)?;
            state
                .session
                .store(&state.context, &request.file_name, content_id)
                .await?
        }
        (None, Some(encoded)) => {
            let bytes = Base64::decode_vec(encoded.trim())
                .map_err(|_| ApiError::bad_request("content_base64 is not valid Base64"))?;
            state
                .session
                .store_bytes(&state.context, &request.file_name, bytes)
                .await?
        }
        (None, None) => return Err(ApiError::bad_request("no file selected")),
    };

    info!(index = stored.index, tx_hash = %stored.tx_hash, "Stored file record");
    let response = StoredFileResponse::new(stored, state.network.explorer_url);
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/v1/files/revealed",
    tag = "Reveal",
    responses((status = 200, body = [RevealedFileResponse]))
)]
pub async fn list_revealed<L, C, S>(
    State(state): State<AppState<L, C, S>>,
) -> Result<Json<Vec<RevealedFileResponse>>, ApiError>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let files = state.session.revealed(&state.context).await?;
    Ok(Json(files.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/files/{index}/reveal",
    params(
        ("index" = u64, Path, description = "Position of the record in the owner's list")
    ),
    tag = "Reveal",
    responses(
        (status = 200, body = RevealedFileResponse),
        (status = 403, description = "Signature refused or grant expired"),
        (status = 409, description = "Reveal already in progress"),
        (status = 422, description = "Decrypted key out of range or record malformed")
    )
)]
pub async fn reveal_file<L, C, S>(
    Path(index): Path<u64>,
    State(state): State<AppState<L, C, S>>,
) -> Result<Json<RevealedFileResponse>, ApiError>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let file = state
        .session
        .reveal_with_cancel(&state.context, index, &state.shutdown)
        .await?;
    Ok(Json(file.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/files/{index}/reveal",
    params(
        ("index" = u64, Path, description = "Position of the record in the owner's list")
    ),
    tag = "Reveal",
    responses(
        (status = 204, description = "Record hidden again"),
        (status = 404, description = "Record was not revealed")
    )
)]
pub async fn dismiss_file<L, C, S>(
    Path(index): Path<u64>,
    State(state): State<AppState<L, C, S>>,
) -> Result<StatusCode, ApiError>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    if state.session.dismiss(&state.context, index).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found(format!("record {index} is not revealed")))
    }
}

/// Reveal every hidden record under one signature.
#[utoipa::path(
    post,
    path = "/v1/files/reveal",
    tag = "Reveal",
    responses(
        (status = 200, body = [RevealedFileResponse]),
        (status = 403, description = "Signature refused or grant expired")
    )
)]
pub async fn reveal_all<L, C, S>(
    State(state): State<AppState<L, C, S>>,
) -> Result<Json<Vec<RevealedFileResponse>>, ApiError>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    let files = state.session.reveal_all(&state.context).await?;
    Ok(Json(files.into_iter().map(Into::into).collect()))
}
