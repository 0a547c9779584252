// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Hosted relayer integration for ciphertext issuance and user decryption.

use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, Bytes};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use super::eip712::{DecryptDomain, TypedDecryptRequest, EXTRA_DATA};
use super::{ClearValues, ConfidentialCompute, EncryptedInput, GrantScope, UserDecryptRequest};
use crate::blockchain::KeyHandle;
use crate::error::VaultError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const INPUT_PROOF_PATH: &str = "v1/input-proof";
const USER_DECRYPT_PATH: &str = "v1/user-decrypt";
const EUINT32: &str = "euint32";

#[derive(Debug, Clone)]
pub struct RelayerClient {
    base_url: Url,
    domain: DecryptDomain,
    contract_chain_id: u64,
    http: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InputProofResponse {
    handles: Vec<String>,
    input_proof: String,
}

#[derive(Debug, Deserialize)]
struct UserDecryptResponse {
    values: HashMap<String, Value>,
}

impl RelayerClient {
    pub fn new(
        base_url: &str,
        domain: DecryptDomain,
        contract_chain_id: u64,
    ) -> Result<Self, VaultError> {
        Self::with_timeout(base_url, domain, contract_chain_id, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        domain: DecryptDomain,
        contract_chain_id: u64,
        timeout: Duration,
    ) -> Result<Self, VaultError> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VaultError::compute_unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url,
            domain,
            contract_chain_id,
            http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<Value, VaultError> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| VaultError::input(format!("invalid relayer path {path}: {e}")))?;

        let response = self
            .http
            .post(url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|e| VaultError::compute_unavailable(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%url, %status, "Relayer returned an error status");
            return Err(classify_status(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| VaultError::compute_unavailable(format!("invalid relayer response: {e}")))
    }

    async fn encrypt(
        &self,
        value: u32,
        contract: Address,
        principal: Address,
    ) -> Result<EncryptedInput, VaultError> {
        let payload = input_proof_payload(value, contract, principal, self.contract_chain_id);
        let raw = self.post_json(INPUT_PROOF_PATH, &payload).await?;
        let response: InputProofResponse = serde_json::from_value(raw)
            .map_err(|e| VaultError::compute_unavailable(format!("invalid input proof response: {e}")))?;

        let handle = response
            .handles
            .first()
            .ok_or_else(|| VaultError::compute_unavailable("relayer returned no handles"))
            .and_then(|raw| {
                KeyHandle::from_str(raw).map_err(|e| {
                    VaultError::compute_unavailable(format!("relayer returned a bad handle: {e}"))
                })
            })?;
        let proof = Bytes::from_str(&response.input_proof).map_err(|e| {
            VaultError::compute_unavailable(format!("relayer returned a bad input proof: {e}"))
        })?;

        debug!(%handle, proof_len = proof.len(), "Relayer issued ciphertext");
        Ok(EncryptedInput { handle, proof })
    }

    async fn decrypt(&self, request: UserDecryptRequest<'_>) -> Result<ClearValues, VaultError> {
        let payload = user_decrypt_payload(&request, self.contract_chain_id);
        let raw = self.post_json(USER_DECRYPT_PATH, &payload).await?;
        let response: UserDecryptResponse = serde_json::from_value(raw)
            .map_err(|e| VaultError::compute_unavailable(format!("invalid decrypt response: {e}")))?;

        let mut values = HashMap::with_capacity(response.values.len());
        for (raw_handle, value) in response.values {
            let prefixed = if raw_handle.starts_with("0x") {
                raw_handle
            } else {
                format!("0x{raw_handle}")
            };
            match KeyHandle::from_str(&prefixed) {
                Ok(handle) => {
                    values.insert(handle, value);
                }
                Err(_) => warn!(handle = %prefixed, "Ignoring unparseable handle in decrypt response"),
            }
        }
        Ok(values)
    }
}

impl ConfidentialCompute for RelayerClient {
    fn typed_request(&self, public_key: &[u8], scope: &GrantScope) -> TypedDecryptRequest {
        TypedDecryptRequest::build(&self.domain, public_key, scope)
    }

    fn encrypt_u32(
        &self,
        value: u32,
        contract: Address,
        principal: Address,
    ) -> impl Future<Output = Result<EncryptedInput, VaultError>> + Send {
        self.encrypt(value, contract, principal)
    }

    fn user_decrypt<'a>(
        &'a self,
        request: UserDecryptRequest<'a>,
    ) -> impl Future<Output = Result<ClearValues, VaultError>> + Send + 'a {
        self.decrypt(request)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, VaultError> {
    let mut normalized = raw.trim().to_string();
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    Url::parse(&normalized).map_err(|e| VaultError::input(format!("invalid relayer URL `{raw}`: {e}")))
}

/// Map a non-success relayer status onto the protocol taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> VaultError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{status}: {body}")
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => VaultError::denied(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            VaultError::compute_unavailable(detail)
        }
        s if s.is_server_error() => VaultError::compute_unavailable(detail),
        _ => VaultError::input(detail),
    }
}

fn input_proof_payload(value: u32, contract: Address, principal: Address, chain_id: u64) -> Value {
    json!({
        "contractAddress": contract.to_checksum(None),
        "userAddress": principal.to_checksum(None),
        "contractChainId": chain_id,
        "values": [{ "type": EUINT32, "value": value }]
    })
}

fn user_decrypt_payload(request: &UserDecryptRequest<'_>, chain_id: u64) -> Value {
    let contract = request
        .scope
        .contracts
        .first()
        .map(|c| c.to_checksum(None))
        .unwrap_or_default();
    let pairs: Vec<Value> = request
        .handles
        .iter()
        .map(|handle| json!({ "handle": handle.to_string(), "contractAddress": contract }))
        .collect();
    let contracts: Vec<String> = request
        .scope
        .contracts
        .iter()
        .map(|c| c.to_checksum(None))
        .collect();
    let signature = alloy::hex::encode(request.signature.as_bytes());

    json!({
        "handleContractPairs": pairs,
        "requestValidity": {
            "startTimestamp": request.scope.start_timestamp.to_string(),
            "durationDays": request.scope.duration_days.to_string(),
        },
        "contractsChainId": chain_id.to_string(),
        "contractAddresses": contracts,
        "userAddress": request.principal.to_checksum(None),
        "signature": signature,
        "publicKey": request.keypair.public_key_hex(),
        "privateKey": request.keypair.private_key_hex(),
        "extraData": alloy::hex::encode_prefixed(EXTRA_DATA),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhe::EphemeralKeypair;
    use crate::handshake::{reveal_keys, GrantPolicy, RevealStage};
    use alloy::primitives::{Signature, B256, U256};
    use alloy::signers::local::PrivateKeySigner;
    use axum::extract::State;
    use axum::http::header;
    use axum::response::{IntoResponse, Response};
    use axum::routing::post;
    use axum::{Json, Router};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    type Reply = Arc<dyn Fn(&Value) -> (StatusCode, String) + Send + Sync>;

    /// Serve `reply` as the relayer's user-decrypt endpoint on a loopback port.
    async fn local_relayer(reply: Reply) -> RelayerClient {
        async fn user_decrypt(State(reply): State<Reply>, Json(body): Json<Value>) -> Response {
            let (status, text) = reply(&body);
            (status, [(header::CONTENT_TYPE, "application/json")], text).into_response()
        }

        let app = Router::new()
            .route("/v1/user-decrypt", post(user_decrypt))
            .with_state(reply);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        RelayerClient::new(&format!("http://{addr}"), domain(), 11_155_111).unwrap()
    }

    async fn reveal_through(
        relayer: &RelayerClient,
        handles: &[KeyHandle],
    ) -> Result<crate::handshake::RevealedKeys, crate::handshake::RevealError> {
        let signer = PrivateKeySigner::random();
        reveal_keys(
            relayer,
            &signer,
            Address::repeat_byte(0x11),
            signer.address(),
            handles,
            &GrantPolicy::default(),
        )
        .await
    }

    fn domain() -> DecryptDomain {
        DecryptDomain {
            chain_id: 55_815,
            verifying_contract: Address::repeat_byte(0xdd),
        }
    }

    #[test]
    fn base_url_joins_paths_with_or_without_trailing_slash() {
        for raw in ["https://relayer.example/api", "https://relayer.example/api/"] {
            let client = RelayerClient::new(raw, domain(), 11_155_111).unwrap();
            let joined = client.base_url().join(USER_DECRYPT_PATH).unwrap();
            assert_eq!(joined.as_str(), "https://relayer.example/api/v1/user-decrypt");
        }
        assert!(RelayerClient::new("not a url", domain(), 1).is_err());
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, ""),
            VaultError::ServiceUnavailable { .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "acl"),
            VaultError::AuthorizationDenied(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad handle"),
            VaultError::Input(_)
        ));
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_retryable());
    }

    #[test]
    fn input_proof_payload_shape() {
        let payload = input_proof_payload(
            12_345_678,
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            11_155_111,
        );
        assert_eq!(payload["contractChainId"], 11_155_111);
        assert_eq!(payload["values"][0]["type"], "euint32");
        assert_eq!(payload["values"][0]["value"], 12_345_678);
    }

    #[test]
    fn user_decrypt_payload_shape() {
        let keypair = EphemeralKeypair::generate();
        let registry = Address::repeat_byte(0x11);
        let scope = GrantScope::new(
            vec![registry],
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            7,
        );
        let signature = Signature::new(U256::from(1), U256::from(2), false);
        let handles = [KeyHandle(B256::repeat_byte(0xab))];
        let request = UserDecryptRequest {
            handles: &handles,
            keypair: &keypair,
            scope: &scope,
            signature: &signature,
            principal: Address::repeat_byte(0x22),
        };

        let payload = user_decrypt_payload(&request, 11_155_111);
        assert_eq!(payload["requestValidity"]["startTimestamp"], "1700000000");
        assert_eq!(payload["requestValidity"]["durationDays"], "7");
        assert_eq!(payload["contractsChainId"], "11155111");
        assert_eq!(payload["extraData"], "0x00");
        assert_eq!(payload["handleContractPairs"][0]["handle"], handles[0].to_string());
        assert_eq!(payload["publicKey"], keypair.public_key_hex());
        assert!(!payload["signature"].as_str().unwrap().starts_with("0x"));
        assert_eq!(payload["signature"].as_str().unwrap().len(), 130);
    }

    #[tokio::test]
    async fn forbidden_decrypt_is_denied_at_decrypt_stage() {
        let relayer = local_relayer(Arc::new(|_: &Value| {
            (StatusCode::FORBIDDEN, r#"{"message":"acl check failed"}"#.to_string())
        }))
        .await;

        let err = reveal_through(&relayer, &[KeyHandle(B256::repeat_byte(0xab))])
            .await
            .unwrap_err();
        assert_eq!(err.stage, RevealStage::Decrypt);
        assert!(matches!(err.error, VaultError::AuthorizationDenied(ref m) if m.contains("acl check failed")));
    }

    #[tokio::test]
    async fn non_json_body_is_service_unavailable() {
        let relayer = local_relayer(Arc::new(|_: &Value| {
            (StatusCode::OK, "<html>upstream gateway</html>".to_string())
        }))
        .await;

        let err = reveal_through(&relayer, &[KeyHandle(B256::repeat_byte(0xab))])
            .await
            .unwrap_err();
        assert_eq!(err.stage, RevealStage::Decrypt);
        assert!(matches!(err.error, VaultError::ServiceUnavailable { .. }));
        assert!(err.error.is_retryable());
    }

    #[tokio::test]
    async fn unprefixed_response_handles_are_matched() {
        // Echo every requested handle back without its 0x prefix.
        let relayer = local_relayer(Arc::new(|body: &Value| {
            let values: serde_json::Map<String, Value> = body["handleContractPairs"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|pair| pair["handle"].as_str())
                .map(|h| (h.trim_start_matches("0x").to_string(), json!(12_345_678)))
                .collect();
            (StatusCode::OK, json!({ "values": values }).to_string())
        }))
        .await;

        let handles = [KeyHandle(B256::repeat_byte(0xab)), KeyHandle(B256::repeat_byte(0xcd))];
        let keys = reveal_through(&relayer, &handles).await.unwrap();
        assert_eq!(keys.len(), 2);
        for handle in &handles {
            assert_eq!(keys.get(handle).map(|k| k.value()), Some(12_345_678));
        }
    }

    #[tokio::test]
    async fn unparseable_response_handle_counts_as_missing() {
        let relayer = local_relayer(Arc::new(|_: &Value| {
            (
                StatusCode::OK,
                json!({ "values": { "not-a-handle": 12_345_678 } }).to_string(),
            )
        }))
        .await;

        let handle = KeyHandle(B256::repeat_byte(0xab));
        let err = reveal_through(&relayer, &[handle]).await.unwrap_err();
        assert_eq!(err.stage, RevealStage::Validate);
        match err.error {
            VaultError::RangeViolation { handle: reported, value } => {
                assert_eq!(reported, handle.to_string());
                assert_eq!(value, "missing");
            }
            other => panic!("expected a range violation, got {other:?}"),
        }
    }
}
