// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Registry Session
//!
//! Sequences key generation, masking, key submission, the ledger client and
//! the decrypt handshake into the two user-facing flows, *store* and
//! *reveal*. Holds no durable state: records are re-read from the ledger and
//! revealed values live only in the [`DecryptedView`].
//!
//! Wallet connection and compute readiness are not ambient: every flow takes
//! a [`SessionContext`].
//!
//! Reveals for different records may overlap. A second reveal of an index
//! that is already in flight is rejected with `RevealInProgress`.

pub mod store;
pub mod view;

use std::collections::HashSet;
use std::sync::Mutex;

use alloy::primitives::Address;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::blockchain::{FileRecord, GrantSigner, KeyHandle, NewFileRecord, RegistryLedger};
use crate::crypto::{
    mask, unmask_text, ContentId, EntropyQuality, EntropySource, FileKey, KeyGenerator, OsEntropy,
};
use crate::error::VaultError;
use crate::fhe::{submit_key, ConfidentialCompute};
use crate::handshake::{self, GrantPolicy, RevealError, RevealStage, RevealedKeys};

pub use store::{OpStatus, PreparedRecord, StoreFlow, StoreState, StoredFile};
pub use view::{DecryptedView, RevealedFile};

/// Explicit inputs to every flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    /// Registry contract the records live in
    pub registry: Address,
    /// Connected principal, if any
    pub principal: Option<Address>,
    /// Whether the confidential-compute client finished initialising
    pub compute_ready: bool,
}

impl SessionContext {
    pub fn new(registry: Address) -> Self {
        Self {
            registry,
            principal: None,
            compute_ready: false,
        }
    }

    pub fn with_principal(mut self, principal: Address) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn with_compute_ready(mut self, ready: bool) -> Self {
        self.compute_ready = ready;
        self
    }

    pub fn require_principal(&self) -> Result<Address, VaultError> {
        self.principal
            .ok_or_else(|| VaultError::input("no wallet connected"))
    }

    pub fn require_compute(&self) -> Result<(), VaultError> {
        if self.compute_ready {
            Ok(())
        } else {
            Err(VaultError::compute_unavailable("client is not initialised"))
        }
    }
}

/// Display state of one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    Hidden,
    Requesting,
    Revealed,
}

type InFlightKey = (Address, u64);

/// Holds record indices as in flight until dropped.
struct RevealClaim<'a> {
    in_flight: &'a Mutex<HashSet<InFlightKey>>,
    keys: Vec<InFlightKey>,
}

impl Drop for RevealClaim<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        for key in &self.keys {
            in_flight.remove(key);
        }
    }
}

/// Last stage a reveal reached, for reporting abandonment.
#[derive(Default)]
struct StageTracker(Mutex<Option<RevealStage>>);

impl StageTracker {
    fn enter(&self, stage: RevealStage) {
        *self.0.lock().unwrap_or_else(|e| e.into_inner()) = Some(stage);
    }

    fn current(&self) -> RevealStage {
        self.0
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .unwrap_or(RevealStage::Prepare)
    }
}

pub struct RegistrySession<L, C, S> {
    ledger: L,
    compute: C,
    signer: S,
    keygen: KeyGenerator<Box<dyn EntropySource>>,
    policy: GrantPolicy,
    view: DecryptedView,
    in_flight: Mutex<HashSet<InFlightKey>>,
}

impl<L, C, S> RegistrySession<L, C, S>
where
    L: RegistryLedger,
    C: ConfidentialCompute,
    S: GrantSigner,
{
    pub fn new(ledger: L, compute: C, signer: S) -> Self {
        Self {
            ledger,
            compute,
            signer,
            keygen: KeyGenerator::with_source(Box::new(OsEntropy) as Box<dyn EntropySource>),
            policy: GrantPolicy::default(),
            view: DecryptedView::new(),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_policy(mut self, policy: GrantPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_entropy<E: EntropySource + 'static>(mut self, source: E) -> Self {
        self.keygen = KeyGenerator::with_source(Box::new(source) as Box<dyn EntropySource>);
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn compute(&self) -> &C {
        &self.compute
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn policy(&self) -> &GrantPolicy {
        &self.policy
    }

    pub fn view(&self) -> &DecryptedView {
        &self.view
    }

    /// Quality of the randomness new keys would be drawn from right now.
    pub fn randomness(&self) -> EntropyQuality {
        self.keygen.probe()
    }

    /// The principal's records, newest first.
    pub async fn list_files(&self, ctx: &SessionContext) -> Result<Vec<FileRecord>, VaultError> {
        let principal = ctx.require_principal()?;
        self.ledger.list(principal).await
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Draw a key, mask `content_id` and submit the key ciphertext.
    pub async fn prepare(
        &self,
        ctx: &SessionContext,
        file_name: &str,
        content_id: &ContentId,
    ) -> Result<PreparedRecord, VaultError> {
        check_store_inputs(ctx, file_name)?;
        let generated = self.keygen.next_key();
        self.commit(ctx, file_name, content_id, generated.key, Some(generated.quality))
            .await
    }

    /// Like [`prepare`](Self::prepare), with a key chosen by the caller.
    pub async fn prepare_with_key(
        &self,
        ctx: &SessionContext,
        file_name: &str,
        content_id: &ContentId,
        key: FileKey,
    ) -> Result<PreparedRecord, VaultError> {
        check_store_inputs(ctx, file_name)?;
        self.commit(ctx, file_name, content_id, key, None).await
    }

    async fn commit(
        &self,
        ctx: &SessionContext,
        file_name: &str,
        content_id: &ContentId,
        key: FileKey,
        randomness: Option<EntropyQuality>,
    ) -> Result<PreparedRecord, VaultError> {
        let principal = ctx.require_principal()?;
        let masked_hash = mask(content_id.as_bytes(), key);
        let input = submit_key(&self.compute, ctx.registry, principal, key).await?;
        Ok(PreparedRecord {
            file_name: file_name.to_string(),
            masked_hash,
            input,
            randomness,
        })
    }

    /// Write a prepared record and wait for the ledger to confirm it.
    pub async fn append_prepared(
        &self,
        ctx: &SessionContext,
        prepared: PreparedRecord,
    ) -> Result<StoredFile, VaultError> {
        let principal = ctx.require_principal()?;
        let key_handle = prepared.input.handle;
        let receipt = self
            .ledger
            .append(
                principal,
                NewFileRecord {
                    file_name: prepared.file_name.clone(),
                    masked_hash: prepared.masked_hash.clone(),
                    input: prepared.input,
                },
            )
            .await?;

        let index = match receipt.index {
            Some(index) => index,
            None => self.ledger.count(principal).await?.saturating_sub(1),
        };
        info!(index, tx_hash = %receipt.tx_hash, "File stored");

        Ok(StoredFile {
            index,
            file_name: prepared.file_name,
            masked_hash: prepared.masked_hash,
            key_handle,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            randomness: prepared.randomness,
        })
    }

    /// Store a record for an existing content identifier.
    pub async fn store(
        &self,
        ctx: &SessionContext,
        file_name: &str,
        content_id: ContentId,
    ) -> Result<StoredFile, VaultError> {
        let mut flow = StoreFlow::new();
        flow.use_content_id(file_name, content_id);
        flow.run(self, ctx).await
    }

    /// Store a record for a local file's bytes.
    pub async fn store_bytes(
        &self,
        ctx: &SessionContext,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredFile, VaultError> {
        let mut flow = StoreFlow::new();
        flow.select_file(file_name, bytes);
        flow.run(self, ctx).await
    }

    // =========================================================================
    // Reveal
    // =========================================================================

    pub async fn reveal(
        &self,
        ctx: &SessionContext,
        index: u64,
    ) -> Result<RevealedFile, RevealError> {
        self.reveal_tracked(ctx, index, &StageTracker::default())
            .await
    }

    /// Reveal, abandoning the attempt as soon as `cancel` fires.
    ///
    /// Abandoning drops the ephemeral keypair and any grant and leaves the
    /// record hidden.
    pub async fn reveal_with_cancel(
        &self,
        ctx: &SessionContext,
        index: u64,
        cancel: &CancellationToken,
    ) -> Result<RevealedFile, RevealError> {
        let progress = StageTracker::default();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let stage = progress.current();
                info!(index, %stage, "Reveal abandoned");
                Err(RevealError::new(stage, VaultError::Cancelled))
            }
            result = self.reveal_tracked(ctx, index, &progress) => result,
        }
    }

    async fn reveal_tracked(
        &self,
        ctx: &SessionContext,
        index: u64,
        progress: &StageTracker,
    ) -> Result<RevealedFile, RevealError> {
        progress.enter(RevealStage::Prepare);
        let principal = ctx
            .require_principal()
            .map_err(RevealError::at(RevealStage::Prepare))?;
        ctx.require_compute()
            .map_err(RevealError::at(RevealStage::Prepare))?;
        let _claim = self
            .claim(principal, &[index])
            .map_err(RevealError::at(RevealStage::Prepare))?;

        progress.enter(RevealStage::LoadRecord);
        let record = self
            .ledger
            .get(principal, index)
            .await
            .map_err(RevealError::at(RevealStage::LoadRecord))?;

        progress.enter(RevealStage::Sign);
        let grant =
            handshake::authorize(&self.compute, &self.signer, ctx.registry, principal, &self.policy)
                .await?;

        progress.enter(RevealStage::Decrypt);
        let keys = handshake::decrypt_with_grant(&self.compute, &grant, &[record.key_handle]).await?;
        drop(grant);

        progress.enter(RevealStage::Unmask);
        let file = open_record(&record, &keys)?;
        self.view.insert(principal, file.clone()).await;
        info!(index, "Record revealed");
        Ok(file)
    }

    /// Reveal every hidden record of the principal under a single grant.
    ///
    /// Either every hidden record is revealed or none is. Returns the full
    /// revealed set, newest first.
    pub async fn reveal_all(&self, ctx: &SessionContext) -> Result<Vec<RevealedFile>, RevealError> {
        let principal = ctx
            .require_principal()
            .map_err(RevealError::at(RevealStage::Prepare))?;
        ctx.require_compute()
            .map_err(RevealError::at(RevealStage::Prepare))?;

        let records = self
            .ledger
            .list(principal)
            .await
            .map_err(RevealError::at(RevealStage::LoadRecord))?;
        let mut hidden = Vec::with_capacity(records.len());
        for record in records {
            if !self.view.contains(principal, record.index).await {
                hidden.push(record);
            }
        }
        if hidden.is_empty() {
            return Ok(self.view.entries(principal).await);
        }

        let indices: Vec<u64> = hidden.iter().map(|r| r.index).collect();
        let _claim = self
            .claim(principal, &indices)
            .map_err(RevealError::at(RevealStage::Prepare))?;
        let handles: Vec<KeyHandle> = hidden.iter().map(|r| r.key_handle).collect();

        let grant =
            handshake::authorize(&self.compute, &self.signer, ctx.registry, principal, &self.policy)
                .await?;
        let keys = handshake::decrypt_with_grant(&self.compute, &grant, &handles).await?;
        drop(grant);

        let files = hidden
            .iter()
            .map(|record| open_record(record, &keys))
            .collect::<Result<Vec<_>, _>>()?;
        info!(count = files.len(), "Records revealed");
        self.view.insert_all(principal, files).await;
        Ok(self.view.entries(principal).await)
    }

    /// `Revealed -> Hidden`. Returns whether the record was revealed.
    pub async fn dismiss(&self, ctx: &SessionContext, index: u64) -> Result<bool, VaultError> {
        let principal = ctx.require_principal()?;
        Ok(self.view.remove(principal, index).await)
    }

    pub async fn reveal_state(
        &self,
        ctx: &SessionContext,
        index: u64,
    ) -> Result<RevealState, VaultError> {
        let principal = ctx.require_principal()?;
        if self.is_in_flight(principal, index) {
            return Ok(RevealState::Requesting);
        }
        if self.view.contains(principal, index).await {
            Ok(RevealState::Revealed)
        } else {
            Ok(RevealState::Hidden)
        }
    }

    /// Revealed records of the principal, newest first.
    pub async fn revealed(&self, ctx: &SessionContext) -> Result<Vec<RevealedFile>, VaultError> {
        let principal = ctx.require_principal()?;
        Ok(self.view.entries(principal).await)
    }

    fn is_in_flight(&self, principal: Address, index: u64) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&(principal, index))
    }

    fn claim(&self, principal: Address, indices: &[u64]) -> Result<RevealClaim<'_>, VaultError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(busy) = indices.iter().find(|i| in_flight.contains(&(principal, **i))) {
            return Err(VaultError::RevealInProgress(*busy));
        }
        let keys: Vec<InFlightKey> = indices.iter().map(|i| (principal, *i)).collect();
        in_flight.extend(keys.iter().copied());
        Ok(RevealClaim {
            in_flight: &self.in_flight,
            keys,
        })
    }
}

fn check_store_inputs(ctx: &SessionContext, file_name: &str) -> Result<(), VaultError> {
    if file_name.trim().is_empty() {
        return Err(VaultError::input("file name is required"));
    }
    ctx.require_principal()?;
    ctx.require_compute()
}

fn open_record(record: &FileRecord, keys: &RevealedKeys) -> Result<RevealedFile, RevealError> {
    let key = keys.get(&record.key_handle).ok_or_else(|| {
        RevealError::new(
            RevealStage::Validate,
            VaultError::RangeViolation {
                handle: record.key_handle.to_string(),
                value: "missing".to_string(),
            },
        )
    })?;

    let malformed = |reason: String| {
        RevealError::new(
            RevealStage::Unmask,
            VaultError::MalformedRecord(format!("record {}: {reason}", record.index)),
        )
    };
    let text = unmask_text(&record.masked_hash, key).map_err(|e| malformed(e.to_string()))?;
    let content_id = ContentId::new(text).map_err(|e| malformed(e.to_string()))?;

    Ok(RevealedFile {
        index: record.index,
        file_name: record.file_name.clone(),
        key,
        content_id,
        key_handle: record.key_handle,
        created_at: record.created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::InMemoryLedger;
    use crate::crypto::{EntropyError, MaskedHash};
    use crate::fhe::{MockCompute, TypedDecryptRequest};
    use alloy::primitives::Signature;
    use alloy::signers::local::PrivateKeySigner;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Counts `warn` events.
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    const REGISTRY: Address = Address::repeat_byte(0x11);

    type TestSession<S = PrivateKeySigner> =
        RegistrySession<Arc<InMemoryLedger>, Arc<MockCompute>, S>;

    struct Fixture<S = PrivateKeySigner> {
        session: Arc<TestSession<S>>,
        ctx: SessionContext,
        ledger: Arc<InMemoryLedger>,
        compute: Arc<MockCompute>,
    }

    fn fixture_with<S: GrantSigner>(signer: S) -> Fixture<S> {
        let ledger = Arc::new(InMemoryLedger::new());
        let compute = Arc::new(MockCompute::localhost());
        let ctx = SessionContext::new(REGISTRY)
            .with_principal(signer.address())
            .with_compute_ready(true);
        let session = Arc::new(RegistrySession::new(ledger.clone(), compute.clone(), signer));
        Fixture {
            session,
            ctx,
            ledger,
            compute,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(PrivateKeySigner::random())
    }

    /// Store "QmExampleHash" under key 12345678.
    async fn store_example<S: GrantSigner>(f: &Fixture<S>) -> StoredFile {
        let prepared = f
            .session
            .prepare_with_key(
                &f.ctx,
                "report.pdf",
                &ContentId::new("QmExampleHash").unwrap(),
                FileKey::new(12_345_678).unwrap(),
            )
            .await
            .unwrap();
        f.session.append_prepared(&f.ctx, prepared).await.unwrap()
    }

    /// Signs only after `release` is notified.
    struct GatedSigner {
        inner: PrivateKeySigner,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    impl GrantSigner for GatedSigner {
        fn address(&self) -> Address {
            self.inner.address()
        }

        fn sign_request(
            &self,
            request: &TypedDecryptRequest,
        ) -> impl Future<Output = Result<Signature, VaultError>> + Send {
            let signing = self.inner.sign_request(request);
            let entered = self.entered.clone();
            let release = self.release.clone();
            async move {
                entered.notify_one();
                release.notified().await;
                signing.await
            }
        }
    }

    struct RefusingSigner(Address);

    impl GrantSigner for RefusingSigner {
        fn address(&self) -> Address {
            self.0
        }

        fn sign_request(
            &self,
            _request: &TypedDecryptRequest,
        ) -> impl Future<Output = Result<Signature, VaultError>> + Send {
            std::future::ready(Err(VaultError::denied("user rejected the request")))
        }
    }

    struct BrokenEntropy;

    impl EntropySource for BrokenEntropy {
        fn try_fill(&self, _dest: &mut [u8]) -> Result<(), EntropyError> {
            Err(EntropyError("no device".to_string()))
        }
    }

    #[tokio::test]
    async fn store_appends_exactly_one_record() {
        let f = fixture();
        let principal = f.ctx.principal.unwrap();
        let content_id = ContentId::from_bytes(b"report body");

        let before = f.ledger.count(principal).await.unwrap();
        let stored = f
            .session
            .store(&f.ctx, "report.pdf", content_id.clone())
            .await
            .unwrap();
        assert_eq!(f.ledger.count(principal).await.unwrap(), before + 1);
        assert_eq!(stored.randomness, Some(EntropyQuality::Secure));

        let record = f.ledger.get(principal, stored.index).await.unwrap();
        assert_eq!(record.file_name, "report.pdf");
        assert_eq!(record.masked_hash, stored.masked_hash);
        assert!(record.created_at > 0);

        // The record round-trips through a reveal with the generated key.
        let revealed = f.session.reveal(&f.ctx, stored.index).await.unwrap();
        assert_eq!(revealed.content_id, content_id);
        assert_eq!(record.masked_hash, mask(content_id.as_bytes(), revealed.key));
    }

    #[tokio::test]
    async fn reveal_recovers_known_key_and_hash() {
        let f = fixture();
        let stored = store_example(&f).await;

        let revealed = f.session.reveal(&f.ctx, stored.index).await.unwrap();
        assert_eq!(revealed.key.value(), 12_345_678);
        assert_eq!(revealed.content_id.as_str(), "QmExampleHash");
        assert_eq!(
            f.session.reveal_state(&f.ctx, stored.index).await.unwrap(),
            RevealState::Revealed
        );
    }

    #[tokio::test]
    async fn dismiss_then_reveal_is_idempotent() {
        let f = fixture();
        let stored = store_example(&f).await;

        let first = f.session.reveal(&f.ctx, stored.index).await.unwrap();
        assert!(f.session.dismiss(&f.ctx, stored.index).await.unwrap());
        assert_eq!(
            f.session.reveal_state(&f.ctx, stored.index).await.unwrap(),
            RevealState::Hidden
        );
        assert!(!f.session.dismiss(&f.ctx, stored.index).await.unwrap());

        let second = f.session.reveal(&f.ctx, stored.index).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn store_rejects_missing_inputs_before_network() {
        let f = fixture();

        let err = f
            .session
            .store(&f.ctx, "", ContentId::new("QmExampleHash").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Input(_)));
        assert!(ContentId::new("").is_err());

        let disconnected = SessionContext::new(REGISTRY).with_compute_ready(true);
        let err = f
            .session
            .store(&disconnected, "report.pdf", ContentId::new("QmExampleHash").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Input(_)));

        assert_eq!(f.compute.issued(), 0);
        assert_eq!(f.ledger.total_records(), 0);
    }

    #[tokio::test]
    async fn uninitialised_compute_is_service_unavailable() {
        let f = fixture();
        let ctx = f.ctx.with_compute_ready(false);
        let err = f
            .session
            .store(&ctx, "report.pdf", ContentId::new("QmExampleHash").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::ServiceUnavailable { .. }));
        assert_eq!(f.compute.issued(), 0);
    }

    #[tokio::test]
    async fn out_of_range_value_never_reaches_view() {
        let f = fixture();
        let stored = store_example(&f).await;
        f.compute
            .overwrite_clear_value(stored.key_handle, serde_json::json!(-12_345_678));

        let err = f.session.reveal(&f.ctx, stored.index).await.unwrap_err();
        assert_eq!(err.stage, RevealStage::Validate);
        assert!(matches!(err.error, VaultError::RangeViolation { .. }));
        assert!(f.session.revealed(&f.ctx).await.unwrap().is_empty());
        assert_eq!(
            f.session.reveal_state(&f.ctx, stored.index).await.unwrap(),
            RevealState::Hidden
        );
    }

    #[tokio::test]
    async fn refused_signature_leaves_record_hidden_and_retryable() {
        let principal = Address::repeat_byte(0xa1);
        let f = fixture_with(RefusingSigner(principal));
        let stored = store_example(&f).await;

        let err = f.session.reveal(&f.ctx, stored.index).await.unwrap_err();
        assert_eq!(err.stage, RevealStage::Sign);
        assert!(matches!(err.error, VaultError::AuthorizationDenied(_)));
        assert_eq!(
            f.session.reveal_state(&f.ctx, stored.index).await.unwrap(),
            RevealState::Hidden
        );

        // The in-flight claim was released, so the same action can be retried.
        let err = f.session.reveal(&f.ctx, stored.index).await.unwrap_err();
        assert_eq!(err.stage, RevealStage::Sign);
    }

    #[tokio::test]
    async fn malformed_masked_hash_is_reported_at_unmask() {
        let f = fixture();
        let principal = f.ctx.principal.unwrap();
        let input = f
            .compute
            .encrypt_u32(12_345_678, REGISTRY, principal)
            .await
            .unwrap();
        f.ledger
            .append(
                principal,
                NewFileRecord {
                    file_name: "broken".to_string(),
                    masked_hash: MaskedHash::from_stored("!!not base64!!"),
                    input,
                },
            )
            .await
            .unwrap();

        let err = f.session.reveal(&f.ctx, 0).await.unwrap_err();
        assert_eq!(err.stage, RevealStage::Unmask);
        assert!(matches!(err.error, VaultError::MalformedRecord(_)));
    }

    #[tokio::test]
    async fn concurrent_reveal_of_same_index_is_rejected() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let f = fixture_with(GatedSigner {
            inner: PrivateKeySigner::random(),
            entered: entered.clone(),
            release: release.clone(),
        });
        let stored = store_example(&f).await;

        let session = f.session.clone();
        let ctx = f.ctx;
        let first = tokio::spawn(async move { session.reveal(&ctx, stored.index).await });
        entered.notified().await;

        assert_eq!(
            f.session.reveal_state(&f.ctx, stored.index).await.unwrap(),
            RevealState::Requesting
        );
        let err = f.session.reveal(&f.ctx, stored.index).await.unwrap_err();
        assert!(matches!(err.error, VaultError::RevealInProgress(i) if i == stored.index));

        release.notify_one();
        let revealed = first.await.unwrap().unwrap();
        assert_eq!(revealed.key.value(), 12_345_678);
        assert_eq!(
            f.session.reveal_state(&f.ctx, stored.index).await.unwrap(),
            RevealState::Revealed
        );
    }

    #[tokio::test]
    async fn cancelled_reveal_discards_attempt() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let f = fixture_with(GatedSigner {
            inner: PrivateKeySigner::random(),
            entered: entered.clone(),
            release: release.clone(),
        });
        let stored = store_example(&f).await;
        let cancel = CancellationToken::new();

        let session = f.session.clone();
        let ctx = f.ctx;
        let token = cancel.clone();
        let attempt =
            tokio::spawn(async move { session.reveal_with_cancel(&ctx, stored.index, &token).await });
        entered.notified().await;
        cancel.cancel();

        let err = attempt.await.unwrap().unwrap_err();
        assert!(matches!(err.error, VaultError::Cancelled));
        assert_eq!(err.stage, RevealStage::Sign);
        assert_eq!(
            f.session.reveal_state(&f.ctx, stored.index).await.unwrap(),
            RevealState::Hidden
        );
        assert!(f.session.revealed(&f.ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reveal_all_uses_one_grant_for_hidden_records() {
        let f = fixture();
        store_example(&f).await;
        f.session
            .store(&f.ctx, "notes.txt", ContentId::from_bytes(b"notes"))
            .await
            .unwrap();
        f.session
            .store(&f.ctx, "photo.jpg", ContentId::from_bytes(b"photo"))
            .await
            .unwrap();
        f.session.reveal(&f.ctx, 1).await.unwrap();

        let revealed = f.session.reveal_all(&f.ctx).await.unwrap();
        let indices: Vec<u64> = revealed.iter().map(|r| r.index).collect();
        assert_eq!(indices, [2, 1, 0]);
        assert_eq!(revealed[2].content_id.as_str(), "QmExampleHash");
        assert_eq!(revealed[1].content_id, ContentId::from_bytes(b"notes"));
    }

    #[tokio::test]
    async fn reveal_all_is_all_or_nothing() {
        let f = fixture();
        store_example(&f).await;
        let second = f
            .session
            .store(&f.ctx, "notes.txt", ContentId::from_bytes(b"notes"))
            .await
            .unwrap();
        f.compute
            .overwrite_clear_value(second.key_handle, serde_json::json!("not a number"));

        let err = f.session.reveal_all(&f.ctx).await.unwrap_err();
        assert!(matches!(err.error, VaultError::RangeViolation { .. }));
        assert!(f.session.revealed(&f.ctx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_grant_window_is_denied() {
        let f = fixture();
        let stored = store_example(&f).await;
        f.compute.advance_clock(chrono::Duration::days(8));

        let err = f.session.reveal(&f.ctx, stored.index).await.unwrap_err();
        assert_eq!(err.stage, RevealStage::Decrypt);
        assert!(matches!(err.error, VaultError::AuthorizationDenied(_)));
    }

    #[tokio::test]
    async fn degraded_randomness_is_reported() {
        let ledger = Arc::new(InMemoryLedger::new());
        let compute = Arc::new(MockCompute::localhost());
        let signer = PrivateKeySigner::random();
        let ctx = SessionContext::new(REGISTRY)
            .with_principal(signer.address())
            .with_compute_ready(true);
        let session = RegistrySession::new(ledger, compute, signer).with_entropy(BrokenEntropy);

        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(WarnCounter(warnings.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        assert_eq!(session.randomness(), EntropyQuality::Degraded);
        let stored = session
            .store(&ctx, "report.pdf", ContentId::new("QmExampleHash").unwrap())
            .await
            .unwrap();
        assert_eq!(stored.randomness, Some(EntropyQuality::Degraded));
        assert_eq!(warnings.load(Ordering::SeqCst), 1, "one warning per degraded key");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let f = fixture();
        for name in ["a", "b", "c"] {
            f.session
                .store(&f.ctx, name, ContentId::from_bytes(name.as_bytes()))
                .await
                .unwrap();
        }
        let names: Vec<String> = f
            .session
            .list_files(&f.ctx)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.file_name)
            .collect();
        assert_eq!(names, ["c", "b", "a"]);
    }

    #[tokio::test]
    async fn slow_signer_does_not_block_other_records() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let f = fixture_with(GatedSigner {
            inner: PrivateKeySigner::random(),
            entered: entered.clone(),
            release: release.clone(),
        });
        let stored = store_example(&f).await;

        let session = f.session.clone();
        let ctx = f.ctx;
        let pending = tokio::spawn(async move { session.reveal(&ctx, stored.index).await });
        entered.notified().await;

        // Store and list still make progress while the signature is outstanding.
        let other = tokio::time::timeout(
            Duration::from_secs(5),
            f.session
                .store(&f.ctx, "notes.txt", ContentId::from_bytes(b"notes")),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(other.index, 1);

        release.notify_one();
        pending.await.unwrap().unwrap();
    }
}
