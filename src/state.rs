// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::blockchain::NetworkConfig;
use crate::session::{RegistrySession, SessionContext};

pub struct AppState<L, C, S> {
    pub session: Arc<RegistrySession<L, C, S>>,
    pub context: SessionContext,
    pub network: NetworkConfig,
    /// Fires on shutdown; outstanding reveals are abandoned.
    pub shutdown: CancellationToken,
}

impl<L, C, S> AppState<L, C, S> {
    pub fn new(
        session: RegistrySession<L, C, S>,
        context: SessionContext,
        network: NetworkConfig,
    ) -> Self {
        Self {
            session: Arc::new(session),
            context,
            network,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

// Manual impl: the backends themselves need not be `Clone`.
impl<L, C, S> Clone for AppState<L, C, S> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            context: self.context,
            network: self.network.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}
