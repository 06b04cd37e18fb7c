// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Single-call mutations followed by cache invalidation.

use crate::error::TransportError;
use crate::query::{QueryCache, QueryKey};
use std::future::Future;

/// Cache entries refreshed after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Every key of a resource.
    Resource(&'static str),
    /// One exact key.
    Key(QueryKey),
}

impl Invalidation {
    fn apply(&self, cache: &QueryCache) {
        match self {
            Self::Resource(resource) => cache.invalidate_resource(resource),
            Self::Key(key) => cache.invalidate(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationState {
    Idle,
    Submitting,
    Done,
    Failed(TransportError),
}

/// `Idle -> Submitting -> {Done, Failed}` for one backend call.
#[derive(Debug)]
pub struct Mutation {
    name: &'static str,
    invalidates: Vec<Invalidation>,
    state: MutationState,
}

impl Mutation {
    pub fn new(name: &'static str, invalidates: Vec<Invalidation>) -> Self {
        Self {
            name,
            invalidates,
            state: MutationState::Idle,
        }
    }

    pub fn state(&self) -> &MutationState {
        &self.state
    }

    /// Run `call`; on success apply the invalidations. No retry on failure.
    pub async fn run<T, Fut>(&mut self, cache: &QueryCache, call: Fut) -> Result<T, TransportError>
    where
        Fut: Future<Output = Result<T, TransportError>>,
    {
        self.state = MutationState::Submitting;
        match call.await {
            Ok(value) => {
                for invalidation in &self.invalidates {
                    invalidation.apply(cache);
                }
                tracing::debug!(mutation = self.name, "Mutation done");
                self.state = MutationState::Done;
                Ok(value)
            }
            Err(error) => {
                tracing::warn!(mutation = self.name, error = %error, "Mutation failed");
                self.state = MutationState::Failed(error.clone());
                Err(error)
            }
        }
    }
}
