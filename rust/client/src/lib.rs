// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # BIM-FM Client
//!
//! Talks to the BIM-FM backend and keeps its records in a shared cache.
//!
//! ## Overview
//!
//! - [`ApiClient`]: one typed call per backend endpoint
//! - [`QueryCache`]: remote-state cache with request de-duplication,
//!   stale-while-revalidate reads and invalidation by resource
//! - [`queries`]: the cache keys and fetchers pages use
//! - [`InspectionSubmission`]: create an inspection, then analyze its photos
//! - [`Mutation`]: single-call updates that invalidate what they change
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use bimfm_client::{queries, ApiClient, QueryCache, AssetFilter};
//!
//! let api = ApiClient::new("http://localhost:8000");
//! let cache = QueryCache::default();
//!
//! let assets = cache.fetch(&queries::assets(&api, AssetFilter::default())).await?;
//! println!("{} assets", assets.len());
//! ```

pub mod api;
pub mod error;
pub mod mutation;
pub mod queries;
pub mod query;
pub mod submission;

#[cfg(feature = "test-util")]
pub mod testing;

pub use api::{ApiClient, AssetFilter, Attachment, InspectionFilter};
pub use error::{SubmissionError, TransportError};
pub use mutation::{Invalidation, Mutation, MutationState};
pub use query::{
    CacheEntry, Dependent, FetchStatus, Query, QueryCache, QueryKey, Subscription,
    DEFAULT_GRACE_PERIOD, DEFAULT_STALE_TIME,
};
pub use submission::{InspectionGateway, InspectionSubmission, SubmissionState};
