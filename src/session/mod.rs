// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Session management for authenticated organization handles.
//!
//! - **Session**: credential plus transport bound to one organization,
//!   verified once at creation
//! - **Factory**: builds and verifies sessions on cache misses
//! - **Cache**: at-most-once construction per organization under concurrency
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 SessionCache                  │
//! │   (get_or_create, single flight per endpoint) │
//! └──────────────────────────────────────────────┘
//!            │ hit                  │ miss
//!            ▼                      ▼
//!    ┌───────────────┐     ┌──────────────────────┐
//!    │ Arc<Session>  │     │    SessionFactory    │
//!    │   (shared)    │     │ (credential + verify)│
//!    └───────────────┘     └──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use devlink::session::{PlatformSessionFactory, SessionCache};
//!
//! let factory = PlatformSessionFactory::new(strategy, transports);
//! let cache = SessionCache::new(Arc::new(factory));
//! let session = cache.get_or_create(&endpoint).await?;
//! let projects: serde_json::Value = session.get_json("_apis/projects").await?;
//! ```

mod cache;
mod factory;
mod handle;
mod once_map;

pub use cache::SessionCache;
pub use factory::{PlatformSessionFactory, SessionFactory};
pub use handle::{AuthenticatedUser, Session, CONNECTION_DATA_PATH};
pub use once_map::OnceMap;
