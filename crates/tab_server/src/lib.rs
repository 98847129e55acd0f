//! Tâb game server library.
//!
//! Authoritative server for two-player Tâb matches: credentials, session
//! matchmaking, turn handling through [`tab_game`], write-through
//! persistence and live state push over Server-Sent Events.
//!
//! # Architecture
//!
//! - **Store**: repository of users and game snapshots (JSON files or memory)
//! - **Registry**: live sessions, each behind its own lock
//! - **Broadcaster**: per-session fan-out of state frames with keep-alives
//! - **Service**: the facade every HTTP handler calls
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tab_game::StickDice;
//! use tab_server::{Broadcaster, GameService, MemoryStore, router};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let service = GameService::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(StickDice),
//!     Broadcaster::new(32),
//!     10,
//! );
//! let app = router(Arc::new(service));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8008").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod auth;
mod broadcast;
mod config;
mod error;
mod ranking;
mod registry;
mod routes;
mod service;
mod sse;
mod store;

// Crate-level exports - Credentials
pub use auth::{authenticate, digest, register};

// Crate-level exports - Push channels
pub use broadcast::{Broadcaster, Frame, KeepAliveTask, Subscription};

// Crate-level exports - Configuration
pub use config::{ConfigError, ServerConfig};

// Crate-level exports - Errors
pub use error::ServiceError;

// Crate-level exports - Leaderboard
pub use ranking::{RankingEntry, ranking};

// Crate-level exports - Sessions
pub use registry::{Matchmaker, SessionRegistry, SharedSession, mint_session_id};

// Crate-level exports - HTTP
pub use routes::{
    AppState, GameRequest, JoinRequest, NotifyRequest, RankingRequest, RankingResponse,
    RegisterRequest, RollResponse, router,
};
pub use sse::UpdateQuery;

// Crate-level exports - Service
pub use service::{GameService, JoinTicket};

// Crate-level exports - Storage
pub use store::{JsonFileStore, MemoryStore, Repository, Stats, StatsKey, StoreError, UserRecord};
