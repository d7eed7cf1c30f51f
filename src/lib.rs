//! # recon-core
//!
//! Core engine for adaptive web reconnaissance: a per-target behavioral DNA
//! profile, a weighted multi-signal trust scorer with a hysteresis state
//! machine, an optional LLM advisor bridge, and a long-running crawl loop
//! that ties them together.
//!
//! ## Core Components
//!
//! - **DNA**: a versioned, mutable behavioral profile (identity, timing,
//!   network, interaction, capabilities, temporal genes).
//! - **Scorer**: turns recent request history into a trust score and a
//!   red/yellow/green/established navigation state.
//! - **Advisor**: an optional external LLM consulted when a target is not
//!   clear to navigate, with a deterministic offline fallback.
//! - **Store**: durable SQLite-backed persistence for targets, DNA lineage,
//!   learning history, and request logs.
//! - **Crawl**: the per-target session loop that drives the other four.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use recon_core::config::EngineConfig;
//! use recon_core::crawl::{CrawlEngine, CrawlMode, CrawlRequest};
//! use recon_core::store::{SqliteStore, Target};
//!
//! # async fn run() -> recon_core::error::Result<()> {
//! let store = Arc::new(SqliteStore::in_memory()?);
//! let target = Target::new("https://example.com");
//! store.create_target(&target)?;
//!
//! let engine = CrawlEngine::new(store, EngineConfig::default())?;
//! let request = CrawlRequest::new(target.id, "https://example.com", CrawlMode::Explore)
//!     .with_max_iterations(5);
//! let mut session = engine.start(request)?;
//! while let Some(event) = session.events.recv().await {
//!     tracing::debug!(?event, "crawl event");
//! }
//! # Ok(())
//! # }
//! ```

pub mod advisor;
pub mod config;
pub mod crawl;
pub mod dna;
pub mod error;
pub mod ids;
pub mod scorer;
pub mod store;

pub use advisor::{AdvisorBridge, AdvisorResponse};
pub use crawl::{CrawlEngine, CrawlEvent, CrawlEventType, CrawlMode, CrawlRequest, CrawlSession, SessionStatus};
pub use dna::{Dna, DnaVersion, Gene, Mutator};
pub use error::{Error, Result};
pub use ids::{DnaId, GreenLightStateId, LearningEventId, RequestLogId, SessionId, TargetId};
pub use scorer::{NavigationRecommendation, Scorer, SignalScores};
pub use store::{GreenLightState, GreenLightStatus, Store, Target, TargetStatus};
