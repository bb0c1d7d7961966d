//! Postermill - progressive map-poster generation pipeline.
//!
//! This library turns a place name into a rendered map poster through a
//! staged, cancellable job pipeline. A client creates a job and gets a
//! handle back immediately; the pipeline resolves the place, downloads the
//! street network and secondary features (water, parks), renders the poster,
//! and then widens coverage to additional radii in the background. Cached
//! per-radius datasets allow cheap re-renders when the client toggles
//! feature flags, switches theme, or switches radius - no re-fetching.
//!
//! # High-Level API
//!
//! The [`service`] module provides the facade consumed by request handlers:
//!
//! ```ignore
//! use postermill::service::PosterService;
//! use postermill::config::PipelineConfig;
//! use postermill::job::JobSettings;
//!
//! let service = PosterService::new(
//!     PipelineConfig::default(),
//!     locator, network, features, renderer, themes,
//! );
//!
//! let job_id = service.create_job(JobSettings::new("Prague", "noir"))?;
//! let snapshot = service.status(&job_id); // poll until complete
//! ```

pub mod config;
pub mod error;
pub mod geo;
pub mod job;
pub mod limiter;
pub mod logging;
pub mod pipeline;
pub mod providers;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod service;
pub mod sweeper;
pub mod theme;

/// Version of the postermill library.
///
/// Defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
