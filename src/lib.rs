//! jarcrawler core library
//!
//! Resolves, for every version a server-jar upstream publishes, the download
//! URL of its latest build, and writes one JSON mapping per source/channel.
//!
//! # Architecture
//!
//! - [`transport`] - HTTP client, retry classification, per-host throttle
//! - [`source`] - the [`SourceAdapter`] contract and one adapter per upstream
//! - [`resolve`] - build selection, URL composition and the [`ResolutionPipeline`]
//! - [`output`] - JSON writers for finished source reports
//! - [`config`] - TOML configuration with validated defaults
//!
//! ```no_run
//! use jarcrawler_core::{Config, ResolutionPipeline, SourceId, build_source};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let pipeline = ResolutionPipeline::new(config.pipeline.options());
//! let adapter = build_source(SourceId::Paper, &config)?;
//! let report = pipeline.run(adapter.as_ref()).await?;
//! println!("{report}");
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod output;
pub mod resolve;
pub mod source;
pub mod transport;
mod user_agent;

pub use config::{Config, ConfigError};
pub use output::{JsonFileWriter, ResultWriter, WriteError, write_report};
pub use resolve::{
    PipelineError, PipelineOptions, ResolutionPipeline, ResultMapping, SourceReport,
    UnresolvedReason, UrlRule,
};
pub use source::{SourceAdapter, SourceId, build_source};
pub use transport::{FetchError, HttpClient, RetryPolicy, Throttle};
