//! Source-independent resolution: latest-build selection, URL composition,
//! per-version outcomes and the pipeline that ties them together.

mod compose;
mod error;
mod outcome;
mod pipeline;
mod select;

pub use compose::{ComposeError, UrlRule, compose};
pub use error::PipelineError;
pub use outcome::{
    ResolvedEntry, ResultMapping, SourceReport, UnresolvedEntry, UnresolvedReason,
};
pub use pipeline::{
    DEFAULT_PAGE_READY_TIMEOUT, PipelineOptions, PipelineState, ResolutionPipeline,
};
pub use select::select_latest;
