//! Merges CLI overrides into the loaded configuration.

use jarcrawler_core::{Config, SourceId};

use crate::cli::RunArgs;

/// Everything a run needs after flags and file are reconciled.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub config: Config,
    pub sources: Vec<SourceId>,
}

/// Applies `args` on top of `config`.
///
/// Explicit `--source` flags run those sources even when the file disables
/// them; duplicates are dropped, keeping first-mention order.
pub(crate) fn apply_overrides(mut config: Config, args: &RunArgs) -> RunSettings {
    if let Some(dir) = &args.output_dir {
        config.output.dir.clone_from(dir);
    }
    if let Some(retries) = args.max_retries {
        config.pipeline.max_attempts = u32::from(retries) + 1;
    }
    if let Some(throttle) = args.throttle {
        config.pipeline.throttle_ms = throttle;
    }
    if args.no_unresolved {
        config.output.write_unresolved = false;
    }

    let sources = if args.sources.is_empty() {
        config.sources.enabled()
    } else {
        let mut picked = Vec::new();
        for id in &args.sources {
            if !picked.contains(id) {
                picked.push(*id);
            }
        }
        picked
    };

    RunSettings { config, sources }
}
