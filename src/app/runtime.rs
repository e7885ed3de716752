use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use clap::Parser;
use jarcrawler_core::{
    Config, JsonFileWriter, ResolutionPipeline, SourceId, SourceReport, build_source,
    write_report,
};
use tracing::{debug, error, info, warn};

use crate::ProcessExit;
use crate::app::{exit_handler, list, settings, terminal};
use crate::cli::Cli;

/// How one source run ended.
#[derive(Debug)]
enum SourceOutcome {
    Written {
        report: SourceReport,
        files: Vec<PathBuf>,
    },
    Cancelled {
        report: SourceReport,
    },
    Failed {
        source: SourceId,
        error: String,
    },
}

pub(crate) async fn run_jarcrawler() -> Result<ProcessExit> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();
    terminal::init_tracing(terminal::default_log_level(cli.quiet, cli.verbose));
    debug!(?cli, "CLI arguments parsed");

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    let Some(run_args) = cli.run_args() else {
        print!("{}", list::render_source_list(&config));
        return Ok(ProcessExit::Success);
    };

    let settings = settings::apply_overrides(config, run_args);
    settings
        .config
        .validate()
        .context("invalid configuration after applying flags")?;

    if settings.sources.is_empty() {
        warn!("no sources enabled; nothing to do");
        return Ok(ProcessExit::Success);
    }

    info!(
        sources = ?settings.sources.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        output_dir = %settings.config.output.dir.display(),
        "jarcrawler starting"
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_signal = Arc::clone(&interrupted);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupted_signal.store(true, Ordering::SeqCst);
        }
    });

    let outcomes = run_sources(
        Arc::new(settings.config),
        &settings.sources,
        Arc::clone(&interrupted),
    )
    .await;

    let mut failed = 0usize;
    let mut cancelled = 0usize;
    for outcome in &outcomes {
        match outcome {
            SourceOutcome::Written { report, files } => {
                println!("{report}");
                for file in files {
                    println!("  wrote {}", file.display());
                }
            }
            SourceOutcome::Cancelled { report } => {
                cancelled += 1;
                println!("{report} - not written");
            }
            SourceOutcome::Failed { source, error } => {
                failed += 1;
                println!("{source}: failed: {error}");
            }
        }
    }

    if interrupted.load(Ordering::SeqCst) {
        warn!("Interrupted. Run again to resolve the remaining versions.");
    }

    Ok(exit_handler::determine_exit_outcome(failed, cancelled))
}

/// Runs every source in its own task; each owns its adapter and transport.
async fn run_sources(
    config: Arc<Config>,
    sources: &[SourceId],
    interrupted: Arc<AtomicBool>,
) -> Vec<SourceOutcome> {
    let pipeline = ResolutionPipeline::new(config.pipeline.options()).with_cancellation(interrupted);

    let handles: Vec<_> = sources
        .iter()
        .map(|&id| {
            let config = Arc::clone(&config);
            let pipeline = pipeline.clone();
            (id, tokio::spawn(async move { run_one(id, &config, &pipeline).await }))
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (id, handle) in handles {
        let outcome = handle.await.unwrap_or_else(|join_error| {
            error!(source = %id, error = %join_error, "source task panicked");
            SourceOutcome::Failed {
                source: id,
                error: format!("task failed: {join_error}"),
            }
        });
        outcomes.push(outcome);
    }
    outcomes
}

async fn run_one(id: SourceId, config: &Config, pipeline: &ResolutionPipeline) -> SourceOutcome {
    let adapter = match build_source(id, config) {
        Ok(adapter) => adapter,
        Err(e) => {
            error!(source = %id, error = %e, "cannot build source");
            return SourceOutcome::Failed {
                source: id,
                error: e.to_string(),
            };
        }
    };

    let report = match pipeline.run(adapter.as_ref()).await {
        Ok(report) => report,
        Err(e) => {
            error!(source = %id, error = %e, "source run failed");
            return SourceOutcome::Failed {
                source: id,
                error: e.to_string(),
            };
        }
    };

    if report.cancelled {
        warn!(source = %id, pending = report.pending, "run cancelled; output not written");
        return SourceOutcome::Cancelled { report };
    }

    let writer = JsonFileWriter::new(&config.output.dir);
    match write_report(&writer, &report, config.output.write_unresolved) {
        Ok(files) => SourceOutcome::Written { report, files },
        Err(e) => {
            error!(source = %id, error = %e, path = %e.path().display(), "writing output failed");
            // The resolved report is still shown; only persisting it failed.
            println!("{report}");
            SourceOutcome::Failed {
                source: id,
                error: e.to_string(),
            }
        }
    }
}
