//! `tessel build`: configure and run one pipeline.

use std::time::Instant;

use tessel_bundler::{BuildReport, Pipeline};
use tessel_config::{BuildOptions, validate_fs};

use crate::cli::BuildArgs;
use crate::commands::{Project, parse_entry};
use crate::error::Result;
use crate::ui;

/// Execute the build command.
///
/// 1. Merge the profile for the resolved mode over the config
/// 2. Apply command-line overrides
/// 3. Check entries and the HTML template exist
/// 4. Run the pipeline; Ctrl-C cancels it and nothing is written
/// 5. Print the summary
pub async fn execute(args: BuildArgs, project: Project) -> Result<()> {
    let start_time = Instant::now();

    let mode = project.mode(args.mode);
    let options = apply_overrides(project.options_for(mode)?, &args)?;
    validate_fs(&options, &project.root)?;

    match &project.config_path {
        Some(path) => ui::info(&format!("Using config {}", path.display())),
        None => ui::info("No config file found, using defaults"),
    }
    ui::info(&format!(
        "Building {} entr{} ({})",
        options.entries.len(),
        if options.entries.len() == 1 { "y" } else { "ies" },
        mode.as_str()
    ));

    let summary = project.config.settings.summary.unwrap_or(true);
    let report = run(Pipeline::new(&project.root, options)).await?;

    if summary {
        ui::print_build_summary(&report.files, report.duration);
    }
    if report.removed > 0 {
        ui::info(&format!("Removed {} stale file(s)", report.removed));
    }
    ui::success(&format!(
        "Built {} assets into {} chunks in {}",
        report.assets,
        report.chunks,
        ui::format_duration(start_time.elapsed())
    ));
    Ok(())
}

/// Run the pipeline, cancelling it on Ctrl-C.
async fn run(pipeline: Pipeline) -> Result<BuildReport> {
    let cancel = pipeline.cancel_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ui::warning("Interrupted, cancelling build");
            cancel.cancel();
        }
    });

    let result = pipeline.run().await;
    interrupt.abort();
    Ok(result?)
}

fn apply_overrides(mut options: BuildOptions, args: &BuildArgs) -> Result<BuildOptions> {
    if !args.entries.is_empty() {
        options.entries.clear();
        for spec in &args.entries {
            let (name, path) = parse_entry(spec)?;
            options = options.with_entry(name, path);
        }
    }
    if let Some(dir) = &args.out_dir {
        options = options.with_output_dir(dir);
    }
    if let Some(workers) = args.workers {
        options = options.with_workers(workers);
    }
    if args.no_clean {
        options.clean = false;
    }
    Ok(options)
}
