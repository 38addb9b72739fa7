//! Render a single captioned video.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use televid_common::config::AppConfig;
use televid_cue_model::CueFormat;
use televid_render_engine::{CueSource, RenderJob, RenderReport};

use super::{build_controller, console_progress, load_styles, print_json};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Input video
    input: PathBuf,

    /// Cue file (SRT, WebVTT, or JSON)
    #[arg(short, long)]
    cues: PathBuf,

    /// Output video; the container follows the extension
    #[arg(short, long)]
    output: PathBuf,

    /// Cue format, when the extension does not tell
    #[arg(long)]
    format: Option<CueFormat>,

    /// Extra style sheet layered over the configured styles
    #[arg(long)]
    styles: Option<PathBuf>,

    /// Engine timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Retries for transient engine failures
    #[arg(long)]
    retries: Option<u32>,

    /// Write a midpoint still of the output here
    #[arg(long)]
    thumbnail: Option<PathBuf>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(config: AppConfig, args: RenderArgs) -> anyhow::Result<()> {
    let styles = load_styles(&config, args.styles.as_deref())?;
    let controller = build_controller(&config, styles);

    let mut job = RenderJob::new(
        &args.input,
        &args.output,
        CueSource::File {
            path: args.cues.clone(),
            format: args.format,
        },
    )
    .with_config_defaults(&config);
    if let Some(secs) = args.timeout {
        job.limits.timeout = Duration::from_secs(secs.max(1));
    }
    if let Some(retries) = args.retries {
        job.retry.max_retries = retries;
    }
    if let Some(path) = args.thumbnail {
        job = job.with_thumbnail(path);
    }
    if !args.json {
        job = job.with_progress(console_progress());
        println!("Rendering {}", args.input.display());
        println!("  Cues: {}", args.cues.display());
        println!("  Output: {}", args.output.display());
        println!("  Job: {}", job.job_id);
    }

    let cancel = job.cancel.clone();
    let mut handle = tokio::task::spawn_blocking(move || controller.render(job));
    let finished = tokio::select! {
        joined = &mut handle => Some(joined),
        _ = tokio::signal::ctrl_c() => None,
    };
    let joined = match finished {
        Some(joined) => joined,
        None => {
            eprintln!("\nInterrupted; stopping the engine...");
            cancel.cancel();
            handle.await
        }
    };
    let report = joined.context("render task panicked")??;

    if args.json {
        print_json(&report)
    } else {
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &RenderReport) {
    println!("\nRender complete: {}", report.output.display());
    println!("  Size: {} bytes", report.output_bytes);
    println!(
        "  Cues: {} ({} text runs drawn)",
        report.cues, report.drawn_runs
    );
    if !report.out_of_range.is_empty() {
        println!(
            "  Skipped (past end of video): cues {:?}",
            report.out_of_range
        );
    }
    if report.attempts > 1 {
        println!("  Attempts: {}", report.attempts);
    }
    if let Some(thumb) = &report.thumbnail {
        println!("  Thumbnail: {}", thumb.display());
    }
    println!("  Elapsed: {:.1}s", report.elapsed_secs);
}
