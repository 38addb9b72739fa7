//! Render a manifest of jobs concurrently.
//!
//! Manifest format:
//!
//! ```json
//! {
//!   "styles": "styles.json",
//!   "jobs": [
//!     { "input": "a.mp4", "cues": "a.srt", "output": "out/a.mp4" },
//!     { "input": "b.mkv", "cues": "b.txt", "format": "vtt", "output": "out/b.mkv",
//!       "thumbnail": "out/b.png", "timeout_secs": 600 }
//!   ]
//! }
//! ```
//!
//! Relative paths resolve against the manifest's directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use televid_common::config::AppConfig;
use televid_common::error::TelevidError;
use televid_cue_model::CueFormat;
use televid_render_engine::{CancelHandle, CueSource, RenderJob, RenderReport};
use tokio::sync::Semaphore;

use super::{build_controller, load_styles, print_json};

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// JSON manifest listing the jobs
    manifest: PathBuf,

    /// Jobs rendered at the same time
    #[arg(short, long, default_value = "2")]
    jobs: usize,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    styles: Option<PathBuf>,
    jobs: Vec<ManifestJob>,
}

#[derive(Debug, Deserialize)]
struct ManifestJob {
    input: PathBuf,
    cues: PathBuf,
    output: PathBuf,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    thumbnail: Option<PathBuf>,
    #[serde(default)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Serialize)]
struct JobSummary {
    index: usize,
    job_id: String,
    output: PathBuf,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RenderReport>,
}

fn load_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    let mut manifest: Manifest = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let resolve = |p: &mut PathBuf| {
        if p.is_relative() {
            *p = base.join(&*p);
        }
    };
    if let Some(styles) = manifest.styles.as_mut() {
        resolve(styles);
    }
    for job in &mut manifest.jobs {
        resolve(&mut job.input);
        resolve(&mut job.cues);
        resolve(&mut job.output);
        if let Some(thumb) = job.thumbnail.as_mut() {
            resolve(thumb);
        }
    }
    Ok(manifest)
}

impl ManifestJob {
    fn into_job(self, config: &AppConfig) -> anyhow::Result<RenderJob> {
        let format = self
            .format
            .as_deref()
            .map(str::parse::<CueFormat>)
            .transpose()
            .map_err(anyhow::Error::msg)?;
        let mut job = RenderJob::new(
            self.input,
            self.output,
            CueSource::File {
                path: self.cues,
                format,
            },
        )
        .with_config_defaults(config);
        if let Some(secs) = self.timeout_secs {
            job.limits.timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(thumb) = self.thumbnail {
            job = job.with_thumbnail(thumb);
        }
        Ok(job)
    }
}

fn summarize(
    index: usize,
    job_id: String,
    output: PathBuf,
    result: anyhow::Result<RenderReport>,
) -> JobSummary {
    match result {
        Ok(report) => JobSummary {
            index,
            job_id,
            output,
            status: "succeeded",
            error_kind: None,
            error: None,
            report: Some(report),
        },
        Err(err) => JobSummary {
            index,
            job_id,
            output,
            status: "failed",
            error_kind: Some(
                err.downcast_ref::<TelevidError>()
                    .map(TelevidError::kind)
                    .unwrap_or("other"),
            ),
            error: Some(format!("{err:#}")),
            report: None,
        },
    }
}

pub async fn run(config: AppConfig, args: BatchArgs) -> anyhow::Result<()> {
    let manifest = load_manifest(&args.manifest)?;
    let styles = load_styles(&config, manifest.styles.as_deref())?;
    let controller = Arc::new(build_controller(&config, styles));
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));
    let total = manifest.jobs.len();

    tracing::info!(
        manifest = %args.manifest.display(),
        jobs = total,
        concurrency = args.jobs.max(1),
        "Starting batch"
    );

    let mut cancels: Vec<CancelHandle> = Vec::with_capacity(total);
    let mut pending = Vec::with_capacity(total);
    let mut summaries = Vec::with_capacity(total);

    for (index, entry) in manifest.jobs.into_iter().enumerate() {
        let output = entry.output.clone();
        let job = match entry.into_job(&config) {
            Ok(job) => job,
            Err(err) => {
                summaries.push(summarize(index, String::new(), output, Err(err)));
                continue;
            }
        };
        cancels.push(job.cancel.clone());

        let controller = controller.clone();
        let semaphore = semaphore.clone();
        let job_id = job.job_id.clone();
        pending.push(tokio::spawn(async move {
            let render = async {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .context("batch semaphore closed")?;
                let report = tokio::task::spawn_blocking(move || controller.render(job))
                    .await
                    .context("render task panicked")??;
                anyhow::Ok(report)
            };
            summarize(index, job_id, output, render.await)
        }));
    }

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted; cancelling {} job(s)...", cancels.len());
            for cancel in &cancels {
                cancel.cancel();
            }
        }
    });

    for task in pending {
        summaries.push(task.await.context("batch task panicked")?);
    }
    interrupt.abort();
    summaries.sort_by_key(|s| s.index);

    let failed = summaries.iter().filter(|s| s.status == "failed").count();
    if args.json {
        print_json(&summaries)?;
    } else {
        for s in &summaries {
            match &s.error {
                None => println!("[OK]   #{} {}", s.index, s.output.display()),
                Some(err) => println!("[FAIL] #{} {}: {err}", s.index, s.output.display()),
            }
        }
        println!("\n{} of {} job(s) succeeded.", total - failed, total);
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} job(s) failed");
    }
    Ok(())
}
