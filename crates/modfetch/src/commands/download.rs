//! `modfetch download` — runs one `(url, dest)` job, or every job in a
//! batch manifest, through [`modfetch_fetch::fetch`].

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{error, info, warn};

use modfetch_classify::ArtifactKind;
use modfetch_fetch::{
    fetch, CancelToken, ClientOptions, FetchError, FetchJob, FetchOutcome, Governor, ProgressPublisher,
    ReqwestClient, RetryPolicy,
};
use modfetch_metrics::{MetricsSink, NoopSink, TimerSink};
use modfetch_store::Store;

use crate::batch::{Job as ManifestJob, Manifest};
use crate::cli::DownloadArgs;
use crate::config::Settings;
use crate::exit;
use crate::exit::CliError;
use crate::targets;

/// A job normalized from either `--url` or one manifest entry.
struct Job {
    uri: String,
    dest: Option<String>,
    sha256: Option<String>,
    kind: Option<ArtifactKind>,
    place: bool,
    mode: Option<modfetch_fs::PlaceMode>,
}

impl From<&DownloadArgs> for Job {
    fn from(args: &DownloadArgs) -> Self {
        Self {
            uri: args.url.clone().expect("checked by clap required_unless_present"),
            dest: args.dest.as_ref().map(|p| p.to_string_lossy().into_owned()),
            sha256: args.sha256.clone(),
            kind: args.kind.as_deref().and_then(|s| ArtifactKind::from_str(s).ok()),
            place: args.place,
            mode: args.mode.map(Into::into),
        }
    }
}

impl From<ManifestJob> for Job {
    fn from(job: ManifestJob) -> Self {
        Self {
            uri: job.uri,
            dest: job.dest,
            sha256: job.sha256,
            kind: job.kind.as_deref().and_then(|s| ArtifactKind::from_str(s).ok()),
            place: job.place,
            mode: job.mode,
        }
    }
}

#[derive(Debug, Serialize)]
struct JobSummary {
    uri: String,
    dest: String,
    status: String,
    sha256: Option<String>,
    bytes: u64,
    seconds: f64,
    placements: Vec<String>,
    error: Option<String>,
    #[serde(skip)]
    exit_code: i32,
}

pub async fn run(settings: &Settings, args: &DownloadArgs) -> Result<(), CliError> {
    let jobs: Vec<Job> = if let Some(batch_path) = &args.batch {
        Manifest::load(batch_path)
            .map_err(|e| CliError::bad_input(e.to_string()))?
            .jobs
            .into_iter()
            .map(Job::from)
            .collect()
    } else {
        vec![Job::from(args)]
    };

    std::fs::create_dir_all(&settings.general.data_root)?;
    std::fs::create_dir_all(&settings.general.download_root)?;

    let store = Store::open(settings.state_db_path())?;
    let governor = Arc::new(Governor::new(
        settings.concurrency.global_files,
        settings.concurrency.per_host_requests,
    ));
    let timer_sink = match settings.metrics.prometheus_textfile.path.clone() {
        Some(path) if settings.metrics.prometheus_textfile.enabled => Some(Arc::new(TimerSink::new(path))),
        _ => None,
    };
    let metrics: Arc<dyn MetricsSink> = match &timer_sink {
        Some(timer) => Arc::new(timer.sink()),
        None => Arc::new(NoopSink),
    };
    let metrics_flush_task = timer_sink.clone().map(|timer| {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(5));
            loop {
                ticker.tick().await;
                if let Err(e) = timer.flush() {
                    warn!(error = %e, "failed to flush metrics textfile");
                }
            }
        })
    });
    let client = ReqwestClient::with_options(ClientOptions {
        timeout: settings.network.timeout(),
        user_agent: settings.network.user_agent.clone(),
        max_redirects: settings.network.max_redirects,
        tls_verify: settings.network.tls_verify,
    })
    .map_err(|e| CliError::new(exit::NETWORK, e.to_string()))?;

    let cancel = CancelToken::new();
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("received interrupt, cancelling in-flight chunks");
            cancel_for_signal.cancel();
        }
    });

    let retry = RetryPolicy {
        max_retries: settings.concurrency.max_retries,
        min_ms: settings.concurrency.backoff.min_ms,
        max_ms: settings.concurrency.backoff.max_ms,
        jitter: settings.concurrency.backoff.jitter,
        retry_after_cap: std::time::Duration::from_secs(120),
        request_timeout: settings.network.timeout(),
    };

    let no_resume = args.no_resume || settings.general.always_no_resume;
    let mut summaries = Vec::with_capacity(jobs.len());
    let mut worst_exit = exit::OK;

    for job in jobs {
        let summary = run_one_job(
            settings, &store, &governor, &metrics, &client, &cancel, retry, no_resume, job,
        )
        .await;
        let summary = summary.unwrap_or_else(|e| JobSummary {
            uri: String::new(),
            dest: String::new(),
            status: "error".to_string(),
            sha256: None,
            bytes: 0,
            seconds: 0.0,
            placements: Vec::new(),
            error: Some(e.message),
            exit_code: e.code,
        });
        worst_exit = worst_exit.max(summary.exit_code);
        summaries.push(summary);
    }

    if let Some(task) = metrics_flush_task {
        task.abort();
    }
    if let Some(timer) = &timer_sink {
        if let Err(e) = timer.flush() {
            warn!(error = %e, "failed to flush metrics textfile");
        }
    }

    if args.summary_json {
        let json = serde_json::to_string_pretty(&summaries).expect("summaries are always serializable");
        println!("{json}");
    }

    if worst_exit == exit::OK {
        Ok(())
    } else {
        Err(CliError::new(worst_exit, "one or more jobs did not complete successfully"))
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_one_job(
    settings: &Settings,
    store: &Store,
    governor: &Arc<Governor>,
    metrics: &Arc<dyn MetricsSink>,
    client: &ReqwestClient,
    cancel: &CancelToken,
    retry: RetryPolicy,
    no_resume: bool,
    job: Job,
) -> Result<JobSummary, CliError> {
    let resolved = modfetch_resolve::resolve(&job.uri, settings.hf_token_env(), settings.civitai_token_env())?;

    let dest = resolve_dest(settings, &job, &resolved.url)?;
    let dest_str = dest.to_string_lossy().into_owned();

    if no_resume {
        reset_job_state(store, &job.uri, &dest_str, settings.general.partials_root.as_deref(), &dest)?;
    }

    info!(uri = job.uri, dest = %dest.display(), "starting download");
    metrics.inc_active(1);
    let start = Instant::now();

    let (progress, mut progress_rx) = ProgressPublisher::new(None);
    let bar = build_progress_bar(job.uri.clone());
    let progress_task = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while progress_rx.changed().await.is_ok() {
                let snapshot = *progress_rx.borrow();
                if let Some(total) = snapshot.total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(snapshot.bytes_completed);
            }
        })
    };

    let outcome = fetch(FetchJob {
        client,
        store,
        governor,
        metrics,
        progress: &progress,
        url: &resolved.url,
        dest: &dest_str,
        headers: &resolved.headers,
        expected_sha256: job.sha256.clone(),
        partials_root: settings.general.partials_root.as_deref(),
        allow_overwrite: settings.general.allow_overwrite,
        chunk_size: settings.concurrency.chunk_size_bytes(),
        per_file_chunks: settings.concurrency.per_file_chunks,
        cache_ttl: settings.resolver.cache_ttl(),
        cancel,
        retry,
    })
    .await;

    progress_task.abort();
    bar.finish_and_clear();
    metrics.inc_active(-1);
    let elapsed = start.elapsed().as_secs_f64();

    let final_path = match &outcome {
        Ok(FetchOutcome::Completed(p)) | Ok(FetchOutcome::AlreadyPresent(p)) => Some(p.clone()),
        _ => None,
    };

    if matches!(outcome, Ok(FetchOutcome::Completed(_))) {
        metrics.inc_success();
        metrics.observe_download_seconds(elapsed);
    }

    let placements = if job.place {
        match &final_path {
            Some(path) => place_artifact(settings, path, job.kind, job.mode)?,
            None => Vec::new(),
        }
    } else {
        Vec::new()
    };

    match outcome {
        Ok(FetchOutcome::Completed(path)) => {
            let sha256 = std::fs::read_to_string(sidecar_path(&path)).ok().and_then(|s| {
                s.split_whitespace().next().map(str::to_string)
            });
            info!(dest = %path.display(), "download complete");
            Ok(JobSummary {
                uri: job.uri,
                dest: dest_str,
                status: "complete".to_string(),
                sha256,
                bytes: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
                seconds: elapsed,
                placements,
                error: None,
                exit_code: exit::OK,
            })
        }
        Ok(FetchOutcome::AlreadyPresent(path)) => Ok(JobSummary {
            uri: job.uri,
            dest: dest_str,
            status: "complete".to_string(),
            sha256: None,
            bytes: std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0),
            seconds: elapsed,
            placements,
            error: None,
            exit_code: exit::OK,
        }),
        Ok(FetchOutcome::Canceled) => Ok(JobSummary {
            uri: job.uri,
            dest: dest_str,
            status: "canceled".to_string(),
            sha256: None,
            bytes: 0,
            seconds: elapsed,
            placements,
            error: Some("canceled".to_string()),
            exit_code: exit::OTHER,
        }),
        Err(err) => {
            error!(uri = job.uri, error = %err, "download failed");
            let status = match &err {
                FetchError::WholeFileChecksumMismatch { .. } | FetchError::ChunkChecksumMismatch { .. } => {
                    "checksum_mismatch"
                }
                _ => "error",
            };
            let cli_err = CliError::from(&err);
            Ok(JobSummary {
                uri: job.uri,
                dest: dest_str,
                status: status.to_string(),
                sha256: None,
                bytes: 0,
                seconds: elapsed,
                placements,
                error: Some(cli_err.message),
                exit_code: cli_err.code,
            })
        }
    }
}

fn sidecar_path(dest: &Path) -> PathBuf {
    let mut os = dest.as_os_str().to_os_string();
    os.push(".sha256");
    PathBuf::from(os)
}

fn resolve_dest(settings: &Settings, job: &Job, resolved_url: &str) -> Result<PathBuf, CliError> {
    match &job.dest {
        Some(dest) => {
            let path = PathBuf::from(dest);
            Ok(if path.is_absolute() {
                path
            } else {
                settings.general.download_root.join(path)
            })
        }
        None => {
            let basename = resolved_url
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| CliError::bad_input(format!("cannot infer a destination filename from {resolved_url}")))?;
            let basename = basename.split('?').next().unwrap_or(basename);
            Ok(settings.general.download_root.join(basename))
        }
    }
}

/// `--no-resume`: clear any chunk rows and the staged `.part` for this job
/// so the pipeline starts from scratch (spec 6: `--no-resume`).
fn reset_job_state(
    store: &Store,
    url: &str,
    dest: &str,
    partials_root: Option<&Path>,
    dest_path: &Path,
) -> Result<(), CliError> {
    store.delete_chunks(url, dest)?;
    store.delete_download(url, dest)?;
    let staging = modfetch_fs::Staging::new(dest_path, partials_root)?;
    let _ = std::fs::remove_file(staging.path());
    Ok(())
}

fn place_artifact(
    settings: &Settings,
    path: &Path,
    kind_override: Option<ArtifactKind>,
    mode: Option<modfetch_fs::PlaceMode>,
) -> Result<Vec<String>, CliError> {
    let kind = kind_override.unwrap_or_else(|| modfetch_classify::classify(path));
    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target_paths = targets::target_paths(&settings.general.app_dirs, &settings.general.download_root, kind, &basename);
    let mode = mode.unwrap_or(settings.general.placement_mode);
    let placements = modfetch_fs::place(path, &target_paths, mode)?;
    Ok(placements.into_iter().map(|p| p.target.to_string_lossy().into_owned()).collect())
}

fn build_progress_bar(label: String) -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.blue} {prefix:>16.cyan.bold} [{elapsed_precise}] {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
    ) {
        bar.set_style(style.progress_chars("█▓▒░  "));
    }
    bar.set_prefix(label);
    bar
}
