//! `fetchbin install` – run the full pipeline for one release.
//!
//! The pipeline is blocking (libcurl, file I/O) and runs on a tokio blocking
//! thread. Ctrl-C cancels the download; progress and stage changes are
//! printed from an async task.

use anyhow::Result;
use fetchbin_core::cancel::CancelToken;
use fetchbin_core::config::{FetchbinConfig, LockContention};
use fetchbin_core::fetch::{FetchOptions, HttpFetcher};
use fetchbin_core::install::{InstallOptions, Installer};
use fetchbin_core::pipeline::{Destination, Pipeline, PipelineState};
use fetchbin_core::progress::FetchProgress;
use fetchbin_core::release_table::ReleaseTable;
use std::io::Write;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::cli::InstallArgs;

const PROGRESS_INTERVAL_MS: u128 = 250;

pub async fn run_install(cfg: &FetchbinConfig, args: InstallArgs) -> Result<()> {
    let table = ReleaseTable::load(&args.table.table)?;
    let destination = match (args.dest, args.bin_dir) {
        (Some(path), _) => Destination::Path(path),
        (None, Some(dir)) => Destination::BinDir(dir),
        (None, None) => Destination::BinDir(cfg.resolved_bin_dir()?),
    };

    let mut fetch_opts = FetchOptions::from(cfg);
    fetch_opts.allow_http |= args.allow_http;
    let mut install_opts = InstallOptions::from(cfg);
    if args.no_wait {
        install_opts.lock_contention = LockContention::Fail;
    }

    let (progress_tx, progress_rx) = mpsc::channel::<FetchProgress>(16);
    let (state_tx, state_rx) = mpsc::unbounded_channel::<PipelineState>();
    let printer = tokio::spawn(print_updates(progress_rx, state_rx, args.quiet));

    let cancel = CancelToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\ninterrupted, cancelling download...");
                cancel.cancel();
            }
        })
    };

    let fetcher = HttpFetcher::new(fetch_opts).with_progress(progress_tx);
    let pipeline = Pipeline::new(fetcher, Installer::new(install_opts)).with_observer(state_tx);
    let version = args.version;
    let platform = args.platform;
    let result = tokio::task::spawn_blocking(move || {
        pipeline.run(&table, &version, platform, &destination, &cancel)
    })
    .await?;

    ctrl_c.abort();
    // the pipeline (and with it both senders) is gone, so the printer drains and exits
    let _ = printer.await;

    let report = result?;
    println!(
        "{} {} {} ({}) -> {}",
        report.outcome,
        report.descriptor.name,
        report.descriptor.version,
        report.descriptor.target,
        report.destination.display()
    );
    println!("sha256 {}", report.digest);
    Ok(())
}

async fn print_updates(
    mut progress: mpsc::Receiver<FetchProgress>,
    mut states: mpsc::UnboundedReceiver<PipelineState>,
    quiet: bool,
) {
    let mut progress_open = true;
    let mut states_open = true;
    let mut last_print: Option<Instant> = None;
    let mut mid_line = false;

    while progress_open || states_open {
        tokio::select! {
            p = progress.recv(), if progress_open => match p {
                Some(p) if !quiet => {
                    let now = Instant::now();
                    let due = last_print
                        .map(|t| now.duration_since(t).as_millis() >= PROGRESS_INTERVAL_MS)
                        .unwrap_or(true);
                    if due || p.fraction() == Some(1.0) {
                        eprint!("\r  {}  ", format_progress(&p));
                        let _ = std::io::stderr().flush();
                        last_print = Some(now);
                        mid_line = true;
                    }
                }
                Some(_) => {}
                None => progress_open = false,
            },
            s = states.recv(), if states_open => match s {
                Some(s) if !quiet => {
                    if mid_line {
                        eprintln!();
                        mid_line = false;
                    }
                    match s {
                        PipelineState::Running(stage) => eprintln!("{}...", stage),
                        PipelineState::Failed { .. } | PipelineState::Done | PipelineState::Idle => {}
                    }
                }
                Some(_) => {}
                None => states_open = false,
            },
        }
    }
    if mid_line {
        eprintln!();
    }
}

fn format_progress(p: &FetchProgress) -> String {
    let done_mib = p.bytes_done as f64 / 1_048_576.0;
    let rate_mib = p.bytes_per_sec() / 1_048_576.0;
    let eta = p
        .eta_secs()
        .map(|s| format!("{:.0}s", s))
        .unwrap_or_else(|| "?".to_string());
    let retry = if p.attempt > 1 {
        format!("  (attempt {})", p.attempt)
    } else {
        String::new()
    };
    match (p.total_bytes, p.fraction()) {
        (Some(total), Some(f)) => format!(
            "{:.1} / {:.1} MiB ({:.1}%)  {:.2} MiB/s  ETA {}{}",
            done_mib,
            total as f64 / 1_048_576.0,
            f * 100.0,
            rate_mib,
            eta,
            retry
        ),
        _ => format!("{:.1} MiB  {:.2} MiB/s{}", done_mib, rate_mib, retry),
    }
}
