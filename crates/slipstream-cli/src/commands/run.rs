//! The tracker loop
//!
//! Outer loop: wait for the game process with backoff, attach, install
//! hooks, then run one session until the process goes away. Per session,
//! three threads share the work: a poll thread publishing the latest
//! capture into a shared cell, a display thread reading that cell, and
//! the session-recording loop driving the race lifecycle at its own
//! cadence and flushing completed runs to the ghost.

use anyhow::Result;
use slipstream_core::{Config, SignatureSet};

#[cfg(target_os = "windows")]
pub fn execute(config: Config, signatures: SignatureSet) -> Result<()> {
    use std::time::Duration;

    use slipstream_core::memory::layout::timing;
    use slipstream_core::{ExponentialBackoff, RetryStrategy, Slipstream};
    use tracing::{info, warn};

    use crate::shutdown::ShutdownSignal;

    let ghost_path = config
        .last_ghost_path
        .clone()
        .unwrap_or_else(|| config.ghost_dir.join("default.json"));
    info!("Ghost file: {}", ghost_path.display());

    let shutdown = ShutdownSignal::new();
    let mut backoff = ExponentialBackoff::new(
        Duration::from_secs(timing::ATTACH_RETRY_BASE_SECS),
        Duration::from_secs(30),
    );
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let mut app = match Slipstream::attach(&config) {
            Ok(app) => {
                attempt = 0;
                app
            }
            Err(e) => {
                let delay = backoff
                    .next_delay(attempt)
                    .unwrap_or(Duration::from_secs(30));
                info!("Waiting for game process ({}), retrying in {:?}", e, delay);
                if shutdown.wait(delay) {
                    return Ok(());
                }
                continue;
            }
        };

        let report = app.install_hooks(&signatures)?;
        if !report.hooks_ready() {
            warn!(
                "Race-data hook unavailable (missing: {:?}, failed: {:?}); retrying after restart",
                report.missing, report.failed
            );
            if shutdown.wait(Duration::from_secs(10)) {
                return Ok(());
            }
            continue;
        }

        match app.load_ghost(&ghost_path) {
            Ok(ghost) => info!(
                "Comparing against ghost with {} best-split point(s)",
                ghost.best_splits.len()
            ),
            Err(e) if e.is_ghost_not_found() => {
                info!("No ghost yet; the first completed run creates it")
            }
            Err(e) => {
                // A corrupt ghost must not be silently replaced; run
                // without comparison until the user resolves it.
                warn!("Ghost unusable: {} (runs will still be recorded)", e)
            }
        }

        run_session(&mut app, &config, &ghost_path)?;
        info!("Process disconnected, waiting for reconnect...");
    }
}

#[cfg(target_os = "windows")]
fn run_session(
    app: &mut slipstream_core::Slipstream<slipstream_core::ProcessHandle>,
    config: &Config,
    ghost_path: &std::path::Path,
) -> Result<()> {
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    use owo_colors::OwoColorize;
    use slipstream_core::{BestSplit, Capture, interpolate};
    use tracing::info;

    use crate::shutdown::ShutdownSignal;

    let session = ShutdownSignal::new();
    let latest: Mutex<Option<Capture>> = Mutex::new(None);
    let best: Mutex<Vec<BestSplit>> = Mutex::new(
        app.ghosts()
            .active()
            .map(|g| g.best_splits.clone())
            .unwrap_or_default(),
    );
    let extractor = app.extractor_handle();

    thread::scope(|scope| -> Result<()> {
        // Poll thread: producer of the latest-capture cell.
        scope.spawn({
            let extractor = extractor.clone();
            let session = &session;
            let latest = &latest;
            move || {
                while !session.is_shutdown() && extractor.is_attached() {
                    let capture = extractor.capture();
                    *latest.lock().unwrap() = Some(capture);
                    session.wait(Duration::from_millis(config.poll_interval_ms));
                }
            }
        });

        // Display thread: consumer, never blocks the producer beyond the
        // cell's critical section.
        scope.spawn({
            let session = &session;
            let latest = &latest;
            let best = &best;
            move || {
                while !session.wait(Duration::from_millis(500)) {
                    let capture = latest.lock().unwrap().clone();
                    let Some(capture) = capture else { continue };
                    if capture.base == 0 {
                        continue;
                    }
                    let (Some(timer), Some(pct)) =
                        (capture.snapshot.timer_value, capture.snapshot.race_completion_pct)
                    else {
                        continue;
                    };

                    match interpolate(&best.lock().unwrap(), pct as f64) {
                        Some(ghost) => {
                            // The ghost timeline re-bases per region, so
                            // this delta is exact for split-less ghosts
                            // and region-relative otherwise.
                            let delta = timer as f64 - ghost;
                            let sign = if delta <= 0.0 { "-" } else { "+" };
                            let magnitude = format!("{}{:.0} ms", sign, delta.abs());
                            let colored = if delta <= 0.0 {
                                magnitude.green().to_string()
                            } else {
                                magnitude.red().to_string()
                            };
                            println!("{:>9} ms  {:5.1}%  ghost {}", timer, pct, colored);
                        }
                        None => println!("{:>9} ms  {:5.1}%", timer, pct),
                    }
                }
            }
        });

        // Session-recording loop, on this thread: its cadence is its own,
        // not the poll thread's.
        let outcome = (|| -> Result<()> {
            loop {
                if !app.is_attached() {
                    app.poll_session(); // lets the lifecycle discard a torn run
                    return Ok(());
                }
                if let Some(frames) = app.poll_session() {
                    info!("Run complete ({} frames)", frames.len());
                    app.save_race_data(ghost_path, &frames)?;
                    *best.lock().unwrap() = app
                        .ghosts()
                        .active()
                        .map(|g| g.best_splits.clone())
                        .unwrap_or_default();
                }
                if session.wait(Duration::from_millis(config.session_interval_ms)) {
                    return Ok(());
                }
            }
        })();

        session.trigger();
        outcome
    })
}

#[cfg(not(target_os = "windows"))]
pub fn execute(_config: Config, _signatures: SignatureSet) -> Result<()> {
    anyhow::bail!("run drives a Windows game process and is only available on Windows")
}
