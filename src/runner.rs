use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::journey::{run_iteration, JourneyProfile};
use crate::metrics::Metrics;
use crate::profile::RampProfile;

const TICK: Duration = Duration::from_millis(100);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

struct VirtualUser {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// One virtual user: journey iterations back to back until told to stop.
/// A stop signal may cut an iteration mid-flight; nothing needs cleanup
/// since no state outlives an iteration.
async fn vu_loop(
    id: usize,
    client: Client,
    base_url: String,
    journey: JourneyProfile,
    metrics: Metrics,
    mut stop: oneshot::Receiver<()>,
) {
    metrics.vu_started();
    debug!("virtual user {id} started");
    let mut rng = StdRng::from_os_rng();
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = run_iteration(&client, &base_url, &journey, &metrics, &mut rng) => {
                metrics.add_iteration();
            }
        }
    }
    metrics.vu_stopped();
    debug!("virtual user {id} stopped");
}

/// Walk the ramp profile: every tick, interpolate the current virtual-user
/// target, spawn up to it and retire down to it. Returns the wall-clock run
/// duration once the profile is exhausted and the users have wound down.
pub async fn run(
    client: Client,
    base_url: String,
    ramp: RampProfile,
    journey: JourneyProfile,
    metrics: Metrics,
    shutdown_grace: Duration,
) -> Result<Duration> {
    let started = Instant::now();
    let total = ramp.total_duration();
    info!(
        "starting ramp: {} stages over {:?}",
        ramp.stages().len(),
        total
    );

    let mut vus: Vec<VirtualUser> = Vec::new();
    let mut retired: Vec<JoinHandle<()>> = Vec::new();
    let mut spawned = 0usize;
    let mut last_log = Instant::now();

    while started.elapsed() < total {
        let target = ramp.target_at(started.elapsed());

        while vus.len() < target {
            let (stop_tx, stop_rx) = oneshot::channel();
            let id = spawned;
            spawned += 1;
            let task = tokio::spawn(vu_loop(
                id,
                client.clone(),
                base_url.clone(),
                journey.clone(),
                metrics.clone(),
                stop_rx,
            ));
            vus.push(VirtualUser {
                stop: stop_tx,
                task,
            });
        }

        while vus.len() > target {
            if let Some(vu) = vus.pop() {
                vu.stop.send(()).ok();
                retired.push(vu.task);
            }
        }

        sleep(TICK).await;

        if last_log.elapsed() >= PROGRESS_INTERVAL {
            info!(
                "ramp: target={}, active={}, iterations={}, requests={}",
                target,
                metrics.active_vus(),
                metrics.iterations(),
                metrics.total_requests()
            );
            last_log = Instant::now();
        }
    }

    info!(
        "ramp complete: {} spawned, {} still active",
        spawned,
        metrics.active_vus()
    );

    let mut tasks = retired;
    for vu in vus {
        vu.stop.send(()).ok();
        tasks.push(vu.task);
    }

    tokio::select! {
        _ = sleep(shutdown_grace) => {
            info!("shutdown grace period reached");
        }
        _ = async {
            futures_util::future::join_all(tasks).await;
        } => {
            debug!("all virtual users stopped");
        }
    }

    Ok(started.elapsed())
}
