//! `guardian replay` – boot sequence and status watcher.

use std::io::{self, Write};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use colored::Colorize;
use guardian_middleware::{EventBus, FrameLogReplay, Topic, forward_frames};
use guardian_monitor::{
    COLLISION_COMPONENT, CollisionMonitor, MonitorScheduler, StatusReader, status_store,
};
use guardian_runtime::{CollisionGuardian, run_collision_node};
use tracing::{error, info, warn};

use crate::config::Config;

/// Monitor rounds to wait after the last frame so its verdict is reflected.
const DRAIN_ROUNDS: u32 = 3;

pub async fn replay(
    cfg: Config,
    log: PathBuf,
    rate: Option<NonZeroU32>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), String> {
    println!("{}", "═══════════════════════════════════════".bold());
    println!("{}", "         Guardian Boot Sequence        ".bold().cyan());
    println!("{}", "═══════════════════════════════════════".bold());

    step(1, "Initializing Event Bus");
    let bus = EventBus::default();
    println!("{}", "OK".green());

    step(2, "Loading sensor transforms");
    let tf = cfg.transform_tree();
    println!("{} ({} mount(s))", "OK".green(), cfg.static_transforms.len());
    if !tf.has_frame(&cfg.vehicle_frame_id) {
        warn!(vehicle_frame = %cfg.vehicle_frame_id, "vehicle frame has no configured mounts");
        println!(
            "  {} no transform reaches vehicle frame {}",
            "Note:".yellow(),
            cfg.vehicle_frame_id.bold()
        );
    }

    step(3, "Starting collision guardian");
    let guardian = CollisionGuardian::new(
        &cfg.guardian,
        cfg.vehicle_frame_id.clone(),
        Arc::new(tf),
        bus.clone(),
    )
    .map_err(|e| e.to_string())?;
    let node = tokio::spawn(run_collision_node(
        guardian,
        bus.subscribe_to(Topic::PointCloud),
        shutdown.clone(),
    ));
    println!("{}", "OK".green());

    step(4, "Starting collision monitor");
    let interval = cfg.monitor_interval();
    let (writer, reader) = status_store([COLLISION_COMPONENT]);
    let mut scheduler = MonitorScheduler::new();
    scheduler.add(Box::new(CollisionMonitor::new(&bus, writer, interval)));
    let monitors = tokio::spawn(scheduler.run(interval, shutdown.clone()));
    let watcher = tokio::spawn(watch_status(reader, interval, shutdown.clone()));
    println!("{}", "OK".green());

    println!("{}", "═══════════════════════════════════════".bold());
    println!(
        "  {} Replaying {} ({}), reporting as {}",
        "▶".green().bold(),
        log.display().to_string().bold(),
        rate.map_or_else(|| "unpaced".to_string(), |r| format!("{r} fps")),
        cfg.collision_warning_topic.cyan()
    );

    let mut replay = FrameLogReplay::new(&log);
    if let Some(rate) = rate {
        replay = replay.with_rate(rate);
    }
    let outcome = forward_frames(&replay, &bus).await;

    if !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(interval * DRAIN_ROUNDS).await;
    }
    shutdown.store(true, Ordering::SeqCst);

    let guardian = node.await.map_err(|e| format!("guardian node failed: {e}"))?;
    monitors
        .await
        .map_err(|e| format!("monitor scheduler failed: {e}"))?;
    watcher.await.map_err(|e| format!("status watcher failed: {e}"))?;

    let forwarded = outcome.map_err(|e| {
        error!(error = %e, "replay aborted");
        e.to_string()
    })?;

    let stats = guardian.stats();
    info!(forwarded, "replay finished");
    println!();
    println!("{}", "Summary".bold().underline());
    println!("  frames forwarded    {forwarded}");
    println!("  frames evaluated    {}", stats.frames_evaluated);
    println!("  transform failures  {}", stats.transform_failures);
    println!("  frames lost to lag  {}", stats.lagged_frames);
    println!("  collision signals   {}", stats.collision_signals);
    Ok(())
}

fn step(n: u32, label: &str) {
    print!("  [{n}/4] {} … ", label.bold());
    io::stdout().flush().ok();
}

/// Print a line whenever the emergency-stop request changes.
async fn watch_status(reader: StatusReader, period: Duration, shutdown: Arc<AtomicBool>) {
    let mut braking = false;
    let mut ticker = tokio::time::interval(period);
    while !shutdown.load(Ordering::SeqCst) {
        ticker.tick().await;
        let status = match reader.snapshot() {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "status unavailable");
                break;
            }
        };
        if status.require_emergency_stop == braking {
            continue;
        }
        braking = status.require_emergency_stop;
        if braking {
            println!(
                "  {} {}",
                "🔴".red(),
                status.passenger_msg.unwrap_or_default().red().bold()
            );
        } else {
            println!("  {} {}", "🟢".green(), "Path clear".green());
        }
    }
}
