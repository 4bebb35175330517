//! End-to-end behaviour: frames in, safety status out.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use guardian_middleware::{EventBus, FrameLogReplay, Topic, forward_frames};
use guardian_monitor::{
    COLLISION_COMPONENT, CollisionMonitor, DEFAULT_MONITOR_INTERVAL, EMERGENCY_BRAKING_MSG,
    MonitorScheduler, RecurrentRunner, StatusLevel, status_store,
};
use guardian_perception::{Quaternion, TfEngine, Transform3D, Vec3};
use guardian_runtime::{CollisionGuardian, run_collision_node};
use guardian_types::{GuardianConfig, GuardianError, Point3, PointCloudFrame};

const VEHICLE: &str = "novatel";
const LIDAR: &str = "velodyne128";

/// Lidar mounted 1 m behind the vehicle origin, with pose samples recorded
/// every 0.1 s between t = 0 and t = 1.
fn mounted_lidar() -> Arc<TfEngine> {
    let mut tf = TfEngine::new().with_tolerance(0.1);
    for i in 0..=10 {
        let mount = Transform3D::new(Vec3::new(0.0, -1.0, 0.0), Quaternion::identity());
        tf.set_transform(VEHICLE, LIDAR, i as f64 * 0.1, mount);
    }
    Arc::new(tf)
}

/// Six returns that land at (0.5, 5.0, 1.0) in the vehicle frame.
fn obstacle_ahead(timestamp_sec: f64) -> PointCloudFrame {
    PointCloudFrame {
        frame_id: LIDAR.to_string(),
        timestamp_sec,
        points: vec![Point3::new(0.5, 6.0, 1.0); 6],
    }
}

/// Six returns that land on the vehicle's own body.
fn own_body(timestamp_sec: f64) -> PointCloudFrame {
    PointCloudFrame {
        frame_id: LIDAR.to_string(),
        timestamp_sec,
        points: vec![Point3::new(0.5, 2.0, 1.0); 6],
    }
}

fn guardian(bus: &EventBus) -> Result<CollisionGuardian, GuardianError> {
    CollisionGuardian::new(&GuardianConfig::default(), VEHICLE, mounted_lidar(), bus.clone())
}

#[test]
fn sustained_obstacle_triggers_emergency_braking() -> Result<(), GuardianError> {
    let bus = EventBus::default();
    let (writer, reader) = status_store([COLLISION_COMPONENT]);
    let mut monitor = CollisionMonitor::new(&bus, writer, DEFAULT_MONITOR_INTERVAL);
    let mut guardian = guardian(&bus)?;

    assert!(!guardian.process(&obstacle_ahead(0.0))?.is_collision);
    assert!(!guardian.process(&obstacle_ahead(0.1))?.is_collision);
    monitor.run_once(100.0);
    assert!(!reader.emergency_stop_required()?);

    assert!(guardian.process(&obstacle_ahead(0.2))?.is_collision);
    monitor.run_once(100.1);

    let status = reader.snapshot()?;
    assert!(status.require_emergency_stop);
    assert_eq!(status.passenger_msg.as_deref(), Some(EMERGENCY_BRAKING_MSG));
    assert_eq!(status.safety_mode_trigger_time, Some(100.1));
    assert_eq!(status.components[COLLISION_COMPONENT].status, StatusLevel::Fatal);
    Ok(())
}

#[test]
fn transform_gap_mid_streak_keeps_collision_active() -> Result<(), GuardianError> {
    let bus = EventBus::default();
    let (writer, reader) = status_store([COLLISION_COMPONENT]);
    let mut monitor = CollisionMonitor::new(&bus, writer, DEFAULT_MONITOR_INTERVAL);
    let mut guardian = guardian(&bus)?;

    for i in 0..3 {
        guardian.process(&obstacle_ahead(i as f64 * 0.1))?;
    }
    monitor.run_once(1.0);
    assert!(reader.emergency_stop_required()?);

    // No pose recorded anywhere near t = 5.0.
    let result = guardian.process(&obstacle_ahead(5.0));
    assert!(matches!(result, Err(GuardianError::TransformUnavailable { .. })));
    assert_eq!(guardian.consecutive_risk_frames(), 3);

    monitor.run_once(1.1);
    let status = reader.snapshot()?;
    assert!(status.require_emergency_stop);
    assert_eq!(status.safety_mode_trigger_time, Some(1.1));
    Ok(())
}

#[test]
fn one_clear_frame_releases_the_brake() -> Result<(), GuardianError> {
    let bus = EventBus::default();
    let (writer, reader) = status_store([COLLISION_COMPONENT]);
    let mut monitor = CollisionMonitor::new(&bus, writer, DEFAULT_MONITOR_INTERVAL);
    let mut guardian = guardian(&bus)?;

    for i in 0..4 {
        guardian.process(&obstacle_ahead(i as f64 * 0.1))?;
    }
    monitor.run_once(1.0);
    assert!(reader.emergency_stop_required()?);

    assert!(!guardian.process(&own_body(0.5))?.is_collision);
    assert_eq!(guardian.consecutive_risk_frames(), 0);
    monitor.run_once(1.1);

    let status = reader.snapshot()?;
    assert!(!status.require_emergency_stop);
    assert_eq!(status.passenger_msg, None);
    assert_eq!(status.safety_mode_trigger_time, None);
    assert_eq!(status.components[COLLISION_COMPONENT].status, StatusLevel::Ok);
    Ok(())
}

#[tokio::test]
async fn replayed_log_drives_the_scheduled_monitor() -> Result<(), Box<dyn std::error::Error>> {
    let mut log = tempfile::NamedTempFile::new()?;
    for i in 0..5 {
        writeln!(log, "{}", serde_json::to_string(&obstacle_ahead(i as f64 * 0.1))?)?;
    }
    log.flush()?;

    let bus = EventBus::default();
    let shutdown = Arc::new(AtomicBool::new(false));

    let (writer, reader) = status_store([COLLISION_COMPONENT]);
    let mut scheduler = MonitorScheduler::new();
    scheduler.add(Box::new(CollisionMonitor::new(
        &bus,
        writer,
        Duration::from_millis(10),
    )));
    let scheduler_task = tokio::spawn(scheduler.run(Duration::from_millis(5), Arc::clone(&shutdown)));

    let node_task = tokio::spawn(run_collision_node(
        guardian(&bus)?,
        bus.subscribe_to(Topic::PointCloud),
        Arc::clone(&shutdown),
    ));

    let replay = FrameLogReplay::new(log.path());
    assert_eq!(forward_frames(&replay, &bus).await?, 5);

    let mut braking = false;
    for _ in 0..100 {
        if reader.emergency_stop_required()? {
            braking = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    shutdown.store(true, Ordering::SeqCst);
    let guardian = node_task.await?;
    scheduler_task.await?;

    assert!(braking, "monitor never requested emergency braking");
    assert_eq!(guardian.stats().frames_evaluated, 5);
    assert_eq!(guardian.consecutive_risk_frames(), 5);
    Ok(())
}
