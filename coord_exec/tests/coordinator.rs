//! Coordinator integration tests
//!
//! The coordinator is driven through its telecommand and cycle interfaces with an in-memory bus
//! and a manual clock, no network is involved.

use std::{
    sync::{mpsc::Receiver, Arc},
    thread,
    time::Duration,
};

use comms_if::{
    bus::{BusMsg, Topic},
    eqpt::{
        cam::CamImage,
        det::{Detection, DetectionMsg},
        gps::GpsReport,
        imu::SensorSample,
    },
    tc::{Tc, Waypoint, CODE_OK},
};
use coord_lib::{
    cmd_bus::{bus_channel, inbound_channels, InboundTx},
    coordinator::{Coordinator, Params},
    mode::Mode,
    nav_worker,
};
use chrono::{TimeZone, Utc};
use image::GenericImageView;
use util::time::ManualClock;

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

struct Rig {
    coord: Coordinator,
    inbound: InboundTx,
    bus: Receiver<BusMsg>,
    clock: Arc<ManualClock>,
}

fn rig() -> Rig {
    let (bus_tx, bus) = bus_channel();
    let (inbound, inbound_rx) = inbound_channels();
    let clock = Arc::new(ManualClock::new());

    let coord = Coordinator::new(
        Params::default(),
        nav_worker::Params::default(),
        bus_tx,
        inbound_rx,
        clock.clone(),
    )
    .unwrap();

    Rig {
        coord,
        inbound,
        bus,
        clock,
    }
}

fn set_mode(rig: &mut Rig, mode: &str) -> bool {
    rig.coord
        .handle(Tc::SetMode {
            mode: mode.to_string(),
        })
        .is_ok()
}

/// Payloads published on the control topic since the last call.
fn control_payloads(bus: &Receiver<BusMsg>) -> Vec<String> {
    bus.try_iter()
        .filter(|m| m.topic == Topic::Control)
        .map(|m| m.payload)
        .collect()
}

fn detection(x: f64, y: f64, area: f64) -> DetectionMsg {
    DetectionMsg {
        detections: vec![Detection {
            center: [x, y],
            area,
        }],
    }
}

fn level_north() -> SensorSample {
    SensorSample {
        acc: [0.0, 0.0, 1.0],
        mag: [1.0, 0.0, 0.0],
    }
}

// ---------------------------------------------------------------------------
// MODES
// ---------------------------------------------------------------------------

#[test]
fn test_invalid_mode_is_rejected() {
    let mut rig = rig();

    assert!(set_mode(&mut rig, "face_tracking"));
    assert_eq!(rig.coord.mode(), Mode::Tracking);

    let r = rig.coord.handle(Tc::SetMode {
        mode: "dance".into(),
    });
    assert!(!r.is_ok());
    assert_eq!(r.status(), Some("Invalid mode selected"));
    assert_eq!(rig.coord.mode(), Mode::Tracking);
}

#[test]
fn test_mode_change_publishes_neutral() {
    let mut rig = rig();

    assert!(set_mode(&mut rig, "face_tracking"));
    assert_eq!(control_payloads(&rig.bus), vec!["64 64"]);

    // Re-entering the same mode changes nothing
    assert!(set_mode(&mut rig, "face_tracking"));
    assert!(control_payloads(&rig.bus).is_empty());
}

// ---------------------------------------------------------------------------
// TRACKING
// ---------------------------------------------------------------------------

#[test]
fn test_tracking_end_to_end() {
    let mut rig = rig();
    assert!(set_mode(&mut rig, "face_tracking"));
    control_payloads(&rig.bus);

    rig.inbound.detections.send(detection(420.0, 240.0, 4000.0)).unwrap();
    let report = rig.coord.step().unwrap();

    assert_eq!(report.emitted.map(|c| c.to_string()), Some("126 126".into()));
    assert_eq!(control_payloads(&rig.bus), vec!["126 126"]);
}

#[test]
fn test_tracking_without_detection_is_neutral() {
    let mut rig = rig();
    assert!(set_mode(&mut rig, "face_tracking"));
    control_payloads(&rig.bus);

    rig.coord.step().unwrap();
    rig.inbound.detections.send(DetectionMsg::default()).unwrap();
    let report = rig.coord.step().unwrap();

    assert!(report.track_status.unwrap().target_lost);
    assert_eq!(control_payloads(&rig.bus), vec!["64 64", "64 64"]);
}

#[test]
fn test_only_newest_detection_is_used() {
    let mut rig = rig();
    assert!(set_mode(&mut rig, "face_tracking"));
    control_payloads(&rig.bus);

    rig.inbound.detections.send(detection(420.0, 240.0, 4000.0)).unwrap();
    rig.inbound.detections.send(DetectionMsg::default()).unwrap();
    rig.coord.step().unwrap();

    assert_eq!(control_payloads(&rig.bus), vec!["64 64"]);
}

#[test]
fn test_manual_moves_rejected_outside_manual() {
    let mut rig = rig();
    assert!(set_mode(&mut rig, "face_tracking"));
    control_payloads(&rig.bus);

    for tc in vec![Tc::MoveForward, Tc::MoveBackward, Tc::MoveLeft, Tc::MoveRight] {
        let r = rig.coord.handle(tc);
        assert_eq!(r.status(), Some("Cannot move in current mode"));
    }
    assert!(!rig.coord.handle(Tc::MoveRailForward).is_ok());
    assert!(!rig.coord.handle(Tc::PumpOn).is_ok());

    assert!(control_payloads(&rig.bus).is_empty());
    assert_eq!(rig.coord.mode(), Mode::Tracking);
}

#[test]
fn test_tracking_adjustments() {
    let mut rig = rig();

    for _ in 0..3 {
        assert!(rig.coord.handle(Tc::IncreaseFaceArea).is_ok());
    }
    assert_eq!(rig.coord.track_ctrl().desired_area(), 5300.0);

    assert!(rig.coord.handle(Tc::MoveCenterLeft).is_ok());
    assert!(rig.coord.handle(Tc::MoveCenterLeft).is_ok());
    assert!(rig.coord.handle(Tc::MoveCenterRight).is_ok());
    assert_eq!(rig.coord.track_ctrl().center_offset(), -10.0);
}

// ---------------------------------------------------------------------------
// SAFETY OVERRIDE
// ---------------------------------------------------------------------------

#[test]
fn test_estop_forces_neutral() {
    let mut rig = rig();

    assert!(rig.coord.handle(Tc::EStop).is_ok());
    assert!(rig.coord.is_overridden());
    assert_eq!(control_payloads(&rig.bus), vec!["64 64"]);

    // Manual demands are refused
    assert!(!rig.coord.handle(Tc::MoveForward).is_ok());
    assert!(!rig.coord.handle(Tc::MoveRailBackward).is_ok());

    // Tracking output is replaced by neutral
    assert!(set_mode(&mut rig, "face_tracking"));
    control_payloads(&rig.bus);
    rig.inbound.detections.send(detection(420.0, 240.0, 4000.0)).unwrap();
    rig.coord.step().unwrap();
    assert_eq!(control_payloads(&rig.bus), vec!["64 64"]);

    // Releasing the override resumes the current mode
    assert!(rig.coord.handle(Tc::UndoEStop).is_ok());
    assert!(!rig.coord.is_overridden());
    rig.inbound.detections.send(detection(420.0, 240.0, 4000.0)).unwrap();
    rig.coord.step().unwrap();
    assert_eq!(control_payloads(&rig.bus), vec!["126 126"]);
}

#[test]
fn test_manual_rail_and_pump() {
    let mut rig = rig();

    assert_eq!(
        rig.coord.handle(Tc::MoveRailForward).status(),
        Some("Moving rail forward")
    );
    assert_eq!(rig.coord.handle(Tc::PumpOn).status(), Some("Pump ON"));
    assert_eq!(rig.coord.handle(Tc::StopRail).status(), Some("Rail stopped"));

    let sent: Vec<BusMsg> = rig.bus.try_iter().collect();
    assert_eq!(
        sent,
        vec![
            BusMsg::new(Topic::Rail, "0"),
            BusMsg::new(Topic::Pump, "1"),
            BusMsg::new(Topic::Rail, "64"),
        ]
    );
}

// ---------------------------------------------------------------------------
// LOCALISATION
// ---------------------------------------------------------------------------

#[test]
fn test_fixes_are_traced() {
    let mut rig = rig();

    // No 2D fix: not recorded
    rig.inbound
        .gps
        .send(GpsReport {
            mode: 1,
            lat: Some(51.5),
            lon: Some(-0.1),
        })
        .unwrap();
    let report = rig.coord.step().unwrap();
    assert!(report.fix.is_none());
    assert_eq!(rig.coord.trace_handle().lock().unwrap().len(), 0);

    let r = rig.coord.handle(Tc::LatestFix);
    assert!(!r.is_ok());
    assert_eq!(r.body, serde_json::json!({"lat": 0.0, "lon": 0.0}));

    rig.inbound.imu.send(level_north()).unwrap();
    rig.inbound
        .gps
        .send(GpsReport {
            mode: 3,
            lat: Some(51.5),
            lon: Some(-0.1),
        })
        .unwrap();
    let report = rig.coord.step().unwrap();
    assert!(report.fix.is_some());

    let points = rig.coord.trace_handle().lock().unwrap().clone();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].heading_deg, Some(0.0));

    let r = rig.coord.handle(Tc::LatestFix);
    assert_eq!(r.code, CODE_OK);
    assert_eq!(r.body, serde_json::json!({"lat": 51.5, "lon": -0.1}));

    let r = rig.coord.handle(Tc::GetTrace);
    assert!(r.is_ok());
    assert_eq!(r.body.as_array().map(|a| a.len()), Some(1));
}

#[test]
fn test_trace_timestamps_follow_the_clock() {
    let mut rig = rig();
    rig.clock.advance(Duration::from_secs(5));

    rig.inbound
        .gps
        .send(GpsReport {
            mode: 3,
            lat: Some(51.5),
            lon: Some(-0.1),
        })
        .unwrap();
    rig.coord.step().unwrap();

    rig.clock.advance(Duration::from_millis(1_500));
    rig.inbound
        .gps
        .send(GpsReport {
            mode: 3,
            lat: Some(51.6),
            lon: Some(-0.1),
        })
        .unwrap();
    rig.coord.step().unwrap();

    let points = rig.coord.trace_handle().lock().unwrap().clone();
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].timestamp, Utc.timestamp(5, 0));
    assert_eq!(points[1].timestamp, Utc.timestamp(6, 500_000_000));
}

#[test]
fn test_zero_acceleration_heading_is_flagged() {
    let mut rig = rig();

    rig.inbound
        .imu
        .send(SensorSample {
            acc: [0.0, 0.0, 0.0],
            mag: [1.0, 0.0, 0.0],
        })
        .unwrap();
    rig.inbound
        .gps
        .send(GpsReport {
            mode: 2,
            lat: Some(1.0),
            lon: Some(2.0),
        })
        .unwrap();

    let report = rig.coord.step().unwrap();
    let heading = report.heading.unwrap();
    assert!(!heading.is_valid());
    assert_eq!(heading.deg, 0.0);

    let points = rig.coord.trace_handle().lock().unwrap().clone();
    assert_eq!(points[0].heading_deg, None);
}

#[test]
fn test_output_frame() {
    let mut rig = rig();

    rig.coord.step().unwrap();
    assert_eq!(rig.coord.output_frame().snapshot().dimensions(), (640, 480));

    rig.inbound.frames.send(CamImage::blank(32, 24)).unwrap();
    rig.coord.step().unwrap();
    assert_eq!(rig.coord.output_frame().snapshot().dimensions(), (32, 24));
}

// ---------------------------------------------------------------------------
// NAVIGATION
// ---------------------------------------------------------------------------

/// Wait for the first non-neutral control command.
fn wait_for_drive(bus: &Receiver<BusMsg>) -> Option<String> {
    for _ in 0..40 {
        if let Ok(m) = bus.recv_timeout(Duration::from_millis(50)) {
            if m.topic == Topic::Control && m.payload != "64 64" {
                return Some(m.payload);
            }
        }
    }
    None
}

/// Wait for the given control command, skipping any others.
fn wait_for_control(bus: &Receiver<BusMsg>, payload: &str) -> bool {
    for _ in 0..40 {
        if let Ok(m) = bus.recv_timeout(Duration::from_millis(50)) {
            if m.topic == Topic::Control && m.payload == payload {
                return true;
            }
        }
    }
    false
}

fn start_navigation(rig: &mut Rig) {
    let r = rig.coord.handle(Tc::SendCoordinates {
        coordinates: vec![Waypoint { lat: 0.001, lng: 0.0 }],
    });
    assert!(r.is_ok());

    assert!(set_mode(rig, "auto_navigation"));
    assert!(rig.coord.nav_running());

    rig.inbound.imu.send(level_north()).unwrap();
    rig.inbound
        .gps
        .send(GpsReport {
            mode: 3,
            lat: Some(0.0),
            lon: Some(0.0),
        })
        .unwrap();
    rig.coord.step().unwrap();
}

#[test]
fn test_navigation_drives_and_stops_on_leave() {
    let mut rig = rig();
    start_navigation(&mut rig);

    // Facing the waypoint and far away: full drive, no steer
    assert_eq!(wait_for_drive(&rig.bus), Some("126 64".into()));

    assert!(set_mode(&mut rig, "basic_movement"));
    assert!(!rig.coord.nav_running());

    // The worker has been joined, the neutral from the mode change is the final command
    let after = control_payloads(&rig.bus);
    assert_eq!(after.last().map(String::as_str), Some("64 64"));

    thread::sleep(Duration::from_millis(300));
    assert!(control_payloads(&rig.bus).is_empty());
}

#[test]
fn test_navigation_turns_left_towards_waypoint() {
    let mut rig = rig();
    start_navigation(&mut rig);
    assert_eq!(wait_for_drive(&rig.bus), Some("126 64".into()));

    // Facing east with the waypoint to the north, the worker turns left like Tc::MoveLeft does.
    // No new fix arrives, the heading alone must reach the worker.
    rig.inbound
        .imu
        .send(SensorSample {
            acc: [0.0, 0.0, 1.0],
            mag: [0.0, 1.0, 0.0],
        })
        .unwrap();
    let report = rig.coord.step().unwrap();
    assert!(report.fix.is_none());
    let heading = report.heading.and_then(|h| h.valid_deg()).unwrap();
    assert!((heading - 90.0).abs() < 1e-6, "{}", heading);

    assert!(wait_for_control(&rig.bus, "126 126"));

    rig.coord.shutdown().unwrap();
}

#[test]
fn test_leaving_navigation_after_worker_failure() {
    let mut rig = rig();
    start_navigation(&mut rig);
    assert!(wait_for_drive(&rig.bus).is_some());

    // Closing the bus makes the worker's next publish fail, so it exits with an error
    let Rig {
        mut coord,
        inbound: _inbound,
        bus,
        ..
    } = rig;
    drop(bus);
    thread::sleep(Duration::from_millis(300));

    let r = coord.handle(Tc::SetMode {
        mode: "basic_movement".into(),
    });
    assert!(r.is_ok(), "{:?}", r);
    assert_eq!(coord.mode(), Mode::Manual);
    assert!(!coord.nav_running());
}

#[test]
fn test_estop_silences_navigation() {
    let mut rig = rig();
    start_navigation(&mut rig);
    assert!(wait_for_drive(&rig.bus).is_some());

    assert!(rig.coord.handle(Tc::EStop).is_ok());
    let after = control_payloads(&rig.bus);
    assert_eq!(after.last().map(String::as_str), Some("64 64"));

    // The worker keeps running but cannot publish
    thread::sleep(Duration::from_millis(300));
    assert!(rig.coord.nav_running());
    assert!(control_payloads(&rig.bus).is_empty());

    rig.coord.shutdown().unwrap();
    assert!(!rig.coord.nav_running());
    assert_eq!(control_payloads(&rig.bus), vec!["64 64"]);
}

#[test]
fn test_no_coordinates_rejected() {
    let mut rig = rig();

    let r = rig.coord.handle(Tc::SendCoordinates {
        coordinates: vec![],
    });
    assert_eq!(r.status(), Some("No coordinates received"));
}
