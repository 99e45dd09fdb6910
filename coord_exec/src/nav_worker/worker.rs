//! Worker thread and the waypoint following logic it runs.

// -----------------------------------------------------------------------------------------------
// INCLUDES
// -----------------------------------------------------------------------------------------------

use std::{
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::Duration,
};

use comms_if::{eqpt::ctrl::ControlCommand, tc::Waypoint};
use log::{debug, info, warn};
use util::maths::get_ang_dist_deg;

use crate::{act_map, pid::PidController};

use super::{geo, NavContext, NavPose, NavSignal, NavWorkerError, Params};

// -----------------------------------------------------------------------------------------------
// STRUCTS
// -----------------------------------------------------------------------------------------------

/// Waypoint following state machine.
#[derive(Debug)]
pub struct Navigator {
    params: Params,

    heading_pid: PidController,
    distance_pid: PidController,

    waypoints: Vec<Waypoint>,
    next: usize,

    pose: Option<NavPose>,

    /// Set while the pose is unusable so the warning is only logged once
    degraded: bool,
}

// -----------------------------------------------------------------------------------------------
// ENUMS
// -----------------------------------------------------------------------------------------------

/// Outcome of a navigation step.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum NavStep {
    /// Nothing to do, no waypoints or the list is complete.
    Idle,

    /// Drive towards the current waypoint.
    Drive(ControlCommand),

    /// No usable pose, stop.
    Hold,

    /// The final waypoint was reached on this step, stop.
    Complete,
}

// -----------------------------------------------------------------------------------------------
// IMPLS
// -----------------------------------------------------------------------------------------------

impl Navigator {
    pub fn new(params: Params, waypoints: Vec<Waypoint>) -> Result<Self, NavWorkerError> {
        if !(params.arrival_radius_m >= 0.0) {
            return Err(NavWorkerError::InvalidParams("arrival_radius_m must be non-negative"));
        }
        if !(params.pose_timeout_s > 0.0) || !(params.period_s > 0.0) {
            return Err(NavWorkerError::InvalidParams(
                "pose_timeout_s and period_s must be positive",
            ));
        }

        Ok(Self {
            heading_pid: PidController::new(params.heading_pid)?,
            distance_pid: PidController::new(params.distance_pid)?,
            params,
            waypoints,
            next: 0,
            pose: None,
            degraded: false,
        })
    }

    pub fn set_pose(&mut self, pose: NavPose) {
        self.pose = Some(pose);
    }

    pub fn set_waypoints(&mut self, waypoints: Vec<Waypoint>) {
        info!("Navigating {} new waypoints", waypoints.len());
        self.waypoints = waypoints;
        self.next = 0;
        self.heading_pid.reset();
        self.distance_pid.reset();
    }

    /// Index of the waypoint being driven to.
    pub fn next_index(&self) -> usize {
        self.next
    }

    pub fn is_complete(&self) -> bool {
        self.next >= self.waypoints.len()
    }

    /// Run one step at clock time `now`.
    pub fn step(&mut self, now: Duration) -> NavStep {
        if self.is_complete() {
            return NavStep::Idle;
        }

        let (pose, heading) = match self.usable_pose(now) {
            Some(p) => p,
            None => return NavStep::Hold,
        };

        // Skip every waypoint we are already within reach of
        let mut dist_m = self.distance_to_next(&pose);
        while dist_m <= self.params.arrival_radius_m {
            info!("Reached waypoint {} of {}", self.next + 1, self.waypoints.len());
            self.next += 1;
            self.heading_pid.reset();
            self.distance_pid.reset();

            if self.is_complete() {
                info!("All waypoints reached");
                return NavStep::Complete;
            }

            dist_m = self.distance_to_next(&pose);
        }

        let wp = self.waypoints[self.next];
        let bearing = geo::bearing_deg(pose.lat, pose.lon, wp.lat, wp.lng);

        // Positive when the waypoint is clockwise of the heading
        let heading_err = get_ang_dist_deg(heading, bearing);

        // Steer above neutral turns left, so a clockwise error needs a negative demand
        let mut steer = -self.heading_pid.update(heading_err);
        if self.params.invert_steer {
            steer = -steer;
        }
        let drive = self.distance_pid.update(dist_m);

        let cmd = act_map::command(
            (drive, self.distance_pid.max_output()),
            (steer, self.heading_pid.max_output()),
        );

        debug!(
            "Nav: wp {} dist {:.1} m, bearing {:.1}, heading err {:.1} -> {}",
            self.next, dist_m, bearing, heading_err, cmd
        );

        NavStep::Drive(cmd)
    }

    fn usable_pose(&mut self, now: Duration) -> Option<(NavPose, f64)> {
        let reason = match self.pose {
            None => "no pose received yet",
            Some(p) if now.checked_sub(p.stamp).unwrap_or_default().as_secs_f64()
                > self.params.pose_timeout_s =>
            {
                "pose is stale"
            }
            Some(NavPose {
                heading_deg: None, ..
            }) => "heading unavailable",
            Some(p) => {
                if self.degraded {
                    info!("Navigation pose recovered");
                    self.degraded = false;
                }
                return p.heading_deg.map(|h| (p, h));
            }
        };

        if !self.degraded {
            warn!("Holding position: {}", reason);
            self.degraded = true;
        }

        None
    }

    fn distance_to_next(&self, pose: &NavPose) -> f64 {
        let wp = self.waypoints[self.next];
        geo::distance_m(pose.lat, pose.lon, wp.lat, wp.lng)
    }
}

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

pub(super) fn worker_thread(
    mut nav: Navigator,
    main_reciever: Receiver<NavSignal>,
    ctx: NavContext,
) -> Result<(), NavWorkerError> {
    let period = Duration::from_secs_f64(nav.params.period_s);

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        match main_reciever.recv_timeout(period) {
            Ok(NavSignal::Stop) => break,
            Ok(NavSignal::Pose(p)) => nav.set_pose(p),
            Ok(NavSignal::Waypoints(w)) => nav.set_waypoints(w),
            Err(RecvTimeoutError::Timeout) => (),
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if ctx.cancel.is_cancelled() {
            break;
        }

        let cmd = match nav.step(ctx.clock.now()) {
            NavStep::Idle => continue,
            NavStep::Drive(c) => c,
            NavStep::Hold | NavStep::Complete => ControlCommand::NEUTRAL,
        };

        ctx.safety.publish_unless_overridden(&ctx.bus, cmd)?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pid::{PidGains, PidParams};

    fn params() -> Params {
        Params {
            heading_pid: PidParams::new(PidGains::new(1.0, 0.0, 0.0), 30.0),
            distance_pid: PidParams::new(PidGains::new(1.0, 0.0, 0.0), 10.0),
            arrival_radius_m: 2.0,
            pose_timeout_s: 1.0,
            ..Default::default()
        }
    }

    fn pose(lat: f64, lon: f64, heading: f64, t_s: u64) -> NavPose {
        NavPose {
            lat,
            lon,
            heading_deg: Some(heading),
            stamp: Duration::from_secs(t_s),
        }
    }

    // About 111 m north of the origin
    const NORTH: Waypoint = Waypoint { lat: 0.001, lng: 0.0 };

    #[test]
    fn test_drive_towards_waypoint() {
        let mut nav = Navigator::new(params(), vec![NORTH]).unwrap();

        // Facing the waypoint: full speed, no steer
        nav.set_pose(pose(0.0, 0.0, 0.0, 0));
        assert_eq!(
            nav.step(Duration::from_secs(0)),
            NavStep::Drive(ControlCommand::new(126, 64).unwrap())
        );

        // Facing east, the waypoint is anticlockwise so the robot turns left
        nav.set_pose(pose(0.0, 0.0, 90.0, 0));
        match nav.step(Duration::from_secs(0)) {
            NavStep::Drive(c) => assert_eq!(c.steer(), ControlCommand::LEFT.steer()),
            s => panic!("Expected drive, got {:?}", s),
        }
    }

    #[test]
    fn test_turn_direction_matches_manual_commands() {
        let mut nav = Navigator::new(params(), vec![NORTH]).unwrap();

        // Facing west, the waypoint is clockwise so the robot turns right at full demand
        nav.set_pose(pose(0.0, 0.0, 270.0, 0));
        match nav.step(Duration::from_secs(0)) {
            NavStep::Drive(c) => {
                assert!(c.steer() < ControlCommand::NEUTRAL.steer());
                assert_eq!(c.steer(), 2);
            }
            s => panic!("Expected drive, got {:?}", s),
        }

        // A small clockwise error turns right without saturating
        nav.set_pose(pose(0.0, 0.0, 350.0, 0));
        match nav.step(Duration::from_secs(0)) {
            NavStep::Drive(c) => assert!(c.steer() < 64 && c.steer() > 0, "{}", c),
            s => panic!("Expected drive, got {:?}", s),
        }

        // Inverting the steer swaps the direction
        let mut nav = Navigator::new(
            Params {
                invert_steer: true,
                ..params()
            },
            vec![NORTH],
        )
        .unwrap();
        nav.set_pose(pose(0.0, 0.0, 270.0, 0));
        match nav.step(Duration::from_secs(0)) {
            NavStep::Drive(c) => assert_eq!(c.steer(), ControlCommand::LEFT.steer()),
            s => panic!("Expected drive, got {:?}", s),
        }
    }

    #[test]
    fn test_arrival_and_completion() {
        let second = Waypoint { lat: 0.002, lng: 0.0 };
        let mut nav = Navigator::new(params(), vec![NORTH, second]).unwrap();

        nav.set_pose(pose(0.001, 0.0, 0.0, 0));
        assert!(matches!(nav.step(Duration::from_secs(0)), NavStep::Drive(_)));
        assert_eq!(nav.next_index(), 1);

        nav.set_pose(pose(0.002, 0.0, 0.0, 0));
        assert_eq!(nav.step(Duration::from_secs(0)), NavStep::Complete);
        assert_eq!(nav.step(Duration::from_secs(0)), NavStep::Idle);
    }

    #[test]
    fn test_stale_or_missing_pose_holds() {
        let mut nav = Navigator::new(params(), vec![NORTH]).unwrap();
        assert_eq!(nav.step(Duration::from_secs(0)), NavStep::Hold);

        nav.set_pose(pose(0.0, 0.0, 0.0, 10));
        assert!(matches!(nav.step(Duration::from_secs(10)), NavStep::Drive(_)));
        assert_eq!(nav.step(Duration::from_secs(12)), NavStep::Hold);

        nav.set_pose(NavPose {
            heading_deg: None,
            ..pose(0.0, 0.0, 0.0, 12)
        });
        assert_eq!(nav.step(Duration::from_secs(12)), NavStep::Hold);
    }

    #[test]
    fn test_empty_list_is_idle() {
        let mut nav = Navigator::new(params(), vec![]).unwrap();
        nav.set_pose(pose(0.0, 0.0, 0.0, 0));
        assert_eq!(nav.step(Duration::from_secs(0)), NavStep::Idle);

        nav.set_waypoints(vec![NORTH]);
        assert!(matches!(nav.step(Duration::from_secs(0)), NavStep::Drive(_)));
    }
}
