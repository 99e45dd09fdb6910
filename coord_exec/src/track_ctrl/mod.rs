//! # Target tracking control
//!
//! Drives the robot towards a detected target. Two independent PID controllers run once per
//! detection:
//!
//! - yaw: `error = x - (frame_width / 2 + center_offset)`, mapped onto the steer axis,
//! - forward/backward: `error = desired_area - area`, mapped onto the drive axis, so the robot
//!   closes in until the target appears at the desired size.
//!
//! A cycle with no detection produces the neutral command. The PID state is kept across lost
//! target cycles.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::{ctrl::ControlCommand, det::Detection};
use log::trace;
use serde::Serialize;
use util::module::State;

use crate::{
    act_map,
    pid::{PidController, PidError, PidGains},
};

pub use params::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Target tracking controller.
#[derive(Debug, Clone)]
pub struct TrackCtrl {
    params: Params,

    yaw_pid: PidController,
    fb_pid: PidController,

    desired_area: f64,
    center_offset: f64,
}

/// Input to one tracking step.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// The detection to track, `None` if the target is lost.
    pub detection: Option<Detection>,
}

/// Status report for a tracking step.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub target_lost: bool,

    pub yaw_error: f64,
    pub fb_error: f64,

    pub yaw_output: f64,
    pub fb_output: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrackCtrlError {
    #[error("Invalid controller configuration: {0}")]
    PidError(#[from] PidError),

    #[error("Invalid tracking parameters: {0}")]
    InvalidParams(&'static str),

    #[error("Detection contains non-finite values: {0:?}")]
    InvalidDetection(Detection),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for TrackCtrl {
    type InitData = Params;
    type InitError = TrackCtrlError;

    type InputData = InputData;
    type OutputData = ControlCommand;
    type StatusReport = StatusReport;
    type ProcError = TrackCtrlError;

    fn init(params: Self::InitData) -> Result<Self, Self::InitError> {
        if params.frame_width == 0 {
            return Err(TrackCtrlError::InvalidParams("frame_width must be non-zero"));
        }
        if !(params.min_area <= params.max_area) || !(params.max_offset >= 0.0) {
            return Err(TrackCtrlError::InvalidParams(
                "area and offset limits must be ordered",
            ));
        }

        Ok(Self {
            yaw_pid: PidController::new(params.yaw_pid)?,
            fb_pid: PidController::new(params.fb_pid)?,
            desired_area: params.desired_area.max(params.min_area).min(params.max_area),
            center_offset: 0.0,
            params,
        })
    }

    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        let det = match input_data.detection {
            Some(d) => d,
            None => {
                return Ok((
                    ControlCommand::NEUTRAL,
                    StatusReport {
                        target_lost: true,
                        ..Default::default()
                    },
                ))
            }
        };

        if !(det.center[0].is_finite() && det.center[1].is_finite() && det.area.is_finite()) {
            return Err(TrackCtrlError::InvalidDetection(det));
        }

        let center_x = (self.params.frame_width / 2) as f64 + self.center_offset;

        // Yaw axis
        let yaw_error = det.center[0] - center_x;
        let mut yaw_output = self.yaw_pid.update(yaw_error);
        if self.params.invert_yaw {
            yaw_output = -yaw_output;
        }

        // Forward/backward axis, the controller is always stepped so its state stays continuous
        let fb_error = self.desired_area - det.area;
        let mut fb_output = self.fb_pid.update(fb_error);
        if det.area <= 0.0 {
            fb_output = 0.0;
        }

        let cmd = act_map::command(
            (fb_output, self.fb_pid.max_output()),
            (yaw_output, self.yaw_pid.max_output()),
        );

        trace!(
            "TrackCtrl: yaw err {:.1} out {:.3}, fb err {:.1} out {:.3} -> {}",
            yaw_error,
            yaw_output,
            fb_error,
            fb_output,
            cmd
        );

        Ok((
            cmd,
            StatusReport {
                target_lost: false,
                yaw_error,
                fb_error,
                yaw_output,
                fb_output,
            },
        ))
    }
}

impl TrackCtrl {
    /// Raise the desired area by one step, returning the new value.
    pub fn increase_area(&mut self) -> f64 {
        self.set_desired_area(self.desired_area + self.params.area_step)
    }

    /// Lower the desired area by one step, returning the new value.
    pub fn decrease_area(&mut self) -> f64 {
        self.set_desired_area(self.desired_area - self.params.area_step)
    }

    /// Move the tracking center one step left, returning the new offset.
    pub fn move_center_left(&mut self) -> f64 {
        self.set_center_offset(self.center_offset - self.params.offset_step)
    }

    /// Move the tracking center one step right, returning the new offset.
    pub fn move_center_right(&mut self) -> f64 {
        self.set_center_offset(self.center_offset + self.params.offset_step)
    }

    /// Replace the gains of both axes.
    ///
    /// Either both controllers take the new gains or neither does.
    pub fn set_gains(&mut self, gains: PidGains) -> Result<(), TrackCtrlError> {
        let mut yaw = self.yaw_pid.clone();
        yaw.set_gains(gains)?;
        self.fb_pid.set_gains(gains)?;
        self.yaw_pid = yaw;
        Ok(())
    }

    pub fn desired_area(&self) -> f64 {
        self.desired_area
    }

    pub fn center_offset(&self) -> f64 {
        self.center_offset
    }

    pub fn yaw_pid(&self) -> &PidController {
        &self.yaw_pid
    }

    pub fn fb_pid(&self) -> &PidController {
        &self.fb_pid
    }

    fn set_desired_area(&mut self, area: f64) -> f64 {
        self.desired_area = area.max(self.params.min_area).min(self.params.max_area);
        self.desired_area
    }

    fn set_center_offset(&mut self, offset: f64) -> f64 {
        self.center_offset = offset
            .max(-self.params.max_offset)
            .min(self.params.max_offset);
        self.center_offset
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn det(x: f64, area: f64) -> InputData {
        InputData {
            detection: Some(Detection {
                center: [x, 240.0],
                area,
            }),
        }
    }

    #[test]
    fn test_first_detection() {
        let mut tc = TrackCtrl::init(Params::default()).unwrap();

        let (cmd, report) = tc.proc(&det(420.0, 4000.0)).unwrap();

        assert_eq!(report.yaw_error, 100.0);
        assert_eq!(report.fb_error, 1000.0);

        assert!(cmd.steer() > 64);
        assert!(cmd.drive() > 64);
        assert_eq!(cmd, ControlCommand::new(126, 126).unwrap());
    }

    #[test]
    fn test_target_lost_is_neutral() {
        let mut tc = TrackCtrl::init(Params::default()).unwrap();
        tc.proc(&det(420.0, 4000.0)).unwrap();

        let (cmd, report) = tc.proc(&InputData::default()).unwrap();
        assert_eq!(cmd, ControlCommand::NEUTRAL);
        assert!(report.target_lost);

        // The lost cycle does not reset the controllers
        assert_eq!(tc.yaw_pid().prev_error(), 100.0);
    }

    #[test]
    fn test_zero_error_converges_to_neutral() {
        let mut tc = TrackCtrl::init(Params {
            yaw_pid: crate::pid::PidParams::new(PidGains::new(0.5, 0.0, 0.25), 30.0),
            fb_pid: crate::pid::PidParams::new(PidGains::new(0.6, 0.0, 0.1), 1.0),
            ..Default::default()
        })
        .unwrap();

        let mut cmd = ControlCommand::FORWARD;
        for _ in 0..3 {
            cmd = tc.proc(&det(320.0, 5000.0)).unwrap().0;
        }
        assert_eq!(cmd, ControlCommand::NEUTRAL);
    }

    #[test]
    fn test_non_positive_area() {
        let mut tc = TrackCtrl::init(Params::default()).unwrap();

        let (cmd, report) = tc.proc(&det(320.0, 0.0)).unwrap();
        assert_eq!(cmd.drive(), 64);
        assert_eq!(report.fb_output, 0.0);

        // The forward/backward controller was still stepped
        assert_eq!(tc.fb_pid().prev_error(), 5000.0);
    }

    #[test]
    fn test_invert_yaw() {
        let mut tc = TrackCtrl::init(Params {
            invert_yaw: true,
            ..Default::default()
        })
        .unwrap();

        let (cmd, _) = tc.proc(&det(420.0, 5000.0)).unwrap();
        assert_eq!(cmd.steer(), 2);
    }

    #[test]
    fn test_area_and_offset_limits() {
        let mut tc = TrackCtrl::init(Params::default()).unwrap();

        assert_eq!(tc.increase_area(), 5100.0);
        for _ in 0..100 {
            tc.increase_area();
        }
        assert_eq!(tc.desired_area(), 9000.0);
        for _ in 0..100 {
            tc.decrease_area();
        }
        assert_eq!(tc.desired_area(), 3000.0);

        assert_eq!(tc.move_center_left(), -10.0);
        for _ in 0..100 {
            tc.move_center_right();
        }
        assert_eq!(tc.center_offset(), 320.0);

        // The offset moves the yaw reference
        let (_, report) = tc.proc(&det(640.0, 5000.0)).unwrap();
        assert_eq!(report.yaw_error, 0.0);
    }

    #[test]
    fn test_gain_update_affects_both_axes() {
        let mut tc = TrackCtrl::init(Params::default()).unwrap();
        let gains = PidGains::new(1.0, 0.0, 0.0);

        tc.set_gains(gains).unwrap();
        assert_eq!(tc.yaw_pid().gains(), gains);
        assert_eq!(tc.fb_pid().gains(), gains);

        assert!(tc.set_gains(PidGains::new(f64::NAN, 0.0, 0.0)).is_err());
        assert_eq!(tc.yaw_pid().gains(), gains);
        assert_eq!(tc.fb_pid().gains(), gains);
    }

    #[test]
    fn test_invalid_detection() {
        let mut tc = TrackCtrl::init(Params::default()).unwrap();
        assert!(tc.proc(&det(f64::NAN, 5000.0)).is_err());
    }
}
