//! # Actuator mapping
//!
//! Projects a controller output from its symmetric bound `[-max, max]` into the actuator range,
//! with zero output landing on neutral:
//!
//! ```text
//! command = clamp(round(64 + (output / max) * 62), 0, 126)
//! ```

use comms_if::eqpt::ctrl::{ControlCommand, ACT_MAX, ACT_NEUTRAL};
use util::maths::lin_map;

/// Map one controller output into an actuator level.
///
/// Non-finite outputs map to neutral.
pub fn to_level(output: f64, max_output: f64) -> i64 {
    if !output.is_finite() || !(max_output > 0.0) {
        return ACT_NEUTRAL as i64;
    }

    let span = (ACT_MAX - ACT_NEUTRAL) as f64;

    let level = lin_map(
        (-max_output, max_output),
        (ACT_NEUTRAL as f64 - span, ACT_NEUTRAL as f64 + span),
        output,
    )
    .round();

    // The saturating float cast keeps huge outputs finite before the command clamps them
    level as i64
}

/// Build a command from a drive axis output and a steer axis output.
pub fn command(drive: (f64, f64), steer: (f64, f64)) -> ControlCommand {
    ControlCommand::saturating(to_level(drive.0, drive.1), to_level(steer.0, steer.1))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_to_level() {
        assert_eq!(to_level(0.0, 30.0), 64);
        assert_eq!(to_level(30.0, 30.0), 126);
        assert_eq!(to_level(-30.0, 30.0), 2);
        assert_eq!(to_level(0.5, 1.0), 95);
        assert_eq!(to_level(f64::NAN, 1.0), 64);
    }

    #[test]
    fn test_command_in_range() {
        for i in -100..=100 {
            let o = i as f64 * 0.7;
            let cmd = command((o, 1.0), (-o, 30.0));
            assert!(cmd.drive() <= 126);
            assert!(cmd.steer() <= 126);
        }

        assert_eq!(command((0.0, 1.0), (0.0, 30.0)), ControlCommand::NEUTRAL);
    }
}
