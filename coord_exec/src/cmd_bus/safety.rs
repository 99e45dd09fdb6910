//! Safety override flag

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use comms_if::eqpt::ctrl::ControlCommand;

use super::{BusTx, CmdBusError};

/// The process wide safety override.
///
/// Every locomotion command is published while holding this lock, so activating the override
/// and publishing neutral is atomic with respect to every other writer: once `activate` returns
/// no non-neutral command can be published until `clear` is called.
#[derive(Debug, Clone, Default)]
pub struct SafetyFlag {
    active: Arc<Mutex<bool>>,
}

impl SafetyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        *self.lock()
    }

    /// Activate the override and publish neutral. Returns whether the flag changed.
    pub fn activate(&self, bus: &BusTx) -> Result<bool, CmdBusError> {
        let mut active = self.lock();
        let changed = !*active;
        *active = true;
        bus.send_cmd(ControlCommand::NEUTRAL)?;
        Ok(changed)
    }

    /// Clear the override. Returns whether the flag changed.
    pub fn clear(&self) -> bool {
        let mut active = self.lock();
        let changed = *active;
        *active = false;
        changed
    }

    /// Publish a command unless the override is active, in which case neutral is published
    /// instead. Returns the command actually published.
    pub fn publish(&self, bus: &BusTx, cmd: ControlCommand) -> Result<ControlCommand, CmdBusError> {
        let active = self.lock();
        let cmd = if *active { ControlCommand::NEUTRAL } else { cmd };
        bus.send_cmd(cmd)?;
        Ok(cmd)
    }

    /// Publish a command only if the override is inactive. Returns whether it was published.
    pub fn publish_unless_overridden(
        &self,
        bus: &BusTx,
        cmd: ControlCommand,
    ) -> Result<bool, CmdBusError> {
        let active = self.lock();
        if *active {
            return Ok(false);
        }
        bus.send_cmd(cmd)?;
        Ok(true)
    }

    /// Run `f` with the override inactive and held, returning `None` if it is active.
    ///
    /// Used for non-locomotion motion demands (the rail) which share the override.
    pub fn with_inactive<T, F: FnOnce() -> T>(&self, f: F) -> Option<T> {
        let active = self.lock();
        if *active {
            None
        } else {
            Some(f())
        }
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::cmd_bus::bus_channel;

    #[test]
    fn test_override_gates_publication() {
        let (bus, rx) = bus_channel();
        let flag = SafetyFlag::new();

        assert!(flag
            .publish_unless_overridden(&bus, ControlCommand::FORWARD)
            .unwrap());
        assert!(flag.activate(&bus).unwrap());
        assert!(!flag.activate(&bus).unwrap());
        assert!(!flag
            .publish_unless_overridden(&bus, ControlCommand::FORWARD)
            .unwrap());
        assert_eq!(
            flag.publish(&bus, ControlCommand::LEFT).unwrap(),
            ControlCommand::NEUTRAL
        );
        assert!(flag.with_inactive(|| ()).is_none());

        assert!(flag.clear());
        assert!(!flag.is_active());

        let sent: Vec<String> = rx.try_iter().map(|m| m.payload).collect();
        assert_eq!(sent, vec!["126 64", "64 64", "64 64", "64 64"]);
    }
}
