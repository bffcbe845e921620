// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Selects the authoritative command of a tick.
use crate::controller::command_channels::CommandChannels;
use crate::controller::types::{Command, ControlMode};

/// Result of arbitrating the command channels for one tick.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Arbitration {
    pub mode: ControlMode,
    pub command: Command,
    /// false if no producer has written a command since activation. The command is then the
    /// default position target and must not be acted upon.
    pub populated: bool,
}

/// Reads the command channels once. Never blocks.
pub fn arbitrate(channels: &CommandChannels) -> Arbitration {
    let slot = channels.command();
    Arbitration {
        mode: slot.command.mode(),
        command: slot.command,
        populated: slot.is_populated(),
    }
}

#[cfg(test)]
mod tests {
    use crate::controller::command_channels::CommandChannels;
    use crate::controller::mode_arbiter::arbitrate;
    use crate::controller::types::{Command, ControlMode};

    #[test]
    fn unwritten_channels_arbitrate_to_unpopulated_position() {
        let channels = CommandChannels::new();
        let arbitration = arbitrate(&channels);
        assert_eq!(arbitration.mode, ControlMode::Position);
        assert!(!arbitration.populated);
    }

    #[test]
    fn mode_and_command_always_agree() {
        let channels = CommandChannels::new();
        channels.write_target_acceleration([0., 0., 1., 0., 0., 0.]);
        let arbitration = arbitrate(&channels);
        assert!(arbitration.populated);
        assert_eq!(arbitration.mode, ControlMode::AccelerationModel);
        assert_eq!(arbitration.mode, arbitration.command.mode());
        channels.write_target_velocity([0.1, 0., 0., 0., 0., 0.]);
        let arbitration = arbitrate(&channels);
        assert_eq!(arbitration.mode, ControlMode::Velocity);
        assert_eq!(
            arbitration.command,
            Command::Velocity([0.1, 0., 0., 0., 0., 0.])
        );
    }
}
